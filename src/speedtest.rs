//! Network speed test results.
//!
//! Results come from the Ookla `speedtest` CLI run with `--format=json`,
//! which reports bandwidth in bytes per second.
//!
//! # Example
//!
//! ```
//! use roomclock::speedtest::parse_speedtest_json;
//!
//! let line = r#"{"ping":{"latency":9.5},"download":{"bandwidth":12500000},"upload":{"bandwidth":2500000}}"#;
//! let result = parse_speedtest_json(line).unwrap();
//! assert_eq!(result.download_mbps, 100.0);
//! assert_eq!(result.upload_mbps, 20.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Upload/download throughput and latency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestResult {
    /// Upload in Mbit/s
    pub upload_mbps: f64,
    /// Download in Mbit/s
    pub download_mbps: f64,
    /// Ping latency in ms
    pub ping_ms: f64,
}

#[derive(Debug, Deserialize)]
struct CliOutput {
    ping: CliPing,
    download: CliBandwidth,
    upload: CliBandwidth,
}

#[derive(Debug, Deserialize)]
struct CliPing {
    latency: f64,
}

#[derive(Debug, Deserialize)]
struct CliBandwidth {
    bandwidth: f64,
}

fn bytes_per_sec_to_mbps(bandwidth: f64) -> f64 {
    bandwidth * 8.0 / 1000.0 / 1000.0
}

/// Decode one JSON result line.
pub fn parse_speedtest_json(line: &str) -> Result<SpeedTestResult, Error> {
    let output: CliOutput = serde_json::from_str(line)
        .map_err(|e| Error::SpeedTest(format!("Unexpected speedtest output: {}", e)))?;
    Ok(SpeedTestResult {
        upload_mbps: bytes_per_sec_to_mbps(output.upload.bandwidth),
        download_mbps: bytes_per_sec_to_mbps(output.download.bandwidth),
        ping_ms: output.ping.latency,
    })
}

/// Decode the full stdout of a run; the last non-empty line wins.
pub fn parse_speedtest_output(stdout: &str) -> Result<SpeedTestResult, Error> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| Error::SpeedTest("speedtest printed nothing".to_string()))?;
    parse_speedtest_json(line)
}

/// How to invoke the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedTestConfig {
    /// Executable (default: "speedtest", or `SPEEDTEST_PATH`)
    pub command: String,
    /// Arguments (default: `--format=json`)
    pub args: Vec<String>,
}

impl Default for SpeedTestConfig {
    fn default() -> Self {
        Self {
            command: std::env::var("SPEEDTEST_PATH").unwrap_or_else(|_| "speedtest".to_string()),
            args: vec!["--format=json".to_string()],
        }
    }
}

impl SpeedTestConfig {
    /// Use a different executable.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Replace the argument list.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Run the speed test CLI and decode its result.
///
/// A full run takes tens of seconds; spawn it off the refresh loop.
#[cfg(feature = "speedtest")]
pub async fn run_speedtest(config: &SpeedTestConfig) -> Result<SpeedTestResult, Error> {
    let output = tokio::process::Command::new(&config.command)
        .args(&config.args)
        .output()
        .await
        .map_err(|e| Error::Io(format!("Failed to run {}: {}", config.command, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!("speedtest stderr: {}", stderr);
        return Err(Error::SpeedTest(format!(
            "{} exited with {}",
            config.command, output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let result = parse_speedtest_output(&stdout)?;
    tracing::info!(
        "Speed test: up {:.1} Mbps, down {:.1} Mbps, ping {:.1} ms",
        result.upload_mbps,
        result.download_mbps,
        result.ping_ms
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_speedtest_json() {
        let line = r#"{"type":"result","ping":{"jitter":0.4,"latency":12.25},"download":{"bandwidth":11875000,"bytes":1},"upload":{"bandwidth":1250000,"bytes":1}}"#;
        let result = parse_speedtest_json(line).unwrap();
        assert_eq!(result.download_mbps, 95.0);
        assert_eq!(result.upload_mbps, 10.0);
        assert_eq!(result.ping_ms, 12.25);
    }

    #[test]
    fn test_output_last_line_wins() {
        let stdout = concat!(
            r#"{"ping":{"latency":30.0},"download":{"bandwidth":1000000},"upload":{"bandwidth":1000000}}"#,
            "\n",
            r#"{"ping":{"latency":8.0},"download":{"bandwidth":2000000},"upload":{"bandwidth":500000}}"#,
            "\n\n"
        );
        let result = parse_speedtest_output(stdout).unwrap();
        assert_eq!(result.ping_ms, 8.0);
        assert_eq!(result.download_mbps, 16.0);
        assert_eq!(result.upload_mbps, 4.0);
    }

    #[test]
    fn test_empty_output_is_error() {
        let err = parse_speedtest_output("\n  \n").unwrap_err();
        assert!(matches!(err, Error::SpeedTest(_)));
    }

    #[test]
    fn test_garbage_is_error() {
        let err = parse_speedtest_json(r#"{"error":"Cannot read from socket"}"#).unwrap_err();
        assert!(err.to_string().contains("Unexpected speedtest output"));
    }

    #[test]
    fn test_config_builder() {
        let config = SpeedTestConfig::default()
            .with_command("/usr/local/bin/speedtest")
            .with_args(["--format=json", "--accept-license"]);
        assert_eq!(config.command, "/usr/local/bin/speedtest");
        assert_eq!(config.args, vec!["--format=json", "--accept-license"]);
    }

    #[cfg(feature = "speedtest")]
    #[tokio::test]
    async fn test_run_speedtest_missing_binary() {
        let config = SpeedTestConfig::default().with_command("/nonexistent/speedtest");
        let err = run_speedtest(&config).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
