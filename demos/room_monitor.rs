//! Print the room climate every 10 seconds.
//!
//! Run on the Pi with: cargo run --example room_monitor --features linux
//!
//! Set BME280_I2C_BUS / BME280_I2C_ADDRESS if the sensor is not on
//! /dev/i2c-1 at 0x76, and RUST_LOG=debug for register traffic.

use std::time::Duration;

use roomclock::{open_linux_bus, Bme280, SensorConfig, DEFAULT_REFRESH_SECS};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), roomclock::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = SensorConfig::from_env()?;
    let mut sensor = Bme280::new(open_linux_bus(&config)?);
    sensor.initialize()?;

    loop {
        match sensor.get_status() {
            Ok(status) => println!(
                "{}°C  {}%  {}hPa",
                status.temperature, status.humidity, status.pressure
            ),
            Err(e) => tracing::warn!("Read failed: {}", e),
        }
        std::thread::sleep(Duration::from_secs(u64::from(DEFAULT_REFRESH_SECS)));
    }
}
