//! Dashboard server: refreshes every source on the schedule and serves the
//! latest frame as JSON.
//!
//! Run with: cargo run --example dashboard_server --features linux,axum,schedule,speedtest
//!
//! Forecasts need API_KEY and ZIP (fetched with `curl`); without them the
//! forecast stays empty. Then test with:
//!   curl http://localhost:3000/api/dashboard
//!   curl http://localhost:3000/api/room

use std::sync::{Arc, RwLock};
use std::time::Duration;

use roomclock::axum_ext::{router, SharedDashboard};
use roomclock::weather::parse_openweathermap;
use roomclock::{
    get_global_refresh_rate, global_schedule, init_global_schedule, open_linux_bus,
    run_speedtest, Bme280, Dashboard, Error, ForecastConfig, ForecastEntry, ForecastProvider,
    SecondTicker, SensorConfig, SpeedTestConfig,
};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

/// OpenWeatherMap over `curl`.
fn curl_forecast(config: ForecastConfig) -> impl ForecastProvider + Send + 'static {
    move || -> Result<Vec<ForecastEntry>, Error> {
        let output = std::process::Command::new("curl")
            .arg("-s")
            .arg(config.forecast_url())
            .output()
            .map_err(|e| Error::Io(format!("Failed to run curl: {}", e)))?;
        parse_openweathermap(&String::from_utf8_lossy(&output.stdout))
    }
}

fn update(state: &SharedDashboard, apply: impl FnOnce(&mut Dashboard)) {
    match state.write() {
        Ok(mut dashboard) => apply(&mut dashboard),
        Err(_) => tracing::error!("Dashboard lock poisoned"),
    }
}

fn refresh_forecast(mut provider: impl ForecastProvider + Send + 'static, state: SharedDashboard) {
    tokio::task::spawn_blocking(move || match provider.forecast() {
        Ok(entries) => update(&state, |d| d.set_forecast(entries)),
        Err(e) => tracing::warn!("Forecast refresh failed: {}", e),
    });
}

fn refresh_network(config: SpeedTestConfig, state: SharedDashboard) {
    tokio::spawn(async move {
        match run_speedtest(&config).await {
            Ok(result) => update(&state, |d| d.set_speed_test(result)),
            Err(e) => tracing::warn!("Speed test failed: {}", e),
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let schedule_path =
        std::env::var("SCHEDULE_PATH").unwrap_or_else(|_| "config/schedule.yaml".to_string());
    init_global_schedule(&schedule_path);
    let schedule = global_schedule();

    let forecast = match ForecastConfig::from_env() {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Forecast disabled: {}", e);
            None
        }
    };
    let timezone = match &forecast {
        Some(config) => config.tz()?,
        None => schedule.tz(),
    };

    let mut sensor = Bme280::new(open_linux_bus(&SensorConfig::from_env()?)?);
    sensor.initialize()?;

    let state: SharedDashboard = Arc::new(RwLock::new(
        Dashboard::new()
            .with_timezone(timezone)
            .with_refresh_rate(get_global_refresh_rate()),
    ));

    let refresher = state.clone();
    let speedtest = SpeedTestConfig::default();
    tokio::spawn(async move {
        if let Some(config) = &forecast {
            refresh_forecast(curl_forecast(config.clone()), refresher.clone());
        }

        let mut ticker = SecondTicker::default();
        let mut poll = tokio::time::interval(Duration::from_millis(100));
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            poll.tick().await;
            let Some(due) = ticker.poll(schedule, &schedule.now()) else {
                continue;
            };

            if due.room {
                // Short register reads; keep them off the async workers
                match tokio::task::block_in_place(|| sensor.get_status()) {
                    Ok(status) => update(&refresher, |d| {
                        d.set_room(status);
                        d.set_refresh_rate(get_global_refresh_rate());
                    }),
                    Err(e) => tracing::warn!("Room read failed: {}", e),
                }
            }
            if due.forecast {
                if let Some(config) = &forecast {
                    refresh_forecast(curl_forecast(config.clone()), refresher.clone());
                }
            }
            if due.network {
                refresh_network(speedtest.clone(), refresher.clone());
            }
        }
    });

    tracing::info!("Serving dashboard on http://localhost:3000");
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
