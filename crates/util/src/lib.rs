pub mod config;

use std::time::Duration;

pub use config::{AppConfig, ConfigError, Environment, StoreConfig};

pub const DEFAULT_NETCRAFT_BASE_URL: &str = "https://report.netcraft.com/api/v2/";
pub const DEFAULT_LOOKBACK_HOURS: u64 = 24;
/// Upper bound on the lookback window (about a thousand years), well inside
/// the range `chrono` can subtract from the current time.
pub const MAX_LOOKBACK_HOURS: u64 = 24 * 366 * 1000;

/// Loads environment variables from `.env` when available.
///
/// Missing files are ignored so the function is safe in production builds
/// where dotenv files are not deployed.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

/// Converts a lookback expressed in hours into a [`Duration`].
///
/// Returns `None` for zero or for windows above [`MAX_LOOKBACK_HOURS`].
pub fn lookback_duration(hours: u64) -> Option<Duration> {
    if hours == 0 || hours > MAX_LOOKBACK_HOURS {
        return None;
    }
    hours.checked_mul(60 * 60).map(Duration::from_secs)
}
