use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Clinicap";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// File name of the generated visit log.
pub const VISIT_LOG_FILE: &str = "visit_data.csv";

/// File name of the captured measurement log.
pub const MEASUREMENT_LOG_FILE: &str = "data.csv";

/// Public random-number service used for random patients.
pub const RANDOM_API_BASE_URL: &str = "http://www.randomnumberapi.com";

/// Request timeout for the random-number service.
pub const RANDOM_API_TIMEOUT_SECS: u64 = 10;

/// Random patient height range, in centimetres.
pub const RANDOM_HEIGHT_CM: (i64, i64) = (130, 210);

/// Random patient weight range, in kilograms.
pub const RANDOM_WEIGHT_KG: (i64, i64) = (40, 140);

/// Visits generated per dataset when no count is given.
pub const DEFAULT_VISIT_COUNT: usize = 10_000;

/// Duplicates injected per dataset when no count is given.
pub const DEFAULT_DUPLICATE_COUNT: usize = 100;

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "clinicap=info,clinicap_lib=info"
}

/// Get the application data directory
/// ~/Clinicap/ on all platforms; falls back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Clinicap")
}

/// Default location of the visit log.
pub fn visit_log_path() -> PathBuf {
    app_data_dir().join(VISIT_LOG_FILE)
}

/// Default location of the measurement log.
pub fn measurement_log_path() -> PathBuf {
    app_data_dir().join(MEASUREMENT_LOG_FILE)
}
