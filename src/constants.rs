//! Defaults shared by the configuration layer and the pipeline components

// NASA Meteorite Landings dataset (Socrata open data)
pub const NASA_METEORITE_ENDPOINT: &str = "https://data.nasa.gov/resource/gh4g-9sfh.json";

// Socrata caps unauthenticated pages below 1000 rows
pub const PAGE_SIZE: u64 = 999;
pub const EXTRACTION_WORKERS: usize = 5;
pub const EXTRACTION_UPPER_BOUND: u64 = 50_000;

pub const NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org";
pub const USER_AGENT: &str = concat!("meteorite_etl/", env!("CARGO_PKG_VERSION"));

/// Delay before every reverse-geocoding request
pub const GEOCODE_RATE_LIMIT_MS: u64 = 300;
/// Wait between failed reverse-geocoding attempts
pub const GEOCODE_BACKOFF_MS: u64 = 1_000;
pub const GEOCODE_MAX_ATTEMPTS: u32 = 10;

pub const HTTP_TIMEOUT_SECONDS: u64 = 30;

pub const CONFIG_FILE: &str = "config.toml";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const OUTPUT_DIR: &str = "output";
pub const LOG_DIR: &str = "logs";
