use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Reverse geocoding of ({latitude}, {longitude}) failed after {attempts} attempts: {last_error}")]
    GeocodingExhausted {
        latitude: f64,
        longitude: f64,
        attempts: u32,
        last_error: String,
    },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Batch load failed and was rolled back: {message}")]
    Load { message: String },

    #[cfg(feature = "db")]
    #[error("Database error: {message}")]
    Database { message: String },
}

pub type Result<T> = std::result::Result<T, EtlError>;
