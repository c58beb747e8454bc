// Adapters implementing the application ports

pub mod geocoder;
pub mod http_client;
pub mod json_loader;
#[cfg(feature = "db")]
pub mod libsql_loader;

pub use geocoder::NominatimGeocoder;
pub use http_client::SocrataPageSource;
pub use json_loader::JsonFileLoader;
#[cfg(feature = "db")]
pub use libsql_loader::LibsqlLoader;
