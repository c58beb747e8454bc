use async_trait::async_trait;

use crate::types::{CanonicalAggregate, RawRecord};

// Extract-side port
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches up to `limit` records starting at `offset`. An empty page means the
    /// source has no more data at that position.
    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<RawRecord>, String>;
}

// Transform-side port
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Resolves a point to a comma-separated address. `Ok(None)` means the service
    /// answered but had no address for the point.
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<String>, String>;
}

// Load-side port
#[async_trait]
pub trait BatchLoader: Send + Sync {
    /// Persists the whole batch or nothing at all.
    async fn commit(&self, batch: &[CanonicalAggregate]) -> Result<LoadReceipt, String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadReceipt {
    pub rows: usize,
    /// Where the batch went (file path, database url, ...)
    pub target: String,
}
