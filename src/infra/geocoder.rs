use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::app::ports::ReverseGeocoder;
use crate::error::Result;

/// Subset of a Nominatim `/reverse?format=jsonv2` answer
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

/// Reverse geocoding against a Nominatim-compatible service
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }
}

/// Turns a decoded answer into an address. "Unable to geocode" style answers
/// are a successful lookup without an address.
fn address_of(response: ReverseResponse) -> Option<String> {
    if response.error.is_some() {
        return None;
    }
    response.display_name.filter(|name| !name.trim().is_empty())
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> std::result::Result<Option<String>, String> {
        let url = format!("{}/reverse", self.endpoint);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("zoom", "10".to_string()),
                ("accept-language", "en".to_string()),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("Reverse geocoding failed: HTTP {}", status.as_u16()));
        }
        let body: ReverseResponse = resp.json().await.map_err(|e| e.to_string())?;
        Ok(address_of(body))
    }
}
