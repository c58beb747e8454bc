//! Location resolver: reverse geocoding behind a run-scoped cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::app::ports::ReverseGeocoder;
use crate::constants::{GEOCODE_BACKOFF_MS, GEOCODE_MAX_ATTEMPTS, GEOCODE_RATE_LIMIT_MS};
use crate::error::{EtlError, Result};
use crate::metrics::TransformMetrics;
use crate::types::{LocationKey, ResolvedLocation};

/// Pacing and retry limits for calls to the reverse-geocoding service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeocodingPolicy {
    /// Applied before every external call
    pub rate_limit: Duration,
    /// Applied after a failed call, before the next attempt
    pub backoff: Duration,
    pub max_attempts: u32,
}

impl Default for GeocodingPolicy {
    fn default() -> Self {
        Self {
            rate_limit: Duration::from_millis(GEOCODE_RATE_LIMIT_MS),
            backoff: Duration::from_millis(GEOCODE_BACKOFF_MS),
            max_attempts: GEOCODE_MAX_ATTEMPTS,
        }
    }
}

/// Resolved outcomes keyed by rounded coordinate. `None` records a lookup that
/// succeeded without yielding an address.
#[derive(Debug, Default)]
pub struct LocationCache {
    entries: HashMap<LocationKey, Option<ResolvedLocation>>,
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &LocationKey) -> Option<&Option<ResolvedLocation>> {
        self.entries.get(key)
    }

    /// Stores the first outcome for a key; later outcomes for the same key are ignored.
    pub fn insert(&mut self, key: LocationKey, outcome: Option<ResolvedLocation>) {
        self.entries.entry(key).or_insert(outcome);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub geocode_calls: u64,
    pub geocode_failures: u64,
}

/// Splits a comma-separated address. The last three parts are city, state and
/// country; shorter addresses still resolve, just without names.
pub fn parse_address(key: LocationKey, address: &str) -> Option<ResolvedLocation> {
    if address.trim().is_empty() {
        return None;
    }
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();
    let mut location = ResolvedLocation::unnamed(key);
    if let [.., city, state, country] = parts[..] {
        let name = |s: &str| (!s.is_empty()).then(|| s.to_string());
        location.city = name(city);
        location.state = name(state);
        location.country = name(country);
    }
    Some(location)
}

pub struct LocationResolver {
    geocoder: Arc<dyn ReverseGeocoder>,
    policy: GeocodingPolicy,
    cache: LocationCache,
    cancel: CancellationToken,
    stats: LocationStats,
}

impl LocationResolver {
    pub fn new(
        geocoder: Arc<dyn ReverseGeocoder>,
        policy: GeocodingPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            geocoder,
            policy,
            cache: LocationCache::new(),
            cancel,
            stats: LocationStats::default(),
        }
    }

    pub fn stats(&self) -> LocationStats {
        self.stats
    }

    pub fn cache(&self) -> &LocationCache {
        &self.cache
    }

    /// Resolves a rounded coordinate, calling the geocoder at most once per key
    /// for the lifetime of this resolver.
    pub async fn resolve(&mut self, key: LocationKey) -> Result<Option<ResolvedLocation>> {
        if let Some(cached) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            TransformMetrics::record_cache_hit();
            return Ok(cached.clone());
        }
        self.stats.cache_misses += 1;

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.pause(self.policy.rate_limit).await?;

            self.stats.geocode_calls += 1;
            let started = std::time::Instant::now();
            let outcome = self.geocoder.reverse(key.latitude(), key.longitude()).await;
            TransformMetrics::record_geocode_call(started.elapsed().as_secs_f64());

            match outcome {
                Ok(address) => {
                    let resolved = address.as_deref().and_then(|a| parse_address(key, a));
                    debug!(location = %key, found = resolved.is_some(), "Reverse geocoded");
                    self.cache.insert(key, resolved.clone());
                    return Ok(resolved);
                }
                Err(e) => {
                    self.stats.geocode_failures += 1;
                    TransformMetrics::record_geocode_failure();
                    if attempt >= self.policy.max_attempts {
                        return Err(EtlError::GeocodingExhausted {
                            latitude: key.latitude(),
                            longitude: key.longitude(),
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                    warn!(
                        "Location {} failed (attempt {}/{}): {}; waiting {:?} before retrying",
                        key, attempt, self.policy.max_attempts, e, self.policy.backoff
                    );
                    self.pause(self.policy.backoff).await?;
                }
            }
        }
    }

    async fn pause(&self, duration: Duration) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(EtlError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(EtlError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted answers and records every call
    struct ScriptedGeocoder {
        answers: Mutex<VecDeque<std::result::Result<Option<String>, String>>>,
        calls: Mutex<Vec<(f64, f64)>>,
        called_at: Mutex<Vec<Instant>>,
    }

    impl ScriptedGeocoder {
        fn new(answers: Vec<std::result::Result<Option<String>, String>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                calls: Mutex::new(Vec::new()),
                called_at: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ReverseGeocoder for ScriptedGeocoder {
        async fn reverse(&self, latitude: f64, longitude: f64) -> std::result::Result<Option<String>, String> {
            self.calls.lock().await.push((latitude, longitude));
            self.called_at.lock().await.push(Instant::now());
            self.answers
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err("no scripted answer".to_string()))
        }
    }

    fn quick_policy(max_attempts: u32) -> GeocodingPolicy {
        GeocodingPolicy {
            rate_limit: Duration::ZERO,
            backoff: Duration::ZERO,
            max_attempts,
        }
    }

    fn paced_policy(max_attempts: u32) -> GeocodingPolicy {
        GeocodingPolicy {
            rate_limit: Duration::from_millis(300),
            backoff: Duration::from_secs(1),
            max_attempts,
        }
    }

    fn key() -> LocationKey {
        LocationKey::from_coordinates(50.8, 6.1)
    }

    #[test]
    fn test_parse_address_uses_last_three_parts() {
        let loc = parse_address(key(), "Soers, Aachen, Nordrhein-Westfalen, Deutschland").unwrap();
        assert_eq!(loc.city.as_deref(), Some("Aachen"));
        assert_eq!(loc.state.as_deref(), Some("Nordrhein-Westfalen"));
        assert_eq!(loc.country.as_deref(), Some("Deutschland"));
        assert_eq!(loc.latitude, 50.8);
        assert_eq!(loc.longitude, 6.1);
    }

    #[test]
    fn test_parse_short_and_blank_addresses() {
        let short = parse_address(key(), "Nordsee, Deutschland").unwrap();
        assert_eq!(short.city, None);
        assert_eq!(short.state, None);
        assert_eq!(short.country, None);

        let gaps = parse_address(key(), "Aachen, , Deutschland").unwrap();
        assert_eq!(gaps.city.as_deref(), Some("Aachen"));
        assert_eq!(gaps.state, None);

        assert!(parse_address(key(), "   ").is_none());
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let geocoder = ScriptedGeocoder::new(vec![Ok(Some("Soers, Aachen, NRW, Deutschland".into()))]);
        let mut resolver = LocationResolver::new(geocoder.clone(), quick_policy(3), CancellationToken::new());

        let first = resolver.resolve(key()).await.unwrap().unwrap();
        let second = resolver.resolve(key()).await.unwrap().unwrap();

        assert_eq!(first.city, second.city);
        assert_eq!(geocoder.calls.lock().await.len(), 1);
        assert_eq!(resolver.stats().cache_hits, 1);
        assert_eq!(resolver.stats().cache_misses, 1);
    }

    #[tokio::test]
    async fn test_absent_address_is_cached_too() {
        let geocoder = ScriptedGeocoder::new(vec![Ok(None)]);
        let mut resolver = LocationResolver::new(geocoder.clone(), quick_policy(3), CancellationToken::new());

        assert!(resolver.resolve(key()).await.unwrap().is_none());
        assert!(resolver.resolve(key()).await.unwrap().is_none());
        assert_eq!(geocoder.calls.lock().await.len(), 1);
        assert_eq!(resolver.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_retried_and_not_cached() {
        let geocoder = ScriptedGeocoder::new(vec![
            Err("429 Too Many Requests".into()),
            Err("timeout".into()),
            Ok(Some("Aachen, NRW, Deutschland".into())),
        ]);
        let mut resolver = LocationResolver::new(geocoder.clone(), quick_policy(5), CancellationToken::new());

        let loc = resolver.resolve(key()).await.unwrap().unwrap();
        assert_eq!(loc.city.as_deref(), Some("Aachen"));
        assert_eq!(geocoder.calls.lock().await.len(), 3);
        assert_eq!(resolver.stats().geocode_failures, 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let geocoder = ScriptedGeocoder::new(vec![]);
        let mut resolver = LocationResolver::new(geocoder.clone(), quick_policy(3), CancellationToken::new());

        let err = resolver.resolve(key()).await.unwrap_err();
        assert!(matches!(err, EtlError::GeocodingExhausted { attempts: 3, .. }));
        assert_eq!(geocoder.calls.lock().await.len(), 3);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_calling() {
        let geocoder = ScriptedGeocoder::new(vec![Ok(Some("Aachen, NRW, Deutschland".into()))]);
        let cancel = CancellationToken::new();
        let mut resolver = LocationResolver::new(geocoder.clone(), quick_policy(3), cancel.clone());

        cancel.cancel();
        let err = resolver.resolve(key()).await.unwrap_err();
        assert!(matches!(err, EtlError::Cancelled));
        assert!(geocoder.calls.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_call_waits_for_the_rate_limit() {
        let geocoder = ScriptedGeocoder::new(vec![
            Ok(Some("Aachen, NRW, Deutschland".into())),
            Ok(Some("Ensisheim, Grand Est, France".into())),
        ]);
        let mut resolver = LocationResolver::new(geocoder.clone(), paced_policy(3), CancellationToken::new());
        let started = Instant::now();

        resolver.resolve(key()).await.unwrap();
        resolver.resolve(LocationKey::from_coordinates(47.9, 7.4)).await.unwrap();

        let called_at = geocoder.called_at.lock().await;
        assert_eq!(called_at.len(), 2);
        assert!(called_at[0] - started >= Duration::from_millis(300));
        assert!(called_at[1] - called_at[0] >= Duration::from_millis(300));

        // Cache hits are not paced
        let before_hit = Instant::now();
        resolver.resolve(key()).await.unwrap();
        assert_eq!(Instant::now(), before_hit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempts_back_off_before_retrying() {
        let geocoder = ScriptedGeocoder::new(vec![
            Err("timeout".into()),
            Err("timeout".into()),
            Ok(Some("Aachen, NRW, Deutschland".into())),
        ]);
        let mut resolver = LocationResolver::new(geocoder.clone(), paced_policy(5), CancellationToken::new());
        let started = Instant::now();

        resolver.resolve(key()).await.unwrap();

        let called_at = geocoder.called_at.lock().await;
        assert_eq!(called_at.len(), 3);
        // backoff plus the rate limit between consecutive attempts
        let gap = Duration::from_millis(1300);
        assert!(called_at[1] - called_at[0] >= gap);
        assert!(called_at[2] - called_at[1] >= gap);
        assert!(called_at[2] - started >= Duration::from_millis(2900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_a_pending_backoff() {
        let geocoder = ScriptedGeocoder::new(vec![
            Err("503 Service Unavailable".into()),
            Ok(Some("Aachen, NRW, Deutschland".into())),
        ]);
        let cancel = CancellationToken::new();
        let policy = GeocodingPolicy {
            rate_limit: Duration::ZERO,
            backoff: Duration::from_secs(60),
            max_attempts: 3,
        };
        let mut resolver = LocationResolver::new(geocoder.clone(), policy, cancel.clone());
        let started = Instant::now();

        let interrupt = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(resolver.resolve(key()), interrupt);

        assert!(matches!(result, Err(EtlError::Cancelled)));
        assert_eq!(geocoder.calls.lock().await.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(resolver.cache().is_empty());
    }
}
