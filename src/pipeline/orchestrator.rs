use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::extraction::{ExtractionCoordinator, ExtractionPlan, ExtractionReport};
use super::processing::classify::classify;
use super::processing::clean::clean_record;
use super::processing::locate::{GeocodingPolicy, LocationResolver, LocationStats};
use super::processing::RejectReason;
use crate::app::ports::{BatchLoader, LoadReceipt, PageSource, ReverseGeocoder};
use crate::error::{EtlError, Result};
use crate::metrics::{LoadMetrics, TransformMetrics};
use crate::types::{CanonicalAggregate, DateParts, FailedRange, RawRecord};

/// Where a run currently is; logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Extracting,
    Transforming,
    BatchReady,
    Loaded,
    ExtractionFailed,
}

#[derive(Debug, Default)]
pub struct TransformReport {
    pub aggregates: Vec<CanonicalAggregate>,
    pub accepted: usize,
    pub rejected: usize,
    pub rejections: BTreeMap<&'static str, usize>,
    pub location_stats: LocationStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub extracted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub rejections: BTreeMap<&'static str, usize>,
    pub geocode_calls: u64,
    pub cache_hits: u64,
    pub rows_loaded: usize,
    pub load_target: String,
    #[serde(skip)]
    pub aggregates: Vec<CanonicalAggregate>,
}

#[derive(Debug)]
pub enum RunOutcome {
    Loaded(RunSummary),
    /// Extraction did not complete; nothing was transformed or loaded
    ExtractionFailed {
        failed_ranges: Vec<FailedRange>,
        records_recovered: usize,
    },
}

/// Extract → transform → load, wired through the three ports
pub struct PipelineOrchestrator {
    source: Arc<dyn PageSource>,
    geocoder: Arc<dyn ReverseGeocoder>,
    loader: Arc<dyn BatchLoader>,
    plan: ExtractionPlan,
    policy: GeocodingPolicy,
    cancel: CancellationToken,
}

impl PipelineOrchestrator {
    pub fn new(
        source: Arc<dyn PageSource>,
        geocoder: Arc<dyn ReverseGeocoder>,
        loader: Arc<dyn BatchLoader>,
    ) -> Self {
        Self {
            source,
            geocoder,
            loader,
            plan: ExtractionPlan::default(),
            policy: GeocodingPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_plan(mut self, plan: ExtractionPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_policy(mut self, policy: GeocodingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<RunOutcome> {
        let t_run = Instant::now();
        enter(PipelineState::Extracting);
        let extraction = self.extract().await;

        if !extraction.is_complete() {
            enter(PipelineState::ExtractionFailed);
            for range in &extraction.failed_ranges {
                error!("Failed range: {}", range);
            }
            return Ok(RunOutcome::ExtractionFailed {
                failed_ranges: extraction.failed_ranges,
                records_recovered: extraction.records.len(),
            });
        }

        enter(PipelineState::Transforming);
        let extracted = extraction.records.len();
        let transformed = self.transform(&extraction.records).await?;

        enter(PipelineState::BatchReady);
        let receipt = self.load(&transformed.aggregates).await?;

        enter(PipelineState::Loaded);
        info!(
            "🎉 Run finished in {:.1}s: {} extracted, {} accepted, {} rejected, {} rows loaded into {}",
            t_run.elapsed().as_secs_f64(),
            extracted,
            transformed.accepted,
            transformed.rejected,
            receipt.rows,
            receipt.target
        );

        Ok(RunOutcome::Loaded(RunSummary {
            extracted,
            accepted: transformed.accepted,
            rejected: transformed.rejected,
            rejections: transformed.rejections,
            geocode_calls: transformed.location_stats.geocode_calls,
            cache_hits: transformed.location_stats.cache_hits,
            rows_loaded: receipt.rows,
            load_target: receipt.target,
            aggregates: transformed.aggregates,
        }))
    }

    pub async fn extract(&self) -> ExtractionReport {
        ExtractionCoordinator::new(Arc::clone(&self.source), self.plan)
            .run()
            .await
    }

    /// Sequential transform. Rejected records are counted and skipped; only
    /// geocoding exhaustion or cancellation stop the loop.
    pub async fn transform(&self, records: &[RawRecord]) -> Result<TransformReport> {
        let mut resolver = LocationResolver::new(
            Arc::clone(&self.geocoder),
            self.policy,
            self.cancel.clone(),
        );
        let mut report = TransformReport::default();
        let total = records.len();
        let progress_every = (total / 20).max(1);

        for (i, raw) in records.iter().enumerate() {
            match transform_record(&mut resolver, raw).await? {
                Ok(aggregate) => {
                    TransformMetrics::record_accepted();
                    report.accepted += 1;
                    report.aggregates.push(aggregate);
                }
                Err(reason) => {
                    debug!("Skipping record: {}", reason);
                    TransformMetrics::record_rejected(&reason);
                    report.rejected += 1;
                    *report.rejections.entry(reason.label()).or_default() += 1;
                }
            }

            let done = i + 1;
            if done % progress_every == 0 || done == total {
                info!("Progress: {:.2}%", done as f64 / total as f64 * 100.0);
            }
        }

        report.location_stats = resolver.stats();
        info!(
            "✅ Transformed {} records ({} accepted, {} rejected, {} distinct locations)",
            total,
            report.accepted,
            report.rejected,
            resolver.cache().len()
        );
        Ok(report)
    }

    async fn load(&self, batch: &[CanonicalAggregate]) -> Result<LoadReceipt> {
        info!("💾 Loading {} aggregates", batch.len());
        let started = Instant::now();
        match self.loader.commit(batch).await {
            Ok(receipt) => {
                LoadMetrics::record_commit(receipt.rows, started.elapsed().as_secs_f64());
                Ok(receipt)
            }
            Err(message) => {
                LoadMetrics::record_failure();
                Err(EtlError::Load { message })
            }
        }
    }
}

fn enter(state: PipelineState) {
    match state {
        PipelineState::ExtractionFailed => warn!(state = ?state, "Pipeline state"),
        _ => info!(state = ?state, "Pipeline state"),
    }
}

/// Cleaning → date → classification → location for one record. The outer
/// `Result` is fatal for the run; the inner one is a per-record verdict.
async fn transform_record(
    resolver: &mut LocationResolver,
    raw: &RawRecord,
) -> Result<std::result::Result<CanonicalAggregate, RejectReason>> {
    let clean = match clean_record(raw) {
        Ok(clean) => clean,
        Err(reason) => return Ok(Err(reason)),
    };
    let Some(date) = DateParts::parse(&clean.year) else {
        return Ok(Err(RejectReason::UnparseableDate));
    };
    let Some(classification) = classify(&clean.recclass) else {
        return Ok(Err(RejectReason::Unclassifiable));
    };
    let Some(location) = resolver.resolve(clean.location_key()).await? else {
        return Ok(Err(RejectReason::NoLocation));
    };

    Ok(Ok(CanonicalAggregate {
        date,
        mass: clean.mass,
        location,
        classification,
    }))
}
