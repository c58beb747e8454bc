//! Extraction coordinator.
//!
//! Splits `[0, upper_bound)` into contiguous sub-ranges, one tokio task per
//! sub-range. Each worker pages through its range and publishes pages (or its
//! failure) over a channel to the single aggregator in [`ExtractionCoordinator::run`].

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::app::ports::PageSource;
use crate::constants::{EXTRACTION_UPPER_BOUND, EXTRACTION_WORKERS, PAGE_SIZE};
use crate::metrics::ExtractionMetrics;
use crate::types::{FailedRange, RawRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionPlan {
    pub upper_bound: u64,
    pub workers: usize,
    pub page_size: u64,
}

impl Default for ExtractionPlan {
    fn default() -> Self {
        Self {
            upper_bound: EXTRACTION_UPPER_BOUND,
            workers: EXTRACTION_WORKERS,
            page_size: PAGE_SIZE,
        }
    }
}

/// Offsets `[start, end)` owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRange {
    pub start: u64,
    pub end: u64,
}

impl From<SubRange> for FailedRange {
    fn from(range: SubRange) -> Self {
        FailedRange {
            start_offset: range.start,
            end_offset: range.end,
        }
    }
}

/// Splits `[0, upper_bound)` into at most `workers` contiguous, disjoint, non-empty ranges.
pub fn partition(upper_bound: u64, workers: usize) -> Vec<SubRange> {
    let workers = workers.max(1) as u64;
    let chunk = upper_bound.div_ceil(workers).max(1);
    (0..workers)
        .map(|i| SubRange {
            start: i * chunk,
            end: ((i + 1) * chunk).min(upper_bound),
        })
        .filter(|r| r.start < r.end)
        .collect()
}

#[derive(Debug)]
enum WorkerEvent {
    Page {
        offset: u64,
        records: Vec<RawRecord>,
        duration_secs: f64,
    },
    Failed {
        range: SubRange,
        offset: u64,
        error: String,
    },
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Every record from every successful page, in arrival order
    pub records: Vec<RawRecord>,
    /// Sorted by start offset
    pub failed_ranges: Vec<FailedRange>,
    pub pages_fetched: usize,
}

impl ExtractionReport {
    pub fn is_complete(&self) -> bool {
        self.failed_ranges.is_empty()
    }
}

pub struct ExtractionCoordinator {
    source: Arc<dyn PageSource>,
    plan: ExtractionPlan,
}

impl ExtractionCoordinator {
    pub fn new(source: Arc<dyn PageSource>, plan: ExtractionPlan) -> Self {
        Self { source, plan }
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> ExtractionReport {
        let started = Instant::now();
        let ranges = partition(self.plan.upper_bound, self.plan.workers);
        info!("📡 Extracting with {} workers over {} offsets", ranges.len(), self.plan.upper_bound);

        let (tx, mut rx) = mpsc::channel(ranges.len().max(1) * 2);
        let mut handles = Vec::with_capacity(ranges.len());
        for range in ranges {
            let worker = tokio::spawn(run_worker(
                Arc::clone(&self.source),
                range,
                self.plan.page_size,
                tx.clone(),
            ));
            handles.push((range, worker));
        }
        // Only the workers hold senders now; the loop below ends when all of them finish
        drop(tx);

        let mut report = ExtractionReport::default();
        while let Some(event) = rx.recv().await {
            match event {
                WorkerEvent::Page { offset, records, duration_secs } => {
                    debug!("Merged {} records from offset {}", records.len(), offset);
                    ExtractionMetrics::record_page(records.len(), duration_secs);
                    report.pages_fetched += 1;
                    report.records.extend(records);
                }
                WorkerEvent::Failed { range, offset, error } => {
                    error!(
                        "Error in range ({}, {}) at offset {}: {}",
                        range.start, range.end, offset, error
                    );
                    ExtractionMetrics::record_failed_range();
                    report.failed_ranges.push(range.into());
                }
            }
        }

        // A worker that panicked never reported; its whole range counts as failed
        for (range, handle) in handles {
            if let Err(e) = handle.await {
                error!("Worker for range ({}, {}) aborted: {}", range.start, range.end, e);
                ExtractionMetrics::record_failed_range();
                report.failed_ranges.push(range.into());
            }
        }
        report.failed_ranges.sort();
        report.failed_ranges.dedup();

        ExtractionMetrics::record_run(started.elapsed().as_secs_f64());
        if report.is_complete() {
            info!(
                "✅ Extraction completed: {} records in {} pages",
                report.records.len(),
                report.pages_fetched
            );
        } else {
            warn!(
                "One or more workers failed: {} failed ranges, {} records recovered",
                report.failed_ranges.len(),
                report.records.len()
            );
        }
        report
    }
}

async fn run_worker(
    source: Arc<dyn PageSource>,
    range: SubRange,
    page_size: u64,
    tx: mpsc::Sender<WorkerEvent>,
) {
    let mut offset = range.start;
    while offset < range.end {
        // Never read past the range end, so neighbouring workers do not overlap
        let limit = page_size.min(range.end - offset);
        info!("Recovering {} raw records from offset = {}", limit, offset);

        let started = Instant::now();
        let event = match source.fetch_page(offset, limit).await {
            Ok(records) if records.is_empty() => {
                debug!("No records at offset {}; range ({}, {}) exhausted", offset, range.start, range.end);
                return;
            }
            Ok(records) => WorkerEvent::Page {
                offset,
                records,
                duration_secs: started.elapsed().as_secs_f64(),
            },
            Err(error) => {
                let _ = tx.send(WorkerEvent::Failed { range, offset, error }).await;
                return;
            }
        };
        if tx.send(event).await.is_err() {
            return;
        }
        offset += limit;
    }
}
