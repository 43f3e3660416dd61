/// Prometheus metric definitions for the batch driver.
use std::sync::Arc;

use prometheus::{
    Counter, Histogram, Registry, register_counter_with_registry, register_histogram_with_registry,
};

/// Counters and histograms surfaced by a single batch run.
///
/// Field names mirror the driver's end-of-run report: articles
/// ingested/skipped, tags processed, candidate pairs considered,
/// memoized-skips, Jaccard computations, and duplicates written.
#[derive(Debug, Clone)]
pub struct Metrics {
    pub articles_ingested: Counter,
    pub articles_skipped: Counter,
    pub tags_processed: Counter,
    pub tags_skipped_singleton: Counter,
    pub pairs_considered: Counter,
    pub pairs_memoized_skipped: Counter,
    pub jaccard_computed: Counter,
    pub duplicates_written: Counter,
    pub partitions_failed: Counter,

    pub ingest_duration: Histogram,
    pub candidate_duration: Histogram,
    pub verify_duration: Histogram,
    pub batch_duration: Histogram,
}

impl Metrics {
    /// Register all metrics against a fresh registry.
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            articles_ingested: register_counter_with_registry!(
                "newsdedup_articles_ingested_total",
                "Total number of articles signed and indexed",
                registry
            )?,
            articles_skipped: register_counter_with_registry!(
                "newsdedup_articles_skipped_total",
                "Total number of articles dropped at ingest (EmptyInput or MalformedRecord)",
                registry
            )?,
            tags_processed: register_counter_with_registry!(
                "newsdedup_tags_processed_total",
                "Total number of tags whose posting list was run through the candidate generator",
                registry
            )?,
            tags_skipped_singleton: register_counter_with_registry!(
                "newsdedup_tags_skipped_singleton_total",
                "Total number of tags skipped for having fewer than 2 articles",
                registry
            )?,
            pairs_considered: register_counter_with_registry!(
                "newsdedup_pairs_considered_total",
                "Total number of candidate pairs emitted by the candidate generator",
                registry
            )?,
            pairs_memoized_skipped: register_counter_with_registry!(
                "newsdedup_pairs_memoized_skipped_total",
                "Total number of candidate pairs skipped due to an existing jacc_sim record",
                registry
            )?,
            jaccard_computed: register_counter_with_registry!(
                "newsdedup_jaccard_computed_total",
                "Total number of Jaccard estimates actually computed",
                registry
            )?,
            duplicates_written: register_counter_with_registry!(
                "newsdedup_duplicates_written_total",
                "Total number of DuplicatePair records persisted",
                registry
            )?,
            partitions_failed: register_counter_with_registry!(
                "newsdedup_partitions_failed_total",
                "Total number of candidate-cell partitions that failed after exhausting retries",
                registry
            )?,
            ingest_duration: register_histogram_with_registry!(
                "newsdedup_ingest_duration_seconds",
                "Duration of the signing+indexing phase",
                registry
            )?,
            candidate_duration: register_histogram_with_registry!(
                "newsdedup_candidate_duration_seconds",
                "Duration of candidate generation per tag",
                registry
            )?,
            verify_duration: register_histogram_with_registry!(
                "newsdedup_verify_duration_seconds",
                "Duration of Jaccard verification per cell",
                registry
            )?,
            batch_duration: register_histogram_with_registry!(
                "newsdedup_batch_duration_seconds",
                "Duration of an entire batch run",
                registry
            )?,
        })
    }
}
