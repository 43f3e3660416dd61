//! Batch driver: orchestrates end-to-end batch duplicate detection —
//! signing and indexing the article stream, then generating and verifying
//! candidates tag by tag.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

use crate::observability::metrics::Metrics;
use crate::store::{IndexError, SimilarityIndex};

use super::candidates::{CandidatesError, generate_candidates};
use super::lsh::{self, BanderError};
use super::minhash::{self, SignerError};
use super::params::{ParameterError, Parameters, load_or_init};
use super::verify::{VerifierError, VerifyCounters, verify_cell};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Candidates(#[from] CandidatesError),
    #[error("{0} partition(s) failed after exhausting retries")]
    PartitionsFailed(usize),
    #[error("aborting batch: a candidate cell hit a fatal adapter error")]
    AdapterFatal(#[source] VerifierError),
}

/// A preprocessed article as consumed at ingest (§6's external interface).
/// Unknown upstream fields are simply not represented here.
#[derive(Debug, Clone)]
pub struct IngestArticle {
    pub id: String,
    pub headline: String,
    pub timestamp: i64,
    pub tags: Vec<String>,
    pub tokens: Vec<String>,
}

/// End-of-run counts reported by the driver, matching §7's user-visible
/// behavior requirement that every drop be counted and logged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriverReport {
    pub articles_ingested: u64,
    pub articles_skipped: u64,
    pub tags_processed: u64,
    pub tags_skipped_singleton: u64,
    pub pairs_considered: u64,
    pub pairs_memoized_skipped: u64,
    pub jaccard_computed: u64,
    pub duplicates_written: u64,
    pub partitions_failed: u64,
    pub wall_time: std::time::Duration,
}

/// Configuration the driver needs that isn't already captured by `Parameters`.
#[derive(Debug, Clone, Copy)]
pub struct DriverOptions {
    pub time_window_secs: i64,
    pub duplicate_threshold: f64,
    pub log_debug: bool,
    pub parameter_seed: u64,
}

/// Run one full batch: load/init parameters, ingest articles, then generate
/// and verify candidates tag by tag.
///
/// # Errors
/// Returns `DriverError::Parameter` (specifically `ParameterMismatch`)
/// before any write occurs if persisted and configured parameters disagree.
/// Returns `DriverError::PartitionsFailed` if any candidate cell exhausted
/// its retries; sibling cells still complete. Returns `DriverError::AdapterFatal`
/// immediately after the current tag if a cell observed a fatal adapter
/// error (e.g. authentication failure) rather than continuing to burn
/// retries against every remaining cell.
pub fn run_batch(
    index: &SimilarityIndex<'_>,
    metrics: &Metrics,
    options: DriverOptions,
    config_k: usize,
    config_b: usize,
    config_r: usize,
    config_m: u64,
    articles: impl IntoIterator<Item = IngestArticle>,
) -> Result<DriverReport, DriverError> {
    let start = Instant::now();

    let parameters = load_or_init(
        index,
        config_k,
        config_b,
        config_r,
        config_m,
        options.parameter_seed,
    )?;

    let (articles_ingested, articles_skipped) = ingest(index, metrics, &parameters, articles)?;

    let tags = index.list_tags()?;
    let mut report = DriverReport {
        articles_ingested,
        articles_skipped,
        wall_time: std::time::Duration::default(),
        ..DriverReport::default()
    };

    for tag in tags {
        let posting_size = index.posting_size(&tag)?;
        if posting_size < 2 {
            report.tags_skipped_singleton += 1;
            metrics.tags_skipped_singleton.inc();
            continue;
        }

        report.tags_processed += 1;
        metrics.tags_processed.inc();

        let cells = generate_candidates(index, &tag)?;
        let (counters, partition_failures, fatal) = verify_cells_parallel(index, options, &cells);

        report.pairs_considered += counters.pairs_considered;
        report.pairs_memoized_skipped += counters.pairs_memoized_skipped;
        report.jaccard_computed += counters.jaccard_computed;
        report.duplicates_written += counters.duplicates_written;
        report.partitions_failed += partition_failures;

        if let Some(error) = fatal {
            return Err(DriverError::AdapterFatal(error));
        }
    }

    report.wall_time = start.elapsed();
    metrics.batch_duration.observe(report.wall_time.as_secs_f64());

    info!(
        articles_ingested = report.articles_ingested,
        articles_skipped = report.articles_skipped,
        tags_processed = report.tags_processed,
        pairs_considered = report.pairs_considered,
        duplicates_written = report.duplicates_written,
        partitions_failed = report.partitions_failed,
        wall_time_secs = report.wall_time.as_secs_f64(),
        "batch run complete"
    );

    if report.partitions_failed > 0 {
        return Err(DriverError::PartitionsFailed(
            usize::try_from(report.partitions_failed).unwrap_or(usize::MAX),
        ));
    }

    Ok(report)
}

fn ingest(
    index: &SimilarityIndex<'_>,
    metrics: &Metrics,
    parameters: &Parameters,
    articles: impl IntoIterator<Item = IngestArticle>,
) -> Result<(u64, u64), DriverError> {
    let start = Instant::now();
    let articles: Vec<IngestArticle> = articles.into_iter().collect();

    let ingested = AtomicU64::new(0);
    let skipped = AtomicU64::new(0);

    let failures: Vec<IndexError> = articles
        .into_par_iter()
        .filter_map(|article| {
            match sign_and_upsert(index, parameters, &article) {
                Ok(()) => {
                    ingested.fetch_add(1, Ordering::Relaxed);
                    metrics.articles_ingested.inc();
                    None
                }
                Err(IngestOutcome::Skipped) => {
                    skipped.fetch_add(1, Ordering::Relaxed);
                    metrics.articles_skipped.inc();
                    None
                }
                Err(IngestOutcome::Failed(error)) => Some(error),
            }
        })
        .collect();

    metrics
        .ingest_duration
        .observe(start.elapsed().as_secs_f64());

    if let Some(first) = failures.into_iter().next() {
        return Err(first.into());
    }

    Ok((
        ingested.load(Ordering::Relaxed),
        skipped.load(Ordering::Relaxed),
    ))
}

enum IngestOutcome {
    Skipped,
    Failed(IndexError),
}

fn sign_and_upsert(
    index: &SimilarityIndex<'_>,
    parameters: &Parameters,
    article: &IngestArticle,
) -> Result<(), IngestOutcome> {
    if article.tokens.is_empty() {
        warn!(id = article.id.as_str(), "dropping article with empty token set");
        return Err(IngestOutcome::Skipped);
    }

    let signature = match minhash::sign(
        &parameters.signer,
        article.tokens.iter().map(String::as_str),
    ) {
        Ok(signature) => signature,
        Err(SignerError::EmptyInput) => {
            warn!(id = article.id.as_str(), "dropping article with empty token set");
            return Err(IngestOutcome::Skipped);
        }
    };

    let bands = match lsh::band(parameters.bands, &signature) {
        Ok(bands) => bands,
        Err(BanderError::BadSignatureLength { .. }) => {
            unreachable!("signer always produces a signature of configured length K")
        }
    };

    index
        .put_article(
            &article.id,
            &signature,
            &bands,
            article.timestamp,
            &article.headline,
            &article.tags,
        )
        .map_err(IngestOutcome::Failed)
}

/// Verify every cell in parallel. Returns the aggregated counters, the
/// number of cells that failed after exhausting adapter retries, and the
/// first fatal error observed, if any — a fatal adapter error (e.g.
/// authentication failure) means every other cell in this tag would fail
/// the same way, so the caller aborts the whole driver rather than
/// recording N more identical partition failures.
fn verify_cells_parallel(
    index: &SimilarityIndex<'_>,
    options: DriverOptions,
    cells: &[super::candidates::CandidateCell],
) -> (VerifyCounters, u64, Option<VerifierError>) {
    let results: Vec<Result<VerifyCounters, VerifierError>> = cells
        .par_iter()
        .map(|cell| {
            verify_cell(
                index,
                options.log_debug,
                options.time_window_secs,
                options.duplicate_threshold,
                &cell.ids,
            )
        })
        .collect();

    let mut total = VerifyCounters::default();
    let mut failed = 0u64;
    let mut fatal = None;
    for result in results {
        match result {
            Ok(counters) => {
                total.pairs_considered += counters.pairs_considered;
                total.pairs_memoized_skipped += counters.pairs_memoized_skipped;
                total.jaccard_computed += counters.jaccard_computed;
                total.duplicates_written += counters.duplicates_written;
            }
            Err(error) => {
                warn!(%error, "candidate cell failed verification, skipping partition");
                failed += 1;
                if error.is_fatal() && fatal.is_none() {
                    fatal = Some(error);
                }
            }
        }
    }

    (total, failed, fatal)
}
