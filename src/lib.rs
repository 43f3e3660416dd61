#![deny(warnings, clippy::all, clippy::pedantic)]
#![allow(
    // Acceptable for trait naming consistency (e.g., StoreAdapter, RedisStore)
    clippy::module_name_repetitions,

    // Required for the Jaccard estimator: usize → f64 ratio of equal components
    clippy::cast_precision_loss,

    // Necessary for hash reduction into bucket space and signature indexing
    clippy::cast_possible_truncation,

    // Technical identifiers (e.g., xxH3, LSH, MinHash) don't need markdown formatting
    clippy::doc_markdown,

    // Too noisy: many adapter/index methods return values not every caller consumes
    clippy::must_use_candidate
)]

pub mod config;
pub mod observability;
pub mod pipeline;
pub mod store;
pub(crate) mod util;
