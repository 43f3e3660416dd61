//! Jaccard verifier: for each candidate pair within a cell, decides
//! whether it is a duplicate and persists the decision.

use thiserror::Error;
use tracing::debug;

use crate::store::{DuplicatePair, IndexError, JaccardRecord, SimilarityIndex};

use super::minhash::estimate_jaccard;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl VerifierError {
    #[must_use]
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(self, Self::Index(error) if error.is_fatal())
    }
}

/// Counts produced by verifying one candidate cell, aggregated by the
/// driver into the end-of-run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyCounters {
    pub pairs_considered: u64,
    pub pairs_memoized_skipped: u64,
    pub jaccard_computed: u64,
    pub duplicates_written: u64,
}

impl VerifyCounters {
    fn merge(&mut self, other: Self) {
        self.pairs_considered += other.pairs_considered;
        self.pairs_memoized_skipped += other.pairs_memoized_skipped;
        self.jaccard_computed += other.jaccard_computed;
        self.duplicates_written += other.duplicates_written;
    }
}

/// Verify every unordered pair within `ids`, a single cell's posting list.
///
/// # Errors
/// Returns `VerifierError::Index` if the underlying store is unavailable.
/// `MissingRecord` for an individual pair is not propagated — the pair is
/// silently skipped per §7's `MissingRecord` propagation policy.
pub fn verify_cell(
    index: &SimilarityIndex<'_>,
    log_debug: bool,
    time_window_secs: i64,
    duplicate_threshold: f64,
    ids: &[String],
) -> Result<VerifyCounters, VerifierError> {
    let mut counters = VerifyCounters::default();

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            counters.pairs_considered += 1;
            match verify_pair(
                index,
                log_debug,
                time_window_secs,
                duplicate_threshold,
                &ids[i],
                &ids[j],
            ) {
                Ok(pair_counters) => counters.merge(pair_counters),
                Err(IndexError::MissingRecord(id)) => {
                    debug!(id, "skipping pair with missing record");
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    Ok(counters)
}

fn verify_pair(
    index: &SimilarityIndex<'_>,
    log_debug: bool,
    time_window_secs: i64,
    duplicate_threshold: f64,
    x: &str,
    y: &str,
) -> Result<VerifyCounters, IndexError> {
    let timestamp_x = index.get_timestamp(x)?;
    let timestamp_y = index.get_timestamp(y)?;

    let (later, earlier, timestamp_later, timestamp_earlier) = order_pair(
        x,
        timestamp_x,
        y,
        timestamp_y,
    );

    let mut counters = VerifyCounters::default();

    if index.has_jaccard(later, earlier)? {
        counters.pairs_memoized_skipped += 1;
        return Ok(counters);
    }

    if (timestamp_later - timestamp_earlier).abs() > time_window_secs {
        if log_debug {
            debug!(later, earlier, "pair outside time window, skipping");
        }
        return Ok(counters);
    }

    let signature_later = index.get_signature(later)?;
    let signature_earlier = index.get_signature(earlier)?;
    let similarity = estimate_jaccard(&signature_later, &signature_earlier);
    counters.jaccard_computed += 1;

    index.put_jaccard(later, earlier, JaccardRecord { similarity })?;

    if log_debug {
        debug!(later, earlier, similarity, "jaccard computed");
    }

    if similarity > duplicate_threshold {
        index.put_duplicate(&DuplicatePair {
            later_id: later.to_string(),
            earlier_id: earlier.to_string(),
            similarity,
        })?;
        counters.duplicates_written += 1;
    }

    Ok(counters)
}

/// Determine `(later, earlier)` by timestamp, breaking ties by
/// lexicographically greater id.
fn order_pair<'a>(
    x: &'a str,
    timestamp_x: i64,
    y: &'a str,
    timestamp_y: i64,
) -> (&'a str, &'a str, i64, i64) {
    match timestamp_x.cmp(&timestamp_y) {
        std::cmp::Ordering::Greater => (x, y, timestamp_x, timestamp_y),
        std::cmp::Ordering::Less => (y, x, timestamp_y, timestamp_x),
        std::cmp::Ordering::Equal => {
            if x >= y {
                (x, y, timestamp_x, timestamp_y)
            } else {
                (y, x, timestamp_y, timestamp_x)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn setup(
        index: &SimilarityIndex<'_>,
        id: &str,
        tokens_signature: &[u64],
        timestamp: i64,
    ) {
        index
            .put_article(id, tokens_signature, &[1], timestamp, "headline", &["T".to_string()])
            .unwrap();
    }

    #[test]
    fn identical_signatures_are_duplicates() {
        let store = InMemoryStore::new();
        let index = SimilarityIndex::new(&store);
        setup(&index, "a1", &[1, 2, 3, 4], 1000);
        setup(&index, "a2", &[1, 2, 3, 4], 1001);

        let counters = verify_cell(
            &index,
            false,
            86_400,
            0.8,
            &["a1".to_string(), "a2".to_string()],
        )
        .unwrap();

        assert_eq!(counters.pairs_considered, 1);
        assert_eq!(counters.duplicates_written, 1);
        assert!(index.has_jaccard("a2", "a1").unwrap());
    }

    #[test]
    fn disjoint_signatures_are_not_duplicates() {
        let store = InMemoryStore::new();
        let index = SimilarityIndex::new(&store);
        setup(&index, "a3", &[1, 2, 3], 1000);
        setup(&index, "a4", &[4, 5, 6], 1002);

        let counters = verify_cell(
            &index,
            false,
            86_400,
            0.8,
            &["a3".to_string(), "a4".to_string()],
        )
        .unwrap();

        assert_eq!(counters.duplicates_written, 0);
        assert!(index.has_jaccard("a4", "a3").unwrap());
    }

    #[test]
    fn pairs_outside_time_window_are_skipped_without_recording() {
        let store = InMemoryStore::new();
        let index = SimilarityIndex::new(&store);
        setup(&index, "a5", &[1, 2, 3, 4], 0);
        setup(&index, "a6", &[1, 2, 3, 4], 86_405);

        let counters = verify_cell(
            &index,
            false,
            86_400,
            0.8,
            &["a5".to_string(), "a6".to_string()],
        )
        .unwrap();

        assert_eq!(counters.jaccard_computed, 0);
        assert_eq!(counters.duplicates_written, 0);
        assert!(!index.has_jaccard("a6", "a5").unwrap());
    }

    #[test]
    fn memoized_pairs_are_skipped() {
        let store = InMemoryStore::new();
        let index = SimilarityIndex::new(&store);
        setup(&index, "a7", &[1, 2, 3, 4], 1000);
        setup(&index, "a8", &[1, 2, 3, 4], 1001);
        index
            .put_jaccard("a8", "a7", JaccardRecord { similarity: 0.9 })
            .unwrap();

        let counters = verify_cell(
            &index,
            false,
            86_400,
            0.8,
            &["a7".to_string(), "a8".to_string()],
        )
        .unwrap();

        assert_eq!(counters.pairs_memoized_skipped, 1);
        assert_eq!(counters.jaccard_computed, 0);
        assert_eq!(index.get_jaccard("a8", "a7").unwrap(), Some(0.9));
    }

    #[test]
    fn threshold_is_strict_greater_than() {
        let store = InMemoryStore::new();
        let index = SimilarityIndex::new(&store);
        setup(&index, "a1", &[1, 2, 3, 4], 1000);
        setup(&index, "a2", &[1, 2, 5, 6], 1001);

        let counters = verify_cell(
            &index,
            false,
            86_400,
            0.5,
            &["a1".to_string(), "a2".to_string()],
        )
        .unwrap();

        assert_eq!(counters.duplicates_written, 0);
    }

    #[test]
    fn lex_id_tiebreaks_equal_timestamps() {
        let store = InMemoryStore::new();
        let index = SimilarityIndex::new(&store);
        setup(&index, "a_low", &[1, 2, 3, 4], 1000);
        setup(&index, "b_high", &[1, 2, 3, 4], 1000);

        verify_cell(
            &index,
            false,
            86_400,
            0.8,
            &["a_low".to_string(), "b_high".to_string()],
        )
        .unwrap();

        assert!(index.has_jaccard("b_high", "a_low").unwrap());
        assert!(!index.has_jaccard("a_low", "b_high").unwrap());
    }
}
