//! Entities and key-layout constants for the persistence adapter.
//!
//! The key prefixes below are a stable wire contract: external tooling and
//! the original batch pipeline this crate replaces both read these same
//! key shapes, so they are not free to rename.

/// Hash key holding a single article's durable record: `news:<id>`.
pub const ARTICLE_KEY_PREFIX: &str = "news:";
/// Set key holding every article id carrying a given tag: `lsh:<tag>`.
pub const TAG_POSTING_KEY_PREFIX: &str = "lsh:";
/// Set key holding every currently-populated `lsh:<tag>` key.
pub const TAG_INDEX_KEY: &str = "lsh_keys";
/// Hash key holding memoized Jaccard estimates for a later id: `jacc_sim:<later_id>`.
pub const JACCARD_KEY_PREFIX: &str = "jacc_sim:";
/// Hash key holding confirmed duplicate pairs for a later id: `dup_cand:<later_id>`.
pub const DUPLICATE_KEY_PREFIX: &str = "dup_cand:";
/// Hash key holding the persisted `SignatureParameters`.
pub const PARAMETERS_KEY: &str = "params";

#[must_use]
pub fn article_key(id: &str) -> String {
    format!("{ARTICLE_KEY_PREFIX}{id}")
}

#[must_use]
pub fn tag_posting_key(tag: &str) -> String {
    format!("{TAG_POSTING_KEY_PREFIX}{tag}")
}

#[must_use]
pub fn jaccard_key(later_id: &str) -> String {
    format!("{JACCARD_KEY_PREFIX}{later_id}")
}

#[must_use]
pub fn duplicate_key(later_id: &str) -> String {
    format!("{DUPLICATE_KEY_PREFIX}{later_id}")
}

/// A fully-signed, durable article record as stored under `news:<id>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub id: String,
    pub signature: Vec<u64>,
    pub bands: Vec<u64>,
    pub timestamp: i64,
    pub headline: String,
    pub tags: Vec<String>,
}

/// A memoized Jaccard estimate for one ordered pair, keyed by the later id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JaccardRecord {
    pub similarity: f64,
}

/// A confirmed near-duplicate pair: `(later_id, earlier_id, similarity)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatePair {
    pub later_id: String,
    pub earlier_id: String,
    pub similarity: f64,
}

/// Join a sequence of integers as a comma-separated string, matching the
/// original pipeline's `','.join(str(x) for x in ...)` wire format.
#[must_use]
pub fn encode_csv_u64(values: &[u64]) -> String {
    values
        .iter()
        .map(std::string::ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a comma-separated list of integers produced by [`encode_csv_u64`].
///
/// # Errors
/// Returns an error if any comma-separated field fails to parse as `u64`.
pub fn decode_csv_u64(raw: &str) -> Result<Vec<u64>, std::num::ParseIntError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(str::parse::<u64>).collect()
}

#[must_use]
pub fn encode_csv_tags(tags: &[String]) -> String {
    tags.join(",")
}

#[must_use]
pub fn decode_csv_tags(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(',').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_round_trips_integers() {
        let values = vec![1, 2, 3, u64::MAX];
        let encoded = encode_csv_u64(&values);
        assert_eq!(decode_csv_u64(&encoded).unwrap(), values);
    }

    #[test]
    fn csv_round_trips_empty() {
        assert_eq!(decode_csv_u64("").unwrap(), Vec::<u64>::new());
        assert_eq!(encode_csv_u64(&[]), "");
    }

    #[test]
    fn csv_round_trips_tags() {
        let tags = vec!["ai".to_string(), "tech".to_string()];
        let encoded = encode_csv_tags(&tags);
        assert_eq!(decode_csv_tags(&encoded), tags);
    }

    #[test]
    fn key_helpers_apply_fixed_prefixes() {
        assert_eq!(article_key("a1"), "news:a1");
        assert_eq!(tag_posting_key("ai"), "lsh:ai");
        assert_eq!(jaccard_key("a2"), "jacc_sim:a2");
        assert_eq!(duplicate_key("a2"), "dup_cand:a2");
    }
}
