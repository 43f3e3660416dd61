//! Similarity index: persists `ArticleRecord`s and the inverted
//! `(tag, band, bucket)` -> posting-list index on top of a [`StoreAdapter`].

use thiserror::Error;

use super::adapter::{AdapterError, StoreAdapter};
use super::model::{
    self, ArticleRecord, DuplicatePair, JaccardRecord, PARAMETERS_KEY, TAG_INDEX_KEY,
};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("no record found for id {0}")]
    MissingRecord(String),
}

impl IndexError {
    #[must_use]
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(self, Self::Adapter(error) if error.is_fatal())
    }
}

/// Persistent mapping from `(tag, band, bucket)` to posting lists of
/// article ids, and per-article durable records.
///
/// Holds a `'_`-free reference to an adapter handle so callers control the
/// connection's lifetime (one per worker, per §9's partition-scoped
/// handle guidance).
pub struct SimilarityIndex<'a> {
    adapter: &'a dyn StoreAdapter,
}

impl<'a> SimilarityIndex<'a> {
    #[must_use]
    pub fn new(adapter: &'a dyn StoreAdapter) -> Self {
        Self { adapter }
    }

    /// Upsert an article's signature, bands, timestamp and tags, and add it
    /// to the posting set for every `(tag, band)` combination it belongs to.
    ///
    /// # Errors
    /// Returns `IndexError::Adapter` if any underlying write fails.
    pub fn put_article(
        &self,
        id: &str,
        signature: &[u64],
        bands: &[u64],
        timestamp: i64,
        headline: &str,
        tags: &[String],
    ) -> Result<(), IndexError> {
        let key = model::article_key(id);
        let min_hash = model::encode_csv_u64(signature);
        let lsh_hash = model::encode_csv_u64(bands);
        let timestamp_field = timestamp.to_string();
        let tags_field = model::encode_csv_tags(tags);

        self.adapter.hash_set_multiple(
            &key,
            &[
                ("min_hash", min_hash.as_str()),
                ("lsh_hash", lsh_hash.as_str()),
                ("timestamp", timestamp_field.as_str()),
                ("headline", headline),
                ("tags", tags_field.as_str()),
            ],
        )?;

        for tag in tags {
            let tag_key = model::tag_posting_key(tag);
            self.adapter.set_add(&tag_key, id)?;
            self.adapter.set_add(TAG_INDEX_KEY, &tag_key)?;
        }

        Ok(())
    }

    /// Enumerate all tags that currently have at least one article.
    ///
    /// # Errors
    /// Returns `IndexError::Adapter` if the underlying read fails.
    pub fn list_tags(&self) -> Result<Vec<String>, IndexError> {
        let keys = self.adapter.set_members(TAG_INDEX_KEY)?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(model::TAG_POSTING_KEY_PREFIX).map(str::to_string))
            .collect())
    }

    /// Total distinct article ids under `tag`.
    ///
    /// # Errors
    /// Returns `IndexError::Adapter` if the underlying read fails.
    pub fn posting_size(&self, tag: &str) -> Result<usize, IndexError> {
        Ok(self.adapter.set_size(&model::tag_posting_key(tag))?)
    }

    /// Distinct article ids under `tag`.
    ///
    /// # Errors
    /// Returns `IndexError::Adapter` if the underlying read fails.
    pub fn iter_ids(&self, tag: &str) -> Result<Vec<String>, IndexError> {
        Ok(self.adapter.set_members(&model::tag_posting_key(tag))?)
    }

    /// The B band-bucket hashes for `id`.
    ///
    /// # Errors
    /// Returns `IndexError::MissingRecord` if `id` has no persisted record,
    /// `IndexError::Adapter` if the underlying read fails.
    pub fn get_bands(&self, id: &str) -> Result<Vec<u64>, IndexError> {
        let key = model::article_key(id);
        let raw = self
            .adapter
            .hash_get(&key, "lsh_hash")?
            .ok_or_else(|| IndexError::MissingRecord(id.to_string()))?;
        model::decode_csv_u64(&raw).map_err(|_| IndexError::MissingRecord(id.to_string()))
    }

    /// The K-length MinHash signature for `id`.
    ///
    /// # Errors
    /// Returns `IndexError::MissingRecord` if `id` has no persisted record,
    /// `IndexError::Adapter` if the underlying read fails.
    pub fn get_signature(&self, id: &str) -> Result<Vec<u64>, IndexError> {
        let key = model::article_key(id);
        let raw = self
            .adapter
            .hash_get(&key, "min_hash")?
            .ok_or_else(|| IndexError::MissingRecord(id.to_string()))?;
        model::decode_csv_u64(&raw).map_err(|_| IndexError::MissingRecord(id.to_string()))
    }

    /// The timestamp for `id`.
    ///
    /// # Errors
    /// Returns `IndexError::MissingRecord` if `id` has no persisted record
    /// or its timestamp field fails to parse, `IndexError::Adapter` if the
    /// underlying read fails.
    pub fn get_timestamp(&self, id: &str) -> Result<i64, IndexError> {
        let key = model::article_key(id);
        let raw = self
            .adapter
            .hash_get(&key, "timestamp")?
            .ok_or_else(|| IndexError::MissingRecord(id.to_string()))?;
        raw.parse::<i64>()
            .map_err(|_| IndexError::MissingRecord(id.to_string()))
    }

    /// Load the full durable record for `id`, or `None` if not present.
    ///
    /// # Errors
    /// Returns `IndexError::Adapter` if the underlying read fails.
    pub fn get_article(&self, id: &str) -> Result<Option<ArticleRecord>, IndexError> {
        let key = model::article_key(id);
        let fields = self.adapter.hash_get_all(&key)?;
        if fields.is_empty() {
            return Ok(None);
        }
        let mut min_hash = None;
        let mut lsh_hash = None;
        let mut timestamp = None;
        let mut headline = None;
        let mut tags = None;
        for (field, value) in fields {
            match field.as_str() {
                "min_hash" => min_hash = Some(value),
                "lsh_hash" => lsh_hash = Some(value),
                "timestamp" => timestamp = Some(value),
                "headline" => headline = Some(value),
                "tags" => tags = Some(value),
                _ => {}
            }
        }
        let signature = min_hash
            .and_then(|raw| model::decode_csv_u64(&raw).ok())
            .unwrap_or_default();
        let bands = lsh_hash
            .and_then(|raw| model::decode_csv_u64(&raw).ok())
            .unwrap_or_default();
        let timestamp = timestamp.and_then(|raw| raw.parse::<i64>().ok()).unwrap_or(0);
        let tags = tags.map(|raw| model::decode_csv_tags(&raw)).unwrap_or_default();
        Ok(Some(ArticleRecord {
            id: id.to_string(),
            signature,
            bands,
            timestamp,
            headline: headline.unwrap_or_default(),
            tags,
        }))
    }

    /// Has a Jaccard estimate already been memoized for `(later, earlier)`?
    ///
    /// # Errors
    /// Returns `IndexError::Adapter` if the underlying read fails.
    pub fn has_jaccard(&self, later_id: &str, earlier_id: &str) -> Result<bool, IndexError> {
        Ok(self
            .adapter
            .hash_contains(&model::jaccard_key(later_id), earlier_id)?)
    }

    /// Load the memoized Jaccard estimate for `(later, earlier)`, if any.
    ///
    /// # Errors
    /// Returns `IndexError::Adapter` if the underlying read fails.
    pub fn get_jaccard(&self, later_id: &str, earlier_id: &str) -> Result<Option<f64>, IndexError> {
        let raw = self.adapter.hash_get(&model::jaccard_key(later_id), earlier_id)?;
        Ok(raw.and_then(|value| value.parse::<f64>().ok()))
    }

    /// Memoize a Jaccard estimate under the later id's key.
    ///
    /// # Errors
    /// Returns `IndexError::Adapter` if the underlying write fails.
    pub fn put_jaccard(
        &self,
        later_id: &str,
        earlier_id: &str,
        record: JaccardRecord,
    ) -> Result<(), IndexError> {
        self.adapter.hash_set(
            &model::jaccard_key(later_id),
            earlier_id,
            &record.similarity.to_string(),
        )?;
        Ok(())
    }

    /// Persist a confirmed duplicate pair.
    ///
    /// # Errors
    /// Returns `IndexError::Adapter` if the underlying write fails.
    pub fn put_duplicate(&self, pair: &DuplicatePair) -> Result<(), IndexError> {
        self.adapter.hash_set(
            &model::duplicate_key(&pair.later_id),
            &pair.earlier_id,
            &pair.similarity.to_string(),
        )?;
        Ok(())
    }

    /// Load the persisted parameter hash's raw fields, or `None` if absent.
    ///
    /// # Errors
    /// Returns `IndexError::Adapter` if the underlying read fails.
    pub fn get_parameters_raw(&self) -> Result<Option<Vec<(String, String)>>, IndexError> {
        let fields = self.adapter.hash_get_all(PARAMETERS_KEY)?;
        if fields.is_empty() {
            Ok(None)
        } else {
            Ok(Some(fields))
        }
    }

    /// Persist the parameter hash's raw fields.
    ///
    /// # Errors
    /// Returns `IndexError::Adapter` if the underlying write fails.
    pub fn put_parameters_raw(&self, fields: &[(&str, &str)]) -> Result<(), IndexError> {
        self.adapter.hash_set_multiple(PARAMETERS_KEY, fields)?;
        Ok(())
    }
}
