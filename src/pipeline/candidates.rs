//! Candidate generator: for a tag, groups article ids sharing a
//! `(band, bucket)` cell and emits the resulting posting lists as
//! candidate cells for the verifier.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::warn;

use crate::store::{IndexError, SimilarityIndex};

/// Most cells hold a handful of colliding ids; inline up to 4 before
/// spilling to the heap, matching the teacher's bucket-map sizing for the
/// same band/bucket -> ids shape.
type CellIds = SmallVec<[String; 4]>;

#[derive(Debug, Error)]
pub enum CandidatesError {
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// The article ids that collided in one `(band_index, bucket)` cell.
/// Always has at least 2 members — singleton cells are dropped before
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateCell {
    pub band_index: usize,
    pub bucket: u64,
    pub ids: Vec<String>,
}

/// Group every id under `tag` by shared `(band_index, bucket)` cells,
/// dropping singleton cells.
///
/// Ids whose `ArticleRecord` is missing a bands vector are skipped with a
/// warning rather than failing the whole tag, per §4.4: a partial write is
/// tolerated, not treated as corruption.
///
/// # Errors
/// Returns `CandidatesError::Index` if the underlying store is unavailable.
pub fn generate_candidates(
    index: &SimilarityIndex<'_>,
    tag: &str,
) -> Result<Vec<CandidateCell>, CandidatesError> {
    let ids = index.iter_ids(tag)?;
    let mut cells: FxHashMap<(usize, u64), CellIds> = FxHashMap::default();

    for id in ids {
        let bands = match index.get_bands(&id) {
            Ok(bands) => bands,
            Err(IndexError::MissingRecord(_)) => {
                warn!(tag, id, "skipping id with incomplete article record");
                continue;
            }
            Err(other) => return Err(other.into()),
        };

        for (band_index, bucket) in bands.into_iter().enumerate() {
            cells
                .entry((band_index, bucket))
                .or_default()
                .push(id.clone());
        }
    }

    Ok(cells
        .into_iter()
        .filter(|(_, ids)| ids.len() >= 2)
        .map(|((band_index, bucket), ids)| CandidateCell {
            band_index,
            bucket,
            ids: ids.into_vec(),
        })
        .collect())
}
