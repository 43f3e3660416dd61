//! LSH bander: projects a MinHash signature into B band-bucket hashes so
//! that two signatures collide in band `i` iff their `[i*R, (i+1)*R)` rows
//! are equal.

use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BanderError {
    #[error("signature length {actual} does not match expected K={expected}")]
    BadSignatureLength { expected: usize, actual: usize },
}

/// Band count, row width and bucket-space size. Invariant: `bands * rows == k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandParams {
    pub bands: usize,
    pub rows: usize,
    pub buckets: u64,
}

impl BandParams {
    #[must_use]
    pub fn k(self) -> usize {
        self.bands * self.rows
    }
}

/// Project `signature` into `params.bands` bucket hashes.
///
/// # Errors
/// Returns `BanderError::BadSignatureLength` if `signature.len() != params.k()`.
pub fn band(params: BandParams, signature: &[u64]) -> Result<Vec<u64>, BanderError> {
    let expected = params.k();
    if signature.len() != expected {
        return Err(BanderError::BadSignatureLength {
            expected,
            actual: signature.len(),
        });
    }

    Ok(signature
        .chunks_exact(params.rows)
        .map(|row| hash_row(row) % params.buckets.max(1))
        .collect())
}

/// Stable hash of a band's row tuple. Two equal row-tuples always hash
/// equal; unequal row-tuples collide only with negligible probability at
/// the full 64-bit range before reduction modulo the bucket space.
fn hash_row(row: &[u64]) -> u64 {
    let mut bytes = Vec::with_capacity(row.len() * 8);
    for component in row {
        bytes.extend_from_slice(&component.to_le_bytes());
    }
    xxh3_64(&bytes)
}

/// Search for a `(bands, rows)` pair whose S-curve crossover
/// `(1/bands)^(1/rows)` is nearest `threshold`, subject to `bands * rows == k`.
#[must_use]
pub fn optimal_band_params(k: usize, threshold: f64) -> (usize, usize) {
    let mut best = (1, k);
    let mut best_distance = f64::MAX;

    for rows in 1..=k {
        if k % rows != 0 {
            continue;
        }
        let bands = k / rows;
        let crossover = (1.0 / bands as f64).powf(1.0 / rows as f64);
        let distance = (crossover - threshold).abs();
        if distance < best_distance {
            best_distance = distance;
            best = (bands, rows);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BandParams {
        BandParams {
            bands: 4,
            rows: 2,
            buckets: u64::MAX,
        }
    }

    #[test]
    fn bad_signature_length_is_an_error() {
        let signature = vec![1, 2, 3];
        assert_eq!(
            band(params(), &signature),
            Err(BanderError::BadSignatureLength {
                expected: 8,
                actual: 3
            })
        );
    }

    #[test]
    fn band_count_matches_params() {
        let signature: Vec<u64> = (0..8).collect();
        let bands = band(params(), &signature).unwrap();
        assert_eq!(bands.len(), 4);
    }

    #[test]
    fn identical_signatures_collide_in_every_band() {
        let signature: Vec<u64> = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let bands_a = band(params(), &signature).unwrap();
        let bands_b = band(params(), &signature).unwrap();
        assert_eq!(bands_a, bands_b);
    }

    #[test]
    fn equal_row_implies_equal_bucket() {
        let signature_a: Vec<u64> = vec![1, 2, 9, 9, 5, 6, 7, 8];
        let signature_b: Vec<u64> = vec![10, 20, 9, 9, 50, 60, 70, 80];
        let bands_a = band(params(), &signature_a).unwrap();
        let bands_b = band(params(), &signature_b).unwrap();
        assert_eq!(bands_a[1], bands_b[1]);
    }

    #[test]
    fn banding_is_pure_function_of_signature() {
        let signature: Vec<u64> = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let first = band(params(), &signature).unwrap();
        let second = band(params(), &signature).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn optimal_band_params_respects_k_factorization() {
        let (bands, rows) = optimal_band_params(128, 0.8);
        assert_eq!(bands * rows, 128);
    }
}
