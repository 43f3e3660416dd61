//! MinHash signer: maps a token multiset to a fixed-length integer
//! signature whose expected pairwise equality rate estimates Jaccard
//! similarity.
//!
//! Shingling and tokenization happen upstream; this module only ever sees
//! an already-tokenized multiset.

use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The Mersenne prime `2^61 - 1`, large enough that collisions in the
/// permutation arithmetic are negligible for realistic signature lengths.
const MERSENNE_PRIME_61: u64 = (1u64 << 61) - 1;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SignerError {
    #[error("cannot sign an empty token multiset")]
    EmptyInput,
}

/// One permutation `h_i(x) = (a_i * x + b_i) mod p`, sampled once and
/// reused for every signature computed under a given deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permutation {
    pub a: u64,
    pub b: u64,
}

impl Permutation {
    fn apply(self, x: u64) -> u64 {
        let a = u128::from(self.a);
        let b = u128::from(self.b);
        let x = u128::from(x % MERSENNE_PRIME_61);
        let p = u128::from(MERSENNE_PRIME_61);
        (((a * x) % p + b) % p) as u64
    }
}

/// The K permutation coefficients used to compute a signature. Sampled
/// once by the parameter store and never regenerated within a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerParams {
    permutations: Vec<Permutation>,
}

impl SignerParams {
    #[must_use]
    pub fn new(permutations: Vec<Permutation>) -> Self {
        Self { permutations }
    }

    /// Sample K fresh permutation coefficients from `rng`.
    ///
    /// `a_i` is drawn from `[1, p)` (zero would collapse the permutation
    /// to a constant) and `b_i` from `[0, p)`.
    #[must_use]
    pub fn generate(k: usize, rng: &mut impl rand::Rng) -> Self {
        let permutations = (0..k)
            .map(|_| Permutation {
                a: rng.random_range(1..MERSENNE_PRIME_61),
                b: rng.random_range(0..MERSENNE_PRIME_61),
            })
            .collect();
        Self { permutations }
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.permutations.len()
    }

    #[must_use]
    pub fn permutations(&self) -> &[Permutation] {
        &self.permutations
    }
}

/// A stable, non-cryptographic 64-bit hash, seeded consistently across
/// runs so signatures computed on different machines agree.
fn stable_hash(token: &str) -> u64 {
    xxh3_64(token.as_bytes())
}

/// Compute a length-K MinHash signature for a token multiset.
///
/// # Errors
/// Returns `SignerError::EmptyInput` if `tokens` yields no items.
pub fn sign<'a>(
    params: &SignerParams,
    tokens: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<u64>, SignerError> {
    let mut minima = vec![u64::MAX; params.k()];
    let mut saw_any = false;

    for token in tokens {
        saw_any = true;
        let hashed = stable_hash(token);
        for (slot, permutation) in minima.iter_mut().zip(&params.permutations) {
            let candidate = permutation.apply(hashed);
            if candidate < *slot {
                *slot = candidate;
            }
        }
    }

    if !saw_any {
        return Err(SignerError::EmptyInput);
    }

    Ok(minima)
}

/// Estimate Jaccard similarity from two equal-length signatures: the
/// fraction of indices where the components agree.
#[must_use]
pub fn estimate_jaccard(signature_a: &[u64], signature_b: &[u64]) -> f64 {
    let len = signature_a.len().min(signature_b.len());
    if len == 0 {
        return 0.0;
    }
    let equal = signature_a
        .iter()
        .zip(signature_b)
        .filter(|(a, b)| a == b)
        .count();
    equal as f64 / len as f64
}
