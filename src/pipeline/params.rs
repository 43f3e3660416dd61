//! Parameter store: holds the MinHash permutation coefficients and LSH
//! band parameters across runs, guaranteeing consistency between them.

use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;

use crate::store::{IndexError, SimilarityIndex};

use super::lsh::BandParams;
use super::minhash::{Permutation, SignerParams};

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(
        "configured parameters (K={config_k}, B={config_b}, R={config_r}) disagree with persisted parameters (K={stored_k}, B={stored_b}, R={stored_r})"
    )]
    ParameterMismatch {
        config_k: usize,
        config_b: usize,
        config_r: usize,
        stored_k: usize,
        stored_b: usize,
        stored_r: usize,
    },
    #[error("persisted parameter record at key `params` is malformed: {0}")]
    Malformed(String),
}

/// The full set of parameters signing and banding depend on: K permutation
/// coefficients plus (B, R, M).
#[derive(Debug, Clone)]
pub struct Parameters {
    pub signer: SignerParams,
    pub bands: BandParams,
}

/// Load persisted parameters if present, otherwise generate fresh ones from
/// a seedable PRNG and persist them before any signing occurs.
///
/// # Errors
/// Returns `ParameterError::ParameterMismatch` if the persisted K, B, or R
/// disagree with the configured values. Returns `ParameterError::Malformed`
/// if the persisted record cannot be parsed. Returns `ParameterError::Index`
/// if the underlying store is unavailable.
pub fn load_or_init(
    index: &SimilarityIndex<'_>,
    config_k: usize,
    config_b: usize,
    config_r: usize,
    config_m: u64,
    seed: u64,
) -> Result<Parameters, ParameterError> {
    if let Some(fields) = index.get_parameters_raw()? {
        return parse_persisted(&fields, config_k, config_b, config_r);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let signer = SignerParams::generate(config_k, &mut rng);
    let bands = BandParams {
        bands: config_b,
        rows: config_r,
        buckets: config_m,
    };

    persist(index, &signer, bands)?;

    Ok(Parameters { signer, bands })
}

fn parse_persisted(
    fields: &[(String, String)],
    config_k: usize,
    config_b: usize,
    config_r: usize,
) -> Result<Parameters, ParameterError> {
    let field = |name: &str| -> Option<&str> {
        fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    let stored_k: usize = field("K")
        .ok_or_else(|| ParameterError::Malformed("missing field K".to_string()))?
        .parse()
        .map_err(|_| ParameterError::Malformed("field K is not an integer".to_string()))?;
    let stored_b: usize = field("B")
        .ok_or_else(|| ParameterError::Malformed("missing field B".to_string()))?
        .parse()
        .map_err(|_| ParameterError::Malformed("field B is not an integer".to_string()))?;
    let stored_r: usize = field("R")
        .ok_or_else(|| ParameterError::Malformed("missing field R".to_string()))?
        .parse()
        .map_err(|_| ParameterError::Malformed("field R is not an integer".to_string()))?;
    let stored_m: u64 = field("M")
        .ok_or_else(|| ParameterError::Malformed("missing field M".to_string()))?
        .parse()
        .map_err(|_| ParameterError::Malformed("field M is not an integer".to_string()))?;
    let coefficients_raw = field("coefficients")
        .ok_or_else(|| ParameterError::Malformed("missing field coefficients".to_string()))?;

    if stored_k != config_k || stored_b != config_b || stored_r != config_r {
        return Err(ParameterError::ParameterMismatch {
            config_k,
            config_b,
            config_r,
            stored_k,
            stored_b,
            stored_r,
        });
    }

    let permutations = decode_coefficients(coefficients_raw)
        .map_err(|reason| ParameterError::Malformed(reason.to_string()))?;
    if permutations.len() != stored_k {
        return Err(ParameterError::Malformed(format!(
            "coefficients field has {} entries, expected K={stored_k}",
            permutations.len()
        )));
    }

    Ok(Parameters {
        signer: SignerParams::new(permutations),
        bands: BandParams {
            bands: stored_b,
            rows: stored_r,
            buckets: stored_m,
        },
    })
}

fn persist(
    index: &SimilarityIndex<'_>,
    signer: &SignerParams,
    bands: BandParams,
) -> Result<(), ParameterError> {
    let k = signer.k().to_string();
    let b = bands.bands.to_string();
    let r = bands.rows.to_string();
    let m = bands.buckets.to_string();
    let coefficients = encode_coefficients(signer.permutations());

    index.put_parameters_raw(&[
        ("K", k.as_str()),
        ("B", b.as_str()),
        ("R", r.as_str()),
        ("M", m.as_str()),
        ("coefficients", coefficients.as_str()),
    ])?;
    Ok(())
}

fn encode_coefficients(permutations: &[Permutation]) -> String {
    permutations
        .iter()
        .map(|p| format!("{}:{}", p.a, p.b))
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_coefficients(raw: &str) -> Result<Vec<Permutation>, &'static str> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|pair| {
            let (a, b) = pair.split_once(':').ok_or("coefficient pair missing ':'")?;
            let a = a.parse::<u64>().map_err(|_| "non-integer coefficient a")?;
            let b = b.parse::<u64>().map_err(|_| "non-integer coefficient b")?;
            Ok(Permutation { a, b })
        })
        .collect()
}
