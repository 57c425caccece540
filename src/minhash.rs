//! Fixed-seed MinHash over string token sets. The engine is a process-wide singleton: its
//! parameters are fixed the first time it is touched and every signature computed afterwards uses
//! the same hash family, so ingest-time and query-time signatures stay comparable.

use std::collections::BTreeSet;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest prime below 2^32, the modulus of the universal hash family.
const HASH_PRIME: u64 = 4_294_967_291;

static ENGINE: OnceCell<MinHashEngine> = OnceCell::new();

/// Deployment-fixed MinHash parameters. Signature length and dictionary size are chosen per
/// deployment and must not change once a catalog holds signatures.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MinHashParams {
    /// Number of hash functions, and therefore the signature length. 128 or 512.
    pub signature_len: usize,

    /// Size of the token dictionary strings are folded into.
    pub dict_size: u32,

    /// Seed every hash-function coefficient is derived from.
    pub seed: u64,
}

impl Default for MinHashParams {
    fn default() -> Self {
        Self {
            signature_len: 128,
            dict_size: 50_000,
            seed: 123_456_789,
        }
    }
}

/// The MinHash engine: a family of universal hash functions with deterministically derived
/// coefficients.
pub struct MinHashEngine {
    params: MinHashParams,
    coefficients: Vec<(u64, u64)>,
}

impl MinHashEngine {
    /// Initializes the process-wide engine with explicit parameters. Must run before the first
    /// use of [MinHashEngine::global]; initializing twice with different parameters is an error
    /// because persisted signatures would silently stop being comparable.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::InvalidArgument] - The engine is already initialized with different parameters
    pub fn initialize(params: MinHashParams) -> Result<&'static MinHashEngine> {
        let engine = ENGINE.get_or_init(|| MinHashEngine::with_params(params));
        if engine.params != params {
            return Err(Error::InvalidArgument(format!(
                "MinHash engine already initialized with {:?}",
                engine.params
            )));
        }
        Ok(engine)
    }

    /// Returns the process-wide engine, initializing it with default parameters when no explicit
    /// initialization happened.
    pub fn global() -> &'static MinHashEngine {
        ENGINE.get_or_init(|| MinHashEngine::with_params(MinHashParams::default()))
    }

    fn with_params(params: MinHashParams) -> Self {
        let mut state = params.seed;
        let coefficients = (0..params.signature_len)
            .map(|_| {
                // Multipliers must be non-zero modulo the prime.
                let a = splitmix64(&mut state) % (HASH_PRIME - 1) + 1;
                let b = splitmix64(&mut state) % HASH_PRIME;
                (a, b)
            })
            .collect();
        Self { params, coefficients }
    }

    /// The parameters this deployment runs with, surfaced for the deployment manifest.
    pub fn params(&self) -> &MinHashParams {
        &self.params
    }

    /// Folds a string into its dictionary token. The hash is FNV-1a over the UTF-8 bytes; any
    /// stable 32-bit hash works here as long as ingest and query agree on it.
    pub fn token(&self, text: &str) -> u32 {
        fnv1a32(text.as_bytes()) % self.params.dict_size
    }

    /// Tokenizes a list of strings into a duplicate-free, ordered token set.
    pub fn tokens<'a>(&self, strings: impl IntoIterator<Item = &'a str>) -> BTreeSet<u32> {
        strings.into_iter().map(|text| self.token(text)).collect()
    }

    /// Computes the signature of a token set: the minimum of each hash function over all tokens.
    /// An empty set signs to the sentinel maximum in every position.
    pub fn signature(&self, tokens: &BTreeSet<u32>) -> Vec<i32> {
        self.coefficients
            .iter()
            .map(|&(a, b)| {
                tokens
                    .iter()
                    .map(|&token| ((a.wrapping_mul(token as u64).wrapping_add(b)) % HASH_PRIME) as u32)
                    .min()
                    .unwrap_or(u32::MAX) as i32
            })
            .collect()
    }

    /// Estimates the Jaccard similarity of the sets behind two signatures as the fraction of
    /// positions holding equal minima.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::InvalidArgument] - The signatures have different lengths
    pub fn similarity(&self, a: &[i32], b: &[i32]) -> Result<f64> {
        if a.len() != b.len() || a.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "signature lengths {} and {} are not comparable",
                a.len(),
                b.len()
            )));
        }
        let equal = a.iter().zip(b).filter(|(left, right)| left == right).count();
        Ok(equal as f64 / a.len() as f64)
    }
}

/// FNV-1a, 32-bit. Stable across runs and platforms.
fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811C_9DC5;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// splitmix64 step, used to derive the hash-family coefficients from the seed.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
