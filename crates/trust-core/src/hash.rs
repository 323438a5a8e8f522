//! Deterministic hashing over bytes, JSON payloads and numeric vectors.
//!
//! Every commitment in the ledger is produced here. The output of every
//! function is lowercase hex and depends only on the input and the
//! algorithm.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sha3::Sha3_512;
use tracing::warn;

use crate::config::HashingConfig;
use crate::error::TrustError;

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA3-512")]
    Sha3_512,
    #[serde(rename = "BLAKE3")]
    Blake3,
}

impl HashAlgorithm {
    /// Baseline algorithm used when configuration names something unknown.
    pub const BASELINE: HashAlgorithm = HashAlgorithm::Sha256;

    /// All supported algorithms.
    pub fn supported() -> &'static [HashAlgorithm] {
        &[Self::Sha256, Self::Sha3_512, Self::Blake3]
    }

    /// Canonical name, as stored in the `hash_algo` columns.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha3_512 => "SHA3-512",
            Self::Blake3 => "BLAKE3",
        }
    }

    /// Digest width in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha256 | Self::Blake3 => 32,
            Self::Sha3_512 => 64,
        }
    }

    /// Resolve a configured name, falling back to the baseline.
    ///
    /// Hashing must never be the reason ingestion fails, so an unknown name
    /// is logged and replaced instead of rejected.
    pub fn resolve(name: &str) -> Self {
        match name.parse() {
            Ok(algo) => algo,
            Err(_) => {
                warn!(
                    "Unknown hash algorithm {:?}, falling back to {}",
                    name,
                    Self::BASELINE
                );
                Self::BASELINE
            }
        }
    }

    /// Raw digest of `bytes`.
    pub fn digest(&self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(bytes).to_vec(),
            Self::Sha3_512 => Sha3_512::digest(bytes).to_vec(),
            Self::Blake3 => blake3::hash(bytes).as_bytes().to_vec(),
        }
    }

    /// Hex digest of `bytes`.
    pub fn hex_digest(&self, bytes: &[u8]) -> String {
        hex::encode(self.digest(bytes))
    }

    /// Hex digest of everything read from `reader`, plus the byte count.
    ///
    /// Reads in fixed-size chunks, so the input is never held in memory at once.
    pub fn hex_digest_reader<R: Read>(&self, mut reader: R) -> io::Result<(String, u64)> {
        let mut hasher = StreamHasher::new(*self);
        let mut buf = vec![0u8; READ_CHUNK];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
            total += n as u64;
        }
        Ok((hex::encode(hasher.finalize()), total))
    }
}

const READ_CHUNK: usize = 64 * 1024;

enum StreamHasher {
    Sha256(Sha256),
    Sha3_512(Sha3_512),
    Blake3(Box<blake3::Hasher>),
}

impl StreamHasher {
    fn new(algo: HashAlgorithm) -> Self {
        match algo {
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Sha3_512 => Self::Sha3_512(Sha3_512::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(bytes),
            Self::Sha3_512(h) => h.update(bytes),
            Self::Blake3(h) => {
                h.update(bytes);
            }
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha3_512(h) => h.finalize().to_vec(),
            Self::Blake3(h) => h.finalize().as_bytes().to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "SHA256" => Ok(Self::Sha256),
            "SHA3512" => Ok(Self::Sha3_512),
            "BLAKE3" => Ok(Self::Blake3),
            _ => Err(TrustError::invalid_argument(format!(
                "unsupported hash algorithm: {}",
                s
            ))),
        }
    }
}

/// Hashing front-end holding the process-wide default algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashEngine {
    default_algo: HashAlgorithm,
}

impl HashEngine {
    /// Create an engine with an explicit default algorithm.
    pub fn new(default_algo: HashAlgorithm) -> Self {
        Self { default_algo }
    }

    /// Create an engine from configuration, resolving the algorithm name.
    pub fn from_config(config: &HashingConfig) -> Self {
        Self::new(HashAlgorithm::resolve(&config.default_algorithm))
    }

    /// The default algorithm.
    pub fn default_algorithm(&self) -> HashAlgorithm {
        self.default_algo
    }

    /// Names of every supported algorithm.
    pub fn supported_names() -> Vec<&'static str> {
        HashAlgorithm::supported().iter().map(|a| a.name()).collect()
    }

    pub fn hash_bytes(&self, bytes: &[u8]) -> String {
        self.hash_bytes_with(bytes, self.default_algo)
    }

    pub fn hash_bytes_with(&self, bytes: &[u8], algo: HashAlgorithm) -> String {
        algo.hex_digest(bytes)
    }

    pub fn hash_json(&self, value: Option<&Value>) -> String {
        self.hash_json_with(value, self.default_algo)
    }

    /// Hash the canonical form of a JSON value. A missing value hashes as `{}`.
    pub fn hash_json_with(&self, value: Option<&Value>, algo: HashAlgorithm) -> String {
        algo.hex_digest(&canonical_json(value))
    }

    pub fn hash_vector(&self, vector: &[f32]) -> String {
        self.hash_vector_with(vector, self.default_algo)
    }

    /// Hash a vector as consecutive little-endian `f32` values.
    pub fn hash_vector_with(&self, vector: &[f32], algo: HashAlgorithm) -> String {
        algo.hex_digest(&vector_bytes(vector))
    }
}

/// Compact JSON with object keys in sorted order. A missing value and an
/// explicit `null` both canonicalize to `{}`.
///
/// `serde_json::Map` is ordered by key unless the `preserve_order` feature
/// is enabled, which this workspace never does.
pub fn canonical_json(value: Option<&Value>) -> Vec<u8> {
    match value {
        None | Some(Value::Null) => b"{}".to_vec(),
        Some(v) => v.to_string().into_bytes(),
    }
}

fn vector_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}
