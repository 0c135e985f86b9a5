//! # Persistence Format
//!
//! Serialization of the four persisted documents.
//!
//! JSON (directory store):
//! - `extracted_rules.json`: ordered array of rules
//! - `rule_metadata.json`: source key → metadata
//! - `rule_index.json`: derived index
//! - `rule_validation.json`: fingerprint → validation record
//!
//! Binary (redb store): header (5 bytes) + postcard payload.
//! - 4 bytes: Magic ("MATR")
//! - 1 byte: Version
//!
//! Rule documents are decoded leniently: each element goes through the
//! normalizer, and a malformed element is skipped with a warning instead of
//! failing the whole document.

use crate::normalizer::{Normalizer, RuleCandidate};
use crate::{MateriaError, Rule, primitives};
use serde::Serialize;
use serde::de::DeserializeOwned;

// =============================================================================
// DOCUMENT NAMES
// =============================================================================

pub const RULES_DOCUMENT: &str = "extracted_rules.json";
pub const METADATA_DOCUMENT: &str = "rule_metadata.json";
pub const INDEX_DOCUMENT: &str = "rule_index.json";
pub const VALIDATION_DOCUMENT: &str = "rule_validation.json";

/// All documents, in write order.
pub const DOCUMENTS: [&str; 4] = [
    RULES_DOCUMENT,
    METADATA_DOCUMENT,
    INDEX_DOCUMENT,
    VALIDATION_DOCUMENT,
];

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum accepted size of a single persisted document or blob (500 MB).
///
/// Checked before any parsing.
pub const MAX_DOCUMENT_SIZE: usize = 500 * 1024 * 1024;

const HEADER_SIZE: usize = 5;

// =============================================================================
// JSON DOCUMENTS
// =============================================================================

/// Encode any document as pretty-printed JSON.
pub fn document_to_json<T: Serialize>(document: &T) -> Result<Vec<u8>, MateriaError> {
    serde_json::to_vec_pretty(document).map_err(|e| MateriaError::Serialization(e.to_string()))
}

/// Decode a derived document (metadata, index, validation).
pub fn document_from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, MateriaError> {
    check_size(bytes)?;
    serde_json::from_slice(bytes).map_err(|e| MateriaError::Deserialization(e.to_string()))
}

/// Decode the rule document, normalizing every element.
///
/// The document must be a JSON array; elements that cannot be read as a rule
/// record are skipped with a warning.
pub fn rules_from_json(bytes: &[u8]) -> Result<Vec<Rule>, MateriaError> {
    check_size(bytes)?;
    let values: Vec<serde_json::Value> = serde_json::from_slice(bytes)
        .map_err(|e| MateriaError::Deserialization(format!("rule document: {}", e)))?;

    let mut rules = Vec::with_capacity(values.len());
    for (position, value) in values.into_iter().enumerate() {
        match RuleCandidate::from_json(value) {
            Ok(candidate) => rules.push(Normalizer::normalize(candidate)),
            Err(e) => tracing::warn!(position, error = %e, "skipping malformed rule record"),
        }
    }
    Ok(rules)
}

// =============================================================================
// BINARY BLOBS
// =============================================================================

/// The header preceding every binary blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl BlobHeader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), MateriaError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(MateriaError::Deserialization(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(MateriaError::Deserialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MateriaError> {
        if bytes.len() < HEADER_SIZE {
            return Err(MateriaError::Deserialization(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for BlobHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a value as header + postcard payload.
pub fn blob_to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, MateriaError> {
    let payload =
        postcard::to_stdvec(value).map_err(|e| MateriaError::Serialization(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&BlobHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode a header + postcard blob. Size and header are checked first.
pub fn blob_from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, MateriaError> {
    check_size(bytes)?;
    let header = BlobHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[HEADER_SIZE..])
        .map_err(|e| MateriaError::Deserialization(format!("Failed to decode blob: {}", e)))
}

fn check_size(bytes: &[u8]) -> Result<(), MateriaError> {
    if bytes.len() > MAX_DOCUMENT_SIZE {
        return Err(MateriaError::Deserialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_DOCUMENT_SIZE
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
