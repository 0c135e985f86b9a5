//! # materia-core
//!
//! The Rule Store and Scoring Engine for Materia - THE LOGIC.
//!
//! This crate turns short quantitative claims about material properties
//! ("rules") into a queryable knowledge base, and scores arbitrary materials
//! against it.
//!
//! ## Pipeline
//!
//! ```text
//! candidates → Normalizer → Validator → Deduplicator → CrossValidator → Index → backend
//!                                                                                  ↓
//!                                       ScoringEngine ← RuleStore::load ←──────────┘
//! ```
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - Deterministic: `BTreeMap`/`BTreeSet` for every grouping and index
//! - Single writer: each save reads, recomputes and rewrites the full state
//!   under the backend's lock
//! - Paper retrieval and prose-to-rule extraction live outside this crate;
//!   they hand candidates in through `RuleStore::save`

// =============================================================================
// MODULES
// =============================================================================

pub mod cross_validation;
pub mod fingerprint;
pub mod formats;
pub mod index;
pub mod metadata;
pub mod normalizer;
pub mod primitives;
pub mod report;
pub mod scoring;
pub mod storage;
pub mod store;
pub mod types;
pub mod validator;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Category, Domain, EvidenceStrength, MateriaError, Operator, Rule, RuleId, RuleType,
    ValidationStatus,
};

// =============================================================================
// RE-EXPORTS: Rule Pipeline
// =============================================================================

pub use cross_validation::{CrossValidator, ValidationRecord, ValidationRecords};
pub use fingerprint::{Deduplicator, Fingerprint, MergeOutcome};
pub use index::RuleIndex;
pub use metadata::{MetadataMap, SourceMetadata, SourceRecord};
pub use normalizer::{FieldValue, Normalizer, NumberLike, RuleCandidate};
pub use validator::{Validator, Verdict};

// =============================================================================
// RE-EXPORTS: Store, Storage & Scoring
// =============================================================================

pub use report::{ConfidenceDistribution, QualityReport, RuleStats};
pub use scoring::{DomainWeights, Evaluation, RuleEvaluation, ScoreResult, ScoringEngine};
pub use storage::{
    BackendKind, JsonDirStore, MemoryStore, RedbStore, RuleBackend, Snapshot, StorageBackend,
    StoreLock,
};
pub use store::{Rejection, RuleFilter, RuleStore, SaveSummary};
