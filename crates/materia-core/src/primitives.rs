//! # Innate Primitives
//!
//! Fixed policy constants for the Materia rule store and scoring engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! The store starts with zero rules but fixed policy.

// =============================================================================
// FORMAT
// =============================================================================

/// Magic bytes for the Materia binary blob header.
///
/// - Blob = Magic Bytes ("MATR") + Version (u8) before the postcard payload.
pub const MAGIC_BYTES: &[u8; 4] = b"MATR";

/// Current binary format version.
///
/// Increment this when making breaking changes to the blob encoding.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// ACCEPTANCE POLICY
// =============================================================================

/// Minimum confidence for a candidate to be accepted by the validator.
///
/// The same floor applies when selecting rules for scoring.
pub const MIN_CONFIDENCE: f64 = 0.6;

/// Uncertainty above which an accepted rule is flagged.
pub const HIGH_UNCERTAINTY: f64 = 0.3;

/// Largest tolerated drift between `uncertainty` and `1 - confidence`.
pub const UNCERTAINTY_TOLERANCE: f64 = 0.1;

/// Evidence count above which a rule counts as validated.
pub const VALIDATED_EVIDENCE_COUNT: u64 = 1000;

/// Text or property fragments that mark a rule as grounded in a fundamental law.
pub const PHYSICS_KEYWORDS: [&str; 7] = [
    "charge neutrality",
    "charge neutral",
    "pauling",
    "electronegativity",
    "conservation",
    "thermodynamic",
    "fundamental",
];

// =============================================================================
// CORROBORATION
// =============================================================================

/// Confidence added when a known rule is reported by a new source.
pub const CORROBORATION_INCREMENT: f64 = 0.02;

/// Cross-validation boost per distinct source.
pub const BOOST_PER_SOURCE: f64 = 0.02;

/// Upper bound of the cross-validation boost.
pub const MAX_BOOST: f64 = 0.1;

// =============================================================================
// INDEXING
// =============================================================================

/// Words excluded from the keyword index.
pub const STOP_WORDS: [&str; 14] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Words of this length or shorter are not indexed.
pub const MIN_KEYWORD_LENGTH: usize = 3;

/// Keywords indexed per rule.
pub const MAX_KEYWORDS_PER_RULE: usize = 10;

// =============================================================================
// STATISTICS BANDS
// =============================================================================

/// Lower bound of the "high" confidence band.
pub const HIGH_CONFIDENCE: f64 = 0.8;

// =============================================================================
// SCORING
// =============================================================================

/// Weight of the domain component in the overall score.
pub const DOMAIN_WEIGHT: f64 = 0.3;

/// Component score used when no rule informs it.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Tolerance added to a rule's uncertainty for `=` predicates.
pub const EQUALITY_SLACK: f64 = 0.1;

/// Matched/violated rules returned per score result.
pub const MAX_LISTED_RULES: usize = 10;

/// Characters of rule text quoted in the score reasoning.
pub const REASONING_EXCERPT_CHARS: usize = 80;

// =============================================================================
// SERVER LIMITS
// =============================================================================

/// Largest accepted HTTP request body (2 MiB).
pub const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Largest batch accepted in a single save.
pub const MAX_BATCH_SIZE: usize = 10_000;
