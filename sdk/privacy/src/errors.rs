//! Error definitions for the ledger primitives.
//!
//! Every variant here is unrecoverable at the call site: a cryptographic
//! mismatch cannot be fixed by retrying, so callers surface it immediately.
use thiserror::Error;

/// Errors raised by field, curve, hash and tree operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrivacyError {
    /// Input is not a canonical element of the BN254 scalar field
    #[error("Invalid field element: {0}")]
    InvalidFieldElement(String),

    /// Field inverse of zero (programming error)
    #[error("Division by zero in field inverse")]
    DivisionByZero,

    /// Deserialized point does not satisfy the Baby Jubjub equation
    #[error("Point ({x}, {y}) is not on the Baby Jubjub curve")]
    PointNotOnCurve { x: String, y: String },

    /// Leaf index is past the end of the tree
    #[error("Leaf index {index} out of range for tree of size {size}")]
    LeafIndexOutOfRange { index: u64, size: u64 },

    /// Claimed tree size exceeds the number of supplied leaves
    #[error("Tree size {size} exceeds the {available} leaves supplied")]
    MissingLeaves { size: u64, available: usize },

    /// Depth exceeds the maximum supported by the tree
    #[error("Tree depth {depth} exceeds maximum {max}")]
    DepthTooLarge { depth: usize, max: usize },

    /// Tree already holds 2^MAX_DEPTH leaves
    #[error("Tree is full ({0} leaves)")]
    TreeFull(u64),

    /// Persisted side nodes disagree with the ones rebuilt from leaves
    #[error("Tree state mismatch at level {level}")]
    TreeStateMismatch { level: usize },
}

/// Result type for primitive operations
pub type Result<T> = std::result::Result<T, PrivacyError>;
