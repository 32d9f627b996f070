//! Error definitions for transitions and ledger storage.
//!
//! A declined transition is never retried: every [`TransitionError`] maps to a
//! stable [`DeclineReason`] code that is reported to the submitter as-is.
use serde::{Deserialize, Serialize};
use shadevault_privacy::PrivacyError;
use std::fmt;
use thiserror::Error;

/// Stable, machine-readable decline codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    InvalidFieldElement,
    DivisionByZero,
    InclusionProofMismatch,
    NonceOutOfOrder,
    InsufficientShares,
    StillLocked,
    NoteMismatch,
    InvalidAmount,
    UnknownRoot,
    NullifierAlreadySpent,
    SettlementMismatch,
    MalformedTree,
    StorageFailure,
}

impl DeclineReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidFieldElement => "invalid_field_element",
            Self::DivisionByZero => "division_by_zero",
            Self::InclusionProofMismatch => "inclusion_proof_mismatch",
            Self::NonceOutOfOrder => "nonce_out_of_order",
            Self::InsufficientShares => "insufficient_shares",
            Self::StillLocked => "still_locked",
            Self::NoteMismatch => "note_mismatch",
            Self::InvalidAmount => "invalid_amount",
            Self::UnknownRoot => "unknown_root",
            Self::NullifierAlreadySpent => "nullifier_already_spent",
            Self::SettlementMismatch => "settlement_mismatch",
            Self::MalformedTree => "malformed_tree",
            Self::StorageFailure => "storage_failure",
        }
    }
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a transition is declined
///
/// Field values are carried as decimal strings for display.
#[derive(Error, Debug)]
pub enum TransitionError {
    #[error(transparent)]
    Primitive(#[from] PrivacyError),

    /// Computed root differs from the claimed root
    #[error("Inclusion proof for leaf {index} does not reach the claimed root")]
    InclusionProofMismatch { index: u64 },

    #[error("Nonce out of order: expected {expected}, got {got}")]
    NonceOutOfOrder { expected: String, got: String },

    #[error("Insufficient shares: have {available}, need {required}")]
    InsufficientShares { available: String, required: String },

    #[error("Shares locked until {unlocks_at}, time reference is {now}")]
    StillLocked { unlocks_at: String, now: String },

    /// Note envelope does not open under the claimed receiver key
    #[error("Note does not match the receiver key")]
    NoteMismatch,

    #[error("Transfer amount must be non-zero")]
    ZeroAmount,

    #[error("Root {0} is not current or recent")]
    UnknownRoot(String),

    #[error("Nullifier {0} already spent")]
    NullifierAlreadySpent(String),

    /// Declared leaf differs from the settled commitment at that position
    #[error("Leaf {position} does not match its settled commitment")]
    SettlementMismatch { position: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TransitionError {
    pub fn reason(&self) -> DeclineReason {
        match self {
            Self::Primitive(PrivacyError::InvalidFieldElement(_)) => {
                DeclineReason::InvalidFieldElement
            }
            Self::Primitive(PrivacyError::DivisionByZero) => DeclineReason::DivisionByZero,
            Self::Primitive(PrivacyError::PointNotOnCurve { .. }) => {
                DeclineReason::InvalidFieldElement
            }
            Self::Primitive(_) => DeclineReason::MalformedTree,
            Self::InclusionProofMismatch { .. } => DeclineReason::InclusionProofMismatch,
            Self::NonceOutOfOrder { .. } => DeclineReason::NonceOutOfOrder,
            Self::InsufficientShares { .. } => DeclineReason::InsufficientShares,
            Self::StillLocked { .. } => DeclineReason::StillLocked,
            Self::NoteMismatch => DeclineReason::NoteMismatch,
            Self::ZeroAmount => DeclineReason::InvalidAmount,
            Self::UnknownRoot(_) => DeclineReason::UnknownRoot,
            Self::NullifierAlreadySpent(_) => DeclineReason::NullifierAlreadySpent,
            Self::SettlementMismatch { .. } => DeclineReason::SettlementMismatch,
            Self::Storage(_) => DeclineReason::StorageFailure,
        }
    }
}

/// Errors from snapshot persistence
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Persisted tree state disagrees with its own leaves
    #[error("Snapshot corrupted: {0}")]
    SnapshotCorrupted(String),
}

pub type Result<T> = std::result::Result<T, TransitionError>;
