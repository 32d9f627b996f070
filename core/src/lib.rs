//! Shadevault Core
//!
//! The nonce-chained account protocol on top of the privacy primitives:
//! transition validation, settlement-layer adjustments, the public ledger
//! state and client-side reconstruction of private account state.

pub mod errors;
pub mod settlement;
pub mod storage;
pub mod tracker;
pub mod transition;

pub use errors::{DeclineReason, StorageError, TransitionError};
pub use settlement::SettlementAdjustment;
pub use storage::{DEFAULT_ROOT_HISTORY, LedgerSnapshot, LedgerState, SharedLedger};
pub use tracker::AccountTracker;
pub use transition::{Transition, TransitionKind, TransitionOutput, Withdrawal};
