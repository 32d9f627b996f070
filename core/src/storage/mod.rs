pub mod ledger_state;
pub mod snapshot;

pub use ledger_state::{DEFAULT_ROOT_HISTORY, LedgerState, SharedLedger};
pub use snapshot::LedgerSnapshot;
