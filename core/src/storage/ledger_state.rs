//! Ledger State Management
//!
//! Manages the public ledger state:
//! - Lean-IMT of account and note leaves (append-only)
//! - Spent nullifier set for double-spend prevention
//! - Recent root window so proofs against a slightly stale root still land
//!
//! Persistence stores the leaf list plus the tree's side nodes; on load the
//! tree is rebuilt from the leaves and must reproduce the side nodes exactly.

use log::{debug, info, warn};
use shadevault_privacy::field::to_decimal;
use shadevault_privacy::merkle::MAX_LEAVES;
use shadevault_privacy::{
    FieldElement, LeanImt, MerkleProof, PrivacyError, RootHistory, TreeLevels, verify_inclusion,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use super::snapshot::LedgerSnapshot;
use crate::errors::{StorageError, TransitionError};
use crate::transition::{TransitionKind, TransitionOutput};

/// Default number of recent roots accepted for new transitions
pub const DEFAULT_ROOT_HISTORY: usize = 100;

/// Public ledger state
#[derive(Debug, Clone)]
pub struct LedgerState {
    tree: LeanImt,
    leaves: Vec<FieldElement>,
    nullifiers: HashSet<FieldElement>,
    root_history: RootHistory,
}

impl LedgerState {
    /// Create an empty ledger
    pub fn new(root_history: usize) -> Self {
        Self {
            tree: LeanImt::new(),
            leaves: Vec::new(),
            nullifiers: HashSet::new(),
            root_history: RootHistory::new(root_history),
        }
    }

    /// Rebuild from a snapshot, checking the tree against its own leaves
    pub fn from_snapshot(
        snapshot: LedgerSnapshot,
        root_history: usize,
    ) -> Result<Self, StorageError> {
        if snapshot.size != snapshot.leaves.len() as u64 {
            return Err(StorageError::SnapshotCorrupted(format!(
                "size {} but {} leaves",
                snapshot.size,
                snapshot.leaves.len()
            )));
        }

        let tree = LeanImt::restore(&snapshot.leaves, snapshot.depth, &snapshot.side_nodes)
            .map_err(|e| StorageError::SnapshotCorrupted(e.to_string()))?;

        let mut state = Self::new(root_history);
        if let Some(root) = tree.root() {
            state.root_history.push(root);
        }
        state.tree = tree;
        state.leaves = snapshot.leaves;
        state.nullifiers = snapshot.nullifiers.into_iter().collect();
        Ok(state)
    }

    /// Load from `path`, or start empty if no snapshot exists
    pub fn load(path: &Path, root_history: usize) -> Result<Self, StorageError> {
        let state = match LedgerSnapshot::read_from(path)? {
            Some(snapshot) => Self::from_snapshot(snapshot, root_history)?,
            None => {
                info!("No snapshot at {}, starting empty ledger", path.display());
                return Ok(Self::new(root_history));
            }
        };

        info!(
            "Loaded ledger state: {} leaves, depth {}, {} nullifiers",
            state.size(),
            state.depth(),
            state.nullifiers.len()
        );
        Ok(state)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut nullifiers: Vec<FieldElement> = self.nullifiers.iter().copied().collect();
        nullifiers.sort();

        LedgerSnapshot {
            size: self.tree.size(),
            depth: self.tree.depth(),
            side_nodes: self.tree.side_nodes().to_vec(),
            leaves: self.leaves.clone(),
            nullifiers,
        }
    }

    pub fn persist(&self, path: &Path) -> Result<(), StorageError> {
        self.snapshot().write_to(path)
    }

    /// Accept a validated transition
    ///
    /// Checks root freshness, nullifier freshness and the settled leaves,
    /// then appends leaves in order. Returns the assigned leaf indices.
    /// Nothing is mutated when a check fails.
    pub fn apply(&mut self, output: &TransitionOutput) -> Result<Vec<u64>, TransitionError> {
        match output.root {
            Some(root) if !self.root_history.is_valid(&root) => {
                return Err(TransitionError::UnknownRoot(to_decimal(root)));
            }
            None if output.kind != TransitionKind::Entry => {
                return Err(TransitionError::UnknownRoot("none".into()));
            }
            _ => {}
        }

        let mut fresh = HashSet::with_capacity(output.nullifiers.len());
        for nullifier in &output.nullifiers {
            if self.nullifiers.contains(nullifier) || !fresh.insert(*nullifier) {
                return Err(TransitionError::NullifierAlreadySpent(to_decimal(*nullifier)));
            }
        }

        if output.commitments.len() != output.leaves.len()
            || output.adjustments.len() != output.leaves.len()
        {
            return Err(TransitionError::SettlementMismatch {
                position: output.commitments.len().min(output.adjustments.len()),
            });
        }
        for (position, ((commitment, adjustment), leaf)) in output
            .commitments
            .iter()
            .zip(&output.adjustments)
            .zip(&output.leaves)
            .enumerate()
        {
            if adjustment.settled_leaf(commitment) != *leaf {
                return Err(TransitionError::SettlementMismatch { position });
            }
        }

        if self.tree.size() + output.leaves.len() as u64 > MAX_LEAVES {
            return Err(PrivacyError::TreeFull(self.tree.size()).into());
        }

        let mut indices = Vec::with_capacity(output.leaves.len());
        for leaf in &output.leaves {
            indices.push(self.append(*leaf)?);
        }
        if let Some(root) = self.tree.root() {
            self.root_history.push(root);
        }
        self.nullifiers.extend(output.nullifiers.iter().copied());

        debug!(
            "Applied {}: leaves {:?}, root {}",
            output.kind.as_str(),
            indices,
            self.root().map(to_decimal).unwrap_or_default()
        );
        Ok(indices)
    }

    /// Insert a bare leaf outside the transition flow
    pub fn insert_leaf(&mut self, leaf: FieldElement) -> Result<u64, TransitionError> {
        let index = self.append(leaf)?;
        if let Some(root) = self.tree.root() {
            self.root_history.push(root);
        }
        debug!("Inserted leaf {} at index {}", to_decimal(leaf), index);
        Ok(index)
    }

    fn append(&mut self, leaf: FieldElement) -> Result<u64, PrivacyError> {
        let index = self.tree.size();
        self.tree.insert(leaf)?;
        self.leaves.push(leaf);
        Ok(index)
    }

    /// Inclusion proof for `index` against the current root
    pub fn prove(&self, index: u64) -> Result<MerkleProof, PrivacyError> {
        TreeLevels::build(&self.leaves, self.tree.size())?.proof(index, self.tree.depth())
    }

    /// Verify a proof against the current root
    pub fn verify(&self, leaf: FieldElement, index: u64, proof: &MerkleProof) -> bool {
        self.root()
            .is_some_and(|root| verify_inclusion(leaf, index, self.depth(), root, proof))
    }

    pub fn root(&self) -> Option<FieldElement> {
        self.tree.root()
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    pub fn size(&self) -> u64 {
        self.tree.size()
    }

    pub fn tree(&self) -> &LeanImt {
        &self.tree
    }

    pub fn leaves(&self) -> &[FieldElement] {
        &self.leaves
    }

    pub fn leaf(&self, index: u64) -> Option<FieldElement> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.leaves.get(i).copied())
    }

    /// Position of the most recent occurrence of `leaf`
    pub fn leaf_index(&self, leaf: &FieldElement) -> Option<u64> {
        self.leaves.iter().rposition(|l| l == leaf).map(|i| i as u64)
    }

    pub fn is_known_root(&self, root: &FieldElement) -> bool {
        self.root_history.is_valid(root)
    }

    pub fn is_spent(&self, nullifier: &FieldElement) -> bool {
        self.nullifiers.contains(nullifier)
    }

    pub fn nullifier_count(&self) -> usize {
        self.nullifiers.len()
    }
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_HISTORY)
    }
}

/// Single-writer handle shared across threads
///
/// Inserts are serialized behind the write lock; proofs are served from
/// read guards in parallel.
#[derive(Debug, Clone)]
pub struct SharedLedger {
    inner: Arc<RwLock<LedgerState>>,
    autosave: Option<PathBuf>,
}

impl SharedLedger {
    pub fn new(state: LedgerState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
            autosave: None,
        }
    }

    /// Load from `path`; with `autosave`, persist after every accepted transition
    pub fn open(path: &Path, root_history: usize, autosave: bool) -> Result<Self, StorageError> {
        let state = LedgerState::load(path, root_history)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(state)),
            autosave: autosave.then(|| path.to_path_buf()),
        })
    }

    pub fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a transition output under the write lock
    ///
    /// With autosave the output is applied to a copy that only replaces the
    /// live state once it is on disk, so a failed write leaves nothing behind.
    pub fn submit(&self, output: &TransitionOutput) -> Result<Vec<u64>, TransitionError> {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let result = match &self.autosave {
            None => state.apply(output),
            Some(path) => apply_durably(&mut state, output, path),
        };

        result.inspect_err(|e| {
            warn!(
                "Declined {} ({}): {}",
                output.kind.as_str(),
                e.reason(),
                e
            );
        })
    }

    pub fn persist(&self, path: &Path) -> Result<(), StorageError> {
        self.read().persist(path)
    }
}

fn apply_durably(
    state: &mut LedgerState,
    output: &TransitionOutput,
    path: &Path,
) -> Result<Vec<u64>, TransitionError> {
    let mut next = state.clone();
    let indices = next.apply(output)?;
    next.persist(path)?;
    *state = next;
    Ok(indices)
}
