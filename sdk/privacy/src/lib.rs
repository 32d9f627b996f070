//! Shadevault Privacy SDK
//!
//! Commitment and accumulator primitives for the shielded vault ledger.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Account State                           │
//! │        shares · nullifier · unlocks_at · nonce (private)        │
//! │                               │                                 │
//! │                               ▼                                 │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │  Pedersen commitment over Baby Jubjub  {G, H, D, K, J}  │    │
//! │  │  spending_key, nonce_commitment via Poseidon2           │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                               │  leaf = Poseidon2(C.x, C.y)     │
//! │                               ▼                                 │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │  Lean incremental Merkle tree (append-only, depth ≤ 32) │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every formula here is also enforced inside the transition circuits, so
//! outputs must agree with them bit for bit.

pub mod commitment;
pub mod curve;
pub mod errors;
pub mod field;
pub mod merkle;
pub mod note;
pub mod poseidon2;

pub use commitment::{
    AccountIdentity, AccountState, Commitment, EncodedState, commit, credit, debit,
    derive_nonce_commitment, derive_spending_key, leaf_of,
};
pub use curve::{BASE8, CurvePoint, GENERATOR_G, Generators, generators};
pub use errors::{PrivacyError, Result};
pub use field::FieldElement;
pub use merkle::{
    LeanImt, MAX_DEPTH, MerkleProof, RootHistory, TreeLevels, prove_inclusion, verify_inclusion,
};
pub use note::{NoteEnvelope, NoteKeypair, OpenedNote, SharedNoteKey, note_commitment, note_nullifier};
pub use poseidon2::{hash2, hash3};
