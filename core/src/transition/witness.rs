//! Private inputs for each transition
//!
//! Everything here is what a prover feeds its circuit. None of it is
//! published; only the [`TransitionOutput`](super::TransitionOutput) is.

use ark_ff::Field;
use shadevault_privacy::field::to_decimal;
use shadevault_privacy::{
    AccountIdentity, AccountState, Commitment, CurvePoint, FieldElement, MerkleProof,
    NoteEnvelope, NoteKeypair, OpenedNote, verify_inclusion,
};

use crate::errors::{Result, TransitionError};

/// Opening of the account's current leaf and its inclusion proof
#[derive(Debug, Clone)]
pub struct SpendWitness {
    pub identity: AccountIdentity,
    /// Logical state behind the current leaf, settlement adjustments included
    pub previous: AccountState,
    pub leaf_index: u64,
    pub root: FieldElement,
    pub depth: usize,
    pub proof: MerkleProof,
}

impl SpendWitness {
    /// Check nonce chaining and inclusion; returns the spend nullifier
    pub(crate) fn check(&self, nonce: FieldElement) -> Result<FieldElement> {
        let expected = self.previous.nonce + FieldElement::ONE;
        if nonce != expected {
            return Err(TransitionError::NonceOutOfOrder {
                expected: to_decimal(expected),
                got: to_decimal(nonce),
            });
        }

        let leaf = self.previous.leaf(&self.identity);
        if !verify_inclusion(leaf, self.leaf_index, self.depth, self.root, &self.proof) {
            return Err(TransitionError::InclusionProofMismatch {
                index: self.leaf_index,
            });
        }

        Ok(self.identity.nonce_commitment(self.previous.nonce))
    }
}

/// A received note being absorbed, proven against the spend's root
#[derive(Debug, Clone)]
pub struct NoteClaim {
    pub envelope: NoteEnvelope,
    pub receiver: NoteKeypair,
    pub leaf_index: u64,
    pub proof: MerkleProof,
}

impl NoteClaim {
    pub(crate) fn open(&self) -> Result<OpenedNote> {
        self.envelope
            .open(&self.receiver)
            .ok_or(TransitionError::NoteMismatch)
    }

    /// Open the note and prove its leaf sits under `root`
    pub(crate) fn check(&self, root: FieldElement, depth: usize) -> Result<OpenedNote> {
        let note = self.open()?;
        if !verify_inclusion(note.note_leaf, self.leaf_index, depth, root, &self.proof) {
            return Err(TransitionError::InclusionProofMismatch {
                index: self.leaf_index,
            });
        }
        Ok(note)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WithdrawParams {
    pub amount: FieldElement,
    pub relayer_fee: FieldElement,
    /// Time the prover claims it is; must not precede the unlock time
    pub time_reference: FieldElement,
    pub recipient: FieldElement,
}

#[derive(Debug, Clone, Copy)]
pub struct SendParams {
    pub amount: FieldElement,
    pub relayer_fee: FieldElement,
    pub time_reference: FieldElement,
    /// Sender key for the note; reuse is safe since every note is salted
    pub note_key: NoteKeypair,
    pub receiver_public: CurvePoint,
}

impl SendParams {
    /// Seal the note, salted with the nullifier of the spend creating it
    pub(crate) fn seal(&self, salt: FieldElement) -> (NoteEnvelope, Commitment) {
        let envelope =
            NoteEnvelope::seal(&self.note_key, &self.receiver_public, self.amount, salt);
        let commitment = self
            .note_key
            .shared_with(&self.receiver_public)
            .commitment(self.amount, salt);
        (envelope, commitment)
    }
}

#[derive(Debug, Clone)]
pub struct EntryWitness {
    pub identity: AccountIdentity,
}

#[derive(Debug, Clone)]
pub struct DepositWitness {
    pub spend: SpendWitness,
    pub nonce: FieldElement,
    pub amount: FieldElement,
    /// Requested lock; the account keeps the later of this and its current one
    pub unlocks_at: FieldElement,
}

#[derive(Debug, Clone)]
pub struct WithdrawWitness {
    pub spend: SpendWitness,
    pub nonce: FieldElement,
    pub params: WithdrawParams,
}

#[derive(Debug, Clone)]
pub struct SendWitness {
    pub spend: SpendWitness,
    pub nonce: FieldElement,
    pub params: SendParams,
}

#[derive(Debug, Clone)]
pub struct AbsorbSendWitness {
    pub spend: SpendWitness,
    pub nonce: FieldElement,
    pub claim: NoteClaim,
    pub params: SendParams,
}

#[derive(Debug, Clone)]
pub struct AbsorbWithdrawWitness {
    pub spend: SpendWitness,
    pub nonce: FieldElement,
    pub claim: NoteClaim,
    pub params: WithdrawParams,
}
