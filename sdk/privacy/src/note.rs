//! Note Stack
//!
//! A send moves value out of the sender's account into a one-time note that
//! only the receiver can open:
//!
//! ```text
//! shared          = sender_secret * receiver_public     (= receiver_secret * sender_public)
//! shared_key      = Poseidon2(shared.x, shared.y)
//! shared_key_hash = Poseidon2(shared_key, 0)
//!
//! note_commitment = (amount+1)*G + (salt+1)*H + shared_key*D + 1*K + shared_key_hash*J
//! note_leaf       = Poseidon2(note_commitment.x, note_commitment.y)
//! encrypted       = amount + Poseidon2(shared_key_hash, salt)
//! ```
//!
//! The salt is the sending spend's nullifier, so it is public and never
//! repeats. Two notes between the same pair of keys therefore still get
//! distinct leaves, nullifiers and pads.
//!
//! Key pairs live in the prime-order subgroup generated by `BASE8`.

use ark_ff::{AdditiveGroup, Field};
use ark_std::UniformRand;
use ark_std::rand::Rng;
use serde::{Deserialize, Serialize};

use crate::commitment::{Commitment, commit, encode, leaf_of};
use crate::curve::{BASE8, CurvePoint};
use crate::field::{FieldElement, serde_field};
use crate::poseidon2::hash2;

/// Note key pair (`public = secret * BASE8`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteKeypair {
    secret: FieldElement,
    public: CurvePoint,
}

impl NoteKeypair {
    pub fn from_secret(secret: FieldElement) -> Self {
        Self {
            secret,
            public: BASE8.scalar_mul(secret),
        }
    }

    /// Generate a random key pair
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut secret = FieldElement::rand(rng);
        while secret == FieldElement::ZERO {
            secret = FieldElement::rand(rng);
        }
        Self::from_secret(secret)
    }

    pub fn secret(&self) -> FieldElement {
        self.secret
    }

    pub fn public_key(&self) -> CurvePoint {
        self.public
    }

    /// Agree on a note key with the other party
    pub fn shared_with(&self, counterparty_public: &CurvePoint) -> SharedNoteKey {
        SharedNoteKey::derive(self.secret, counterparty_public)
    }
}

/// One-time key material shared by sender and receiver of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedNoteKey {
    pub shared_key: FieldElement,
    pub shared_key_hash: FieldElement,
}

impl SharedNoteKey {
    pub fn derive(own_secret: FieldElement, counterparty_public: &CurvePoint) -> Self {
        let point = counterparty_public.scalar_mul(own_secret);
        let shared_key = hash2(point.x, point.y);
        Self {
            shared_key,
            shared_key_hash: hash2(shared_key, FieldElement::ZERO),
        }
    }

    pub fn commitment(&self, amount: FieldElement, salt: FieldElement) -> Commitment {
        note_commitment(amount, self, salt)
    }

    pub fn leaf(&self, amount: FieldElement, salt: FieldElement) -> FieldElement {
        leaf_of(&self.commitment(amount, salt))
    }

    /// One-time pad hiding the amount of the note salted with `salt`
    pub fn pad(&self, salt: FieldElement) -> FieldElement {
        hash2(self.shared_key_hash, salt)
    }
}

/// Commitment carrying `amount` under a shared note key
pub fn note_commitment(
    amount: FieldElement,
    key: &SharedNoteKey,
    salt: FieldElement,
) -> Commitment {
    commit(
        encode(amount),
        encode(salt),
        key.shared_key,
        FieldElement::ONE,
        key.shared_key_hash,
    )
}

/// Spend tag published when a note is absorbed
pub fn note_nullifier(key: &SharedNoteKey, note_leaf: FieldElement) -> FieldElement {
    hash2(key.shared_key_hash, note_leaf)
}

/// Public part of a note: what a send publishes next to the note leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEnvelope {
    pub sender_public_key: CurvePoint,
    /// Nullifier of the spend that created the note
    #[serde(with = "serde_field")]
    pub salt: FieldElement,
    /// `amount + pad(salt)`
    #[serde(with = "serde_field")]
    pub encrypted_amount: FieldElement,
    #[serde(with = "serde_field")]
    pub note_leaf: FieldElement,
}

impl NoteEnvelope {
    /// Build the envelope for a note of `amount` addressed to `receiver_public`
    pub fn seal(
        sender: &NoteKeypair,
        receiver_public: &CurvePoint,
        amount: FieldElement,
        salt: FieldElement,
    ) -> Self {
        let key = sender.shared_with(receiver_public);
        Self {
            sender_public_key: sender.public_key(),
            salt,
            encrypted_amount: amount + key.pad(salt),
            note_leaf: key.leaf(amount, salt),
        }
    }

    /// Recover the note; `None` when the envelope was not addressed to `receiver`
    pub fn open(&self, receiver: &NoteKeypair) -> Option<OpenedNote> {
        let key = receiver.shared_with(&self.sender_public_key);
        let amount = self.encrypted_amount - key.pad(self.salt);
        if key.leaf(amount, self.salt) != self.note_leaf {
            return None;
        }
        Some(OpenedNote {
            amount,
            key,
            note_leaf: self.note_leaf,
        })
    }
}

/// A note recovered by its receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedNote {
    pub amount: FieldElement,
    pub key: SharedNoteKey,
    pub note_leaf: FieldElement,
}

impl OpenedNote {
    pub fn nullifier(&self) -> FieldElement {
        note_nullifier(&self.key, self.note_leaf)
    }
}
