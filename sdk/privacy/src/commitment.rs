//! Account Commitments
//!
//! Folds an account state into one Baby Jubjub point with a 5-base Pedersen
//! sum, then hashes the point into a tree leaf.
//!
//! ```text
//! spending_key     = Poseidon2(user_key, chain_id, token)
//! nonce_commitment = Poseidon2(spending_key, nonce, token)
//!
//! C    = (shares+1)*G + (nullifier+1)*H + spending_key*D + (unlocks_at+1)*K + nonce_commitment*J
//! leaf = Poseidon2(C.x, C.y)
//! ```
//!
//! Shares, nullifier and unlock time are one-biased so a logical zero never
//! becomes a multiplication by zero.

use ark_ff::Field;
use serde::{Deserialize, Serialize};

use crate::curve::{CurvePoint, generators};
use crate::field::{FieldElement, serde_field};
use crate::poseidon2::{hash2, hash3};

/// A commitment is a curve point
pub type Commitment = CurvePoint;

/// Spending key for an (identity, chain, asset) triple; fixed across nonces
pub fn derive_spending_key(
    user_key: FieldElement,
    chain_id: FieldElement,
    token_address: FieldElement,
) -> FieldElement {
    hash3(user_key, chain_id, token_address)
}

/// Randomness term binding a commitment to exactly one nonce
pub fn derive_nonce_commitment(
    spending_key: FieldElement,
    nonce: FieldElement,
    token_address: FieldElement,
) -> FieldElement {
    hash3(spending_key, nonce, token_address)
}

/// 5-base Pedersen commitment
///
/// `shares_enc`, `nullifier_enc` and `unlocks_at_enc` must already carry
/// the +1 bias.
pub fn commit(
    shares_enc: FieldElement,
    nullifier_enc: FieldElement,
    spending_key: FieldElement,
    unlocks_at_enc: FieldElement,
    nonce_commitment: FieldElement,
) -> Commitment {
    let gens = generators();
    gens.g
        .scalar_mul(shares_enc)
        .add(&gens.h.scalar_mul(nullifier_enc))
        .add(&gens.d.scalar_mul(spending_key))
        .add(&gens.k.scalar_mul(unlocks_at_enc))
        .add(&gens.j.scalar_mul(nonce_commitment))
}

/// Tree leaf for a commitment point
pub fn leaf_of(commitment: &Commitment) -> FieldElement {
    hash2(commitment.x, commitment.y)
}

/// One-biased encoding
pub fn encode(value: FieldElement) -> FieldElement {
    value + FieldElement::ONE
}

/// Settlement-side share increase: `C + amount*G`
pub fn credit(commitment: &Commitment, amount: FieldElement) -> Commitment {
    commitment.add(&generators().g.scalar_mul(amount))
}

/// Settlement-side share decrease: `C - amount*G`
pub fn debit(commitment: &Commitment, amount: FieldElement) -> Commitment {
    commitment.sub(&generators().g.scalar_mul(amount))
}

/// Who owns an account and for which asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    #[serde(with = "serde_field")]
    pub user_key: FieldElement,
    #[serde(with = "serde_field")]
    pub chain_id: FieldElement,
    #[serde(with = "serde_field")]
    pub token_address: FieldElement,
}

impl AccountIdentity {
    pub fn new(
        user_key: FieldElement,
        chain_id: FieldElement,
        token_address: FieldElement,
    ) -> Self {
        Self {
            user_key,
            chain_id,
            token_address,
        }
    }

    pub fn spending_key(&self) -> FieldElement {
        derive_spending_key(self.user_key, self.chain_id, self.token_address)
    }

    pub fn nonce_commitment(&self, nonce: FieldElement) -> FieldElement {
        derive_nonce_commitment(self.spending_key(), nonce, self.token_address)
    }
}

/// One-biased view of the three value fields of an [`AccountState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedState {
    pub shares_enc: FieldElement,
    pub nullifier_enc: FieldElement,
    pub unlocks_at_enc: FieldElement,
}

/// Logical (unbiased) account state. Never published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountState {
    #[serde(with = "serde_field")]
    pub shares: FieldElement,
    #[serde(with = "serde_field")]
    pub nullifier: FieldElement,
    #[serde(with = "serde_field")]
    pub unlocks_at: FieldElement,
    #[serde(with = "serde_field")]
    pub nonce: FieldElement,
}

impl AccountState {
    /// The state created by an entry transition: everything zero, nonce 0
    pub fn entry() -> Self {
        Self::default()
    }

    pub fn encoded(&self) -> EncodedState {
        EncodedState {
            shares_enc: encode(self.shares),
            nullifier_enc: encode(self.nullifier),
            unlocks_at_enc: encode(self.unlocks_at),
        }
    }

    /// Commitment for this state under `identity`
    pub fn commitment(&self, identity: &AccountIdentity) -> Commitment {
        let spending_key = identity.spending_key();
        let enc = self.encoded();
        commit(
            enc.shares_enc,
            enc.nullifier_enc,
            spending_key,
            enc.unlocks_at_enc,
            derive_nonce_commitment(spending_key, self.nonce, identity.token_address),
        )
    }

    pub fn leaf(&self, identity: &AccountIdentity) -> FieldElement {
        leaf_of(&self.commitment(identity))
    }

    /// Same balances, next nonce
    pub fn advance(&self) -> Self {
        Self {
            nonce: self.nonce + FieldElement::ONE,
            ..*self
        }
    }
}
