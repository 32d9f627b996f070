//! Settlement-layer adjustments
//!
//! The settlement contract may move a circuit's output commitment by a
//! multiple of `G` before the leaf is inserted:
//!
//! ```text
//! C' = C + m*G   (Credit, deposits)
//! C' = C - m*G   (Debit)
//! leaf = Poseidon2(C'.x, C'.y)
//! ```
//!
//! The adjusted leaf is the ground truth for every later inclusion proof.

use serde::{Deserialize, Serialize};
use shadevault_privacy::field::serde_field;
use shadevault_privacy::{Commitment, FieldElement, credit, debit, leaf_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum SettlementAdjustment {
    #[default]
    None,
    #[serde(with = "serde_field")]
    Credit(FieldElement),
    #[serde(with = "serde_field")]
    Debit(FieldElement),
}

impl SettlementAdjustment {
    /// Commitment after the settlement layer has run
    pub fn apply(&self, commitment: &Commitment) -> Commitment {
        match self {
            Self::None => *commitment,
            Self::Credit(amount) => credit(commitment, *amount),
            Self::Debit(amount) => debit(commitment, *amount),
        }
    }

    /// Leaf actually inserted into the tree
    pub fn settled_leaf(&self, commitment: &Commitment) -> FieldElement {
        leaf_of(&self.apply(commitment))
    }
}
