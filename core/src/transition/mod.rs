//! State Transitions
//!
//! Accounts are nonce-chained per `(user_key, chain_id, token)`:
//!
//! ```text
//! Uninitialized ─► Entry(0) ─► Deposit | Withdraw | Send (n+1) ─► ...
//!                                      └─► AbsorbSend | AbsorbWithdraw (n+2)
//! ```
//!
//! [`Transition::validate`] runs natively the constraints the transition
//! circuits enforce and produces the public [`TransitionOutput`] the
//! settlement layer consumes. Each non-entry transition publishes the
//! previous state's nonce commitment as its nullifier.

mod witness;

pub use witness::{
    AbsorbSendWitness, AbsorbWithdrawWitness, DepositWitness, EntryWitness, NoteClaim,
    SendParams, SendWitness, SpendWitness, WithdrawParams, WithdrawWitness,
};

use ark_ff::AdditiveGroup;
use log::debug;
use serde::{Deserialize, Serialize};
use shadevault_privacy::field::{serde_field, serde_field_opt, serde_field_vec, to_biguint, to_decimal};
use shadevault_privacy::{AccountIdentity, AccountState, Commitment, FieldElement, NoteEnvelope};

use crate::errors::{Result, TransitionError};
use crate::settlement::SettlementAdjustment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Entry,
    Deposit,
    Withdraw,
    Send,
    AbsorbSend,
    AbsorbWithdraw,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Send => "send",
            Self::AbsorbSend => "absorb_send",
            Self::AbsorbWithdraw => "absorb_withdraw",
        }
    }
}

/// Value leaving the vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    #[serde(with = "serde_field")]
    pub recipient: FieldElement,
    #[serde(with = "serde_field")]
    pub amount: FieldElement,
}

/// Public result of a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutput {
    pub kind: TransitionKind,
    /// Root the inclusion proofs were checked against; `None` for entry
    #[serde(with = "serde_field_opt")]
    pub root: Option<FieldElement>,
    #[serde(with = "serde_field_vec")]
    pub nullifiers: Vec<FieldElement>,
    /// Circuit output commitments, in insertion order
    pub commitments: Vec<Commitment>,
    /// One per commitment
    pub adjustments: Vec<SettlementAdjustment>,
    /// Leaves to insert, after settlement adjustment
    #[serde(with = "serde_field_vec")]
    pub leaves: Vec<FieldElement>,
    #[serde(with = "serde_field")]
    pub relayer_fee: FieldElement,
    pub note: Option<NoteEnvelope>,
    pub withdrawal: Option<Withdrawal>,
}

impl TransitionOutput {
    fn new(
        kind: TransitionKind,
        root: Option<FieldElement>,
        nullifiers: Vec<FieldElement>,
        outputs: Vec<(Commitment, SettlementAdjustment)>,
    ) -> Self {
        let leaves = outputs
            .iter()
            .map(|(commitment, adjustment)| adjustment.settled_leaf(commitment))
            .collect();
        let (commitments, adjustments) = outputs.into_iter().unzip();

        Self {
            kind,
            root,
            nullifiers,
            commitments,
            adjustments,
            leaves,
            relayer_fee: FieldElement::ZERO,
            note: None,
            withdrawal: None,
        }
    }

    /// Leaf of the account's own new state (always inserted first)
    pub fn account_leaf(&self) -> Option<FieldElement> {
        self.leaves.first().copied()
    }
}

/// A transition with its private witness
#[derive(Debug, Clone)]
pub enum Transition {
    Entry(EntryWitness),
    Deposit(DepositWitness),
    Withdraw(WithdrawWitness),
    Send(SendWitness),
    AbsorbSend(AbsorbSendWitness),
    AbsorbWithdraw(AbsorbWithdrawWitness),
}

impl Transition {
    pub fn kind(&self) -> TransitionKind {
        match self {
            Self::Entry(_) => TransitionKind::Entry,
            Self::Deposit(_) => TransitionKind::Deposit,
            Self::Withdraw(_) => TransitionKind::Withdraw,
            Self::Send(_) => TransitionKind::Send,
            Self::AbsorbSend(_) => TransitionKind::AbsorbSend,
            Self::AbsorbWithdraw(_) => TransitionKind::AbsorbWithdraw,
        }
    }

    pub fn identity(&self) -> &AccountIdentity {
        match self {
            Self::Entry(w) => &w.identity,
            Self::Deposit(w) => &w.spend.identity,
            Self::Withdraw(w) => &w.spend.identity,
            Self::Send(w) => &w.spend.identity,
            Self::AbsorbSend(w) => &w.spend.identity,
            Self::AbsorbWithdraw(w) => &w.spend.identity,
        }
    }

    /// Nonce of the state this transition creates
    pub fn nonce(&self) -> FieldElement {
        match self {
            Self::Entry(_) => FieldElement::ZERO,
            Self::Deposit(w) => w.nonce,
            Self::Withdraw(w) => w.nonce,
            Self::Send(w) => w.nonce,
            Self::AbsorbSend(w) => w.nonce,
            Self::AbsorbWithdraw(w) => w.nonce,
        }
    }

    /// Logical account state after settlement
    ///
    /// Checks balances, locks and note openings but not nonces or inclusion.
    pub fn next_state(&self) -> Result<AccountState> {
        match self {
            Self::Entry(_) => Ok(AccountState::entry()),
            Self::Deposit(w) => {
                if w.amount == FieldElement::ZERO {
                    return Err(TransitionError::ZeroAmount);
                }
                let previous = &w.spend.previous;
                Ok(AccountState {
                    shares: previous.shares + w.amount,
                    unlocks_at: later(previous.unlocks_at, w.unlocks_at),
                    nonce: w.nonce,
                    ..*previous
                })
            }
            Self::Withdraw(w) => spend_shares(
                &w.spend.previous,
                w.spend.previous.shares,
                w.nonce,
                w.params.amount,
                w.params.relayer_fee,
                w.params.time_reference,
            ),
            Self::Send(w) => spend_shares(
                &w.spend.previous,
                w.spend.previous.shares,
                w.nonce,
                w.params.amount,
                w.params.relayer_fee,
                w.params.time_reference,
            ),
            Self::AbsorbSend(w) => {
                let note = w.claim.open()?;
                spend_shares(
                    &w.spend.previous,
                    w.spend.previous.shares + note.amount,
                    w.nonce,
                    w.params.amount,
                    w.params.relayer_fee,
                    w.params.time_reference,
                )
            }
            Self::AbsorbWithdraw(w) => {
                let note = w.claim.open()?;
                spend_shares(
                    &w.spend.previous,
                    w.spend.previous.shares + note.amount,
                    w.nonce,
                    w.params.amount,
                    w.params.relayer_fee,
                    w.params.time_reference,
                )
            }
        }
    }

    /// Enforce every transition constraint and build the public output
    pub fn validate(&self) -> Result<TransitionOutput> {
        let kind = self.kind();
        let output = match self {
            Self::Entry(w) => TransitionOutput::new(
                kind,
                None,
                Vec::new(),
                vec![(
                    AccountState::entry().commitment(&w.identity),
                    SettlementAdjustment::None,
                )],
            ),

            Self::Deposit(w) => {
                let nullifier = w.spend.check(w.nonce)?;
                let next = self.next_state()?;
                // The circuit commits to the pre-deposit baseline; settlement adds amount*G.
                let baseline = AccountState {
                    shares: w.spend.previous.shares,
                    ..next
                };
                TransitionOutput::new(
                    kind,
                    Some(w.spend.root),
                    vec![nullifier],
                    vec![(
                        baseline.commitment(&w.spend.identity),
                        SettlementAdjustment::Credit(w.amount),
                    )],
                )
            }

            Self::Withdraw(w) => {
                let nullifier = w.spend.check(w.nonce)?;
                let next = self.next_state()?;
                withdraw_output(kind, &w.spend, vec![nullifier], &next, &w.params)
            }

            Self::Send(w) => {
                let nullifier = w.spend.check(w.nonce)?;
                let next = self.next_state()?;
                send_output(kind, &w.spend, nullifier, vec![nullifier], &next, &w.params)
            }

            Self::AbsorbSend(w) => {
                let nullifier = w.spend.check(w.nonce)?;
                let note = w.claim.check(w.spend.root, w.spend.depth)?;
                let next = self.next_state()?;
                send_output(
                    kind,
                    &w.spend,
                    nullifier,
                    vec![nullifier, note.nullifier()],
                    &next,
                    &w.params,
                )
            }

            Self::AbsorbWithdraw(w) => {
                let nullifier = w.spend.check(w.nonce)?;
                let note = w.claim.check(w.spend.root, w.spend.depth)?;
                let next = self.next_state()?;
                withdraw_output(
                    kind,
                    &w.spend,
                    vec![nullifier, note.nullifier()],
                    &next,
                    &w.params,
                )
            }
        };

        debug!(
            "Validated {} at nonce {}: {} leaves, {} nullifiers",
            kind.as_str(),
            to_decimal(self.nonce()),
            output.leaves.len(),
            output.nullifiers.len()
        );
        Ok(output)
    }
}

fn withdraw_output(
    kind: TransitionKind,
    spend: &SpendWitness,
    nullifiers: Vec<FieldElement>,
    next: &AccountState,
    params: &WithdrawParams,
) -> TransitionOutput {
    let mut output = TransitionOutput::new(
        kind,
        Some(spend.root),
        nullifiers,
        vec![(next.commitment(&spend.identity), SettlementAdjustment::None)],
    );
    output.relayer_fee = params.relayer_fee;
    output.withdrawal = Some(Withdrawal {
        recipient: params.recipient,
        amount: params.amount,
    });
    output
}

/// `salt` is the spend nullifier: unique ledger-wide, so no two notes collide
fn send_output(
    kind: TransitionKind,
    spend: &SpendWitness,
    salt: FieldElement,
    nullifiers: Vec<FieldElement>,
    next: &AccountState,
    params: &SendParams,
) -> TransitionOutput {
    let (envelope, note_commitment) = params.seal(salt);
    let mut output = TransitionOutput::new(
        kind,
        Some(spend.root),
        nullifiers,
        vec![
            (next.commitment(&spend.identity), SettlementAdjustment::None),
            (note_commitment, SettlementAdjustment::None),
        ],
    );
    output.relayer_fee = params.relayer_fee;
    output.note = Some(envelope);
    output
}

/// Remove `amount + fee` from `balance` once the lock has expired
fn spend_shares(
    previous: &AccountState,
    balance: FieldElement,
    nonce: FieldElement,
    amount: FieldElement,
    fee: FieldElement,
    time_reference: FieldElement,
) -> Result<AccountState> {
    if amount == FieldElement::ZERO {
        return Err(TransitionError::ZeroAmount);
    }

    if to_biguint(time_reference) < to_biguint(previous.unlocks_at) {
        return Err(TransitionError::StillLocked {
            unlocks_at: to_decimal(previous.unlocks_at),
            now: to_decimal(time_reference),
        });
    }

    // Encoded form: shares_enc - amount - fee must stay >= 1
    let available = to_biguint(balance);
    let required = to_biguint(amount) + to_biguint(fee);
    if available < required {
        return Err(TransitionError::InsufficientShares {
            available: available.to_string(),
            required: required.to_string(),
        });
    }

    Ok(AccountState {
        shares: balance - amount - fee,
        nonce,
        ..*previous
    })
}

fn later(a: FieldElement, b: FieldElement) -> FieldElement {
    if to_biguint(a) >= to_biguint(b) { a } else { b }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DeclineReason;
    use shadevault_privacy::field::from_u64;
    use shadevault_privacy::{
        LeanImt, NoteKeypair, credit, leaf_of, prove_inclusion,
    };

    struct Fixture {
        leaves: Vec<FieldElement>,
    }

    impl Fixture {
        fn new() -> Self {
            // unrelated leaves so indices are not trivially zero
            Self {
                leaves: vec![from_u64(9001), from_u64(9002), from_u64(9003)],
            }
        }

        fn push(&mut self, leaf: FieldElement) -> u64 {
            self.leaves.push(leaf);
            (self.leaves.len() - 1) as u64
        }

        fn proof_for(&self, index: u64) -> (FieldElement, usize, shadevault_privacy::MerkleProof) {
            let tree = LeanImt::from_leaves(&self.leaves).unwrap();
            let proof =
                prove_inclusion(index, tree.depth(), &self.leaves, tree.size()).unwrap();
            (tree.root().unwrap(), tree.depth(), proof)
        }

        fn spend(&self, identity: AccountIdentity, previous: AccountState, index: u64) -> SpendWitness {
            let (root, depth, proof) = self.proof_for(index);
            SpendWitness {
                identity,
                previous,
                leaf_index: index,
                root,
                depth,
                proof,
            }
        }
    }

    fn alice() -> AccountIdentity {
        AccountIdentity::new(from_u64(0xa11ce), from_u64(1), from_u64(2))
    }

    fn bob() -> AccountIdentity {
        AccountIdentity::new(from_u64(0xb0b), from_u64(1), from_u64(2))
    }

    fn funded(fixture: &mut Fixture, identity: AccountIdentity, shares: u64) -> (AccountState, u64) {
        let state = AccountState {
            shares: from_u64(shares),
            nonce: from_u64(1),
            ..AccountState::entry()
        };
        let index = fixture.push(state.leaf(&identity));
        (state, index)
    }

    fn withdraw(spend: SpendWitness, amount: u64, fee: u64, now: u64) -> Transition {
        let nonce = spend.previous.nonce + from_u64(1);
        Transition::Withdraw(WithdrawWitness {
            spend,
            nonce,
            params: WithdrawParams {
                amount: from_u64(amount),
                relayer_fee: from_u64(fee),
                time_reference: from_u64(now),
                recipient: from_u64(0xdead),
            },
        })
    }

    #[test]
    fn test_entry_output() {
        let output = Transition::Entry(EntryWitness { identity: alice() })
            .validate()
            .unwrap();

        assert_eq!(output.kind, TransitionKind::Entry);
        assert_eq!(output.root, None);
        assert!(output.nullifiers.is_empty());
        assert_eq!(output.leaves, vec![AccountState::entry().leaf(&alice())]);
        assert_eq!(output.adjustments, vec![SettlementAdjustment::None]);
    }

    #[test]
    fn test_deposit_credits_after_circuit() {
        let mut fixture = Fixture::new();
        let entry = AccountState::entry();
        let index = fixture.push(entry.leaf(&alice()));

        let transition = Transition::Deposit(DepositWitness {
            spend: fixture.spend(alice(), entry, index),
            nonce: from_u64(1),
            amount: from_u64(1_000),
            unlocks_at: from_u64(50),
        });
        let output = transition.validate().unwrap();
        let next = transition.next_state().unwrap();

        assert_eq!(next.shares, from_u64(1_000));
        assert_eq!(next.unlocks_at, from_u64(50));

        let circuit = output.commitments[0];
        assert_eq!(circuit, AccountState { shares: entry.shares, ..next }.commitment(&alice()));
        assert_eq!(output.leaves[0], leaf_of(&credit(&circuit, from_u64(1_000))));
        assert_ne!(output.leaves[0], leaf_of(&circuit));
        assert_eq!(output.leaves[0], next.leaf(&alice()));
        assert_eq!(output.nullifiers, vec![alice().nonce_commitment(entry.nonce)]);
    }

    #[test]
    fn test_deposit_never_shortens_lock() {
        let mut fixture = Fixture::new();
        let locked = AccountState {
            unlocks_at: from_u64(500),
            ..AccountState::entry()
        };
        let index = fixture.push(locked.leaf(&alice()));

        let transition = Transition::Deposit(DepositWitness {
            spend: fixture.spend(alice(), locked, index),
            nonce: from_u64(1),
            amount: from_u64(1),
            unlocks_at: from_u64(100),
        });
        assert_eq!(transition.next_state().unwrap().unlocks_at, from_u64(500));
    }

    #[test]
    fn test_nonce_out_of_order() {
        let mut fixture = Fixture::new();
        let (state, index) = funded(&mut fixture, alice(), 100);

        let mut transition = withdraw(fixture.spend(alice(), state, index), 10, 0, 0);
        if let Transition::Withdraw(w) = &mut transition {
            w.nonce = from_u64(5);
        }

        let err = transition.validate().unwrap_err();
        assert_eq!(err.reason(), DeclineReason::NonceOutOfOrder);
    }

    #[test]
    fn test_wrong_previous_state_fails_inclusion() {
        let mut fixture = Fixture::new();
        let (state, index) = funded(&mut fixture, alice(), 100);

        // Claim more shares than the committed leaf holds.
        let forged = AccountState {
            shares: from_u64(1_000_000),
            ..state
        };
        let err = withdraw(fixture.spend(alice(), forged, index), 10, 0, 0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, TransitionError::InclusionProofMismatch { index: i } if i == index));
    }

    #[test]
    fn test_stale_root_fails_inclusion() {
        let mut fixture = Fixture::new();
        let (state, index) = funded(&mut fixture, alice(), 100);
        let mut spend = fixture.spend(alice(), state, index);
        spend.root += from_u64(1);

        let err = withdraw(spend, 10, 0, 0).validate().unwrap_err();
        assert_eq!(err.reason(), DeclineReason::InclusionProofMismatch);
    }

    #[test]
    fn test_withdraw_reduces_shares() {
        let mut fixture = Fixture::new();
        let (state, index) = funded(&mut fixture, alice(), 100);

        let transition = withdraw(fixture.spend(alice(), state, index), 60, 5, 0);
        let output = transition.validate().unwrap();
        let next = transition.next_state().unwrap();

        assert_eq!(next.shares, from_u64(35));
        assert_eq!(output.adjustments, vec![SettlementAdjustment::None]);
        assert_eq!(output.leaves[0], next.leaf(&alice()));
        assert_eq!(output.relayer_fee, from_u64(5));
        assert_eq!(
            output.withdrawal,
            Some(Withdrawal {
                recipient: from_u64(0xdead),
                amount: from_u64(60)
            })
        );
    }

    #[test]
    fn test_withdraw_entire_balance() {
        let mut fixture = Fixture::new();
        let (state, index) = funded(&mut fixture, alice(), 100);

        let transition = withdraw(fixture.spend(alice(), state, index), 90, 10, 0);
        assert!(transition.validate().is_ok());
        assert_eq!(transition.next_state().unwrap().shares, FieldElement::ZERO);
    }

    #[test]
    fn test_withdraw_insufficient_shares() {
        let mut fixture = Fixture::new();
        let (state, index) = funded(&mut fixture, alice(), 100);

        let err = withdraw(fixture.spend(alice(), state, index), 100, 1, 0)
            .validate()
            .unwrap_err();
        assert_eq!(err.reason(), DeclineReason::InsufficientShares);
    }

    #[test]
    fn test_withdraw_still_locked() {
        let mut fixture = Fixture::new();
        let state = AccountState {
            shares: from_u64(100),
            unlocks_at: from_u64(1_700_000_000),
            nonce: from_u64(1),
            ..AccountState::entry()
        };
        let index = fixture.push(state.leaf(&alice()));

        let early = withdraw(fixture.spend(alice(), state, index), 10, 0, 1_699_999_999);
        assert_eq!(early.validate().unwrap_err().reason(), DeclineReason::StillLocked);

        let on_time = withdraw(fixture.spend(alice(), state, index), 10, 0, 1_700_000_000);
        assert!(on_time.validate().is_ok());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut fixture = Fixture::new();
        let (state, index) = funded(&mut fixture, alice(), 100);

        let err = withdraw(fixture.spend(alice(), state, index), 0, 0, 0)
            .validate()
            .unwrap_err();
        assert_eq!(err.reason(), DeclineReason::InvalidAmount);
    }

    #[test]
    fn test_send_then_absorb_withdraw() {
        let mut fixture = Fixture::new();
        let (alice_state, alice_index) = funded(&mut fixture, alice(), 100);
        let bob_keys = NoteKeypair::from_secret(from_u64(424242));
        let note_key = NoteKeypair::from_secret(from_u64(777));

        let send = Transition::Send(SendWitness {
            spend: fixture.spend(alice(), alice_state, alice_index),
            nonce: from_u64(2),
            params: SendParams {
                amount: from_u64(40),
                relayer_fee: from_u64(1),
                time_reference: FieldElement::ZERO,
                note_key,
                receiver_public: bob_keys.public_key(),
            },
        });
        let sent = send.validate().unwrap();
        assert_eq!(sent.leaves.len(), 2);
        assert_eq!(send.next_state().unwrap().shares, from_u64(59));

        let envelope = sent.note.unwrap();
        assert_eq!(sent.leaves[1], envelope.note_leaf);
        for leaf in &sent.leaves {
            fixture.push(*leaf);
        }
        let note_index = (fixture.leaves.len() - 1) as u64;

        let bob_state = AccountState::entry();
        let bob_index = fixture.push(bob_state.leaf(&bob()));
        let spend = fixture.spend(bob(), bob_state, bob_index);
        let (_, _, note_proof) = fixture.proof_for(note_index);

        let absorb = Transition::AbsorbWithdraw(AbsorbWithdrawWitness {
            spend,
            nonce: from_u64(1),
            claim: NoteClaim {
                envelope,
                receiver: bob_keys,
                leaf_index: note_index,
                proof: note_proof,
            },
            params: WithdrawParams {
                amount: from_u64(30),
                relayer_fee: FieldElement::ZERO,
                time_reference: FieldElement::ZERO,
                recipient: from_u64(0xb0b),
            },
        });
        let absorbed = absorb.validate().unwrap();

        assert_eq!(absorb.next_state().unwrap().shares, from_u64(10));
        assert_eq!(absorbed.nullifiers.len(), 2);
        let opened = envelope.open(&bob_keys).unwrap();
        assert_eq!(absorbed.nullifiers[1], opened.nullifier());
    }

    fn send_params(amount: u64, fee: u64, note_key: NoteKeypair, to: &NoteKeypair) -> SendParams {
        SendParams {
            amount: from_u64(amount),
            relayer_fee: from_u64(fee),
            time_reference: FieldElement::ZERO,
            note_key,
            receiver_public: to.public_key(),
        }
    }

    #[test]
    fn test_absorb_send_folds_note_and_forwards() {
        let mut fixture = Fixture::new();
        let (alice_state, alice_index) = funded(&mut fixture, alice(), 100);
        let bob_keys = NoteKeypair::from_secret(from_u64(424242));
        let carol_keys = NoteKeypair::from_secret(from_u64(515151));

        let send = Transition::Send(SendWitness {
            spend: fixture.spend(alice(), alice_state, alice_index),
            nonce: from_u64(2),
            params: send_params(40, 0, NoteKeypair::from_secret(from_u64(777)), &bob_keys),
        });
        let sent = send.validate().unwrap();
        for leaf in &sent.leaves {
            fixture.push(*leaf);
        }
        let note_index = (fixture.leaves.len() - 1) as u64;
        let incoming = sent.note.unwrap();

        let (bob_state, bob_index) = funded(&mut fixture, bob(), 10);
        let spend = fixture.spend(bob(), bob_state, bob_index);
        let (_, _, note_proof) = fixture.proof_for(note_index);

        let absorb = Transition::AbsorbSend(AbsorbSendWitness {
            spend,
            nonce: from_u64(2),
            claim: NoteClaim {
                envelope: incoming,
                receiver: bob_keys,
                leaf_index: note_index,
                proof: note_proof,
            },
            params: send_params(15, 1, NoteKeypair::from_secret(from_u64(888)), &carol_keys),
        });
        let output = absorb.validate().unwrap();
        let next = absorb.next_state().unwrap();

        // 10 held + 40 absorbed - 15 sent - 1 fee
        assert_eq!(next.shares, from_u64(34));
        assert_eq!(output.kind, TransitionKind::AbsorbSend);
        assert_eq!(output.leaves.len(), 2);
        assert_eq!(output.leaves[0], next.leaf(&bob()));

        let outgoing = output.note.unwrap();
        assert_eq!(output.leaves[1], outgoing.note_leaf);
        assert_ne!(outgoing.note_leaf, incoming.note_leaf);
        assert_eq!(outgoing.open(&carol_keys).unwrap().amount, from_u64(15));

        let absorbed = incoming.open(&bob_keys).unwrap();
        assert_eq!(
            output.nullifiers,
            vec![bob().nonce_commitment(bob_state.nonce), absorbed.nullifier()]
        );
        assert_eq!(output.relayer_fee, from_u64(1));
        assert_eq!(output.withdrawal, None);
    }

    #[test]
    fn test_reused_note_key_yields_distinct_notes() {
        let mut fixture = Fixture::new();
        let (state, index) = funded(&mut fixture, alice(), 100);
        let bob_keys = NoteKeypair::from_secret(from_u64(424242));
        let reused = NoteKeypair::from_secret(from_u64(777));

        let first = Transition::Send(SendWitness {
            spend: fixture.spend(alice(), state, index),
            nonce: from_u64(2),
            params: send_params(20, 0, reused, &bob_keys),
        });
        let first_out = first.validate().unwrap();
        let after_first = first.next_state().unwrap();
        let index = fixture.push(first_out.leaves[0]);
        fixture.push(first_out.leaves[1]);

        let second = Transition::Send(SendWitness {
            spend: fixture.spend(alice(), after_first, index),
            nonce: from_u64(3),
            params: send_params(20, 0, reused, &bob_keys),
        });
        let second_out = second.validate().unwrap();

        let a = first_out.note.unwrap();
        let b = second_out.note.unwrap();
        assert_ne!(a.note_leaf, b.note_leaf);
        assert_ne!(a.encrypted_amount, b.encrypted_amount);
        assert_eq!(a.salt, first_out.nullifiers[0]);
        assert_eq!(b.salt, second_out.nullifiers[0]);

        let (a, b) = (a.open(&bob_keys).unwrap(), b.open(&bob_keys).unwrap());
        assert_eq!(a.amount, b.amount);
        assert_ne!(a.nullifier(), b.nullifier());
    }

    #[test]
    fn test_absorb_with_wrong_key_declined() {
        let mut fixture = Fixture::new();
        let bob_keys = NoteKeypair::from_secret(from_u64(5));
        let sender = NoteKeypair::from_secret(from_u64(6));
        let envelope =
            NoteEnvelope::seal(&sender, &bob_keys.public_key(), from_u64(10), from_u64(3));
        let note_index = fixture.push(envelope.note_leaf);

        let (state, index) = funded(&mut fixture, alice(), 0);
        let spend = fixture.spend(alice(), state, index);
        let (_, _, proof) = fixture.proof_for(note_index);

        let absorb = Transition::AbsorbSend(AbsorbSendWitness {
            spend,
            nonce: from_u64(2),
            claim: NoteClaim {
                envelope,
                receiver: NoteKeypair::from_secret(from_u64(99)),
                leaf_index: note_index,
                proof,
            },
            params: SendParams {
                amount: from_u64(1),
                relayer_fee: FieldElement::ZERO,
                time_reference: FieldElement::ZERO,
                note_key: sender,
                receiver_public: bob_keys.public_key(),
            },
        });
        assert_eq!(absorb.validate().unwrap_err().reason(), DeclineReason::NoteMismatch);
    }

    #[test]
    fn test_output_serializes() {
        let output = Transition::Entry(EntryWitness { identity: alice() })
            .validate()
            .unwrap();
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"kind\":\"entry\""));

        let back: TransitionOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, output);
    }
}
