//! Client-side account reconstruction
//!
//! An [`AccountTracker`] follows one account through its nonce chain. It
//! builds witnesses against a ledger view and adopts the settled state once
//! the ledger has accepted the output.

use ark_ff::{AdditiveGroup, Field};
use log::debug;
use shadevault_privacy::field::to_decimal;
use shadevault_privacy::{
    AccountIdentity, AccountState, CurvePoint, FieldElement, NoteEnvelope, NoteKeypair,
};

use crate::errors::{Result, TransitionError};
use crate::storage::LedgerState;
use crate::transition::{
    AbsorbSendWitness, AbsorbWithdrawWitness, DepositWitness, EntryWitness, NoteClaim,
    SendParams, SendWitness, SpendWitness, Transition, TransitionOutput, WithdrawParams,
    WithdrawWitness,
};

#[derive(Debug, Clone)]
pub struct AccountTracker {
    identity: AccountIdentity,
    note_keys: NoteKeypair,
    state: Option<AccountState>,
    leaf_index: Option<u64>,
}

impl AccountTracker {
    pub fn new(identity: AccountIdentity, note_keys: NoteKeypair) -> Self {
        Self {
            identity,
            note_keys,
            state: None,
            leaf_index: None,
        }
    }

    pub fn identity(&self) -> &AccountIdentity {
        &self.identity
    }

    /// Key senders address notes to
    pub fn public_key(&self) -> CurvePoint {
        self.note_keys.public_key()
    }

    pub fn state(&self) -> Option<&AccountState> {
        self.state.as_ref()
    }

    pub fn leaf_index(&self) -> Option<u64> {
        self.leaf_index
    }

    pub fn shares(&self) -> FieldElement {
        self.state.map_or(FieldElement::ZERO, |s| s.shares)
    }

    /// Nonce the next accepted transition must carry
    pub fn next_nonce(&self) -> FieldElement {
        self.state
            .map_or(FieldElement::ZERO, |s| s.nonce + FieldElement::ONE)
    }

    pub fn entry(&self) -> Result<Transition> {
        if self.state.is_some() {
            return Err(TransitionError::NonceOutOfOrder {
                expected: to_decimal(self.next_nonce()),
                got: "0".into(),
            });
        }
        Ok(Transition::Entry(EntryWitness {
            identity: self.identity,
        }))
    }

    pub fn deposit(
        &self,
        ledger: &LedgerState,
        amount: FieldElement,
        unlocks_at: FieldElement,
    ) -> Result<Transition> {
        Ok(Transition::Deposit(DepositWitness {
            spend: self.spend_witness(ledger)?,
            nonce: self.next_nonce(),
            amount,
            unlocks_at,
        }))
    }

    pub fn withdraw(&self, ledger: &LedgerState, params: WithdrawParams) -> Result<Transition> {
        Ok(Transition::Withdraw(WithdrawWitness {
            spend: self.spend_witness(ledger)?,
            nonce: self.next_nonce(),
            params,
        }))
    }

    pub fn send(&self, ledger: &LedgerState, params: SendParams) -> Result<Transition> {
        Ok(Transition::Send(SendWitness {
            spend: self.spend_witness(ledger)?,
            nonce: self.next_nonce(),
            params,
        }))
    }

    pub fn absorb_send(
        &self,
        ledger: &LedgerState,
        envelope: NoteEnvelope,
        params: SendParams,
    ) -> Result<Transition> {
        Ok(Transition::AbsorbSend(AbsorbSendWitness {
            spend: self.spend_witness(ledger)?,
            nonce: self.next_nonce(),
            claim: self.note_claim(ledger, envelope)?,
            params,
        }))
    }

    pub fn absorb_withdraw(
        &self,
        ledger: &LedgerState,
        envelope: NoteEnvelope,
        params: WithdrawParams,
    ) -> Result<Transition> {
        Ok(Transition::AbsorbWithdraw(AbsorbWithdrawWitness {
            spend: self.spend_witness(ledger)?,
            nonce: self.next_nonce(),
            claim: self.note_claim(ledger, envelope)?,
            params,
        }))
    }

    /// Adopt the settled state of an accepted transition
    ///
    /// `indices` are the leaf positions the ledger returned for `output`.
    pub fn observe(
        &mut self,
        transition: &Transition,
        output: &TransitionOutput,
        indices: &[u64],
    ) -> Result<()> {
        let expected = self.next_nonce();
        if transition.nonce() != expected {
            return Err(TransitionError::NonceOutOfOrder {
                expected: to_decimal(expected),
                got: to_decimal(transition.nonce()),
            });
        }

        let next = transition.next_state()?;
        let leaf = next.leaf(&self.identity);
        let index = match (output.account_leaf(), indices.first()) {
            (Some(published), Some(index)) if published == leaf => *index,
            _ => return Err(TransitionError::SettlementMismatch { position: 0 }),
        };

        debug!(
            "Account advanced to nonce {} at leaf {}",
            to_decimal(next.nonce),
            index
        );
        self.state = Some(next);
        self.leaf_index = Some(index);
        Ok(())
    }

    fn spend_witness(&self, ledger: &LedgerState) -> Result<SpendWitness> {
        let (Some(previous), Some(leaf_index)) = (self.state, self.leaf_index) else {
            return Err(TransitionError::NonceOutOfOrder {
                expected: "0".into(),
                got: to_decimal(self.next_nonce() + FieldElement::ONE),
            });
        };

        // The ledger must still hold our leaf where we last saw it.
        let root = ledger.root();
        let stored = ledger.leaf(leaf_index);
        let (Some(root), Some(stored)) = (root, stored) else {
            return Err(TransitionError::InclusionProofMismatch { index: leaf_index });
        };
        if stored != previous.leaf(&self.identity) {
            return Err(TransitionError::InclusionProofMismatch { index: leaf_index });
        }

        Ok(SpendWitness {
            identity: self.identity,
            previous,
            leaf_index,
            root,
            depth: ledger.depth(),
            proof: ledger.prove(leaf_index)?,
        })
    }

    fn note_claim(&self, ledger: &LedgerState, envelope: NoteEnvelope) -> Result<NoteClaim> {
        let leaf_index = ledger
            .leaf_index(&envelope.note_leaf)
            .ok_or(TransitionError::NoteMismatch)?;
        Ok(NoteClaim {
            envelope,
            receiver: self.note_keys,
            leaf_index,
            proof: ledger.prove(leaf_index)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DeclineReason;
    use shadevault_privacy::field::from_u64;

    fn tracker(user: u64) -> AccountTracker {
        AccountTracker::new(
            AccountIdentity::new(from_u64(user), from_u64(1), from_u64(2)),
            NoteKeypair::from_secret(from_u64(user * 31 + 7)),
        )
    }

    fn run(ledger: &mut LedgerState, account: &mut AccountTracker, transition: Transition) {
        let output = transition.validate().unwrap();
        let indices = ledger.apply(&output).unwrap();
        account.observe(&transition, &output, &indices).unwrap();
    }

    #[test]
    fn test_entry_then_deposit() {
        let mut ledger = LedgerState::default();
        let mut account = tracker(1);

        let entry = account.entry().unwrap();
        run(&mut ledger, &mut account, entry);
        assert_eq!(account.leaf_index(), Some(0));
        assert_eq!(account.next_nonce(), from_u64(1));

        let deposit = account
            .deposit(&ledger, from_u64(300), FieldElement::ZERO)
            .unwrap();
        run(&mut ledger, &mut account, deposit);

        assert_eq!(account.shares(), from_u64(300));
        assert_eq!(account.leaf_index(), Some(1));
        assert_eq!(
            ledger.leaf(1),
            Some(account.state().unwrap().leaf(account.identity()))
        );
    }

    #[test]
    fn test_second_entry_rejected() {
        let mut ledger = LedgerState::default();
        let mut account = tracker(1);
        let entry = account.entry().unwrap();
        run(&mut ledger, &mut account, entry);

        let err = account.entry().unwrap_err();
        assert_eq!(err.reason(), DeclineReason::NonceOutOfOrder);
    }

    #[test]
    fn test_spend_before_entry_rejected() {
        let ledger = LedgerState::default();
        let err = tracker(1)
            .deposit(&ledger, from_u64(1), FieldElement::ZERO)
            .unwrap_err();
        assert_eq!(err.reason(), DeclineReason::NonceOutOfOrder);
    }

    #[test]
    fn test_observe_out_of_order() {
        let mut ledger = LedgerState::default();
        let mut account = tracker(1);
        let entry = account.entry().unwrap();
        run(&mut ledger, &mut account, entry);

        let deposit = account
            .deposit(&ledger, from_u64(5), FieldElement::ZERO)
            .unwrap();
        let output = deposit.validate().unwrap();
        let indices = ledger.apply(&output).unwrap();
        account.observe(&deposit, &output, &indices).unwrap();

        // Replaying the same observation must not advance twice.
        let err = account.observe(&deposit, &output, &indices).unwrap_err();
        assert_eq!(err.reason(), DeclineReason::NonceOutOfOrder);
    }

    #[test]
    fn test_ledger_without_our_leaf() {
        let mut ledger = LedgerState::default();
        let mut account = tracker(1);
        let entry = account.entry().unwrap();
        run(&mut ledger, &mut account, entry);

        let foreign = LedgerState::default();
        let err = account
            .deposit(&foreign, from_u64(5), FieldElement::ZERO)
            .unwrap_err();
        assert_eq!(err.reason(), DeclineReason::InclusionProofMismatch);
    }
}
