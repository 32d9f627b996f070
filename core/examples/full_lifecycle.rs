use ark_ff::AdditiveGroup;
use shadevault_core::transition::{SendParams, WithdrawParams};
use shadevault_core::{AccountTracker, LedgerState, SharedLedger, Transition};
use shadevault_privacy::field::{from_u64, to_decimal};
use shadevault_privacy::{AccountIdentity, FieldElement, NoteKeypair};

fn settle(
    ledger: &SharedLedger,
    account: &mut AccountTracker,
    transition: Transition,
) -> anyhow::Result<()> {
    let output = transition.validate()?;
    let indices = ledger.submit(&output)?;
    account.observe(&transition, &output, &indices)?;
    println!(
        "✅ {} settled at leaves {:?}, shares now {}",
        output.kind.as_str(),
        indices,
        to_decimal(account.shares())
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut rng = ark_std::test_rng();
    let token = from_u64(0xcafe);
    let ledger = SharedLedger::new(LedgerState::default());

    // 1. Two accounts on the same chain and asset
    let mut alice = AccountTracker::new(
        AccountIdentity::new(from_u64(0xa11ce), from_u64(1), token),
        NoteKeypair::random(&mut rng),
    );
    let mut bob = AccountTracker::new(
        AccountIdentity::new(from_u64(0xb0b), from_u64(1), token),
        NoteKeypair::random(&mut rng),
    );
    println!("👤 Alice spending key: {}", to_decimal(alice.identity().spending_key()));
    println!("👤 Bob spending key:   {}", to_decimal(bob.identity().spending_key()));

    // 2. Entry
    let entry = alice.entry()?;
    settle(&ledger, &mut alice, entry)?;
    let entry = bob.entry()?;
    settle(&ledger, &mut bob, entry)?;

    // 3. Deposit 1000, locked until t=100
    let deposit = alice.deposit(&ledger.read(), from_u64(1_000), from_u64(100))?;
    settle(&ledger, &mut alice, deposit)?;

    // 4. Send 250 to Bob once unlocked
    let send = alice.send(
        &ledger.read(),
        SendParams {
            amount: from_u64(250),
            relayer_fee: from_u64(2),
            time_reference: from_u64(100),
            note_key: NoteKeypair::random(&mut rng),
            receiver_public: bob.public_key(),
        },
    )?;
    let output = send.validate()?;
    let indices = ledger.submit(&output)?;
    alice.observe(&send, &output, &indices)?;
    let envelope = output
        .note
        .ok_or_else(|| anyhow::anyhow!("send published no note"))?;
    println!("📨 Note leaf {} at index {}", to_decimal(envelope.note_leaf), indices[1]);

    // 5. Bob absorbs the note and withdraws part of it
    let absorb = bob.absorb_withdraw(
        &ledger.read(),
        envelope,
        WithdrawParams {
            amount: from_u64(200),
            relayer_fee: FieldElement::ZERO,
            time_reference: from_u64(100),
            recipient: from_u64(0xb0b),
        },
    )?;
    settle(&ledger, &mut bob, absorb)?;

    let state = ledger.read();
    println!(
        "🎉 Ledger: {} leaves, depth {}, root {}",
        state.size(),
        state.depth(),
        state.root().map(to_decimal).unwrap_or_default()
    );
    Ok(())
}
