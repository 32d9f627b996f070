use ark_ff::{AdditiveGroup, Field};
use shadevault_privacy::field::{from_u64, parse};
use shadevault_privacy::{
    AccountIdentity, AccountState, FieldElement, GENERATOR_G, LeanImt, commit, credit,
    derive_nonce_commitment, derive_spending_key, leaf_of, prove_inclusion, verify_inclusion,
};

fn identity() -> AccountIdentity {
    AccountIdentity::new(
        parse("0x1234567890abcdef").unwrap(),
        from_u64(1),
        parse("0x02").unwrap(),
    )
}

#[test]
fn entry_leaf_is_a_stable_golden_vector() {
    let id = identity();
    let spending_key = derive_spending_key(id.user_key, id.chain_id, id.token_address);
    let nonce_commitment = derive_nonce_commitment(spending_key, FieldElement::ZERO, id.token_address);

    assert_eq!(
        spending_key,
        parse("18664387727888208612498386164076728905758493740320394166672953019206495030348")
            .unwrap()
    );
    assert_eq!(
        nonce_commitment,
        parse("19100361971983440766918453816810761528203243000223889322858313490922159749426")
            .unwrap()
    );

    let one = FieldElement::ONE;
    let commitment = commit(one, one, spending_key, one, nonce_commitment);
    assert_eq!(
        commitment.x,
        parse("18023885324430430464072133335457206310151947346462660382173337732477684685365")
            .unwrap()
    );
    assert_eq!(
        commitment.y,
        parse("536642952563341289343725144538420830505849024587641143418070018223760213950")
            .unwrap()
    );

    let golden = parse("0x26fab8c352abb335c2c35b9eefe0f490b987be57e5dd5eaf6580c6523df7662e").unwrap();
    assert_eq!(
        golden,
        parse("17630875199582369614712853347525137051163541136469241706779434398791906059822")
            .unwrap()
    );
    assert_eq!(leaf_of(&commitment), golden);

    // Recomputed through the high-level API, in a fresh tree.
    let mut tree = LeanImt::new();
    let root = tree.insert(AccountState::entry().leaf(&id)).unwrap();
    assert_eq!(root, golden);
}

#[test]
fn deposit_leaf_includes_settlement_addition() {
    let id = identity();
    let amount = from_u64(1_000);

    // The circuit commits to the pre-deposit share baseline at nonce 1.
    let circuit_state = AccountState::entry().advance();
    let circuit_commitment = circuit_state.commitment(&id);

    let inserted = leaf_of(&circuit_commitment.add(&GENERATOR_G.scalar_mul(amount)));
    assert_eq!(inserted, leaf_of(&credit(&circuit_commitment, amount)));
    assert_ne!(inserted, leaf_of(&circuit_commitment));

    let settled = AccountState {
        shares: amount,
        ..circuit_state
    };
    assert_eq!(inserted, settled.leaf(&id));
}

#[test]
fn account_history_stays_provable() {
    let id = identity();
    let mut tree = LeanImt::new();
    let mut leaves = Vec::new();

    let mut state = AccountState::entry();
    for step in 0..5u64 {
        let leaf = state.leaf(&id);
        tree.insert(leaf).unwrap();
        leaves.push(leaf);
        state = AccountState {
            shares: state.shares + from_u64(10 * (step + 1)),
            ..state.advance()
        };
    }

    let root = tree.root().unwrap();
    for (index, leaf) in leaves.iter().enumerate() {
        let proof = prove_inclusion(index as u64, tree.depth(), &leaves, tree.size()).unwrap();
        assert!(verify_inclusion(*leaf, index as u64, tree.depth(), root, &proof));
    }
}
