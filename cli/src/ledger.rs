//! Commands that read or extend the local ledger snapshot

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shadevault_config::ShadevaultConfig;
use shadevault_core::{LedgerState, SharedLedger, TransitionOutput};
use shadevault_privacy::field::{parse, serde_field, serde_field_opt, to_decimal};
use shadevault_privacy::{FieldElement, MerkleProof, verify_inclusion};
use std::fs;
use std::io::Read;

/// Everything a verifier needs to check one leaf against a root
#[derive(Debug, Serialize, Deserialize)]
pub struct InclusionReport {
    #[serde(with = "serde_field")]
    pub leaf: FieldElement,
    pub leaf_index: u64,
    pub depth: usize,
    #[serde(with = "serde_field")]
    pub root: FieldElement,
    pub proof: MerkleProof,
}

fn open(config: &ShadevaultConfig) -> Result<LedgerState> {
    let path = config.snapshot_path();
    log::debug!("Opening ledger snapshot {}", path.display());
    LedgerState::load(&path, config.ledger.root_history)
        .with_context(|| format!("Failed to load ledger snapshot: {}", path.display()))
}

/// Append raw leaves and persist the snapshot
pub fn insert(config: &ShadevaultConfig, leaves: &[String]) -> Result<()> {
    if leaves.is_empty() {
        bail!("Usage: insert <leaf> [leaf...]");
    }

    let mut ledger = open(config)?;
    let mut indices = Vec::with_capacity(leaves.len());
    for raw in leaves {
        let leaf = parse(raw).with_context(|| format!("Invalid leaf: {}", raw))?;
        indices.push(ledger.insert_leaf(leaf)?);
    }

    let path = config.snapshot_path();
    ledger
        .persist(&path)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;

    print_json(&json!({
        "indices": indices,
        "root": ledger.root().map(to_decimal),
        "size": ledger.size(),
        "depth": ledger.depth(),
    }))
}

pub fn status(config: &ShadevaultConfig) -> Result<()> {
    let ledger = open(config)?;

    #[derive(Serialize)]
    struct Status<'a> {
        snapshot: String,
        size: u64,
        depth: usize,
        #[serde(with = "serde_field_opt")]
        root: Option<FieldElement>,
        nullifiers: usize,
        root_history: usize,
        chain_id: u64,
        token_address: Option<&'a str>,
    }

    print_json(&Status {
        snapshot: config.snapshot_path().display().to_string(),
        size: ledger.size(),
        depth: ledger.depth(),
        root: ledger.root(),
        nullifiers: ledger.nullifier_count(),
        root_history: config.ledger.root_history,
        chain_id: config.network.chain_id,
        token_address: config.network.token_address.as_deref(),
    })
}

/// Inclusion proof for the leaf at `index` under the current root
pub fn prove(config: &ShadevaultConfig, index: &str) -> Result<()> {
    let leaf_index: u64 = index
        .parse()
        .with_context(|| format!("Leaf index must be a number: {}", index))?;

    let ledger = open(config)?;
    let Some(root) = ledger.root() else {
        bail!("Ledger is empty");
    };
    let Some(leaf) = ledger.leaf(leaf_index) else {
        bail!("No leaf at index {} (size {})", leaf_index, ledger.size());
    };

    print_json(&InclusionReport {
        leaf,
        leaf_index,
        depth: ledger.depth(),
        root,
        proof: ledger.prove(leaf_index)?,
    })
}

/// Check a report produced by `prove`; `-` reads it from stdin
///
/// Returns whether the proof holds.
pub fn verify(config: &ShadevaultConfig, source: &str) -> Result<bool> {
    let report: InclusionReport =
        serde_json::from_str(&read_source(source)?).context("Malformed proof report")?;

    let valid = verify_inclusion(
        report.leaf,
        report.leaf_index,
        report.depth,
        report.root,
        &report.proof,
    );

    // A missing snapshot just means the root cannot be checked for recency.
    let known_root = open(config)
        .map(|ledger| ledger.is_known_root(&report.root))
        .unwrap_or(false);

    print_json(&json!({
        "valid": valid,
        "known_root": known_root,
        "leaf_index": report.leaf_index,
    }))?;
    Ok(valid)
}

/// Settle a transition output against the snapshot; `-` reads it from stdin
///
/// The snapshot is rewritten before the output counts as accepted. Returns
/// whether the ledger accepted it.
pub fn submit(config: &ShadevaultConfig, source: &str) -> Result<bool> {
    let output: TransitionOutput =
        serde_json::from_str(&read_source(source)?).context("Malformed transition output")?;

    let path = config.snapshot_path();
    let ledger = SharedLedger::open(&path, config.ledger.root_history, true)
        .with_context(|| format!("Failed to load ledger snapshot: {}", path.display()))?;

    match ledger.submit(&output) {
        Ok(indices) => {
            let state = ledger.read();
            print_json(&json!({
                "accepted": true,
                "kind": output.kind,
                "indices": indices,
                "root": state.root().map(to_decimal),
                "size": state.size(),
            }))?;
            Ok(true)
        }
        Err(e) => {
            print_json(&json!({
                "accepted": false,
                "kind": output.kind,
                "reason": e.reason(),
                "error": e.to_string(),
            }))?;
            Ok(false)
        }
    }
}

fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        fs::read_to_string(source).with_context(|| format!("Failed to read {}", source))
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadevault_core::transition::{EntryWitness, Transition};
    use shadevault_privacy::AccountIdentity;
    use shadevault_privacy::field::from_u64;
    use std::path::Path;

    fn config_at(path: &Path) -> ShadevaultConfig {
        let mut config = ShadevaultConfig::default();
        config.ledger.snapshot_path = path.display().to_string();
        config
    }

    fn entry_output(user: u64) -> TransitionOutput {
        Transition::Entry(EntryWitness {
            identity: AccountIdentity::new(from_u64(user), from_u64(1), from_u64(2)),
        })
        .validate()
        .unwrap()
    }

    #[test]
    fn test_submit_persists_accepted_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(&dir.path().join("ledger.json"));
        let source = dir.path().join("entry.json");
        fs::write(&source, serde_json::to_string(&entry_output(1)).unwrap()).unwrap();

        assert!(submit(&config, source.to_str().unwrap()).unwrap());

        let ledger = LedgerState::load(&config.snapshot_path(), 10).unwrap();
        assert_eq!(ledger.size(), 1);
        assert_eq!(ledger.leaf(0), entry_output(1).account_leaf());
    }

    #[test]
    fn test_submit_declines_tampered_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(&dir.path().join("ledger.json"));

        let mut output = entry_output(1);
        output.leaves[0] += from_u64(1);
        let source = dir.path().join("entry.json");
        fs::write(&source, serde_json::to_string(&output).unwrap()).unwrap();

        assert!(!submit(&config, source.to_str().unwrap()).unwrap());
        assert!(!config.snapshot_path().exists());
    }

    #[test]
    fn test_submit_rejects_malformed_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(&dir.path().join("ledger.json"));
        let source = dir.path().join("junk.json");
        fs::write(&source, "{}").unwrap();

        assert!(submit(&config, source.to_str().unwrap()).is_err());
    }
}
