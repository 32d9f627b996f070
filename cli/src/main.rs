mod ledger;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::json;
use shadevault_config::ShadevaultConfig;
use shadevault_privacy::field::{from_u64, parse, to_decimal, to_hex};
use shadevault_privacy::{AccountIdentity, AccountState, CurvePoint, FieldElement, leaf_of};
use std::env;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let cmd = args[1].as_str();
    let rest = &args[2..];
    let config = ShadevaultConfig::global();

    let result = match cmd {
        "spending-key" => spending_key(config, rest),
        "entry-leaf" => entry_leaf(config, rest),
        "commit" => commit(config, rest),
        "leaf" => leaf(rest),
        "insert" => ledger::insert(config, rest),
        "status" => ledger::status(config),
        "prove" => match rest.first() {
            Some(index) => ledger::prove(config, index),
            None => Err(anyhow!("Usage: prove <leaf_index>")),
        },
        "verify" => {
            let source = rest.first().map(String::as_str).unwrap_or("-");
            match ledger::verify(config, source) {
                Ok(true) => Ok(()),
                Ok(false) => std::process::exit(1),
                Err(e) => Err(e),
            }
        }
        "submit" => {
            let source = rest.first().map(String::as_str).unwrap_or("-");
            match ledger::submit(config, source) {
                Ok(true) => Ok(()),
                Ok(false) => std::process::exit(1),
                Err(e) => Err(e),
            }
        }
        "sample-config" => {
            print!("{}", ShadevaultConfig::generate_sample());
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        _ => {
            println!("❌ Unknown command: {}", cmd);
            println!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error running {}: {:#}", cmd, e);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Shadevault CLI - shielded vault reconstruction and inspection");
    println!();
    println!("USAGE:");
    println!("  shadevault <command> [args]");
    println!();
    println!("ACCOUNT COMMANDS:");
    println!("  spending-key <user_key> [identity]      Derive the spending key");
    println!("  entry-leaf <user_key> [identity]        Leaf an entry transition inserts");
    println!("  commit <user_key> [identity] [state]    Commitment point and leaf for a state");
    println!("  leaf <x> <y>                            Leaf for a commitment point");
    println!();
    println!("LEDGER COMMANDS:");
    println!("  insert <leaf> [leaf...]                 Append leaves to the snapshot");
    println!("  status                                  Size, depth and root of the snapshot");
    println!("  prove <leaf_index>                      Inclusion proof under the current root");
    println!("  verify [file|-]                         Check a proof printed by `prove`");
    println!("  submit [file|-]                         Settle a transition output into the snapshot");
    println!();
    println!("OTHER COMMANDS:");
    println!("  sample-config                           Print a sample config file");
    println!("  help                                    Show this help message");
    println!();
    println!("IDENTITY OPTIONS:");
    println!("  --chain <id>                            Chain id (default: network.chain_id)");
    println!("  --token <address>                       Token (default: network.token_address)");
    println!();
    println!("STATE OPTIONS (commit):");
    println!("  --shares <n>  --nullifier <n>  --unlocks-at <t>  --nonce <n>   (all default 0)");
    println!();
    println!("Field elements are decimal or 0x-prefixed hex.");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("  SV_CONFIG            Config file path");
    println!("  SV_SNAPSHOT_PATH     Ledger snapshot path");
    println!("  SV_CHAIN_ID          Default chain id");
    println!("  SV_TOKEN             Default token address");
    println!("  RUST_LOG             Log level (debug/info/warn/error)");
}

/// `<user_key> [--flag value]...`
struct ParsedArgs<'a> {
    user_key: &'a str,
    flags: Vec<(&'a str, &'a str)>,
}

impl<'a> ParsedArgs<'a> {
    fn parse(args: &'a [String], allowed: &[&str]) -> Result<Self> {
        let Some(user_key) = args.first().map(String::as_str) else {
            bail!("Missing <user_key>");
        };

        let mut flags = Vec::new();
        let mut iter = args[1..].iter();
        while let Some(flag) = iter.next() {
            if !allowed.contains(&flag.as_str()) {
                bail!("Unexpected argument: {}", flag);
            }
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("{} requires a value", flag))?;
            flags.push((flag.as_str(), value.as_str()));
        }

        Ok(Self { user_key, flags })
    }

    fn get(&self, flag: &str) -> Option<&'a str> {
        self.flags
            .iter()
            .rev()
            .find(|(name, _)| *name == flag)
            .map(|(_, value)| *value)
    }

    fn field(&self, flag: &str) -> Result<Option<FieldElement>> {
        self.get(flag)
            .map(|raw| parse(raw).with_context(|| format!("Invalid {}: {}", flag, raw)))
            .transpose()
    }

    fn identity(&self, config: &ShadevaultConfig) -> Result<AccountIdentity> {
        let user_key = parse(self.user_key)
            .with_context(|| format!("Invalid user key: {}", self.user_key))?;
        let chain_id = self
            .field("--chain")?
            .unwrap_or_else(|| from_u64(config.network.chain_id));
        let token_address = match self.field("--token")? {
            Some(token) => token,
            None => {
                let configured = config.network.token_address.as_deref().ok_or_else(|| {
                    anyhow!("No token given: pass --token or set network.token_address")
                })?;
                parse(configured)
                    .with_context(|| format!("Invalid configured token: {}", configured))?
            }
        };
        Ok(AccountIdentity::new(user_key, chain_id, token_address))
    }
}

const IDENTITY_FLAGS: &[&str] = &["--chain", "--token"];
const STATE_FLAGS: &[&str] = &[
    "--chain",
    "--token",
    "--shares",
    "--nullifier",
    "--unlocks-at",
    "--nonce",
];

fn spending_key(config: &ShadevaultConfig, args: &[String]) -> Result<()> {
    let identity = ParsedArgs::parse(args, IDENTITY_FLAGS)?.identity(config)?;
    let key = identity.spending_key();
    ledger::print_json(&json!({
        "identity": identity,
        "spending_key": to_decimal(key),
        "spending_key_hex": to_hex(key),
    }))
}

fn entry_leaf(config: &ShadevaultConfig, args: &[String]) -> Result<()> {
    let identity = ParsedArgs::parse(args, IDENTITY_FLAGS)?.identity(config)?;
    let state = AccountState::entry();
    ledger::print_json(&json!({
        "identity": identity,
        "commitment": state.commitment(&identity),
        "leaf": to_decimal(state.leaf(&identity)),
    }))
}

fn commit(config: &ShadevaultConfig, args: &[String]) -> Result<()> {
    let parsed = ParsedArgs::parse(args, STATE_FLAGS)?;
    let identity = parsed.identity(config)?;
    let mut state = AccountState::entry();
    if let Some(shares) = parsed.field("--shares")? {
        state.shares = shares;
    }
    if let Some(nullifier) = parsed.field("--nullifier")? {
        state.nullifier = nullifier;
    }
    if let Some(unlocks_at) = parsed.field("--unlocks-at")? {
        state.unlocks_at = unlocks_at;
    }
    if let Some(nonce) = parsed.field("--nonce")? {
        state.nonce = nonce;
    }

    ledger::print_json(&json!({
        "identity": identity,
        "state": state,
        "nonce_commitment": to_decimal(identity.nonce_commitment(state.nonce)),
        "commitment": state.commitment(&identity),
        "leaf": to_decimal(state.leaf(&identity)),
    }))
}

fn leaf(args: &[String]) -> Result<()> {
    let [x, y] = args else {
        bail!("Usage: leaf <x> <y>");
    };
    let x = parse(x).with_context(|| format!("Invalid x: {}", x))?;
    let y = parse(y).with_context(|| format!("Invalid y: {}", y))?;
    let point = CurvePoint::new(x, y)?;
    ledger::print_json(&json!({ "leaf": to_decimal(leaf_of(&point)) }))
}
