//! Shadevault Configuration
//!
//! Shared configuration crate for the ledger tooling.
//!
//! Handles loading configuration from:
//! 1. SV_CONFIG env var (explicit path)
//! 2. ./shadevault.toml (current directory)
//! 3. ~/.shadevault/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

/// Process-wide config, loaded on first use
static GLOBAL_CONFIG: OnceLock<ShadevaultConfig> = OnceLock::new();

const LOCAL_CONFIG_FILE: &str = "shadevault.toml";
const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".shadevault";

const DEFAULT_SNAPSHOT_PATH: &str = "./shadevault-ledger.json";
const DEFAULT_ROOT_HISTORY: usize = 100;
const DEFAULT_CHAIN_ID: u64 = 1;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShadevaultConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Ledger storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    /// How many recent roots a transition may be proven against
    #[serde(default = "default_root_history")]
    pub root_history: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            snapshot_path: DEFAULT_SNAPSHOT_PATH.into(),
            root_history: DEFAULT_ROOT_HISTORY,
        }
    }
}

fn default_snapshot_path() -> String {
    DEFAULT_SNAPSHOT_PATH.into()
}

fn default_root_history() -> usize {
    DEFAULT_ROOT_HISTORY
}

/// Identity defaults used when a command does not name them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Default asset, decimal or 0x-hex field element
    #[serde(default)]
    pub token_address: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            token_address: None,
        }
    }
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set Option<String> from env var if present
fn env_option_string(key: &str, field: &mut Option<String>) {
    if let Ok(v) = env::var(key) {
        *field = Some(v);
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {}={:?}", key, v),
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl ShadevaultConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("SV_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("SV_CONFIG points at missing file: {}", path.display());
        }

        let local_path = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_path.exists() {
            return Some(local_path);
        }

        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        env_string("SV_SNAPSHOT_PATH", &mut self.ledger.snapshot_path);
        env_parse("SV_ROOT_HISTORY", &mut self.ledger.root_history);

        env_parse("SV_CHAIN_ID", &mut self.network.chain_id);
        env_option_string("SV_TOKEN", &mut self.network.token_address);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Snapshot location as a path
    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.ledger.snapshot_path)
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.network.token_address = Some("0x02".into());
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static ShadevaultConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
