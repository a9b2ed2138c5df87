//! Configuration file support for the signaling service.
//!
//! Configuration is read from TOML. Every section and key is optional and
//! falls back to its default.

use crate::circuit::CIRCUIT_K;
use crate::registry::{RootWindow, DEFAULT_ROOT_HISTORY_SIZE, DEFAULT_TREE_DEPTH};
use crate::utils::parse_field_hex;
use crate::verifier::{VerifierSettings, DEFAULT_MAX_MESSAGE_LEN, DEFAULT_MAX_PROOF_SIZE};
use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MAX_PROOF_SIZE_ENV: &str = "SIGNAL_MAX_PROOF_SIZE";
pub const ROOT_HISTORY_SIZE_ENV: &str = "SIGNAL_ROOT_HISTORY_SIZE";

const DEFAULT_EXTERNAL_NULLIFIER: &str =
    "0000000000000000000000000000000000000000000000000000000000000001";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub keys: KeysConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_tree_depth")]
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(default = "default_root_history_size")]
    pub root_history_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_max_age_secs: Option<u64>,
    #[serde(default = "default_external_nullifier")]
    pub external_nullifier: String,
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    #[serde(default = "default_max_proof_size")]
    pub max_proof_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_commitments_file")]
    pub commitments_file: PathBuf,
    #[serde(default = "default_nullifiers_file")]
    pub nullifiers_file: PathBuf,
    #[serde(default = "default_enable_persistence")]
    pub enable_persistence: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_circuit_k")]
    pub circuit_k: u32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_TREE_DEPTH,
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            root_history_size: DEFAULT_ROOT_HISTORY_SIZE,
            root_max_age_secs: None,
            external_nullifier: default_external_nullifier(),
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_proof_size: DEFAULT_MAX_PROOF_SIZE,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            commitments_file: default_commitments_file(),
            nullifiers_file: default_nullifiers_file(),
            enable_persistence: true,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            circuit_k: CIRCUIT_K,
        }
    }
}

fn default_tree_depth() -> usize {
    DEFAULT_TREE_DEPTH
}

fn default_root_history_size() -> usize {
    DEFAULT_ROOT_HISTORY_SIZE
}

fn default_external_nullifier() -> String {
    DEFAULT_EXTERNAL_NULLIFIER.to_string()
}

fn default_max_message_len() -> usize {
    DEFAULT_MAX_MESSAGE_LEN
}

fn default_max_proof_size() -> usize {
    DEFAULT_MAX_PROOF_SIZE
}

fn default_commitments_file() -> PathBuf {
    PathBuf::from("commitments.txt")
}

fn default_nullifiers_file() -> PathBuf {
    PathBuf::from("nullifiers.txt")
}

fn default_enable_persistence() -> bool {
    true
}

fn default_circuit_k() -> u32 {
    CIRCUIT_K
}

fn env_override<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {name}={raw}: not a valid number");
            None
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Loads `path`, or the defaults when it does not exist. A file that
    /// exists but cannot be read or parsed is logged before falling back.
    pub fn load_from_file_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{e:#}; using default configuration");
                Self::default()
            }
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Applies `SIGNAL_MAX_PROOF_SIZE` and `SIGNAL_ROOT_HISTORY_SIZE` from the
    /// environment. Unparseable values are logged and ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(size) = env_override(MAX_PROOF_SIZE_ENV) {
            self.verifier.max_proof_size = size;
        }
        if let Some(size) = env_override(ROOT_HISTORY_SIZE_ENV) {
            self.verifier.root_history_size = size;
        }
        self
    }

    #[must_use]
    pub fn root_window(&self) -> RootWindow {
        RootWindow {
            max_roots: self.verifier.root_history_size,
            max_age: self.verifier.root_max_age_secs.map(Duration::from_secs),
        }
    }

    pub fn verifier_settings(&self) -> Result<VerifierSettings> {
        let external_nullifier = parse_field_hex(&self.verifier.external_nullifier)
            .context("Invalid verifier.external_nullifier")?;
        Ok(VerifierSettings {
            external_nullifier,
            max_message_len: self.verifier.max_message_len,
            max_proof_size: self.verifier.max_proof_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasta_curves::pallas;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tree.depth, 20);
        assert_eq!(config.verifier.root_history_size, 30);
        assert_eq!(config.keys.circuit_k, CIRCUIT_K);
        assert!(config.storage.enable_persistence);

        let settings = config.verifier_settings().unwrap();
        assert_eq!(settings.external_nullifier, pallas::Base::one());
        assert_eq!(settings.max_message_len, 31);
    }

    #[test]
    fn test_serialize_deserialize_config() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.tree.depth, deserialized.tree.depth);
        assert_eq!(
            config.storage.commitments_file,
            deserialized.storage.commitments_file
        );
    }

    #[test]
    fn test_custom_config() {
        let config_toml = r#"
            [tree]
            depth = 16

            [verifier]
            root_history_size = 5
            root_max_age_secs = 600
            external_nullifier = "0x0000000000000000000000000000000000000000000000000000000000000007"

            [storage]
            enable_persistence = false
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.tree.depth, 16);
        assert_eq!(
            config.root_window(),
            RootWindow {
                max_roots: 5,
                max_age: Some(Duration::from_secs(600)),
            }
        );
        assert_eq!(
            config.verifier_settings().unwrap().external_nullifier,
            pallas::Base::from(7u64)
        );
        assert!(!config.storage.enable_persistence);
        assert_eq!(config.storage.nullifiers_file, PathBuf::from("nullifiers.txt"));
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("signal.toml");
        std::fs::write(&path, "[tree]\ndepth = \"deep\"\n").unwrap();

        assert!(Config::load_from_file(&path).is_err());
        assert_eq!(
            Config::load_from_file_or_default(&path).tree.depth,
            DEFAULT_TREE_DEPTH
        );
    }

    #[test]
    fn test_bad_external_nullifier_is_reported() {
        let mut config = Config::default();
        config.verifier.external_nullifier = "zz".to_string();
        assert!(config.verifier_settings().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("signal.toml");
        let mut config = Config::default();
        config.tree.depth = 10;
        config.save_to_file(&path).unwrap();

        assert_eq!(Config::load_from_file(&path).unwrap().tree.depth, 10);
        assert_eq!(
            Config::load_from_file_or_default(&dir.path().join("missing.toml"))
                .tree
                .depth,
            DEFAULT_TREE_DEPTH
        );
    }
}
