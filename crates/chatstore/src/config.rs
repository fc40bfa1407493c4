//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/chatstore.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//!
//! [providers]
//! mode = "production"          # or "test"
//!
//! [providers.overrides.title-model]
//! provider = "xai"
//! model_id = "grok-2-1212"
//!
//! [rag.retrieval]
//! threshold = 0.6
//! max_results = 8
//! ```
//!
//! Every section except `[db]` is optional.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chatstore_core::rag::RagPluginConfig;

use crate::providers::{ProviderMode, IMAGE_MODELS, LANGUAGE_MODELS};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub rag: RagPluginConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Per-name replacements for the built-in model table.
    #[serde(default)]
    pub overrides: BTreeMap<String, ModelOverride>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            overrides: BTreeMap::new(),
        }
    }
}

fn default_mode() -> String {
    "production".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelOverride {
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub reasoning_tag: Option<String>,
}

impl Config {
    /// Config pointing at `./data/chatstore.sqlite` with every optional
    /// section at its default.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/chatstore.sqlite"),
            },
            server: ServerConfig::default(),
            providers: ProvidersConfig::default(),
            rag: RagPluginConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.server.bind.trim().is_empty() {
        bail!("server.bind must not be empty");
    }

    config
        .providers
        .mode
        .parse::<ProviderMode>()
        .with_context(|| "Invalid [providers] section")?;

    for name in config.providers.overrides.keys() {
        let known =
            LANGUAGE_MODELS.contains(&name.as_str()) || IMAGE_MODELS.contains(&name.as_str());
        if !known {
            bail!(
                "Unknown model name in providers.overrides: '{}'. Must be one of: {}",
                name,
                LANGUAGE_MODELS
                    .iter()
                    .chain(IMAGE_MODELS.iter())
                    .copied()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    for (name, model) in &config.providers.overrides {
        if model.model_id.trim().is_empty() {
            bail!("providers.overrides.{}.model_id must not be empty", name);
        }
    }

    config.rag.validate()?;
    Ok(())
}
