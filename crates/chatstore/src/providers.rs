//! Language and image model selection.
//!
//! Handlers ask for a model by logical name (`chat-model`,
//! `title-model`, ...) and receive the concrete backend configured for the
//! running mode. The [`ProviderSelector`] is built once at startup from
//! `[providers]` and shared through server state.
//!
//! | Name | Kind | Production backend |
//! |------|------|--------------------|
//! | `chat-model` | language | openrouter `google/gemini-2.0-flash-lite-preview-02-05:free` |
//! | `chat-model-reasoning` | language | xai `grok-3-mini-beta`, reasoning in `<think>` |
//! | `title-model` | language | openrouter `google/gemini-2.0-flash-lite-preview-02-05:free` |
//! | `artifact-model` | language | xai `grok-2-1212` |
//! | `small-model` | image | xai `grok-2-image` |
//!
//! In `test` mode every language model resolves to a mock backend of the
//! same name and no image model is available.

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;

use crate::config::ProvidersConfig;

pub const LANGUAGE_MODELS: [&str; 4] = [
    "chat-model",
    "chat-model-reasoning",
    "title-model",
    "artifact-model",
];
pub const IMAGE_MODELS: [&str; 1] = ["small-model"];

const GEMINI_FLASH_LITE: &str = "google/gemini-2.0-flash-lite-preview-02-05:free";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    Test,
    Production,
}

impl FromStr for ProviderMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "test" => Ok(ProviderMode::Test),
            "production" => Ok(ProviderMode::Production),
            other => bail!(
                "Unknown provider mode: '{}'. Must be test or production.",
                other
            ),
        }
    }
}

/// A concrete model on a concrete provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRef {
    pub provider: String,
    pub model_id: String,
    /// Tag wrapping reasoning output, extracted before the answer is shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tag: Option<String>,
}

impl ModelRef {
    fn new(provider: &str, model_id: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            reasoning_tag: None,
        }
    }

    fn with_reasoning_tag(mut self, tag: &str) -> Self {
        self.reasoning_tag = Some(tag.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSelector {
    mode: ProviderMode,
    language_models: BTreeMap<String, ModelRef>,
    image_models: BTreeMap<String, ModelRef>,
}

impl ProviderSelector {
    pub fn new(mode: ProviderMode) -> Self {
        let mut language_models = BTreeMap::new();
        let mut image_models = BTreeMap::new();

        match mode {
            ProviderMode::Test => {
                for name in LANGUAGE_MODELS {
                    language_models.insert(name.to_string(), ModelRef::new("test", name));
                }
            }
            ProviderMode::Production => {
                language_models.insert(
                    "chat-model".to_string(),
                    ModelRef::new("openrouter", GEMINI_FLASH_LITE),
                );
                language_models.insert(
                    "chat-model-reasoning".to_string(),
                    ModelRef::new("xai", "grok-3-mini-beta").with_reasoning_tag("think"),
                );
                language_models.insert(
                    "title-model".to_string(),
                    ModelRef::new("openrouter", GEMINI_FLASH_LITE),
                );
                language_models.insert(
                    "artifact-model".to_string(),
                    ModelRef::new("xai", "grok-2-1212"),
                );
                image_models.insert(
                    "small-model".to_string(),
                    ModelRef::new("xai", "grok-2-image"),
                );
            }
        }

        Self {
            mode,
            language_models,
            image_models,
        }
    }

    /// Builds the selector for the configured mode and applies overrides.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let mut selector = Self::new(config.mode.parse()?);
        for (name, model) in &config.overrides {
            let entry = ModelRef {
                provider: model.provider.clone(),
                model_id: model.model_id.clone(),
                reasoning_tag: model.reasoning_tag.clone(),
            };
            if LANGUAGE_MODELS.contains(&name.as_str()) {
                selector.language_models.insert(name.clone(), entry);
            } else if IMAGE_MODELS.contains(&name.as_str()) {
                selector.image_models.insert(name.clone(), entry);
            } else {
                bail!("Unknown model name: '{}'", name);
            }
        }
        Ok(selector)
    }

    pub fn mode(&self) -> ProviderMode {
        self.mode
    }

    pub fn language_model(&self, name: &str) -> Result<&ModelRef> {
        self.language_models
            .get(name)
            .ok_or_else(|| anyhow!("no language model named '{}'", name))
    }

    pub fn image_model(&self, name: &str) -> Result<&ModelRef> {
        self.image_models
            .get(name)
            .ok_or_else(|| anyhow!("no image model named '{}'", name))
    }

    pub fn language_models(&self) -> impl Iterator<Item = (&str, &ModelRef)> {
        self.language_models.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn image_models(&self) -> impl Iterator<Item = (&str, &ModelRef)> {
        self.image_models.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Prints the resolved model table (`chatctl providers`).
pub fn list_providers(config: &ProvidersConfig) -> Result<()> {
    let selector = ProviderSelector::from_config(config)?;
    println!("Provider mode: {}", config.mode);
    println!();
    println!("{:<24} {:<8} {:<12} MODEL", "NAME", "KIND", "PROVIDER");
    let language = selector.language_models().map(|(n, m)| (n, "language", m));
    let image = selector.image_models().map(|(n, m)| (n, "image", m));
    for (name, kind, model) in language.chain(image) {
        let tag = model
            .reasoning_tag
            .as_deref()
            .map(|t| format!(" (reasoning in <{}>)", t))
            .unwrap_or_default();
        println!(
            "{:<24} {:<8} {:<12} {}{}",
            name, kind, model.provider, model.model_id, tag
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelOverride;

    #[test]
    fn test_production_table() {
        let selector = ProviderSelector::new(ProviderMode::Production);
        let reasoning = selector.language_model("chat-model-reasoning").unwrap();
        assert_eq!(reasoning.provider, "xai");
        assert_eq!(reasoning.model_id, "grok-3-mini-beta");
        assert_eq!(reasoning.reasoning_tag.as_deref(), Some("think"));
        assert_eq!(
            selector.language_model("title-model").unwrap().provider,
            "openrouter"
        );
        assert_eq!(
            selector.image_model("small-model").unwrap().model_id,
            "grok-2-image"
        );
    }

    #[test]
    fn test_test_mode_uses_mocks() {
        let selector = ProviderSelector::new(ProviderMode::Test);
        for name in LANGUAGE_MODELS {
            let model = selector.language_model(name).unwrap();
            assert_eq!(model.provider, "test");
            assert_eq!(model.model_id, name);
        }
        assert!(selector.image_model("small-model").is_err());
    }

    #[test]
    fn test_overrides_replace_entries() {
        let mut config = ProvidersConfig::default();
        config.overrides.insert(
            "artifact-model".to_string(),
            ModelOverride {
                provider: "openrouter".to_string(),
                model_id: "anthropic/claude-3.5-sonnet".to_string(),
                reasoning_tag: None,
            },
        );
        let selector = ProviderSelector::from_config(&config).unwrap();
        assert_eq!(
            selector.language_model("artifact-model").unwrap().provider,
            "openrouter"
        );
        assert_eq!(selector.mode(), ProviderMode::Production);
    }

    #[test]
    fn test_unknown_mode() {
        let config = ProvidersConfig {
            mode: "staging".to_string(),
            ..Default::default()
        };
        assert!(ProviderSelector::from_config(&config).is_err());
    }

    #[test]
    fn test_unknown_name() {
        let selector = ProviderSelector::new(ProviderMode::Production);
        assert!(selector.language_model("summary-model").is_err());
    }
}
