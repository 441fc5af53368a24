// SPDX-License-Identifier: MIT

//! Settings - YAML configuration with environment overrides
//!
//! API keys are never read from the settings file; providers pick them up
//! from the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adk::model::GenerationConfig;
use crate::error::SettingsError;
use crate::graph::{FileStore, InMemoryStore, SharedStore, DEFAULT_RECURSION_LIMIT};

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub model: ModelSettings,
    pub store: StoreSettings,
    pub graph: GraphSettings,
    pub server: ServerSettings,
}

/// Model collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
    /// `OpenAI` or `Anthropic`; inferred from `name` when unset
    pub provider: Option<String>,
    pub name: String,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: None,
            name: "gpt-4o-mini".to_string(),
            base_url: None,
            temperature: None,
            max_output_tokens: None,
        }
    }
}

impl ModelSettings {
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            top_p: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    #[default]
    File,
}

/// Shared value store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    pub kind: StoreKind,
    /// Root directory of the file store
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kind: StoreKind::File,
            path: PathBuf::from(".rulegraph/store"),
        }
    }
}

impl StoreSettings {
    /// Open the configured store
    pub fn open(&self) -> Arc<dyn SharedStore> {
        match self.kind {
            StoreKind::Memory => Arc::new(InMemoryStore::new()),
            StoreKind::File => {
                log::debug!("Using file store at {}", self.path.display());
                Arc::new(FileStore::new(self.path.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphSettings {
    pub recursion_limit: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl Settings {
    /// Load settings from an optional YAML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => {
                let content = fs::read_to_string(path)?;
                Self::parse_yaml(&content)?
            }
            None => Self::default(),
        };
        settings.apply_overrides(|key| env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Apply `MODEL_PROVIDER` and `MODEL_NAME` overrides
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("MODEL_PROVIDER").filter(|v| !v.is_empty()) {
            self.model.provider = Some(provider);
        }
        if let Some(name) = lookup("MODEL_NAME").filter(|v| !v.is_empty()) {
            self.model.name = name;
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(base_url) = &self.model.base_url {
            url::Url::parse(base_url).map_err(|source| SettingsError::InvalidUrl {
                value: base_url.clone(),
                source,
            })?;
        }
        if self.model.name.trim().is_empty() {
            return Err(SettingsError::Invalid("model.name must not be empty".into()));
        }
        if self.graph.recursion_limit == 0 {
            return Err(SettingsError::Invalid(
                "graph.recursion_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_full_settings() {
        let yaml = r#"
model:
  provider: Anthropic
  name: claude-3-5-sonnet-latest
  temperature: 0.2
  max_output_tokens: 1024
store:
  kind: file
  path: /tmp/rules
graph:
  recursion_limit: 10
server:
  port: 3000
"#;
        let settings = Settings::parse_yaml(yaml).unwrap();
        assert_eq!(settings.model.provider.as_deref(), Some("Anthropic"));
        assert_eq!(settings.model.name, "claude-3-5-sonnet-latest");
        assert_eq!(settings.model.max_output_tokens, Some(1024));
        assert_eq!(settings.store.kind, StoreKind::File);
        assert_eq!(settings.store.path, PathBuf::from("/tmp/rules"));
        assert_eq!(settings.graph.recursion_limit, 10);
        assert_eq!(settings.server.port, 3000);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let settings = Settings::parse_yaml("model:\n  name: gpt-4o\n").unwrap();
        assert_eq!(settings.model.name, "gpt-4o");
        assert_eq!(settings.store, StoreSettings::default());
        assert_eq!(settings.graph.recursion_limit, DEFAULT_RECURSION_LIMIT);
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn test_default_store_is_persistent() {
        let settings = Settings::default();
        assert_eq!(settings.store.kind, StoreKind::File);
        assert_eq!(settings.store.path, PathBuf::from(".rulegraph/store"));

        let memory = Settings::parse_yaml("store:\n  kind: memory\n").unwrap();
        assert_eq!(memory.store.kind, StoreKind::Memory);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([("MODEL_PROVIDER", "Anthropic"), ("MODEL_NAME", "claude-3-haiku")]);
        let mut settings = Settings::default();
        settings.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.model.provider.as_deref(), Some("Anthropic"));
        assert_eq!(settings.model.name, "claude-3-haiku");
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let mut settings = Settings::default();
        settings.apply_overrides(|_| Some(String::new()));
        assert_eq!(settings.model, ModelSettings::default());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut settings = Settings::default();
        settings.model.base_url = Some("not a url".to_string());
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_zero_recursion_limit_rejected() {
        let mut settings = Settings::default();
        settings.graph.recursion_limit = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_store_kind() {
        assert!(matches!(
            Settings::parse_yaml("store:\n  kind: redis\n"),
            Err(SettingsError::Yaml(_))
        ));
    }
}
