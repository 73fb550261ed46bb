//! Configuration management for syscim
//!
//! Settings come from a TOML file, then `SYSCIM_<SECTION>__<KEY>` environment
//! variables, then command-line flags. Everything has a default, so a missing
//! file at the default location is not an error.

use crate::error::{Result, SyscimError};
use crate::taxonomy::{AliasSuppression, DEFAULT_TAXONOMY_PATH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "SYSCIM_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub device: DeviceConfig,
    pub taxonomy: TaxonomyConfig,
    pub normalization: NormalizationConfig,
    pub validation: ValidationConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            schema_version: "1.0.0".to_string(),
            created_at: current_timestamp(),
        }
    }
}

/// Clock settings of the devices emitting the logs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// IANA zone name or fixed offset; UTC when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Where the alias table is read from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    pub path: PathBuf,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_TAXONOMY_PATH),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub alias_suppression: AliasSuppression,
    /// Run parsed records through the normalizer
    pub apply_on_parse: bool,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            alias_suppression: AliasSuppression::Delete,
            apply_on_parse: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Accept field names the taxonomy does not know
    pub non_existent_ok: bool,
    /// Canonical keys every record must carry
    pub required: Vec<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SyscimError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| SyscimError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;

        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load an explicit file, or the default location if there is one
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Self::default_path()?;
        if default_path.exists() {
            return Self::load(&default_path);
        }

        tracing::warn!(
            path = %default_path.display(),
            "No configuration file found; using defaults"
        );
        let mut config = Self::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyscimError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| SyscimError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SYSCIM_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `SYSCIM_*` overrides from any key/value source
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "DEVICE__TIME_ZONE" => {
                self.device.time_zone = Some(value.to_string());
            }
            "TAXONOMY__PATH" => {
                self.taxonomy.path = PathBuf::from(value);
            }
            "NORMALIZATION__ALIAS_SUPPRESSION" => {
                self.normalization.alias_suppression = match value.to_lowercase().as_str() {
                    "delete" => AliasSuppression::Delete,
                    "tombstone" => AliasSuppression::Tombstone,
                    other => {
                        return Err(SyscimError::InvalidConfigValue {
                            path: path.to_string(),
                            message: format!(
                                "Expected 'delete' or 'tombstone', got '{}'",
                                other
                            ),
                        })
                    }
                };
            }
            "NORMALIZATION__APPLY_ON_PARSE" => {
                self.normalization.apply_on_parse = parse_bool(path, value)?;
            }
            "VALIDATION__NON_EXISTENT_OK" => {
                self.validation.non_existent_ok = parse_bool(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SyscimError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("syscim").join("config.toml"))
    }
}

fn parse_bool(path: &str, value: &str) -> Result<bool> {
    value.parse().map_err(|_| SyscimError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}' as boolean", value),
    })
}
