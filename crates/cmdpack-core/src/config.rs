use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// TemplateConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Maximum number of parsed skeletons kept in the template cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Templates at or below this length without `{%` are never cached.
    #[serde(default = "default_cache_min_length")]
    pub cache_min_length: usize,
    /// Upper bound on control-block resolution passes.
    #[serde(default = "default_max_block_passes")]
    pub max_block_passes: usize,
}

fn default_cache_capacity() -> usize {
    100
}

fn default_cache_min_length() -> usize {
    200
}

fn default_max_block_passes() -> usize {
    100
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            cache_min_length: default_cache_min_length(),
            max_block_passes: default_max_block_passes(),
        }
    }
}

// ---------------------------------------------------------------------------
// EnvConfig
// ---------------------------------------------------------------------------

/// Process environment variables exposed to templates as `env.<NAME>`.
/// Empty by default: `env` stays an empty map unless names are listed here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    #[serde(default)]
    pub allow: Vec<String>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub env: EnvConfig,
    /// Command pack directory, relative to the project root.
    #[serde(default = "default_commands_dir")]
    pub commands_dir: String,
}

fn default_commands_dir() -> String {
    paths::COMMANDS_DIR.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            templates: TemplateConfig::default(),
            env: EnvConfig::default(),
            commands_dir: default_commands_dir(),
        }
    }
}

impl Config {
    /// Load `.cmdpack/config.yaml`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn commands_path(&self, root: &Path) -> PathBuf {
        root.join(&self.commands_dir)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.templates.cache_capacity == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "templates.cache_capacity is 0: template caching is disabled".to_string(),
            });
        }

        if self.templates.max_block_passes == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "templates.max_block_passes must be at least 1".to_string(),
            });
        }

        for name in &self.env.allow {
            if name.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "env.allow contains an empty variable name".to_string(),
                });
            }
        }

        if self.commands_dir.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "commands_dir must not be empty".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
