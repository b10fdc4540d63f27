//! Application configuration
//!
//! Stores user preferences in `~/.config/keyshed/config.yaml`

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::input::{load_keybind_file, InputManager, COMMON_CONTEXT};
use crate::toolshed::Toolshed;

/// Configuration that persists across sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    /// Input context made active after loading keybinds
    #[serde(default = "default_context")]
    pub default_context: String,

    /// When false a newline ends a command like `;`
    #[serde(default = "default_true")]
    pub multiline_expressions: bool,

    #[serde(default = "default_max_completions")]
    pub max_completions: usize,

    /// Keybind file to use instead of `~/.config/keyshed/keybinds.yaml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keybinds: Option<PathBuf>,
}

fn default_context() -> String {
    COMMON_CONTEXT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_completions() -> usize {
    20
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_context: default_context(),
            multiline_expressions: true,
            max_completions: default_max_completions(),
            keybinds: None,
        }
    }
}

impl AppConfig {
    /// Load config from disk, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = crate::config_paths::config_file() else {
            tracing::debug!("No config directory available, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load config from `path`, falling back to defaults on any problem
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to `path`, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }

    /// The keybind file in effect: the override, else the one in the config dir
    pub fn keybinds_path(&self) -> Option<PathBuf> {
        self.keybinds
            .clone()
            .or_else(crate::config_paths::keybinds_file)
    }

    /// A toolshed with the builtin commands and this config's parsing options
    pub fn toolshed(&self) -> Toolshed {
        let mut shed = Toolshed::with_builtins();
        shed.set_multiline_expressions(self.multiline_expressions);
        shed
    }

    /// An input manager with the engine contexts, the user's keybinds from
    /// `keybinds` (or [`keybinds_path`](Self::keybinds_path)) and the defaults
    pub fn input_manager(&self, keybinds: Option<&Path>) -> anyhow::Result<InputManager> {
        let mut manager = InputManager::with_engine_defaults()?;

        let path = keybinds.map(Path::to_path_buf).or_else(|| self.keybinds_path());
        let user = match path {
            Some(path) if path.exists() => match load_keybind_file(&path) {
                Ok(file) => Some(file),
                Err(e) => {
                    tracing::warn!("Ignoring keybinds at {}: {}", path.display(), e);
                    None
                }
            },
            _ => None,
        };
        manager.load_keybinds(user.as_ref());

        manager
            .set_active_context(&self.default_context)
            .with_context(|| format!("Bad default_context '{}'", self.default_context))?;
        Ok(manager)
    }
}
