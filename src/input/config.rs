//! YAML keybind files
//!
//! ```yaml
//! version: 1
//! binds:
//!   - function: ShowDebugConsole
//!     key: Tilde
//!     canFocus: true
//!   - function: TextCopy
//!     key: C
//!     mod1: Control
//! leaveEmpty: [ToggleFullscreen]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::binding::{BoundKeyFunction, KeyBindingRegistration, KeyBindingType};
use super::key::{Key, UnknownKeyName};

pub const KEYBIND_FILE_VERSION: u32 = 1;

/// Root of a keybind file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeybindFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub binds: Vec<KeybindEntry>,
    /// Functions the user deliberately left without any binding
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub leave_empty: Vec<BoundKeyFunction>,
}

fn default_version() -> u32 {
    KEYBIND_FILE_VERSION
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

fn is_state(value: &KeyBindingType) -> bool {
    *value == KeyBindingType::State
}

/// A single binding entry, keys written by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeybindEntry {
    pub function: BoundKeyFunction,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod3: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "is_state")]
    pub binding_type: KeyBindingType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub can_focus: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub can_repeat: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_sub_combs: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: i32,
}

#[derive(Debug, Error)]
pub enum KeybindError {
    #[error("failed to read keybind file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse keybinds: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("binding for '{function}': {source}")]
    InvalidKey {
        function: BoundKeyFunction,
        #[source]
        source: UnknownKeyName,
    },
    #[error("unsupported keybind file version {0}")]
    UnsupportedVersion(u32),
}

impl KeybindEntry {
    /// Resolve key names into a registration
    pub fn to_registration(&self) -> Result<KeyBindingRegistration, KeybindError> {
        let parse = |name: &str| {
            name.parse::<Key>().map_err(|source| KeybindError::InvalidKey {
                function: self.function.clone(),
                source,
            })
        };
        let parse_mod = |name: &Option<String>| match name {
            Some(name) => parse(name),
            None => Ok(Key::Unknown),
        };

        Ok(KeyBindingRegistration {
            function: self.function.clone(),
            binding_type: self.binding_type,
            base_key: parse(&self.key)?,
            mod1: parse_mod(&self.mod1)?,
            mod2: parse_mod(&self.mod2)?,
            mod3: parse_mod(&self.mod3)?,
            priority: self.priority,
            can_focus: self.can_focus,
            can_repeat: self.can_repeat,
            allow_sub_combs: self.allow_sub_combs,
        })
    }

    /// File entry for a registration, omitting unused modifier slots
    pub fn from_registration(reg: &KeyBindingRegistration) -> Self {
        let name = |key: Key| (key != Key::Unknown).then(|| key.name().to_string());
        Self {
            function: reg.function.clone(),
            key: reg.base_key.name().to_string(),
            mod1: name(reg.mod1),
            mod2: name(reg.mod2),
            mod3: name(reg.mod3),
            binding_type: reg.binding_type,
            can_focus: reg.can_focus,
            can_repeat: reg.can_repeat,
            allow_sub_combs: reg.allow_sub_combs,
            priority: reg.priority,
        }
    }
}

/// Parse a keybind file from a YAML string
pub fn parse_keybinds_yaml(yaml: &str) -> Result<KeybindFile, KeybindError> {
    let file: KeybindFile = serde_yaml::from_str(yaml)?;
    if file.version != KEYBIND_FILE_VERSION {
        return Err(KeybindError::UnsupportedVersion(file.version));
    }
    Ok(file)
}

/// Read and parse a keybind file
pub fn load_keybind_file(path: &Path) -> Result<KeybindFile, KeybindError> {
    let content = std::fs::read_to_string(path).map_err(|source| KeybindError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_keybinds_yaml(&content)
}

/// Write a keybind file, creating parent directories as needed
pub fn save_keybind_file(path: &Path, file: &KeybindFile) -> Result<(), KeybindError> {
    let io_err = |source| KeybindError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let yaml = serde_yaml::to_string(file)?;
    std::fs::write(path, yaml).map_err(io_err)?;
    tracing::info!("Saved keybinds to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry_fields() {
        let yaml = r#"
version: 1
binds:
  - function: TextCopy
    key: C
    mod1: Control
    canRepeat: true
  - function: ShowDebugConsole
    key: Tilde
    type: Toggle
    canFocus: true
    priority: 2
leaveEmpty: [Fullscreen]
"#;
        let file = parse_keybinds_yaml(yaml).unwrap();
        assert_eq!(file.binds.len(), 2);
        assert_eq!(file.leave_empty, vec![BoundKeyFunction::from("Fullscreen")]);

        let copy = file.binds[0].to_registration().unwrap();
        assert_eq!(copy.base_key, Key::C);
        assert_eq!(copy.mod1, Key::Control);
        assert!(copy.can_repeat);
        assert_eq!(copy.binding_type, KeyBindingType::State);

        let console = file.binds[1].to_registration().unwrap();
        assert_eq!(console.binding_type, KeyBindingType::Toggle);
        assert!(console.can_focus);
        assert_eq!(console.priority, 2);
    }

    #[test]
    fn test_unknown_key_name() {
        let yaml = "binds:\n  - function: Use\n    key: NotAKey\n";
        let file = parse_keybinds_yaml(yaml).unwrap();
        assert!(matches!(
            file.binds[0].to_registration(),
            Err(KeybindError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_rejects_future_version() {
        let yaml = "version: 7\nbinds: []\n";
        assert!(matches!(
            parse_keybinds_yaml(yaml),
            Err(KeybindError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        assert!(matches!(
            parse_keybinds_yaml("binds: [unclosed"),
            Err(KeybindError::Parse(_))
        ));
    }

    #[test]
    fn test_serialization_skips_defaults() {
        let reg = KeyBindingRegistration::new("Use", Key::E);
        let file = KeybindFile {
            version: KEYBIND_FILE_VERSION,
            binds: vec![KeybindEntry::from_registration(&reg)],
            leave_empty: Vec::new(),
        };
        let yaml = serde_yaml::to_string(&file).unwrap();
        assert!(yaml.contains("function: Use"));
        assert!(!yaml.contains("canFocus"));
        assert!(!yaml.contains("leaveEmpty"));
        assert!(!yaml.contains("mod1"));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("keybinds.yaml");
        let reg = KeyBindingRegistration::new("Save", Key::S).modifiers(&[Key::Control]);
        let file = KeybindFile {
            version: KEYBIND_FILE_VERSION,
            binds: vec![KeybindEntry::from_registration(&reg)],
            leave_empty: vec!["Quit".into()],
        };

        save_keybind_file(&path, &file).unwrap();
        let loaded = load_keybind_file(&path).unwrap();
        assert_eq!(loaded, file);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_keybind_file(&dir.path().join("missing.yaml")),
            Err(KeybindError::Io { .. })
        ));
    }
}
