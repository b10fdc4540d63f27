//! keyshed - keybinding resolution and a small typed command language
//!
//! [`input`] turns physical key events into state changes of named
//! functions, [`binds`] attaches handlers to those functions and
//! [`toolshed`] parses and runs piped console expressions.

pub mod binds;
pub mod cli;
pub mod config;
pub mod config_paths;
pub mod input;
pub mod toolshed;
pub mod tracing;

// Re-export commonly used types
pub use config::AppConfig;
pub use input::{InputManager, Key, KeyCombo};
pub use toolshed::{Toolshed, Value, ValueType};
