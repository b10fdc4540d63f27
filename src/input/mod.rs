//! Keybinding resolution
//!
//! Physical key events come in through [`InputManager::key_down`] and
//! [`InputManager::key_up`]. The manager matches the pressed keys against a
//! [`BindingTable`] sorted most-specific-first, filters by the active
//! [`InputContext`] hierarchy and turns each match into a state change of a
//! named [`BoundKeyFunction`].

mod binding;
mod combo;
mod config;
mod context;
pub mod defaults;
mod events;
mod key;
mod manager;
mod table;

pub use binding::{
    BindingId, BoundKeyFunction, BoundKeyState, KeyBinding, KeyBindingRegistration, KeyBindingType,
};
pub use combo::{ComboError, KeyCombo};
pub use config::{
    load_keybind_file, parse_keybinds_yaml, save_keybind_file, KeybindEntry, KeybindError,
    KeybindFile, KEYBIND_FILE_VERSION,
};
pub use context::{ContextChanged, ContextError, InputContext, InputContextContainer, COMMON_CONTEXT};
pub use events::{
    BoundKeyEventArgs, KeyEventArgs, KeyEventType, NullUserInterface, UserInterface,
};
pub use key::{Key, UnknownKeyName};
pub use manager::{
    BindingListener, FirstChanceHook, InputManager, KeyBindStateListener, NOT_BOUND,
};
pub use table::BindingTable;
