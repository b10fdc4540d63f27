//! Key bindings: a packed combo mapped to a logical key function

use std::fmt;

use serde::{Deserialize, Serialize};

use super::combo::{ComboError, KeyCombo};
use super::key::Key;

/// An abstract, named input action ("MoveUp", "ShowDebugConsole")
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundKeyFunction(String);

impl BoundKeyFunction {
    /// Function with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The function's name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BoundKeyFunction {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for BoundKeyFunction {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for BoundKeyFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a binding reacts to presses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyBindingType {
    /// Down while held, up when released
    #[default]
    State,
    /// Each press flips between down and up
    Toggle,
    /// Pressing queues the function name as a console command
    Command,
}

/// Runtime state of a binding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundKeyState {
    #[default]
    Up,
    Down,
}

/// Stable handle for a registered binding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub(crate) u64);

/// Everything needed to create a binding, as read from a keybind file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyBindingRegistration {
    pub function: BoundKeyFunction,
    pub binding_type: KeyBindingType,
    pub base_key: Key,
    pub mod1: Key,
    pub mod2: Key,
    pub mod3: Key,
    pub priority: i32,
    pub can_focus: bool,
    pub can_repeat: bool,
    pub allow_sub_combs: bool,
}

impl KeyBindingRegistration {
    /// A plain state binding of a single key
    pub fn new(function: impl Into<BoundKeyFunction>, base_key: Key) -> Self {
        Self {
            function: function.into(),
            binding_type: KeyBindingType::State,
            base_key,
            mod1: Key::Unknown,
            mod2: Key::Unknown,
            mod3: Key::Unknown,
            priority: 0,
            can_focus: false,
            can_repeat: false,
            allow_sub_combs: false,
        }
    }

    /// Set up to three modifiers (builder pattern)
    pub fn modifiers(mut self, modifiers: &[Key]) -> Self {
        let get = |i: usize| modifiers.get(i).copied().unwrap_or(Key::Unknown);
        self.mod1 = get(0);
        self.mod2 = get(1);
        self.mod3 = get(2);
        self
    }

    /// How presses are reported (state, toggle or command)
    pub fn binding_type(mut self, binding_type: KeyBindingType) -> Self {
        self.binding_type = binding_type;
        self
    }

    /// Order among bindings with the same combo, higher first
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Whether the binding may move UI focus
    pub fn can_focus(mut self, can_focus: bool) -> Self {
        self.can_focus = can_focus;
        self
    }

    /// Whether auto-repeat events re-fire the binding
    pub fn can_repeat(mut self, can_repeat: bool) -> Self {
        self.can_repeat = can_repeat;
        self
    }

    /// Whether bindings on sub-combos may fire alongside this one
    pub fn allow_sub_combs(mut self, allow: bool) -> Self {
        self.allow_sub_combs = allow;
        self
    }
}

/// A registered binding together with its runtime state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyBinding {
    pub(crate) id: BindingId,
    pub function: BoundKeyFunction,
    pub binding_type: KeyBindingType,
    pub combo: KeyCombo,
    /// Whether the binding may move UI focus
    pub can_focus: bool,
    /// Whether the binding re-fires while held
    pub can_repeat: bool,
    /// Whether sub-combinations of this combo may fire alongside it
    pub allow_sub_combs: bool,
    pub priority: i32,
    pub state: BoundKeyState,
}

impl KeyBinding {
    /// Packs the registration's keys; state starts `Up`
    pub(crate) fn from_registration(
        id: BindingId,
        reg: &KeyBindingRegistration,
    ) -> Result<Self, ComboError> {
        Ok(Self {
            id,
            function: reg.function.clone(),
            binding_type: reg.binding_type,
            combo: KeyCombo::pack(reg.base_key, reg.mod1, reg.mod2, reg.mod3)?,
            can_focus: reg.can_focus,
            can_repeat: reg.can_repeat,
            allow_sub_combs: reg.allow_sub_combs,
            priority: reg.priority,
            state: BoundKeyState::Up,
        })
    }

    /// Identifier assigned at registration
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// Whether the binding is currently pressed
    pub fn is_down(&self) -> bool {
        self.state == BoundKeyState::Down
    }

    /// The registration this binding was created from
    pub fn to_registration(&self) -> KeyBindingRegistration {
        let (base_key, mod1, mod2, mod3) = self.combo.unpack();
        KeyBindingRegistration {
            function: self.function.clone(),
            binding_type: self.binding_type,
            base_key,
            mod1,
            mod2,
            mod3,
            priority: self.priority,
            can_focus: self.can_focus,
            can_repeat: self.can_repeat,
            allow_sub_combs: self.allow_sub_combs,
        }
    }

    /// Human readable combo, e.g. "Control+Shift+S"
    pub fn key_string(&self) -> String {
        self.combo.to_string()
    }
}

impl fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.function, self.combo)
    }
}
