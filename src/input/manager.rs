//! Input state machine
//!
//! Tracks which physical keys are down, matches them against the binding
//! table and drives each binding through its up/down transitions. Every
//! transition goes to the UI first and then, unless the UI blocked it, to
//! the command handlers bound to the function or, if there are none, to the
//! gameplay listeners.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use super::binding::{
    BindingId, BoundKeyFunction, BoundKeyState, KeyBinding, KeyBindingRegistration, KeyBindingType,
};
use super::combo::{ComboError, KeyCombo};
use super::config::{
    save_keybind_file, KeybindEntry, KeybindError, KeybindFile, KEYBIND_FILE_VERSION,
};
use super::context::{ContextError, InputContextContainer, COMMON_CONTEXT};
use super::defaults;
use super::events::{BoundKeyEventArgs, KeyEventArgs, KeyEventType, NullUserInterface, UserInterface};
use super::key::Key;
use super::table::BindingTable;
use crate::binds::{CommandBindRegistry, InputCmdMessage};

/// Gameplay-side receiver of function state changes
pub type KeyBindStateListener = Box<dyn FnMut(&mut BoundKeyEventArgs)>;
/// Sees raw key events before any binding does; may mark them handled
pub type FirstChanceHook = Box<dyn FnMut(&mut KeyEventArgs, KeyEventType)>;
pub type BindingListener = Box<dyn FnMut(&KeyBinding)>;

/// Modifier keys that a key event's flags can stand in for
const MODIFIER_ALIASES: [Key; 4] = [Key::Alt, Key::Control, Key::Shift, Key::LSystem];

/// Text shown for a function with no binding
pub const NOT_BOUND: &str = "<not bound>";

pub struct InputManager {
    bindings: BindingTable,
    next_binding_id: u64,
    keys_pressed: [bool; 256],
    /// Modifiers currently reported by event flags, parallel to `MODIFIER_ALIASES`
    aliased: [bool; 4],
    contexts: InputContextContainer,
    command_binds: CommandBindRegistry,
    ui: Box<dyn UserInterface>,
    key_bind_listeners: Vec<KeyBindStateListener>,
    first_chance: Option<FirstChanceHook>,
    binding_added: Vec<BindingListener>,
    binding_removed: Vec<BindingListener>,
    queued_commands: Vec<String>,
    known_functions: HashSet<BoundKeyFunction>,
    modified_functions: HashSet<BoundKeyFunction>,
    default_registrations: Vec<KeyBindingRegistration>,
    enabled: bool,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputManager {
    /// An empty manager with no contexts, functions or bindings
    pub fn new() -> Self {
        Self {
            bindings: BindingTable::new(),
            next_binding_id: 0,
            keys_pressed: [false; 256],
            aliased: [false; 4],
            contexts: InputContextContainer::new(),
            command_binds: CommandBindRegistry::new(),
            ui: Box::new(NullUserInterface),
            key_bind_listeners: Vec::new(),
            first_chance: None,
            binding_added: Vec::new(),
            binding_removed: Vec::new(),
            queued_commands: Vec::new(),
            known_functions: HashSet::new(),
            modified_functions: HashSet::new(),
            default_registrations: Vec::new(),
            enabled: true,
        }
    }

    /// A manager with the engine context tree and functions, `common` active
    ///
    /// No keybinds are loaded; see [`InputManager::load_keybinds`].
    pub fn with_engine_defaults() -> Result<Self, ContextError> {
        let mut manager = Self::new();
        defaults::setup_contexts(&mut manager.contexts)?;
        for function in defaults::engine_functions() {
            manager.register_function(function);
        }
        manager.contexts.set_active(COMMON_CONTEXT)?;
        Ok(manager)
    }

    // -------------------------------------------------------------------------
    // Wiring
    // -------------------------------------------------------------------------

    /// Replace the UI layer that sees state changes first
    pub fn set_user_interface(&mut self, ui: Box<dyn UserInterface>) {
        self.ui = ui;
    }

    /// Listen for function state changes the UI did not handle
    pub fn on_key_bind_state_changed(
        &mut self,
        listener: impl FnMut(&mut BoundKeyEventArgs) + 'static,
    ) {
        self.key_bind_listeners.push(Box::new(listener));
    }

    /// Hook run on every physical key event before binding lookup
    pub fn set_first_chance_hook(
        &mut self,
        hook: impl FnMut(&mut KeyEventArgs, KeyEventType) + 'static,
    ) {
        self.first_chance = Some(Box::new(hook));
    }

    /// Listen for bindings added to the table
    pub fn on_binding_added(&mut self, listener: impl FnMut(&KeyBinding) + 'static) {
        self.binding_added.push(Box::new(listener));
    }

    /// Listen for bindings removed from the table
    pub fn on_binding_removed(&mut self, listener: impl FnMut(&KeyBinding) + 'static) {
        self.binding_removed.push(Box::new(listener));
    }

    /// Handlers fired for state-type functions
    pub fn command_binds(&mut self) -> &mut CommandBindRegistry {
        &mut self.command_binds
    }

    /// The context hierarchy
    pub fn contexts(&self) -> &InputContextContainer {
        &self.contexts
    }

    /// Mutable access for creating contexts and editing their functions
    ///
    /// Switch contexts through [`InputManager::set_active_context`] so held
    /// bindings get released.
    pub fn contexts_mut(&mut self) -> &mut InputContextContainer {
        &mut self.contexts
    }

    /// Whether key presses are processed
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A disabled manager ignores key presses but still processes releases
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Declare a function so keybind files may bind it
    pub fn register_function(&mut self, function: impl Into<BoundKeyFunction>) {
        self.known_functions.insert(function.into());
    }

    /// Whether the function was declared with [`InputManager::register_function`]
    pub fn is_function_known(&self, function: &BoundKeyFunction) -> bool {
        self.known_functions.contains(function)
    }

    // -------------------------------------------------------------------------
    // Key events
    // -------------------------------------------------------------------------

    /// Process a key press or auto-repeat
    pub fn key_down(&mut self, args: &mut KeyEventArgs) {
        if !self.enabled || args.key == Key::Unknown {
            return;
        }

        let kind = if args.is_repeat {
            KeyEventType::Repeat
        } else {
            KeyEventType::Down
        };
        if let Some(hook) = self.first_chance.as_mut() {
            hook(&mut *args, kind);
        }
        if args.handled {
            return;
        }

        self.sync_modifier_aliases(args);
        self.keys_pressed[args.key.as_u8() as usize] = true;

        let mut matched: Option<KeyCombo> = None;
        let mut binds_down = Vec::new();
        let mut forced_up = Vec::new();
        let mut has_can_focus = false;
        let mut has_allow_sub_combs = false;

        // Larger combos come first in the table, so the first match is the most specific
        for binding in &self.bindings {
            if binding.binding_type != KeyBindingType::Command
                && !self.contexts.active_has_function(&binding.function)
            {
                continue;
            }
            if !self.matches_pressed_state(binding.combo) {
                continue;
            }

            if matched.is_none_or(|m| m == binding.combo) && binding.combo.contains_key(args.key) {
                matched = Some(binding.combo);
                binds_down.push(binding.id);
                has_can_focus |= binding.can_focus;
                has_allow_sub_combs |= binding.allow_sub_combs;
            } else if matched.is_some_and(|m| m.is_sub_pattern(binding.combo)) {
                if has_allow_sub_combs {
                    binds_down.push(binding.id);
                } else {
                    forced_up.push(binding.id);
                }
            }
        }

        for id in forced_up {
            self.up_bind(id);
        }

        let ui_only = has_can_focus && self.ui.handle_can_focus_down();

        for id in binds_down {
            if self.down_bind(id, ui_only, args.is_repeat) {
                break;
            }
        }
    }

    /// Process a key release, releasing every binding that used the key
    pub fn key_up(&mut self, args: &mut KeyEventArgs) {
        if args.key == Key::Unknown {
            return;
        }

        if let Some(hook) = self.first_chance.as_mut() {
            hook(&mut *args, KeyEventType::Up);
        }

        let mut has_can_focus = self.release_key(args.key);
        self.keys_pressed[args.key.as_u8() as usize] = false;
        has_can_focus |= self.sync_modifier_aliases(args);

        if has_can_focus {
            self.ui.handle_can_focus_up();
        }
    }

    /// Force up every binding in the active context that uses `key` and is fully pressed
    fn release_key(&mut self, key: Key) -> bool {
        let releasing: Vec<(BindingId, bool)> = self
            .bindings
            .iter()
            .filter(|b| {
                self.contexts.active_has_function(&b.function)
                    && b.combo.contains_key(key)
                    && self.matches_pressed_state(b.combo)
            })
            .map(|b| (b.id, b.can_focus))
            .collect();

        let has_can_focus = releasing.iter().any(|(_, can_focus)| *can_focus);
        for (id, _) in releasing {
            self.up_bind(id);
        }
        has_can_focus
    }

    /// Track modifier flags; a flag turning off releases what it was holding
    fn sync_modifier_aliases(&mut self, args: &KeyEventArgs) -> bool {
        let flags = [args.alt, args.control, args.shift, args.system];
        let mut has_can_focus = false;

        for (slot, (key, flag)) in MODIFIER_ALIASES.into_iter().zip(flags).enumerate() {
            if self.aliased[slot] == flag {
                continue;
            }
            if !flag && !self.keys_pressed[key.as_u8() as usize] {
                has_can_focus |= self.release_key(key);
            }
            self.aliased[slot] = flag;
        }

        has_can_focus
    }

    fn is_pressed(&self, key: Key) -> bool {
        if self.keys_pressed[key.as_u8() as usize] {
            return true;
        }
        MODIFIER_ALIASES
            .iter()
            .position(|m| *m == key)
            .is_some_and(|slot| self.aliased[slot])
    }

    fn matches_pressed_state(&self, combo: KeyCombo) -> bool {
        combo.keys().all(|key| self.is_pressed(key))
    }

    fn down_bind(&mut self, id: BindingId, ui_only: bool, is_repeat: bool) -> bool {
        let Some(binding) = self.bindings.get(id) else {
            return false;
        };

        if !binding.is_down() {
            return self.set_bind_state(id, BoundKeyState::Down, ui_only);
        }

        if is_repeat {
            // Swallowed repeats still count as handled
            return !binding.can_repeat || self.set_bind_state(id, BoundKeyState::Down, ui_only);
        }

        if binding.binding_type == KeyBindingType::Toggle {
            return self.set_bind_state(id, BoundKeyState::Up, false);
        }

        false
    }

    fn up_bind(&mut self, id: BindingId) {
        let Some(binding) = self.bindings.get(id) else {
            return;
        };
        if binding.state == BoundKeyState::Up || binding.binding_type == KeyBindingType::Toggle {
            return;
        }
        self.set_bind_state(id, BoundKeyState::Up, false);
    }

    /// Apply a transition and deliver it; returns whether it was handled
    fn set_bind_state(&mut self, id: BindingId, state: BoundKeyState, ui_only: bool) -> bool {
        let Some(binding) = self.bindings.get_mut(id) else {
            return false;
        };

        if binding.binding_type == KeyBindingType::Command && state == BoundKeyState::Down {
            let command = binding.function.as_str().to_string();
            tracing::debug!(command = %command, "queued bound console command");
            self.queued_commands.push(command);
            return true;
        }

        binding.state = state;
        let mut args = BoundKeyEventArgs::new(binding.function.clone(), state, binding.can_focus);
        tracing::debug!(function = %args.function, state = ?state, "key function state changed");

        // The UI may block delivery without handling the event; releases always go through
        let block_pass = self.ui.key_bind_state_changed(&mut args);
        if state == BoundKeyState::Up || (!(block_pass || args.handled) && !ui_only) {
            self.dispatch(&mut args);
        }

        args.handled
    }

    fn dispatch(&mut self, args: &mut BoundKeyEventArgs) {
        let handlers = self.command_binds.handlers_for(&args.function);
        if handlers.is_empty() {
            for listener in &mut self.key_bind_listeners {
                listener(&mut *args);
            }
            return;
        }

        let handlers = handlers.to_vec();
        let message = InputCmdMessage {
            function: args.function.clone(),
            state: args.state,
        };
        for handler in handlers {
            if handler.handle_message(&message) {
                args.handle();
                break;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Contexts
    // -------------------------------------------------------------------------

    /// Switch the active context, releasing held functions it no longer has
    pub fn set_active_context(&mut self, name: &str) -> Result<(), ContextError> {
        let Some(change) = self.contexts.set_active(name)? else {
            return Ok(());
        };
        let Some(old) = change.old else {
            return Ok(());
        };

        let kept = self.contexts.hierarchy_functions(&change.new);
        let dropped: HashSet<BoundKeyFunction> = self
            .contexts
            .hierarchy_functions(&old)
            .into_iter()
            .filter(|function| !kept.contains(function))
            .collect();

        let held: Vec<BindingId> = self
            .bindings
            .iter()
            .filter(|b| b.is_down() && dropped.contains(&b.function))
            .map(|b| b.id)
            .collect();

        for id in held {
            self.set_bind_state(id, BoundKeyState::Up, false);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Register a binding, marking its function as user-modified
    pub fn register_binding(
        &mut self,
        reg: &KeyBindingRegistration,
    ) -> Result<BindingId, ComboError> {
        self.insert_binding(reg, true)
    }

    fn insert_binding(
        &mut self,
        reg: &KeyBindingRegistration,
        mark_modified: bool,
    ) -> Result<BindingId, ComboError> {
        let id = BindingId(self.next_binding_id);
        let binding = KeyBinding::from_registration(id, reg)?;
        self.next_binding_id += 1;

        if mark_modified {
            self.modified_functions.insert(reg.function.clone());
        }

        self.bindings.register(binding);
        if let Some(binding) = self.bindings.get(id) {
            for listener in &mut self.binding_added {
                listener(binding);
            }
        }
        Ok(id)
    }

    /// Remove a binding, marking its function as user-modified
    pub fn remove_binding(&mut self, id: BindingId) -> Option<KeyBinding> {
        self.remove_binding_inner(id, true)
    }

    fn remove_binding_inner(&mut self, id: BindingId, mark_modified: bool) -> Option<KeyBinding> {
        let binding = self.bindings.remove(id)?;
        if mark_modified {
            self.modified_functions.insert(binding.function.clone());
        }
        for listener in &mut self.binding_removed {
            listener(&binding);
        }
        Some(binding)
    }

    /// Drop user changes for a function and restore its shipped bindings
    pub fn reset_bindings_for(&mut self, function: &BoundKeyFunction) {
        let ids: Vec<BindingId> = self.bindings.bindings_for(function).map(|b| b.id).collect();
        for id in ids {
            self.remove_binding_inner(id, false);
        }
        self.modified_functions.remove(function);

        let defaults: Vec<KeyBindingRegistration> = self
            .default_registrations
            .iter()
            .filter(|reg| &reg.function == function)
            .cloned()
            .collect();
        for reg in defaults {
            if let Err(e) = self.insert_binding(&reg, false) {
                tracing::warn!("Failed to restore default binding for {}: {}", function, e);
            }
        }
    }

    /// Restore defaults for every modified function
    pub fn reset_all_bindings(&mut self) {
        let modified: Vec<BoundKeyFunction> = self.modified_functions.iter().cloned().collect();
        for function in modified {
            self.reset_bindings_for(&function);
        }
    }

    /// Whether user keybinds changed the function's bindings
    pub fn is_function_modified(&self, function: &BoundKeyFunction) -> bool {
        self.modified_functions.contains(function)
    }

    // -------------------------------------------------------------------------
    // Keybind files
    // -------------------------------------------------------------------------

    /// Load the user's keybinds (if any) and then the shipped defaults
    ///
    /// The user file goes first so the functions it touches are known to be
    /// modified; shipped entries for those are remembered for resets but not
    /// registered.
    pub fn load_keybinds(&mut self, user: Option<&KeybindFile>) {
        if let Some(user) = user {
            self.apply_keybind_file(user, true, "user keybinds");
        }
        let defaults = defaults::default_keybinds();
        self.apply_keybind_file(&defaults, false, "default keybinds");

        for (combo, functions) in self.bindings.duplicate_combos() {
            let names: Vec<&str> = functions.iter().map(BoundKeyFunction::as_str).collect();
            tracing::debug!("{} is bound to several functions: {}", combo, names.join(", "));
        }
    }

    /// Register every valid entry of a keybind file
    ///
    /// Entries naming an unknown function (other than command bindings) or an
    /// unknown key are logged and skipped. Returns how many were registered.
    pub fn apply_keybind_file(
        &mut self,
        file: &KeybindFile,
        user_data: bool,
        origin: &str,
    ) -> usize {
        let mut loaded = 0;

        for entry in &file.binds {
            if entry.binding_type != KeyBindingType::Command
                && !self.known_functions.contains(&entry.function)
            {
                tracing::error!("Key function in {} does not exist: '{}'", origin, entry.function);
                continue;
            }

            let reg = match entry.to_registration() {
                Ok(reg) => reg,
                Err(e) => {
                    tracing::warn!("Skipping keybind in {}: {}", origin, e);
                    continue;
                }
            };

            if !user_data {
                self.default_registrations.push(reg.clone());
                if self.modified_functions.contains(&reg.function) {
                    continue;
                }
            }

            match self.insert_binding(&reg, user_data) {
                Ok(_) => loaded += 1,
                Err(e) => tracing::warn!("Skipping keybind in {}: {}", origin, e),
            }
        }

        if user_data {
            self.modified_functions.extend(file.leave_empty.iter().cloned());
        }

        tracing::info!("Loaded {} keybinds from {}", loaded, origin);
        loaded
    }

    /// The user-modified part of the binding set, in file form
    pub fn user_keybind_file(&self) -> KeybindFile {
        let mut modified: Vec<&BoundKeyFunction> = self.modified_functions.iter().collect();
        modified.sort();

        let mut binds = Vec::new();
        let mut leave_empty = Vec::new();
        for function in modified {
            let before = binds.len();
            binds.extend(
                self.bindings
                    .bindings_for(function)
                    .map(|b| KeybindEntry::from_registration(&b.to_registration())),
            );
            if binds.len() == before {
                leave_empty.push(function.clone());
            }
        }

        KeybindFile {
            version: KEYBIND_FILE_VERSION,
            binds,
            leave_empty,
        }
    }

    /// Write the user's modifications as a keybind file
    pub fn save_user_keybinds(&self, path: &Path) -> Result<(), KeybindError> {
        save_keybind_file(path, &self.user_keybind_file())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Console commands queued by command-type bindings since the last call
    pub fn take_queued_commands(&mut self) -> Vec<String> {
        std::mem::take(&mut self.queued_commands)
    }

    /// Functions whose bindings are currently pressed
    pub fn down_functions(&self) -> Vec<BoundKeyFunction> {
        self.bindings
            .iter()
            .filter(|b| b.is_down())
            .map(|b| b.function.clone())
            .collect()
    }

    /// Whether the physical key is held
    pub fn is_key_down(&self, key: Key) -> bool {
        self.keys_pressed[key.as_u8() as usize]
    }

    /// The most specific binding for a function
    pub fn try_get_key_binding(&self, function: &BoundKeyFunction) -> Option<&KeyBinding> {
        self.bindings.find_by_function(function)
    }

    /// Every binding for a function, most specific first
    pub fn bindings_for<'a>(
        &'a self,
        function: &'a BoundKeyFunction,
    ) -> impl Iterator<Item = &'a KeyBinding> + 'a {
        self.bindings.bindings_for(function)
    }

    /// Look up a binding by id
    pub fn binding(&self, id: BindingId) -> Option<&KeyBinding> {
        self.bindings.get(id)
    }

    /// The full binding table
    pub fn all_bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Combo text for a function's first binding, or `"<not bound>"`
    pub fn key_function_button_string(&self, function: &BoundKeyFunction) -> String {
        self.try_get_key_binding(function)
            .map(KeyBinding::key_string)
            .unwrap_or_else(|| NOT_BOUND.to_string())
    }
}

impl fmt::Debug for InputManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputManager")
            .field("bindings", &self.bindings.len())
            .field("active_context", &self.contexts.active_name())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
