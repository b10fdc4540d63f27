//! Event payloads exchanged with the UI and gameplay layers

use super::binding::{BoundKeyFunction, BoundKeyState};
use super::key::Key;

/// A physical key event as delivered by the windowing layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyEventArgs {
    pub key: Key,
    pub is_repeat: bool,
    /// Modifier flags reported alongside the event; these count as pressed
    /// modifier keys even when the physical key was never seen
    pub alt: bool,
    pub control: bool,
    pub shift: bool,
    pub system: bool,
    pub scan_code: u32,
    pub handled: bool,
}

impl KeyEventArgs {
    /// A fresh key event with no modifier flags
    pub fn new(key: Key) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }

    /// An auto-repeat event for a held key
    pub fn repeat(key: Key) -> Self {
        Self {
            key,
            is_repeat: true,
            ..Self::default()
        }
    }

    /// Set modifier flags (builder pattern)
    pub fn with_modifiers(mut self, alt: bool, control: bool, shift: bool, system: bool) -> Self {
        self.alt = alt;
        self.control = control;
        self.shift = shift;
        self.system = system;
        self
    }

    /// Mark the event as consumed
    pub fn handle(&mut self) {
        self.handled = true;
    }
}

/// Which physical transition a first-chance hook is seeing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    Down,
    Repeat,
    Up,
}

/// A logical function changed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundKeyEventArgs {
    pub function: BoundKeyFunction,
    pub state: BoundKeyState,
    pub can_focus: bool,
    pub handled: bool,
}

impl BoundKeyEventArgs {
    /// An unhandled state change
    pub fn new(function: BoundKeyFunction, state: BoundKeyState, can_focus: bool) -> Self {
        Self {
            function,
            state,
            can_focus,
            handled: false,
        }
    }

    /// Stop later listeners from seeing the change
    pub fn handle(&mut self) {
        self.handled = true;
    }
}

/// The UI layer as seen from the input manager
///
/// UI listeners get every transition first. Returning `true` from
/// [`UserInterface::key_bind_state_changed`] blocks the event from reaching
/// gameplay without hard-handling it; setting `args.handled` also stops
/// further bindings of the same key press from firing.
pub trait UserInterface {
    fn key_bind_state_changed(&mut self, _args: &mut BoundKeyEventArgs) -> bool {
        false
    }

    /// A `can_focus` binding went down; return `true` if a control took the focus
    fn handle_can_focus_down(&mut self) -> bool {
        false
    }

    fn handle_can_focus_up(&mut self) {}
}

/// A UI that never intercepts anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullUserInterface;

impl UserInterface for NullUserInterface {}
