//! Handlers invoked when a bound key function changes state

use std::fmt;

use crate::input::{BoundKeyFunction, BoundKeyState};

/// A state change delivered to a command handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputCmdMessage {
    pub function: BoundKeyFunction,
    pub state: BoundKeyState,
}

/// Reacts to a key function going down or up
///
/// Handlers are shared between the registry and the input manager, so they
/// take `&self`; use interior mutability for any state they keep.
pub trait InputCmdHandler {
    fn enabled(&self) {}

    fn disabled(&self) {}

    /// Dispatch a message; return `true` to stop later handlers from seeing it
    fn handle_message(&self, message: &InputCmdMessage) -> bool {
        match message.state {
            BoundKeyState::Down => self.enabled(),
            BoundKeyState::Up => self.disabled(),
        }
        false
    }
}

/// Handler built from a pair of closures
pub struct FnHandler<E, D>
where
    E: Fn(),
    D: Fn(),
{
    on_enabled: E,
    on_disabled: D,
}

impl<E: Fn(), D: Fn()> FnHandler<E, D> {
    /// Handler calling `on_enabled` on press and `on_disabled` on release
    pub fn new(on_enabled: E, on_disabled: D) -> Self {
        Self {
            on_enabled,
            on_disabled,
        }
    }
}

impl<E: Fn(), D: Fn()> InputCmdHandler for FnHandler<E, D> {
    fn enabled(&self) {
        (self.on_enabled)()
    }

    fn disabled(&self) {
        (self.on_disabled)()
    }
}

impl<E: Fn(), D: Fn()> fmt::Debug for FnHandler<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Handler that only fires on the down transition
pub struct PressHandler<F: Fn()>(pub F);

impl<F: Fn()> InputCmdHandler for PressHandler<F> {
    fn enabled(&self) {
        (self.0)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_default_dispatch_by_state() {
        let downs = Cell::new(0);
        let ups = Cell::new(0);
        let handler = FnHandler::new(|| downs.set(downs.get() + 1), || ups.set(ups.get() + 1));

        let mut message = InputCmdMessage {
            function: "Use".into(),
            state: BoundKeyState::Down,
        };
        assert!(!handler.handle_message(&message));
        message.state = BoundKeyState::Up;
        handler.handle_message(&message);

        assert_eq!(downs.get(), 1);
        assert_eq!(ups.get(), 1);
    }

    #[test]
    fn test_press_handler_ignores_release() {
        let count = Cell::new(0);
        let handler = PressHandler(|| count.set(count.get() + 1));
        handler.disabled();
        handler.enabled();
        assert_eq!(count.get(), 1);
    }
}
