//! Engine key functions, the standard context tree and the shipped keybinds
//!
//! The shipped keybinds are embedded at compile time. A user keybind file is
//! layered over them by [`InputManager::load_keybinds`](super::InputManager::load_keybinds).

use super::config::{parse_keybinds_yaml, KeybindFile, KEYBIND_FILE_VERSION};
use super::context::{ContextError, InputContextContainer, COMMON_CONTEXT};

/// Default keybinds YAML embedded at compile time
pub const DEFAULT_KEYBINDS_YAML: &str = include_str!("default_keybinds.yaml");

pub const HUMAN_CONTEXT: &str = "human";
pub const EDITOR_CONTEXT: &str = "editor";
pub const TEXT_CONTEXT: &str = "text";

/// Names of the functions the engine itself knows about
pub mod functions {
    pub const SHOW_DEBUG_CONSOLE: &str = "ShowDebugConsole";
    pub const SHOW_DEBUG_MONITORS: &str = "ShowDebugMonitors";
    pub const HIDE_UI: &str = "HideUI";
    pub const UI_CLICK: &str = "UIClick";
    pub const UI_RIGHT_CLICK: &str = "UIRightClick";
    pub const CLOSE_MODALS: &str = "CloseModals";
    pub const USE: &str = "Use";

    pub const MOVE_UP: &str = "MoveUp";
    pub const MOVE_DOWN: &str = "MoveDown";
    pub const MOVE_LEFT: &str = "MoveLeft";
    pub const MOVE_RIGHT: &str = "MoveRight";
    pub const WALK: &str = "Walk";

    pub const EDITOR_PLACE_OBJECT: &str = "EditorPlaceObject";
    pub const EDITOR_CANCEL_PLACE: &str = "EditorCancelPlace";
    pub const EDITOR_GRID_PLACE: &str = "EditorGridPlace";
    pub const EDITOR_LINE_PLACE: &str = "EditorLinePlace";
    pub const EDITOR_ROTATE_OBJECT: &str = "EditorRotateObject";

    pub const TEXT_CURSOR_LEFT: &str = "TextCursorLeft";
    pub const TEXT_CURSOR_RIGHT: &str = "TextCursorRight";
    pub const TEXT_CURSOR_WORD_LEFT: &str = "TextCursorWordLeft";
    pub const TEXT_CURSOR_WORD_RIGHT: &str = "TextCursorWordRight";
    pub const TEXT_CURSOR_BEGIN: &str = "TextCursorBegin";
    pub const TEXT_CURSOR_END: &str = "TextCursorEnd";
    pub const TEXT_CURSOR_SELECT: &str = "TextCursorSelect";
    pub const TEXT_BACKSPACE: &str = "TextBackspace";
    pub const TEXT_DELETE: &str = "TextDelete";
    pub const TEXT_SUBMIT: &str = "TextSubmit";
    pub const TEXT_NEWLINE: &str = "TextNewline";
    pub const TEXT_SELECT_ALL: &str = "TextSelectAll";
    pub const TEXT_COPY: &str = "TextCopy";
    pub const TEXT_CUT: &str = "TextCut";
    pub const TEXT_PASTE: &str = "TextPaste";
}

use functions::*;

const COMMON_FUNCTIONS: &[&str] = &[
    SHOW_DEBUG_CONSOLE,
    SHOW_DEBUG_MONITORS,
    HIDE_UI,
    UI_CLICK,
    UI_RIGHT_CLICK,
    CLOSE_MODALS,
    USE,
];

const HUMAN_FUNCTIONS: &[&str] = &[MOVE_UP, MOVE_DOWN, MOVE_LEFT, MOVE_RIGHT, WALK];

const EDITOR_FUNCTIONS: &[&str] = &[
    EDITOR_PLACE_OBJECT,
    EDITOR_CANCEL_PLACE,
    EDITOR_GRID_PLACE,
    EDITOR_LINE_PLACE,
    EDITOR_ROTATE_OBJECT,
];

const TEXT_FUNCTIONS: &[&str] = &[
    TEXT_CURSOR_LEFT,
    TEXT_CURSOR_RIGHT,
    TEXT_CURSOR_WORD_LEFT,
    TEXT_CURSOR_WORD_RIGHT,
    TEXT_CURSOR_BEGIN,
    TEXT_CURSOR_END,
    TEXT_CURSOR_SELECT,
    TEXT_BACKSPACE,
    TEXT_DELETE,
    TEXT_SUBMIT,
    TEXT_NEWLINE,
    TEXT_SELECT_ALL,
    TEXT_COPY,
    TEXT_CUT,
    TEXT_PASTE,
];

/// Every engine function, grouped by the context that declares it
pub fn engine_functions() -> impl Iterator<Item = &'static str> {
    COMMON_FUNCTIONS
        .iter()
        .chain(HUMAN_FUNCTIONS)
        .chain(EDITOR_FUNCTIONS)
        .chain(TEXT_FUNCTIONS)
        .copied()
}

/// Create `common` and its `human`, `editor` and `text` children
pub fn setup_contexts(contexts: &mut InputContextContainer) -> Result<(), ContextError> {
    let common = contexts.create(COMMON_CONTEXT, None)?;
    COMMON_FUNCTIONS.iter().for_each(|f| common.add_function(*f));

    for (name, functions) in [
        (HUMAN_CONTEXT, HUMAN_FUNCTIONS),
        (EDITOR_CONTEXT, EDITOR_FUNCTIONS),
        (TEXT_CONTEXT, TEXT_FUNCTIONS),
    ] {
        let context = contexts.create(name, Some(COMMON_CONTEXT))?;
        functions.iter().for_each(|f| context.add_function(*f));
    }

    Ok(())
}

/// The shipped keybinds, or an empty set if the embedded file is broken
pub fn default_keybinds() -> KeybindFile {
    match parse_keybinds_yaml(DEFAULT_KEYBINDS_YAML) {
        Ok(file) => {
            tracing::debug!("Parsed embedded keybinds ({} binds)", file.binds.len());
            file
        }
        Err(e) => {
            tracing::warn!("Failed to parse embedded keybinds: {}", e);
            KeybindFile {
                version: KEYBIND_FILE_VERSION,
                ..KeybindFile::default()
            }
        }
    }
}
