//! Input manager behaviour with the engine contexts and shipped keybinds

mod common;

use common::{down, engine_manager, press, record, up};
use keyshed::input::defaults::functions::{MOVE_UP, SHOW_DEBUG_CONSOLE, TEXT_COPY};
use keyshed::input::defaults::{HUMAN_CONTEXT, TEXT_CONTEXT};
use keyshed::input::{
    load_keybind_file, BoundKeyFunction, BoundKeyState, InputManager, Key, NOT_BOUND,
};

const MOVE_UP_ON_ARROW: &str = "\
version: 1
binds:
  - function: MoveUp
    key: Up
leaveEmpty: [HideUI]
";

#[test]
fn test_shipped_binding_fires_in_its_context() {
    let mut manager = engine_manager(None);
    manager.set_active_context(HUMAN_CONTEXT).unwrap();
    let log = record(&mut manager);

    down(&mut manager, Key::W);
    assert_eq!(
        manager.down_functions(),
        vec![BoundKeyFunction::new(MOVE_UP)]
    );
    up(&mut manager, Key::W);

    assert_eq!(
        *log.borrow(),
        vec![
            (MOVE_UP.to_string(), BoundKeyState::Down),
            (MOVE_UP.to_string(), BoundKeyState::Up),
        ]
    );
}

#[test]
fn test_function_outside_active_context_does_not_fire() {
    let mut manager = engine_manager(None);
    let log = record(&mut manager);

    // MoveUp lives in `human`; `common` is active
    press(&mut manager, Key::W);
    assert!(log.borrow().is_empty());

    // Common functions stay reachable from child contexts
    manager.set_active_context(TEXT_CONTEXT).unwrap();
    press(&mut manager, Key::Tilde);
    assert_eq!(log.borrow()[0].0, SHOW_DEBUG_CONSOLE);
}

#[test]
fn test_user_keybinds_replace_shipped_ones() {
    let mut manager = engine_manager(Some(MOVE_UP_ON_ARROW));
    manager.set_active_context(HUMAN_CONTEXT).unwrap();
    let log = record(&mut manager);

    press(&mut manager, Key::W);
    assert!(log.borrow().is_empty());

    press(&mut manager, Key::Up);
    assert_eq!(log.borrow().len(), 2);

    let move_up = BoundKeyFunction::new(MOVE_UP);
    assert!(manager.is_function_modified(&move_up));
    assert_eq!(manager.key_function_button_string(&move_up), "Up");
    assert_eq!(
        manager.key_function_button_string(&BoundKeyFunction::new("HideUI")),
        NOT_BOUND
    );
}

#[test]
fn test_reset_restores_shipped_binding() {
    let mut manager = engine_manager(Some(MOVE_UP_ON_ARROW));
    let move_up = BoundKeyFunction::new(MOVE_UP);

    manager.reset_bindings_for(&move_up);
    assert!(!manager.is_function_modified(&move_up));
    assert_eq!(manager.key_function_button_string(&move_up), "W");
}

#[test]
fn test_switching_context_releases_held_functions() {
    let mut manager = engine_manager(None);
    manager.set_active_context(HUMAN_CONTEXT).unwrap();
    let log = record(&mut manager);

    down(&mut manager, Key::W);
    manager.set_active_context(TEXT_CONTEXT).unwrap();

    assert_eq!(
        log.borrow().last(),
        Some(&(MOVE_UP.to_string(), BoundKeyState::Up))
    );
    assert!(manager.down_functions().is_empty());
}

#[test]
fn test_modifier_combo_in_text_context() {
    let mut manager = engine_manager(None);
    manager.set_active_context(TEXT_CONTEXT).unwrap();
    let log = record(&mut manager);

    down(&mut manager, Key::Control);
    press(&mut manager, Key::C);
    up(&mut manager, Key::Control);

    assert!(log
        .borrow()
        .contains(&(TEXT_COPY.to_string(), BoundKeyState::Down)));
}

#[test]
fn test_saved_user_keybinds_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybinds.yaml");

    let manager = engine_manager(Some(MOVE_UP_ON_ARROW));
    manager.save_user_keybinds(&path).unwrap();

    let saved = load_keybind_file(&path).unwrap();
    assert_eq!(saved.binds.len(), 1);
    assert_eq!(saved.binds[0].function.as_str(), MOVE_UP);
    assert_eq!(saved.binds[0].key, "Up");
    assert_eq!(saved.leave_empty, vec![BoundKeyFunction::new("HideUI")]);

    let mut reloaded = InputManager::with_engine_defaults().unwrap();
    reloaded.load_keybinds(Some(&saved));
    assert_eq!(
        reloaded.key_function_button_string(&BoundKeyFunction::new(MOVE_UP)),
        "Up"
    );
}
