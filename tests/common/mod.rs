//! Shared test helpers for integration tests
//!
//! Note: Functions may appear unused because each test file compiles separately.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use keyshed::input::{parse_keybinds_yaml, BoundKeyState, InputManager, Key, KeyEventArgs};
use keyshed::toolshed::{ArgSpec, CommandDef, LocalContext, Signature, Toolshed, Value, ValueType};

pub type EventLog = Rc<RefCell<Vec<(String, BoundKeyState)>>>;

/// Builtins plus `double` (int -> int) and `add <y: int>` (int -> int)
pub fn test_shed() -> Toolshed {
    let mut shed = Toolshed::with_builtins();
    shed.register(
        CommandDef::new("double")
            .description("Doubles the piped int")
            .signature(
                Signature::new(|inv| {
                    let x = inv.piped().as_int().unwrap_or_default();
                    Ok(Value::Int(x * 2))
                })
                .piped(ValueType::Int)
                .returns(ValueType::Int),
            ),
    );
    shed.register(
        CommandDef::new("add")
            .description("Adds an int to the piped int")
            .signature(
                Signature::new(|inv| {
                    let x = inv.piped().as_int().unwrap_or_default();
                    Ok(Value::Int(x + inv.int(0)?))
                })
                .piped(ValueType::Int)
                .arg(ArgSpec::value("y", ValueType::Int))
                .returns(ValueType::Int),
            ),
    );
    shed
}

/// Evaluate and return the value plus every output line
pub fn eval(shed: &Toolshed, input: &str, piped: Option<Value>) -> (Option<Value>, Vec<String>) {
    let mut ctx = LocalContext::new();
    let value = shed.eval(&mut ctx, input, piped);
    (value, ctx.take_output())
}

/// Engine contexts and functions with `user` layered over the shipped keybinds
pub fn engine_manager(user: Option<&str>) -> InputManager {
    let mut manager = InputManager::with_engine_defaults().unwrap();
    let user = user.map(|yaml| parse_keybinds_yaml(yaml).unwrap());
    manager.load_keybinds(user.as_ref());
    manager
}

pub fn record(manager: &mut InputManager) -> EventLog {
    let log: EventLog = Rc::default();
    let sink = Rc::clone(&log);
    manager.on_key_bind_state_changed(move |args| {
        sink.borrow_mut()
            .push((args.function.as_str().to_string(), args.state));
    });
    log
}

pub fn down(manager: &mut InputManager, key: Key) {
    manager.key_down(&mut KeyEventArgs::new(key));
}

pub fn up(manager: &mut InputManager, key: Key) {
    manager.key_up(&mut KeyEventArgs::new(key));
}

pub fn press(manager: &mut InputManager, key: Key) {
    down(manager, key);
    up(manager, key);
}
