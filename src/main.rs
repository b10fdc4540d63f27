use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;

use keyshed::cli::{parse_input_value, CliArgs, CliCommand, KeyEventToken};
use keyshed::input::{InputManager, KeyEventArgs};
use keyshed::toolshed::{LocalContext, Toolshed, Value, ValueType};
use keyshed::AppConfig;

fn main() -> Result<ExitCode> {
    keyshed::tracing::init();

    let args = CliArgs::parse();
    let config = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let shed = config.toolshed();

    match args.command {
        CliCommand::Eval { expression, input } => {
            let input = match input {
                Some(text) => Some(
                    parse_input_value(&text)
                        .map_err(|e| anyhow::anyhow!("Bad --input value:\n{}", e.render()))?,
                ),
                None => None,
            };
            Ok(eval(&shed, &expression, input))
        }
        CliCommand::Complete {
            expression,
            input_type,
        } => {
            let piped: Option<ValueType> = input_type
                .map(|t| t.parse::<ValueType>())
                .transpose()
                .context("Bad --input-type")?;
            let mut result = shed
                .complete(&expression, piped.as_ref(), std::iter::empty())
                .unwrap_or_default();
            result.truncate(config.max_completions);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Keys {
            keybinds,
            context,
            events,
        } => {
            let mut manager = config.input_manager(keybinds.as_deref())?;
            if let Some(context) = context {
                manager.set_active_context(&context)?;
            }
            replay_keys(&mut manager, &shed, &events)?;
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Commands => {
            let mut lines = shed.describe_commands();
            lines.sort();
            for line in lines {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run one expression, printing its output and non-void result
fn eval(shed: &Toolshed, expression: &str, input: Option<Value>) -> ExitCode {
    let mut ctx = LocalContext::new();
    let result = shed.eval(&mut ctx, expression, input);

    for line in ctx.take_output() {
        println!("{}", line);
    }
    match result {
        Some(value) => {
            if !value.is_void() {
                println!("{}", value);
            }
            ExitCode::SUCCESS
        }
        None => ExitCode::FAILURE,
    }
}

fn replay_keys(manager: &mut InputManager, shed: &Toolshed, events: &[KeyEventToken]) -> Result<()> {
    let fired = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&fired);
    manager.on_key_bind_state_changed(move |args| {
        sink.borrow_mut()
            .push(format!("{} {:?}", args.function, args.state));
    });

    for event in events {
        match event {
            KeyEventToken::Down(key) => manager.key_down(&mut KeyEventArgs::new(*key)),
            KeyEventToken::Repeat(key) => manager.key_down(&mut KeyEventArgs::repeat(*key)),
            KeyEventToken::Up(key) => manager.key_up(&mut KeyEventArgs::new(*key)),
            KeyEventToken::Context(name) => manager.set_active_context(name)?,
        }

        for line in fired.borrow_mut().drain(..) {
            println!("{:?}: {}", event, line);
        }

        // Command bindings queue console expressions
        for command in manager.take_queued_commands() {
            println!("{:?}: > {}", event, command);
            eval(shed, &command, None);
        }
    }
    Ok(())
}
