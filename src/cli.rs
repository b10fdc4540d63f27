//! Command-line argument parsing
//!
//! Supports:
//! - Evaluating a Toolshed expression
//! - Completing a partial expression
//! - Replaying key events through the input manager
//! - Listing the builtin commands

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::input::{Key, UnknownKeyName};
use crate::toolshed::{parse_literal, ConError, ErrorKind, ParserContext, Span, Value, ValueType};

/// Keybinding resolution and the Toolshed command language
#[derive(Parser, Debug)]
#[command(name = "keyshed", version, about)]
pub struct CliArgs {
    /// Config file to use instead of `~/.config/keyshed/config.yaml`
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum CliCommand {
    /// Parse and run an expression
    Eval {
        expression: String,

        /// Value piped into the first command, e.g. `3`, `"text"` or `[1, 2]`
        #[arg(long, value_name = "VALUE")]
        input: Option<String>,
    },

    /// List completions for the end of an expression
    Complete {
        expression: String,

        /// Type piped into the first command
        #[arg(long, value_name = "TYPE")]
        input_type: Option<String>,
    },

    /// Feed key events to the input manager and print what fires
    ///
    /// `+Key` presses, `-Key` releases, `*Key` repeats and `@name` switches
    /// the active context.
    Keys {
        #[arg(long, value_name = "FILE")]
        keybinds: Option<PathBuf>,

        /// Context to start in
        #[arg(long, value_name = "NAME")]
        context: Option<String>,

        #[arg(required = true, allow_hyphen_values = true, value_name = "EVENTS")]
        events: Vec<KeyEventToken>,
    },

    /// List every command with its description
    Commands,
}

/// One step of a `keys` replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEventToken {
    Down(Key),
    Up(Key),
    Repeat(Key),
    Context(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyEventTokenError {
    #[error("'{0}' should start with +, -, * or @")]
    MissingPrefix(String),
    #[error("'@' needs a context name")]
    EmptyContext,
    #[error(transparent)]
    Key(#[from] UnknownKeyName),
}

impl FromStr for KeyEventToken {
    type Err = KeyEventTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let prefix = chars.next();
        let rest = chars.as_str();

        match prefix {
            Some('@') if rest.is_empty() => Err(KeyEventTokenError::EmptyContext),
            Some('@') => Ok(KeyEventToken::Context(rest.to_string())),
            Some('+') => Ok(KeyEventToken::Down(rest.parse()?)),
            Some('-') => Ok(KeyEventToken::Up(rest.parse()?)),
            Some('*') => Ok(KeyEventToken::Repeat(rest.parse()?)),
            _ => Err(KeyEventTokenError::MissingPrefix(s.to_string())),
        }
    }
}

/// Parse an `--input` value, inferring its type
pub fn parse_input_value(text: &str) -> Result<Value, ConError> {
    let mut ctx = ParserContext::new(text);
    let value = parse_literal(&mut ctx, &ValueType::Any);
    if let Some(err) = ctx.take_error() {
        return Err(err);
    }

    ctx.consume_whitespace();
    match value {
        Some(value) if ctx.out_of_input() => Ok(value),
        _ => Err(ConError::new(ErrorKind::ArgumentParse {
            input: text.to_string(),
            expected: ValueType::Any.to_string(),
        })
        .with_span(Span::new(0, text.len()))),
    }
}
