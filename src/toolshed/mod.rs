//! Toolshed, a small typed command language
//!
//! An expression is a run of commands. Each command's return value is piped
//! into the next one, `;` drops the piped value and `|` keeps it explicitly.
//!
//! ```text
//! i 5 iota map { + 1 } => $xs; var $xs sum
//! ```
//!
//! Parsing resolves every command against the piped type, so type errors
//! are reported before anything runs. Errors are [`ConError`] values; the
//! parser leaves them on its [`ParserContext`] and the invocation engine on
//! the [`InvocationContext`].

mod args;
pub mod builtins;
mod command;
mod completion;
mod error;
mod invocation;
mod parsed;
mod parser;
mod run;
mod value;

pub use args::{parse_literal, Block, ParsedArg, ValueRef};
pub use command::{
    ArgKind, ArgSpec, BlockInput, CommandDef, CommandFn, Returns, Signature, Toolshed, TypeEnv,
};
pub use completion::{CompletionOption, CompletionRequest, CompletionResult};
pub use error::{ConError, ErrorKind, Span};
pub use invocation::{Invocation, InvocationContext, LocalContext};
pub use parsed::{ArgumentBundle, ParsedCommand};
pub use parser::{ParserContext, RestorePoint};
pub use run::CommandRun;
pub use value::{UnknownTypeName, Value, ValueType};

#[cfg(test)]
mod tests;
