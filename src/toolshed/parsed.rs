//! A single parsed command and its invocation

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::args::{parse_arg, parse_type, ParsedArg};
use super::command::{ArgKind, Signature, Toolshed, TypeEnv};
use super::completion::CompletionRequest;
use super::error::{ConError, ErrorKind, Span};
use super::invocation::{Invocation, InvocationContext, Reported};
use super::parser::ParserContext;
use super::value::{Value, ValueType};

/// Everything parsed after the command name
#[derive(Debug, Clone, Default)]
pub struct ArgumentBundle {
    pub inverted: bool,
    pub piped_type: Option<ValueType>,
    pub type_args: Vec<ValueType>,
    pub args: Vec<ParsedArg>,
}

/// Runes allowed in a command name
pub(crate) fn is_command_token(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(
            c,
            '{' | '}' | '[' | ']' | '(' | ')' | ';' | '|' | ':' | '$' | '"' | ','
        )
}

/// A command bound to its signature and arguments
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    name: String,
    subcommand: Option<String>,
    bundle: ArgumentBundle,
    signature: Arc<Signature>,
    return_type: ValueType,
    /// Permission verdict and the epoch it was computed in
    permission: Cell<Option<(u64, bool)>>,
}

impl ParsedCommand {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subcommand(&self) -> Option<&str> {
        self.subcommand.as_deref()
    }

    /// `name` or `name:sub`
    pub fn full_name(&self) -> String {
        match &self.subcommand {
            Some(sub) => format!("{}:{}", self.name, sub),
            None => self.name.clone(),
        }
    }

    pub fn bundle(&self) -> &ArgumentBundle {
        &self.bundle
    }

    pub fn return_type(&self) -> &ValueType {
        &self.return_type
    }

    /// Parse one command, its subcommand and its arguments at the cursor
    ///
    /// Failures are left on `ctx` as its error.
    pub fn parse(
        ctx: &mut ParserContext<'_>,
        shed: &Toolshed,
        piped: Option<&ValueType>,
    ) -> Option<ParsedCommand> {
        ctx.consume_whitespace();
        let inverted = ctx.eat_match_str("not");
        ctx.consume_whitespace();

        let name_start = ctx.index();
        let starts_with_digit = ctx.peek_rune().is_some_and(|c| c.is_ascii_digit());
        let word = if starts_with_digit {
            None
        } else {
            ctx.get_word(is_command_token)
        };

        let Some(name) = word else {
            fail_no_command(ctx, piped, name_start);
            return None;
        };

        let Some(def) = shed.get(name) else {
            if ctx.out_of_input() {
                ctx.set_completions(CompletionRequest::Commands {
                    piped: piped.cloned(),
                    partial: name.to_string(),
                });
            }
            ctx.fail(
                ErrorKind::UnknownCommand {
                    name: name.to_string(),
                },
                Span::new(name_start, ctx.index()),
            );
            return None;
        };

        let subcommand = if def.has_subcommands() {
            Some(parse_subcommand(ctx, def.name(), &def.subcommands(), piped)?)
        } else {
            None
        };

        if ctx.generate_completions() && ctx.out_of_input() && subcommand.is_none() {
            ctx.set_completions(CompletionRequest::Commands {
                piped: piped.cloned(),
                partial: name.to_string(),
            });
            ctx.fail(ErrorKind::OutOfInput, Span::new(ctx.index(), ctx.index()));
            return None;
        }

        let sub = subcommand.as_deref();
        let full_name = match sub {
            Some(sub) => format!("{}:{}", name, sub),
            None => name.to_string(),
        };

        let mut type_args = Vec::new();
        for _ in 0..def.type_params(sub) {
            type_args.push(parse_type(ctx, &full_name)?);
        }

        let Some(signature) = def.resolve(sub, piped, &type_args) else {
            let accepted = def.accepted_types(sub);
            let conversion = piped
                .and_then(|p| shed.conversion_between(p, &accepted))
                .map(str::to_string);
            ctx.fail(
                ErrorKind::NoImplementation {
                    command: full_name,
                    piped: piped.cloned(),
                    accepted,
                    conversion,
                },
                Span::new(name_start, ctx.index()),
            );
            return None;
        };

        let mut args = Vec::with_capacity(signature.args().len());
        let mut blocks = Vec::new();
        let mut variables = Vec::new();
        for spec in signature.args() {
            let arg = parse_arg(ctx, shed, &full_name, spec, piped)?;
            match (&spec.kind, &arg) {
                (ArgKind::Block { .. }, ParsedArg::Block(block)) => {
                    blocks.push(block.return_type().clone())
                }
                (ArgKind::Variable, ParsedArg::Var(var)) => {
                    variables.push(ctx.variable_type(var).cloned())
                }
                (ArgKind::Assign, ParsedArg::Var(_)) => variables.push(piped.cloned()),
                _ => {}
            }
            args.push(arg);
        }

        let return_type = signature.return_type().resolve(&TypeEnv {
            piped,
            type_args: &type_args,
            blocks: &blocks,
            variables: &variables,
        });

        tracing::trace!(
            "parsed command {} ({} -> {})",
            full_name,
            piped.map_or_else(|| "void".to_string(), ToString::to_string),
            return_type
        );

        Some(ParsedCommand {
            name: name.to_string(),
            subcommand,
            bundle: ArgumentBundle {
                inverted,
                piped_type: piped.cloned(),
                type_args,
                args,
            },
            signature,
            return_type,
            permission: Cell::new(None),
        })
    }

    /// Whether `ctx` may run this command, cached until its permission epoch changes
    fn permitted(&self, ctx: &dyn InvocationContext) -> bool {
        let epoch = ctx.permission_epoch();
        if let Some((cached_epoch, allowed)) = self.permission.get() {
            if cached_epoch == epoch {
                return allowed;
            }
        }
        let allowed = ctx.check_invoke_permission(&self.name);
        self.permission.set(Some((epoch, allowed)));
        allowed
    }

    /// Run the command, reporting failures to `ctx`.
    ///
    /// Errors and panics from the implementation end up as `UnhandledException`.
    pub fn invoke(&self, piped: Value, ctx: &mut dyn InvocationContext) -> Option<Value> {
        if !self.permitted(ctx) {
            ctx.report_error(ConError::new(ErrorKind::NoPermission {
                command: self.full_name(),
            }));
            return None;
        }

        let outcome = {
            let mut invocation = Invocation::new(piped, &self.bundle, &mut *ctx);
            panic::catch_unwind(AssertUnwindSafe(|| self.signature.call(&mut invocation)))
        };

        let error = match outcome {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(err)) => err,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Command '{}' panicked: {}", self.full_name(), message);
                ctx.report_error(ConError::new(ErrorKind::UnhandledException { message }));
                return None;
            }
        };

        if error.is::<Reported>() {
            return None;
        }
        match error.downcast::<ConError>() {
            Ok(con) => ctx.report_error(con),
            Err(other) => {
                let trace = other
                    .chain()
                    .skip(1)
                    .map(ToString::to_string)
                    .collect::<Vec<_>>();
                let mut con = ConError::new(ErrorKind::UnhandledException {
                    message: other.to_string(),
                });
                if !trace.is_empty() {
                    con = con.with_trace(trace.join("\n"));
                }
                ctx.report_error(con);
            }
        }
        None
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "command panicked".to_string()
    }
}

/// No command name where one was expected
fn fail_no_command(ctx: &mut ParserContext<'_>, piped: Option<&ValueType>, at: usize) {
    if ctx.out_of_input() {
        ctx.set_completions(CompletionRequest::Commands {
            piped: piped.cloned(),
            partial: String::new(),
        });
        ctx.fail(ErrorKind::OutOfInput, Span::new(at, at));
        return;
    }

    if ctx.peek_rune() == Some('{') {
        let checkpoint = ctx.save();
        let balanced = ctx.slice_block('{', '}').is_some();
        ctx.restore(&checkpoint);
        if !balanced {
            let end = ctx.input().len();
            ctx.fail(ErrorKind::MissingClosingBrace, Span::new(at, end));
            return;
        }
    }

    let width = ctx.peek_rune().map_or(1, char::len_utf8);
    ctx.fail(ErrorKind::NotValidCommand, Span::new(at, at + width));
}

/// `:sub` after a command group name
fn parse_subcommand(
    ctx: &mut ParserContext<'_>,
    command: &str,
    valid: &[&str],
    piped: Option<&ValueType>,
) -> Option<String> {
    let valid_names = || valid.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    if !ctx.eat_match(':') {
        let at = ctx.index();
        if ctx.out_of_input() {
            ctx.set_completions(CompletionRequest::Subcommands {
                command: command.to_string(),
                piped: piped.cloned(),
                partial: String::new(),
            });
            ctx.fail(ErrorKind::OutOfInput, Span::new(at, at));
        } else {
            ctx.fail(
                ErrorKind::UnknownSubcommand {
                    command: command.to_string(),
                    subcommand: String::new(),
                    valid: valid_names(),
                },
                Span::new(at, at + 1),
            );
        }
        return None;
    }

    let sub_start = ctx.index();
    ctx.consume(is_command_token);
    let sub = &ctx.input()[sub_start..ctx.index()];

    if ctx.out_of_input() {
        ctx.set_completions(CompletionRequest::Subcommands {
            command: command.to_string(),
            piped: piped.cloned(),
            partial: sub.to_string(),
        });
    }

    if sub.is_empty() {
        ctx.fail(ErrorKind::OutOfInput, Span::new(sub_start, sub_start));
        return None;
    }

    if !valid.contains(&sub) {
        ctx.fail(
            ErrorKind::UnknownSubcommand {
                command: command.to_string(),
                subcommand: sub.to_string(),
                valid: valid_names(),
            },
            Span::new(sub_start, ctx.index()),
        );
        return None;
    }

    if ctx.generate_completions() && ctx.out_of_input() {
        ctx.fail(ErrorKind::OutOfInput, Span::new(ctx.index(), ctx.index()));
        return None;
    }

    Some(sub.to_string())
}
