//! Command runs: parsing a chain of piped commands and invoking it

use std::sync::Arc;

use super::command::Toolshed;
use super::completion::CompletionRequest;
use super::error::{ConError, ErrorKind, Span};
use super::invocation::InvocationContext;
use super::parsed::ParsedCommand;
use super::parser::ParserContext;
use super::value::{Value, ValueType};

/// An ordered chain of parsed commands
#[derive(Debug, Clone)]
pub struct CommandRun {
    commands: Vec<(ParsedCommand, Span)>,
    expression: Arc<str>,
    piped: Option<ValueType>,
    return_type: ValueType,
}

impl CommandRun {
    pub fn commands(&self) -> &[(ParsedCommand, Span)] {
        &self.commands
    }

    /// The source text this run was parsed from
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn piped_type(&self) -> Option<&ValueType> {
        self.piped.as_ref()
    }

    pub fn return_type(&self) -> &ValueType {
        &self.return_type
    }

    /// Parse commands until the input or the enclosing block ends
    pub fn parse(
        ctx: &mut ParserContext<'_>,
        shed: &Toolshed,
        piped: Option<&ValueType>,
        target: Option<&ValueType>,
    ) -> Option<CommandRun> {
        Self::parse_inner(ctx, shed, piped, target, false)
    }

    /// Parse exactly one command
    pub fn parse_once(
        ctx: &mut ParserContext<'_>,
        shed: &Toolshed,
        piped: Option<&ValueType>,
        target: Option<&ValueType>,
    ) -> Option<CommandRun> {
        Self::parse_inner(ctx, shed, piped, target, true)
    }

    fn parse_inner(
        ctx: &mut ParserContext<'_>,
        shed: &Toolshed,
        piped: Option<&ValueType>,
        target: Option<&ValueType>,
        once: bool,
    ) -> Option<CommandRun> {
        let input_type = piped.cloned();
        let mut piped = piped.cloned();
        let mut commands = Vec::new();

        ctx.consume_whitespace();
        let mut start = ctx.index();

        if ctx.peek_block_terminator() {
            ctx.fail(ErrorKind::EmptyCommandRun, Span::new(start, start + 1));
            return None;
        }

        loop {
            let command = ParsedCommand::parse(ctx, shed, piped.as_ref())?;
            piped = Some(command.return_type().clone());
            commands.push((command, Span::new(start, ctx.index())));

            if once {
                break;
            }

            let before_whitespace = ctx.index();
            ctx.consume_whitespace();
            let command_expected = ctx.eat_command_terminators(&mut piped);

            if ctx.peek_block_terminator() {
                if !command_expected {
                    break;
                }
                if !ctx.generate_completions() {
                    ctx.fail(
                        ErrorKind::UnexpectedCloseBrace,
                        Span::new(ctx.index(), ctx.index() + 1),
                    );
                    return None;
                }
            }

            if ctx.out_of_input() {
                if !command_expected {
                    // Trailing whitespace after a value: offer what can be piped next
                    let pipeable = piped.as_ref().is_some_and(|t| *t != ValueType::Void);
                    if pipeable && ctx.index() > before_whitespace {
                        ctx.set_completions(CompletionRequest::Commands {
                            piped: piped.clone(),
                            partial: String::new(),
                        });
                    }
                    break;
                }
                ctx.set_completions(CompletionRequest::Commands {
                    piped: piped.clone(),
                    partial: String::new(),
                });
                ctx.fail(ErrorKind::OutOfInput, Span::new(ctx.index(), ctx.index()));
                return None;
            }

            start = ctx.index();
            if piped.as_ref() != Some(&ValueType::Void) {
                continue;
            }

            ctx.fail(ErrorKind::EndOfCommand, Span::new(ctx.index(), ctx.index() + 1));
            return None;
        }

        let return_type = match (&piped, commands.last()) {
            (Some(_), Some((last, _))) => last.return_type().clone(),
            _ => ValueType::Void,
        };

        if let Some(target) = target {
            if !return_type.is_assignable_to(target) {
                let first = commands.first().map_or(start, |(_, span)| span.start);
                ctx.fail(
                    ErrorKind::WrongCommandReturn {
                        expected: target.clone(),
                        found: return_type,
                    },
                    Span::new(first, ctx.index()),
                );
                return None;
            }
        }

        Some(CommandRun {
            commands,
            expression: Arc::clone(ctx.expression()),
            piped: input_type,
            return_type,
        })
    }

    /// Run every command in order, threading the piped value through.
    ///
    /// Errors are contextualized with this run's expression, written to the
    /// context's output and left on the context; the result is then `None`.
    pub fn invoke(&self, input: Option<Value>, ctx: &mut dyn InvocationContext) -> Option<Value> {
        if !ctx.errors().is_empty() {
            tracing::error!("Invoked '{}' with unhandled errors pending", self.expression);
            ctx.report_error(ConError::new(ErrorKind::ImproperlyHandledErrors));
            return None;
        }

        let result = self.invoke_nested(input, ctx);
        if result.is_none() {
            let errors = ctx.take_errors();
            for err in &errors {
                ctx.write_line(&err.render());
            }
            for err in errors {
                ctx.report_error(err);
            }
        }
        result
    }

    /// Like [`invoke`](Self::invoke) but without writing errors out, for blocks
    pub(crate) fn invoke_nested(
        &self,
        input: Option<Value>,
        ctx: &mut dyn InvocationContext,
    ) -> Option<Value> {
        let mut result = input.unwrap_or_default();

        for (command, span) in &self.commands {
            let ret = command.invoke(result, ctx);

            if !ctx.errors().is_empty() || ret.is_none() {
                let mut errors = ctx.take_errors();
                if errors.is_empty() {
                    errors.push(ConError::new(ErrorKind::UnhandledException {
                        message: format!("'{}' returned nothing", command.full_name()),
                    }));
                }
                for mut err in errors {
                    err.contextualize(&self.expression, *span);
                    ctx.report_error(err);
                }
                return None;
            }
            result = ret.unwrap_or_default();
        }

        Some(result)
    }
}
