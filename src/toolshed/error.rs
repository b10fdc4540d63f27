//! Structured parse and runtime errors
//!
//! Errors are plain data. The parser leaves them on its context and the
//! invocation engine collects them on the invocation context; neither panics.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use super::value::ValueType;

/// Byte range into the source expression that an error points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

fn pipe_name(ty: &Option<ValueType>) -> String {
    ty.as_ref().map_or_else(|| "void".to_string(), ToString::to_string)
}

fn join_types(types: &[ValueType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn conversion_hint(conversion: &Option<String>) -> String {
    conversion
        .as_ref()
        .map(|cmd| format!(" Did you mean to convert first with '{}'?", cmd))
        .unwrap_or_default()
}

/// What went wrong
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("Ran out of input data when data was expected.")]
    OutOfInput,

    #[error("Ran into an invalid command, could not parse.")]
    NotValidCommand,

    #[error("Got unknown command {name}.")]
    UnknownCommand { name: String },

    #[error("The command group {command} doesn't have command {subcommand}. The valid commands are: {}.", valid.join(", "))]
    UnknownSubcommand {
        command: String,
        subcommand: String,
        valid: Vec<String>,
    },

    #[error(
        "Could not find an implementation of the '{command}' command given the input type '{}'. Accepted types: {}.{}",
        pipe_name(piped),
        join_types(accepted),
        conversion_hint(conversion)
    )]
    NoImplementation {
        command: String,
        piped: Option<ValueType>,
        accepted: Vec<ValueType>,
        /// A conversion command that bridges the piped type to an accepted one
        conversion: Option<String>,
    },

    #[error("Empty command block")]
    EmptyCommandRun,

    #[error("Ran into an unexpected closing brace, }}.")]
    UnexpectedCloseBrace,

    #[error("Expected a command or block terminator (';' or '}}')")]
    EndOfCommand,

    #[error("Expected an command run that returns type {expected}, but got {found}")]
    WrongCommandReturn {
        expected: ValueType,
        found: ValueType,
    },

    #[error("Expected a closing brace, }}.")]
    MissingClosingBrace,

    #[error("Expected an argument '{name}' of type {expected} for command '{command}'.")]
    ExpectedArgument {
        command: String,
        name: String,
        expected: String,
    },

    #[error("Expected a type argument for command '{command}'.")]
    ExpectedTypeArgument { command: String },

    #[error("Unknown type '{name}'.")]
    UnknownType { name: String },

    #[error("Could not parse '{input}' as {expected}.")]
    ArgumentParse { input: String, expected: String },

    #[error("Insufficient permissions to run '{command}'.")]
    NoPermission { command: String },

    #[error("Variable ${name} is not defined.")]
    UndefinedVariable { name: String },

    #[error("Variable ${name} holds a {found}, expected {expected}.")]
    BadVarType {
        name: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("An exception occurred while running the command: {message}")]
    UnhandledException { message: String },

    #[error("Tried to run a command on a context that still holds unhandled errors.")]
    ImproperlyHandledErrors,
}

/// A parse-time or runtime error with the expression it came from
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}")]
pub struct ConError {
    pub kind: ErrorKind,
    pub expression: Option<Arc<str>>,
    pub span: Option<Span>,
    pub trace: Option<String>,
}

impl ConError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            expression: None,
            span: None,
            trace: None,
        }
    }

    pub fn with_span(mut self, span: impl Into<Span>) -> Self {
        self.span = Some(span.into());
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Attach the source expression and a fallback span, keeping anything already set
    pub fn contextualize(&mut self, expression: &Arc<str>, span: Span) {
        if self.expression.is_none() {
            self.expression = Some(Arc::clone(expression));
        }
        if self.span.is_none() {
            self.span = Some(span);
        }
    }

    /// The description followed by the expression with the span underlined
    pub fn render(&self) -> String {
        let mut out = self.kind.to_string();
        if let (Some(expr), Some(span)) = (&self.expression, self.span) {
            let start = expr[..span.start.min(expr.len())].chars().count();
            let width = expr
                .get(span.start.min(expr.len())..span.end.min(expr.len()))
                .map_or(0, |s| s.chars().count())
                .max(1);
            out.push('\n');
            out.push_str(expr);
            out.push('\n');
            out.push_str(&" ".repeat(start));
            out.push_str(&"^".repeat(width));
        }
        if let Some(trace) = &self.trace {
            out.push('\n');
            out.push_str(trace);
        }
        out
    }
}

impl From<ErrorKind> for ConError {
    fn from(kind: ErrorKind) -> Self {
        ConError::new(kind)
    }
}
