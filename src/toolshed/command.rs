//! Command definitions and the [`Toolshed`] directory

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::completion::{CompletionRequest, CompletionResult};
use super::error::{ConError, ErrorKind, Span};
use super::invocation::{Invocation, InvocationContext};
use super::parser::ParserContext;
use super::run::CommandRun;
use super::value::{Value, ValueType};

/// Implementation closure of a [`Signature`]
pub type CommandFn = dyn Fn(&mut Invocation<'_>) -> anyhow::Result<Value> + Send + Sync;

/// What a command block receives as its piped input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockInput {
    Nothing,
    /// The command's own piped value
    Piped,
    /// One element of the piped list at a time
    Element,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgKind {
    /// A literal, a `$variable` or a `{ block }` producing this type
    Value(ValueType),
    /// A command block the implementation runs itself
    Block {
        input: BlockInput,
        output: Option<ValueType>,
    },
    /// A `$name` the command writes the piped value to
    Assign,
    /// A `$name` the command reads
    Variable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub name: String,
    pub kind: ArgKind,
}

impl ArgSpec {
    /// A literal, `$variable` or `{ block }` producing `ty`
    pub fn value(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: ArgKind::Value(ty),
        }
    }

    /// A command block run by the implementation
    pub fn block(name: impl Into<String>, input: BlockInput, output: Option<ValueType>) -> Self {
        Self {
            name: name.into(),
            kind: ArgKind::Block { input, output },
        }
    }

    /// A `$name` the command writes; its type comes from the piped value
    pub fn assign(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ArgKind::Assign,
        }
    }

    /// A `$name` the command reads
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ArgKind::Variable,
        }
    }

    /// Human readable description of what the argument expects
    pub fn expected(&self) -> String {
        match &self.kind {
            ArgKind::Value(ty) => ty.to_string(),
            ArgKind::Block {
                output: Some(ty), ..
            } => format!("block -> {}", ty),
            ArgKind::Block { output: None, .. } => "block".to_string(),
            ArgKind::Assign | ArgKind::Variable => "$variable".to_string(),
        }
    }

    /// Completion hint, e.g. `<y: int>`
    pub fn hint(&self) -> String {
        format!("<{}: {}>", self.name, self.expected())
    }
}

/// Types known once a command's arguments are parsed, used to resolve its return type
#[derive(Debug, Clone, Copy)]
pub struct TypeEnv<'a> {
    pub piped: Option<&'a ValueType>,
    pub type_args: &'a [ValueType],
    /// Return types of the block arguments, in argument order
    pub blocks: &'a [ValueType],
    /// Parse-time types of the variable arguments, in argument order
    pub variables: &'a [Option<ValueType>],
}

#[derive(Clone)]
pub enum Returns {
    Fixed(ValueType),
    /// Whatever was piped in
    Piped,
    Resolve(fn(&TypeEnv<'_>) -> ValueType),
}

impl Returns {
    pub fn resolve(&self, env: &TypeEnv<'_>) -> ValueType {
        match self {
            Returns::Fixed(ty) => ty.clone(),
            Returns::Piped => env.piped.cloned().unwrap_or(ValueType::Void),
            Returns::Resolve(f) => f(env),
        }
    }
}

impl fmt::Debug for Returns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Returns::Fixed(ty) => f.debug_tuple("Fixed").field(ty).finish(),
            Returns::Piped => f.write_str("Piped"),
            Returns::Resolve(_) => f.write_str("Resolve(..)"),
        }
    }
}

/// One implementation of a command for a given piped type
pub struct Signature {
    subcommand: Option<String>,
    piped: Option<ValueType>,
    type_params: usize,
    args: Vec<ArgSpec>,
    returns: Returns,
    run: Box<CommandFn>,
}

impl Signature {
    /// A signature with no piped input, arguments or return value
    pub fn new(
        run: impl Fn(&mut Invocation<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            subcommand: None,
            piped: None,
            type_params: 0,
            args: Vec::new(),
            returns: Returns::Fixed(ValueType::Void),
            run: Box::new(run),
        }
    }

    pub fn subcommand(mut self, name: impl Into<String>) -> Self {
        self.subcommand = Some(name.into());
        self
    }

    /// Require a piped value assignable to `ty`
    pub fn piped(mut self, ty: ValueType) -> Self {
        self.piped = Some(ty);
        self
    }

    pub fn type_params(mut self, count: usize) -> Self {
        self.type_params = count;
        self
    }

    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.args.push(spec);
        self
    }

    pub fn returns(mut self, ty: ValueType) -> Self {
        self.returns = Returns::Fixed(ty);
        self
    }

    pub fn returns_piped(mut self) -> Self {
        self.returns = Returns::Piped;
        self
    }

    pub fn returns_with(mut self, resolve: fn(&TypeEnv<'_>) -> ValueType) -> Self {
        self.returns = Returns::Resolve(resolve);
        self
    }

    pub fn subcommand_name(&self) -> Option<&str> {
        self.subcommand.as_deref()
    }

    pub fn piped_type(&self) -> Option<&ValueType> {
        self.piped.as_ref()
    }

    pub fn type_param_count(&self) -> usize {
        self.type_params
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    pub fn return_type(&self) -> &Returns {
        &self.returns
    }

    pub(crate) fn call(&self, invocation: &mut Invocation<'_>) -> anyhow::Result<Value> {
        (self.run)(invocation)
    }

    /// How well this signature takes `piped`, `None` if it can't
    fn match_score(&self, piped: Option<&ValueType>) -> Option<u32> {
        match (&self.piped, piped) {
            (None, None) => Some(1000),
            (Some(want), Some(got)) if got == want => Some(1000),
            (Some(want), Some(got)) if got.is_assignable_to(want) => Some(100),
            _ => None,
        }
    }

    pub fn accepts(&self, piped: Option<&ValueType>) -> bool {
        self.match_score(piped).is_some()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("subcommand", &self.subcommand)
            .field("piped", &self.piped)
            .field("type_params", &self.type_params)
            .field("args", &self.args)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// A named command and all of its signatures
#[derive(Debug)]
pub struct CommandDef {
    name: String,
    description: String,
    conversion: bool,
    signatures: Vec<Arc<Signature>>,
}

impl CommandDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            conversion: false,
            signatures: Vec::new(),
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Mark as a type conversion, offered in "did you mean" hints
    pub fn conversion(mut self) -> Self {
        self.conversion = true;
        self
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.signatures.push(Arc::new(signature));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn describe(&self) -> &str {
        &self.description
    }

    pub fn is_conversion(&self) -> bool {
        self.conversion
    }

    pub fn signatures(&self) -> &[Arc<Signature>] {
        &self.signatures
    }

    pub fn has_subcommands(&self) -> bool {
        self.signatures.iter().any(|s| s.subcommand.is_some())
    }

    pub fn subcommands(&self) -> Vec<&str> {
        let mut subs: Vec<&str> = self
            .signatures
            .iter()
            .filter_map(|s| s.subcommand.as_deref())
            .collect();
        subs.sort_unstable();
        subs.dedup();
        subs
    }

    fn for_subcommand<'s>(&'s self, sub: Option<&'s str>) -> impl Iterator<Item = &'s Arc<Signature>> {
        self.signatures
            .iter()
            .filter(move |s| s.subcommand.as_deref() == sub)
    }

    /// Number of type arguments written after the command name
    pub fn type_params(&self, sub: Option<&str>) -> usize {
        self.for_subcommand(sub)
            .map(|s| s.type_params)
            .max()
            .unwrap_or(0)
    }

    /// Piped types the command takes; `void` stands for "nothing piped"
    pub fn accepted_types(&self, sub: Option<&str>) -> Vec<ValueType> {
        let mut types: Vec<ValueType> = self
            .for_subcommand(sub)
            .map(|s| s.piped.clone().unwrap_or(ValueType::Void))
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// Whether any signature, under any subcommand, takes `piped`
    pub fn accepts_piped(&self, piped: Option<&ValueType>) -> bool {
        self.signatures.iter().any(|s| s.accepts(piped))
    }

    /// Pick the signature for this subcommand, piped type and type-argument count.
    ///
    /// Exact piped type matches win over assignable ones; ties go to the
    /// signature registered first.
    pub fn resolve(
        &self,
        sub: Option<&str>,
        piped: Option<&ValueType>,
        type_args: &[ValueType],
    ) -> Option<Arc<Signature>> {
        let mut best: Option<(u32, &Arc<Signature>)> = None;
        for signature in self.for_subcommand(sub) {
            if signature.type_params != type_args.len() {
                continue;
            }
            let Some(score) = signature.match_score(piped) else {
                continue;
            };
            if best.is_none_or(|(b, _)| score > b) {
                best = Some((score, signature));
            }
        }
        best.map(|(_, s)| Arc::clone(s))
    }

    /// `name` or `name:sub` for every way this command can be written
    pub fn invocations(&self) -> Vec<String> {
        if self.has_subcommands() {
            self.subcommands()
                .into_iter()
                .map(|sub| format!("{}:{}", self.name, sub))
                .collect()
        } else {
            vec![self.name.clone()]
        }
    }
}

/// Directory of registered commands plus the entry points for parsing and running them
#[derive(Debug, Default)]
pub struct Toolshed {
    commands: BTreeMap<String, CommandDef>,
    no_multiline: bool,
    /// Sorted `describe_commands` output, rebuilt on every registration
    listing: Arc<RwLock<Vec<String>>>,
}

impl Toolshed {
    /// An empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory holding the builtin command set
    pub fn with_builtins() -> Self {
        let mut shed = Self::new();
        super::builtins::register_builtins(&mut shed);
        shed
    }

    /// Register a command, replacing and returning any previous one with the same name
    pub fn register(&mut self, command: CommandDef) -> Option<CommandDef> {
        let name = command.name.clone();
        let old = self.commands.insert(name.clone(), command);
        if old.is_some() {
            tracing::warn!("Replaced existing command '{}'", name);
        } else {
            tracing::debug!("Registered command '{}'", name);
        }
        self.refresh_listing();
        old
    }

    fn refresh_listing(&self) {
        let mut lines = self.describe_commands();
        lines.sort();
        *self.listing.write().unwrap_or_else(PoisonError::into_inner) = lines;
    }

    /// Live handle to the sorted command listing, for commands that print it
    pub fn listing(&self) -> Arc<RwLock<Vec<String>>> {
        Arc::clone(&self.listing)
    }

    pub fn get(&self, name: &str) -> Option<&CommandDef> {
        self.commands.get(name)
    }

    /// All commands, sorted by name
    pub fn commands(&self) -> impl Iterator<Item = &CommandDef> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Treat newlines as `;` when `false`
    pub fn set_multiline_expressions(&mut self, enabled: bool) {
        self.no_multiline = !enabled;
    }

    pub fn multiline_expressions(&self) -> bool {
        !self.no_multiline
    }

    /// A conversion command taking `from` and returning one of `accepted`
    pub fn conversion_between(&self, from: &ValueType, accepted: &[ValueType]) -> Option<&str> {
        self.commands
            .values()
            .filter(|c| c.conversion)
            .find(|c| {
                c.signatures.iter().any(|s| {
                    if !s.accepts(Some(from)) || s.type_params > 0 {
                        return false;
                    }
                    let env = TypeEnv {
                        piped: Some(from),
                        type_args: &[],
                        blocks: &[],
                        variables: &[],
                    };
                    let out = s.returns.resolve(&env);
                    accepted.iter().any(|a| out.is_assignable_to(a))
                })
            })
            .map(|c| c.name.as_str())
    }

    /// A parser context configured for this directory
    pub fn parser<'a>(&self, input: &'a str) -> ParserContext<'a> {
        ParserContext::new(input).no_multiline(self.no_multiline)
    }

    /// Parse `input` as a full run with an optional piped input type
    pub fn parse(&self, input: &str, piped: Option<&ValueType>) -> Result<CommandRun, ConError> {
        let mut ctx = self.parser(input);
        self.parse_in(&mut ctx, piped)
    }

    /// Parse using a prepared context, e.g. one that knows variable types
    pub fn parse_in(
        &self,
        ctx: &mut ParserContext<'_>,
        piped: Option<&ValueType>,
    ) -> Result<CommandRun, ConError> {
        match CommandRun::parse(ctx, self, piped, None) {
            Some(run) => {
                tracing::debug!("Parsed '{}' -> {}", ctx.input(), run.return_type());
                Ok(run)
            }
            None => Err(ctx.take_error().unwrap_or_else(|| {
                ConError::new(ErrorKind::NotValidCommand).with_span(Span::new(0, ctx.input().len()))
            })),
        }
    }

    /// Parse and run `input`, reporting any error to `ctx`
    pub fn eval(
        &self,
        ctx: &mut dyn InvocationContext,
        input: &str,
        piped: Option<Value>,
    ) -> Option<Value> {
        let piped_type = piped.as_ref().map(Value::value_type);
        let mut parser = self.parser(input).with_variables(ctx.variables());

        match self.parse_in(&mut parser, piped_type.as_ref()) {
            Ok(run) => run.invoke(piped, ctx),
            Err(err) => {
                ctx.write_line(&err.render());
                ctx.report_error(err);
                None
            }
        }
    }

    /// Completion candidates for the end of `input`
    pub fn complete(
        &self,
        input: &str,
        piped: Option<&ValueType>,
        variables: impl IntoIterator<Item = (String, ValueType)>,
    ) -> Option<CompletionResult> {
        let mut ctx = self.parser(input).with_completions().with_variables(variables);
        let _ = CommandRun::parse(&mut ctx, self, piped, None);
        let request: CompletionRequest = ctx.take_completions()?;
        tracing::debug!("Completion request for '{}': {:?}", input, request);
        Some(request.resolve(self))
    }

    /// One `name - description` line per command
    pub fn describe_commands(&self) -> Vec<String> {
        self.commands
            .values()
            .flat_map(|c| {
                c.invocations()
                    .into_iter()
                    .map(move |inv| format!("{} - {}", inv, c.description))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Invocation<'_>) -> anyhow::Result<Value> {
        Ok(Value::Void)
    }

    #[test]
    fn test_resolve_prefers_exact_piped_type() {
        let def = CommandDef::new("show")
            .signature(Signature::new(noop).piped(ValueType::Any).returns(ValueType::String))
            .signature(Signature::new(noop).piped(ValueType::Int).returns(ValueType::Int));

        let sig = def.resolve(None, Some(&ValueType::Int), &[]).unwrap();
        assert_eq!(sig.piped_type(), Some(&ValueType::Int));

        let sig = def.resolve(None, Some(&ValueType::Bool), &[]).unwrap();
        assert_eq!(sig.piped_type(), Some(&ValueType::Any));

        assert!(def.resolve(None, None, &[]).is_none());
    }

    #[test]
    fn test_resolve_checks_type_params_and_subcommand() {
        let def = CommandDef::new("math")
            .signature(Signature::new(noop).subcommand("neg").piped(ValueType::Int))
            .signature(Signature::new(noop).subcommand("abs").piped(ValueType::Int));
        assert!(def.has_subcommands());
        assert_eq!(def.subcommands(), vec!["abs", "neg"]);
        assert!(def.resolve(Some("neg"), Some(&ValueType::Int), &[]).is_some());
        assert!(def.resolve(None, Some(&ValueType::Int), &[]).is_none());
        assert!(def
            .resolve(Some("neg"), Some(&ValueType::Int), &[ValueType::Int])
            .is_none());
        assert_eq!(def.invocations(), vec!["math:abs", "math:neg"]);
    }

    #[test]
    fn test_accepted_types() {
        let def = CommandDef::new("x")
            .signature(Signature::new(noop).piped(ValueType::Int))
            .signature(Signature::new(noop));
        assert_eq!(def.accepted_types(None), vec![ValueType::Void, ValueType::Int]);
    }

    #[test]
    fn test_conversion_between() {
        let mut shed = Toolshed::new();
        shed.register(
            CommandDef::new("toint")
                .conversion()
                .signature(Signature::new(noop).piped(ValueType::Float).returns(ValueType::Int)),
        );
        assert_eq!(
            shed.conversion_between(&ValueType::Float, &[ValueType::Int]),
            Some("toint")
        );
        assert_eq!(shed.conversion_between(&ValueType::Bool, &[ValueType::Int]), None);
    }

    #[test]
    fn test_register_replaces() {
        let mut shed = Toolshed::new();
        assert!(shed.register(CommandDef::new("a")).is_none());
        assert!(shed.register(CommandDef::new("a")).is_some());
        assert_eq!(shed.len(), 1);
    }
}
