//! Invocation contexts and the argument view handed to command implementations

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, bail};

use super::args::{Block, ParsedArg, ValueRef};
use super::error::{ConError, ErrorKind};
use super::parsed::ArgumentBundle;
use super::value::{Value, ValueType};

/// Where a run executes: output sink, error list, variables and permissions
pub trait InvocationContext {
    /// Whether `command` may run here
    fn check_invoke_permission(&self, _command: &str) -> bool {
        true
    }

    /// Changes whenever the answer of [`check_invoke_permission`](Self::check_invoke_permission) may have changed
    fn permission_epoch(&self) -> u64 {
        0
    }

    fn write_line(&mut self, line: &str);

    fn report_error(&mut self, error: ConError);

    fn errors(&self) -> &[ConError];

    fn take_errors(&mut self) -> Vec<ConError>;

    fn read_var(&self, name: &str) -> Option<&Value>;

    fn write_var(&mut self, name: &str, value: Value);

    /// Names and current types of all variables
    fn variables(&self) -> Vec<(String, ValueType)>;
}

/// In-memory context collecting output lines
#[derive(Debug, Default)]
pub struct LocalContext {
    output: Vec<String>,
    errors: Vec<ConError>,
    vars: BTreeMap<String, Value>,
    denied: BTreeSet<String>,
    epoch: u64,
}

impl LocalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Forbid running `command`
    pub fn deny(&mut self, command: impl Into<String>) {
        if self.denied.insert(command.into()) {
            self.epoch += 1;
        }
    }

    pub fn allow(&mut self, command: &str) {
        if self.denied.remove(command) {
            self.epoch += 1;
        }
    }
}

impl InvocationContext for LocalContext {
    fn check_invoke_permission(&self, command: &str) -> bool {
        !self.denied.contains(command)
    }

    fn permission_epoch(&self) -> u64 {
        self.epoch
    }

    fn write_line(&mut self, line: &str) {
        tracing::debug!("console: {}", line);
        self.output.push(line.to_string());
    }

    fn report_error(&mut self, error: ConError) {
        self.errors.push(error);
    }

    fn errors(&self) -> &[ConError] {
        &self.errors
    }

    fn take_errors(&mut self) -> Vec<ConError> {
        std::mem::take(&mut self.errors)
    }

    fn read_var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    fn write_var(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    fn variables(&self) -> Vec<(String, ValueType)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.value_type()))
            .collect()
    }
}

/// A nested run failed and already left its errors on the context
#[derive(Debug, thiserror::Error)]
#[error("errors were reported to the invocation context")]
pub(crate) struct Reported;

/// One call of a command implementation
pub struct Invocation<'a> {
    piped: Value,
    bundle: &'a ArgumentBundle,
    ctx: &'a mut dyn InvocationContext,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        piped: Value,
        bundle: &'a ArgumentBundle,
        ctx: &'a mut dyn InvocationContext,
    ) -> Self {
        Self { piped, bundle, ctx }
    }

    pub fn piped(&self) -> &Value {
        &self.piped
    }

    pub fn take_piped(&mut self) -> Value {
        std::mem::take(&mut self.piped)
    }

    /// Set by a leading `not`
    pub fn inverted(&self) -> bool {
        self.bundle.inverted
    }

    pub fn type_arg(&self, index: usize) -> anyhow::Result<&'a ValueType> {
        self.bundle
            .type_args
            .get(index)
            .ok_or_else(|| anyhow!("missing type argument {}", index))
    }

    pub fn context(&mut self) -> &mut dyn InvocationContext {
        &mut *self.ctx
    }

    fn arg(&self, index: usize) -> anyhow::Result<&'a ParsedArg> {
        let bundle: &'a ArgumentBundle = self.bundle;
        bundle
            .args
            .get(index)
            .ok_or_else(|| anyhow!("missing argument {}", index))
    }

    /// Resolve a value argument, reading variables and running value blocks
    pub fn value(&mut self, index: usize) -> anyhow::Result<Value> {
        let ParsedArg::Value(value) = self.arg(index)? else {
            bail!("argument {} is not a value", index);
        };
        match value {
            ValueRef::Literal(v) => Ok(v.clone()),
            ValueRef::Var { name, ty } => self.read_var(name, ty),
            ValueRef::Block(block) => self.invoke_block(block, None),
        }
    }

    pub fn int(&mut self, index: usize) -> anyhow::Result<i64> {
        let v = self.value(index)?;
        v.as_int()
            .ok_or_else(|| anyhow!("expected an int, got {}", v.value_type()))
    }

    pub fn float(&mut self, index: usize) -> anyhow::Result<f64> {
        let v = self.value(index)?;
        v.as_float()
            .ok_or_else(|| anyhow!("expected a float, got {}", v.value_type()))
    }

    pub fn string(&mut self, index: usize) -> anyhow::Result<String> {
        match self.value(index)? {
            Value::String(s) => Ok(s),
            other => bail!("expected a string, got {}", other.value_type()),
        }
    }

    /// Name of a `$variable` argument
    pub fn var_name(&self, index: usize) -> anyhow::Result<&'a str> {
        match self.arg(index)? {
            ParsedArg::Var(name) => Ok(name),
            _ => bail!("argument {} is not a variable", index),
        }
    }

    /// Read a variable and check it against `expected`
    pub fn read_var(&self, name: &str, expected: &ValueType) -> anyhow::Result<Value> {
        let value = self
            .ctx
            .read_var(name)
            .ok_or_else(|| ConError::new(ErrorKind::UndefinedVariable { name: name.to_string() }))?;
        let found = value.value_type();
        if !found.is_assignable_to(expected) {
            return Err(ConError::new(ErrorKind::BadVarType {
                name: name.to_string(),
                expected: expected.clone(),
                found,
            })
            .into());
        }
        Ok(value.clone())
    }

    pub fn write_var(&mut self, name: &str, value: Value) {
        self.ctx.write_var(name, value);
    }

    pub fn write_line(&mut self, line: &str) {
        self.ctx.write_line(line);
    }

    /// Run a block argument with `input` piped in
    pub fn run_block(&mut self, index: usize, input: Option<Value>) -> anyhow::Result<Value> {
        let ParsedArg::Block(block) = self.arg(index)? else {
            bail!("argument {} is not a block", index);
        };
        self.invoke_block(block, input)
    }

    fn invoke_block(&mut self, block: &Block, input: Option<Value>) -> anyhow::Result<Value> {
        block
            .invoke(input, &mut *self.ctx)
            .ok_or_else(|| anyhow::Error::new(Reported))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_context_permissions_bump_epoch() {
        let mut ctx = LocalContext::new();
        assert!(ctx.check_invoke_permission("i"));
        ctx.deny("i");
        ctx.deny("i");
        assert_eq!(ctx.permission_epoch(), 1);
        assert!(!ctx.check_invoke_permission("i"));
        ctx.allow("i");
        assert_eq!(ctx.permission_epoch(), 2);
        assert!(ctx.check_invoke_permission("i"));
    }

    #[test]
    fn test_local_context_variables() {
        let mut ctx = LocalContext::new();
        ctx.write_var("x", Value::Int(2));
        ctx.write_var("s", Value::from("a"));
        assert_eq!(ctx.read_var("x"), Some(&Value::Int(2)));
        assert_eq!(
            ctx.variables(),
            vec![
                ("s".to_string(), ValueType::String),
                ("x".to_string(), ValueType::Int)
            ]
        );
    }

    #[test]
    fn test_read_var_type_mismatch() {
        let bundle = ArgumentBundle::default();
        let mut ctx = LocalContext::new();
        ctx.write_var("x", Value::from("two"));
        let inv = Invocation::new(Value::Void, &bundle, &mut ctx);

        let err = inv.read_var("x", &ValueType::Int).unwrap_err();
        let con = err.downcast_ref::<ConError>().unwrap();
        assert!(matches!(con.kind, ErrorKind::BadVarType { .. }));

        let err = inv.read_var("nope", &ValueType::Int).unwrap_err();
        let con = err.downcast_ref::<ConError>().unwrap();
        assert!(matches!(con.kind, ErrorKind::UndefinedVariable { .. }));
    }
}
