//! Input contexts: named, hierarchical sets of live key functions
//!
//! A binding can only fire when its function exists in the active context or
//! one of its ancestors. The container only tracks membership; the input
//! manager decides what to do when the active context changes.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::binding::BoundKeyFunction;

/// Name of the root context every engine setup starts with
pub const COMMON_CONTEXT: &str = "common";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("input context '{0}' already exists")]
    AlreadyExists(String),
    #[error("input context '{0}' does not exist")]
    Unknown(String),
    #[error("cannot remove input context '{0}' while it is active or has children")]
    InUse(String),
}

/// A single named set of functions with an optional parent
#[derive(Debug, Clone, Default)]
pub struct InputContext {
    name: String,
    parent: Option<String>,
    functions: HashSet<BoundKeyFunction>,
}

impl InputContext {
    /// The context's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the context this one inherits from
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Allow a function in this context
    pub fn add_function(&mut self, function: impl Into<BoundKeyFunction>) {
        self.functions.insert(function.into());
    }

    /// Disallow a function; returns whether it was declared here
    pub fn remove_function(&mut self, function: &BoundKeyFunction) -> bool {
        self.functions.remove(function)
    }

    /// Whether this context itself (ignoring parents) declares the function
    pub fn function_exists(&self, function: &BoundKeyFunction) -> bool {
        self.functions.contains(function)
    }

    /// Functions declared on this context only
    pub fn functions(&self) -> impl Iterator<Item = &BoundKeyFunction> {
        self.functions.iter()
    }
}

/// Emitted when the active context changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextChanged {
    pub old: Option<String>,
    pub new: String,
}

/// Owns all contexts and tracks which one is active
#[derive(Debug, Clone, Default)]
pub struct InputContextContainer {
    contexts: HashMap<String, InputContext>,
    active: Option<String>,
}

impl InputContextContainer {
    /// A container with no contexts and none active
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context, optionally inheriting from an existing parent
    pub fn create(
        &mut self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<&mut InputContext, ContextError> {
        if self.contexts.contains_key(name) {
            return Err(ContextError::AlreadyExists(name.to_string()));
        }
        if let Some(parent) = parent {
            if !self.contexts.contains_key(parent) {
                return Err(ContextError::Unknown(parent.to_string()));
            }
        }

        let context = InputContext {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            functions: HashSet::new(),
        };
        Ok(self.contexts.entry(name.to_string()).or_insert(context))
    }

    /// Whether a context with this name exists
    pub fn exists(&self, name: &str) -> bool {
        self.contexts.contains_key(name)
    }

    /// Look up a context by name
    pub fn get(&self, name: &str) -> Option<&InputContext> {
        self.contexts.get(name)
    }

    /// Mutable lookup by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut InputContext> {
        self.contexts.get_mut(name)
    }

    /// Remove a context that is neither active nor a parent of another one
    pub fn remove(&mut self, name: &str) -> Result<InputContext, ContextError> {
        if !self.contexts.contains_key(name) {
            return Err(ContextError::Unknown(name.to_string()));
        }
        let has_children = self
            .contexts
            .values()
            .any(|ctx| ctx.parent.as_deref() == Some(name));
        if has_children || self.active.as_deref() == Some(name) {
            return Err(ContextError::InUse(name.to_string()));
        }
        self.contexts
            .remove(name)
            .ok_or_else(|| ContextError::Unknown(name.to_string()))
    }

    /// Name of the active context
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The active context
    pub fn active(&self) -> Option<&InputContext> {
        self.active.as_deref().and_then(|name| self.contexts.get(name))
    }

    /// Switch the active context
    ///
    /// Returns `None` when the context was already active.
    pub fn set_active(&mut self, name: &str) -> Result<Option<ContextChanged>, ContextError> {
        if !self.contexts.contains_key(name) {
            return Err(ContextError::Unknown(name.to_string()));
        }
        if self.active.as_deref() == Some(name) {
            return Ok(None);
        }

        let old = self.active.replace(name.to_string());
        tracing::debug!(old = ?old, new = name, "input context changed");
        Ok(Some(ContextChanged {
            old,
            new: name.to_string(),
        }))
    }

    /// Walk from `name` up through its parents
    pub fn ancestry<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a InputContext> + 'a {
        let mut next = self.contexts.get(name);
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent.as_deref().and_then(|p| self.contexts.get(p));
            Some(current)
        })
    }

    /// Whether the function exists in the named context or any ancestor
    pub fn function_exists_hierarchy(&self, name: &str, function: &BoundKeyFunction) -> bool {
        self.ancestry(name).any(|ctx| ctx.function_exists(function))
    }

    /// Whether the function is live in the active context
    pub fn active_has_function(&self, function: &BoundKeyFunction) -> bool {
        self.active
            .as_deref()
            .is_some_and(|name| self.function_exists_hierarchy(name, function))
    }

    /// All functions visible from the named context, parents included
    pub fn hierarchy_functions(&self, name: &str) -> HashSet<BoundKeyFunction> {
        self.ancestry(name)
            .flat_map(|ctx| ctx.functions.iter().cloned())
            .collect()
    }

    /// Names of every context, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.contexts.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> InputContextContainer {
        let mut contexts = InputContextContainer::new();
        contexts
            .create(COMMON_CONTEXT, None)
            .unwrap()
            .add_function("Escape");
        contexts
            .create("editor", Some(COMMON_CONTEXT))
            .unwrap()
            .add_function("Place");
        contexts
            .create("text", Some(COMMON_CONTEXT))
            .unwrap()
            .add_function("TextSubmit");
        contexts
    }

    #[test]
    fn test_hierarchy_lookup() {
        let contexts = container();
        assert!(contexts.function_exists_hierarchy("editor", &"Escape".into()));
        assert!(contexts.function_exists_hierarchy("editor", &"Place".into()));
        assert!(!contexts.function_exists_hierarchy("editor", &"TextSubmit".into()));
        assert!(!contexts
            .get("editor")
            .unwrap()
            .function_exists(&"Escape".into()));
    }

    #[test]
    fn test_create_requires_existing_parent() {
        let mut contexts = container();
        assert_eq!(
            contexts.create("orphan", Some("missing")).err(),
            Some(ContextError::Unknown("missing".to_string()))
        );
        assert!(matches!(
            contexts.create("editor", None),
            Err(ContextError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_set_active_reports_change() {
        let mut contexts = container();
        let change = contexts.set_active("editor").unwrap().unwrap();
        assert_eq!(change.old, None);
        assert_eq!(change.new, "editor");

        assert_eq!(contexts.set_active("editor").unwrap(), None);

        let change = contexts.set_active("text").unwrap().unwrap();
        assert_eq!(change.old.as_deref(), Some("editor"));
        assert!(contexts.set_active("nope").is_err());
    }

    #[test]
    fn test_remove_guards() {
        let mut contexts = container();
        contexts.set_active("editor").unwrap();
        assert!(matches!(
            contexts.remove(COMMON_CONTEXT),
            Err(ContextError::InUse(_))
        ));
        assert!(matches!(contexts.remove("editor"), Err(ContextError::InUse(_))));
        assert!(contexts.remove("text").is_ok());
        assert!(!contexts.exists("text"));
    }

    #[test]
    fn test_hierarchy_functions() {
        let contexts = container();
        let functions = contexts.hierarchy_functions("editor");
        assert_eq!(functions.len(), 2);
        assert!(functions.contains(&"Escape".into()));
    }
}
