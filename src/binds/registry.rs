//! Ordering of command handlers across independently registered owners
//!
//! Several owners can bind the same key function. Each bind may say it wants
//! to run before or after the binds of other owners; per function those
//! constraints form a graph that is sorted once and cached until the next
//! register or unregister.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::handler::InputCmdHandler;
use crate::input::BoundKeyFunction;

/// Identifies the system or component that registered a group of binds
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(String);

impl OwnerId {
    /// Owner id with an explicit name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Owner id derived from a type name
    pub fn of<T: ?Sized>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    /// The owner's name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindsError {
    #[error("owner '{0}' already has command binds registered")]
    OwnerAlreadyRegistered(OwnerId),
    #[error("command binds for '{function}' form a cycle between {}", join_owners(.owners))]
    Cycle {
        function: BoundKeyFunction,
        owners: Vec<OwnerId>,
    },
}

fn join_owners(owners: &[OwnerId]) -> String {
    owners
        .iter()
        .map(OwnerId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One handler bound to one function, with ordering constraints
#[derive(Clone)]
pub struct CommandBind {
    pub function: BoundKeyFunction,
    pub handler: Arc<dyn InputCmdHandler>,
    /// Owners whose binds for the same function must run after this one
    pub before: Vec<OwnerId>,
    /// Owners whose binds for the same function must run before this one
    pub after: Vec<OwnerId>,
}

impl CommandBind {
    /// Unordered bind of `handler` to `function`
    pub fn new(function: impl Into<BoundKeyFunction>, handler: Arc<dyn InputCmdHandler>) -> Self {
        Self {
            function: function.into(),
            handler,
            before: Vec::new(),
            after: Vec::new(),
        }
    }
}

impl fmt::Debug for CommandBind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBind")
            .field("function", &self.function)
            .field("before", &self.before)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}

/// A group of binds registered and unregistered together
#[derive(Clone, Debug, Default)]
pub struct CommandBinds {
    binds: Vec<CommandBind>,
}

impl CommandBinds {
    /// Start collecting binds for one owner
    pub fn builder() -> CommandBindsBuilder {
        CommandBindsBuilder::default()
    }

    /// Binds in the order they were added
    pub fn iter(&self) -> std::slice::Iter<'_, CommandBind> {
        self.binds.iter()
    }

    /// Number of binds in the group
    pub fn len(&self) -> usize {
        self.binds.len()
    }

    /// Whether the group holds no binds
    pub fn is_empty(&self) -> bool {
        self.binds.is_empty()
    }
}

#[derive(Default)]
pub struct CommandBindsBuilder {
    binds: Vec<CommandBind>,
}

impl CommandBindsBuilder {
    /// Bind a handler with no ordering constraints
    pub fn bind(
        mut self,
        function: impl Into<BoundKeyFunction>,
        handler: impl InputCmdHandler + 'static,
    ) -> Self {
        self.binds.push(CommandBind::new(function, Arc::new(handler)));
        self
    }

    /// Bind a handler that must run before the given owners' handlers
    pub fn bind_before(
        mut self,
        function: impl Into<BoundKeyFunction>,
        handler: impl InputCmdHandler + 'static,
        owners: impl IntoIterator<Item = OwnerId>,
    ) -> Self {
        let mut bind = CommandBind::new(function, Arc::new(handler));
        bind.before.extend(owners);
        self.binds.push(bind);
        self
    }

    /// Bind a handler that must run after the given owners' handlers
    pub fn bind_after(
        mut self,
        function: impl Into<BoundKeyFunction>,
        handler: impl InputCmdHandler + 'static,
        owners: impl IntoIterator<Item = OwnerId>,
    ) -> Self {
        let mut bind = CommandBind::new(function, Arc::new(handler));
        bind.after.extend(owners);
        self.binds.push(bind);
        self
    }

    /// Add a prepared bind, keeping its constraints
    pub fn bind_with(mut self, bind: CommandBind) -> Self {
        self.binds.push(bind);
        self
    }

    /// Finish the group
    pub fn build(self) -> CommandBinds {
        CommandBinds { binds: self.binds }
    }
}

struct Registered {
    owner: OwnerId,
    bind: CommandBind,
}

/// All command binds plus the cached per-function firing order
#[derive(Default)]
pub struct CommandBindRegistry {
    registered: Vec<Registered>,
    resolved: HashMap<BoundKeyFunction, Vec<Arc<dyn InputCmdHandler>>>,
    dirty: bool,
}

impl CommandBindRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an owner's binds; each owner may register once until it unregisters
    pub fn register(&mut self, owner: OwnerId, binds: CommandBinds) -> Result<(), BindsError> {
        if self.registered.iter().any(|r| r.owner == owner) {
            return Err(BindsError::OwnerAlreadyRegistered(owner));
        }

        tracing::debug!(owner = %owner, count = binds.len(), "registering command binds");
        self.registered
            .extend(binds.binds.into_iter().map(|bind| Registered {
                owner: owner.clone(),
                bind,
            }));
        self.dirty = true;
        Ok(())
    }

    /// Remove every bind of an owner; returns whether anything was removed
    pub fn unregister(&mut self, owner: &OwnerId) -> bool {
        let before = self.registered.len();
        self.registered.retain(|r| &r.owner != owner);
        let removed = self.registered.len() != before;
        if removed {
            tracing::debug!(owner = %owner, "unregistered command binds");
            self.dirty = true;
        }
        removed
    }

    /// Owners in registration order
    pub fn owners(&self) -> Vec<OwnerId> {
        let mut owners: Vec<OwnerId> = Vec::new();
        for r in &self.registered {
            if !owners.contains(&r.owner) {
                owners.push(r.owner.clone());
            }
        }
        owners
    }

    /// Whether any owner bound a handler to the function
    pub fn has_handlers(&mut self, function: &BoundKeyFunction) -> bool {
        !self.handlers_for(function).is_empty()
    }

    /// Handlers for a function in firing order
    ///
    /// A cyclic function is logged and falls back to registration order.
    pub fn handlers_for(&mut self, function: &BoundKeyFunction) -> &[Arc<dyn InputCmdHandler>] {
        if self.dirty {
            self.rebuild();
        }
        self.resolved
            .get(function)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check every function's graph, returning the first cycle found
    pub fn try_resolve(&mut self) -> Result<(), BindsError> {
        let mut first_error = None;
        for (function, indices) in self.groups() {
            if let Err(err) = self.sort_group(&function, &indices) {
                first_error.get_or_insert(err);
            }
        }
        self.rebuild();
        first_error.map_or(Ok(()), Err)
    }

    /// Indices into `registered`, grouped by function, in registration order
    fn groups(&self) -> Vec<(BoundKeyFunction, Vec<usize>)> {
        let mut groups: Vec<(BoundKeyFunction, Vec<usize>)> = Vec::new();
        for (i, r) in self.registered.iter().enumerate() {
            match groups.iter_mut().find(|(f, _)| f == &r.bind.function) {
                Some((_, indices)) => indices.push(i),
                None => groups.push((r.bind.function.clone(), vec![i])),
            }
        }
        groups
    }

    fn rebuild(&mut self) {
        let mut resolved = HashMap::new();
        for (function, indices) in self.groups() {
            let order = match self.sort_group(&function, &indices) {
                Ok(order) => order,
                Err(err) => {
                    tracing::error!("{err}; falling back to registration order");
                    indices
                }
            };
            let handlers = order
                .into_iter()
                .map(|i| Arc::clone(&self.registered[i].bind.handler))
                .collect();
            resolved.insert(function, handlers);
        }
        self.resolved = resolved;
        self.dirty = false;
    }

    /// Topologically sort one function's binds
    fn sort_group(
        &self,
        function: &BoundKeyFunction,
        indices: &[usize],
    ) -> Result<Vec<usize>, BindsError> {
        let node_count = indices.len();
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); node_count];

        for (node, &index) in indices.iter().enumerate() {
            let bind = &self.registered[index].bind;
            for (other, &other_index) in indices.iter().enumerate() {
                if other == node {
                    continue;
                }
                let other_owner = &self.registered[other_index].owner;
                if bind.after.contains(other_owner) {
                    edges[other].push(node);
                }
                if bind.before.contains(other_owner) {
                    edges[node].push(other);
                }
            }
        }

        match topological_sort(node_count, &edges) {
            Ok(order) => Ok(order.into_iter().map(|n| indices[n]).collect()),
            Err(stuck) => {
                let mut owners: Vec<OwnerId> = Vec::new();
                for n in stuck {
                    let owner = &self.registered[indices[n]].owner;
                    if !owners.contains(owner) {
                        owners.push(owner.clone());
                    }
                }
                Err(BindsError::Cycle {
                    function: function.clone(),
                    owners,
                })
            }
        }
    }
}

impl fmt::Debug for CommandBindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBindRegistry")
            .field("binds", &self.registered.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Kahn's algorithm; ready nodes are taken lowest index first
///
/// On a cycle, returns the nodes that could not be placed.
fn topological_sort(node_count: usize, edges: &[Vec<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let mut in_degree = vec![0usize; node_count];
    for targets in edges {
        for &t in targets {
            in_degree[t] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..node_count).filter(|&n| in_degree[n] == 0).collect();
    let mut order = Vec::with_capacity(node_count);

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &t in &edges[node] {
            in_degree[t] -= 1;
            if in_degree[t] == 0 {
                ready.insert(t);
            }
        }
    }

    if order.len() == node_count {
        Ok(order)
    } else {
        Err((0..node_count).filter(|&n| in_degree[n] > 0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl InputCmdHandler for Recorder {
        fn enabled(&self) {
            self.log.borrow_mut().push(self.name);
        }
    }

    fn recorder(name: &'static str, log: &Rc<RefCell<Vec<&'static str>>>) -> Recorder {
        Recorder {
            name,
            log: Rc::clone(log),
        }
    }

    fn fire(registry: &mut CommandBindRegistry, function: &str) {
        for handler in registry.handlers_for(&function.into()) {
            handler.enabled();
        }
    }

    #[test]
    fn test_before_and_after_ordering() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CommandBindRegistry::new();

        registry
            .register(
                "B".into(),
                CommandBinds::builder()
                    .bind_after("Use", recorder("B", &log), ["A".into()])
                    .build(),
            )
            .unwrap();
        registry
            .register(
                "A".into(),
                CommandBinds::builder().bind("Use", recorder("A", &log)).build(),
            )
            .unwrap();
        registry
            .register(
                "C".into(),
                CommandBinds::builder()
                    .bind_before("Use", recorder("C", &log), ["A".into()])
                    .build(),
            )
            .unwrap();

        fire(&mut registry, "Use");
        assert_eq!(*log.borrow(), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_unconstrained_keeps_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CommandBindRegistry::new();
        for name in ["X", "Y", "Z"] {
            registry
                .register(
                    name.into(),
                    CommandBinds::builder().bind("Use", recorder(name, &log)).build(),
                )
                .unwrap();
        }

        fire(&mut registry, "Use");
        assert_eq!(*log.borrow(), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_cycle_reported_and_falls_back() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CommandBindRegistry::new();
        registry
            .register(
                "A".into(),
                CommandBinds::builder()
                    .bind_after("Use", recorder("A", &log), ["B".into()])
                    .build(),
            )
            .unwrap();
        registry
            .register(
                "B".into(),
                CommandBinds::builder()
                    .bind_after("Use", recorder("B", &log), ["A".into()])
                    .build(),
            )
            .unwrap();

        match registry.try_resolve() {
            Err(BindsError::Cycle { function, owners }) => {
                assert_eq!(function.as_str(), "Use");
                assert_eq!(owners, vec![OwnerId::from("A"), OwnerId::from("B")]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }

        fire(&mut registry, "Use");
        assert_eq!(*log.borrow(), vec!["A", "B"]);
    }

    #[test]
    fn test_register_twice_fails_and_unregister_invalidates() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CommandBindRegistry::new();
        let binds = || CommandBinds::builder().bind("Use", recorder("A", &log)).build();

        registry.register("A".into(), binds()).unwrap();
        assert_eq!(
            registry.register("A".into(), binds()),
            Err(BindsError::OwnerAlreadyRegistered("A".into()))
        );
        assert!(registry.has_handlers(&"Use".into()));

        assert!(registry.unregister(&"A".into()));
        assert!(!registry.unregister(&"A".into()));
        assert!(!registry.has_handlers(&"Use".into()));
        assert!(registry.owners().is_empty());
    }

    #[test]
    fn test_owner_of_type() {
        struct Movement;
        assert!(OwnerId::of::<Movement>().as_str().ends_with("Movement"));
    }
}
