//! Scope Graph data structure for name binding
//!
//! The scope graph tracks:
//! - Frame hierarchy (child → parent)
//! - The symbols each frame binds, and the pattern node that bound them
//!
//! Frames live for one construct build; ids are arena indexes.

use crate::node_id::NodeId;
use crate::source::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a scope frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

impl ScopeId {
    /// The root module frame every graph starts with
    pub fn root() -> Self {
        Self(0)
    }
}

/// The kind of scope frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Module level
    Module,
    /// Named function definition
    Function,
    /// One clause of a function, closure or case
    Clause,
    /// Anonymous function or shorthand closure
    Closure,
    /// `for` comprehension
    Comprehension,
    /// Branch of `if`/`cond`/`with`
    Block,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Module => "module",
            ScopeKind::Function => "function",
            ScopeKind::Clause => "clause",
            ScopeKind::Closure => "closure",
            ScopeKind::Comprehension => "comprehension",
            ScopeKind::Block => "block",
        }
    }
}

/// A symbol introduced by a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    /// Pattern node that introduced the symbol; `None` for seeded frames
    pub node: Option<NodeId>,
    pub position: Option<Position>,
}

impl Binding {
    pub fn new(name: impl Into<String>, node: Option<NodeId>, position: Option<Position>) -> Self {
        Self {
            name: name.into(),
            node,
            position,
        }
    }
}

/// One frame: its kind, its enclosing frame and the symbols it introduces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeFrame {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub bindings: BTreeMap<String, Binding>,
}

/// Arena of scope frames for one construct
#[derive(Debug, Clone)]
pub struct ScopeGraph {
    frames: Vec<ScopeFrame>,
}

impl Default for ScopeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeGraph {
    /// Create a new scope graph with a root module frame
    pub fn new() -> Self {
        Self {
            frames: vec![ScopeFrame {
                id: ScopeId::root(),
                kind: ScopeKind::Module,
                parent: None,
                bindings: BTreeMap::new(),
            }],
        }
    }

    /// Create a new child frame
    pub fn add_scope(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.frames.len() as u32);
        self.frames.push(ScopeFrame {
            id,
            kind,
            parent: Some(parent),
            bindings: BTreeMap::new(),
        });
        id
    }

    /// Record a binding in a frame. Returns false if the frame already bound
    /// the name (the newer binding wins).
    pub fn bind(&mut self, scope: ScopeId, binding: Binding) -> bool {
        match self.frames.get_mut(scope.0 as usize) {
            Some(frame) => frame.bindings.insert(binding.name.clone(), binding).is_none(),
            None => false,
        }
    }

    pub fn frame(&self, scope: ScopeId) -> Option<&ScopeFrame> {
        self.frames.get(scope.0 as usize)
    }

    /// Get the parent of a frame
    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.frame(scope).and_then(|f| f.parent)
    }

    /// Get the kind of a frame
    pub fn kind(&self, scope: ScopeId) -> Option<ScopeKind> {
        self.frame(scope).map(|f| f.kind)
    }

    /// Look up a binding in a frame (not walking parents)
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<&Binding> {
        self.frame(scope).and_then(|f| f.bindings.get(name))
    }

    /// Look up a binding walking up the frame chain
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &Binding)> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if let Some(binding) = self.lookup_local(s, name) {
                return Some((s, binding));
            }
            current = self.parent(s);
        }
        None
    }

    /// Whether `scope` is `ancestor` or nested inside it
    pub fn is_within(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(s) = current {
            if s == ancestor {
                return true;
            }
            current = self.parent(s);
        }
        false
    }

    /// Get frame chain from a frame up to root, innermost first
    pub fn scope_chain(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![scope];
        let mut current = scope;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
