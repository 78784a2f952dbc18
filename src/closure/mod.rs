//! Closure analysis - free variables, supplying frames and capture mutation
//!
//! While a closure body is built, every variable read that resolves outside
//! the closure's own frame (or resolves nowhere) is recorded against it, as
//! is every binding site in the body that rebinds such a captured name.
//! When the closure is finished the records are resolved against the
//! enclosing frame chain and classified.

use crate::node::{AuxTag, GraphNode, NodeType};
use crate::node_id::NodeId;
use crate::relation::RelationKind;
use crate::scope::resolver::{CaptureResolver, FrameMapping, FrameSummary};
use crate::scope::{ScopeGraph, ScopeId};
use crate::source::Position;
use crate::{BuildConfig, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How a closure body re-uses a captured name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationClass {
    /// Rebound to a value that does not read the captured one
    Shadow,
    /// Rebound to a value computed from the captured one
    Rebind,
    /// Never rebound
    Immutable,
}

impl MutationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationClass::Shadow => "shadow",
            MutationClass::Rebind => "rebind",
            MutationClass::Immutable => "immutable",
        }
    }

    /// Classify from the rebinding sites of one name; each entry records
    /// whether that site's right-hand side read the captured value
    pub fn classify(rebinds: &[bool]) -> Self {
        if rebinds.iter().any(|reads_self| *reads_self) {
            MutationClass::Rebind
        } else if !rebinds.is_empty() {
            MutationClass::Shadow
        } else {
            MutationClass::Immutable
        }
    }
}

impl std::fmt::Display for MutationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One captured symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeVariableRecord {
    pub name: String,
    pub reference_count: usize,
    /// Source positions of the reads that carried one
    pub positions: Vec<Position>,
    /// Variable nodes that read the symbol
    pub references: Vec<NodeId>,
    /// Supplying frame; `None` when no visible frame binds the symbol
    pub frame: Option<FrameMapping>,
    pub mutation: MutationClass,
}

/// Result of analyzing one closure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureReport {
    pub closure: NodeId,
    /// Symbols bound by the closure's parameters, sorted
    pub bound: Vec<String>,
    /// Captured symbols, sorted by name
    pub captures: Vec<FreeVariableRecord>,
    /// Enclosing frames, innermost first
    pub scope_chain: Vec<FrameSummary>,
}

impl ClosureReport {
    /// Report for a construct that is not a closure
    pub fn empty(closure: NodeId) -> Self {
        Self {
            closure,
            bound: Vec::new(),
            captures: Vec::new(),
            scope_chain: Vec::new(),
        }
    }

    pub fn capture(&self, name: &str) -> Option<&FreeVariableRecord> {
        self.captures.iter().find(|c| c.name == name)
    }

    /// Captured names in order
    pub fn free_names(&self) -> Vec<&str> {
        self.captures.iter().map(|c| c.name.as_str()).collect()
    }

    /// `CapturedVariable` nodes for this report, addressed below the closure
    pub fn capture_nodes(&self) -> Vec<GraphNode> {
        self.captures
            .iter()
            .enumerate()
            .map(|(i, capture)| {
                let mut node = GraphNode::new(
                    self.closure.indexed(RelationKind::Captures.label(), i),
                    NodeType::CapturedVariable,
                )
                .with_tags(&[AuxTag::Closure])
                .with_property("name", capture.name.as_str())
                .with_property("mutation", capture.mutation.as_str())
                .with_property("reference_count", capture.reference_count)
                .with_property("mapped", capture.frame.is_some());

                if let Some(frame) = &capture.frame {
                    node.set_property("frame_kind", frame.kind.as_str());
                    node.set_property("frame_distance", frame.distance);
                    if let Some(binding) = &frame.binding {
                        node.relate(RelationKind::BoundBy, binding.clone());
                    }
                }
                for reference in &capture.references {
                    node.relate(RelationKind::Reference, reference.clone());
                }
                node
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct FreeUse {
    positions: Vec<Position>,
    references: Vec<NodeId>,
    rebinds: Vec<bool>,
}

/// Accumulates reads and rebindings for one closure while its body is built
#[derive(Debug)]
pub(crate) struct ClosureTracker {
    pub closure: NodeId,
    /// The closure's own frame; everything nested in it is local
    pub scope: ScopeId,
    bound: BTreeSet<String>,
    free: BTreeMap<String, FreeUse>,
}

impl ClosureTracker {
    pub fn new(closure: NodeId, scope: ScopeId) -> Self {
        Self {
            closure,
            scope,
            bound: BTreeSet::new(),
            free: BTreeMap::new(),
        }
    }

    /// Record parameter bindings
    pub fn add_bound<'n>(&mut self, names: impl IntoIterator<Item = &'n str>) {
        self.bound.extend(names.into_iter().map(str::to_string));
    }

    /// A read of `name` that does not resolve inside the closure
    pub fn record_read(&mut self, name: &str, reference: &NodeId, position: Option<Position>) {
        let usage = self.free.entry(name.to_string()).or_default();
        usage.references.push(reference.clone());
        usage.positions.extend(position);
    }

    pub fn captures(&self, name: &str) -> bool {
        self.free.contains_key(name)
    }

    /// A binding site in the body that rebinds a name from outside the
    /// closure. The name is captured even when the old value is never read.
    pub fn record_rebinding(&mut self, name: &str, reads_self: bool) {
        self.free
            .entry(name.to_string())
            .or_default()
            .rebinds
            .push(reads_self);
    }

    /// Resolve captures against the frames enclosing the closure
    pub fn finish(
        self,
        scopes: &ScopeGraph,
        enclosing: ScopeId,
        config: &BuildConfig,
    ) -> Result<ClosureReport> {
        if self.free.len() > config.max_captures {
            return Err(Error::SizeExceeded {
                at: self.closure,
                what: "captured variable",
                actual: self.free.len(),
                limit: config.max_captures,
            });
        }

        let resolver = CaptureResolver::new(scopes, config.max_depth);
        let scope_chain = resolver.chain(enclosing, &self.closure)?;

        let mut captures = Vec::with_capacity(self.free.len());
        for (name, usage) in self.free {
            let frame = resolver.resolve(enclosing, &name, &self.closure)?;
            captures.push(FreeVariableRecord {
                mutation: MutationClass::classify(&usage.rebinds),
                reference_count: usage.references.len(),
                positions: usage.positions,
                references: usage.references,
                frame,
                name,
            });
        }

        Ok(ClosureReport {
            closure: self.closure,
            bound: self.bound.into_iter().collect(),
            captures,
            scope_chain,
        })
    }
}
