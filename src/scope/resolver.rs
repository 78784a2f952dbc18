//! Capture Resolver - maps captured symbols to the frames that supply them
//!
//! Resolution algorithm:
//! 1. Start at the frame enclosing the closure
//! 2. Walk outward, innermost first, one frame per step
//! 3. The first frame whose own bindings include the name supplies it
//! 4. No frame binds it → unmapped (the symbol comes from a context this
//!    build cannot see)
//!
//! The walk is bounded by the build's depth ceiling.

use super::graph::{ScopeGraph, ScopeId, ScopeKind};
use crate::node_id::NodeId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Where a captured symbol comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMapping {
    pub scope: ScopeId,
    pub kind: ScopeKind,
    /// Frames walked outward from the closure's enclosing frame (0 = that frame)
    pub distance: usize,
    /// Pattern node that bound the symbol, if it was built in this graph
    pub binding: Option<NodeId>,
}

/// One entry of an enclosing frame chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub scope: ScopeId,
    pub kind: ScopeKind,
    /// Symbols the frame binds, sorted
    pub symbols: Vec<String>,
}

/// Bounded outward walk over a scope graph
pub struct CaptureResolver<'a> {
    scope_graph: &'a ScopeGraph,
    max_depth: usize,
}

impl<'a> CaptureResolver<'a> {
    /// Create a new resolver
    pub fn new(scope_graph: &'a ScopeGraph, max_depth: usize) -> Self {
        Self {
            scope_graph,
            max_depth,
        }
    }

    /// Frame chain from `from` outward, innermost first
    pub fn chain(&self, from: ScopeId, at: &NodeId) -> Result<Vec<FrameSummary>> {
        let mut chain = Vec::new();
        let mut current = Some(from);
        while let Some(scope) = current {
            self.check_distance(chain.len(), at)?;
            let Some(frame) = self.scope_graph.frame(scope) else {
                break;
            };
            chain.push(FrameSummary {
                scope,
                kind: frame.kind,
                symbols: frame.bindings.keys().cloned().collect(),
            });
            current = frame.parent;
        }
        Ok(chain)
    }

    /// Nearest frame from `from` outward that binds `name`
    pub fn resolve(&self, from: ScopeId, name: &str, at: &NodeId) -> Result<Option<FrameMapping>> {
        let mut distance = 0;
        let mut current = Some(from);
        while let Some(scope) = current {
            self.check_distance(distance, at)?;
            let Some(frame) = self.scope_graph.frame(scope) else {
                break;
            };
            if let Some(binding) = frame.bindings.get(name) {
                tracing::trace!("Resolved capture {} at {} to {:?} frame", name, at, frame.kind);
                return Ok(Some(FrameMapping {
                    scope,
                    kind: frame.kind,
                    distance,
                    binding: binding.node.clone(),
                }));
            }
            distance += 1;
            current = frame.parent;
        }
        tracing::trace!("Capture {} at {} left unmapped", name, at);
        Ok(None)
    }

    fn check_distance(&self, distance: usize, at: &NodeId) -> Result<()> {
        if distance >= self.max_depth {
            return Err(Error::DepthExceeded {
                at: at.clone(),
                limit: self.max_depth,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::graph::Binding;

    fn nested(levels: usize) -> (ScopeGraph, ScopeId) {
        let mut graph = ScopeGraph::new();
        let mut scope = ScopeId::root();
        for _ in 0..levels {
            scope = graph.add_scope(scope, ScopeKind::Closure);
        }
        (graph, scope)
    }

    #[test]
    fn test_resolve_nearest_frame() {
        let mut graph = ScopeGraph::new();
        let fun = graph.add_scope(ScopeId::root(), ScopeKind::Function);
        let clause = graph.add_scope(fun, ScopeKind::Clause);
        let pattern = NodeId::root("expr", 0).child("left");

        graph.bind(ScopeId::root(), Binding::new("x", None, None));
        graph.bind(fun, Binding::new("x", Some(pattern.clone()), None));

        let resolver = CaptureResolver::new(&graph, 16);
        let at = NodeId::root("expr", 1);
        let mapping = resolver.resolve(clause, "x", &at).unwrap().unwrap();
        assert_eq!(mapping.scope, fun);
        assert_eq!(mapping.kind, ScopeKind::Function);
        assert_eq!(mapping.distance, 1);
        assert_eq!(mapping.binding, Some(pattern));
    }

    #[test]
    fn test_unseen_symbol_stays_unmapped() {
        let (graph, inner) = nested(3);
        let resolver = CaptureResolver::new(&graph, 16);
        let at = NodeId::root("expr", 0);
        assert_eq!(resolver.resolve(inner, "elsewhere", &at).unwrap(), None);
    }

    #[test]
    fn test_chain_is_innermost_first() {
        let (graph, inner) = nested(2);
        let resolver = CaptureResolver::new(&graph, 16);
        let chain = resolver.chain(inner, &NodeId::root("expr", 0)).unwrap();
        let kinds: Vec<ScopeKind> = chain.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![ScopeKind::Closure, ScopeKind::Closure, ScopeKind::Module]);
    }

    #[test]
    fn test_walk_is_bounded() {
        let (graph, inner) = nested(5);
        let at = NodeId::root("expr", 0);

        // Six frames in the chain
        assert!(CaptureResolver::new(&graph, 6).chain(inner, &at).is_ok());
        let err = CaptureResolver::new(&graph, 5).chain(inner, &at).unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { limit: 5, .. }));

        let err = CaptureResolver::new(&graph, 2)
            .resolve(inner, "missing", &at)
            .unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { .. }));
    }
}
