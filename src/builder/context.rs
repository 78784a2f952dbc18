//! Build context threaded through every recursive builder call
//!
//! One context per construct: it owns the accumulating node list, the scope
//! frames and the closures currently being built. Depth is not stored here;
//! every builder takes it as an explicit argument and checks it with
//! [`BuildContext::guard`].

use super::Diagnostic;
use crate::closure::{ClosureReport, ClosureTracker};
use crate::node::{AuxTag, GraphNode, NodeType};
use crate::node_id::NodeId;
use crate::relation::RelationKind;
use crate::scope::{Binding, ScopeGraph, ScopeId, ScopeKind};
use crate::source::Position;
use crate::{BuildConfig, Error, ErrorKind, Result};
use std::collections::BTreeSet;

pub(crate) struct BuildContext<'c> {
    pub config: &'c BuildConfig,
    pub scopes: ScopeGraph,
    /// Frame new bindings go into
    pub current: ScopeId,
    nodes: Vec<GraphNode>,
    diagnostics: Vec<Diagnostic>,
    reports: Vec<ClosureReport>,
    /// Closures being built, innermost last, with their enclosing frame
    closures: Vec<(ClosureTracker, ScopeId)>,
    /// Names read while each open log was active (match right-hand sides)
    read_logs: Vec<BTreeSet<String>>,
    /// Highest `&N` seen per open shorthand closure
    placeholders: Vec<i64>,
}

impl<'c> BuildContext<'c> {
    pub fn new(config: &'c BuildConfig, scopes: ScopeGraph, current: ScopeId) -> Self {
        Self {
            config,
            scopes,
            current,
            nodes: Vec::new(),
            diagnostics: Vec::new(),
            reports: Vec::new(),
            closures: Vec::new(),
            read_logs: Vec::new(),
            placeholders: Vec::new(),
        }
    }

    /// Fail once a recursive call goes past the depth ceiling
    pub fn guard(&self, at: &NodeId, depth: usize) -> Result<()> {
        if depth > self.config.max_depth {
            return Err(Error::DepthExceeded {
                at: at.clone(),
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }

    /// Fail when one compound node has too many direct children
    pub fn check_fanout(&self, at: &NodeId, what: &'static str, count: usize) -> Result<()> {
        if count > self.config.max_fanout {
            return Err(Error::SizeExceeded {
                at: at.clone(),
                what,
                actual: count,
                limit: self.config.max_fanout,
            });
        }
        Ok(())
    }

    pub fn emit(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    /// Emit a placeholder for a shape no builder recognizes. Its children
    /// are not traversed.
    pub fn unknown(&mut self, id: &NodeId, tag: &str, position: Option<Position>) {
        tracing::debug!("Unrecognized node shape {:?} at {}", tag, id);
        self.emit(
            GraphNode::new(id.clone(), NodeType::UnknownExpression)
                .with_tags(&[AuxTag::Expression])
                .with_property("original_tag", tag)
                .with_position(position),
        );
        self.diagnostics.push(Diagnostic {
            at: id.clone(),
            kind: ErrorKind::UnrecognizedNodeShape,
            tag: tag.to_string(),
            position,
        });
    }

    /// Run `f` inside a fresh child frame
    pub fn in_scope<T>(
        &mut self,
        kind: ScopeKind,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = self.current;
        self.current = self.scopes.add_scope(previous, kind);
        let result = f(self);
        self.current = previous;
        result
    }

    /// Record a variable read and attribute it to every open closure it
    /// escapes from
    pub fn read(&mut self, name: &str, reference: &NodeId, position: Option<Position>) {
        for log in &mut self.read_logs {
            log.insert(name.to_string());
        }

        let scopes = &self.scopes;
        let defined = scopes.lookup(self.current, name).map(|(scope, _)| scope);
        for (tracker, _) in &mut self.closures {
            if defined.is_none_or(|scope| !scopes.is_within(scope, tracker.scope)) {
                tracker.record_read(name, reference, position);
            }
        }
    }

    /// Run `f` and return the names it read
    pub fn track_reads<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<(T, BTreeSet<String>)> {
        self.read_logs.push(BTreeSet::new());
        let result = f(self);
        let reads = self.read_logs.pop().unwrap_or_default();
        result.map(|value| (value, reads))
    }

    /// Bring pattern bindings into the current frame.
    ///
    /// `rhs_reads` holds the names read by the value being matched, when
    /// there is one. Inside a closure body, a match that binds a name
    /// defined outside the closure captures that name: a rebind when the
    /// value read it, otherwise a shadow. Parameter and clause heads pass
    /// `None` and never capture.
    pub fn bind_all(&mut self, bindings: Vec<Binding>, rhs_reads: Option<&BTreeSet<String>>) {
        for binding in bindings {
            let scopes = &self.scopes;
            let outer = scopes.lookup(self.current, &binding.name).map(|(scope, _)| scope);
            for (tracker, _) in &mut self.closures {
                let Some(reads) = rhs_reads else {
                    continue;
                };
                let defined_outside =
                    outer.is_some_and(|scope| !scopes.is_within(scope, tracker.scope));
                if defined_outside || (outer.is_none() && tracker.captures(&binding.name)) {
                    tracker.record_rebinding(&binding.name, reads.contains(&binding.name));
                }
            }
            self.scopes.bind(self.current, binding);
        }
    }

    /// Open a closure frame and start tracking its captures
    pub fn begin_closure(&mut self, closure: &NodeId) -> ScopeId {
        let enclosing = self.current;
        self.current = self.scopes.add_scope(enclosing, ScopeKind::Closure);
        self.closures
            .push((ClosureTracker::new(closure.clone(), self.current), enclosing));
        enclosing
    }

    /// Record parameter names of the innermost open closure
    pub fn closure_bound<'n>(&mut self, names: impl IntoIterator<Item = &'n str>) {
        if let Some((tracker, _)) = self.closures.last_mut() {
            tracker.add_bound(names);
        }
    }

    /// Close the innermost closure and resolve its captures. The closure
    /// node gets a `captures` relation to one `CapturedVariable` per symbol.
    pub fn end_closure(&mut self, closure_node: &mut GraphNode) -> Result<()> {
        let Some((tracker, enclosing)) = self.closures.pop() else {
            return Ok(());
        };
        self.current = enclosing;

        let report = tracker.finish(&self.scopes, enclosing, self.config)?;
        closure_node.declare_relation(RelationKind::Captures);
        for captured in report.capture_nodes() {
            closure_node.relate(RelationKind::Captures, captured.id.clone());
            self.emit(captured);
        }
        self.reports.push(report);
        Ok(())
    }

    pub fn begin_placeholders(&mut self) {
        self.placeholders.push(0);
    }

    /// Note a `&N` inside the innermost shorthand closure. False when no
    /// shorthand closure is open.
    pub fn saw_placeholder(&mut self, index: i64) -> bool {
        match self.placeholders.last_mut() {
            Some(max) => {
                *max = (*max).max(index);
                true
            }
            None => false,
        }
    }

    /// Highest placeholder index of the closing shorthand closure
    pub fn end_placeholders(&mut self) -> i64 {
        self.placeholders.pop().unwrap_or(0)
    }

    pub fn into_parts(self) -> (Vec<GraphNode>, Vec<Diagnostic>, Vec<ClosureReport>) {
        (self.nodes, self.diagnostics, self.reports)
    }
}
