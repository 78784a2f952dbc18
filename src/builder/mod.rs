//! Graph builder - compiles one construct at a time into graph nodes
//!
//! Every public entry point creates a fresh [`BuildContext`], seeds it with
//! any enclosing frames the caller supplied, and runs the recursive builders
//! from depth 1. A hard failure discards everything the construct produced;
//! only [`GraphBuilder::build_batch`] keeps going with the next construct.

mod capture;
mod context;
mod control;
mod expression;
mod function;
mod literal;
mod pattern;

use crate::closure::ClosureReport;
use crate::config::BuildConfig;
use crate::graph::SemanticGraph;
use crate::node::{GraphNode, NodeType};
use crate::node_id::NodeId;
use crate::scope::{Binding, ScopeGraph, ScopeId, ScopeKind};
use crate::source::{Position, SourceNode};
use crate::{Error, ErrorKind, Result};
use context::BuildContext;
use serde::Serialize;
use std::fmt;

/// Soft failure recorded while building
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub at: NodeId,
    pub kind: ErrorKind,
    /// Tag of the source node that was not recognized
    pub tag: String,
    pub position: Option<Position>,
}

/// Everything one construct compiled to
#[derive(Debug, Clone, Serialize)]
pub struct BuiltGraph {
    pub root: NodeId,
    /// Sorted by id
    pub nodes: Vec<GraphNode>,
    pub diagnostics: Vec<Diagnostic>,
    /// One report per closure in the construct, innermost closures first
    pub closures: Vec<ClosureReport>,
}

impl BuiltGraph {
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes
            .binary_search_by(|node| node.id.cmp(id))
            .ok()
            .map(|i| &self.nodes[i])
    }

    /// Capture report of the closure rooted at `id`
    pub fn closure(&self, id: &NodeId) -> Option<&ClosureReport> {
        self.closures.iter().find(|report| &report.closure == id)
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> Vec<&GraphNode> {
        self.nodes.iter().filter(|n| n.node_type == node_type).collect()
    }

    /// Index the nodes for relation queries
    pub fn graph(&self) -> SemanticGraph {
        SemanticGraph::from_nodes(self.nodes.iter().cloned())
    }

    /// Content hash of the node set; equal for two builds of the same input
    pub fn fingerprint(&self) -> Result<String> {
        self.graph().fingerprint()
    }

    /// One JSON object per node, one node per line
    pub fn to_json_lines(&self) -> Result<String> {
        let mut out = String::new();
        for node in &self.nodes {
            out.push_str(&serde_json::to_string(node)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// A decomposed pattern and the symbols it binds, in source order
#[derive(Debug, Clone, Serialize)]
pub struct PatternGraph {
    pub graph: BuiltGraph,
    pub bindings: Vec<Binding>,
}

/// Result of building one construct
pub type BuildResult<T> = std::result::Result<T, ConstructError>;

/// Hard failure of one construct
#[derive(Debug, thiserror::Error)]
#[error("Failed to build {construct}: {source}")]
pub struct ConstructError {
    pub construct: NodeId,
    pub source: Error,
}

impl ConstructError {
    pub fn kind(&self) -> Option<ErrorKind> {
        self.source.kind()
    }
}

/// One unit of work for [`GraphBuilder::build_batch`]
#[derive(Debug, Clone)]
pub enum Construct {
    Expression { root: NodeId, source: SourceNode },
    /// The `def`/`defp` clauses of one function, in source order
    Function { root: NodeId, clauses: Vec<SourceNode> },
    Pattern { root: NodeId, source: SourceNode },
}

impl Construct {
    pub fn root(&self) -> &NodeId {
        match self {
            Construct::Expression { root, .. }
            | Construct::Function { root, .. }
            | Construct::Pattern { root, .. } => root,
        }
    }
}

/// Outcome of a batch build
#[derive(Debug)]
pub struct BatchOutcome {
    pub built: Vec<BuiltGraph>,
    pub failed: Vec<ConstructError>,
}

impl BatchOutcome {
    pub fn total_nodes(&self) -> usize {
        self.built.iter().map(|g| g.nodes.len()).sum()
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch build:")?;
        writeln!(f, "  Built: {} ({} nodes)", self.built.len(), self.total_nodes())?;
        write!(f, "  Failed: {}", self.failed.len())?;
        for err in &self.failed {
            write!(f, "\n    {}", err)?;
        }
        Ok(())
    }
}

pub struct GraphBuilder {
    config: BuildConfig,
    /// Frames enclosing every construct, outermost first
    seeded: Vec<(ScopeKind, Vec<String>)>,
}

impl GraphBuilder {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            config: *config,
            seeded: Vec::new(),
        }
    }

    /// Add a frame around every construct this builder compiles. Frames are
    /// nested in call order, so the last one added is the innermost.
    pub fn with_enclosing_frame(mut self, kind: ScopeKind, names: &[&str]) -> Self {
        self.seeded
            .push((kind, names.iter().map(|n| n.to_string()).collect()));
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    fn context(&self) -> BuildContext<'_> {
        let mut scopes = ScopeGraph::new();
        let mut current = ScopeId::root();
        for (kind, names) in &self.seeded {
            current = scopes.add_scope(current, *kind);
            for name in names {
                scopes.bind(current, Binding::new(name.as_str(), None, None));
            }
        }
        BuildContext::new(&self.config, scopes, current)
    }

    /// Run one construct build in a fresh context
    fn run<T>(
        &self,
        root: &NodeId,
        build: impl FnOnce(&mut BuildContext<'_>) -> Result<T>,
    ) -> BuildResult<(BuiltGraph, T)> {
        tracing::debug!("Building {}", root);
        let mut ctx = self.context();
        match build(&mut ctx) {
            Ok(value) => {
                let (mut nodes, diagnostics, closures) = ctx.into_parts();
                nodes.sort_by(|a, b| a.id.cmp(&b.id));
                tracing::debug!(
                    "Built {}: {} nodes, {} diagnostics, {} closures",
                    root,
                    nodes.len(),
                    diagnostics.len(),
                    closures.len()
                );
                let graph = BuiltGraph {
                    root: root.clone(),
                    nodes,
                    diagnostics,
                    closures,
                };
                Ok((graph, value))
            }
            Err(source) => {
                tracing::warn!("Failed to build {}: {}", root, source);
                Err(ConstructError {
                    construct: root.clone(),
                    source,
                })
            }
        }
    }

    pub fn build_expression(&self, root: &NodeId, source: &SourceNode) -> BuildResult<BuiltGraph> {
        self.run(root, |ctx| expression::build_expr(ctx, root, source, 1))
            .map(|(graph, ())| graph)
    }

    /// Build the clauses of one named function as a single definition
    pub fn build_function(&self, root: &NodeId, clauses: &[SourceNode]) -> BuildResult<BuiltGraph> {
        let forms: Vec<&SourceNode> = clauses.iter().collect();
        self.run(root, |ctx| function::build_definition(ctx, root, &forms, 1))
            .map(|(graph, ())| graph)
    }

    pub fn build_pattern(&self, root: &NodeId, source: &SourceNode) -> BuildResult<PatternGraph> {
        self.run(root, |ctx| {
            let mut bindings = pattern::PatternBindings::default();
            pattern::build_pattern(ctx, root, source, 1, &mut bindings)?;
            Ok(bindings.into_vec())
        })
        .map(|(graph, bindings)| PatternGraph { graph, bindings })
    }

    /// Capture report of the closure at the root of `source`. A construct
    /// that is not a closure captures nothing.
    pub fn analyze_closure(
        &self,
        root: &NodeId,
        source: &SourceNode,
    ) -> BuildResult<ClosureReport> {
        let graph = self.build_expression(root, source)?;
        Ok(graph
            .closures
            .into_iter()
            .find(|report| &report.closure == root)
            .unwrap_or_else(|| ClosureReport::empty(root.clone())))
    }

    /// Build every construct in its own context. A failing construct is
    /// reported and its siblings are still built.
    pub fn build_batch(&self, constructs: &[Construct]) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            built: Vec::with_capacity(constructs.len()),
            failed: Vec::new(),
        };
        for construct in constructs {
            let result = match construct {
                Construct::Expression { root, source } => self.build_expression(root, source),
                Construct::Function { root, clauses } => self.build_function(root, clauses),
                Construct::Pattern { root, source } => {
                    self.build_pattern(root, source).map(|p| p.graph)
                }
            };
            match result {
                Ok(graph) => outcome.built.push(graph),
                Err(err) => outcome.failed.push(err),
            }
        }
        tracing::debug!(
            "Batch of {}: {} built, {} failed",
            constructs.len(),
            outcome.built.len(),
            outcome.failed.len()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{AuxTag, PropertyValue};
    use crate::relation::RelationKind;
    use crate::MutationClass;
    use pretty_assertions::assert_eq;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn build(node: &SourceNode) -> BuiltGraph {
        GraphBuilder::new(&BuildConfig::default())
            .build_expression(&NodeId::root("expr", 0), node)
            .unwrap()
    }

    fn lambda(params: &[&str], body: SourceNode) -> SourceNode {
        SourceNode::closure(vec![SourceNode::clause(
            params.iter().map(|p| SourceNode::var(*p)).collect(),
            body,
        )])
    }

    #[test]
    fn test_comparison_and_logical_operators() {
        init_tracing();
        // x > 5 and y < 10
        let source = SourceNode::op(
            "and",
            SourceNode::op(">", SourceNode::var("x"), SourceNode::int(5)),
            SourceNode::op("<", SourceNode::var("y"), SourceNode::int(10)),
        );
        let graph = build(&source);
        let root = graph.node(&graph.root).unwrap();
        assert_eq!(root.node_type, NodeType::LogicalOperator);
        assert_eq!(root.text("symbol"), Some("and"));

        let left = graph.node(root.related_one(RelationKind::LeftOperand).unwrap()).unwrap();
        assert_eq!(left.id, NodeId::parse("expr/0/left").unwrap());
        assert_eq!(left.node_type, NodeType::ComparisonOperator);
        assert_eq!(left.text("symbol"), Some(">"));
        let five = graph.node(left.related_one(RelationKind::RightOperand).unwrap()).unwrap();
        assert_eq!(five.property("value"), Some(&PropertyValue::Integer(5)));

        let right = graph.node(root.related_one(RelationKind::RightOperand).unwrap()).unwrap();
        assert_eq!(right.text("symbol"), Some("<"));
        assert_eq!(graph.nodes.len(), 7);
    }

    #[test]
    fn test_map_entries_keep_source_order() {
        // %{name: "ada", "k" => 1}
        let source = SourceNode::form(
            "%{}",
            vec![
                SourceNode::tuple(vec![SourceNode::atom("name"), SourceNode::text("ada")]),
                SourceNode::tuple(vec![SourceNode::text("k"), SourceNode::int(1)]),
            ],
        );
        let graph = build(&source);
        let root = graph.node(&graph.root).unwrap();
        assert_eq!(root.node_type, NodeType::MapLiteral);
        assert_eq!(
            root.related(RelationKind::Entry),
            &[graph.root.indexed("entry", 0), graph.root.indexed("entry", 1)]
        );

        let first = graph.node(&graph.root.indexed("entry", 0)).unwrap();
        assert_eq!(first.node_type, NodeType::MapEntry);
        let key = graph.node(first.related_one(RelationKind::Key).unwrap()).unwrap();
        assert_eq!(key.node_type, NodeType::AtomLiteral);
        let second = graph.node(&graph.root.indexed("entry", 1)).unwrap();
        let key = graph.node(second.related_one(RelationKind::Key).unwrap()).unwrap();
        assert_eq!(key.node_type, NodeType::StringLiteral);
    }

    #[test]
    fn test_capture_mutation_classes() {
        let builder = GraphBuilder::new(&BuildConfig::default())
            .with_enclosing_frame(ScopeKind::Function, &["x"]);
        let root = NodeId::root("expr", 0);
        let class_of = |body: SourceNode| {
            let report = builder.analyze_closure(&root, &lambda(&[], body)).unwrap();
            let capture = report.capture("x").unwrap();
            assert_eq!(capture.frame.as_ref().map(|f| f.kind), Some(ScopeKind::Function));
            capture.mutation
        };

        // y = x; x = 1
        let shadow = SourceNode::block(vec![
            SourceNode::op("=", SourceNode::var("y"), SourceNode::var("x")),
            SourceNode::op("=", SourceNode::var("x"), SourceNode::int(1)),
        ]);
        assert_eq!(class_of(shadow), MutationClass::Shadow);

        // x = 1; x + 2
        let immediate = SourceNode::block(vec![
            SourceNode::op("=", SourceNode::var("x"), SourceNode::int(1)),
            SourceNode::op("+", SourceNode::var("x"), SourceNode::int(2)),
        ]);
        assert_eq!(class_of(immediate), MutationClass::Shadow);

        // x = x + 1
        let rebind = SourceNode::op(
            "=",
            SourceNode::var("x"),
            SourceNode::op("+", SourceNode::var("x"), SourceNode::int(1)),
        );
        assert_eq!(class_of(rebind), MutationClass::Rebind);

        // x * 2
        let immutable = SourceNode::op("*", SourceNode::var("x"), SourceNode::int(2));
        assert_eq!(class_of(immutable), MutationClass::Immutable);
    }

    #[test]
    fn test_free_variables_exclude_parameters() {
        // fn x, y -> x + y + z end
        let source = lambda(
            &["x", "y"],
            SourceNode::op(
                "+",
                SourceNode::op("+", SourceNode::var("x"), SourceNode::var("y")),
                SourceNode::var("z"),
            ),
        );
        let root = NodeId::root("expr", 0);
        let report = GraphBuilder::new(&BuildConfig::default())
            .analyze_closure(&root, &source)
            .unwrap();
        assert_eq!(report.bound, vec!["x", "y"]);
        assert_eq!(report.free_names(), vec!["z"]);
        let z = report.capture("z").unwrap();
        assert_eq!(z.reference_count, 1);
        // Nothing outside defines z
        assert!(z.frame.is_none());

        let graph = build(&source);
        let captured = graph.nodes_of_type(NodeType::CapturedVariable);
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].id, root.indexed("capture", 0));
        assert_eq!(captured[0].property("mapped"), Some(&PropertyValue::Boolean(false)));
    }

    #[test]
    fn test_captured_variable_links_to_its_binding() {
        // total = 0; fn item -> item + total end
        let source = SourceNode::block(vec![
            SourceNode::op("=", SourceNode::var("total"), SourceNode::int(0)),
            lambda(
                &["item"],
                SourceNode::op("+", SourceNode::var("item"), SourceNode::var("total")),
            ),
        ]);
        let graph = build(&source);
        let closure_id = graph.root.indexed("statement", 1);
        let closure = graph.node(&closure_id).unwrap();
        assert!(closure.has_tag(AuxTag::Closure));

        let captured = graph.node(closure.related_one(RelationKind::Captures).unwrap()).unwrap();
        assert_eq!(captured.text("name"), Some("total"));
        assert_eq!(captured.text("frame_kind"), Some("module"));
        assert_eq!(
            captured.related_one(RelationKind::BoundBy),
            Some(&graph.root.indexed("statement", 0).child("left"))
        );
        assert_eq!(
            captured.related(RelationKind::Reference),
            &[closure_id.indexed("clause", 0).child("body").child("right")]
        );
        assert!(graph.graph().dangling_relations().is_empty());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let source = SourceNode::block(vec![
            SourceNode::op("=", SourceNode::var("n"), SourceNode::int(2)),
            lambda(&["a"], SourceNode::op("*", SourceNode::var("a"), SourceNode::var("n"))),
        ]);
        let first = build(&source);
        let second = build(&source);
        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
        assert_eq!(first.to_json_lines().unwrap(), second.to_json_lines().unwrap());
        assert_eq!(first.to_json_lines().unwrap().lines().count(), first.nodes.len());
    }

    #[test]
    fn test_depth_ceiling_boundary() {
        // Nine unary minus forms around a variable: ten nodes deep
        let mut source = SourceNode::var("v");
        for _ in 0..9 {
            source = SourceNode::unary("-", source);
        }
        let root = NodeId::root("expr", 0);

        let at_limit = GraphBuilder::new(&BuildConfig::default().with_max_depth(10));
        assert_eq!(at_limit.build_expression(&root, &source).unwrap().nodes.len(), 10);

        let below = GraphBuilder::new(&BuildConfig::default().with_max_depth(9));
        let err = below.build_expression(&root, &source).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::DepthExceeded));
        assert_eq!(err.construct, root);
    }

    #[test]
    fn test_capture_ceiling() {
        let config = BuildConfig::default().with_max_captures(1);
        let source = lambda(&[], SourceNode::op("+", SourceNode::var("a"), SourceNode::var("b")));
        let err = GraphBuilder::new(&config)
            .build_expression(&NodeId::root("expr", 0), &source)
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::SizeExceeded));
    }

    #[test]
    fn test_analyze_non_closure_is_empty() {
        let root = NodeId::root("expr", 0);
        let report = GraphBuilder::new(&BuildConfig::default())
            .analyze_closure(&root, &SourceNode::var("x"))
            .unwrap();
        assert_eq!(report, ClosureReport::empty(root));
    }

    #[test]
    fn test_batch_keeps_siblings_of_a_failure() {
        let builder = GraphBuilder::new(&BuildConfig::default());
        let bad_arity = SourceNode::closure(vec![
            SourceNode::clause(vec![SourceNode::var("a")], SourceNode::int(1)),
            SourceNode::clause(vec![], SourceNode::int(2)),
        ]);
        let outcome = builder.build_batch(&[
            Construct::Expression {
                root: NodeId::root("expr", 0),
                source: SourceNode::int(1),
            },
            Construct::Expression {
                root: NodeId::root("expr", 1),
                source: bad_arity,
            },
            Construct::Pattern {
                root: NodeId::root("pattern", 0),
                source: SourceNode::tuple(vec![SourceNode::var("a"), SourceNode::var("_")]),
            },
        ]);

        assert_eq!(outcome.built.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].construct, NodeId::root("expr", 1));
        assert_eq!(outcome.failed[0].kind(), Some(ErrorKind::InconsistentClauseArity));
        assert!(outcome.to_string().contains("Failed: 1"));
    }

    #[test]
    fn test_batch_keeps_siblings_of_a_depth_failure() {
        let builder = GraphBuilder::new(&BuildConfig::default().with_max_depth(4));
        let mut deep = SourceNode::var("v");
        for _ in 0..4 {
            deep = SourceNode::unary("-", deep);
        }
        let shallow = SourceNode::op("+", SourceNode::var("a"), SourceNode::int(1));
        let constructs: Vec<Construct> = [shallow.clone(), deep, shallow]
            .into_iter()
            .enumerate()
            .map(|(i, source)| Construct::Expression {
                root: NodeId::root("expr", i),
                source,
            })
            .collect();

        let outcome = builder.build_batch(&constructs);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].construct, NodeId::root("expr", 1));
        assert_eq!(outcome.failed[0].kind(), Some(ErrorKind::DepthExceeded));

        let roots: Vec<&NodeId> = outcome.built.iter().map(|g| &g.root).collect();
        assert_eq!(roots, vec![&NodeId::root("expr", 0), &NodeId::root("expr", 2)]);
        // Nothing from the failed construct leaks into the kept ones
        assert!(outcome
            .built
            .iter()
            .flat_map(|g| &g.nodes)
            .all(|n| !n.id.is_within(&NodeId::root("expr", 1))));
        assert_eq!(outcome.total_nodes(), 6);
    }

    #[test]
    fn test_pattern_bindings_are_exact() {
        let pattern = GraphBuilder::new(&BuildConfig::default())
            .build_pattern(
                &NodeId::root("pattern", 0),
                &SourceNode::tuple(vec![
                    SourceNode::var("a"),
                    SourceNode::var("_"),
                    SourceNode::unary("^", SourceNode::var("b")),
                ]),
            )
            .unwrap();
        let names: Vec<&str> = pattern.bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
        assert_eq!(
            pattern.bindings[0].node,
            Some(NodeId::root("pattern", 0).indexed("element", 0))
        );
    }
}
