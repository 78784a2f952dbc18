//! Functions and clauses
//!
//! Anonymous functions (`fn ... end`) and named definitions (`def`/`defp`)
//! share the clause machinery here: every clause gets its own frame, its
//! parameters are decomposed as one pattern position, the bindings enter the
//! clause frame, and only then is the guard built, so a guard sees its own
//! clause's bindings and never a sibling's. Every clause of one construct
//! must take the same number of parameters.

use super::context::BuildContext;
use super::expression::build_expr;
use super::pattern::{PatternBindings, build_pattern};
use crate::node::{AuxTag, GraphNode, NodeType};
use crate::node_id::NodeId;
use crate::relation::RelationKind;
use crate::scope::ScopeKind;
use crate::source::{Position, SourceNode};
use crate::{Error, Result};

/// A `params -> body` clause, with any `when` guard split off
pub(crate) struct ClauseParts<'a> {
    pub params: &'a [SourceNode],
    pub guard: Option<&'a SourceNode>,
    pub body: Option<&'a SourceNode>,
    pub position: Option<Position>,
}

/// Split a `->` clause. `None` when the node is not a clause.
pub(crate) fn split_clause(clause: &SourceNode) -> Option<ClauseParts<'_>> {
    let [params, body] = clause.args_of("->")? else {
        return None;
    };
    let (params, guard) = split_guard(params.as_list()?);
    Some(ClauseParts {
        params,
        guard,
        body: Some(body),
        position: clause.position(),
    })
}

/// `[when(p1, .., pn, guard)]` → (`[p1, .., pn]`, guard)
fn split_guard(params: &[SourceNode]) -> (&[SourceNode], Option<&SourceNode>) {
    match params {
        [single] => match single.args_of("when").and_then(|args| args.split_last()) {
            Some((guard, params)) => (params, Some(guard)),
            None => (params, None),
        },
        _ => (params, None),
    }
}

/// Every clause must take the same number of parameters
pub(crate) fn check_arity(at: &NodeId, arities: Vec<usize>) -> Result<usize> {
    match arities.first() {
        Some(&first) if arities.iter().all(|&a| a == first) => Ok(first),
        Some(_) => Err(Error::InconsistentClauseArity {
            at: at.clone(),
            arities,
        }),
        None => Ok(0),
    }
}

/// Decompose a clause head into `node`: parameters through `relation`,
/// bindings into the current frame, then the guard. Returns the bound names.
///
/// `depth` is the depth of the parameter nodes.
pub(crate) fn build_head(
    ctx: &mut BuildContext<'_>,
    node: &mut GraphNode,
    relation: RelationKind,
    params: &[SourceNode],
    guard: Option<&SourceNode>,
    depth: usize,
) -> Result<Vec<String>> {
    let mut bindings = PatternBindings::default();
    if relation.is_ordered() {
        node.declare_relation(relation);
    }
    for (j, param) in params.iter().enumerate() {
        let param_id = if relation.is_ordered() {
            node.id.indexed(relation.label(), j)
        } else {
            node.id.child(relation.label())
        };
        build_pattern(ctx, &param_id, param, depth, &mut bindings)?;
        node.relate(relation, param_id);
    }

    let names: Vec<String> = bindings.names().map(str::to_string).collect();
    ctx.bind_all(bindings.into_vec(), None);

    if let Some(guard) = guard {
        let guard_id = node.id.child(RelationKind::Guard.label());
        build_expr(ctx, &guard_id, guard, depth)?;
        node.relate(RelationKind::Guard, guard_id);
    }
    Ok(names)
}

/// `fn clauses end`
pub(crate) fn build_anonymous(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    clauses: &[SourceNode],
    depth: usize,
) -> Result<()> {
    let parts = clauses
        .iter()
        .enumerate()
        .map(|(i, clause)| {
            split_clause(clause).ok_or_else(|| Error::MalformedPattern {
                at: id.indexed(RelationKind::Clause.label(), i),
                reason: "fn clauses must have the form `params -> body`".to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if parts.is_empty() {
        return Err(Error::MalformedPattern {
            at: id.clone(),
            reason: "fn has no clauses".to_string(),
        });
    }
    ctx.check_fanout(id, "clause", parts.len())?;
    let arity = check_arity(id, parts.iter().map(|p| p.params.len()).collect())?;

    let mut node = GraphNode::new(id.clone(), NodeType::AnonymousFunction)
        .with_tags(&[AuxTag::Expression, AuxTag::Closure])
        .with_property("arity", arity)
        .with_property("clause_count", parts.len())
        .with_position(source.position());
    node.declare_relation(RelationKind::Clause);

    ctx.begin_closure(id);
    for (i, clause) in parts.iter().enumerate() {
        let clause_id = id.indexed(RelationKind::Clause.label(), i);
        ctx.in_scope(ScopeKind::Clause, |ctx| {
            let mut clause_node =
                GraphNode::new(clause_id.clone(), NodeType::AnonymousFunctionClause)
                    .with_tags(&[AuxTag::Closure])
                    .with_position(clause.position);
            let names = build_head(
                ctx,
                &mut clause_node,
                RelationKind::Parameter,
                clause.params,
                clause.guard,
                depth + 1,
            )?;
            ctx.closure_bound(names.iter().map(String::as_str));
            build_body(ctx, &mut clause_node, clause.body, depth + 1)?;
            ctx.emit(clause_node);
            Ok(())
        })?;
        node.relate(RelationKind::Clause, clause_id);
    }
    ctx.end_closure(&mut node)?;

    ctx.emit(node);
    Ok(())
}

fn build_body(
    ctx: &mut BuildContext<'_>,
    node: &mut GraphNode,
    body: Option<&SourceNode>,
    depth: usize,
) -> Result<()> {
    if let Some(body) = body {
        let body_id = node.id.child(RelationKind::Body.label());
        build_expr(ctx, &body_id, body, depth)?;
        node.relate(RelationKind::Body, body_id);
    }
    Ok(())
}

/// One `def name(params) when guard do body end` form
struct DefinitionClause<'a> {
    visibility: &'static str,
    name: &'a str,
    parts: ClauseParts<'a>,
}

fn split_definition<'a>(at: &NodeId, form: &'a SourceNode) -> Result<DefinitionClause<'a>> {
    let malformed = |reason: &str| Error::MalformedPattern {
        at: at.clone(),
        reason: reason.to_string(),
    };

    let (visibility, args) = match (form.args_of("def"), form.args_of("defp")) {
        (Some(args), _) => ("public", args),
        (_, Some(args)) => ("private", args),
        _ => return Err(malformed("expected a def or defp form")),
    };
    let (head, options) = match args {
        [head] => (head, None),
        [head, options] => (head, Some(options)),
        _ => return Err(malformed("def takes a head and an optional do block")),
    };

    let (call, guard) = match head.args_of("when") {
        Some([call, guard]) => (call, Some(guard)),
        _ => (head, None),
    };
    let SourceNode::Form { tag: name, args, .. } = call else {
        return Err(malformed("function head must be a name with parameters"));
    };

    Ok(DefinitionClause {
        visibility,
        name,
        parts: ClauseParts {
            params: args.as_deref().unwrap_or_default(),
            guard,
            body: options.and_then(|options| options.keyword("do")),
            position: form.position(),
        },
    })
}

/// The `def`/`defp` forms of one function, in source order, as a single
/// `FunctionDefinition` with one `FunctionClause` per form
pub(crate) fn build_definition(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    forms: &[&SourceNode],
    depth: usize,
) -> Result<()> {
    ctx.guard(id, depth)?;
    let clauses = forms
        .iter()
        .enumerate()
        .map(|(i, form)| split_definition(&id.indexed(RelationKind::Clause.label(), i), form))
        .collect::<Result<Vec<_>>>()?;
    let Some(first) = clauses.first() else {
        return Err(Error::MalformedPattern {
            at: id.clone(),
            reason: "function has no clauses".to_string(),
        });
    };
    if let Some(other) = clauses
        .iter()
        .find(|c| c.name != first.name || c.visibility != first.visibility)
    {
        return Err(Error::MalformedPattern {
            at: id.clone(),
            reason: format!("clause of {} grouped with {}", other.name, first.name),
        });
    }
    ctx.check_fanout(id, "clause", clauses.len())?;
    let arity = check_arity(id, clauses.iter().map(|c| c.parts.params.len()).collect())?;

    let mut node = GraphNode::new(id.clone(), NodeType::FunctionDefinition)
        .with_tags(&[AuxTag::Expression])
        .with_property("name", first.name)
        .with_property("arity", arity)
        .with_property("visibility", first.visibility)
        .with_property("clause_count", clauses.len())
        .with_position(first.parts.position);
    node.declare_relation(RelationKind::Clause);

    ctx.in_scope(ScopeKind::Function, |ctx| {
        for (i, clause) in clauses.iter().enumerate() {
            let clause_id = id.indexed(RelationKind::Clause.label(), i);
            ctx.in_scope(ScopeKind::Clause, |ctx| {
                let mut clause_node = GraphNode::new(clause_id.clone(), NodeType::FunctionClause)
                    .with_position(clause.parts.position);
                build_head(
                    ctx,
                    &mut clause_node,
                    RelationKind::Parameter,
                    clause.parts.params,
                    clause.parts.guard,
                    depth + 1,
                )?;
                build_body(ctx, &mut clause_node, clause.parts.body, depth + 1)?;
                ctx.emit(clause_node);
                Ok(())
            })?;
            node.relate(RelationKind::Clause, clause_id);
        }
        Ok(())
    })?;

    tracing::trace!("Built {}/{} with {} clauses", first.name, arity, clauses.len());
    ctx.emit(node);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuiltGraph, GraphBuilder};
    use crate::{BuildConfig, ErrorKind, MutationClass};
    use pretty_assertions::assert_eq;

    fn vars(names: &[&str]) -> Vec<SourceNode> {
        names.iter().map(|n| SourceNode::var(*n)).collect()
    }

    fn build(node: &SourceNode) -> BuiltGraph {
        GraphBuilder::new(&BuildConfig::default())
            .build_expression(&NodeId::root("expr", 0), node)
            .unwrap()
    }

    #[test]
    fn test_clause_arity_must_agree() {
        let closure = SourceNode::closure(vec![
            SourceNode::clause(vars(&["a", "b"]), SourceNode::int(1)),
            SourceNode::clause(vars(&["c", "d"]), SourceNode::int(2)),
            SourceNode::clause(vars(&["e", "f", "g"]), SourceNode::int(3)),
        ]);
        let err = GraphBuilder::new(&BuildConfig::default())
            .build_expression(&NodeId::root("expr", 0), &closure)
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InconsistentClauseArity));
        assert_eq!(err.construct, NodeId::root("expr", 0));
        assert!(matches!(
            err.source,
            Error::InconsistentClauseArity { ref arities, .. } if arities == &vec![2, 2, 3]
        ));
    }

    #[test]
    fn test_guard_sees_only_its_own_clause() {
        // fn x when x > 0 -> x; y -> x end
        let closure = SourceNode::closure(vec![
            SourceNode::clause(
                vec![SourceNode::form(
                    "when",
                    vec![
                        SourceNode::var("x"),
                        SourceNode::op(">", SourceNode::var("x"), SourceNode::int(0)),
                    ],
                )],
                SourceNode::var("x"),
            ),
            SourceNode::clause(vars(&["y"]), SourceNode::var("x")),
        ]);
        let graph = build(&closure);
        let clause = graph.node(&graph.root.indexed("clause", 0)).unwrap();
        assert_eq!(clause.related(RelationKind::Parameter).len(), 1);
        assert!(clause.related_one(RelationKind::Guard).is_some());

        // The second clause's `x` is not the first clause's binding
        let report = graph.closure(&graph.root).unwrap();
        assert_eq!(report.bound, vec!["x", "y"]);
        assert_eq!(report.free_names(), vec!["x"]);
        let capture = report.capture("x").unwrap();
        assert_eq!(capture.references, vec![graph.root.indexed("clause", 1).child("body")]);
        assert!(capture.frame.is_none());
    }

    #[test]
    fn test_definition_with_multiple_clauses() {
        let zero = SourceNode::form(
            "def",
            vec![
                SourceNode::form("fact", vec![SourceNode::int(0)]),
                SourceNode::keywords(vec![("do", SourceNode::int(1))]),
            ],
        );
        let n = SourceNode::form(
            "def",
            vec![
                SourceNode::form("fact", vars(&["n"])),
                SourceNode::keywords(vec![(
                    "do",
                    SourceNode::op(
                        "*",
                        SourceNode::var("n"),
                        SourceNode::form(
                            "fact",
                            vec![SourceNode::op("-", SourceNode::var("n"), SourceNode::int(1))],
                        ),
                    ),
                )]),
            ],
        );
        let graph = GraphBuilder::new(&BuildConfig::default())
            .build_function(&NodeId::root("fun", 0), &[zero, n])
            .unwrap();
        let root = graph.node(&graph.root).unwrap();
        assert_eq!(root.node_type, NodeType::FunctionDefinition);
        assert_eq!(root.text("name"), Some("fact"));
        assert_eq!(root.text("visibility"), Some("public"));
        assert_eq!(root.related(RelationKind::Clause).len(), 2);
        let param = graph.node(&graph.root.indexed("clause", 1).indexed("parameter", 0)).unwrap();
        assert_eq!(param.node_type, NodeType::VariablePattern);
    }

    #[test]
    fn test_definition_arity_mismatch() {
        let one = SourceNode::form("defp", vec![SourceNode::form("go", vars(&["a"]))]);
        let two = SourceNode::form("defp", vec![SourceNode::form("go", vars(&["a", "b"]))]);
        let err = GraphBuilder::new(&BuildConfig::default())
            .build_function(&NodeId::root("fun", 0), &[one, two])
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InconsistentClauseArity));
    }

    #[test]
    fn test_duplicate_parameter_is_malformed() {
        let closure =
            SourceNode::closure(vec![SourceNode::clause(vars(&["a", "a"]), SourceNode::var("a"))]);
        let err = GraphBuilder::new(&BuildConfig::default())
            .build_expression(&NodeId::root("expr", 0), &closure)
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::MalformedPattern));
    }

    #[test]
    fn test_nested_closure_captures() {
        // fn a -> fn b -> a + b + c end end
        let inner = SourceNode::closure(vec![SourceNode::clause(
            vars(&["b"]),
            SourceNode::op(
                "+",
                SourceNode::op("+", SourceNode::var("a"), SourceNode::var("b")),
                SourceNode::var("c"),
            ),
        )]);
        let outer = SourceNode::closure(vec![SourceNode::clause(vars(&["a"]), inner)]);
        let graph = build(&outer);

        let inner_id = graph.root.indexed("clause", 0).child("body");
        let inner_report = graph.closure(&inner_id).unwrap();
        assert_eq!(inner_report.free_names(), vec!["a", "c"]);
        let a = inner_report.capture("a").unwrap();
        assert_eq!(a.frame.as_ref().map(|f| f.kind), Some(ScopeKind::Clause));
        assert_eq!(a.mutation, MutationClass::Immutable);

        let outer_report = graph.closure(&graph.root).unwrap();
        assert_eq!(outer_report.free_names(), vec!["c"]);
        assert!(outer_report.capture("c").unwrap().frame.is_none());
    }
}
