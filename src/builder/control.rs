//! Control flow: `if`/`unless`, `case`, `cond`, `with`, `for`
//!
//! Branches and clauses each get their own frame, so a binding made in one
//! branch is never visible to a sibling.

use super::context::BuildContext;
use super::expression::build_expr;
use super::function::{ClauseParts, build_head, check_arity, split_clause};
use super::pattern::{PatternBindings, build_pattern};
use crate::node::{AuxTag, GraphNode, NodeType};
use crate::node_id::NodeId;
use crate::relation::RelationKind;
use crate::scope::ScopeKind;
use crate::source::SourceNode;
use crate::{Error, Result};

const CONTROL: &[AuxTag] = &[AuxTag::Expression, AuxTag::ControlFlow];

fn child(
    ctx: &mut BuildContext<'_>,
    node: &mut GraphNode,
    kind: RelationKind,
    source: &SourceNode,
    depth: usize,
) -> Result<()> {
    let child_id = node.id.child(kind.label());
    build_expr(ctx, &child_id, source, depth)?;
    node.relate(kind, child_id);
    Ok(())
}

/// Clauses of a do/else block value
fn clause_items(block: Option<&SourceNode>) -> &[SourceNode] {
    match block {
        Some(value) => value.as_list().unwrap_or(std::slice::from_ref(value)),
        None => &[],
    }
}

/// Split every clause, failing on items that are not `->` clauses and on
/// clauses that take other than exactly `expected` parameters
fn single_param_clauses<'a>(
    owner: &NodeId,
    label: &str,
    items: &'a [SourceNode],
) -> Result<Vec<ClauseParts<'a>>> {
    let clauses = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            split_clause(item).ok_or_else(|| Error::MalformedPattern {
                at: owner.indexed(label, i),
                reason: "expected a `pattern -> body` clause".to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let arity = check_arity(owner, clauses.iter().map(|c| c.params.len()).collect())?;
    if !clauses.is_empty() && arity != 1 {
        return Err(Error::InconsistentClauseArity {
            at: owner.clone(),
            arities: clauses.iter().map(|c| c.params.len()).collect(),
        });
    }
    Ok(clauses)
}

/// `pattern [when guard] -> body` clauses of `case`, `with ... else` and
/// `for ... reduce`, linked from `node` through `relation`
fn build_match_clauses(
    ctx: &mut BuildContext<'_>,
    node: &mut GraphNode,
    relation: RelationKind,
    items: &[SourceNode],
    depth: usize,
) -> Result<()> {
    let clauses = single_param_clauses(&node.id, relation.label(), items)?;
    ctx.check_fanout(&node.id, "clause", clauses.len())?;
    node.declare_relation(relation);
    for (i, clause) in clauses.iter().enumerate() {
        let clause_id = node.id.indexed(relation.label(), i);
        ctx.in_scope(ScopeKind::Clause, |ctx| {
            let mut clause_node = GraphNode::new(clause_id.clone(), NodeType::CaseClause)
                .with_tags(&[AuxTag::ControlFlow])
                .with_position(clause.position);
            build_head(
                ctx,
                &mut clause_node,
                RelationKind::Pattern,
                clause.params,
                clause.guard,
                depth + 1,
            )?;
            if let Some(body) = clause.body {
                child(ctx, &mut clause_node, RelationKind::Body, body, depth + 1)?;
            }
            ctx.emit(clause_node);
            Ok(())
        })?;
        node.relate(relation, clause_id);
    }
    Ok(())
}

pub(crate) fn build_conditional(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    negated: bool,
    condition: &SourceNode,
    branches: &SourceNode,
    depth: usize,
) -> Result<()> {
    let node_type = if negated {
        NodeType::UnlessExpression
    } else {
        NodeType::IfExpression
    };
    let mut node = GraphNode::new(id.clone(), node_type)
        .with_tags(CONTROL)
        .with_position(source.position());

    child(ctx, &mut node, RelationKind::Condition, condition, depth + 1)?;
    for (key, kind) in [("do", RelationKind::Then), ("else", RelationKind::Else)] {
        if let Some(branch) = branches.keyword(key) {
            ctx.in_scope(ScopeKind::Block, |ctx| child(ctx, &mut node, kind, branch, depth + 1))?;
        }
    }

    ctx.emit(node);
    Ok(())
}

pub(crate) fn build_case(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    subject: &SourceNode,
    branches: &SourceNode,
    depth: usize,
) -> Result<()> {
    let mut node = GraphNode::new(id.clone(), NodeType::CaseExpression)
        .with_tags(CONTROL)
        .with_position(source.position());
    child(ctx, &mut node, RelationKind::Subject, subject, depth + 1)?;
    let clauses = clause_items(branches.keyword("do"));
    build_match_clauses(ctx, &mut node, RelationKind::Clause, clauses, depth)?;
    ctx.emit(node);
    Ok(())
}

pub(crate) fn build_cond(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    branches: &SourceNode,
    depth: usize,
) -> Result<()> {
    let mut node = GraphNode::new(id.clone(), NodeType::CondExpression)
        .with_tags(CONTROL)
        .with_position(source.position());
    let items = clause_items(branches.keyword("do"));
    let clauses = single_param_clauses(id, RelationKind::Clause.label(), items)?;
    ctx.check_fanout(id, "clause", clauses.len())?;
    node.declare_relation(RelationKind::Clause);

    for (i, clause) in clauses.iter().enumerate() {
        let clause_id = id.indexed(RelationKind::Clause.label(), i);
        ctx.in_scope(ScopeKind::Block, |ctx| {
            let mut clause_node = GraphNode::new(clause_id.clone(), NodeType::CondClause)
                .with_tags(&[AuxTag::ControlFlow])
                .with_position(clause.position);
            if let Some(condition) = clause.params.first() {
                child(ctx, &mut clause_node, RelationKind::Condition, condition, depth + 1)?;
            }
            if let Some(body) = clause.body {
                child(ctx, &mut clause_node, RelationKind::Body, body, depth + 1)?;
            }
            ctx.emit(clause_node);
            Ok(())
        })?;
        node.relate(RelationKind::Clause, clause_id);
    }

    ctx.emit(node);
    Ok(())
}

/// `pattern <- value`, possibly guarded, as a `Generator` node. The value
/// is built before the pattern binds.
fn build_generator(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    clause: &SourceNode,
    value_relation: RelationKind,
    depth: usize,
) -> Result<GraphNode> {
    let (pattern, value, binary) = match clause.args_of("<-") {
        Some([pattern, value]) => (pattern.clone(), value, false),
        _ => match clause.args_of("<<>>") {
            // <<c <- string>>: the pattern is a one-segment binary pattern
            Some([inner]) => match inner.args_of("<-") {
                Some([segment, value]) => {
                    (SourceNode::form("<<>>", vec![segment.clone()]), value, true)
                }
                _ => return Err(malformed_generator(id)),
            },
            _ => return Err(malformed_generator(id)),
        },
    };
    let (pattern, guard) = match pattern.args_of("when") {
        Some([pattern, guard]) => (pattern.clone(), Some(guard.clone())),
        _ => (pattern, None),
    };

    let mut node = GraphNode::new(id.clone(), NodeType::Generator)
        .with_tags(&[AuxTag::ControlFlow, AuxTag::Binding])
        .with_property("binary", binary)
        .with_position(clause.position());

    let value_id = id.child(value_relation.label());
    let ((), reads) = ctx.track_reads(|ctx| build_expr(ctx, &value_id, value, depth + 1))?;
    node.relate(value_relation, value_id);

    let pattern_id = id.child(RelationKind::Pattern.label());
    let mut bindings = PatternBindings::default();
    build_pattern(ctx, &pattern_id, &pattern, depth + 1, &mut bindings)?;
    ctx.bind_all(bindings.into_vec(), Some(&reads));
    node.relate(RelationKind::Pattern, pattern_id);

    if let Some(guard) = guard {
        child(ctx, &mut node, RelationKind::Guard, &guard, depth + 1)?;
    }
    Ok(node)
}

fn malformed_generator(at: &NodeId) -> Error {
    Error::MalformedPattern {
        at: at.clone(),
        reason: "expected a `pattern <- value` clause".to_string(),
    }
}

fn is_generator(part: &SourceNode) -> bool {
    part.args_of("<-").is_some()
        || matches!(part.args_of("<<>>"), Some([inner]) if inner.args_of("<-").is_some())
}

pub(crate) fn build_with(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    parts: &[SourceNode],
    depth: usize,
) -> Result<()> {
    let Some((options, clauses)) = parts.split_last() else {
        ctx.unknown(id, "with", source.position());
        return Ok(());
    };
    let mut node = GraphNode::new(id.clone(), NodeType::WithExpression)
        .with_tags(CONTROL)
        .with_position(source.position());
    ctx.check_fanout(id, "clause", clauses.len())?;
    node.declare_relation(RelationKind::Generator);

    ctx.in_scope(ScopeKind::Block, |ctx| {
        for (i, clause) in clauses.iter().enumerate() {
            if clause.args_of("<-").is_some() {
                let generator_id = id.indexed(RelationKind::Generator.label(), i);
                let generator =
                    build_generator(ctx, &generator_id, clause, RelationKind::Value, depth + 1)?;
                ctx.emit(generator);
                node.relate(RelationKind::Generator, generator_id);
            } else {
                let statement_id = id.indexed(RelationKind::Statement.label(), i);
                build_expr(ctx, &statement_id, clause, depth + 1)?;
                node.relate(RelationKind::Statement, statement_id);
            }
        }
        if let Some(body) = options.keyword("do") {
            child(ctx, &mut node, RelationKind::Body, body, depth + 1)?;
        }
        Ok(())
    })?;

    // else clauses do not see the bindings of the with clauses
    if let Some(fallback) = options.keyword("else") {
        let clauses = clause_items(Some(fallback));
        build_match_clauses(ctx, &mut node, RelationKind::Else, clauses, depth)?;
    }

    ctx.emit(node);
    Ok(())
}

pub(crate) fn build_comprehension(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    parts: &[SourceNode],
    depth: usize,
) -> Result<()> {
    let Some((options, qualifiers)) = parts.split_last() else {
        ctx.unknown(id, "for", source.position());
        return Ok(());
    };
    let mut node = GraphNode::new(id.clone(), NodeType::Comprehension)
        .with_tags(CONTROL)
        .with_position(source.position());
    ctx.check_fanout(id, "qualifier", qualifiers.len())?;

    // Options are evaluated outside the comprehension frame
    if let Some(into) = options.keyword("into") {
        child(ctx, &mut node, RelationKind::Into, into, depth + 1)?;
    }
    if let Some(initial) = options.keyword("reduce") {
        child(ctx, &mut node, RelationKind::Reduce, initial, depth + 1)?;
    }
    if let Some(uniq) = options.keyword("uniq").and_then(SourceNode::as_atom) {
        node.set_property("uniq", uniq == "true");
    }

    ctx.in_scope(ScopeKind::Comprehension, |ctx| {
        node.declare_relation(RelationKind::Generator);
        for (i, qualifier) in qualifiers.iter().enumerate() {
            if is_generator(qualifier) {
                let generator_id = id.indexed(RelationKind::Generator.label(), i);
                let kind = RelationKind::Enumerable;
                let generator = build_generator(ctx, &generator_id, qualifier, kind, depth + 1)?;
                ctx.emit(generator);
                node.relate(RelationKind::Generator, generator_id);
            } else {
                let filter_id = id.indexed(RelationKind::Filter.label(), i);
                build_expr(ctx, &filter_id, qualifier, depth + 1)?;
                node.relate(RelationKind::Filter, filter_id);
            }
        }

        match (options.keyword("reduce"), options.keyword("do")) {
            // reduce: the body is a list of `acc -> body` clauses
            (Some(_), body) => {
                let clauses = clause_items(body);
                build_match_clauses(ctx, &mut node, RelationKind::Clause, clauses, depth)
            }
            (None, Some(body)) => child(ctx, &mut node, RelationKind::Body, body, depth + 1),
            (None, None) => Ok(()),
        }
    })?;

    ctx.emit(node);
    Ok(())
}
