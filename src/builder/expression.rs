//! Expression builder - the recursive dispatch point
//!
//! Every node goes through [`build_expr`]: the depth guard runs first, then
//! the node's shape is decoded once and handed to the matching builder.
//! Operators become category-typed nodes with `left_operand` /
//! `right_operand` (or `operand`) relations; calls get one `argument` per
//! position plus a `callee` pointing at a `FunctionReference`.

use super::capture::{build_capture, build_placeholder};
use super::context::BuildContext;
use super::control;
use super::function::{build_anonymous, build_definition};
use super::literal::build_literal;
use super::pattern::{PatternBindings, build_pattern};
use crate::node::{AuxTag, GraphNode, NodeType};
use crate::node_id::NodeId;
use crate::relation::RelationKind;
use crate::scope::ScopeKind;
use crate::shape::{ExprShape, OperatorCategory};
use crate::source::SourceNode;
use crate::Result;

/// Build any expression node at `id`, `depth` levels below the construct root
pub(crate) fn build_expr(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    depth: usize,
) -> Result<()> {
    ctx.guard(id, depth)?;
    let position = source.position();

    match ExprShape::decode(source) {
        ExprShape::Literal(shape) => build_literal(ctx, id, source, shape, depth),
        ExprShape::Variable(name) => {
            ctx.read(name, id, position);
            ctx.emit(
                GraphNode::new(id.clone(), NodeType::Variable)
                    .with_tags(&[AuxTag::Expression])
                    .with_property("name", name)
                    .with_property("ignored", name.starts_with('_'))
                    .with_position(position),
            );
            Ok(())
        }
        ExprShape::Reserved(name) => {
            ctx.emit(
                GraphNode::new(id.clone(), NodeType::SpecialForm)
                    .with_tags(&[AuxTag::Expression])
                    .with_property("name", name)
                    .with_position(position),
            );
            Ok(())
        }
        ExprShape::ModuleAttribute(name) => {
            ctx.emit(
                GraphNode::new(id.clone(), NodeType::ModuleAttribute)
                    .with_tags(&[AuxTag::Expression])
                    .with_property("name", name)
                    .with_position(position),
            );
            Ok(())
        }
        ExprShape::Alias(segments) => {
            match alias_name(segments) {
                Some(name) => ctx.emit(
                    GraphNode::new(id.clone(), NodeType::Alias)
                        .with_tags(&[AuxTag::Expression])
                        .with_property("qualified_name", name)
                        .with_position(position),
                ),
                None => ctx.unknown(id, "__aliases__", position),
            }
            Ok(())
        }
        ExprShape::Unary {
            category,
            symbol,
            operand,
        } => {
            let operand_id = id.child(RelationKind::Operand.label());
            build_expr(ctx, &operand_id, operand, depth + 1)?;
            ctx.emit(
                GraphNode::new(id.clone(), category.node_type())
                    .with_tags(&[AuxTag::Expression, AuxTag::Operator, AuxTag::UnaryOperator])
                    .with_property("symbol", symbol)
                    .with_relation(RelationKind::Operand, operand_id)
                    .with_position(position),
            );
            Ok(())
        }
        ExprShape::Binary {
            category: OperatorCategory::Match,
            symbol,
            left,
            right,
        } => build_match(ctx, id, source, symbol, left, right, depth),
        ExprShape::Binary {
            category,
            symbol,
            left,
            right,
        } => {
            let left_id = id.child(RelationKind::LeftOperand.label());
            let right_id = id.child(RelationKind::RightOperand.label());
            build_expr(ctx, &left_id, left, depth + 1)?;
            build_expr(ctx, &right_id, right, depth + 1)?;
            ctx.emit(
                binary_node(id, category.node_type(), symbol, left_id, right_id)
                    .with_position(position),
            );
            Ok(())
        }
        ExprShape::Block(statements) => {
            let mut node = GraphNode::new(id.clone(), NodeType::Block)
                .with_tags(&[AuxTag::Expression])
                .with_position(position);
            build_statements(ctx, &mut node, statements, depth)?;
            ctx.emit(node);
            Ok(())
        }
        ExprShape::Conditional {
            negated,
            condition,
            branches,
        } => control::build_conditional(ctx, id, source, negated, condition, branches, depth),
        ExprShape::Case { subject, branches } => {
            control::build_case(ctx, id, source, subject, branches, depth)
        }
        ExprShape::Cond(branches) => control::build_cond(ctx, id, source, branches, depth),
        ExprShape::With(parts) => control::build_with(ctx, id, source, parts, depth),
        ExprShape::Comprehension(parts) => {
            control::build_comprehension(ctx, id, source, parts, depth)
        }
        ExprShape::Closure(clauses) => build_anonymous(ctx, id, source, clauses, depth),
        ExprShape::Capture(body) => build_capture(ctx, id, source, body, depth),
        ExprShape::Placeholder(index) => build_placeholder(ctx, id, source, index),
        ExprShape::LocalCall { name: "def" | "defp", args } if !args.is_empty() => {
            build_definition(ctx, id, &[source], depth)
        }
        ExprShape::LocalCall { name: "defmodule", args } => {
            ctx.in_scope(ScopeKind::Module, |ctx| {
                let target = CallTarget::Local("defmodule");
                build_call(ctx, id, source, NodeType::LocalCall, target, args, depth)
            })
        }
        ExprShape::LocalCall { name, args } => {
            build_call(ctx, id, source, NodeType::LocalCall, CallTarget::Local(name), args, depth)
        }
        ExprShape::RemoteCall { receiver, name, args } => build_call(
            ctx,
            id,
            source,
            NodeType::RemoteCall,
            CallTarget::Remote { receiver, name },
            args,
            depth,
        ),
        ExprShape::AnonymousCall { fun, args } => {
            let target = CallTarget::Anonymous(fun);
            build_call(ctx, id, source, NodeType::AnonymousCall, target, args, depth)
        }
        ExprShape::Unknown(tag) => {
            ctx.unknown(id, tag, position);
            Ok(())
        }
    }
}

fn binary_node(
    id: &NodeId,
    node_type: NodeType,
    symbol: &str,
    left: NodeId,
    right: NodeId,
) -> GraphNode {
    GraphNode::new(id.clone(), node_type)
        .with_tags(&[AuxTag::Expression, AuxTag::Operator, AuxTag::BinaryOperator])
        .with_property("symbol", symbol)
        .with_relation(RelationKind::LeftOperand, left)
        .with_relation(RelationKind::RightOperand, right)
}

/// `pattern = value`: the value is built first, then the pattern, then the
/// pattern's bindings enter the current frame
fn build_match(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    symbol: &str,
    left: &SourceNode,
    right: &SourceNode,
    depth: usize,
) -> Result<()> {
    let left_id = id.child(RelationKind::LeftOperand.label());
    let right_id = id.child(RelationKind::RightOperand.label());

    let ((), reads) = ctx.track_reads(|ctx| build_expr(ctx, &right_id, right, depth + 1))?;
    let mut bindings = PatternBindings::default();
    build_pattern(ctx, &left_id, left, depth + 1, &mut bindings)?;
    ctx.bind_all(bindings.into_vec(), Some(&reads));

    ctx.emit(
        binary_node(id, NodeType::MatchOperator, symbol, left_id, right_id)
            .with_tags(&[AuxTag::Binding])
            .with_position(source.position()),
    );
    Ok(())
}

/// Ordered `statement` children of a block-like node
pub(crate) fn build_statements(
    ctx: &mut BuildContext<'_>,
    node: &mut GraphNode,
    statements: &[SourceNode],
    depth: usize,
) -> Result<()> {
    node.declare_relation(RelationKind::Statement);
    for (i, statement) in statements.iter().enumerate() {
        let statement_id = node.id.indexed(RelationKind::Statement.label(), i);
        build_expr(ctx, &statement_id, statement, depth + 1)?;
        node.relate(RelationKind::Statement, statement_id);
    }
    Ok(())
}

/// What a call invokes
pub(crate) enum CallTarget<'a> {
    Local(&'a str),
    Remote { receiver: &'a SourceNode, name: &'a str },
    Anonymous(&'a SourceNode),
}

fn build_call(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    node_type: NodeType,
    target: CallTarget<'_>,
    args: &[SourceNode],
    depth: usize,
) -> Result<()> {
    let mut node = GraphNode::new(id.clone(), node_type)
        .with_tags(&[AuxTag::Expression, AuxTag::Call])
        .with_property("arity", args.len())
        .with_position(source.position());

    match target {
        CallTarget::Local(name) => {
            node.set_property("name", name);
            let callee_id = id.child(RelationKind::Callee.label());
            ctx.emit(function_reference(&callee_id, None, name, args.len()));
            node.relate(RelationKind::Callee, callee_id);
        }
        CallTarget::Remote { receiver, name } => {
            node.set_property("name", name);
            let module = module_name(receiver);
            if module.is_none() {
                // Dynamic receiver: a variable, a call result, ...
                let receiver_id = id.child(RelationKind::Receiver.label());
                build_expr(ctx, &receiver_id, receiver, depth + 1)?;
                node.relate(RelationKind::Receiver, receiver_id);
            }
            let callee_id = id.child(RelationKind::Callee.label());
            ctx.emit(function_reference(&callee_id, module.as_deref(), name, args.len()));
            node.relate(RelationKind::Callee, callee_id);
        }
        CallTarget::Anonymous(fun) => {
            let receiver_id = id.child(RelationKind::Receiver.label());
            build_expr(ctx, &receiver_id, fun, depth + 1)?;
            node.relate(RelationKind::Receiver, receiver_id);
        }
    }

    node.declare_relation(RelationKind::Argument);
    for (i, arg) in args.iter().enumerate() {
        let arg_id = id.indexed(RelationKind::Argument.label(), i);
        build_expr(ctx, &arg_id, arg, depth + 1)?;
        node.relate(RelationKind::Argument, arg_id);
    }

    ctx.emit(node);
    Ok(())
}

/// A `FunctionReference` node naming a function as written
pub(crate) fn function_reference(
    id: &NodeId,
    module: Option<&str>,
    name: &str,
    arity: usize,
) -> GraphNode {
    let qualified = match module {
        Some(module) => format!("{}.{}", module, name),
        None => name.to_string(),
    };
    let mut node = GraphNode::new(id.clone(), NodeType::FunctionReference)
        .with_property("name", name)
        .with_property("arity", arity)
        .with_property("qualified_name", qualified);
    if let Some(module) = module {
        node.set_property("module", module);
    }
    node
}

/// Module named by a call receiver: an alias (`Enum`) or an atom (`:lists`)
pub(crate) fn module_name(receiver: &SourceNode) -> Option<String> {
    match receiver {
        SourceNode::Atom { value } => Some(format!(":{}", value)),
        other => other.args_of("__aliases__").and_then(alias_name),
    }
}

/// Dotted name of an alias; `__MODULE__` segments are kept as written
pub(crate) fn alias_name(segments: &[SourceNode]) -> Option<String> {
    if segments.is_empty() {
        return None;
    }
    segments
        .iter()
        .map(|segment| segment.as_atom().or_else(|| segment.var_name()))
        .collect::<Option<Vec<&str>>>()
        .map(|parts| parts.join("."))
}
