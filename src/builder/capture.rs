//! Capture operator (`&`)
//!
//! Three forms:
//! - `&name/arity` and `&Mod.name/arity` capture a named function
//! - `&(...)` with `&1`, `&2`, ... placeholders is a shorthand closure,
//!   analyzed for captures like any other closure
//! - `&N` itself, valid for `1..=max_captures` and only inside `&(...)`

use super::context::BuildContext;
use super::expression::{build_expr, function_reference, module_name};
use crate::node::{AuxTag, GraphNode, NodeType};
use crate::node_id::NodeId;
use crate::relation::RelationKind;
use crate::source::SourceNode;
use crate::{Error, Result};

/// A named function target of `&target/arity`
enum Captured<'a> {
    Local(&'a str),
    Remote { receiver: &'a SourceNode, name: &'a str },
}

fn captured_function(target: &SourceNode) -> Option<Captured<'_>> {
    match target {
        SourceNode::Form { tag, args: None, .. } => Some(Captured::Local(tag)),
        SourceNode::Form { tag, args: Some(args), .. } if args.is_empty() => {
            Some(Captured::Local(tag))
        }
        SourceNode::Call { target, args, .. } if args.is_empty() => match target.args_of(".") {
            Some([receiver, fun]) => fun.as_atom().map(|name| Captured::Remote { receiver, name }),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn build_capture(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    body: &SourceNode,
    depth: usize,
) -> Result<()> {
    if let Some([target, SourceNode::Integer { value: arity }]) = body.args_of("/") {
        if let (Some(captured), Ok(arity)) = (captured_function(target), usize::try_from(*arity)) {
            return build_function_capture(ctx, id, source, captured, arity, depth);
        }
    }

    let mut node = GraphNode::new(id.clone(), NodeType::ShorthandClosure)
        .with_tags(&[AuxTag::Expression, AuxTag::Closure])
        .with_position(source.position());
    let body_id = id.child(RelationKind::Body.label());

    ctx.begin_closure(id);
    ctx.begin_placeholders();
    let built = build_expr(ctx, &body_id, body, depth + 1);
    let arity = ctx.end_placeholders();
    built?;
    ctx.end_closure(&mut node)?;

    node.set_property("arity", arity);
    node.relate(RelationKind::Body, body_id);
    ctx.emit(node);
    Ok(())
}

fn build_function_capture(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    captured: Captured<'_>,
    arity: usize,
    depth: usize,
) -> Result<()> {
    let mut node = GraphNode::new(id.clone(), NodeType::FunctionCapture)
        .with_tags(&[AuxTag::Expression, AuxTag::Closure])
        .with_property("arity", arity)
        .with_position(source.position());
    let callee_id = id.child(RelationKind::Callee.label());

    let callee = match captured {
        Captured::Local(name) => {
            node.set_property("name", name);
            function_reference(&callee_id, None, name, arity)
        }
        Captured::Remote { receiver, name } => {
            node.set_property("name", name);
            let module = module_name(receiver);
            if module.is_none() {
                let receiver_id = id.child(RelationKind::Receiver.label());
                build_expr(ctx, &receiver_id, receiver, depth + 1)?;
                node.relate(RelationKind::Receiver, receiver_id);
            }
            function_reference(&callee_id, module.as_deref(), name, arity)
        }
    };
    if let Some(qualified) = callee.text("qualified_name") {
        node.set_property("qualified_name", qualified.to_string());
    }
    ctx.emit(callee);
    node.relate(RelationKind::Callee, callee_id);
    ctx.emit(node);
    Ok(())
}

/// `&N` placeholder; only valid inside a shorthand closure
pub(crate) fn build_placeholder(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    index: i64,
) -> Result<()> {
    let max = ctx.config.max_captures;
    let in_range = index >= 1 && usize::try_from(index).is_ok_and(|i| i <= max);
    if !in_range || !ctx.saw_placeholder(index) {
        return Err(Error::InvalidCaptureIndex {
            at: id.clone(),
            index,
            max,
        });
    }
    ctx.emit(
        GraphNode::new(id.clone(), NodeType::CapturePlaceholder)
            .with_tags(&[AuxTag::Expression])
            .with_property("index", index)
            .with_position(source.position()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::node::PropertyValue;
    use crate::{BuildConfig, ErrorKind};
    use pretty_assertions::assert_eq;

    fn placeholder(n: i64) -> SourceNode {
        SourceNode::unary("&", SourceNode::int(n))
    }

    #[test]
    fn test_function_capture() {
        let capture = SourceNode::unary(
            "&",
            SourceNode::op(
                "/",
                SourceNode::remote(SourceNode::alias(&["Enum"]), "count", vec![]),
                SourceNode::int(1),
            ),
        );
        let graph = GraphBuilder::new(&BuildConfig::default())
            .build_expression(&NodeId::root("expr", 0), &capture)
            .unwrap();
        let root = graph.node(&graph.root).unwrap();
        assert_eq!(root.node_type, NodeType::FunctionCapture);
        assert_eq!(root.text("qualified_name"), Some("Enum.count"));
        assert_eq!(root.property("arity"), Some(&PropertyValue::Integer(1)));
    }

    #[test]
    fn test_shorthand_closure_arity_and_captures() {
        // &(&1 * factor + &2)
        let body = SourceNode::op(
            "+",
            SourceNode::op("*", placeholder(1), SourceNode::var("factor")),
            placeholder(2),
        );
        let graph = GraphBuilder::new(&BuildConfig::default())
            .with_enclosing_frame(crate::ScopeKind::Function, &["factor"])
            .build_expression(&NodeId::root("expr", 0), &SourceNode::unary("&", body))
            .unwrap();
        let root = graph.node(&graph.root).unwrap();
        assert_eq!(root.node_type, NodeType::ShorthandClosure);
        assert_eq!(root.property("arity"), Some(&PropertyValue::Integer(2)));

        let report = graph.closure(&graph.root).unwrap();
        assert_eq!(report.free_names(), vec!["factor"]);
        assert_eq!(
            report.capture("factor").unwrap().frame.as_ref().map(|f| f.kind),
            Some(crate::ScopeKind::Function)
        );
    }

    #[test]
    fn test_placeholder_range() {
        let config = BuildConfig::default().with_max_captures(3);
        let builder = GraphBuilder::new(&config);
        let root = NodeId::root("expr", 0);

        let ok = SourceNode::unary("&", SourceNode::op("+", placeholder(1), placeholder(3)));
        assert!(builder.build_expression(&root, &ok).is_ok());

        // A placeholder with no enclosing shorthand closure
        let stray = SourceNode::op("+", placeholder(1), SourceNode::int(1));
        let err = builder.build_expression(&root, &stray).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidCaptureIndex));

        for index in [0, 4, -1] {
            let bad =
                SourceNode::unary("&", SourceNode::op("+", placeholder(1), placeholder(index)));
            let err = builder.build_expression(&root, &bad).unwrap_err();
            assert_eq!(err.kind(), Some(ErrorKind::InvalidCaptureIndex));
        }
    }
}
