//! Literal builder - scalars, collections, structs, ranges, sigils, binaries
//!
//! Scalar literals become a single node holding the evaluated value.
//! Composite literals build one child per element or entry through the
//! expression builder and link them with ordered relations. An empty
//! collection still gets its node and an empty relation.

use super::context::BuildContext;
use super::expression::{alias_name, build_expr};
use crate::node::{AuxTag, GraphNode, NodeType, PropertyValue};
use crate::node_id::NodeId;
use crate::relation::RelationKind;
use crate::shape::{LiteralShape, map_entry, split_cons};
use crate::source::SourceNode;
use crate::Result;

const SCALAR: &[AuxTag] = &[AuxTag::Expression, AuxTag::Literal];
const COMPOSITE: &[AuxTag] = &[AuxTag::Expression, AuxTag::Literal, AuxTag::Composite];

/// Build a literal-shaped node. The caller has already checked `depth`.
pub(crate) fn build_literal(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    shape: LiteralShape<'_>,
    depth: usize,
) -> Result<()> {
    let position = source.position();
    let node = match shape {
        LiteralShape::Integer(value) => scalar(id, NodeType::IntegerLiteral, value),
        LiteralShape::Float(value) => scalar(id, NodeType::FloatLiteral, value),
        LiteralShape::Text(value) => scalar(id, NodeType::StringLiteral, value),
        LiteralShape::Boolean(value) => scalar(id, NodeType::BooleanLiteral, value),
        LiteralShape::Nil => GraphNode::new(id.clone(), NodeType::NilLiteral).with_tags(SCALAR),
        LiteralShape::Atom(value) => scalar(id, NodeType::AtomLiteral, value),
        LiteralShape::List(items) => {
            let (elements, tail) = split_cons(items);
            let mut node = composite(id, NodeType::ListLiteral);
            build_elements(ctx, &mut node, &elements, depth)?;
            if let Some(tail) = tail {
                let tail_id = id.child(RelationKind::Tail.label());
                build_expr(ctx, &tail_id, tail, depth + 1)?;
                node.relate(RelationKind::Tail, tail_id);
            }
            node
        }
        LiteralShape::KeywordList(items) => {
            let mut node = composite(id, NodeType::KeywordList);
            build_entries(ctx, &mut node, items, depth)?;
            node
        }
        LiteralShape::Tuple(items) => {
            let mut node = composite(id, NodeType::TupleLiteral);
            let elements: Vec<&SourceNode> = items.iter().collect();
            build_elements(ctx, &mut node, &elements, depth)?;
            node
        }
        LiteralShape::Map(entries) => {
            let mut node = composite(id, NodeType::MapLiteral);
            build_map_body(ctx, &mut node, entries, depth)?;
            node
        }
        LiteralShape::Struct { type_ref, fields } => {
            let mut node = composite(id, NodeType::StructLiteral);
            let type_id = id.child(RelationKind::ReferencedType.label());
            build_expr(ctx, &type_id, type_ref, depth + 1)?;
            node.relate(RelationKind::ReferencedType, type_id);
            if let Some(name) = type_ref.args_of("__aliases__").and_then(alias_name) {
                node.set_property("type_name", name);
            }
            build_map_body(ctx, &mut node, fields.form_args().unwrap_or_default(), depth)?;
            node
        }
        LiteralShape::Range { first, last, step } => {
            let mut node = composite(id, NodeType::RangeLiteral);
            let bounds = [
                (RelationKind::First, Some(first)),
                (RelationKind::Last, Some(last)),
                (RelationKind::Step, step),
            ];
            for (kind, bound) in bounds {
                if let Some(bound) = bound {
                    let bound_id = id.child(kind.label());
                    build_expr(ctx, &bound_id, bound, depth + 1)?;
                    node.relate(kind, bound_id);
                }
            }
            node
        }
        LiteralShape::Sigil {
            letter,
            content,
            modifiers,
        } => {
            let mut node = GraphNode::new(id.clone(), NodeType::SigilLiteral)
                .with_tags(SCALAR)
                .with_property("letter", letter)
                .with_property("modifiers", decode_modifiers(modifiers));
            match plain_content(content) {
                Some(text) => node.set_property("content", text),
                None => {
                    let content_id = id.child(RelationKind::Content.label());
                    build_expr(ctx, &content_id, content, depth + 1)?;
                    node.relate(RelationKind::Content, content_id);
                }
            }
            node
        }
        LiteralShape::Binary(segments) => {
            let mut node = composite(id, NodeType::BinaryLiteral);
            let size_vars =
                build_segments(ctx, &mut node, segments, depth, |ctx, value_id, value, depth| {
                    build_expr(ctx, value_id, value, depth)
                })?;
            for (name, at) in size_vars {
                ctx.read(&name, &at, position);
            }
            node
        }
    };
    ctx.emit(node.with_position(position));
    Ok(())
}

fn scalar(id: &NodeId, node_type: NodeType, value: impl Into<PropertyValue>) -> GraphNode {
    GraphNode::new(id.clone(), node_type)
        .with_tags(SCALAR)
        .with_property("value", value)
}

fn composite(id: &NodeId, node_type: NodeType) -> GraphNode {
    GraphNode::new(id.clone(), node_type).with_tags(COMPOSITE)
}

fn build_elements(
    ctx: &mut BuildContext<'_>,
    node: &mut GraphNode,
    elements: &[&SourceNode],
    depth: usize,
) -> Result<()> {
    ctx.check_fanout(&node.id, "element", elements.len())?;
    node.declare_relation(RelationKind::Element);
    for (i, element) in elements.iter().enumerate() {
        let element_id = node.id.indexed(RelationKind::Element.label(), i);
        build_expr(ctx, &element_id, element, depth + 1)?;
        node.relate(RelationKind::Element, element_id);
    }
    node.set_property("size", elements.len());
    Ok(())
}

/// Body of a map or struct: plain entries or an update `%{base | k: v}`
fn build_map_body(
    ctx: &mut BuildContext<'_>,
    node: &mut GraphNode,
    entries: &[SourceNode],
    depth: usize,
) -> Result<()> {
    let update = match entries {
        [only] => only.args_of("|"),
        _ => None,
    };
    match update {
        Some([base, updates]) => {
            let base_id = node.id.child(RelationKind::Base.label());
            build_expr(ctx, &base_id, base, depth + 1)?;
            node.relate(RelationKind::Base, base_id);
            match updates.as_list() {
                Some(items) => build_entries(ctx, node, items, depth),
                None => build_entries(ctx, node, std::slice::from_ref(updates), depth),
            }
        }
        _ => build_entries(ctx, node, entries, depth),
    }
}

/// Ordered `entry` children, one `MapEntry` per (key, value) pair
fn build_entries(
    ctx: &mut BuildContext<'_>,
    node: &mut GraphNode,
    entries: &[SourceNode],
    depth: usize,
) -> Result<()> {
    ctx.check_fanout(&node.id, "entry", entries.len())?;
    node.declare_relation(RelationKind::Entry);
    for (i, entry) in entries.iter().enumerate() {
        let entry_id = node.id.indexed(RelationKind::Entry.label(), i);
        match map_entry(entry) {
            Some((key, value)) => {
                let key_id = entry_id.child(RelationKind::Key.label());
                let value_id = entry_id.child(RelationKind::Value.label());
                build_expr(ctx, &key_id, key, depth + 1)?;
                build_expr(ctx, &value_id, value, depth + 1)?;
                ctx.emit(
                    GraphNode::new(entry_id.clone(), NodeType::MapEntry)
                        .with_tags(&[AuxTag::Composite])
                        .with_relation(RelationKind::Key, key_id)
                        .with_relation(RelationKind::Value, value_id)
                        .with_position(entry.position()),
                );
            }
            None => ctx.unknown(&entry_id, entry.tag().unwrap_or("entry"), entry.position()),
        }
        node.relate(RelationKind::Entry, entry_id);
    }
    node.set_property("size", entries.len());
    Ok(())
}

/// Ordered `BinarySegment` children. `build_value` builds each segment's
/// value (as an expression or as a pattern). Returns the variables used as
/// segment sizes, with the segment that uses them.
pub(crate) fn build_segments<F>(
    ctx: &mut BuildContext<'_>,
    node: &mut GraphNode,
    segments: &[SourceNode],
    depth: usize,
    mut build_value: F,
) -> Result<Vec<(String, NodeId)>>
where
    F: FnMut(&mut BuildContext<'_>, &NodeId, &SourceNode, usize) -> Result<()>,
{
    ctx.check_fanout(&node.id, "segment", segments.len())?;
    node.declare_relation(RelationKind::Segment);
    let mut size_vars = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        let segment_id = node.id.indexed(RelationKind::Segment.label(), i);
        let (value, spec) = match segment.args_of("::") {
            Some([value, spec]) => (value, Some(spec)),
            _ => (segment, None),
        };

        let value_id = segment_id.child(RelationKind::Value.label());
        build_value(ctx, &value_id, value, depth + 1)?;

        let mut segment_node = GraphNode::new(segment_id.clone(), NodeType::BinarySegment)
            .with_relation(RelationKind::Value, value_id)
            .with_position(segment.position());
        if let Some(spec) = spec {
            let mut size_var = None;
            decode_segment_spec(
                ctx,
                &segment_id,
                spec,
                &mut segment_node,
                &mut size_var,
                depth + 1,
            )?;
            if let Some(name) = size_var {
                size_vars.push((name, segment_id.clone()));
            }
        }
        ctx.emit(segment_node);
        node.relate(RelationKind::Segment, segment_id);
    }
    Ok(size_vars)
}

/// Decode a segment type spec such as `size(8)-unit(4)-big-signed-integer`
/// into properties of the segment node. The `-` chain is walked with an
/// explicit stack; each level counts against the depth ceiling.
fn decode_segment_spec(
    ctx: &BuildContext<'_>,
    at: &NodeId,
    spec: &SourceNode,
    segment: &mut GraphNode,
    size_var: &mut Option<String>,
    depth: usize,
) -> Result<()> {
    let mut pending = vec![(spec, depth)];
    while let Some((spec, depth)) = pending.pop() {
        ctx.guard(at, depth)?;
        match spec.args_of("-") {
            Some([left, right]) => {
                pending.push((right, depth + 1));
                pending.push((left, depth + 1));
            }
            _ => decode_spec_word(spec, segment, size_var),
        }
    }
    Ok(())
}

fn decode_spec_word(spec: &SourceNode, segment: &mut GraphNode, size_var: &mut Option<String>) {
    match spec {
        SourceNode::Integer { value } => segment.set_property("size", *value),
        SourceNode::Form { tag, args, .. } => match (tag.as_str(), args.as_deref()) {
            ("size", Some([SourceNode::Integer { value }])) => segment.set_property("size", *value),
            ("size", Some([size])) => match size.var_name() {
                Some(name) => {
                    segment.set_property("size", name);
                    *size_var = Some(name.to_string());
                }
                None => segment.set_property("size", "expression"),
            },
            ("unit", Some([SourceNode::Integer { value }])) => segment.set_property("unit", *value),
            (
                "*",
                Some([SourceNode::Integer { value: size }, SourceNode::Integer { value: unit }]),
            ) => {
                segment.set_property("size", *size);
                segment.set_property("unit", *unit);
            }
            (word, None | Some([])) => {
                let property = match word {
                    "integer" | "float" | "bits" | "bitstring" | "binary" | "bytes" | "utf8"
                    | "utf16" | "utf32" => "type",
                    "signed" | "unsigned" => "signedness",
                    "big" | "little" | "native" => "endianness",
                    _ => "modifier",
                };
                segment.set_property(property, word);
            }
            (other, _) => segment.set_property("modifier", other),
        },
        _ => {}
    }
}

/// Sigil modifiers arrive as a list of character codes
pub(crate) fn decode_modifiers(modifiers: &SourceNode) -> String {
    match modifiers {
        SourceNode::Text { value } => value.clone(),
        other => other
            .as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(|code| match code {
                SourceNode::Integer { value } => {
                    u32::try_from(*value).ok().and_then(char::from_u32)
                }
                _ => None,
            })
            .collect(),
    }
}

/// Sigil content without interpolation, as one string
fn plain_content(content: &SourceNode) -> Option<String> {
    if let SourceNode::Text { value } = content {
        return Some(value.clone());
    }
    content
        .args_of("<<>>")?
        .iter()
        .map(|part| match part {
            SourceNode::Text { value } => Some(value.as_str()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::BuildConfig;
    use pretty_assertions::assert_eq;

    fn build(node: &SourceNode) -> crate::builder::BuiltGraph {
        GraphBuilder::new(&BuildConfig::default())
            .build_expression(&NodeId::root("expr", 0), node)
            .unwrap()
    }

    #[test]
    fn test_scalars_hold_values() {
        let graph = build(&SourceNode::float(2.5));
        let root = graph.node(&graph.root).unwrap();
        assert_eq!(root.node_type, NodeType::FloatLiteral);
        assert_eq!(root.property("value"), Some(&PropertyValue::Float(2.5)));

        let graph = build(&SourceNode::atom("false"));
        let root = graph.node(&graph.root).unwrap();
        assert_eq!(root.node_type, NodeType::BooleanLiteral);
        assert_eq!(root.property("value"), Some(&PropertyValue::Boolean(false)));
    }

    #[test]
    fn test_empty_collections_still_produce_nodes() {
        for (source, node_type, relation) in [
            (SourceNode::list(vec![]), NodeType::ListLiteral, RelationKind::Element),
            (SourceNode::tuple(vec![]), NodeType::TupleLiteral, RelationKind::Element),
            (SourceNode::form("%{}", vec![]), NodeType::MapLiteral, RelationKind::Entry),
        ] {
            let graph = build(&source);
            assert_eq!(graph.nodes.len(), 1);
            let root = graph.node(&graph.root).unwrap();
            assert_eq!(root.node_type, node_type);
            assert!(root.relations.contains_key(&relation));
            assert!(root.related(relation).is_empty());
        }
    }

    #[test]
    fn test_struct_literal_references_type() {
        let source = SourceNode::form(
            "%",
            vec![
                SourceNode::alias(&["MyApp", "User"]),
                SourceNode::form(
                    "%{}",
                    vec![SourceNode::tuple(vec![
                        SourceNode::atom("name"),
                        SourceNode::text("ada"),
                    ])],
                ),
            ],
        );
        let graph = build(&source);
        let root = graph.node(&graph.root).unwrap();
        assert_eq!(root.node_type, NodeType::StructLiteral);
        assert_eq!(root.text("type_name"), Some("MyApp.User"));

        let type_id = root.related_one(RelationKind::ReferencedType).unwrap();
        assert_eq!(graph.node(type_id).unwrap().node_type, NodeType::Alias);
        assert_eq!(root.related(RelationKind::Entry).len(), 1);
        assert!(!root.related(RelationKind::Entry).contains(type_id));
    }

    #[test]
    fn test_map_update_has_base() {
        let source = SourceNode::form(
            "%{}",
            vec![SourceNode::op(
                "|",
                SourceNode::var("state"),
                SourceNode::keywords(vec![("count", SourceNode::int(0))]),
            )],
        );
        let graph = build(&source);
        let root = graph.node(&graph.root).unwrap();
        let base = graph.node(root.related_one(RelationKind::Base).unwrap()).unwrap();
        assert_eq!(base.node_type, NodeType::Variable);
        assert_eq!(root.related(RelationKind::Entry).len(), 1);
    }

    #[test]
    fn test_sigil_modifiers_are_decoded() {
        let source = SourceNode::form(
            "sigil_r",
            vec![
                SourceNode::form("<<>>", vec![SourceNode::text("^ab+$")]),
                SourceNode::list(vec![SourceNode::int(105), SourceNode::int(117)]),
            ],
        );
        let graph = build(&source);
        let root = graph.node(&graph.root).unwrap();
        assert_eq!(root.node_type, NodeType::SigilLiteral);
        assert_eq!(root.text("modifiers"), Some("iu"));
        assert_eq!(root.text("content"), Some("^ab+$"));
        assert_eq!(root.text("letter"), Some("r"));
    }

    #[test]
    fn test_range_with_step() {
        let source = SourceNode::form(
            "..//",
            vec![SourceNode::int(1), SourceNode::int(10), SourceNode::int(2)],
        );
        let graph = build(&source);
        let root = graph.node(&graph.root).unwrap();
        assert_eq!(root.node_type, NodeType::RangeLiteral);
        let step = graph.node(root.related_one(RelationKind::Step).unwrap()).unwrap();
        assert_eq!(step.property("value"), Some(&PropertyValue::Integer(2)));
    }

    #[test]
    fn test_binary_segment_spec() {
        let spec = SourceNode::op(
            "-",
            SourceNode::op("-", SourceNode::var("big"), SourceNode::var("unsigned")),
            SourceNode::form("size", vec![SourceNode::int(16)]),
        );
        let source =
            SourceNode::form("<<>>", vec![SourceNode::op("::", SourceNode::int(513), spec)]);
        let graph = build(&source);
        let segment = graph.node(&graph.root.indexed("segment", 0)).unwrap();
        assert_eq!(segment.node_type, NodeType::BinarySegment);
        assert_eq!(segment.text("endianness"), Some("big"));
        assert_eq!(segment.text("signedness"), Some("unsigned"));
        assert_eq!(segment.property("size"), Some(&PropertyValue::Integer(16)));
    }

    #[test]
    fn test_segment_spec_chain_is_depth_bounded() {
        // <<1 :: big-big-...-big>> with a 40 word chain
        let mut spec = SourceNode::var("big");
        for _ in 0..40 {
            spec = SourceNode::op("-", spec, SourceNode::var("big"));
        }
        let source = SourceNode::form("<<>>", vec![SourceNode::op("::", SourceNode::int(1), spec)]);
        let root = NodeId::root("expr", 0);

        let err = GraphBuilder::new(&BuildConfig::default().with_max_depth(16))
            .build_expression(&root, &source)
            .unwrap_err();
        assert_eq!(err.kind(), Some(crate::ErrorKind::DepthExceeded));
        assert_eq!(err.construct, root);

        let graph = GraphBuilder::new(&BuildConfig::default().with_max_depth(64))
            .build_expression(&root, &source)
            .unwrap();
        let segment = graph.node(&root.indexed("segment", 0)).unwrap();
        assert_eq!(segment.text("endianness"), Some("big"));
    }

    #[test]
    fn test_fanout_ceiling() {
        let config = BuildConfig::default().with_max_fanout(2);
        let source =
            SourceNode::list(vec![SourceNode::int(1), SourceNode::int(2), SourceNode::int(3)]);
        let err = GraphBuilder::new(&config)
            .build_expression(&NodeId::root("expr", 0), &source)
            .unwrap_err();
        assert_eq!(err.kind(), Some(crate::ErrorKind::SizeExceeded));
    }
}
