//! Pattern decomposer
//!
//! Builds the node subgraph of a pattern and accumulates the symbols it
//! binds. Wildcards and pins bind nothing; a name may be bound only once per
//! pattern position (a whole clause head counts as one position).
//!
//! Bindings are collected, not brought into scope: the caller decides which
//! frame receives them once the whole pattern has been decomposed.

use super::context::BuildContext;
use super::expression::{alias_name, build_expr};
use super::literal::{build_literal, build_segments};
use crate::node::{AuxTag, GraphNode, NodeType, PropertyValue};
use crate::node_id::NodeId;
use crate::relation::RelationKind;
use crate::scope::Binding;
use crate::shape::{PatternShape, map_entry};
use crate::source::SourceNode;
use crate::{Error, Result};

/// Bindings of one pattern position, in source order
#[derive(Debug, Default)]
pub(crate) struct PatternBindings {
    bindings: Vec<Binding>,
}

impl PatternBindings {
    /// Add a binding, rejecting a name already bound in this position
    pub fn add(&mut self, binding: Binding, at: &NodeId) -> Result<()> {
        if self.contains(&binding.name) {
            return Err(Error::MalformedPattern {
                at: at.clone(),
                reason: format!("variable {} is bound more than once", binding.name),
            });
        }
        self.bindings.push(binding);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn into_vec(self) -> Vec<Binding> {
        self.bindings
    }
}

fn pattern_node(id: &NodeId, node_type: NodeType, source: &SourceNode) -> GraphNode {
    GraphNode::new(id.clone(), node_type)
        .with_tags(&[AuxTag::Pattern])
        .with_position(source.position())
}

fn malformed(at: &NodeId, reason: impl Into<String>) -> Error {
    Error::MalformedPattern {
        at: at.clone(),
        reason: reason.into(),
    }
}

/// Decompose a pattern at `id`, adding what it binds to `bindings`
pub(crate) fn build_pattern(
    ctx: &mut BuildContext<'_>,
    id: &NodeId,
    source: &SourceNode,
    depth: usize,
    bindings: &mut PatternBindings,
) -> Result<()> {
    ctx.guard(id, depth)?;
    let position = source.position();

    let node = match PatternShape::decode(source) {
        PatternShape::Literal(shape) => return build_literal(ctx, id, source, shape, depth),
        PatternShape::Value => return build_expr(ctx, id, source, depth),
        PatternShape::Negated(number) => {
            let (node_type, value) = match number {
                SourceNode::Integer { value } => {
                    (NodeType::IntegerLiteral, PropertyValue::from(value.saturating_neg()))
                }
                SourceNode::Float { value } => {
                    (NodeType::FloatLiteral, PropertyValue::from(-*value))
                }
                _ => return Err(malformed(id, "only numbers can be negated in a pattern")),
            };
            GraphNode::new(id.clone(), node_type)
                .with_tags(&[AuxTag::Literal, AuxTag::Pattern])
                .with_property("value", value)
                .with_position(position)
        }
        PatternShape::Variable(name) => {
            bindings.add(Binding::new(name, Some(id.clone()), position), id)?;
            pattern_node(id, NodeType::VariablePattern, source)
                .with_tags(&[AuxTag::Binding])
                .with_property("name", name)
                .with_property("ignored", name.starts_with('_'))
        }
        PatternShape::Wildcard => pattern_node(id, NodeType::WildcardPattern, source),
        PatternShape::Pin(pinned) => {
            let Some(name) = pinned.var_name() else {
                return Err(malformed(id, "only variables can be pinned"));
            };
            let pinned_id = id.child(RelationKind::Pinned.label());
            build_expr(ctx, &pinned_id, pinned, depth + 1)?;
            pattern_node(id, NodeType::PinPattern, source)
                .with_property("name", name)
                .with_relation(RelationKind::Pinned, pinned_id)
        }
        PatternShape::Tuple(items) => {
            let mut node = pattern_node(id, NodeType::TuplePattern, source);
            let elements: Vec<&SourceNode> = items.iter().collect();
            build_elements(ctx, &mut node, &elements, depth, bindings)?;
            node
        }
        PatternShape::List { elements, tail } => {
            let mut node = pattern_node(id, NodeType::ListPattern, source);
            build_elements(ctx, &mut node, &elements, depth, bindings)?;
            if let Some(tail) = tail {
                let tail_id = id.child(RelationKind::Tail.label());
                build_pattern(ctx, &tail_id, tail, depth + 1, bindings)?;
                node.relate(RelationKind::Tail, tail_id);
            }
            node
        }
        PatternShape::Map(entries) => {
            let mut node = pattern_node(id, NodeType::MapPattern, source);
            build_entries(ctx, &mut node, entries, depth, bindings)?;
            node
        }
        PatternShape::Struct { type_ref, fields } => {
            let mut node = pattern_node(id, NodeType::StructPattern, source);
            let type_id = id.child(RelationKind::ReferencedType.label());
            build_pattern(ctx, &type_id, type_ref, depth + 1, bindings)?;
            node.relate(RelationKind::ReferencedType, type_id);
            if let Some(name) = type_ref.args_of("__aliases__").and_then(alias_name) {
                node.set_property("type_name", name);
            }
            build_entries(ctx, &mut node, fields, depth, bindings)?;
            node
        }
        PatternShape::Binary(segments) => {
            let mut node = pattern_node(id, NodeType::BinaryPattern, source);
            let size_vars =
                build_segments(ctx, &mut node, segments, depth, |ctx, value_id, value, depth| {
                    build_pattern(ctx, value_id, value, depth, bindings)
                })?;
            // A size bound earlier in the same pattern is not a read of an outer value
            for (name, at) in size_vars {
                if !bindings.contains(&name) {
                    ctx.read(&name, &at, position);
                }
            }
            node
        }
        PatternShape::As { left, right } => {
            let (inner, alias) = if right.var_name().is_some() {
                (left, right)
            } else {
                (right, left)
            };
            let inner_id = id.child(RelationKind::Inner.label());
            let alias_id = id.child(RelationKind::BoundAs.label());
            build_pattern(ctx, &inner_id, inner, depth + 1, bindings)?;
            build_pattern(ctx, &alias_id, alias, depth + 1, bindings)?;
            pattern_node(id, NodeType::AsPattern, source)
                .with_relation(RelationKind::Inner, inner_id)
                .with_relation(RelationKind::BoundAs, alias_id)
        }
        PatternShape::StringPrefix { prefix, rest } => {
            let SourceNode::Text { value: prefix } = prefix else {
                return Err(malformed(
                    id,
                    "the left side of <> in a pattern must be a string literal",
                ));
            };
            let rest_id = id.child(RelationKind::Tail.label());
            build_pattern(ctx, &rest_id, rest, depth + 1, bindings)?;
            pattern_node(id, NodeType::StringPrefixPattern, source)
                .with_property("prefix", prefix.as_str())
                .with_relation(RelationKind::Tail, rest_id)
        }
        PatternShape::Default { pattern, value } => {
            let pattern_id = id.child(RelationKind::Pattern.label());
            let default_id = id.child(RelationKind::Default.label());
            build_pattern(ctx, &pattern_id, pattern, depth + 1, bindings)?;
            build_expr(ctx, &default_id, value, depth + 1)?;
            pattern_node(id, NodeType::DefaultArgument, source)
                .with_relation(RelationKind::Pattern, pattern_id)
                .with_relation(RelationKind::Default, default_id)
        }
        PatternShape::Unknown(tag) => {
            return Err(malformed(id, format!("{} is not a valid pattern", tag)));
        }
    };

    ctx.emit(node);
    Ok(())
}

fn build_elements(
    ctx: &mut BuildContext<'_>,
    node: &mut GraphNode,
    elements: &[&SourceNode],
    depth: usize,
    bindings: &mut PatternBindings,
) -> Result<()> {
    ctx.check_fanout(&node.id, "pattern element", elements.len())?;
    node.declare_relation(RelationKind::Element);
    for (i, element) in elements.iter().enumerate() {
        let element_id = node.id.indexed(RelationKind::Element.label(), i);
        build_pattern(ctx, &element_id, element, depth + 1, bindings)?;
        node.relate(RelationKind::Element, element_id);
    }
    Ok(())
}

/// Map and struct pattern entries. Keys are matched by value and may not
/// bind; values are full patterns.
fn build_entries(
    ctx: &mut BuildContext<'_>,
    node: &mut GraphNode,
    entries: &[SourceNode],
    depth: usize,
    bindings: &mut PatternBindings,
) -> Result<()> {
    ctx.check_fanout(&node.id, "pattern entry", entries.len())?;
    node.declare_relation(RelationKind::Entry);
    for (i, entry) in entries.iter().enumerate() {
        let entry_id = node.id.indexed(RelationKind::Entry.label(), i);
        let Some((key, value)) = map_entry(entry) else {
            return Err(malformed(&entry_id, "map pattern entries must be key/value pairs"));
        };

        let key_id = entry_id.child(RelationKind::Key.label());
        let value_id = entry_id.child(RelationKind::Value.label());
        let mut key_bindings = PatternBindings::default();
        build_pattern(ctx, &key_id, key, depth + 1, &mut key_bindings)?;
        if !key_bindings.is_empty() {
            return Err(malformed(&key_id, "map keys cannot bind variables"));
        }
        build_pattern(ctx, &value_id, value, depth + 1, bindings)?;

        ctx.emit(
            GraphNode::new(entry_id.clone(), NodeType::MapEntry)
                .with_tags(&[AuxTag::Composite, AuxTag::Pattern])
                .with_relation(RelationKind::Key, key_id)
                .with_relation(RelationKind::Value, value_id)
                .with_position(entry.position()),
        );
        node.relate(RelationKind::Entry, entry_id);
    }
    Ok(())
}
