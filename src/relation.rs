//! Relation types - named links between graph nodes
//!
//! Every relation has:
//! - a graph name (`left_operand`, `argument`, `entry`, ...)
//! - an address label used to derive the child id (`left`, `argument`, ...)
//! - an ordering: positional relations keep source order, set-like
//!   relations are stored sorted and de-duplicated

use crate::node_id::NodeId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Relation names emitted by the builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Binary operator, left side
    LeftOperand,
    /// Binary operator, right side
    RightOperand,
    /// Unary operator operand
    Operand,
    /// Call argument, one entry per position
    Argument,
    /// Called function reference
    Callee,
    /// Dynamic receiver of a remote or anonymous call
    Receiver,
    /// List/tuple element
    Element,
    /// Map, struct or keyword entry
    Entry,
    Key,
    Value,
    /// Struct literal/pattern type, distinct from its entries
    ReferencedType,
    /// Map update base (`%{base | k: v}`)
    Base,
    /// Cons tail (`[h | tail]`)
    Tail,
    /// As-pattern structural side
    Inner,
    /// As-pattern alias side
    BoundAs,
    /// Pinned variable read
    Pinned,
    /// Default argument value (`x \\ 1`)
    Default,
    Guard,
    Pattern,
    Parameter,
    Body,
    Clause,
    Statement,
    Condition,
    Then,
    Else,
    Subject,
    Generator,
    Filter,
    Enumerable,
    Into,
    Reduce,
    Segment,
    /// Range bounds
    First,
    Last,
    Step,
    /// Sigil content when it carries interpolation
    Content,
    /// Closure captures
    Captures,
    /// Captured symbol → the pattern node that bound it outside the closure
    BoundBy,
    /// Captured symbol → the variable nodes reading it
    Reference,
}

impl RelationKind {
    /// Get the relation name as it appears in the graph
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::LeftOperand => "left_operand",
            RelationKind::RightOperand => "right_operand",
            RelationKind::Operand => "operand",
            RelationKind::Argument => "argument",
            RelationKind::Callee => "callee",
            RelationKind::Receiver => "receiver",
            RelationKind::Element => "element",
            RelationKind::Entry => "entry",
            RelationKind::Key => "key",
            RelationKind::Value => "value",
            RelationKind::ReferencedType => "referenced_type",
            RelationKind::Base => "base",
            RelationKind::Tail => "tail",
            RelationKind::Inner => "inner",
            RelationKind::BoundAs => "bound_as",
            RelationKind::Pinned => "pinned",
            RelationKind::Default => "default",
            RelationKind::Guard => "guard",
            RelationKind::Pattern => "pattern",
            RelationKind::Parameter => "parameter",
            RelationKind::Body => "body",
            RelationKind::Clause => "clause",
            RelationKind::Statement => "statement",
            RelationKind::Condition => "condition",
            RelationKind::Then => "then",
            RelationKind::Else => "else",
            RelationKind::Subject => "subject",
            RelationKind::Generator => "generator",
            RelationKind::Filter => "filter",
            RelationKind::Enumerable => "enumerable",
            RelationKind::Into => "into",
            RelationKind::Reduce => "reduce",
            RelationKind::Segment => "segment",
            RelationKind::First => "first",
            RelationKind::Last => "last",
            RelationKind::Step => "step",
            RelationKind::Content => "content",
            RelationKind::Captures => "captures",
            RelationKind::BoundBy => "bound_by",
            RelationKind::Reference => "reference",
        }
    }

    /// Label used when deriving a child id through this relation
    pub fn label(&self) -> &'static str {
        match self {
            RelationKind::LeftOperand => "left",
            RelationKind::RightOperand => "right",
            RelationKind::ReferencedType => "type",
            RelationKind::Captures => "capture",
            other => other.as_str(),
        }
    }

    /// Whether targets keep source order (positional) rather than set order
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            RelationKind::Argument
                | RelationKind::Element
                | RelationKind::Entry
                | RelationKind::Parameter
                | RelationKind::Clause
                | RelationKind::Statement
                | RelationKind::Generator
                | RelationKind::Filter
                | RelationKind::Segment
                | RelationKind::Else
                | RelationKind::Captures
                | RelationKind::Reference
        )
    }

    /// Whether this relation links a node to one of its structural children
    pub fn is_structural(&self) -> bool {
        !matches!(self, RelationKind::BoundBy | RelationKind::Reference)
    }
}

impl FromStr for RelationKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| crate::Error::InvalidNodeId(format!("Unknown relation kind: {}", s)))
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Targets of one named relation on a node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Relation {
    /// Related node ids: source order when `ordered`, sorted otherwise
    pub targets: Vec<NodeId>,
    pub ordered: bool,
}

impl Relation {
    /// Create an empty relation of the given ordering
    pub fn new(ordered: bool) -> Self {
        Self {
            targets: Vec::new(),
            ordered,
        }
    }

    /// Add a target, keeping set relations sorted and free of duplicates
    pub fn push(&mut self, target: NodeId) {
        if self.ordered {
            self.targets.push(target);
        } else if let Err(pos) = self.targets.binary_search(&target) {
            self.targets.insert(pos, target);
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
