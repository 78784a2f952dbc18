//! Graph node types - the unit of output
//!
//! Every node carries exactly one primary [`NodeType`], any number of
//! additive [`AuxTag`]s, a scalar property map and named relations.
//! Maps are ordered so a node serializes identically on every build.

use crate::node_id::NodeId;
use crate::relation::{Relation, RelationKind};
use crate::source::Position;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Primary node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    // Literals
    IntegerLiteral,
    FloatLiteral,
    StringLiteral,
    AtomLiteral,
    BooleanLiteral,
    NilLiteral,
    ListLiteral,
    KeywordList,
    TupleLiteral,
    MapLiteral,
    StructLiteral,
    RangeLiteral,
    SigilLiteral,
    BinaryLiteral,
    MapEntry,
    BinarySegment,

    // Operators
    ArithmeticOperator,
    ComparisonOperator,
    LogicalOperator,
    PipeOperator,
    MatchOperator,
    ListOperator,
    ConcatOperator,
    MembershipOperator,

    // Names
    Variable,
    ModuleAttribute,
    Alias,
    SpecialForm,

    // Calls
    LocalCall,
    RemoteCall,
    AnonymousCall,
    FunctionReference,

    // Control flow
    Block,
    IfExpression,
    UnlessExpression,
    CaseExpression,
    CaseClause,
    CondExpression,
    CondClause,
    WithExpression,
    Comprehension,
    Generator,

    // Functions and closures
    FunctionDefinition,
    FunctionClause,
    AnonymousFunction,
    AnonymousFunctionClause,
    ShorthandClosure,
    CapturePlaceholder,
    FunctionCapture,
    CapturedVariable,

    // Patterns
    VariablePattern,
    WildcardPattern,
    PinPattern,
    TuplePattern,
    ListPattern,
    MapPattern,
    StructPattern,
    BinaryPattern,
    AsPattern,
    StringPrefixPattern,
    DefaultArgument,

    /// Placeholder for a shape no builder recognizes
    UnknownExpression,
}

impl NodeType {
    /// Get the string representation of the node type
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::IntegerLiteral => "IntegerLiteral",
            NodeType::FloatLiteral => "FloatLiteral",
            NodeType::StringLiteral => "StringLiteral",
            NodeType::AtomLiteral => "AtomLiteral",
            NodeType::BooleanLiteral => "BooleanLiteral",
            NodeType::NilLiteral => "NilLiteral",
            NodeType::ListLiteral => "ListLiteral",
            NodeType::KeywordList => "KeywordList",
            NodeType::TupleLiteral => "TupleLiteral",
            NodeType::MapLiteral => "MapLiteral",
            NodeType::StructLiteral => "StructLiteral",
            NodeType::RangeLiteral => "RangeLiteral",
            NodeType::SigilLiteral => "SigilLiteral",
            NodeType::BinaryLiteral => "BinaryLiteral",
            NodeType::MapEntry => "MapEntry",
            NodeType::BinarySegment => "BinarySegment",
            NodeType::ArithmeticOperator => "ArithmeticOperator",
            NodeType::ComparisonOperator => "ComparisonOperator",
            NodeType::LogicalOperator => "LogicalOperator",
            NodeType::PipeOperator => "PipeOperator",
            NodeType::MatchOperator => "MatchOperator",
            NodeType::ListOperator => "ListOperator",
            NodeType::ConcatOperator => "ConcatOperator",
            NodeType::MembershipOperator => "MembershipOperator",
            NodeType::Variable => "Variable",
            NodeType::ModuleAttribute => "ModuleAttribute",
            NodeType::Alias => "Alias",
            NodeType::SpecialForm => "SpecialForm",
            NodeType::LocalCall => "LocalCall",
            NodeType::RemoteCall => "RemoteCall",
            NodeType::AnonymousCall => "AnonymousCall",
            NodeType::FunctionReference => "FunctionReference",
            NodeType::Block => "Block",
            NodeType::IfExpression => "IfExpression",
            NodeType::UnlessExpression => "UnlessExpression",
            NodeType::CaseExpression => "CaseExpression",
            NodeType::CaseClause => "CaseClause",
            NodeType::CondExpression => "CondExpression",
            NodeType::CondClause => "CondClause",
            NodeType::WithExpression => "WithExpression",
            NodeType::Comprehension => "Comprehension",
            NodeType::Generator => "Generator",
            NodeType::FunctionDefinition => "FunctionDefinition",
            NodeType::FunctionClause => "FunctionClause",
            NodeType::AnonymousFunction => "AnonymousFunction",
            NodeType::AnonymousFunctionClause => "AnonymousFunctionClause",
            NodeType::ShorthandClosure => "ShorthandClosure",
            NodeType::CapturePlaceholder => "CapturePlaceholder",
            NodeType::FunctionCapture => "FunctionCapture",
            NodeType::CapturedVariable => "CapturedVariable",
            NodeType::VariablePattern => "VariablePattern",
            NodeType::WildcardPattern => "WildcardPattern",
            NodeType::PinPattern => "PinPattern",
            NodeType::TuplePattern => "TuplePattern",
            NodeType::ListPattern => "ListPattern",
            NodeType::MapPattern => "MapPattern",
            NodeType::StructPattern => "StructPattern",
            NodeType::BinaryPattern => "BinaryPattern",
            NodeType::AsPattern => "AsPattern",
            NodeType::StringPrefixPattern => "StringPrefixPattern",
            NodeType::DefaultArgument => "DefaultArgument",
            NodeType::UnknownExpression => "UnknownExpression",
        }
    }

    /// Whether this is one of the operator category types
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            NodeType::ArithmeticOperator
                | NodeType::ComparisonOperator
                | NodeType::LogicalOperator
                | NodeType::PipeOperator
                | NodeType::MatchOperator
                | NodeType::ListOperator
                | NodeType::ConcatOperator
                | NodeType::MembershipOperator
        )
    }
}

impl FromStr for NodeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| Error::InvalidNodeId(format!("Unknown node type: {}", s)))
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Additive classification tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxTag {
    Expression,
    Literal,
    Composite,
    Operator,
    BinaryOperator,
    UnaryOperator,
    Call,
    ControlFlow,
    Closure,
    Pattern,
    /// The node introduces a binding
    Binding,
}

/// Scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<usize> for PropertyValue {
    fn from(value: usize) -> Self {
        PropertyValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Integer(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

/// A node in the semantic graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Path-derived identifier
    pub id: NodeId,
    /// The one primary type
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Additive tags
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<AuxTag>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<RelationKind, Relation>,
}

impl GraphNode {
    /// Create a node with no tags, properties or relations
    pub fn new(id: NodeId, node_type: NodeType) -> Self {
        Self {
            id,
            node_type,
            tags: BTreeSet::new(),
            properties: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Add auxiliary tags
    pub fn with_tags(mut self, tags: &[AuxTag]) -> Self {
        self.tags.extend(tags.iter().copied());
        self
    }

    /// Set a property
    pub fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Record `line`/`column` properties when a position is known
    pub fn with_position(mut self, position: Option<Position>) -> Self {
        if let Some(pos) = position {
            self.set_property("line", pos.line);
            if let Some(column) = pos.column {
                self.set_property("column", column);
            }
        }
        self
    }

    /// Link to another node
    pub fn with_relation(mut self, kind: RelationKind, target: NodeId) -> Self {
        self.relate(kind, target);
        self
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<PropertyValue>) {
        self.properties.insert(name.to_string(), value.into());
    }

    /// Add a target to a relation, creating it with the kind's ordering
    pub fn relate(&mut self, kind: RelationKind, target: NodeId) {
        self.relations
            .entry(kind)
            .or_insert_with(|| Relation::new(kind.is_ordered()))
            .push(target);
    }

    /// Ensure a relation exists even with no targets (empty collections)
    pub fn declare_relation(&mut self, kind: RelationKind) {
        self.relations
            .entry(kind)
            .or_insert_with(|| Relation::new(kind.is_ordered()));
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Shortcut for a text property
    pub fn text(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(PropertyValue::as_text)
    }

    /// Targets of a relation (empty when absent)
    pub fn related(&self, kind: RelationKind) -> &[NodeId] {
        self.relations
            .get(&kind)
            .map(|r| r.targets.as_slice())
            .unwrap_or(&[])
    }

    /// First target of a relation
    pub fn related_one(&self, kind: RelationKind) -> Option<&NodeId> {
        self.related(kind).first()
    }

    pub fn has_tag(&self, tag: AuxTag) -> bool {
        self.tags.contains(&tag)
    }
}
