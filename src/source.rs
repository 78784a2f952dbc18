//! Source tree - the tagged syntax tree handed over by the upstream parser
//!
//! The tree follows the usual tagged-form conventions:
//! - scalars are literals; `true`, `false` and `nil` are atoms
//! - `Form { tag, args: None }` is a variable reference
//! - `Form { tag, args: Some(..) }` is an operator, special form or local call
//! - `Call { target, args }` is a call whose head is itself an expression
//!   (`Mod.fun(..)`, `fun.(..)`)
//! - keyword lists are lists of 2-tuples with atom keys; `do`/`else` blocks
//!   arrive as keyword arguments; clauses are `->` forms; guards are `when`

use crate::Result;
use serde::{Deserialize, Serialize};

/// Source position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: Option<u32>,
}

impl Position {
    pub fn new(line: u32, column: Option<u32>) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.column {
            Some(column) => write!(f, "{}:{}", self.line, column),
            None => write!(f, "{}", self.line),
        }
    }
}

/// Optional node metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Meta {
    pub fn at(line: u32, column: u32) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
        }
    }

    pub fn position(&self) -> Option<Position> {
        self.line.map(|line| Position::new(line, self.column))
    }
}

/// A node of the parsed syntax tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceNode {
    Integer {
        value: i64,
    },
    Float {
        value: f64,
    },
    Text {
        value: String,
    },
    Atom {
        value: String,
    },
    List {
        items: Vec<SourceNode>,
    },
    Tuple {
        items: Vec<SourceNode>,
    },
    Form {
        tag: String,
        #[serde(default)]
        meta: Meta,
        #[serde(default)]
        args: Option<Vec<SourceNode>>,
    },
    Call {
        target: Box<SourceNode>,
        #[serde(default)]
        meta: Meta,
        #[serde(default)]
        args: Vec<SourceNode>,
    },
}

impl SourceNode {
    /// Decode a tree from its JSON encoding
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn int(value: i64) -> Self {
        SourceNode::Integer { value }
    }

    pub fn float(value: f64) -> Self {
        SourceNode::Float { value }
    }

    pub fn text(value: impl Into<String>) -> Self {
        SourceNode::Text {
            value: value.into(),
        }
    }

    pub fn atom(value: impl Into<String>) -> Self {
        SourceNode::Atom {
            value: value.into(),
        }
    }

    pub fn list(items: Vec<SourceNode>) -> Self {
        SourceNode::List { items }
    }

    pub fn tuple(items: Vec<SourceNode>) -> Self {
        SourceNode::Tuple { items }
    }

    /// Variable reference
    pub fn var(name: impl Into<String>) -> Self {
        SourceNode::Form {
            tag: name.into(),
            meta: Meta::default(),
            args: None,
        }
    }

    /// Tagged form with arguments (operator, special form or local call)
    pub fn form(tag: impl Into<String>, args: Vec<SourceNode>) -> Self {
        SourceNode::Form {
            tag: tag.into(),
            meta: Meta::default(),
            args: Some(args),
        }
    }

    /// Binary operator form
    pub fn op(tag: &str, left: SourceNode, right: SourceNode) -> Self {
        Self::form(tag, vec![left, right])
    }

    /// Unary operator form
    pub fn unary(tag: &str, operand: SourceNode) -> Self {
        Self::form(tag, vec![operand])
    }

    /// Module alias such as `Foo.Bar`
    pub fn alias(segments: &[&str]) -> Self {
        Self::form("__aliases__", segments.iter().map(|s| Self::atom(*s)).collect())
    }

    /// Remote call `receiver.fun(args)`
    pub fn remote(receiver: SourceNode, fun: &str, args: Vec<SourceNode>) -> Self {
        SourceNode::Call {
            target: Box::new(Self::form(".", vec![receiver, Self::atom(fun)])),
            meta: Meta::default(),
            args,
        }
    }

    /// Anonymous function invocation `fun.(args)`
    pub fn invoke(fun: SourceNode, args: Vec<SourceNode>) -> Self {
        SourceNode::Call {
            target: Box::new(Self::form(".", vec![fun])),
            meta: Meta::default(),
            args,
        }
    }

    /// Keyword list `[key: value, ...]`
    pub fn keywords(pairs: Vec<(&str, SourceNode)>) -> Self {
        Self::list(
            pairs
                .into_iter()
                .map(|(k, v)| Self::tuple(vec![Self::atom(k), v]))
                .collect(),
        )
    }

    /// Clause `params -> body`
    pub fn clause(params: Vec<SourceNode>, body: SourceNode) -> Self {
        Self::form("->", vec![Self::list(params), body])
    }

    /// Anonymous function `fn clauses end`
    pub fn closure(clauses: Vec<SourceNode>) -> Self {
        Self::form("fn", clauses)
    }

    /// Block of sequential expressions
    pub fn block(exprs: Vec<SourceNode>) -> Self {
        Self::form("__block__", exprs)
    }

    /// Attach a position to this node (no-op for scalars)
    pub fn at(mut self, line: u32, column: u32) -> Self {
        match &mut self {
            SourceNode::Form { meta, .. } | SourceNode::Call { meta, .. } => {
                *meta = Meta::at(line, column);
            }
            _ => {}
        }
        self
    }

    /// Metadata of tagged nodes
    pub fn meta(&self) -> Meta {
        match self {
            SourceNode::Form { meta, .. } | SourceNode::Call { meta, .. } => *meta,
            _ => Meta::default(),
        }
    }

    pub fn position(&self) -> Option<Position> {
        self.meta().position()
    }

    /// Tag of a form
    pub fn tag(&self) -> Option<&str> {
        match self {
            SourceNode::Form { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Arguments of a form with arguments
    pub fn form_args(&self) -> Option<&[SourceNode]> {
        match self {
            SourceNode::Form { args: Some(args), .. } => Some(args),
            _ => None,
        }
    }

    /// The form's arguments when it has exactly this tag
    pub fn args_of(&self, expected: &str) -> Option<&[SourceNode]> {
        match self {
            SourceNode::Form { tag, args: Some(args), .. } if tag == expected => Some(args),
            _ => None,
        }
    }

    /// Name of a variable reference
    pub fn var_name(&self) -> Option<&str> {
        match self {
            SourceNode::Form { tag, args: None, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SourceNode::Atom { value } => Some(value),
            _ => None,
        }
    }

    /// Items of a list literal
    pub fn as_list(&self) -> Option<&[SourceNode]> {
        match self {
            SourceNode::List { items } => Some(items),
            _ => None,
        }
    }

    /// Items of a tuple in either encoding (`Tuple` or a `{}` form)
    pub fn as_tuple(&self) -> Option<&[SourceNode]> {
        match self {
            SourceNode::Tuple { items } => Some(items),
            other => other.args_of("{}"),
        }
    }

    /// A 2-tuple with an atom key
    pub fn as_keyword_pair(&self) -> Option<(&str, &SourceNode)> {
        match self.as_tuple() {
            Some([key, value]) => key.as_atom().map(|k| (k, value)),
            _ => None,
        }
    }

    /// A non-empty list made only of atom-keyed pairs
    pub fn is_keyword_list(&self) -> bool {
        matches!(self.as_list(), Some(items) if !items.is_empty()
            && items.iter().all(|item| item.as_keyword_pair().is_some()))
    }

    /// Look a key up in a keyword list
    pub fn keyword(&self, key: &str) -> Option<&SourceNode> {
        self.as_list()?
            .iter()
            .filter_map(SourceNode::as_keyword_pair)
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_decoding() {
        let json = r#"{
            "kind": "form", "tag": ">", "meta": {"line": 3, "column": 5},
            "args": [
                {"kind": "form", "tag": "x"},
                {"kind": "integer", "value": 5}
            ]
        }"#;
        let node = SourceNode::from_json(json).unwrap();
        assert_eq!(node.tag(), Some(">"));
        assert_eq!(node.position(), Some(Position::new(3, Some(5))));
        let args = node.form_args().unwrap();
        assert_eq!(args[0].var_name(), Some("x"));
        assert_eq!(args[1], SourceNode::int(5));
    }

    #[test]
    fn test_variable_vs_zero_arity_call() {
        assert_eq!(SourceNode::var("foo").var_name(), Some("foo"));
        assert_eq!(SourceNode::form("foo", vec![]).var_name(), None);
    }

    #[test]
    fn test_keyword_lookup() {
        let kw = SourceNode::keywords(vec![
            ("do", SourceNode::int(1)),
            ("else", SourceNode::int(2)),
        ]);
        assert!(kw.is_keyword_list());
        assert_eq!(kw.keyword("else"), Some(&SourceNode::int(2)));
        assert_eq!(kw.keyword("after"), None);
        assert!(!SourceNode::list(vec![]).is_keyword_list());
    }

    #[test]
    fn test_tuple_encodings() {
        let three = SourceNode::form(
            "{}",
            vec![SourceNode::int(1), SourceNode::int(2), SourceNode::int(3)],
        );
        assert_eq!(three.as_tuple().map(<[SourceNode]>::len), Some(3));
        let pair = SourceNode::tuple(vec![SourceNode::atom("ok"), SourceNode::var("x")]);
        assert_eq!(pair.as_keyword_pair().map(|(k, _)| k), Some("ok"));
    }
}
