//! Shape decoding - the dispatch boundary between the loosely tagged source
//! tree and the builders
//!
//! Each syntactic category has a closed sum type. Decoding is exhaustive and
//! anything unmatched lands in an explicit `Unknown` variant, so builders
//! never inspect raw tags themselves.
//!
//! Order matters: one-argument operator forms are decoded as unary before
//! two-argument forms are tried as binary, since `-`/`+` are both.

use crate::node::NodeType;
use crate::source::SourceNode;

/// Names that look like variables but are compile-time special forms.
pub const RESERVED_NAMES: &[&str] = &[
    "__MODULE__",
    "__ENV__",
    "__CALLER__",
    "__DIR__",
    "__STACKTRACE__",
];

/// Operator categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorCategory {
    Arithmetic,
    Comparison,
    Logical,
    Pipe,
    Match,
    List,
    Concat,
    Membership,
}

impl OperatorCategory {
    /// Category of a two-operand operator tag
    pub fn binary(tag: &str) -> Option<Self> {
        let category = match tag {
            "+" | "-" | "*" | "/" | "**" | "&&&" | "|||" | "^^^" | "<<<" | ">>>" => {
                Self::Arithmetic
            }
            "==" | "!=" | "===" | "!==" | "<" | ">" | "<=" | ">=" | "=~" => Self::Comparison,
            "and" | "or" | "&&" | "||" => Self::Logical,
            "|>" => Self::Pipe,
            "=" => Self::Match,
            "++" | "--" => Self::List,
            "<>" => Self::Concat,
            "in" | "not in" => Self::Membership,
            _ => return None,
        };
        Some(category)
    }

    /// Category of a one-operand operator tag
    pub fn unary(tag: &str) -> Option<Self> {
        match tag {
            "-" | "+" | "~~~" => Some(Self::Arithmetic),
            "!" | "not" => Some(Self::Logical),
            _ => None,
        }
    }

    /// Primary node type emitted for this category
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Arithmetic => NodeType::ArithmeticOperator,
            Self::Comparison => NodeType::ComparisonOperator,
            Self::Logical => NodeType::LogicalOperator,
            Self::Pipe => NodeType::PipeOperator,
            Self::Match => NodeType::MatchOperator,
            Self::List => NodeType::ListOperator,
            Self::Concat => NodeType::ConcatOperator,
            Self::Membership => NodeType::MembershipOperator,
        }
    }
}

/// Literal-shaped nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteralShape<'a> {
    Integer(i64),
    Float(f64),
    Text(&'a str),
    Boolean(bool),
    Nil,
    Atom(&'a str),
    List(&'a [SourceNode]),
    KeywordList(&'a [SourceNode]),
    Tuple(&'a [SourceNode]),
    Map(&'a [SourceNode]),
    Struct {
        type_ref: &'a SourceNode,
        fields: &'a SourceNode,
    },
    Range {
        first: &'a SourceNode,
        last: &'a SourceNode,
        step: Option<&'a SourceNode>,
    },
    Sigil {
        letter: &'a str,
        content: &'a SourceNode,
        modifiers: &'a SourceNode,
    },
    Binary(&'a [SourceNode]),
}

impl<'a> LiteralShape<'a> {
    /// Decode a literal shape, or `None` when the node is not literal-shaped
    pub fn decode(node: &'a SourceNode) -> Option<Self> {
        let shape = match node {
            SourceNode::Integer { value } => Self::Integer(*value),
            SourceNode::Float { value } => Self::Float(*value),
            SourceNode::Text { value } => Self::Text(value),
            SourceNode::Atom { value } => match value.as_str() {
                "true" => Self::Boolean(true),
                "false" => Self::Boolean(false),
                "nil" => Self::Nil,
                other => Self::Atom(other),
            },
            SourceNode::List { items } if node.is_keyword_list() => Self::KeywordList(items),
            SourceNode::List { items } => Self::List(items),
            SourceNode::Tuple { items } => Self::Tuple(items),
            SourceNode::Form { tag, args: Some(args), .. } => match (tag.as_str(), &args[..]) {
                ("{}", items) => Self::Tuple(items),
                ("%{}", entries) => Self::Map(entries),
                ("%", [type_ref, fields]) if fields.args_of("%{}").is_some() => {
                    Self::Struct { type_ref, fields }
                }
                ("..", [first, last]) => Self::Range {
                    first,
                    last,
                    step: None,
                },
                ("..//", [first, last, step]) => Self::Range {
                    first,
                    last,
                    step: Some(step),
                },
                ("<<>>", segments) => Self::Binary(segments),
                (sigil, [content, modifiers]) if sigil_letter(sigil).is_some() => Self::Sigil {
                    letter: sigil_letter(sigil).unwrap_or_default(),
                    content,
                    modifiers,
                },
                _ => return None,
            },
            SourceNode::Form { .. } | SourceNode::Call { .. } => return None,
        };
        Some(shape)
    }

    /// Scalar literals have no child nodes
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Integer(_)
                | Self::Float(_)
                | Self::Text(_)
                | Self::Boolean(_)
                | Self::Nil
                | Self::Atom(_)
        )
    }
}

fn sigil_letter(tag: &str) -> Option<&str> {
    tag.strip_prefix("sigil_")
        .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphabetic()))
}

/// Split list items into elements and an optional cons tail (`[a, b | t]`).
pub fn split_cons(items: &[SourceNode]) -> (Vec<&SourceNode>, Option<&SourceNode>) {
    match items.split_last() {
        Some((last, init)) => match last.args_of("|") {
            Some([head, tail]) => {
                let mut elements: Vec<&SourceNode> = init.iter().collect();
                elements.push(head);
                (elements, Some(tail))
            }
            _ => (items.iter().collect(), None),
        },
        None => (Vec::new(), None),
    }
}

/// Entry of a map or struct, normalized to a (key, value) pair.
///
/// Accepts both the keyword form (`key: value`, an atom-keyed 2-tuple) and the
/// arrow form (`key => value`, any 2-tuple or a `=>` form).
pub fn map_entry(entry: &SourceNode) -> Option<(&SourceNode, &SourceNode)> {
    match entry.as_tuple().or_else(|| entry.args_of("=>")) {
        Some([key, value]) => Some((key, value)),
        _ => None,
    }
}

/// Expression shapes.
#[derive(Debug, Clone, Copy)]
pub enum ExprShape<'a> {
    Literal(LiteralShape<'a>),
    Variable(&'a str),
    Reserved(&'a str),
    ModuleAttribute(&'a str),
    Alias(&'a [SourceNode]),
    Unary {
        category: OperatorCategory,
        symbol: &'a str,
        operand: &'a SourceNode,
    },
    Binary {
        category: OperatorCategory,
        symbol: &'a str,
        left: &'a SourceNode,
        right: &'a SourceNode,
    },
    Block(&'a [SourceNode]),
    Conditional {
        negated: bool,
        condition: &'a SourceNode,
        branches: &'a SourceNode,
    },
    Case {
        subject: &'a SourceNode,
        branches: &'a SourceNode,
    },
    Cond(&'a SourceNode),
    With(&'a [SourceNode]),
    Comprehension(&'a [SourceNode]),
    Closure(&'a [SourceNode]),
    Capture(&'a SourceNode),
    Placeholder(i64),
    LocalCall {
        name: &'a str,
        args: &'a [SourceNode],
    },
    RemoteCall {
        receiver: &'a SourceNode,
        name: &'a str,
        args: &'a [SourceNode],
    },
    AnonymousCall {
        fun: &'a SourceNode,
        args: &'a [SourceNode],
    },
    Unknown(&'a str),
}

impl<'a> ExprShape<'a> {
    /// Decode the expression shape of a node
    pub fn decode(node: &'a SourceNode) -> Self {
        if let Some(literal) = LiteralShape::decode(node) {
            return Self::Literal(literal);
        }

        match node {
            SourceNode::Form { tag, args: None, .. } => {
                if RESERVED_NAMES.contains(&tag.as_str()) {
                    Self::Reserved(tag)
                } else {
                    Self::Variable(tag)
                }
            }
            SourceNode::Form { tag, args: Some(args), .. } => Self::decode_form(tag, args),
            SourceNode::Call { target, args, .. } => match target.args_of(".") {
                Some([receiver, fun]) => match fun.as_atom() {
                    Some(name) => Self::RemoteCall {
                        receiver,
                        name,
                        args,
                    },
                    None => Self::Unknown("."),
                },
                Some([fun]) => Self::AnonymousCall { fun, args },
                _ => Self::Unknown(target.tag().unwrap_or("call")),
            },
            // Scalars, lists and tuples are always literal-shaped
            _ => Self::Unknown("literal"),
        }
    }

    fn decode_form(tag: &'a str, args: &'a [SourceNode]) -> Self {
        match (tag, args) {
            ("__aliases__", segments) => Self::Alias(segments),
            ("__block__", exprs) => Self::Block(exprs),
            ("@", [attr]) => match attr.tag() {
                Some(name) => Self::ModuleAttribute(name),
                None => Self::Unknown(tag),
            },
            ("&", [SourceNode::Integer { value }]) => Self::Placeholder(*value),
            ("&", [body]) => Self::Capture(body),
            ("fn", clauses) => Self::Closure(clauses),
            ("if" | "unless", [condition, branches]) if branches.keyword("do").is_some() => {
                Self::Conditional {
                    negated: tag == "unless",
                    condition,
                    branches,
                }
            }
            ("case", [subject, branches]) if branches.keyword("do").is_some() => {
                Self::Case { subject, branches }
            }
            ("cond", [branches]) if branches.keyword("do").is_some() => Self::Cond(branches),
            ("with", parts) if parts.last().and_then(|kw| kw.keyword("do")).is_some() => {
                Self::With(parts)
            }
            ("for", parts) if parts.last().and_then(|kw| kw.keyword("do")).is_some() => {
                Self::Comprehension(parts)
            }
            (symbol, [operand]) if OperatorCategory::unary(symbol).is_some() => Self::Unary {
                category: OperatorCategory::unary(symbol).unwrap_or(OperatorCategory::Arithmetic),
                symbol,
                operand,
            },
            (symbol, [left, right]) if OperatorCategory::binary(symbol).is_some() => Self::Binary {
                category: OperatorCategory::binary(symbol).unwrap_or(OperatorCategory::Arithmetic),
                symbol,
                left,
                right,
            },
            // Only meaningful inside clauses, generators and binaries
            ("when" | "<-" | "->" | "::" | "|" | "^" | "\\\\", _) => Self::Unknown(tag),
            (name, args) if is_call_name(name) => Self::LocalCall { name, args },
            _ => Self::Unknown(tag),
        }
    }
}

fn is_call_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '?' || c == '!')
}

/// Pattern shapes.
#[derive(Debug, Clone)]
pub enum PatternShape<'a> {
    /// Literal value (no bindings)
    Literal(LiteralShape<'a>),
    /// Negative numeric literal (`-1`)
    Negated(&'a SourceNode),
    /// Compile-time value: alias, module attribute, reserved name
    Value,
    Variable(&'a str),
    Wildcard,
    Pin(&'a SourceNode),
    Tuple(&'a [SourceNode]),
    List {
        elements: Vec<&'a SourceNode>,
        tail: Option<&'a SourceNode>,
    },
    Map(&'a [SourceNode]),
    Struct {
        type_ref: &'a SourceNode,
        fields: &'a [SourceNode],
    },
    Binary(&'a [SourceNode]),
    As {
        left: &'a SourceNode,
        right: &'a SourceNode,
    },
    StringPrefix {
        prefix: &'a SourceNode,
        rest: &'a SourceNode,
    },
    Default {
        pattern: &'a SourceNode,
        value: &'a SourceNode,
    },
    Unknown(&'a str),
}

impl<'a> PatternShape<'a> {
    /// Decode the pattern shape of a node
    pub fn decode(node: &'a SourceNode) -> Self {
        match node {
            SourceNode::Form { tag, args: None, .. } => match tag.as_str() {
                "_" => Self::Wildcard,
                name if RESERVED_NAMES.contains(&name) => Self::Value,
                name => Self::Variable(name),
            },
            SourceNode::List { items } => {
                let (elements, tail) = split_cons(items);
                Self::List { elements, tail }
            }
            SourceNode::Form { tag, args: Some(args), .. } => match (tag.as_str(), &args[..]) {
                ("^", [pinned]) => Self::Pin(pinned),
                ("{}", items) => Self::Tuple(items),
                ("%{}", entries) => Self::Map(entries),
                ("%", [type_ref, fields]) => match fields.args_of("%{}") {
                    Some(fields) => Self::Struct { type_ref, fields },
                    None => Self::Unknown("%"),
                },
                ("<<>>", segments) => Self::Binary(segments),
                ("=", [left, right]) => Self::As { left, right },
                ("<>", [prefix, rest]) => Self::StringPrefix { prefix, rest },
                ("\\\\", [pattern, value]) => Self::Default { pattern, value },
                ("-" | "+", [number @ (SourceNode::Integer { .. } | SourceNode::Float { .. })]) => {
                    Self::Negated(number)
                }
                ("__aliases__" | "@", _) => Self::Value,
                _ => match LiteralShape::decode(node) {
                    Some(literal) => Self::Literal(literal),
                    None => Self::Unknown(tag),
                },
            },
            SourceNode::Tuple { items } => Self::Tuple(items),
            SourceNode::Call { .. } => Self::Unknown("call"),
            _ => match LiteralShape::decode(node) {
                Some(literal) => Self::Literal(literal),
                None => Self::Unknown("literal"),
            },
        }
    }
}
