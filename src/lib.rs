//! # Semgraph - AST-to-semantic-graph compiler pass
//!
//! Turns a parsed program's tagged syntax tree into a flat set of graph nodes
//! describing program structure, ready for bulk load into a graph store or a
//! schema validator.
//!
//! Semgraph provides:
//! - Stable, path-derived node addressing (re-running a build reproduces every id)
//! - Literal, operator, call and control-flow expression builders
//! - A pattern decomposer that accumulates the symbols each pattern binds
//! - Closure analysis: free variables, enclosing scope chain, capture mutation
//! - Depth, fan-out and capture ceilings threaded through every recursive call

pub mod node_id;
pub mod node;
pub mod relation;
pub mod graph;
pub mod source;
pub mod shape;
pub mod config;
pub mod scope;
pub mod builder;
pub mod closure;

// Re-exports for convenient access
pub use node_id::NodeId;
pub use node::{AuxTag, GraphNode, NodeType, PropertyValue};
pub use relation::{Relation, RelationKind};
pub use graph::SemanticGraph;
pub use source::{Meta, Position, SourceNode};
pub use config::BuildConfig;
pub use scope::{Binding, ScopeFrame, ScopeKind};
pub use builder::{
    BatchOutcome, BuiltGraph, Construct, ConstructError, Diagnostic, GraphBuilder, PatternGraph,
};
pub use closure::{ClosureReport, FreeVariableRecord, MutationClass};

/// Result type alias for Semgraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Semgraph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed pattern at {at}: {reason}")]
    MalformedPattern { at: NodeId, reason: String },

    #[error("Inconsistent clause arity at {at}: clauses take {arities:?} parameters")]
    InconsistentClauseArity { at: NodeId, arities: Vec<usize> },

    #[error("Depth exceeded at {at}: limit is {limit}")]
    DepthExceeded { at: NodeId, limit: usize },

    #[error("Size exceeded at {at}: {what} count {actual} is over the limit of {limit}")]
    SizeExceeded {
        at: NodeId,
        what: &'static str,
        actual: usize,
        limit: usize,
    },

    #[error("Invalid capture index &{index} at {at}: supported range is 1..={max}")]
    InvalidCaptureIndex { at: NodeId, index: i64, max: usize },

    #[error("Invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// The failure kind from the build error taxonomy, if this is a build failure
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::MalformedPattern { .. } => Some(ErrorKind::MalformedPattern),
            Error::InconsistentClauseArity { .. } => Some(ErrorKind::InconsistentClauseArity),
            Error::DepthExceeded { .. } => Some(ErrorKind::DepthExceeded),
            Error::SizeExceeded { .. } => Some(ErrorKind::SizeExceeded),
            Error::InvalidCaptureIndex { .. } => Some(ErrorKind::InvalidCaptureIndex),
            Error::InvalidNodeId(_) | Error::Json(_) | Error::Io(_) | Error::Config(_) => None,
        }
    }
}

/// Build failure taxonomy.
///
/// `UnrecognizedNodeShape` is the only soft kind: it is reported as a
/// [`Diagnostic`] and never aborts a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    UnrecognizedNodeShape,
    MalformedPattern,
    InconsistentClauseArity,
    DepthExceeded,
    SizeExceeded,
    InvalidCaptureIndex,
}

impl ErrorKind {
    /// Get the string representation of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnrecognizedNodeShape => "unrecognized-node-shape",
            ErrorKind::MalformedPattern => "malformed-pattern",
            ErrorKind::InconsistentClauseArity => "inconsistent-clause-arity",
            ErrorKind::DepthExceeded => "depth-exceeded",
            ErrorKind::SizeExceeded => "size-exceeded",
            ErrorKind::InvalidCaptureIndex => "invalid-capture-index",
        }
    }

    /// Hard kinds abort the enclosing construct
    pub fn is_hard(&self) -> bool {
        !matches!(self, ErrorKind::UnrecognizedNodeShape)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let at = NodeId::root("expr", 0);
        let err = Error::DepthExceeded { at: at.clone(), limit: 3 };
        assert_eq!(err.kind(), Some(ErrorKind::DepthExceeded));
        assert_eq!(err.kind().unwrap().as_str(), "depth-exceeded");

        let err = Error::InvalidNodeId("".to_string());
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn test_only_unknown_shape_is_soft() {
        assert!(!ErrorKind::UnrecognizedNodeShape.is_hard());
        assert!(ErrorKind::MalformedPattern.is_hard());
        assert!(ErrorKind::InvalidCaptureIndex.is_hard());
    }
}
