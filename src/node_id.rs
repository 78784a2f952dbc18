//! Node Id - Stable, path-derived identity for every graph node
//!
//! Format: `<root-kind>/<root-index>(/<label>(/<index>)?)*`
//!
//! Examples:
//! - `expr/3` - the third top-level expression of a build
//! - `expr/3/left` - its left operand
//! - `pattern/1/element/2` - third element of a compound pattern
//!
//! Ids carry no counters or hashes: the same path from the same root always
//! yields the same id, which is what makes rebuilding idempotent.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Path-derived identifier of a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    /// Create a build-root id such as `expr/3`
    pub fn root(kind: &str, index: usize) -> Self {
        debug_assert!(is_label(kind), "invalid root kind {kind:?}");
        Self(format!("{}/{}", kind, index))
    }

    /// Derive a child id through a relation label (`expr/3` + `left`)
    pub fn child(&self, label: &str) -> Self {
        address(self, label, None)
    }

    /// Derive a positional child id (`expr/3` + `argument` + 1)
    pub fn indexed(&self, label: &str, index: usize) -> Self {
        address(self, label, Some(index))
    }

    /// Parse an id string, validating every segment
    pub fn parse(id: &str) -> Result<Self> {
        let mut segments = id.split('/');
        segments
            .next()
            .filter(|s| is_label(s))
            .ok_or_else(|| Error::InvalidNodeId(format!("missing root kind in {:?}", id)))?;
        let index = segments
            .next()
            .ok_or_else(|| Error::InvalidNodeId(format!("missing root index in {:?}", id)))?;
        if index.parse::<usize>().is_err() {
            return Err(Error::InvalidNodeId(format!("invalid root index {:?} in {:?}", index, id)));
        }

        // After the root, a numeric segment must follow a label
        let mut after_label = false;
        for segment in segments {
            if is_label(segment) {
                after_label = true;
            } else if after_label && segment.parse::<usize>().is_ok() {
                after_label = false;
            } else {
                return Err(Error::InvalidNodeId(format!(
                    "invalid segment {:?} in {:?}",
                    segment, id
                )));
            }
        }

        Ok(Self(id.to_string()))
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of path segments below the root
    pub fn depth(&self) -> usize {
        self.0.split('/').count().saturating_sub(2)
    }

    /// Whether `self` lies on a path below `ancestor` (or is it)
    pub fn is_within(&self, ancestor: &NodeId) -> bool {
        self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0)
                && self.0.as_bytes().get(ancestor.0.len()) == Some(&b'/'))
    }
}

/// Derive a child id from a parent id, a relation label and an optional index.
///
/// Pure and deterministic. Labels are lowercase identifiers and indexes are
/// numeric, so distinct inputs can never render to the same string.
pub fn address(parent: &NodeId, label: &str, index: Option<usize>) -> NodeId {
    debug_assert!(is_label(label), "invalid relation label {label:?}");
    match index {
        Some(i) => NodeId(format!("{}/{}/{}", parent.0, label, i)),
        None => NodeId(format!("{}/{}", parent.0, label)),
    }
}

fn is_label(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NodeId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_forms() {
        let root = NodeId::root("expr", 3);
        assert_eq!(root.as_str(), "expr/3");
        assert_eq!(root.child("left").as_str(), "expr/3/left");
        assert_eq!(
            NodeId::root("pattern", 1).indexed("element", 2).as_str(),
            "pattern/1/element/2"
        );
    }

    #[test]
    fn test_address_is_deterministic_and_distinct() {
        let root = NodeId::root("expr", 0);
        assert_eq!(address(&root, "argument", Some(1)), address(&root, "argument", Some(1)));
        assert_ne!(address(&root, "argument", Some(1)), address(&root, "argument", Some(11)));
        assert_ne!(root.indexed("element", 1).child("key"), root.indexed("element", 1));
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = NodeId::root("expr", 7).child("right").indexed("argument", 0);
        let parsed = NodeId::parse(id.as_str()).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.depth(), 3);
    }

    #[test]
    fn test_invalid_ids() {
        assert!(NodeId::parse("").is_err());
        assert!(NodeId::parse("expr").is_err());
        assert!(NodeId::parse("expr/x").is_err());
        assert!(NodeId::parse("expr/1/3").is_err());
        assert!(NodeId::parse("expr/1/Left").is_err());
    }

    #[test]
    fn test_is_within() {
        let root = NodeId::root("expr", 1);
        let child = root.child("left");
        assert!(child.is_within(&root));
        assert!(root.is_within(&root));
        assert!(!NodeId::root("expr", 11).is_within(&root));
    }
}
