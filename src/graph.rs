//! Semantic Graph - In-memory index over built graph nodes
//!
//! Builders hand back a flat node list. This structure indexes it for
//! lookups by id, by primary type and by incoming relation, and computes a
//! content fingerprint used to check that rebuilding is idempotent.

use std::collections::{BTreeMap, HashMap};
use crate::Result;
use crate::node::{GraphNode, NodeType};
use crate::node_id::NodeId;
use crate::relation::RelationKind;

/// In-memory semantic graph.
#[derive(Debug, Default)]
pub struct SemanticGraph {
    /// All nodes indexed by id
    nodes: BTreeMap<NodeId, GraphNode>,
    /// Nodes indexed by primary type
    nodes_by_type: HashMap<NodeType, Vec<NodeId>>,
    /// Incoming relations: target → [(relation, source)]
    incoming: HashMap<NodeId, Vec<(RelationKind, NodeId)>>,
}

impl SemanticGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a flat node list
    pub fn from_nodes(nodes: impl IntoIterator<Item = GraphNode>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node);
        }
        graph
    }

    /// Add a node to the graph, replacing any node with the same id
    pub fn add_node(&mut self, node: GraphNode) {
        let id = node.id.clone();

        if let Some(previous) = self.nodes.remove(&id) {
            self.unindex(&previous);
        }

        // Index by type
        self.nodes_by_type
            .entry(node.node_type)
            .or_default()
            .push(id.clone());

        // Index incoming relations
        for (kind, relation) in &node.relations {
            for target in &relation.targets {
                self.incoming
                    .entry(target.clone())
                    .or_default()
                    .push((*kind, id.clone()));
            }
        }

        self.nodes.insert(id, node);
    }

    fn unindex(&mut self, node: &GraphNode) {
        if let Some(ids) = self.nodes_by_type.get_mut(&node.node_type) {
            ids.retain(|id| id != &node.id);
        }
        for relation in node.relations.values() {
            for target in &relation.targets {
                if let Some(sources) = self.incoming.get_mut(target) {
                    sources.retain(|(_, source)| source != &node.id);
                }
            }
        }
    }

    /// Get a node by id
    pub fn get(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Get all nodes of a primary type, in id order
    pub fn nodes_of_type(&self, node_type: NodeType) -> Vec<&GraphNode> {
        let mut nodes: Vec<&GraphNode> = self
            .nodes_by_type
            .get(&node_type)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Follow a relation from a node
    pub fn related(&self, id: &NodeId, kind: RelationKind) -> Vec<&GraphNode> {
        self.get(id)
            .map(|node| {
                node.related(kind)
                    .iter()
                    .filter_map(|target| self.nodes.get(target))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Follow a single-target relation from a node
    pub fn related_one(&self, id: &NodeId, kind: RelationKind) -> Option<&GraphNode> {
        self.related(id, kind).into_iter().next()
    }

    /// Nodes pointing at `id`, with the relation used
    pub fn incoming(&self, id: &NodeId) -> &[(RelationKind, NodeId)] {
        self.incoming.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Relations whose target is not in the graph: (source, relation, target)
    pub fn dangling_relations(&self) -> Vec<(NodeId, RelationKind, NodeId)> {
        let mut dangling = Vec::new();
        for node in self.nodes.values() {
            for (kind, relation) in &node.relations {
                for target in &relation.targets {
                    if !self.nodes.contains_key(target) {
                        dangling.push((node.id.clone(), *kind, target.clone()));
                    }
                }
            }
        }
        dangling
    }

    /// Content fingerprint: blake3 over the id-ordered canonical encoding.
    ///
    /// Two builds of the same input with the same config produce the same
    /// fingerprint.
    pub fn fingerprint(&self) -> Result<String> {
        let mut hasher = blake3::Hasher::new();
        for node in self.nodes.values() {
            hasher.update(&serde_json::to_vec(node)?);
            hasher.update(b"\n");
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Get statistics about the graph
    pub fn stats(&self) -> GraphStats {
        let relations: usize = self
            .nodes
            .values()
            .flat_map(|n| n.relations.values())
            .map(|r| r.len())
            .sum();
        let unknown = self
            .nodes_by_type
            .get(&NodeType::UnknownExpression)
            .map(|v| v.len())
            .unwrap_or(0);
        let mut by_type: Vec<(NodeType, usize)> = self
            .nodes_by_type
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(t, ids)| (*t, ids.len()))
            .collect();
        by_type.sort();

        GraphStats {
            total_nodes: self.nodes.len(),
            total_relations: relations,
            unknown_nodes: unknown,
            by_type,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get all nodes in id order
    pub fn all_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Consume the graph into an id-ordered node list
    pub fn into_nodes(self) -> Vec<GraphNode> {
        self.nodes.into_values().collect()
    }
}

/// Statistics about a semantic graph
#[derive(Debug, Clone)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_relations: usize,
    pub unknown_nodes: usize,
    pub by_type: Vec<(NodeType, usize)>,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Semantic Graph Statistics:")?;
        writeln!(f, "  Nodes: {} (unknown shapes: {})", self.total_nodes, self.unknown_nodes)?;
        writeln!(f, "  Relations: {}", self.total_relations)?;
        for (node_type, count) in &self.by_type {
            writeln!(f, "    {}: {}", node_type, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node(id: &NodeId, node_type: NodeType) -> GraphNode {
        GraphNode::new(id.clone(), node_type)
    }

    #[test]
    fn test_add_and_retrieve_node() {
        let root = NodeId::root("expr", 0);
        let mut graph = SemanticGraph::new();
        graph.add_node(
            sample_node(&root, NodeType::ArithmeticOperator)
                .with_relation(RelationKind::LeftOperand, root.child("left")),
        );
        graph.add_node(sample_node(&root.child("left"), NodeType::Variable));

        assert_eq!(graph.len(), 2);
        let left = graph.related_one(&root, RelationKind::LeftOperand).unwrap();
        assert_eq!(left.node_type, NodeType::Variable);
        assert_eq!(
            graph.incoming(&root.child("left")),
            &[(RelationKind::LeftOperand, root.clone())]
        );
    }

    #[test]
    fn test_replacing_node_reindexes() {
        let root = NodeId::root("expr", 0);
        let mut graph = SemanticGraph::new();
        graph.add_node(sample_node(&root, NodeType::Variable));
        graph.add_node(sample_node(&root, NodeType::AtomLiteral));

        assert!(graph.nodes_of_type(NodeType::Variable).is_empty());
        assert_eq!(graph.nodes_of_type(NodeType::AtomLiteral).len(), 1);
    }

    #[test]
    fn test_dangling_relations() {
        let root = NodeId::root("expr", 0);
        let graph = SemanticGraph::from_nodes(vec![
            sample_node(&root, NodeType::LogicalOperator)
                .with_relation(RelationKind::LeftOperand, root.child("left")),
        ]);
        let dangling = graph.dangling_relations();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].2, root.child("left"));
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let root = NodeId::root("expr", 0);
        let a = sample_node(&root, NodeType::ListLiteral);
        let b = sample_node(&root.indexed("element", 0), NodeType::IntegerLiteral)
            .with_property("value", 1i64);

        let first = SemanticGraph::from_nodes(vec![a.clone(), b.clone()]);
        let second = SemanticGraph::from_nodes(vec![b, a]);
        assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
    }

    #[test]
    fn test_stats() {
        let root = NodeId::root("expr", 0);
        let graph = SemanticGraph::from_nodes(vec![
            sample_node(&root, NodeType::UnknownExpression)
                .with_relation(RelationKind::Argument, root.indexed("argument", 0)),
            sample_node(&root.indexed("argument", 0), NodeType::IntegerLiteral),
        ]);
        let stats = graph.stats();
        assert_eq!(stats.total_nodes, 2);
        assert_eq!(stats.total_relations, 1);
        assert_eq!(stats.unknown_nodes, 1);
        assert!(stats.to_string().contains("UnknownExpression: 1"));
    }
}
