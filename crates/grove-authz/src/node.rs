// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Entity graph: hierarchical nodes that permissions are granted on.
//!
//! This module provides:
//! - [`Node`] - an application object with an optional parent
//! - [`NodeTree`] - the in-memory parent-indexed tree with cycle checks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::engine::EntityGraph;
use crate::error::{AuthzError, Result};
use crate::types::{NodeId, ObjectRef};

/// A node in the entity graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
	/// Unique identifier for this node.
	pub id: NodeId,

	/// Display title.
	pub title: String,

	/// Parent node, `None` for a root.
	pub parent: Option<NodeId>,

	/// When the node was created.
	pub created_at: DateTime<Utc>,
}

impl Node {
	/// Creates a new node with a generated ID.
	pub fn new(title: impl Into<String>, parent: Option<NodeId>) -> Self {
		Self {
			id: NodeId::generate(),
			title: title.into(),
			parent,
			created_at: Utc::now(),
		}
	}
}

/// Parent-indexed node tree.
#[derive(Debug, Clone, Default)]
pub struct NodeTree {
	nodes: HashMap<NodeId, Node>,
	children: HashMap<NodeId, BTreeSet<NodeId>>,
}

impl NodeTree {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a node. Its parent, if any, must already exist.
	pub fn insert(&mut self, node: Node) -> Result<()> {
		if let Some(parent) = node.parent {
			if !self.nodes.contains_key(&parent) {
				return Err(AuthzError::UnknownObject(ObjectRef::Node(parent)));
			}
			self.children.entry(parent).or_default().insert(node.id);
		}
		self.nodes.insert(node.id, node);
		Ok(())
	}

	pub fn get(&self, id: NodeId) -> Option<&Node> {
		self.nodes.get(&id)
	}

	pub fn contains(&self, id: NodeId) -> bool {
		self.nodes.contains_key(&id)
	}

	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.nodes.get(&id).and_then(|n| n.parent)
	}

	/// Moves a node under a new parent (or to the root).
	///
	/// Fails with [`AuthzError::Cycle`] if `parent` is the node itself or one
	/// of its descendants.
	pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<()> {
		if !self.contains(id) {
			return Err(AuthzError::UnknownObject(ObjectRef::Node(id)));
		}
		if let Some(parent) = parent {
			if !self.contains(parent) {
				return Err(AuthzError::UnknownObject(ObjectRef::Node(parent)));
			}
			if parent == id || self.ancestors(parent).contains(&id) {
				return Err(AuthzError::Cycle(format!(
					"node {parent} is {id} or one of its descendants"
				)));
			}
		}

		if let Some(old) = self.parent(id) {
			if let Some(siblings) = self.children.get_mut(&old) {
				siblings.remove(&id);
			}
		}
		if let Some(parent) = parent {
			self.children.entry(parent).or_default().insert(id);
		}
		if let Some(node) = self.nodes.get_mut(&id) {
			node.parent = parent;
		}
		Ok(())
	}

	/// Removes a node. Its children become roots.
	pub fn remove(&mut self, id: NodeId) -> Option<Node> {
		let node = self.nodes.remove(&id)?;
		if let Some(parent) = node.parent {
			if let Some(siblings) = self.children.get_mut(&parent) {
				siblings.remove(&id);
			}
		}
		for child in self.children.remove(&id).unwrap_or_default() {
			if let Some(child) = self.nodes.get_mut(&child) {
				child.parent = None;
			}
		}
		Some(node)
	}

	/// Direct children of a node.
	pub fn children(&self, id: NodeId) -> Vec<NodeId> {
		self
			.children
			.get(&id)
			.map(|c| c.iter().copied().collect())
			.unwrap_or_default()
	}

	/// Strict ancestors of a node, nearest first.
	pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
		let mut chain = Vec::new();
		let mut current = self.parent(id);
		while let Some(parent) = current {
			if parent == id || chain.contains(&parent) {
				break;
			}
			chain.push(parent);
			current = self.parent(parent);
		}
		chain
	}

	/// Every node below `id`, breadth first.
	pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut frontier = self.children(id);
		while !frontier.is_empty() {
			let mut next = Vec::new();
			for child in frontier {
				next.extend(self.children(child));
				out.push(child);
			}
			frontier = next;
		}
		out
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

impl EntityGraph for NodeTree {
	fn parent_of(&self, object: &ObjectRef) -> Option<ObjectRef> {
		match object {
			ObjectRef::Node(id) => self.parent(*id).map(ObjectRef::Node),
			ObjectRef::Group(_) => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chain() -> (NodeTree, Node, Node, Node) {
		let mut tree = NodeTree::new();
		let n1 = Node::new("Node 1", None);
		let n2 = Node::new("Node 2", Some(n1.id));
		let n3 = Node::new("Node 3", Some(n2.id));
		tree.insert(n1.clone()).unwrap();
		tree.insert(n2.clone()).unwrap();
		tree.insert(n3.clone()).unwrap();
		(tree, n1, n2, n3)
	}

	#[test]
	fn insert_rejects_unknown_parent() {
		let mut tree = NodeTree::new();
		let orphan = Node::new("orphan", Some(NodeId::generate()));
		assert!(matches!(
			tree.insert(orphan),
			Err(AuthzError::UnknownObject(_))
		));
	}

	#[test]
	fn ancestors_are_nearest_first() {
		let (tree, n1, n2, n3) = chain();
		assert_eq!(tree.ancestors(n3.id), vec![n2.id, n1.id]);
		assert!(tree.ancestors(n1.id).is_empty());
	}

	#[test]
	fn descendants_walk_the_subtree() {
		let (tree, n1, n2, n3) = chain();
		assert_eq!(tree.descendants(n1.id), vec![n2.id, n3.id]);
		assert_eq!(tree.children(n1.id), vec![n2.id]);
	}

	#[test]
	fn set_parent_rejects_cycle() {
		let (mut tree, n1, _n2, n3) = chain();
		assert!(matches!(
			tree.set_parent(n1.id, Some(n3.id)),
			Err(AuthzError::Cycle(_))
		));
		assert!(matches!(
			tree.set_parent(n1.id, Some(n1.id)),
			Err(AuthzError::Cycle(_))
		));
	}

	#[test]
	fn set_parent_moves_node() {
		let (mut tree, n1, n2, n3) = chain();
		tree.set_parent(n3.id, Some(n1.id)).unwrap();

		assert_eq!(tree.parent(n3.id), Some(n1.id));
		assert!(tree.children(n2.id).is_empty());
		assert_eq!(tree.children(n1.id).len(), 2);
	}

	#[test]
	fn remove_reroots_children() {
		let (mut tree, n1, n2, n3) = chain();
		tree.remove(n2.id).unwrap();

		assert_eq!(tree.parent(n3.id), None);
		assert!(tree.children(n1.id).is_empty());
		assert_eq!(tree.len(), 2);
	}

	#[test]
	fn group_objects_have_no_graph_parent() {
		let (tree, ..) = chain();
		let group = ObjectRef::Group(crate::GroupId::generate());
		assert_eq!(tree.parent_of(&group), None);
	}
}
