// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Group hierarchy.
//!
//! This module provides:
//! - [`GroupType`] - a descriptive label categorizing groups ("read", "admin", ...)
//! - [`Group`] - a named principal with an optional parent group
//! - [`GroupTree`] - the parent-indexed tree, enforcing unique names and no cycles
//!
//! The group tree is administrative only. Membership is never inherited
//! through it and it plays no part in permission resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::{AuthzError, Result};
use crate::types::{GroupId, GroupTypeId, Principal};

/// A label categorizing groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupType {
	pub id: GroupTypeId,
	pub label: String,
	pub created_at: DateTime<Utc>,
}

impl GroupType {
	pub fn new(label: impl Into<String>) -> Self {
		Self {
			id: GroupTypeId::generate(),
			label: label.into(),
			created_at: Utc::now(),
		}
	}
}

/// A group of members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
	/// Unique identifier for this group.
	pub id: GroupId,

	/// Unique name, e.g. `n:42:admin`.
	pub name: String,

	/// Optional category.
	pub group_type: Option<GroupTypeId>,

	/// Parent group, `None` for a root.
	pub parent: Option<GroupId>,

	/// When the group was created.
	pub created_at: DateTime<Utc>,
}

impl Group {
	/// Creates a new group with a generated ID.
	pub fn new(
		name: impl Into<String>,
		group_type: Option<GroupTypeId>,
		parent: Option<GroupId>,
	) -> Self {
		Self {
			id: GroupId::generate(),
			name: name.into(),
			group_type,
			parent,
			created_at: Utc::now(),
		}
	}
}

/// Groups indexed by ID and by name.
#[derive(Debug, Clone, Default)]
pub struct GroupTree {
	groups: HashMap<GroupId, Group>,
	by_name: HashMap<String, GroupId>,
	types: HashMap<GroupTypeId, GroupType>,
}

impl GroupTree {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a group type. Labels are unique.
	pub fn insert_type(&mut self, group_type: GroupType) -> Result<()> {
		if self.types.values().any(|t| t.label == group_type.label) {
			return Err(AuthzError::DuplicateName(group_type.label));
		}
		self.types.insert(group_type.id, group_type);
		Ok(())
	}

	pub fn group_type(&self, id: GroupTypeId) -> Option<&GroupType> {
		self.types.get(&id)
	}

	/// Inserts a group.
	///
	/// Fails with [`AuthzError::DuplicateName`] if the name is taken,
	/// [`AuthzError::UnknownPrincipal`] if the parent does not exist, and
	/// [`AuthzError::Cycle`] if the group would end up as its own ancestor.
	pub fn insert(&mut self, group: Group) -> Result<()> {
		if self.by_name.contains_key(&group.name) {
			return Err(AuthzError::DuplicateName(group.name));
		}
		if let Some(type_id) = group.group_type {
			if !self.types.contains_key(&type_id) {
				return Err(AuthzError::InvalidReference(format!(
					"unknown group type {type_id}"
				)));
			}
		}
		if let Some(parent) = group.parent {
			self.check_parent(group.id, parent)?;
		}
		self.by_name.insert(group.name.clone(), group.id);
		self.groups.insert(group.id, group);
		Ok(())
	}

	/// Re-parents a group with the same cycle check as [`GroupTree::insert`].
	pub fn set_parent(&mut self, id: GroupId, parent: Option<GroupId>) -> Result<()> {
		if !self.contains(id) {
			return Err(AuthzError::UnknownPrincipal(Principal::Group(id)));
		}
		if let Some(parent) = parent {
			self.check_parent(id, parent)?;
		}
		if let Some(group) = self.groups.get_mut(&id) {
			group.parent = parent;
		}
		Ok(())
	}

	fn check_parent(&self, id: GroupId, parent: GroupId) -> Result<()> {
		if parent == id {
			return Err(AuthzError::Cycle(format!("group {id} cannot be its own parent")));
		}
		if !self.contains(parent) {
			return Err(AuthzError::UnknownPrincipal(Principal::Group(parent)));
		}
		if self.ancestors(parent).contains(&id) {
			return Err(AuthzError::Cycle(format!(
				"group {parent} descends from {id}"
			)));
		}
		Ok(())
	}

	/// Removes a group. Its direct subgroups become roots.
	pub fn remove(&mut self, id: GroupId) -> Option<Group> {
		let removed = self.groups.remove(&id)?;
		self.by_name.remove(&removed.name);
		for group in self.groups.values_mut() {
			if group.parent == Some(id) {
				group.parent = None;
			}
		}
		Some(removed)
	}

	pub fn get(&self, id: GroupId) -> Option<&Group> {
		self.groups.get(&id)
	}

	pub fn by_name(&self, name: &str) -> Option<&Group> {
		self.by_name.get(name).and_then(|id| self.groups.get(id))
	}

	pub fn contains(&self, id: GroupId) -> bool {
		self.groups.contains_key(&id)
	}

	/// Strict ancestors of a group, nearest first.
	pub fn ancestors(&self, id: GroupId) -> Vec<GroupId> {
		let mut chain = Vec::new();
		let mut current = self.groups.get(&id).and_then(|g| g.parent);
		while let Some(parent) = current {
			if parent == id || chain.contains(&parent) {
				break;
			}
			chain.push(parent);
			current = self.groups.get(&parent).and_then(|g| g.parent);
		}
		chain
	}

	/// Direct subgroups of a group.
	pub fn subgroups(&self, id: GroupId) -> BTreeSet<GroupId> {
		self
			.groups
			.values()
			.filter(|g| g.parent == Some(id))
			.map(|g| g.id)
			.collect()
	}

	pub fn len(&self) -> usize {
		self.groups.len()
	}

	pub fn is_empty(&self) -> bool {
		self.groups.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	mod group_type {
		use super::*;

		#[test]
		fn labels_are_unique() {
			let mut tree = GroupTree::new();
			tree.insert_type(GroupType::new("admin")).unwrap();

			let err = tree.insert_type(GroupType::new("admin")).unwrap_err();
			assert_eq!(err, AuthzError::DuplicateName("admin".to_string()));
		}

		#[test]
		fn group_must_reference_known_type() {
			let mut tree = GroupTree::new();
			let group = Group::new("g", Some(GroupTypeId::generate()), None);

			assert!(matches!(
				tree.insert(group),
				Err(AuthzError::InvalidReference(_))
			));
		}
	}

	mod hierarchy {
		use super::*;

		#[test]
		fn names_are_unique() {
			let mut tree = GroupTree::new();
			tree.insert(Group::new("n:1:admin", None, None)).unwrap();

			let err = tree.insert(Group::new("n:1:admin", None, None)).unwrap_err();
			assert_eq!(err, AuthzError::DuplicateName("n:1:admin".to_string()));
			assert_eq!(tree.len(), 1);
		}

		#[test]
		fn rejects_unknown_parent() {
			let mut tree = GroupTree::new();
			let missing = GroupId::generate();

			let err = tree.insert(Group::new("g", None, Some(missing))).unwrap_err();
			assert_eq!(err, AuthzError::UnknownPrincipal(Principal::Group(missing)));
		}

		#[test]
		fn set_parent_rejects_cycle() {
			let mut tree = GroupTree::new();
			let a = Group::new("a", None, None);
			let b = Group::new("b", None, Some(a.id));
			let c = Group::new("c", None, Some(b.id));
			tree.insert(a.clone()).unwrap();
			tree.insert(b.clone()).unwrap();
			tree.insert(c.clone()).unwrap();

			assert!(matches!(
				tree.set_parent(a.id, Some(c.id)),
				Err(AuthzError::Cycle(_))
			));
			assert!(matches!(
				tree.set_parent(b.id, Some(b.id)),
				Err(AuthzError::Cycle(_))
			));
			assert_eq!(tree.ancestors(c.id), vec![b.id, a.id]);
		}

		#[test]
		fn subgroups_lists_direct_children() {
			let mut tree = GroupTree::new();
			let a = Group::new("a", None, None);
			let b = Group::new("b", None, Some(a.id));
			let c = Group::new("c", None, Some(b.id));
			tree.insert(a.clone()).unwrap();
			tree.insert(b.clone()).unwrap();
			tree.insert(c).unwrap();

			assert_eq!(tree.subgroups(a.id), BTreeSet::from([b.id]));
		}

		#[test]
		fn by_name_finds_group() {
			let mut tree = GroupTree::new();
			let g = Group::new("n:1:read", None, None);
			tree.insert(g.clone()).unwrap();

			assert_eq!(tree.by_name("n:1:read").map(|g| g.id), Some(g.id));
			assert!(tree.by_name("n:2:read").is_none());
		}
	}
}
