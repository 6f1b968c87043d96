// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory registry combining every store behind validated mutations.
//!
//! [`Registry`] is the single-process counterpart of the SQLite repositories:
//! mutations fail fast on unknown references, duplicate names, cycles and
//! invalid scope labels, while permission checks never fail.

use std::collections::{BTreeSet, HashMap};
use tracing::instrument;

use crate::assignment::AssignmentStore;
use crate::engine::{Evaluator, DEFAULT_MAX_ANCESTOR_DEPTH};
use crate::error::{AuthzError, Result};
use crate::group::{Group, GroupTree, GroupType};
use crate::member::{Member, MembershipStore, Role};
use crate::node::{Node, NodeTree};
use crate::scope::{is_valid_role_label, CustomPermissions, PermissionSet, Scope};
use crate::types::{GroupId, GroupTypeId, MemberId, NodeId, ObjectRef, Principal, UserId};

#[derive(Debug, Clone)]
pub struct Registry {
	nodes: NodeTree,
	groups: GroupTree,
	members: HashMap<MemberId, Member>,
	roles: HashMap<String, Role>,
	memberships: MembershipStore,
	assignments: AssignmentStore,
	max_depth: usize,
}

impl Default for Registry {
	fn default() -> Self {
		Self {
			nodes: NodeTree::new(),
			groups: GroupTree::new(),
			members: HashMap::new(),
			roles: HashMap::new(),
			memberships: MembershipStore::new(),
			assignments: AssignmentStore::new(),
			max_depth: DEFAULT_MAX_ANCESTOR_DEPTH,
		}
	}
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_max_depth(mut self, max_depth: usize) -> Self {
		self.max_depth = max_depth.max(1);
		self
	}

	// =========================================================================
	// Entity graph
	// =========================================================================

	#[instrument(skip(self, title))]
	pub fn create_node(&mut self, title: impl Into<String>, parent: Option<NodeId>) -> Result<Node> {
		let node = Node::new(title, parent);
		self.nodes.insert(node.clone())?;
		tracing::debug!(node_id = %node.id, "node created");
		Ok(node)
	}

	pub fn set_node_parent(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<()> {
		self.nodes.set_parent(node, parent)
	}

	/// Deletes a node, re-rooting its children and dropping assignments that
	/// target it.
	#[instrument(skip(self))]
	pub fn delete_node(&mut self, node: NodeId) -> Result<Node> {
		let removed = self
			.nodes
			.remove(node)
			.ok_or(AuthzError::UnknownObject(ObjectRef::Node(node)))?;
		self.assignments.remove_object(ObjectRef::Node(node));
		tracing::debug!(node_id = %node, "node deleted");
		Ok(removed)
	}

	pub fn node(&self, id: NodeId) -> Option<&Node> {
		self.nodes.get(id)
	}

	pub fn node_ancestors(&self, id: NodeId) -> Vec<NodeId> {
		self.nodes.ancestors(id)
	}

	pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
		self.nodes.children(id)
	}

	pub fn descendants_of(&self, id: NodeId) -> Vec<NodeId> {
		self.nodes.descendants(id)
	}

	// =========================================================================
	// Groups
	// =========================================================================

	pub fn create_group_type(&mut self, label: impl Into<String>) -> Result<GroupType> {
		let group_type = GroupType::new(label);
		self.groups.insert_type(group_type.clone())?;
		Ok(group_type)
	}

	#[instrument(skip(self, name))]
	pub fn create_group(
		&mut self,
		name: impl Into<String>,
		group_type: Option<GroupTypeId>,
		parent: Option<GroupId>,
	) -> Result<Group> {
		let group = Group::new(name, group_type, parent);
		self.groups.insert(group.clone())?;
		tracing::debug!(group_id = %group.id, name = %group.name, "group created");
		Ok(group)
	}

	pub fn set_group_parent(&mut self, group: GroupId, parent: Option<GroupId>) -> Result<()> {
		self.groups.set_parent(group, parent)
	}

	/// Deletes a group together with its membership edges, the assignments
	/// it holds and the assignments targeting it. Subgroups become roots.
	#[instrument(skip(self))]
	pub fn delete_group(&mut self, group: GroupId) -> Result<Group> {
		let removed = self
			.groups
			.remove(group)
			.ok_or(AuthzError::UnknownPrincipal(Principal::Group(group)))?;
		self.memberships.remove_group(group);
		self.assignments.remove_principal(Principal::Group(group));
		self.assignments.remove_object(ObjectRef::Group(group));
		tracing::debug!(group_id = %group, "group deleted");
		Ok(removed)
	}

	pub fn group(&self, id: GroupId) -> Option<&Group> {
		self.groups.get(id)
	}

	pub fn group_by_name(&self, name: &str) -> Option<&Group> {
		self.groups.by_name(name)
	}

	pub fn group_type(&self, id: GroupTypeId) -> Option<&GroupType> {
		self.groups.group_type(id)
	}

	pub fn subgroups_of(&self, id: GroupId) -> BTreeSet<GroupId> {
		self.groups.subgroups(id)
	}

	pub fn group_ancestors(&self, id: GroupId) -> Vec<GroupId> {
		self.groups.ancestors(id)
	}

	// =========================================================================
	// Roles and members
	// =========================================================================

	/// Registers a role label usable on membership edges and as a scope label.
	pub fn create_role(&mut self, label: impl Into<String>) -> Result<Role> {
		let label = label.into();
		if !is_valid_role_label(&label) {
			return Err(AuthzError::InvalidScopeLabel(label));
		}
		if self.roles.contains_key(&label) {
			return Err(AuthzError::DuplicateName(label));
		}
		let role = Role::new(label.clone());
		self.roles.insert(label, role.clone());
		Ok(role)
	}

	pub fn role(&self, label: &str) -> Option<&Role> {
		self.roles.get(label)
	}

	pub fn create_member(
		&mut self,
		first_name: impl Into<String>,
		last_name: impl Into<String>,
	) -> Member {
		let member = Member::new(first_name, last_name);
		self.members.insert(member.id, member.clone());
		member
	}

	/// Stores a fully built member, enforcing the one-member-per-user link.
	/// An id that is already registered is rejected rather than replaced.
	pub fn insert_member(&mut self, member: Member) -> Result<()> {
		if self.members.contains_key(&member.id) {
			return Err(AuthzError::DuplicateName(member.id.to_string()));
		}
		if let Some(user) = member.user_id {
			self.ensure_user_unlinked(user, member.id)?;
		}
		self.members.insert(member.id, member);
		Ok(())
	}

	pub fn link_user(&mut self, member: MemberId, user: UserId) -> Result<()> {
		self.ensure_member(member)?;
		self.ensure_user_unlinked(user, member)?;
		if let Some(m) = self.members.get_mut(&member) {
			m.user_id = Some(user);
		}
		Ok(())
	}

	fn ensure_user_unlinked(&self, user: UserId, member: MemberId) -> Result<()> {
		if self
			.members
			.values()
			.any(|m| m.user_id == Some(user) && m.id != member)
		{
			return Err(AuthzError::UserAlreadyLinked(user));
		}
		Ok(())
	}

	pub fn member(&self, id: MemberId) -> Option<&Member> {
		self.members.get(&id)
	}

	pub fn member_for_user(&self, user: UserId) -> Option<&Member> {
		self.members.values().find(|m| m.user_id == Some(user))
	}

	// =========================================================================
	// Membership
	// =========================================================================

	/// Adds `member` to `group` with `roles` unioned into the edge.
	#[instrument(skip(self, roles))]
	pub fn add_member<I, S>(&mut self, member: MemberId, group: GroupId, roles: I) -> Result<()>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.ensure_member(member)?;
		self.ensure_group(group)?;
		let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
		if let Some(unknown) = roles.iter().find(|r| !self.roles.contains_key(*r)) {
			return Err(AuthzError::UnknownRole(unknown.clone()));
		}
		self.memberships.add(member, group, roles);
		tracing::debug!(member_id = %member, group_id = %group, "member added to group");
		Ok(())
	}

	#[instrument(skip(self))]
	pub fn remove_member(&mut self, member: MemberId, group: GroupId) -> Result<()> {
		self.ensure_member(member)?;
		self.ensure_group(group)?;
		if self.memberships.remove(member, group) {
			tracing::debug!(member_id = %member, group_id = %group, "member removed from group");
		}
		Ok(())
	}

	pub fn roles_of(&self, member: MemberId, group: GroupId) -> BTreeSet<String> {
		self.memberships.roles_of(member, group)
	}

	pub fn groups_of(&self, member: MemberId) -> BTreeSet<GroupId> {
		self.memberships.groups_of(member)
	}

	pub fn members_of(&self, group: GroupId) -> BTreeSet<MemberId> {
		self.memberships.members_of(group)
	}

	// =========================================================================
	// Assignments
	// =========================================================================

	/// Merges `permissions` into the (principal, object) record.
	///
	/// Every label is validated before anything is written, so a rejected
	/// call leaves the record untouched.
	#[instrument(skip(self, principal, object, permissions), fields(principal = %principal, object = %object))]
	pub fn assign(
		&mut self,
		principal: Principal,
		object: ObjectRef,
		permissions: &CustomPermissions,
	) -> Result<()> {
		self.ensure_principal(principal)?;
		self.ensure_object(object)?;
		let set = permissions.parse()?;
		self.ensure_role_scopes(&set)?;
		self.assignments.assign(principal, object, set);
		tracing::debug!("permissions assigned");
		Ok(())
	}

	/// Removes permissions from one scope of the (principal, object) record.
	pub fn revoke<'a, I>(
		&mut self,
		principal: Principal,
		object: ObjectRef,
		scope_label: &str,
		permissions: I,
	) -> Result<()>
	where
		I: IntoIterator<Item = &'a str>,
	{
		self.ensure_principal(principal)?;
		self.ensure_object(object)?;
		let scope = Scope::from_label(scope_label)?;
		self.assignments.revoke(principal, object, &scope, permissions);
		Ok(())
	}

	/// Drops the whole (principal, object) record.
	pub fn remove_assignment(&mut self, principal: Principal, object: ObjectRef) -> bool {
		self.assignments.remove(principal, object)
	}

	pub fn assignments_for(&self, principal: &Principal, object: &ObjectRef) -> PermissionSet {
		self.assignments.assignments_for(principal, object)
	}

	// =========================================================================
	// Checks
	// =========================================================================

	pub fn evaluator(&self) -> Evaluator<'_, NodeTree, MembershipStore, AssignmentStore> {
		Evaluator::new(&self.nodes, &self.memberships, &self.assignments).with_max_depth(self.max_depth)
	}

	pub fn has_permission(&self, member: MemberId, permission: &str, object: &ObjectRef) -> bool {
		self.evaluator().has_permission(member, permission, object)
	}

	pub fn has_perm(&self, member: MemberId, codename: &str, object: &ObjectRef) -> bool {
		self.evaluator().has_perm(member, codename, object)
	}

	pub fn effective_permissions(&self, member: MemberId, object: &ObjectRef) -> BTreeSet<String> {
		self.evaluator().effective_permissions(member, object)
	}

	// =========================================================================
	// Validation
	// =========================================================================

	fn ensure_member(&self, member: MemberId) -> Result<()> {
		if self.members.contains_key(&member) {
			Ok(())
		} else {
			Err(AuthzError::UnknownPrincipal(Principal::Member(member)))
		}
	}

	fn ensure_group(&self, group: GroupId) -> Result<()> {
		if self.groups.contains(group) {
			Ok(())
		} else {
			Err(AuthzError::UnknownPrincipal(Principal::Group(group)))
		}
	}

	fn ensure_principal(&self, principal: Principal) -> Result<()> {
		match principal {
			Principal::Member(id) => self.ensure_member(id),
			Principal::Group(id) => self.ensure_group(id),
		}
	}

	fn ensure_object(&self, object: ObjectRef) -> Result<()> {
		let known = match object {
			ObjectRef::Node(id) => self.nodes.contains(id),
			ObjectRef::Group(id) => self.groups.contains(id),
		};
		if known {
			Ok(())
		} else {
			Err(AuthzError::UnknownObject(object))
		}
	}

	fn ensure_role_scopes(&self, set: &PermissionSet) -> Result<()> {
		for (role, _) in set.role_scopes() {
			if !self.roles.contains_key(role) {
				return Err(AuthzError::InvalidScopeLabel(role.to_string()));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	mod groups {
		use super::*;

		#[test]
		fn create_group_rejects_duplicate_name() {
			let mut registry = Registry::new();
			registry.create_group("n:1:read", None, None).unwrap();

			let err = registry.create_group("n:1:read", None, None).unwrap_err();
			assert_eq!(err, AuthzError::DuplicateName("n:1:read".to_string()));
		}

		#[test]
		fn set_group_parent_rejects_cycle() {
			let mut registry = Registry::new();
			let a = registry.create_group("a", None, None).unwrap();
			let b = registry.create_group("b", None, Some(a.id)).unwrap();

			assert!(matches!(
				registry.set_group_parent(a.id, Some(b.id)),
				Err(AuthzError::Cycle(_))
			));
			assert_eq!(registry.subgroups_of(a.id), BTreeSet::from([b.id]));
		}

		#[test]
		fn group_type_is_recorded() {
			let mut registry = Registry::new();
			let admin = registry.create_group_type("admin").unwrap();
			let group = registry
				.create_group("n:1:admin", Some(admin.id), None)
				.unwrap();

			let stored = registry.group(group.id).unwrap();
			assert_eq!(
				stored.group_type.and_then(|t| registry.group_type(t)).map(|t| t.label.as_str()),
				Some("admin")
			);
		}

		#[test]
		fn delete_group_drops_edges_and_grants() {
			let mut registry = Registry::new();
			let node = registry.create_node("Node 1", None).unwrap();
			let parent = registry.create_group("parent", None, None).unwrap();
			let child = registry.create_group("child", None, Some(parent.id)).unwrap();
			let member = registry.create_member("Member", "One");
			registry
				.add_member(member.id, parent.id, Vec::<String>::new())
				.unwrap();
			registry
				.assign(
					Principal::Group(parent.id),
					ObjectRef::Node(node.id),
					&CustomPermissions::new().group(["view"]),
				)
				.unwrap();

			registry.delete_group(parent.id).unwrap();
			assert!(registry.group_by_name("parent").is_none());
			assert_eq!(registry.group(child.id).and_then(|g| g.parent), None);
			assert!(registry.groups_of(member.id).is_empty());
			assert!(!registry.has_permission(member.id, "view", &ObjectRef::Node(node.id)));
			assert!(matches!(
				registry.delete_group(parent.id),
				Err(AuthzError::UnknownPrincipal(_))
			));
		}
	}

	mod membership {
		use super::*;

		#[test]
		fn add_member_rejects_unknown_group() {
			let mut registry = Registry::new();
			let member = registry.create_member("Member", "One");
			let missing = GroupId::generate();

			let err = registry
				.add_member(member.id, missing, Vec::<String>::new())
				.unwrap_err();
			assert_eq!(err, AuthzError::UnknownPrincipal(Principal::Group(missing)));
		}

		#[test]
		fn add_member_rejects_unregistered_role() {
			let mut registry = Registry::new();
			let member = registry.create_member("Member", "One");
			let group = registry.create_group("g", None, None).unwrap();

			let err = registry.add_member(member.id, group.id, ["boss"]).unwrap_err();
			assert_eq!(err, AuthzError::UnknownRole("boss".to_string()));
			assert!(registry.groups_of(member.id).is_empty());
		}

		#[test]
		fn child_group_membership_is_not_transitive() {
			let mut registry = Registry::new();
			let parent = registry.create_group("parent", None, None).unwrap();
			let child = registry.create_group("child", None, Some(parent.id)).unwrap();
			let member = registry.create_member("Member", "One");
			registry
				.add_member(member.id, child.id, Vec::<String>::new())
				.unwrap();

			assert_eq!(registry.groups_of(member.id), BTreeSet::from([child.id]));
			assert!(registry.members_of(parent.id).is_empty());
		}

		#[test]
		fn remove_member_drops_edge_and_grants() {
			let mut registry = Registry::new();
			let node = registry.create_node("Node 1", None).unwrap();
			let group = registry.create_group("g", None, None).unwrap();
			let member = registry.create_member("Member", "One");
			registry
				.add_member(member.id, group.id, Vec::<String>::new())
				.unwrap();
			registry
				.assign(
					Principal::Group(group.id),
					ObjectRef::Node(node.id),
					&CustomPermissions::new().group(["view"]),
				)
				.unwrap();
			assert!(registry.has_permission(member.id, "view", &ObjectRef::Node(node.id)));

			registry.remove_member(member.id, group.id).unwrap();
			assert!(!registry.has_permission(member.id, "view", &ObjectRef::Node(node.id)));
		}

		#[test]
		fn insert_member_rejects_existing_id() {
			let mut registry = Registry::new();
			let original = registry.create_member("Member", "One");
			let mut clash = Member::new("Someone", "Else");
			clash.id = original.id;

			assert_eq!(
				registry.insert_member(clash).unwrap_err(),
				AuthzError::DuplicateName(original.id.to_string())
			);
			assert_eq!(
				registry.member(original.id).map(|m| m.last_name.as_str()),
				Some("One")
			);
		}

		#[test]
		fn user_link_is_one_to_one() {
			let mut registry = Registry::new();
			let user = UserId::generate();
			let a = registry.create_member("Member", "A");
			let b = registry.create_member("Member", "B");

			registry.link_user(a.id, user).unwrap();
			assert_eq!(
				registry.link_user(b.id, user).unwrap_err(),
				AuthzError::UserAlreadyLinked(user)
			);
			assert_eq!(registry.member_for_user(user).map(|m| m.id), Some(a.id));
			// Relinking the same member is fine.
			registry.link_user(a.id, user).unwrap();
		}
	}

	mod assignments {
		use super::*;

		#[test]
		fn assign_rejects_unknown_object() {
			let mut registry = Registry::new();
			let group = registry.create_group("g", None, None).unwrap();
			let missing = ObjectRef::Node(NodeId::generate());

			let err = registry
				.assign(
					Principal::Group(group.id),
					missing,
					&CustomPermissions::new().group(["view"]),
				)
				.unwrap_err();
			assert_eq!(err, AuthzError::UnknownObject(missing));
		}

		#[test]
		fn assign_rejects_unknown_principal() {
			let mut registry = Registry::new();
			let node = registry.create_node("Node 1", None).unwrap();
			let ghost = Principal::Member(MemberId::generate());

			let err = registry
				.assign(
					ghost,
					ObjectRef::Node(node.id),
					&CustomPermissions::new().group(["view"]),
				)
				.unwrap_err();
			assert_eq!(err, AuthzError::UnknownPrincipal(ghost));
		}

		#[test]
		fn assign_rejects_unregistered_role_label() {
			let mut registry = Registry::new();
			let node = registry.create_node("Node 1", None).unwrap();
			let group = registry.create_group("g", None, None).unwrap();

			let err = registry
				.assign(
					Principal::Group(group.id),
					ObjectRef::Node(node.id),
					&CustomPermissions::new()
						.group(["view"])
						.with("groups_downstream", ["view"]),
				)
				.unwrap_err();
			assert_eq!(
				err,
				AuthzError::InvalidScopeLabel("groups_downstream".to_string())
			);
			assert!(registry
				.assignments_for(&Principal::Group(group.id), &ObjectRef::Node(node.id))
				.is_empty());
		}

		#[test]
		fn create_role_rejects_reserved_label() {
			let mut registry = Registry::new();
			assert!(matches!(
				registry.create_role("groups_upstream"),
				Err(AuthzError::InvalidScopeLabel(_))
			));
			registry.create_role("manager").unwrap();
			assert!(matches!(
				registry.create_role("manager"),
				Err(AuthzError::DuplicateName(_))
			));
		}

		#[test]
		fn revoke_narrows_and_remove_clears() {
			let mut registry = Registry::new();
			let node = registry.create_node("Node 1", None).unwrap();
			let member = registry.create_member("Member", "One");
			let principal = Principal::Member(member.id);
			let object = ObjectRef::Node(node.id);
			registry
				.assign(
					principal,
					object,
					&CustomPermissions::new().group(["view", "change"]),
				)
				.unwrap();

			registry.revoke(principal, object, "group", ["change"]).unwrap();
			assert!(registry.has_permission(member.id, "view", &object));
			assert!(!registry.has_permission(member.id, "change", &object));

			assert!(registry.remove_assignment(principal, object));
			assert!(!registry.has_permission(member.id, "view", &object));
		}

		#[test]
		fn delete_node_drops_its_assignments_and_reroots_children() {
			let mut registry = Registry::new();
			let n1 = registry.create_node("Node 1", None).unwrap();
			let n2 = registry.create_node("Node 2", Some(n1.id)).unwrap();
			let member = registry.create_member("Member", "One");
			registry
				.assign(
					Principal::Member(member.id),
					ObjectRef::Node(n1.id),
					&CustomPermissions::new().groups_upstream(["view"]),
				)
				.unwrap();
			assert!(registry.has_permission(member.id, "view", &ObjectRef::Node(n2.id)));

			registry.delete_node(n1.id).unwrap();
			assert_eq!(registry.node(n2.id).and_then(|n| n.parent), None);
			assert!(!registry.has_permission(member.id, "view", &ObjectRef::Node(n2.id)));
		}
	}

	#[test]
	fn has_permission_never_fails_for_unknown_ids() {
		let registry = Registry::new();
		assert!(!registry.has_permission(
			MemberId::generate(),
			"view",
			&ObjectRef::Group(GroupId::generate())
		));
	}
}
