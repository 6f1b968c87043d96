// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database-backed permission checks.
//!
//! A check loads everything it can possibly consult into an [`AuthzSnapshot`]
//! inside one read transaction: the member's edges, the target's ancestor
//! chain, and the assignments of every held principal on each object of that
//! chain. Evaluation then runs on the pure engine.

use async_trait::async_trait;
use grove_authz::{
	permission_from_codename, AssignmentStore, EntityGraph, Evaluator, MemberId, MembershipStore,
	ObjectRef, Principal, DEFAULT_MAX_ANCESTOR_DEPTH,
};
use sqlx::sqlite::SqlitePool;
use std::collections::{BTreeSet, HashMap};

use crate::assignment::fetch_permission_set;
use crate::error::DbError;
use crate::member::member_edges;
use crate::node::node_ancestors;

/// Read surface for permission checks.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
	async fn has_permission(
		&self,
		member: MemberId,
		permission: &str,
		object: &ObjectRef,
	) -> Result<bool, DbError>;
	async fn has_perm(&self, member: MemberId, codename: &str, object: &ObjectRef)
		-> Result<bool, DbError>;
	async fn effective_permissions(
		&self,
		member: MemberId,
		object: &ObjectRef,
	) -> Result<BTreeSet<String>, DbError>;
}

/// Everything one check can consult, loaded up front.
#[derive(Debug, Default)]
pub struct AuthzSnapshot {
	parents: HashMap<ObjectRef, ObjectRef>,
	memberships: MembershipStore,
	assignments: AssignmentStore,
	max_depth: usize,
}

impl AuthzSnapshot {
	pub fn evaluator(&self) -> Evaluator<'_, Self, MembershipStore, AssignmentStore> {
		Evaluator::new(self, &self.memberships, &self.assignments).with_max_depth(self.max_depth)
	}
}

impl EntityGraph for AuthzSnapshot {
	fn parent_of(&self, object: &ObjectRef) -> Option<ObjectRef> {
		self.parents.get(object).copied()
	}
}

/// Repository answering permission checks from the database.
#[derive(Clone)]
pub struct AuthzRepository {
	pool: SqlitePool,
	max_depth: usize,
}

impl AuthzRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool,
			max_depth: DEFAULT_MAX_ANCESTOR_DEPTH,
		}
	}

	pub fn with_max_depth(mut self, max_depth: usize) -> Self {
		self.max_depth = max_depth.max(1);
		self
	}

	/// Load the data a check of `member` against `object` depends on.
	#[tracing::instrument(skip(self, object), fields(member_id = %member, object = %object))]
	pub async fn snapshot(&self, member: MemberId, object: &ObjectRef) -> Result<AuthzSnapshot, DbError> {
		let mut tx = self.pool.begin().await?;
		let mut snapshot = AuthzSnapshot {
			max_depth: self.max_depth,
			..AuthzSnapshot::default()
		};

		let edges = member_edges(&mut tx, member).await?;
		let mut principals = vec![Principal::Member(member)];
		for (group, roles) in edges {
			snapshot.memberships.add(member, group, roles);
			principals.push(Principal::Group(group));
		}

		let mut chain = vec![*object];
		if let ObjectRef::Node(id) = object {
			let mut child = *object;
			for ancestor in node_ancestors(&mut tx, *id, self.max_depth).await? {
				let ancestor = ObjectRef::Node(ancestor);
				snapshot.parents.insert(child, ancestor);
				chain.push(ancestor);
				child = ancestor;
			}
		}

		for target in &chain {
			for principal in &principals {
				let set = fetch_permission_set(&mut tx, *principal, *target).await?;
				if !set.is_empty() {
					snapshot.assignments.assign(*principal, *target, set);
				}
			}
		}

		tx.commit().await?;
		tracing::debug!(
			principals = principals.len(),
			chain = chain.len(),
			records = snapshot.assignments.len(),
			"authz snapshot loaded"
		);
		Ok(snapshot)
	}

	pub async fn has_permission(
		&self,
		member: MemberId,
		permission: &str,
		object: &ObjectRef,
	) -> Result<bool, DbError> {
		let snapshot = self.snapshot(member, object).await?;
		Ok(snapshot.evaluator().has_permission(member, permission, object))
	}

	/// Codename form, e.g. `delete_node`. A codename for another model is
	/// denied without touching the database.
	pub async fn has_perm(
		&self,
		member: MemberId,
		codename: &str,
		object: &ObjectRef,
	) -> Result<bool, DbError> {
		match permission_from_codename(codename, object) {
			Some(permission) => self.has_permission(member, permission, object).await,
			None => Ok(false),
		}
	}

	pub async fn effective_permissions(
		&self,
		member: MemberId,
		object: &ObjectRef,
	) -> Result<BTreeSet<String>, DbError> {
		let snapshot = self.snapshot(member, object).await?;
		Ok(snapshot.evaluator().effective_permissions(member, object))
	}
}

#[async_trait]
impl PermissionChecker for AuthzRepository {
	async fn has_permission(
		&self,
		member: MemberId,
		permission: &str,
		object: &ObjectRef,
	) -> Result<bool, DbError> {
		self.has_permission(member, permission, object).await
	}

	async fn has_perm(
		&self,
		member: MemberId,
		codename: &str,
		object: &ObjectRef,
	) -> Result<bool, DbError> {
		self.has_perm(member, codename, object).await
	}

	async fn effective_permissions(
		&self,
		member: MemberId,
		object: &ObjectRef,
	) -> Result<BTreeSet<String>, DbError> {
		self.effective_permissions(member, object).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_migrated_pool;
	use crate::{AssignmentRepository, GroupRepository, MemberRepository, NodeRepository};
	use grove_authz::{CustomPermissions, Group, Member, Node, Role};

	struct Fixture {
		pool: SqlitePool,
		nodes: Vec<Node>,
	}

	impl Fixture {
		async fn chain() -> Self {
			let pool = create_migrated_pool().await;
			let repo = NodeRepository::new(pool.clone());
			let mut nodes: Vec<Node> = Vec::new();
			for title in ["Node 1", "Node 2", "Node 3"] {
				let node = Node::new(title, nodes.last().map(|n| n.id));
				repo.create_node(&node).await.unwrap();
				nodes.push(node);
			}
			Self { pool, nodes }
		}

		fn node(&self, index: usize) -> ObjectRef {
			ObjectRef::Node(self.nodes[index].id)
		}

		async fn member_in(&self, group: &Group, roles: &[String]) -> MemberId {
			let members = MemberRepository::new(self.pool.clone());
			let member = Member::new("Member", "One");
			members.create_member(&member).await.unwrap();
			members.add_member(member.id, group.id, roles).await.unwrap();
			member.id
		}

		async fn group(&self, name: &str) -> Group {
			let group = Group::new(name, None, None);
			GroupRepository::new(self.pool.clone())
				.create_group(&group)
				.await
				.unwrap();
			group
		}

		async fn assign(&self, principal: Principal, object: ObjectRef, perms: CustomPermissions) {
			AssignmentRepository::new(self.pool.clone())
				.assign(principal, object, &perms)
				.await
				.unwrap();
		}

		fn checker(&self) -> AuthzRepository {
			AuthzRepository::new(self.pool.clone())
		}
	}

	#[tokio::test]
	async fn upstream_flows_down_only() {
		let f = Fixture::chain().await;
		let admin = f.group("n:1:admin").await;
		f.assign(
			Principal::Group(admin.id),
			f.node(0),
			CustomPermissions::new()
				.group(["view", "change", "delete"])
				.groups_upstream(["view"]),
		)
		.await;
		let member = f.member_in(&admin, &[]).await;
		let checker = f.checker();

		assert!(checker.has_perm(member, "delete_node", &f.node(0)).await.unwrap());
		assert!(checker.has_perm(member, "view_node", &f.node(2)).await.unwrap());
		assert!(!checker.has_perm(member, "change_node", &f.node(1)).await.unwrap());
	}

	#[tokio::test]
	async fn leaf_grant_does_not_reach_root() {
		let f = Fixture::chain().await;
		let leaf_admin = f.group("n:3:admin").await;
		f.assign(
			Principal::Group(leaf_admin.id),
			f.node(2),
			CustomPermissions::new()
				.group(["view", "change", "delete"])
				.groups_upstream(["view"]),
		)
		.await;
		let member = f.member_in(&leaf_admin, &[]).await;
		let checker = f.checker();

		assert!(checker.has_permission(member, "delete", &f.node(2)).await.unwrap());
		assert!(!checker.has_permission(member, "delete", &f.node(0)).await.unwrap());
		assert!(!checker.has_permission(member, "view", &f.node(0)).await.unwrap());
	}

	#[tokio::test]
	async fn depth_limit_bounds_the_walk() {
		let f = Fixture::chain().await;
		let admin = f.group("n:1:admin").await;
		f.assign(
			Principal::Group(admin.id),
			f.node(0),
			CustomPermissions::new().groups_upstream(["view"]),
		)
		.await;
		let member = f.member_in(&admin, &[]).await;
		let checker = f.checker().with_max_depth(1);

		assert!(checker.has_permission(member, "view", &f.node(1)).await.unwrap());
		assert!(!checker.has_permission(member, "view", &f.node(2)).await.unwrap());
	}

	#[tokio::test]
	async fn role_scope_needs_role_on_edge() {
		let f = Fixture::chain().await;
		GroupRepository::new(f.pool.clone())
			.create_role(&Role::new("manager"))
			.await
			.unwrap();
		let team = f.group("team").await;
		f.assign(
			Principal::Group(team.id),
			f.node(0),
			CustomPermissions::new()
				.group(["view"])
				.role("manager", ["change"]),
		)
		.await;
		let plain = f.member_in(&team, &[]).await;
		let manager = f.member_in(&team, &["manager".to_string()]).await;
		let checker = f.checker();

		assert_eq!(
			checker.effective_permissions(plain, &f.node(0)).await.unwrap(),
			BTreeSet::from(["view".to_string()])
		);
		assert_eq!(
			checker.effective_permissions(manager, &f.node(0)).await.unwrap(),
			BTreeSet::from(["change".to_string(), "view".to_string()])
		);
	}

	#[tokio::test]
	async fn unknown_ids_are_denied() {
		let f = Fixture::chain().await;
		let checker: Box<dyn PermissionChecker> = Box::new(f.checker());

		assert!(!checker
			.has_permission(MemberId::generate(), "view", &f.node(0))
			.await
			.unwrap());
		assert!(!checker
			.has_perm(MemberId::generate(), "view_group", &f.node(0))
			.await
			.unwrap());
	}
}
