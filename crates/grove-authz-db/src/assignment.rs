// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Assignment repository: permission sets per (principal, object).

use grove_authz::{AuthzError, CustomPermissions, ObjectRef, PermissionSet, Principal, Scope};
use sqlx::{sqlite::SqlitePool, SqliteConnection};
use std::collections::BTreeMap;

use crate::error::DbError;
use crate::member::{group_exists, member_exists};
use crate::node::node_parent;

async fn principal_exists(conn: &mut SqliteConnection, principal: Principal) -> Result<bool, DbError> {
	match principal {
		Principal::Member(id) => member_exists(conn, id).await,
		Principal::Group(id) => group_exists(conn, id).await,
	}
}

async fn object_exists(conn: &mut SqliteConnection, object: ObjectRef) -> Result<bool, DbError> {
	match object {
		ObjectRef::Node(id) => Ok(node_parent(conn, id).await?.is_some()),
		ObjectRef::Group(id) => group_exists(conn, id).await,
	}
}

/// Stored permission set for (principal, object), empty if none.
pub(crate) async fn fetch_permission_set(
	conn: &mut SqliteConnection,
	principal: Principal,
	object: ObjectRef,
) -> Result<PermissionSet, DbError> {
	let rows: Vec<(String, String)> = sqlx::query_as(
		r#"
		SELECT scope, permission
		FROM permission_assignments
		WHERE principal_kind = ? AND principal_id = ? AND object_kind = ? AND object_id = ?
		"#,
	)
	.bind(principal.kind())
	.bind(principal.uuid().to_string())
	.bind(object.model_name())
	.bind(object.uuid().to_string())
	.fetch_all(&mut *conn)
	.await?;

	let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
	for (scope, permission) in rows {
		grouped.entry(scope).or_default().push(permission);
	}

	let mut set = PermissionSet::new();
	for (label, permissions) in grouped {
		let scope = Scope::from_label(&label)
			.map_err(|e| DbError::Internal(format!("Invalid stored scope: {e}")))?;
		set.set_scope(scope, permissions);
	}
	Ok(set)
}

/// Repository for permission assignments.
#[derive(Clone)]
pub struct AssignmentRepository {
	pool: SqlitePool,
}

impl AssignmentRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Merge `permissions` into the (principal, object) record.
	///
	/// Each mentioned scope is replaced wholesale; an empty list clears it.
	/// Validation happens before any write and the whole merge commits as one
	/// transaction.
	#[tracing::instrument(skip(self, principal, object, permissions), fields(principal = %principal, object = %object))]
	pub async fn assign(
		&self,
		principal: Principal,
		object: ObjectRef,
		permissions: &CustomPermissions,
	) -> Result<(), DbError> {
		let set = permissions.parse()?;
		let mut tx = self.pool.begin().await?;

		if !principal_exists(&mut tx, principal).await? {
			return Err(AuthzError::UnknownPrincipal(principal).into());
		}
		if !object_exists(&mut tx, object).await? {
			return Err(AuthzError::UnknownObject(object).into());
		}
		for (role, _) in set.role_scopes() {
			let known: Option<(String,)> = sqlx::query_as("SELECT id FROM roles WHERE label = ?")
				.bind(role)
				.fetch_optional(&mut *tx)
				.await?;
			if known.is_none() {
				return Err(AuthzError::InvalidScopeLabel(role.to_string()).into());
			}
		}

		for (scope, granted) in set.iter() {
			sqlx::query(
				r#"
				DELETE FROM permission_assignments
				WHERE principal_kind = ? AND principal_id = ? AND object_kind = ? AND object_id = ?
					AND scope = ?
				"#,
			)
			.bind(principal.kind())
			.bind(principal.uuid().to_string())
			.bind(object.model_name())
			.bind(object.uuid().to_string())
			.bind(scope.label())
			.execute(&mut *tx)
			.await?;

			for permission in granted {
				sqlx::query(
					r#"
					INSERT INTO permission_assignments
						(principal_kind, principal_id, object_kind, object_id, scope, permission)
					VALUES (?, ?, ?, ?, ?, ?)
					"#,
				)
				.bind(principal.kind())
				.bind(principal.uuid().to_string())
				.bind(object.model_name())
				.bind(object.uuid().to_string())
				.bind(scope.label())
				.bind(permission)
				.execute(&mut *tx)
				.await?;
			}
		}

		tx.commit().await?;
		tracing::debug!("permissions assigned");
		Ok(())
	}

	/// Remove individual permissions from one scope.
	#[tracing::instrument(skip(self, principal, object, permissions), fields(principal = %principal, object = %object))]
	pub async fn revoke(
		&self,
		principal: Principal,
		object: ObjectRef,
		scope_label: &str,
		permissions: &[String],
	) -> Result<(), DbError> {
		let scope = Scope::from_label(scope_label)?;
		let mut tx = self.pool.begin().await?;

		for permission in permissions {
			sqlx::query(
				r#"
				DELETE FROM permission_assignments
				WHERE principal_kind = ? AND principal_id = ? AND object_kind = ? AND object_id = ?
					AND scope = ? AND permission = ?
				"#,
			)
			.bind(principal.kind())
			.bind(principal.uuid().to_string())
			.bind(object.model_name())
			.bind(object.uuid().to_string())
			.bind(scope.label())
			.bind(permission)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		tracing::debug!(scope = %scope, count = permissions.len(), "permissions revoked");
		Ok(())
	}

	/// Drop the whole record. Returns `false` if there was none.
	#[tracing::instrument(skip(self, principal, object), fields(principal = %principal, object = %object))]
	pub async fn remove_assignment(
		&self,
		principal: Principal,
		object: ObjectRef,
	) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			DELETE FROM permission_assignments
			WHERE principal_kind = ? AND principal_id = ? AND object_kind = ? AND object_id = ?
			"#,
		)
		.bind(principal.kind())
		.bind(principal.uuid().to_string())
		.bind(object.model_name())
		.bind(object.uuid().to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self, principal, object), fields(principal = %principal, object = %object))]
	pub async fn assignments_for(
		&self,
		principal: Principal,
		object: ObjectRef,
	) -> Result<PermissionSet, DbError> {
		let mut conn = self.pool.acquire().await?;
		fetch_permission_set(&mut conn, principal, object).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::group::GroupRepository;
	use crate::node::NodeRepository;
	use crate::testing::create_migrated_pool;
	use grove_authz::{Group, Node, NodeId, Role};

	struct Fixture {
		assignments: AssignmentRepository,
		groups: GroupRepository,
		principal: Principal,
		object: ObjectRef,
	}

	async fn fixture() -> Fixture {
		let pool = create_migrated_pool().await;
		let nodes = NodeRepository::new(pool.clone());
		let groups = GroupRepository::new(pool.clone());

		let node = Node::new("Node 1", None);
		nodes.create_node(&node).await.unwrap();
		let group = Group::new("n:1:admin", None, None);
		groups.create_group(&group).await.unwrap();

		Fixture {
			assignments: AssignmentRepository::new(pool),
			groups,
			principal: Principal::Group(group.id),
			object: ObjectRef::Node(node.id),
		}
	}

	#[tokio::test]
	async fn reassign_overwrites_mentioned_scopes_only() {
		let f = fixture().await;
		f.assignments
			.assign(
				f.principal,
				f.object,
				&CustomPermissions::new()
					.group(["view", "change", "delete"])
					.groups_upstream(["view"]),
			)
			.await
			.unwrap();
		f.assignments
			.assign(f.principal, f.object, &CustomPermissions::new().group(["view"]))
			.await
			.unwrap();

		let set = f.assignments.assignments_for(f.principal, f.object).await.unwrap();
		assert!(set.grants(&Scope::Blanket, "view"));
		assert!(!set.grants(&Scope::Blanket, "delete"));
		assert!(set.grants(&Scope::Upstream, "view"));
	}

	#[tokio::test]
	async fn rejects_unknown_object() {
		let f = fixture().await;
		let missing = ObjectRef::Node(NodeId::generate());

		let err = f
			.assignments
			.assign(f.principal, missing, &CustomPermissions::new().group(["view"]))
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::Authz(AuthzError::UnknownObject(_))));
	}

	#[tokio::test]
	async fn role_scope_requires_registered_role() {
		let f = fixture().await;
		let perms = CustomPermissions::new().role("manager", ["change"]);

		let err = f
			.assignments
			.assign(f.principal, f.object, &perms)
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::Authz(AuthzError::InvalidScopeLabel(_))));

		f.groups.create_role(&Role::new("manager")).await.unwrap();
		f.assignments
			.assign(f.principal, f.object, &perms)
			.await
			.unwrap();
		let set = f.assignments.assignments_for(f.principal, f.object).await.unwrap();
		assert!(set.grants(&Scope::Role("manager".to_string()), "change"));
	}

	#[tokio::test]
	async fn revoke_and_remove() {
		let f = fixture().await;
		f.assignments
			.assign(
				f.principal,
				f.object,
				&CustomPermissions::new().group(["view", "change"]),
			)
			.await
			.unwrap();

		f.assignments
			.revoke(f.principal, f.object, "group", &["change".to_string()])
			.await
			.unwrap();
		let set = f.assignments.assignments_for(f.principal, f.object).await.unwrap();
		assert!(set.grants(&Scope::Blanket, "view"));
		assert!(!set.grants(&Scope::Blanket, "change"));

		assert!(f.assignments.remove_assignment(f.principal, f.object).await.unwrap());
		assert!(f
			.assignments
			.assignments_for(f.principal, f.object)
			.await
			.unwrap()
			.is_empty());
	}
}
