// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Group repository for database operations.
//!
//! This module provides database access for:
//! - Group types (descriptive labels)
//! - Groups and their administrative parent tree
//! - Roles that can be carried on membership edges

use grove_authz::{
	is_valid_role_label, AuthzError, Group, GroupId, GroupType, GroupTypeId, Principal, Role, RoleId,
};
use sqlx::{
	sqlite::{SqlitePool, SqliteRow},
	Row, SqliteConnection,
};

use crate::error::{duplicate_name, DbError};
use crate::row::{optional_uuid_column, timestamp_column, uuid_column};

/// Parent of a group: `None` if the group does not exist, `Some(None)` for a
/// root.
pub(crate) async fn group_parent(
	conn: &mut SqliteConnection,
	id: GroupId,
) -> Result<Option<Option<GroupId>>, DbError> {
	let row: Option<(Option<String>,)> =
		sqlx::query_as("SELECT parent_id FROM auth_groups WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&mut *conn)
			.await?;

	row
		.map(|(parent,)| {
			parent
				.map(|p| {
					p.parse::<GroupId>()
						.map_err(|e| DbError::Internal(format!("Invalid parent_id: {e}")))
				})
				.transpose()
		})
		.transpose()
}

async fn group_ancestors(conn: &mut SqliteConnection, id: GroupId) -> Result<Vec<GroupId>, DbError> {
	let mut chain = Vec::new();
	let mut current = group_parent(conn, id).await?.flatten();
	while let Some(parent) = current {
		if parent == id || chain.contains(&parent) {
			break;
		}
		chain.push(parent);
		current = group_parent(conn, parent).await?.flatten();
	}
	Ok(chain)
}

/// Same checks as the in-memory tree: the parent exists and `id` is not
/// among its ancestors.
async fn check_group_parent(
	conn: &mut SqliteConnection,
	id: GroupId,
	parent: GroupId,
) -> Result<(), DbError> {
	if parent == id {
		return Err(AuthzError::Cycle(format!("group {id} cannot be its own parent")).into());
	}
	if group_parent(conn, parent).await?.is_none() {
		return Err(AuthzError::UnknownPrincipal(Principal::Group(parent)).into());
	}
	if group_ancestors(conn, parent).await?.contains(&id) {
		return Err(AuthzError::Cycle(format!("group {parent} descends from {id}")).into());
	}
	Ok(())
}

/// Repository for groups, group types and roles.
#[derive(Clone)]
pub struct GroupRepository {
	pool: SqlitePool,
}

impl GroupRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	// =========================================================================
	// Group types
	// =========================================================================

	#[tracing::instrument(skip(self, group_type), fields(label = %group_type.label))]
	pub async fn create_group_type(&self, group_type: &GroupType) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO group_types (id, label, created_at)
			VALUES (?, ?, ?)
			"#,
		)
		.bind(group_type.id.to_string())
		.bind(&group_type.label)
		.bind(group_type.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(duplicate_name(&group_type.label))?;

		tracing::debug!(group_type_id = %group_type.id, "group type created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(group_type_id = %id))]
	pub async fn get_group_type(&self, id: GroupTypeId) -> Result<Option<GroupType>, DbError> {
		let row = sqlx::query("SELECT id, label, created_at FROM group_types WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row
			.map(|r| {
				Ok(GroupType {
					id: GroupTypeId::new(uuid_column(&r, "id")?),
					label: r.get("label"),
					created_at: timestamp_column(&r, "created_at")?,
				})
			})
			.transpose()
	}

	// =========================================================================
	// Groups
	// =========================================================================

	/// Insert a group, checking name uniqueness and the parent chain in one
	/// transaction.
	#[tracing::instrument(skip(self, group), fields(group_id = %group.id, name = %group.name))]
	pub async fn create_group(&self, group: &Group) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;

		if let Some(type_id) = group.group_type {
			let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM group_types WHERE id = ?")
				.bind(type_id.to_string())
				.fetch_optional(&mut *tx)
				.await?;
			if exists.is_none() {
				return Err(
					AuthzError::InvalidReference(format!("unknown group type {type_id}")).into(),
				);
			}
		}
		if let Some(parent) = group.parent {
			check_group_parent(&mut tx, group.id, parent).await?;
		}

		sqlx::query(
			r#"
			INSERT INTO auth_groups (id, name, group_type_id, parent_id, created_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(group.id.to_string())
		.bind(&group.name)
		.bind(group.group_type.map(|t| t.to_string()))
		.bind(group.parent.map(|p| p.to_string()))
		.bind(group.created_at.to_rfc3339())
		.execute(&mut *tx)
		.await
		.map_err(duplicate_name(&group.name))?;

		tx.commit().await?;
		tracing::debug!(group_id = %group.id, "group created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn set_group_parent(&self, id: GroupId, parent: Option<GroupId>) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;

		if group_parent(&mut tx, id).await?.is_none() {
			return Err(AuthzError::UnknownPrincipal(Principal::Group(id)).into());
		}
		if let Some(parent) = parent {
			check_group_parent(&mut tx, id, parent).await?;
		}

		sqlx::query("UPDATE auth_groups SET parent_id = ? WHERE id = ?")
			.bind(parent.map(|p| p.to_string()))
			.bind(id.to_string())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		tracing::debug!(group_id = %id, "group moved");
		Ok(())
	}

	/// Delete a group. Subgroups become roots; memberships cascade; assignments
	/// held by or targeting the group are dropped in the same transaction.
	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn delete_group(&self, id: GroupId) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;
		let group_id = id.to_string();

		sqlx::query("UPDATE auth_groups SET parent_id = NULL WHERE parent_id = ?")
			.bind(&group_id)
			.execute(&mut *tx)
			.await?;

		sqlx::query(
			r#"
			DELETE FROM permission_assignments
			WHERE (principal_kind = 'group' AND principal_id = ?)
				OR (object_kind = 'group' AND object_id = ?)
			"#,
		)
		.bind(&group_id)
		.bind(&group_id)
		.execute(&mut *tx)
		.await?;

		let result = sqlx::query("DELETE FROM auth_groups WHERE id = ?")
			.bind(&group_id)
			.execute(&mut *tx)
			.await?;
		if result.rows_affected() == 0 {
			return Err(AuthzError::UnknownPrincipal(Principal::Group(id)).into());
		}

		tx.commit().await?;
		tracing::debug!(group_id = %id, "group deleted");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn get_group(&self, id: GroupId) -> Result<Option<Group>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, group_type_id, parent_id, created_at
			FROM auth_groups
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_group(&r)).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn group_by_name(&self, name: &str) -> Result<Option<Group>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, group_type_id, parent_id, created_at
			FROM auth_groups
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_group(&r)).transpose()
	}

	/// Direct subgroups, ordered by name.
	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn subgroups_of(&self, id: GroupId) -> Result<Vec<Group>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, group_type_id, parent_id, created_at
			FROM auth_groups
			WHERE parent_id = ?
			ORDER BY name ASC
			"#,
		)
		.bind(id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_group).collect()
	}

	/// Strict ancestors in the group tree, nearest first.
	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn group_ancestors(&self, id: GroupId) -> Result<Vec<GroupId>, DbError> {
		let mut conn = self.pool.acquire().await?;
		group_ancestors(&mut conn, id).await
	}

	// =========================================================================
	// Roles
	// =========================================================================

	/// Register a role label. Reserved scope labels are rejected.
	#[tracing::instrument(skip(self, role), fields(label = %role.label))]
	pub async fn create_role(&self, role: &Role) -> Result<(), DbError> {
		if !is_valid_role_label(&role.label) {
			return Err(AuthzError::InvalidScopeLabel(role.label.clone()).into());
		}

		sqlx::query(
			r#"
			INSERT INTO roles (id, label, created_at)
			VALUES (?, ?, ?)
			"#,
		)
		.bind(role.id.to_string())
		.bind(&role.label)
		.bind(role.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(duplicate_name(&role.label))?;

		tracing::debug!(role_id = %role.id, "role created");
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn role_by_label(&self, label: &str) -> Result<Option<Role>, DbError> {
		let row = sqlx::query("SELECT id, label, created_at FROM roles WHERE label = ?")
			.bind(label)
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| row_to_role(&r)).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_roles(&self) -> Result<Vec<Role>, DbError> {
		let rows = sqlx::query("SELECT id, label, created_at FROM roles ORDER BY label ASC")
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(row_to_role).collect()
	}
}

fn row_to_group(row: &SqliteRow) -> Result<Group, DbError> {
	Ok(Group {
		id: GroupId::new(uuid_column(row, "id")?),
		name: row.get("name"),
		group_type: optional_uuid_column(row, "group_type_id")?.map(GroupTypeId::new),
		parent: optional_uuid_column(row, "parent_id")?.map(GroupId::new),
		created_at: timestamp_column(row, "created_at")?,
	})
}

fn row_to_role(row: &SqliteRow) -> Result<Role, DbError> {
	Ok(Role {
		id: RoleId::new(uuid_column(row, "id")?),
		label: row.get("label"),
		created_at: timestamp_column(row, "created_at")?,
	})
}
