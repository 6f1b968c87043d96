// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Member repository: members, user links and membership edges.

use chrono::Utc;
use grove_authz::{AuthzError, GroupId, Member, MemberId, Principal, UserId};
use sqlx::{
	sqlite::{SqlitePool, SqliteRow},
	Row, SqliteConnection,
};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::DbError;
use crate::row::{optional_uuid_column, timestamp_column, uuid_column};

pub(crate) async fn member_exists(conn: &mut SqliteConnection, id: MemberId) -> Result<bool, DbError> {
	let row: Option<(String,)> = sqlx::query_as("SELECT id FROM members WHERE id = ?")
		.bind(id.to_string())
		.fetch_optional(&mut *conn)
		.await?;
	Ok(row.is_some())
}

pub(crate) async fn group_exists(conn: &mut SqliteConnection, id: GroupId) -> Result<bool, DbError> {
	let row: Option<(String,)> = sqlx::query_as("SELECT id FROM auth_groups WHERE id = ?")
		.bind(id.to_string())
		.fetch_optional(&mut *conn)
		.await?;
	Ok(row.is_some())
}

/// Direct membership edges of a member with the roles held on each.
pub(crate) async fn member_edges(
	conn: &mut SqliteConnection,
	member: MemberId,
) -> Result<BTreeMap<GroupId, BTreeSet<String>>, DbError> {
	let rows = sqlx::query(
		r#"
		SELECT m.group_id, r.role_label
		FROM group_memberships m
		LEFT JOIN membership_roles r
			ON r.member_id = m.member_id AND r.group_id = m.group_id
		WHERE m.member_id = ?
		"#,
	)
	.bind(member.to_string())
	.fetch_all(&mut *conn)
	.await?;

	let mut edges: BTreeMap<GroupId, BTreeSet<String>> = BTreeMap::new();
	for row in &rows {
		let group = GroupId::new(uuid_column(row, "group_id")?);
		let roles = edges.entry(group).or_default();
		if let Some(role) = row.get::<Option<String>, _>("role_label") {
			roles.insert(role);
		}
	}
	Ok(edges)
}

/// Repository for members and their group memberships.
#[derive(Clone)]
pub struct MemberRepository {
	pool: SqlitePool,
}

impl MemberRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	// =========================================================================
	// Members
	// =========================================================================

	/// Insert a member. A linked user may belong to at most one member.
	#[tracing::instrument(skip(self, member), fields(member_id = %member.id))]
	pub async fn create_member(&self, member: &Member) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO members (id, first_name, last_name, username, email, user_id, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(member.id.to_string())
		.bind(&member.first_name)
		.bind(&member.last_name)
		.bind(&member.username)
		.bind(&member.email)
		.bind(member.user_id.map(|u| u.to_string()))
		.bind(member.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| match (e, member.user_id) {
			(sqlx::Error::Database(db_err), Some(user)) if db_err.is_unique_violation() => {
				DbError::Authz(AuthzError::UserAlreadyLinked(user))
			}
			(e, _) => DbError::Sqlx(e),
		})?;

		tracing::debug!(member_id = %member.id, "member created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(member_id = %id))]
	pub async fn get_member(&self, id: MemberId) -> Result<Option<Member>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, first_name, last_name, username, email, user_id, created_at
			FROM members
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_member(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user))]
	pub async fn member_for_user(&self, user: UserId) -> Result<Option<Member>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, first_name, last_name, username, email, user_id, created_at
			FROM members
			WHERE user_id = ?
			"#,
		)
		.bind(user.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_member(&r)).transpose()
	}

	/// Link an external user to a member.
	#[tracing::instrument(skip(self), fields(member_id = %member, user_id = %user))]
	pub async fn link_user(&self, member: MemberId, user: UserId) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;

		let owner: Option<(String,)> = sqlx::query_as("SELECT id FROM members WHERE user_id = ?")
			.bind(user.to_string())
			.fetch_optional(&mut *tx)
			.await?;
		if let Some((owner,)) = owner {
			if owner != member.to_string() {
				return Err(AuthzError::UserAlreadyLinked(user).into());
			}
		}

		let result = sqlx::query("UPDATE members SET user_id = ? WHERE id = ?")
			.bind(user.to_string())
			.bind(member.to_string())
			.execute(&mut *tx)
			.await?;
		if result.rows_affected() == 0 {
			return Err(AuthzError::UnknownPrincipal(Principal::Member(member)).into());
		}

		tx.commit().await?;
		tracing::debug!(member_id = %member, "user linked");
		Ok(())
	}

	// =========================================================================
	// Membership
	// =========================================================================

	/// Add a member to a group, unioning `roles` into the edge.
	///
	/// Every role must be registered; nothing is written otherwise.
	#[tracing::instrument(skip(self, roles), fields(member_id = %member, group_id = %group))]
	pub async fn add_member(
		&self,
		member: MemberId,
		group: GroupId,
		roles: &[String],
	) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;

		if !member_exists(&mut tx, member).await? {
			return Err(AuthzError::UnknownPrincipal(Principal::Member(member)).into());
		}
		if !group_exists(&mut tx, group).await? {
			return Err(AuthzError::UnknownPrincipal(Principal::Group(group)).into());
		}
		for role in roles {
			let known: Option<(String,)> = sqlx::query_as("SELECT id FROM roles WHERE label = ?")
				.bind(role)
				.fetch_optional(&mut *tx)
				.await?;
			if known.is_none() {
				return Err(AuthzError::UnknownRole(role.clone()).into());
			}
		}

		sqlx::query(
			r#"
			INSERT INTO group_memberships (member_id, group_id, created_at)
			VALUES (?, ?, ?)
			ON CONFLICT (member_id, group_id) DO NOTHING
			"#,
		)
		.bind(member.to_string())
		.bind(group.to_string())
		.bind(Utc::now().to_rfc3339())
		.execute(&mut *tx)
		.await?;

		for role in roles {
			sqlx::query(
				r#"
				INSERT INTO membership_roles (member_id, group_id, role_label)
				VALUES (?, ?, ?)
				ON CONFLICT DO NOTHING
				"#,
			)
			.bind(member.to_string())
			.bind(group.to_string())
			.bind(role)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		tracing::debug!(member_id = %member, group_id = %group, "member added to group");
		Ok(())
	}

	/// Remove the edge with its roles. Returns `false` if there was none.
	#[tracing::instrument(skip(self), fields(member_id = %member, group_id = %group))]
	pub async fn remove_member(&self, member: MemberId, group: GroupId) -> Result<bool, DbError> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("DELETE FROM membership_roles WHERE member_id = ? AND group_id = ?")
			.bind(member.to_string())
			.bind(group.to_string())
			.execute(&mut *tx)
			.await?;
		let result = sqlx::query("DELETE FROM group_memberships WHERE member_id = ? AND group_id = ?")
			.bind(member.to_string())
			.bind(group.to_string())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		let removed = result.rows_affected() > 0;
		if removed {
			tracing::debug!(member_id = %member, group_id = %group, "member removed from group");
		}
		Ok(removed)
	}

	#[tracing::instrument(skip(self), fields(member_id = %member, group_id = %group))]
	pub async fn roles_of(&self, member: MemberId, group: GroupId) -> Result<BTreeSet<String>, DbError> {
		let rows: Vec<(String,)> = sqlx::query_as(
			"SELECT role_label FROM membership_roles WHERE member_id = ? AND group_id = ?",
		)
		.bind(member.to_string())
		.bind(group.to_string())
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.into_iter().map(|(label,)| label).collect())
	}

	/// Groups the member directly belongs to.
	#[tracing::instrument(skip(self), fields(member_id = %member))]
	pub async fn groups_of(&self, member: MemberId) -> Result<BTreeSet<GroupId>, DbError> {
		let mut conn = self.pool.acquire().await?;
		Ok(member_edges(&mut conn, member).await?.into_keys().collect())
	}

	/// Members directly in `group`.
	#[tracing::instrument(skip(self), fields(group_id = %group))]
	pub async fn members_of(&self, group: GroupId) -> Result<BTreeSet<MemberId>, DbError> {
		let rows = sqlx::query("SELECT member_id FROM group_memberships WHERE group_id = ?")
			.bind(group.to_string())
			.fetch_all(&self.pool)
			.await?;

		rows
			.iter()
			.map(|r| Ok(MemberId::new(uuid_column(r, "member_id")?)))
			.collect()
	}
}

fn row_to_member(row: &SqliteRow) -> Result<Member, DbError> {
	Ok(Member {
		id: MemberId::new(uuid_column(row, "id")?),
		first_name: row.get("first_name"),
		last_name: row.get("last_name"),
		username: row.get("username"),
		email: row.get("email"),
		user_id: optional_uuid_column(row, "user_id")?.map(UserId::new),
		created_at: timestamp_column(row, "created_at")?,
	})
}
