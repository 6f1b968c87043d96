// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Table definitions for the authorization store.
//!
//! IDs are UUIDs stored as TEXT, timestamps RFC 3339 TEXT. Assignments are
//! stored one row per (principal, object, scope, permission).

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const STATEMENTS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS nodes (
		id TEXT PRIMARY KEY,
		title TEXT NOT NULL,
		parent_id TEXT REFERENCES nodes(id) ON DELETE SET NULL,
		created_at TEXT NOT NULL
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id)",
	r#"
	CREATE TABLE IF NOT EXISTS group_types (
		id TEXT PRIMARY KEY,
		label TEXT NOT NULL UNIQUE,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS auth_groups (
		id TEXT PRIMARY KEY,
		name TEXT NOT NULL UNIQUE,
		group_type_id TEXT REFERENCES group_types(id),
		parent_id TEXT REFERENCES auth_groups(id),
		created_at TEXT NOT NULL
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_auth_groups_parent ON auth_groups(parent_id)",
	r#"
	CREATE TABLE IF NOT EXISTS roles (
		id TEXT PRIMARY KEY,
		label TEXT NOT NULL UNIQUE,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS members (
		id TEXT PRIMARY KEY,
		first_name TEXT NOT NULL,
		last_name TEXT NOT NULL,
		username TEXT,
		email TEXT,
		user_id TEXT UNIQUE,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS group_memberships (
		member_id TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
		group_id TEXT NOT NULL REFERENCES auth_groups(id) ON DELETE CASCADE,
		created_at TEXT NOT NULL,
		PRIMARY KEY (member_id, group_id)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_group_memberships_group ON group_memberships(group_id)",
	r#"
	CREATE TABLE IF NOT EXISTS membership_roles (
		member_id TEXT NOT NULL,
		group_id TEXT NOT NULL,
		role_label TEXT NOT NULL REFERENCES roles(label),
		PRIMARY KEY (member_id, group_id, role_label),
		FOREIGN KEY (member_id, group_id)
			REFERENCES group_memberships(member_id, group_id) ON DELETE CASCADE
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS permission_assignments (
		principal_kind TEXT NOT NULL,
		principal_id TEXT NOT NULL,
		object_kind TEXT NOT NULL,
		object_id TEXT NOT NULL,
		scope TEXT NOT NULL,
		permission TEXT NOT NULL,
		PRIMARY KEY (principal_kind, principal_id, object_kind, object_id, scope, permission)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_permission_assignments_object ON permission_assignments(object_kind, object_id)",
];

/// Creates every table and index if missing.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	let mut tx = pool.begin().await?;
	for statement in STATEMENTS {
		sqlx::query(statement).execute(&mut *tx).await?;
	}
	tx.commit().await?;

	tracing::debug!(statements = STATEMENTS.len(), "schema ready");
	Ok(())
}
