// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Connection pool for the authorization store.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::error::DbError;

const SQLITE_SCHEME: &str = "sqlite:";

/// Open the store at `database_url` (`sqlite:./grove.db`, `sqlite::memory:`),
/// creating the file if needed.
///
/// Foreign keys are switched on for every connection: membership roles and
/// group memberships rely on cascading deletes.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
	if !database_url.starts_with(SQLITE_SCHEME) {
		return Err(DbError::Internal(format!(
			"Unsupported database URL {database_url:?}: expected {SQLITE_SCHEME}<path>"
		)));
	}

	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("authorization store opened");
	Ok(pool)
}
