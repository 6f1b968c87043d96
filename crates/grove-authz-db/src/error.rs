// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use grove_authz::AuthzError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Internal: {0}")]
	Internal(String),

	#[error(transparent)]
	Authz(#[from] AuthzError),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Maps a unique-constraint violation on `name` to [`AuthzError::DuplicateName`].
pub(crate) fn duplicate_name(name: &str) -> impl FnOnce(sqlx::Error) -> DbError + '_ {
	move |e| match e {
		sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
			DbError::Authz(AuthzError::DuplicateName(name.to_string()))
		}
		_ => DbError::Sqlx(e),
	}
}
