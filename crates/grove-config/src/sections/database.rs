// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Where the authorization store lives.
//!
//! Grove only speaks SQLite, so the URL is always `sqlite:<path>` or
//! `sqlite::memory:`; anything else is rejected when the configuration is
//! finalized.

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_DATABASE_URL: &str = "sqlite:./grove.db";
const SQLITE_SCHEME: &str = "sqlite:";

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_DATABASE_URL.to_string(),
		}
	}
}

impl DatabaseConfig {
	/// Rejects URLs for engines other than SQLite.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.url.starts_with(SQLITE_SCHEME) {
			Ok(())
		} else {
			Err(ConfigError::invalid_value(
				"database.url",
				format!("expected a {SQLITE_SCHEME} URL, got {:?}", self.url),
			))
		}
	}
}

/// `[database]` as read from one source; unset keys defer to lower layers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if let Some(url) = other.url {
			self.url = Some(url);
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		self
			.url
			.map(|url| DatabaseConfig { url })
			.unwrap_or_default()
	}
}
