// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization engine configuration.

use serde::Deserialize;

const DEFAULT_MAX_ANCESTOR_DEPTH: usize = 64;

/// Authorization configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct AuthzConfig {
	/// Bound on entity-graph ancestors walked per check.
	pub max_ancestor_depth: usize,
}

impl Default for AuthzConfig {
	fn default() -> Self {
		Self {
			max_ancestor_depth: DEFAULT_MAX_ANCESTOR_DEPTH,
		}
	}
}

/// Authorization configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthzConfigLayer {
	#[serde(default)]
	pub max_ancestor_depth: Option<usize>,
}

impl AuthzConfigLayer {
	pub fn merge(&mut self, other: AuthzConfigLayer) {
		if other.max_ancestor_depth.is_some() {
			self.max_ancestor_depth = other.max_ancestor_depth;
		}
	}

	pub fn finalize(self) -> AuthzConfig {
		AuthzConfig {
			max_ancestor_depth: self
				.max_ancestor_depth
				.unwrap_or(DEFAULT_MAX_ANCESTOR_DEPTH),
		}
	}
}
