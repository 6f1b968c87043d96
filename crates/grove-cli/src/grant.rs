// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `scope=perm,perm` arguments for `grove assign`.

use grove_authz::CustomPermissions;
use std::str::FromStr;

/// One `--grant` argument. An empty permission list clears the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
	pub scope: String,
	pub permissions: Vec<String>,
}

impl FromStr for Grant {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (scope, permissions) = s
			.split_once('=')
			.ok_or_else(|| format!("expected scope=perm,perm, got {s:?}"))?;
		let scope = scope.trim();
		if scope.is_empty() {
			return Err(format!("missing scope label in {s:?}"));
		}

		let permissions = permissions
			.split(',')
			.map(str::trim)
			.filter(|p| !p.is_empty())
			.map(str::to_string)
			.collect();

		Ok(Self {
			scope: scope.to_string(),
			permissions,
		})
	}
}

pub fn to_custom_permissions(grants: &[Grant]) -> CustomPermissions {
	grants.iter().fold(CustomPermissions::new(), |perms, grant| {
		perms.with(grant.scope.clone(), grant.permissions.iter().cloned())
	})
}
