// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission scopes and permission sets.
//!
//! A permission assignment is keyed by a *scope label*:
//!
//! - `"group"` ([`Scope::Blanket`]): any holder of the principal, regardless of role
//! - `"groups_upstream"` ([`Scope::Upstream`]): as blanket, but also applies to
//!   every descendant of the target in the entity graph
//! - any other label ([`Scope::Role`]): only holders carrying that role
//!
//! [`CustomPermissions`] is the loosely-typed `{label: [names]}` input shape;
//! [`PermissionSet`] is the validated form stored per (principal, object).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{AuthzError, Result};

pub const BLANKET_LABEL: &str = "group";
pub const UPSTREAM_LABEL: &str = "groups_upstream";

/// Which holders of a principal a set of permissions applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Scope {
	Blanket,
	Upstream,
	Role(String),
}

impl Scope {
	/// Parses a scope label. Labels other than the two reserved ones are role
	/// labels; whether the role exists is checked by the caller.
	pub fn from_label(label: &str) -> Result<Self> {
		match label {
			BLANKET_LABEL => Ok(Scope::Blanket),
			UPSTREAM_LABEL => Ok(Scope::Upstream),
			other if is_valid_role_label(other) => Ok(Scope::Role(other.to_string())),
			other => Err(AuthzError::InvalidScopeLabel(other.to_string())),
		}
	}

	pub fn label(&self) -> &str {
		match self {
			Scope::Blanket => BLANKET_LABEL,
			Scope::Upstream => UPSTREAM_LABEL,
			Scope::Role(label) => label,
		}
	}

	pub fn role(&self) -> Option<&str> {
		match self {
			Scope::Role(label) => Some(label),
			_ => None,
		}
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

impl From<Scope> for String {
	fn from(scope: Scope) -> Self {
		scope.label().to_string()
	}
}

impl TryFrom<String> for Scope {
	type Error = AuthzError;

	fn try_from(label: String) -> Result<Self> {
		Scope::from_label(&label)
	}
}

/// Returns true if `label` may be used as a role label.
///
/// Role labels are non-empty, contain no whitespace or `,`/`=` (the command
/// line separators), and cannot shadow the reserved scope labels.
pub fn is_valid_role_label(label: &str) -> bool {
	!label.is_empty()
		&& label != BLANKET_LABEL
		&& label != UPSTREAM_LABEL
		&& !label
			.chars()
			.any(|c| c.is_whitespace() || c == ',' || c == '=')
}

/// Validated permission names per scope for one (principal, object) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
	scopes: BTreeMap<Scope, BTreeSet<String>>,
}

impl PermissionSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the permissions of one scope. An empty list clears the scope.
	pub fn set_scope<I, S>(&mut self, scope: Scope, permissions: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let permissions: BTreeSet<String> = permissions.into_iter().map(Into::into).collect();
		if permissions.is_empty() {
			self.scopes.remove(&scope);
		} else {
			self.scopes.insert(scope, permissions);
		}
	}

	/// Overwrites every scope present in `other`, leaving the rest unchanged.
	pub fn merge(&mut self, other: PermissionSet) {
		for (scope, permissions) in other.scopes {
			self.set_scope(scope, permissions);
		}
	}

	/// Removes the given permissions from one scope.
	pub fn revoke<'a, I>(&mut self, scope: &Scope, permissions: I)
	where
		I: IntoIterator<Item = &'a str>,
	{
		if let Some(existing) = self.scopes.get_mut(scope) {
			for permission in permissions {
				existing.remove(permission);
			}
			if existing.is_empty() {
				self.scopes.remove(scope);
			}
		}
	}

	/// Returns true if `scope` lists `permission`.
	pub fn grants(&self, scope: &Scope, permission: &str) -> bool {
		self
			.scopes
			.get(scope)
			.is_some_and(|permissions| permissions.contains(permission))
	}

	pub fn scope(&self, scope: &Scope) -> Option<&BTreeSet<String>> {
		self.scopes.get(scope)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Scope, &BTreeSet<String>)> {
		self.scopes.iter()
	}

	/// Iterates role-scoped entries as (role label, permissions).
	pub fn role_scopes(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
		self
			.scopes
			.iter()
			.filter_map(|(scope, permissions)| scope.role().map(|role| (role, permissions)))
	}

	pub fn is_empty(&self) -> bool {
		self.scopes.is_empty()
	}
}

/// Label-keyed permission input, `{scope_label: [permission_names]}`.
///
/// ```
/// use grove_authz::CustomPermissions;
///
/// let perms = CustomPermissions::new()
/// 	.group(["view", "change", "delete"])
/// 	.groups_upstream(["view"]);
/// assert_eq!(perms.labels().count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomPermissions {
	entries: Vec<(String, Vec<String>)>,
}

impl CustomPermissions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an entry under an arbitrary label. Later entries for the same
	/// label win.
	pub fn with<I, S>(mut self, label: impl Into<String>, permissions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.entries.push((
			label.into(),
			permissions.into_iter().map(Into::into).collect(),
		));
		self
	}

	pub fn group<I, S>(self, permissions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.with(BLANKET_LABEL, permissions)
	}

	pub fn groups_upstream<I, S>(self, permissions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.with(UPSTREAM_LABEL, permissions)
	}

	pub fn role<I, S>(self, role: impl Into<String>, permissions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.with(role, permissions)
	}

	pub fn labels(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(|(label, _)| label.as_str())
	}

	/// Validates every label and builds the corresponding [`PermissionSet`].
	pub fn parse(&self) -> Result<PermissionSet> {
		let mut set = PermissionSet::new();
		for (label, permissions) in &self.entries {
			let scope = Scope::from_label(label)?;
			// Record the scope even when empty so merge clears it.
			set.scopes.insert(scope, permissions.iter().cloned().collect());
		}
		Ok(set)
	}
}

impl<K, I, S> FromIterator<(K, I)> for CustomPermissions
where
	K: Into<String>,
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	fn from_iter<T: IntoIterator<Item = (K, I)>>(iter: T) -> Self {
		iter
			.into_iter()
			.fold(CustomPermissions::new(), |acc, (label, permissions)| {
				acc.with(label, permissions)
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	mod scope {
		use super::*;

		#[test]
		fn parses_reserved_labels() {
			assert_eq!(Scope::from_label("group").unwrap(), Scope::Blanket);
			assert_eq!(
				Scope::from_label("groups_upstream").unwrap(),
				Scope::Upstream
			);
		}

		#[test]
		fn other_labels_are_roles() {
			assert_eq!(
				Scope::from_label("group-manager").unwrap(),
				Scope::Role("group-manager".to_string())
			);
		}

		#[test]
		fn rejects_empty_and_whitespace_labels() {
			assert!(matches!(
				Scope::from_label(""),
				Err(AuthzError::InvalidScopeLabel(_))
			));
			assert!(matches!(
				Scope::from_label("not a role"),
				Err(AuthzError::InvalidScopeLabel(_))
			));
		}

		#[test]
		fn serializes_as_label() {
			let json = serde_json::to_string(&Scope::Upstream).unwrap();
			assert_eq!(json, "\"groups_upstream\"");
			let role: Scope = serde_json::from_str("\"manager\"").unwrap();
			assert_eq!(role, Scope::Role("manager".to_string()));
		}
	}

	mod permission_set {
		use super::*;

		#[test]
		fn set_scope_replaces_previous_permissions() {
			let mut set = PermissionSet::new();
			set.set_scope(Scope::Blanket, ["view", "change"]);
			set.set_scope(Scope::Blanket, ["view"]);

			assert!(set.grants(&Scope::Blanket, "view"));
			assert!(!set.grants(&Scope::Blanket, "change"));
		}

		#[test]
		fn merge_leaves_unmentioned_scopes() {
			let mut set = PermissionSet::new();
			set.set_scope(Scope::Blanket, ["view"]);
			set.set_scope(Scope::Upstream, ["view"]);

			let mut update = PermissionSet::new();
			update.set_scope(Scope::Blanket, ["view", "change"]);
			set.merge(update);

			assert!(set.grants(&Scope::Blanket, "change"));
			assert!(set.grants(&Scope::Upstream, "view"));
		}

		#[test]
		fn revoke_drops_empty_scope() {
			let mut set = PermissionSet::new();
			set.set_scope(Scope::Upstream, ["view"]);
			set.revoke(&Scope::Upstream, ["view"]);

			assert!(set.is_empty());
		}

		#[test]
		fn grants_is_case_sensitive() {
			let mut set = PermissionSet::new();
			set.set_scope(Scope::Blanket, ["view"]);

			assert!(!set.grants(&Scope::Blanket, "View"));
		}

		#[test]
		fn role_scopes_skips_builtin_scopes() {
			let mut set = PermissionSet::new();
			set.set_scope(Scope::Blanket, ["view"]);
			set.set_scope(Scope::Role("manager".to_string()), ["manage_group"]);

			let roles: Vec<_> = set.role_scopes().map(|(role, _)| role).collect();
			assert_eq!(roles, vec!["manager"]);
		}
	}

	mod custom_permissions {
		use super::*;

		#[test]
		fn parse_builds_scopes() {
			let set = CustomPermissions::new()
				.group(["view", "change", "delete"])
				.groups_upstream(["view"])
				.parse()
				.unwrap();

			assert!(set.grants(&Scope::Blanket, "delete"));
			assert!(set.grants(&Scope::Upstream, "view"));
			assert!(!set.grants(&Scope::Upstream, "delete"));
		}

		#[test]
		fn parse_rejects_invalid_label() {
			let err = CustomPermissions::new()
				.with("", ["view"])
				.parse()
				.unwrap_err();
			assert_eq!(err, AuthzError::InvalidScopeLabel(String::new()));
		}

		#[test]
		fn collects_from_pairs() {
			let perms: CustomPermissions =
				[("group", vec!["view"]), ("groups_upstream", vec!["view"])]
					.into_iter()
					.collect();
			assert_eq!(perms.labels().collect::<Vec<_>>(), vec!["group", "groups_upstream"]);
		}
	}
}
