// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Members, roles and membership edges.
//!
//! This module provides:
//! - [`Member`] - a principal that can join groups, optionally linked to a user
//! - [`Role`] - a registered label that can be attached to a membership edge
//! - [`MembershipStore`] - the (member, group) → roles relation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::engine::MembershipSource;
use crate::types::{GroupId, MemberId, RoleId, UserId};

/// A principal that belongs to groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
	/// Unique identifier for this member.
	pub id: MemberId,

	pub first_name: String,

	pub last_name: String,

	pub username: Option<String>,

	pub email: Option<String>,

	/// External user account, at most one member per user.
	pub user_id: Option<UserId>,

	/// When the member was created.
	pub created_at: DateTime<Utc>,
}

impl Member {
	/// Creates a new member with a generated ID and no linked user.
	pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
		Self {
			id: MemberId::generate(),
			first_name: first_name.into(),
			last_name: last_name.into(),
			username: None,
			email: None,
			user_id: None,
			created_at: Utc::now(),
		}
	}

	pub fn with_username(mut self, username: impl Into<String>) -> Self {
		self.username = Some(username.into());
		self
	}

	pub fn with_email(mut self, email: impl Into<String>) -> Self {
		self.email = Some(email.into());
		self
	}

	/// "First Last", trimmed when either part is empty.
	pub fn full_name(&self) -> String {
		format!("{} {}", self.first_name, self.last_name)
			.trim()
			.to_string()
	}
}

/// A role that can be carried on a membership edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub id: RoleId,
	pub label: String,
	pub created_at: DateTime<Utc>,
}

impl Role {
	pub fn new(label: impl Into<String>) -> Self {
		Self {
			id: RoleId::generate(),
			label: label.into(),
			created_at: Utc::now(),
		}
	}
}

/// Direct (member, group) edges with the roles held on each.
///
/// Keyed by member first since every permission check starts from a member.
#[derive(Debug, Clone, Default)]
pub struct MembershipStore {
	edges: BTreeMap<MemberId, BTreeMap<GroupId, BTreeSet<String>>>,
}

impl MembershipStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `member` to `group`, unioning `roles` into the edge.
	///
	/// Adding an existing edge with the same roles is a no-op.
	pub fn add<I, S>(&mut self, member: MemberId, group: GroupId, roles: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self
			.edges
			.entry(member)
			.or_default()
			.entry(group)
			.or_default()
			.extend(roles.into_iter().map(Into::into));
	}

	/// Removes the edge entirely. Returns false if it did not exist.
	pub fn remove(&mut self, member: MemberId, group: GroupId) -> bool {
		let Some(groups) = self.edges.get_mut(&member) else {
			return false;
		};
		let removed = groups.remove(&group).is_some();
		if groups.is_empty() {
			self.edges.remove(&member);
		}
		removed
	}

	/// Drops every edge that points at `group`.
	pub fn remove_group(&mut self, group: GroupId) {
		self.edges.retain(|_, groups| {
			groups.remove(&group);
			!groups.is_empty()
		});
	}

	pub fn is_member(&self, member: MemberId, group: GroupId) -> bool {
		self
			.edges
			.get(&member)
			.is_some_and(|groups| groups.contains_key(&group))
	}

	/// Roles held on the edge, empty if `member` is not in `group`.
	pub fn roles_of(&self, member: MemberId, group: GroupId) -> BTreeSet<String> {
		self
			.edges
			.get(&member)
			.and_then(|groups| groups.get(&group))
			.cloned()
			.unwrap_or_default()
	}

	/// Groups the member directly belongs to.
	pub fn groups_of(&self, member: MemberId) -> BTreeSet<GroupId> {
		self
			.edges
			.get(&member)
			.map(|groups| groups.keys().copied().collect())
			.unwrap_or_default()
	}

	/// Members directly in `group`.
	pub fn members_of(&self, group: GroupId) -> BTreeSet<MemberId> {
		self
			.edges
			.iter()
			.filter(|(_, groups)| groups.contains_key(&group))
			.map(|(member, _)| *member)
			.collect()
	}
}

impl MembershipSource for MembershipStore {
	fn edges_of(&self, member: MemberId) -> Vec<(GroupId, BTreeSet<String>)> {
		self
			.edges
			.get(&member)
			.map(|groups| {
				groups
					.iter()
					.map(|(group, roles)| (*group, roles.clone()))
					.collect()
			})
			.unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	mod member {
		use super::*;

		#[test]
		fn full_name_joins_parts() {
			let member = Member::new("Member", "One");
			assert_eq!(member.full_name(), "Member One");
		}

		#[test]
		fn full_name_trims_missing_last_name() {
			let member = Member::new("Solo", "");
			assert_eq!(member.full_name(), "Solo");
		}

		#[test]
		fn builder_sets_optional_fields() {
			let member = Member::new("Other", "Read")
				.with_username("oread")
				.with_email("oread@example.com");
			assert_eq!(member.username.as_deref(), Some("oread"));
			assert_eq!(member.email.as_deref(), Some("oread@example.com"));
			assert!(member.user_id.is_none());
		}
	}

	mod membership {
		use super::*;

		#[test]
		fn roles_of_non_member_is_empty() {
			let store = MembershipStore::new();
			assert!(store
				.roles_of(MemberId::generate(), GroupId::generate())
				.is_empty());
		}

		#[test]
		fn add_unions_roles() {
			let mut store = MembershipStore::new();
			let member = MemberId::generate();
			let group = GroupId::generate();

			store.add(member, group, ["member"]);
			store.add(member, group, ["manager"]);

			assert_eq!(
				store.roles_of(member, group),
				BTreeSet::from(["manager".to_string(), "member".to_string()])
			);
		}

		#[test]
		fn remove_drops_edge() {
			let mut store = MembershipStore::new();
			let member = MemberId::generate();
			let group = GroupId::generate();
			store.add(member, group, ["manager"]);

			assert!(store.remove(member, group));
			assert!(!store.is_member(member, group));
			assert!(store.groups_of(member).is_empty());
			assert!(!store.remove(member, group));
		}

		#[test]
		fn groups_of_is_direct_only() {
			let mut store = MembershipStore::new();
			let member = MemberId::generate();
			let child = GroupId::generate();
			store.add(member, child, Vec::<String>::new());

			assert_eq!(store.groups_of(member), BTreeSet::from([child]));
		}

		#[test]
		fn members_of_lists_edges_into_group() {
			let mut store = MembershipStore::new();
			let group = GroupId::generate();
			let a = MemberId::generate();
			let b = MemberId::generate();
			store.add(a, group, Vec::<String>::new());
			store.add(b, GroupId::generate(), Vec::<String>::new());

			assert_eq!(store.members_of(group), BTreeSet::from([a]));
		}

		#[test]
		fn remove_group_clears_all_edges() {
			let mut store = MembershipStore::new();
			let group = GroupId::generate();
			let member = MemberId::generate();
			store.add(member, group, ["member"]);

			store.remove_group(group);
			assert!(store.members_of(group).is_empty());
			assert!(store.edges_of(member).is_empty());
		}
	}

	proptest! {
		#[test]
		fn adding_same_edge_twice_is_idempotent(
			roles in proptest::collection::btree_set("[a-z]{1,8}", 0..5)
		) {
			let mut store = MembershipStore::new();
			let member = MemberId::generate();
			let group = GroupId::generate();

			store.add(member, group, roles.iter().cloned());
			let first = store.roles_of(member, group);
			store.add(member, group, roles.iter().cloned());

			prop_assert_eq!(store.roles_of(member, group), first);
			prop_assert_eq!(store.groups_of(member).len(), 1);
		}
	}
}
