// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission evaluation engine.
//!
//! This module contains [`Evaluator`], which answers "does this member hold
//! this permission on this object?" by combining three read-only sources:
//!
//! 1. **Memberships** ([`MembershipSource`]): the groups a member directly
//!    belongs to and the roles held on each edge
//! 2. **Assignments** ([`AssignmentSource`]): permission sets per
//!    (principal, object)
//! 3. **Entity graph** ([`EntityGraph`]): the parent chain of the target
//!
//! Evaluation is pure and additive. At the target itself the blanket
//! (`"group"`) and role scopes apply; at every strict ancestor only the
//! upstream (`"groups_upstream"`) scope applies, so grants flow down the
//! entity graph and never up. There is no explicit deny.

use std::collections::{BTreeSet, HashSet};
use tracing::instrument;

use crate::scope::{PermissionSet, Scope};
use crate::types::{GroupId, MemberId, ObjectRef, Principal};

/// Default bound on how many ancestors are walked per check.
pub const DEFAULT_MAX_ANCESTOR_DEPTH: usize = 64;

/// Parent lookup over target objects.
pub trait EntityGraph {
	fn parent_of(&self, object: &ObjectRef) -> Option<ObjectRef>;
}

/// Direct membership edges of a member.
pub trait MembershipSource {
	fn edges_of(&self, member: MemberId) -> Vec<(GroupId, BTreeSet<String>)>;
}

/// Permission sets per (principal, object).
pub trait AssignmentSource {
	fn permissions_for(&self, principal: &Principal, object: &ObjectRef) -> Option<&PermissionSet>;
}

/// A principal held by the member under evaluation, with the roles on the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldPrincipal {
	pub principal: Principal,
	pub roles: BTreeSet<String>,
}

/// Evaluates permission checks against borrowed stores.
pub struct Evaluator<'a, G: ?Sized, M: ?Sized, A: ?Sized> {
	graph: &'a G,
	memberships: &'a M,
	assignments: &'a A,
	max_depth: usize,
}

impl<'a, G, M, A> Evaluator<'a, G, M, A>
where
	G: EntityGraph + ?Sized,
	M: MembershipSource + ?Sized,
	A: AssignmentSource + ?Sized,
{
	pub fn new(graph: &'a G, memberships: &'a M, assignments: &'a A) -> Self {
		Self {
			graph,
			memberships,
			assignments,
			max_depth: DEFAULT_MAX_ANCESTOR_DEPTH,
		}
	}

	/// Caps the ancestor walk. Zero is treated as one.
	pub fn with_max_depth(mut self, max_depth: usize) -> Self {
		self.max_depth = max_depth.max(1);
		self
	}

	/// The member itself plus each directly joined group.
	pub fn held_principals(&self, member: MemberId) -> Vec<HeldPrincipal> {
		let mut held = vec![HeldPrincipal {
			principal: Principal::Member(member),
			roles: BTreeSet::new(),
		}];
		held.extend(
			self
				.memberships
				.edges_of(member)
				.into_iter()
				.map(|(group, roles)| HeldPrincipal {
					principal: Principal::Group(group),
					roles,
				}),
		);
		held
	}

	/// Strict ancestors of `object`, nearest first.
	///
	/// Stops after `max_depth` steps or on the first repeated object.
	pub fn ancestors(&self, object: &ObjectRef) -> Vec<ObjectRef> {
		let mut seen = HashSet::from([*object]);
		let mut chain = Vec::new();
		let mut current = self.graph.parent_of(object);
		while let Some(parent) = current {
			if chain.len() >= self.max_depth || !seen.insert(parent) {
				tracing::warn!(%object, depth = chain.len(), "ancestor walk truncated");
				break;
			}
			chain.push(parent);
			current = self.graph.parent_of(&parent);
		}
		chain
	}

	/// Returns true if `member` holds `permission` on `object`.
	#[instrument(level = "debug", skip(self, member, object), fields(member = %member, object = %object))]
	pub fn has_permission(&self, member: MemberId, permission: &str, object: &ObjectRef) -> bool {
		let held = self.held_principals(member);

		let allowed = self.target_grants(&held, object, permission)
			|| self
				.ancestors(object)
				.iter()
				.any(|ancestor| self.upstream_grants(&held, ancestor, permission));

		tracing::debug!(allowed, "permission decision");
		allowed
	}

	/// Every permission `member` holds on `object`.
	#[instrument(level = "debug", skip(self, member, object), fields(member = %member, object = %object))]
	pub fn effective_permissions(&self, member: MemberId, object: &ObjectRef) -> BTreeSet<String> {
		let held = self.held_principals(member);
		let mut granted = BTreeSet::new();

		for entry in &held {
			let Some(set) = self.assignments.permissions_for(&entry.principal, object) else {
				continue;
			};
			for (scope, permissions) in set.iter() {
				if scope_applies_at_target(&held, entry, object, scope) {
					granted.extend(permissions.iter().cloned());
				}
			}
		}

		for ancestor in self.ancestors(object) {
			for entry in &held {
				if let Some(permissions) = self
					.assignments
					.permissions_for(&entry.principal, &ancestor)
					.and_then(|set| set.scope(&Scope::Upstream))
				{
					granted.extend(permissions.iter().cloned());
				}
			}
		}

		tracing::debug!(count = granted.len(), "effective permissions");
		granted
	}

	/// Codename form of [`Evaluator::has_permission`], e.g. `delete_node`.
	///
	/// The `_<model>` suffix must match the object's kind; a mismatched or
	/// unqualified codename is denied.
	pub fn has_perm(&self, member: MemberId, codename: &str, object: &ObjectRef) -> bool {
		match permission_from_codename(codename, object) {
			Some(permission) => self.has_permission(member, permission, object),
			None => {
				tracing::debug!(codename, %object, "codename does not match object model");
				false
			}
		}
	}

	fn target_grants(&self, held: &[HeldPrincipal], object: &ObjectRef, permission: &str) -> bool {
		held.iter().any(|entry| {
			self
				.assignments
				.permissions_for(&entry.principal, object)
				.is_some_and(|set| {
					set.iter().any(|(scope, permissions)| {
						permissions.contains(permission)
							&& scope_applies_at_target(held, entry, object, scope)
					})
				})
		})
	}

	fn upstream_grants(&self, held: &[HeldPrincipal], ancestor: &ObjectRef, permission: &str) -> bool {
		held.iter().any(|entry| {
			self
				.assignments
				.permissions_for(&entry.principal, ancestor)
				.is_some_and(|set| set.grants(&Scope::Upstream, permission))
		})
	}
}

/// Whether a scope of `entry`'s assignment on `object` reaches the member.
///
/// Role scopes on a group principal need the role on that group's edge. Role
/// scopes on a member principal need the role on the member's edge to the
/// target group, which is how resource-level roles are expressed.
fn scope_applies_at_target(
	held: &[HeldPrincipal],
	entry: &HeldPrincipal,
	object: &ObjectRef,
	scope: &Scope,
) -> bool {
	match scope {
		Scope::Blanket => true,
		Scope::Upstream => false,
		Scope::Role(role) => match (entry.principal, object) {
			(Principal::Group(_), _) => entry.roles.contains(role),
			(Principal::Member(_), ObjectRef::Group(target)) => held
				.iter()
				.any(|h| h.principal == Principal::Group(*target) && h.roles.contains(role)),
			(Principal::Member(_), ObjectRef::Node(_)) => false,
		},
	}
}

/// Strips the `_<model>` suffix from a permission codename.
pub fn permission_from_codename<'c>(codename: &'c str, object: &ObjectRef) -> Option<&'c str> {
	codename
		.strip_suffix(object.model_name())
		.and_then(|rest| rest.strip_suffix('_'))
		.filter(|permission| !permission.is_empty())
}

/// Model-qualified codename for a permission, e.g. `view_node`.
pub fn codename_for(permission: &str, object: &ObjectRef) -> String {
	format!("{permission}_{}", object.model_name())
}

/// One-shot permission check with the default ancestor depth.
pub fn has_permission<G, M, A>(
	member: MemberId,
	permission: &str,
	object: &ObjectRef,
	graph: &G,
	memberships: &M,
	assignments: &A,
) -> bool
where
	G: EntityGraph + ?Sized,
	M: MembershipSource + ?Sized,
	A: AssignmentSource + ?Sized,
{
	Evaluator::new(graph, memberships, assignments).has_permission(member, permission, object)
}
