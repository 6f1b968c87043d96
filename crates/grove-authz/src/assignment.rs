// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission assignments keyed by (principal, object).

use std::collections::HashMap;

use crate::engine::AssignmentSource;
use crate::scope::{PermissionSet, Scope};
use crate::types::{ObjectRef, Principal};

/// Per-(principal, object) permission sets.
#[derive(Debug, Clone, Default)]
pub struct AssignmentStore {
	records: HashMap<(Principal, ObjectRef), PermissionSet>,
}

impl AssignmentStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Merges `permissions` into the existing record, last write winning per
	/// scope. Scopes left empty by the merge are dropped.
	pub fn assign(&mut self, principal: Principal, object: ObjectRef, permissions: PermissionSet) {
		let key = (principal, object);
		let record = self.records.entry(key).or_default();
		record.merge(permissions);
		if record.is_empty() {
			self.records.remove(&key);
		}
	}

	/// The record for (principal, object), empty if there is none.
	pub fn assignments_for(&self, principal: &Principal, object: &ObjectRef) -> PermissionSet {
		self
			.records
			.get(&(*principal, *object))
			.cloned()
			.unwrap_or_default()
	}

	/// Removes individual permissions from one scope.
	pub fn revoke<'a, I>(
		&mut self,
		principal: Principal,
		object: ObjectRef,
		scope: &Scope,
		permissions: I,
	) where
		I: IntoIterator<Item = &'a str>,
	{
		let key = (principal, object);
		if let Some(record) = self.records.get_mut(&key) {
			record.revoke(scope, permissions);
			if record.is_empty() {
				self.records.remove(&key);
			}
		}
	}

	/// Drops the whole record. Returns false if there was none.
	pub fn remove(&mut self, principal: Principal, object: ObjectRef) -> bool {
		self.records.remove(&(principal, object)).is_some()
	}

	/// Drops every record targeting `object`.
	pub fn remove_object(&mut self, object: ObjectRef) {
		self.records.retain(|(_, target), _| *target != object);
	}

	/// Drops every record held by `principal`.
	pub fn remove_principal(&mut self, principal: Principal) {
		self.records.retain(|(holder, _), _| *holder != principal);
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

impl AssignmentSource for AssignmentStore {
	fn permissions_for(&self, principal: &Principal, object: &ObjectRef) -> Option<&PermissionSet> {
		self.records.get(&(*principal, *object))
	}
}
