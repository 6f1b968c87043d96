// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for authorization.
//!
//! This module defines the foundational types used throughout the engine:
//!
//! - **ID newtypes**: Type-safe wrappers around UUIDs for each entity kind
//!   ([`NodeId`], [`GroupId`], [`MemberId`], etc.) preventing accidental mixing
//! - **Target objects**: [`ObjectRef`], anything a permission can be granted on
//! - **Principals**: [`Principal`], a group or a member holding a grant
//!
//! All ID types implement transparent serde serialization (as UUID strings) and
//! provide conversion to/from [`uuid::Uuid`]. `ObjectRef` and `Principal` have a
//! `kind:<uuid>` text form used by storage and the command line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthzError;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(NodeId, "Unique identifier for an entity-graph node.");
define_id_type!(GroupId, "Unique identifier for a group.");
define_id_type!(GroupTypeId, "Unique identifier for a group type.");
define_id_type!(MemberId, "Unique identifier for a member.");
define_id_type!(RoleId, "Unique identifier for a registered role.");
define_id_type!(UserId, "Identifier of an external user account linked to a member.");

// =============================================================================
// Target Objects
// =============================================================================

/// A target of permission assignment.
///
/// Nodes form the entity graph whose ancestor chain drives upstream
/// propagation. Groups can also be targets, which is how resource-level roles
/// such as "whoever manages this group" are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ObjectRef {
	Node(NodeId),
	Group(GroupId),
}

impl ObjectRef {
	/// The model name of the object, used to qualify permission codenames.
	pub fn model_name(&self) -> &'static str {
		match self {
			ObjectRef::Node(_) => "node",
			ObjectRef::Group(_) => "group",
		}
	}

	/// The raw UUID of the referenced object.
	pub fn uuid(&self) -> Uuid {
		match self {
			ObjectRef::Node(id) => id.into_inner(),
			ObjectRef::Group(id) => id.into_inner(),
		}
	}

	/// Rebuilds a reference from its stored model name and UUID.
	pub fn from_parts(kind: &str, id: Uuid) -> Result<Self, AuthzError> {
		match kind {
			"node" => Ok(ObjectRef::Node(NodeId::new(id))),
			"group" => Ok(ObjectRef::Group(GroupId::new(id))),
			other => Err(AuthzError::InvalidReference(format!(
				"unknown object kind: {other}"
			))),
		}
	}
}

impl From<NodeId> for ObjectRef {
	fn from(id: NodeId) -> Self {
		ObjectRef::Node(id)
	}
}

impl From<GroupId> for ObjectRef {
	fn from(id: GroupId) -> Self {
		ObjectRef::Group(id)
	}
}

impl fmt::Display for ObjectRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.model_name(), self.uuid())
	}
}

impl FromStr for ObjectRef {
	type Err = AuthzError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (kind, id) = split_reference(s)?;
		ObjectRef::from_parts(kind, id)
	}
}

// =============================================================================
// Principals
// =============================================================================

/// Something that can hold a permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
	Member(MemberId),
	Group(GroupId),
}

impl Principal {
	pub fn kind(&self) -> &'static str {
		match self {
			Principal::Member(_) => "member",
			Principal::Group(_) => "group",
		}
	}

	pub fn uuid(&self) -> Uuid {
		match self {
			Principal::Member(id) => id.into_inner(),
			Principal::Group(id) => id.into_inner(),
		}
	}

	/// Rebuilds a principal from its stored kind and UUID.
	pub fn from_parts(kind: &str, id: Uuid) -> Result<Self, AuthzError> {
		match kind {
			"member" => Ok(Principal::Member(MemberId::new(id))),
			"group" => Ok(Principal::Group(GroupId::new(id))),
			other => Err(AuthzError::InvalidReference(format!(
				"unknown principal kind: {other}"
			))),
		}
	}
}

impl From<MemberId> for Principal {
	fn from(id: MemberId) -> Self {
		Principal::Member(id)
	}
}

impl From<GroupId> for Principal {
	fn from(id: GroupId) -> Self {
		Principal::Group(id)
	}
}

impl fmt::Display for Principal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.kind(), self.uuid())
	}
}

impl FromStr for Principal {
	type Err = AuthzError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (kind, id) = split_reference(s)?;
		Principal::from_parts(kind, id)
	}
}

fn split_reference(s: &str) -> Result<(&str, Uuid), AuthzError> {
	let (kind, id) = s
		.split_once(':')
		.ok_or_else(|| AuthzError::InvalidReference(format!("expected kind:id, got {s}")))?;
	let id = Uuid::parse_str(id)
		.map_err(|e| AuthzError::InvalidReference(format!("invalid id in {s}: {e}")))?;
	Ok((kind, id))
}

#[cfg(test)]
mod tests {
	use super::*;

	mod ids {
		use super::*;

		#[test]
		fn generate_creates_unique_ids() {
			assert_ne!(NodeId::generate(), NodeId::generate());
			assert_ne!(GroupId::generate(), GroupId::generate());
		}

		#[test]
		fn serializes_transparently() {
			let id = MemberId::generate();
			let json = serde_json::to_string(&id).unwrap();
			assert_eq!(json, format!("\"{}\"", id.as_uuid()));
		}

		#[test]
		fn parses_from_uuid_string() {
			let id = GroupId::generate();
			let parsed: GroupId = id.to_string().parse().unwrap();
			assert_eq!(parsed, id);
		}
	}

	mod object_ref {
		use super::*;

		#[test]
		fn displays_with_model_name() {
			let id = NodeId::generate();
			assert_eq!(ObjectRef::Node(id).to_string(), format!("node:{id}"));
		}

		#[test]
		fn parses_group_reference() {
			let id = GroupId::generate();
			let parsed: ObjectRef = format!("group:{id}").parse().unwrap();
			assert_eq!(parsed, ObjectRef::Group(id));
		}

		#[test]
		fn rejects_unknown_kind() {
			let err = format!("thread:{}", Uuid::new_v4())
				.parse::<ObjectRef>()
				.unwrap_err();
			assert!(matches!(err, AuthzError::InvalidReference(_)));
		}

		#[test]
		fn rejects_missing_separator() {
			assert!("node".parse::<ObjectRef>().is_err());
		}

		#[test]
		fn serializes_tagged() {
			let id = NodeId::generate();
			let json = serde_json::to_value(ObjectRef::Node(id)).unwrap();
			assert_eq!(json["kind"], "node");
			assert_eq!(json["id"], id.to_string());
		}
	}

	mod principal {
		use super::*;

		#[test]
		fn parses_member_reference() {
			let id = MemberId::generate();
			let parsed: Principal = format!("member:{id}").parse().unwrap();
			assert_eq!(parsed, Principal::Member(id));
		}

		#[test]
		fn rejects_bad_uuid() {
			let err = "group:not-a-uuid".parse::<Principal>().unwrap_err();
			assert!(matches!(err, AuthzError::InvalidReference(_)));
		}
	}
}
