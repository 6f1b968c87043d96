// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hierarchical group-based authorization for Grove.
//!
//! This crate provides:
//! - Typed identifiers and object/principal references ([`types`])
//! - Scoped permission sets and the `CustomPermissions` input form ([`scope`])
//! - The entity graph, group hierarchy and membership stores
//! - A pure permission [`Evaluator`] over pluggable read-only sources
//! - An in-memory [`Registry`] with validated mutations
//!
//! # Usage
//!
//! ```
//! use grove_authz::{CustomPermissions, ObjectRef, Principal, Registry};
//!
//! let mut registry = Registry::new();
//! let project = registry.create_node("Project", None).unwrap();
//! let task = registry.create_node("Task", Some(project.id)).unwrap();
//! let readers = registry.create_group("project:readers", None, None).unwrap();
//! let alice = registry.create_member("Alice", "Liddell");
//! registry.add_member(alice.id, readers.id, Vec::<String>::new()).unwrap();
//!
//! registry
//! 	.assign(
//! 		Principal::Group(readers.id),
//! 		ObjectRef::Node(project.id),
//! 		&CustomPermissions::new().group(["view"]).groups_upstream(["view"]),
//! 	)
//! 	.unwrap();
//!
//! assert!(registry.has_perm(alice.id, "view_node", &ObjectRef::Node(task.id)));
//! assert!(!registry.has_perm(alice.id, "change_node", &ObjectRef::Node(task.id)));
//! ```

pub mod assignment;
pub mod engine;
pub mod error;
pub mod group;
pub mod member;
pub mod node;
pub mod registry;
pub mod scope;
pub mod types;

pub use assignment::AssignmentStore;
pub use engine::{
	codename_for, has_permission, permission_from_codename, AssignmentSource, EntityGraph,
	Evaluator, HeldPrincipal, MembershipSource, DEFAULT_MAX_ANCESTOR_DEPTH,
};
pub use error::{AuthzError, Result};
pub use group::{Group, GroupTree, GroupType};
pub use member::{Member, MembershipStore, Role};
pub use node::{Node, NodeTree};
pub use registry::Registry;
pub use scope::{
	is_valid_role_label, CustomPermissions, PermissionSet, Scope, BLANKET_LABEL, UPSTREAM_LABEL,
};
pub use types::{GroupId, GroupTypeId, MemberId, NodeId, ObjectRef, Principal, RoleId, UserId};
