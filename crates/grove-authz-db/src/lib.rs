// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite storage for Grove authorization data.
//!
//! This crate provides:
//! - Pool creation and schema setup
//! - Repositories for nodes, groups, members and assignments, each logical
//!   mutation running in a single transaction
//! - [`AuthzRepository`], which loads a per-check snapshot and evaluates it
//!   with the pure engine from `grove-authz`

pub mod assignment;
pub mod authz;
pub mod error;
pub mod group;
pub mod member;
pub mod node;
pub mod pool;
pub mod schema;
pub mod testing;

mod row;

pub use assignment::AssignmentRepository;
pub use authz::{AuthzRepository, AuthzSnapshot, PermissionChecker};
pub use error::{DbError, Result};
pub use group::GroupRepository;
pub use member::MemberRepository;
pub use node::NodeRepository;
pub use pool::create_pool;
pub use schema::run_migrations;
