// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::{ObjectRef, Principal, UserId};

/// Errors raised by mutating operations on the authorization stores.
///
/// The read path (`has_permission` and friends) never returns these; an
/// unresolvable lookup is a denial.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
	#[error("Name already in use: {0}")]
	DuplicateName(String),

	#[error("Parent link would create a cycle: {0}")]
	Cycle(String),

	#[error("Unknown principal: {0}")]
	UnknownPrincipal(Principal),

	#[error("Unknown object: {0}")]
	UnknownObject(ObjectRef),

	#[error("Invalid scope label: {0}")]
	InvalidScopeLabel(String),

	#[error("Unknown role: {0}")]
	UnknownRole(String),

	#[error("User {0} is already linked to another member")]
	UserAlreadyLinked(UserId),

	#[error("Invalid reference: {0}")]
	InvalidReference(String),
}

pub type Result<T> = std::result::Result<T, AuthzError>;
