// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `grove`: administer groups and assignments, and run permission checks.

mod grant;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use grove_authz::{
	Group, GroupId, GroupType, GroupTypeId, Member, MemberId, Node, NodeId, ObjectRef, Principal,
	Role, UserId,
};
use grove_authz_db::{
	create_pool, run_migrations, AssignmentRepository, AuthzRepository, GroupRepository,
	MemberRepository, NodeRepository,
};
use grove_config::GroveConfig;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::grant::{to_custom_permissions, Grant};

#[derive(Parser, Debug)]
#[command(name = "grove", about = "Hierarchical group-based authorization", version)]
struct Args {
	/// Config file to load instead of /etc/grove/grove.toml.
	#[arg(long, env = "GROVE_CONFIG", global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Entity-graph nodes.
	Node {
		#[command(subcommand)]
		command: NodeCommand,
	},
	/// Group types.
	GroupType {
		#[command(subcommand)]
		command: GroupTypeCommand,
	},
	/// Groups.
	Group {
		#[command(subcommand)]
		command: GroupCommand,
	},
	/// Registered membership roles.
	Role {
		#[command(subcommand)]
		command: RoleCommand,
	},
	/// Members and group membership.
	Member {
		#[command(subcommand)]
		command: MemberCommand,
	},
	/// Grant permissions to a principal on an object.
	Assign {
		#[arg(long)]
		principal: Principal,
		#[arg(long)]
		object: ObjectRef,
		/// `scope=perm,perm`; scope is `group`, `groups_upstream` or a role label.
		#[arg(long = "grant", required = true)]
		grants: Vec<Grant>,
	},
	/// Remove permissions from one scope of an assignment.
	Revoke {
		#[arg(long)]
		principal: Principal,
		#[arg(long)]
		object: ObjectRef,
		#[arg(long)]
		scope: String,
		#[arg(long = "permission", required = true)]
		permissions: Vec<String>,
	},
	/// Check one permission. Prints `true` or `false` and exits non-zero on deny.
	Check {
		#[arg(long)]
		member: MemberId,
		/// Permission name as assigned, e.g. `view` or `manage_group`.
		#[arg(long)]
		permission: String,
		#[arg(long)]
		object: ObjectRef,
		/// Treat `--permission` as a `<permission>_<model>` codename such as `view_node`.
		#[arg(long)]
		codename: bool,
	},
	/// Print every permission a member holds on an object.
	Permissions {
		#[arg(long)]
		member: MemberId,
		#[arg(long)]
		object: ObjectRef,
	},
}

#[derive(Subcommand, Debug)]
enum NodeCommand {
	Create {
		#[arg(long)]
		title: String,
		#[arg(long)]
		parent: Option<NodeId>,
	},
	/// Re-parent a node; omit `--parent` to make it a root.
	Move {
		#[arg(long)]
		id: NodeId,
		#[arg(long)]
		parent: Option<NodeId>,
	},
	Delete {
		#[arg(long)]
		id: NodeId,
	},
}

#[derive(Subcommand, Debug)]
enum GroupTypeCommand {
	Create {
		#[arg(long)]
		label: String,
	},
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
	Create {
		#[arg(long)]
		name: String,
		#[arg(long)]
		group_type: Option<GroupTypeId>,
		#[arg(long)]
		parent: Option<GroupId>,
	},
	/// Delete a group, its memberships and every assignment it is part of.
	Delete {
		#[arg(long)]
		id: GroupId,
	},
}

#[derive(Subcommand, Debug)]
enum RoleCommand {
	Create {
		#[arg(long)]
		label: String,
	},
	List,
}

#[derive(Subcommand, Debug)]
enum MemberCommand {
	Create {
		#[arg(long)]
		first_name: String,
		#[arg(long)]
		last_name: String,
		#[arg(long)]
		username: Option<String>,
		#[arg(long)]
		email: Option<String>,
	},
	/// Link a member to an external user account.
	Link {
		#[arg(long)]
		member: MemberId,
		#[arg(long)]
		user: UserId,
	},
	Add {
		#[arg(long)]
		member: MemberId,
		#[arg(long)]
		group: GroupId,
		#[arg(long = "role")]
		roles: Vec<String>,
	},
	Remove {
		#[arg(long)]
		member: MemberId,
		#[arg(long)]
		group: GroupId,
	},
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => grove_config::load_config_with_file(path)?,
		None => grove_config::load_config()?,
	};

	logging::init(&config.logging);

	tracing::debug!(database_url = %config.database.url, "connecting to database");
	let pool = create_pool(&config.database.url).await?;
	run_migrations(&pool).await?;

	if run(args.command, &config, pool).await? {
		Ok(ExitCode::SUCCESS)
	} else {
		Ok(ExitCode::FAILURE)
	}
}

/// Execute one command. `Ok(false)` means a check was denied.
async fn run(command: Command, config: &GroveConfig, pool: SqlitePool) -> anyhow::Result<bool> {
	match command {
		Command::Node { command } => {
			let nodes = NodeRepository::new(pool);
			match command {
				NodeCommand::Create { title, parent } => {
					let node = Node::new(title, parent);
					nodes.create_node(&node).await?;
					print_json(&node)?;
				}
				NodeCommand::Move { id, parent } => {
					nodes.set_node_parent(id, parent).await?;
				}
				NodeCommand::Delete { id } => {
					nodes.delete_node(id).await?;
				}
			}
		}
		Command::GroupType {
			command: GroupTypeCommand::Create { label },
		} => {
			let group_type = GroupType::new(label);
			GroupRepository::new(pool)
				.create_group_type(&group_type)
				.await?;
			print_json(&group_type)?;
		}
		Command::Group { command } => {
			let groups = GroupRepository::new(pool);
			match command {
				GroupCommand::Create {
					name,
					group_type,
					parent,
				} => {
					let group = Group::new(name, group_type, parent);
					groups.create_group(&group).await?;
					print_json(&group)?;
				}
				GroupCommand::Delete { id } => groups.delete_group(id).await?,
			}
		}
		Command::Role { command } => {
			let groups = GroupRepository::new(pool);
			match command {
				RoleCommand::Create { label } => {
					let role = Role::new(label);
					groups.create_role(&role).await?;
					print_json(&role)?;
				}
				RoleCommand::List => print_json(&groups.list_roles().await?)?,
			}
		}
		Command::Member { command } => {
			let members = MemberRepository::new(pool);
			match command {
				MemberCommand::Create {
					first_name,
					last_name,
					username,
					email,
				} => {
					let mut member = Member::new(first_name, last_name);
					if let Some(username) = username {
						member = member.with_username(username);
					}
					if let Some(email) = email {
						member = member.with_email(email);
					}
					members.create_member(&member).await?;
					print_json(&member)?;
				}
				MemberCommand::Link { member, user } => {
					members.link_user(member, user).await?;
				}
				MemberCommand::Add {
					member,
					group,
					roles,
				} => {
					members.add_member(member, group, &roles).await?;
				}
				MemberCommand::Remove { member, group } => {
					if !members.remove_member(member, group).await? {
						tracing::warn!(member_id = %member, group_id = %group, "member was not in group");
					}
				}
			}
		}
		Command::Assign {
			principal,
			object,
			grants,
		} => {
			let assignments = AssignmentRepository::new(pool);
			assignments
				.assign(principal, object, &to_custom_permissions(&grants))
				.await?;
			print_json(&assignments.assignments_for(principal, object).await?)?;
		}
		Command::Revoke {
			principal,
			object,
			scope,
			permissions,
		} => {
			AssignmentRepository::new(pool)
				.revoke(principal, object, &scope, &permissions)
				.await?;
		}
		Command::Check {
			member,
			permission,
			object,
			codename,
		} => {
			let checker = authz(config, pool);
			let allowed = if codename {
				checker.has_perm(member, &permission, &object).await?
			} else {
				checker.has_permission(member, &permission, &object).await?
			};
			println!("{allowed}");
			return Ok(allowed);
		}
		Command::Permissions { member, object } => {
			let permissions = authz(config, pool)
				.effective_permissions(member, &object)
				.await?;
			print_json(&permissions)?;
		}
	}

	Ok(true)
}

fn authz(config: &GroveConfig, pool: SqlitePool) -> AuthzRepository {
	AuthzRepository::new(pool).with_max_depth(config.authz.max_ancestor_depth)
}
