// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Node repository: the persisted entity graph.

use grove_authz::{AuthzError, Node, NodeId, ObjectRef};
use sqlx::{
	sqlite::{SqlitePool, SqliteRow},
	Row, SqliteConnection,
};

use crate::error::DbError;
use crate::row::{optional_uuid_column, timestamp_column, uuid_column};

/// Parent of a node: `None` if the node does not exist, `Some(None)` for a
/// root.
pub(crate) async fn node_parent(
	conn: &mut SqliteConnection,
	id: NodeId,
) -> Result<Option<Option<NodeId>>, DbError> {
	let row: Option<(Option<String>,)> = sqlx::query_as("SELECT parent_id FROM nodes WHERE id = ?")
		.bind(id.to_string())
		.fetch_optional(&mut *conn)
		.await?;

	row
		.map(|(parent,)| {
			parent
				.map(|p| {
					p.parse::<NodeId>()
						.map_err(|e| DbError::Internal(format!("Invalid parent_id: {e}")))
				})
				.transpose()
		})
		.transpose()
}

/// Strict ancestors, nearest first, at most `max_depth` of them.
pub(crate) async fn node_ancestors(
	conn: &mut SqliteConnection,
	id: NodeId,
	max_depth: usize,
) -> Result<Vec<NodeId>, DbError> {
	let mut chain = Vec::new();
	let mut current = node_parent(conn, id).await?.flatten();
	while let Some(parent) = current {
		if parent == id || chain.contains(&parent) {
			tracing::warn!(node_id = %id, "cycle in stored node parents");
			break;
		}
		if chain.len() >= max_depth {
			tracing::warn!(node_id = %id, max_depth, "ancestor walk truncated");
			break;
		}
		chain.push(parent);
		current = node_parent(conn, parent).await?.flatten();
	}
	Ok(chain)
}

/// Repository for node database operations.
#[derive(Clone)]
pub struct NodeRepository {
	pool: SqlitePool,
}

impl NodeRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a node. The parent, if any, must exist.
	#[tracing::instrument(skip(self, node), fields(node_id = %node.id))]
	pub async fn create_node(&self, node: &Node) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;

		if let Some(parent) = node.parent {
			if node_parent(&mut tx, parent).await?.is_none() {
				return Err(AuthzError::UnknownObject(ObjectRef::Node(parent)).into());
			}
		}

		sqlx::query(
			r#"
			INSERT INTO nodes (id, title, parent_id, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(node.id.to_string())
		.bind(&node.title)
		.bind(node.parent.map(|p| p.to_string()))
		.bind(node.created_at.to_rfc3339())
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;
		tracing::debug!(node_id = %node.id, "node created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(node_id = %id))]
	pub async fn get_node(&self, id: NodeId) -> Result<Option<Node>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, title, parent_id, created_at
			FROM nodes
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_node(&r)).transpose()
	}

	/// Move a node under `parent`, or make it a root.
	///
	/// Fails with [`AuthzError::Cycle`] if `parent` is the node or one of its
	/// descendants.
	#[tracing::instrument(skip(self), fields(node_id = %id))]
	pub async fn set_node_parent(&self, id: NodeId, parent: Option<NodeId>) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;

		if node_parent(&mut tx, id).await?.is_none() {
			return Err(AuthzError::UnknownObject(ObjectRef::Node(id)).into());
		}
		if let Some(parent) = parent {
			if node_parent(&mut tx, parent).await?.is_none() {
				return Err(AuthzError::UnknownObject(ObjectRef::Node(parent)).into());
			}
			if parent == id || node_ancestors(&mut tx, parent, usize::MAX).await?.contains(&id) {
				return Err(
					AuthzError::Cycle(format!("node {parent} is {id} or one of its descendants")).into(),
				);
			}
		}

		sqlx::query("UPDATE nodes SET parent_id = ? WHERE id = ?")
			.bind(parent.map(|p| p.to_string()))
			.bind(id.to_string())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		tracing::debug!(node_id = %id, "node moved");
		Ok(())
	}

	/// Delete a node. Children become roots and assignments targeting the
	/// node are dropped in the same transaction.
	#[tracing::instrument(skip(self), fields(node_id = %id))]
	pub async fn delete_node(&self, id: NodeId) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;
		let node_id = id.to_string();

		sqlx::query("UPDATE nodes SET parent_id = NULL WHERE parent_id = ?")
			.bind(&node_id)
			.execute(&mut *tx)
			.await?;

		sqlx::query(
			r#"
			DELETE FROM permission_assignments
			WHERE object_kind = 'node' AND object_id = ?
			"#,
		)
		.bind(&node_id)
		.execute(&mut *tx)
		.await?;

		let result = sqlx::query("DELETE FROM nodes WHERE id = ?")
			.bind(&node_id)
			.execute(&mut *tx)
			.await?;
		if result.rows_affected() == 0 {
			return Err(AuthzError::UnknownObject(ObjectRef::Node(id)).into());
		}

		tx.commit().await?;
		tracing::debug!(node_id = %id, "node deleted");
		Ok(())
	}

	/// Direct children ordered by creation.
	#[tracing::instrument(skip(self), fields(node_id = %id))]
	pub async fn children_of(&self, id: NodeId) -> Result<Vec<Node>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, title, parent_id, created_at
			FROM nodes
			WHERE parent_id = ?
			ORDER BY created_at ASC
			"#,
		)
		.bind(id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_node).collect()
	}

	/// Strict ancestors, nearest first.
	#[tracing::instrument(skip(self), fields(node_id = %id))]
	pub async fn ancestors(&self, id: NodeId, max_depth: usize) -> Result<Vec<NodeId>, DbError> {
		let mut conn = self.pool.acquire().await?;
		node_ancestors(&mut conn, id, max_depth).await
	}
}

fn row_to_node(row: &SqliteRow) -> Result<Node, DbError> {
	Ok(Node {
		id: NodeId::new(uuid_column(row, "id")?),
		title: row.get("title"),
		parent: optional_uuid_column(row, "parent_id")?.map(NodeId::new),
		created_at: timestamp_column(row, "created_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_migrated_pool;

	async fn make_repo() -> NodeRepository {
		NodeRepository::new(create_migrated_pool().await)
	}

	async fn chain(repo: &NodeRepository) -> (Node, Node, Node) {
		let n1 = Node::new("Node 1", None);
		let n2 = Node::new("Node 2", Some(n1.id));
		let n3 = Node::new("Node 3", Some(n2.id));
		for node in [&n1, &n2, &n3] {
			repo.create_node(node).await.unwrap();
		}
		(n1, n2, n3)
	}

	#[tokio::test]
	async fn create_and_get_round_trips() {
		let repo = make_repo().await;
		let (n1, n2, _) = chain(&repo).await;

		let fetched = repo.get_node(n2.id).await.unwrap().unwrap();
		assert_eq!(fetched.title, "Node 2");
		assert_eq!(fetched.parent, Some(n1.id));
		assert!(repo.get_node(NodeId::generate()).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn create_rejects_unknown_parent() {
		let repo = make_repo().await;
		let orphan = Node::new("orphan", Some(NodeId::generate()));

		let err = repo.create_node(&orphan).await.unwrap_err();
		assert!(matches!(err, DbError::Authz(AuthzError::UnknownObject(_))));
	}

	#[tokio::test]
	async fn ancestors_are_nearest_first() {
		let repo = make_repo().await;
		let (n1, n2, n3) = chain(&repo).await;

		assert_eq!(repo.ancestors(n3.id, 64).await.unwrap(), vec![n2.id, n1.id]);
		assert_eq!(repo.ancestors(n3.id, 1).await.unwrap(), vec![n2.id]);
	}

	#[tokio::test]
	async fn set_parent_rejects_cycle() {
		let repo = make_repo().await;
		let (n1, _, n3) = chain(&repo).await;

		let err = repo.set_node_parent(n1.id, Some(n3.id)).await.unwrap_err();
		assert!(matches!(err, DbError::Authz(AuthzError::Cycle(_))));
		assert_eq!(repo.get_node(n1.id).await.unwrap().unwrap().parent, None);
	}

	#[tokio::test]
	async fn delete_reroots_children() {
		let repo = make_repo().await;
		let (n1, n2, n3) = chain(&repo).await;

		repo.delete_node(n2.id).await.unwrap();

		assert_eq!(repo.get_node(n3.id).await.unwrap().unwrap().parent, None);
		assert!(repo.children_of(n1.id).await.unwrap().is_empty());
		assert!(matches!(
			repo.delete_node(n2.id).await.unwrap_err(),
			DbError::Authz(AuthzError::UnknownObject(_))
		));
	}
}
