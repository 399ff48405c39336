//! Document store: single-document CRUD, collection queries, counts,
//! atomic write batches and live subscriptions.
//!
//! Documents are JSON objects kept in the `documents` table keyed by path.
//! The `id` field is never stored; reads inject it from the last path segment.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tokio::sync::{broadcast, mpsc};

use super::paths::{check_collection_path, split_document_path};
use super::query::{self, QueryOptions};
use super::subscription::Subscription;
use crate::errors::AppError;

/// Capacity of the change feed shared by all subscriptions.
const CHANGE_FEED_CAPACITY: usize = 256;

/// One write of a [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create or fully overwrite
    Set { path: String, data: Value },
    /// Merge top-level fields into an existing document
    Update { path: String, data: Value },
    Delete { path: String },
}

impl WriteOp {
    fn path(&self) -> &str {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Update { path, .. } | WriteOp::Delete { path } => path,
        }
    }
}

/// Writes applied all-or-nothing by [`DocumentStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, data: Value) -> Self {
        self.ops.push(WriteOp::Set {
            path: path.into(),
            data,
        });
        self
    }

    pub fn update(mut self, path: impl Into<String>, data: Value) -> Self {
        self.ops.push(WriteOp::Update {
            path: path.into(),
            data,
        });
        self
    }

    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.ops.push(WriteOp::Delete { path: path.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Handle to the document store. Cheap to clone.
#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
    changes: broadcast::Sender<String>,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    /// Read one document. Absent documents resolve to `None`.
    pub async fn get(&self, path: &str) -> Result<Option<Value>, AppError> {
        let (_, id) = split_document_path(path)?;
        let row = sqlx::query("SELECT data FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| with_id(row.get::<String, _>("data").as_str(), id))
            .transpose()
    }

    /// Read one document and deserialize it.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, AppError> {
        match self.get(path).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set(&self, path: &str, data: Value) -> Result<(), AppError> {
        self.commit(WriteBatch::new().set(path, data)).await
    }

    /// Fails with `NotFound` when the document does not exist.
    pub async fn update(&self, path: &str, partial: Value) -> Result<(), AppError> {
        self.commit(WriteBatch::new().update(path, partial)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), AppError> {
        self.commit(WriteBatch::new().delete(path)).await
    }

    /// Create a document with a generated identifier and return it.
    pub async fn add(&self, collection: &str, data: Value) -> Result<String, AppError> {
        check_collection_path(collection)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.set(&format!("{}/{}", collection, id), data).await?;
        Ok(id)
    }

    /// One-shot read of a collection query.
    pub async fn list(&self, collection: &str, options: &QueryOptions) -> Result<Vec<Value>, AppError> {
        let documents = self.load_collection(collection).await?;
        Ok(query::execute(options, documents))
    }

    pub async fn list_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        options: &QueryOptions,
    ) -> Result<Vec<T>, AppError> {
        self.list(collection, options)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(AppError::from))
            .collect()
    }

    /// Aggregate count of the documents matching `options`.
    pub async fn count(&self, collection: &str, options: &QueryOptions) -> Result<u64, AppError> {
        let documents = self.load_collection(collection).await?;
        Ok(query::count(options, &documents))
    }

    /// Subscribe to a live query.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, collection: &str, options: QueryOptions) -> Subscription {
        let (sender, receiver) = mpsc::channel(16);
        // Subscribe to the feed before the first read so no commit is missed.
        let mut changes = self.changes.subscribe();
        let store = self.clone();
        let collection = collection.to_string();

        let task = tokio::spawn(async move {
            loop {
                let snapshot = store.list(&collection, &options).await;
                let failed = snapshot.is_err();
                if sender.send(snapshot).await.is_err() || failed {
                    return;
                }

                loop {
                    match changes.recv().await {
                        Ok(changed) if changed == collection => break,
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(%collection, skipped, "Change feed lagged, re-reading");
                            break;
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        });

        Subscription::new(receiver, task)
    }

    /// Apply every write of `batch` in one transaction.
    pub async fn commit(&self, batch: WriteBatch) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let mut touched = BTreeSet::new();
        let mut tx = self.pool.begin().await?;

        for op in &batch.ops {
            let (collection, _) = split_document_path(op.path())?;
            touched.insert(collection.to_string());
            apply(&mut *tx, op, &now).await?;
        }

        tx.commit().await?;
        tracing::debug!(writes = batch.len(), collections = ?touched, "Committed write batch");

        for collection in touched {
            // No receivers is fine
            let _ = self.changes.send(collection);
        }
        Ok(())
    }

    async fn load_collection(&self, collection: &str) -> Result<Vec<Value>, AppError> {
        check_collection_path(collection)?;
        let rows = sqlx::query("SELECT doc_id, data FROM documents WHERE collection = ? ORDER BY doc_id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("doc_id");
                let data: String = row.get("data");
                with_id(&data, &id)
            })
            .collect()
    }
}

async fn apply(conn: &mut SqliteConnection, op: &WriteOp, now: &str) -> Result<(), AppError> {
    match op {
        WriteOp::Set { path, data } => {
            let data = without_id(data)?;
            upsert(conn, path, &data, now).await
        }
        WriteOp::Update { path, data } => {
            let partial = without_id(data)?;
            let row = sqlx::query("SELECT data FROM documents WHERE path = ?")
                .bind(path)
                .fetch_optional(&mut *conn)
                .await?;
            let Some(row) = row else {
                return Err(AppError::NotFound(format!("Document {} not found", path)));
            };

            let mut merged: Map<String, Value> = serde_json::from_str(row.get::<String, _>("data").as_str())?;
            merged.extend(partial);
            upsert(conn, path, &merged, now).await
        }
        WriteOp::Delete { path } => {
            sqlx::query("DELETE FROM documents WHERE path = ?")
                .bind(path)
                .execute(&mut *conn)
                .await?;
            Ok(())
        }
    }
}

async fn upsert(
    conn: &mut SqliteConnection,
    path: &str,
    data: &Map<String, Value>,
    now: &str,
) -> Result<(), AppError> {
    let (collection, id) = split_document_path(path)?;
    let json = serde_json::to_string(data)?;

    sqlx::query(
        "INSERT INTO documents (path, collection, doc_id, data, updated_at) VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(path) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
    )
    .bind(path)
    .bind(collection)
    .bind(id)
    .bind(&json)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn without_id(data: &Value) -> Result<Map<String, Value>, AppError> {
    let Value::Object(fields) = data else {
        return Err(AppError::Document("Document data must be a JSON object".to_string()));
    };
    let mut fields = fields.clone();
    fields.remove("id");
    Ok(fields)
}

fn with_id(data: &str, id: &str) -> Result<Value, AppError> {
    let mut fields: Map<String, Value> = serde_json::from_str(data)?;
    fields.insert("id".to_string(), Value::String(id.to_string()));
    Ok(Value::Object(fields))
}
