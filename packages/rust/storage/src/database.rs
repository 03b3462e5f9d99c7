//! libSQL backend (local, offline file).
//!
//! Each save replaces one state kind inside a transaction, so a crash
//! mid-save leaves the previous document intact.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use curator_shared::{
    CuratorError, EmbeddingRecord, FeedbackAction, FeedbackRecord, FeedbackState, FeedbackTag,
    LearnedWeights, Result, SeenUrls,
};
use libsql::{Connection, Database, params};

use crate::backend::StateBackend;
use crate::migrations;

fn storage_err(e: impl std::fmt::Display) -> CuratorError {
    CuratorError::Storage(e.to_string())
}

fn action_str(action: FeedbackAction) -> &'static str {
    match action {
        FeedbackAction::Approved => "approved",
        FeedbackAction::Ignored => "ignored",
    }
}

fn parse_action(raw: &str) -> Result<FeedbackAction> {
    match raw {
        "approved" => Ok(FeedbackAction::Approved),
        "ignored" => Ok(FeedbackAction::Ignored),
        other => Err(CuratorError::Storage(format!("unknown feedback action {other:?}"))),
    }
}

/// Durable backend over a local libSQL database.
pub struct LibsqlBackend {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl LibsqlBackend {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CuratorError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let backend = Self { db, conn };
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    CuratorError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }
}

#[async_trait]
impl StateBackend for LibsqlBackend {
    fn name(&self) -> &'static str {
        "libsql"
    }

    async fn load_urls(&self) -> Result<SeenUrls> {
        let mut rows = self
            .conn
            .query("SELECT url, first_seen FROM seen_urls", params![])
            .await
            .map_err(storage_err)?;

        let mut urls = SeenUrls::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let url = row.get::<String>(0).map_err(storage_err)?;
            let first_seen = row.get::<i64>(1).map_err(storage_err)?;
            urls.insert(url, first_seen);
        }
        Ok(urls)
    }

    async fn save_urls(&self, urls: &SeenUrls) -> Result<()> {
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute("DELETE FROM seen_urls", params![])
            .await
            .map_err(storage_err)?;
        for (url, first_seen) in urls {
            tx.execute(
                "INSERT INTO seen_urls (url, first_seen) VALUES (?1, ?2)",
                params![url.as_str(), *first_seen],
            )
            .await
            .map_err(storage_err)?;
        }
        tx.commit().await.map_err(storage_err)
    }

    async fn load_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, vector_json, title, timestamp_ms FROM embeddings ORDER BY timestamp_ms",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let vector_json = row.get::<String>(1).map_err(storage_err)?;
            records.push(EmbeddingRecord {
                id: row.get::<String>(0).map_err(storage_err)?,
                embedding: serde_json::from_str(&vector_json).map_err(storage_err)?,
                title: row.get::<String>(2).map_err(storage_err)?,
                timestamp_ms: row.get::<i64>(3).map_err(storage_err)?,
            });
        }
        Ok(records)
    }

    async fn save_embeddings(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute("DELETE FROM embeddings", params![])
            .await
            .map_err(storage_err)?;
        for record in records {
            let vector_json = serde_json::to_string(&record.embedding).map_err(storage_err)?;
            tx.execute(
                "INSERT OR REPLACE INTO embeddings (id, vector_json, title, timestamp_ms)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.as_str(),
                    vector_json.as_str(),
                    record.title.as_str(),
                    record.timestamp_ms
                ],
            )
            .await
            .map_err(storage_err)?;
        }
        tx.commit().await.map_err(storage_err)
    }

    async fn load_feedback(&self) -> Result<FeedbackState> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, timestamp_ms, actor_id, action, tags_json
                 FROM feedback_records ORDER BY timestamp_ms",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut feedback_history = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let action = row.get::<String>(3).map_err(storage_err)?;
            let tags_json = row.get::<String>(4).map_err(storage_err)?;
            let tags: Vec<FeedbackTag> = serde_json::from_str(&tags_json).map_err(storage_err)?;
            feedback_history.push(FeedbackRecord {
                id: row.get::<String>(0).map_err(storage_err)?,
                timestamp_ms: row.get::<i64>(1).map_err(storage_err)?,
                actor_id: row.get::<String>(2).map_err(storage_err)?,
                action: parse_action(&action)?,
                tags,
            });
        }

        let mut rows = self
            .conn
            .query(
                "SELECT version, updated_at, category_boosts_json, source_boosts_json
                 FROM learned_weights WHERE id = 1",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let learned_weights = match rows.next().await.map_err(storage_err)? {
            Some(row) => {
                let category_json = row.get::<String>(2).map_err(storage_err)?;
                let source_json = row.get::<String>(3).map_err(storage_err)?;
                LearnedWeights {
                    version: row.get::<i64>(0).map_err(storage_err)?.max(0) as u64,
                    updated_at: row.get::<Option<i64>>(1).map_err(storage_err)?,
                    category_boosts: serde_json::from_str::<BTreeMap<String, f64>>(&category_json)
                        .map_err(storage_err)?,
                    source_boosts: serde_json::from_str::<BTreeMap<String, f64>>(&source_json)
                        .map_err(storage_err)?,
                }
            }
            None => LearnedWeights::default(),
        };

        Ok(FeedbackState {
            feedback_history,
            learned_weights,
        })
    }

    async fn save_feedback(&self, state: &FeedbackState) -> Result<()> {
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute("DELETE FROM feedback_records", params![])
            .await
            .map_err(storage_err)?;
        for record in &state.feedback_history {
            let tags_json = serde_json::to_string(&record.tags).map_err(storage_err)?;
            tx.execute(
                "INSERT OR REPLACE INTO feedback_records (id, timestamp_ms, actor_id, action, tags_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id.as_str(),
                    record.timestamp_ms,
                    record.actor_id.as_str(),
                    action_str(record.action),
                    tags_json.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        }

        let weights = &state.learned_weights;
        let category_json = serde_json::to_string(&weights.category_boosts).map_err(storage_err)?;
        let source_json = serde_json::to_string(&weights.source_boosts).map_err(storage_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO learned_weights
                 (id, version, updated_at, category_boosts_json, source_boosts_json)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                weights.version as i64,
                weights.updated_at,
                category_json.as_str(),
                source_json.as_str()
            ],
        )
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_backend() -> LibsqlBackend {
        let tmp = std::env::temp_dir().join(format!("curator_test_{}.db", Uuid::now_v7()));
        LibsqlBackend::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_creates_schema() {
        let backend = test_backend().await;
        assert_eq!(backend.schema_version().await, 2);
        assert!(backend.load_urls().await.unwrap().is_empty());
        assert_eq!(backend.load_feedback().await.unwrap(), FeedbackState::default());
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("curator_test_{}.db", Uuid::now_v7()));
        let first = LibsqlBackend::open(&tmp).await.expect("first open");
        drop(first);
        let second = LibsqlBackend::open(&tmp).await.expect("second open");
        assert_eq!(second.schema_version().await, 2);
    }

    #[tokio::test]
    async fn urls_are_replaced_on_save() {
        let backend = test_backend().await;
        let mut urls = SeenUrls::new();
        urls.insert("https://a.test".into(), 1);
        urls.insert("https://b.test".into(), 2);
        backend.save_urls(&urls).await.unwrap();

        urls.remove("https://a.test");
        backend.save_urls(&urls).await.unwrap();
        let loaded = backend.load_urls().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("https://b.test"), Some(&2));
    }

    #[tokio::test]
    async fn embeddings_roundtrip_in_timestamp_order() {
        let backend = test_backend().await;
        let records = vec![
            EmbeddingRecord {
                id: "itm_b".into(),
                embedding: vec![0.5, -0.5],
                title: "second".into(),
                timestamp_ms: 20,
            },
            EmbeddingRecord {
                id: "itm_a".into(),
                embedding: vec![1.0, 0.0],
                title: "first".into(),
                timestamp_ms: 10,
            },
        ];
        backend.save_embeddings(&records).await.unwrap();
        let loaded = backend.load_embeddings().await.unwrap();
        assert_eq!(loaded[0].id, "itm_a");
        assert_eq!(loaded[1].embedding, vec![0.5, -0.5]);
    }

    #[tokio::test]
    async fn feedback_and_weights_persist() {
        let backend = test_backend().await;
        let mut state = FeedbackState::default();
        state.feedback_history.push(FeedbackRecord {
            id: "fb_1".into(),
            timestamp_ms: 1000,
            actor_id: "reviewer".into(),
            action: FeedbackAction::Approved,
            tags: vec![FeedbackTag {
                category: "tool".into(),
                source: "OpenAI".into(),
                url: None,
                title: None,
            }],
        });
        state.learned_weights.version = 4;
        state.learned_weights.updated_at = Some(999);
        state.learned_weights.category_boosts.insert("tool".into(), 1.5);

        backend.save_feedback(&state).await.unwrap();
        assert_eq!(backend.load_feedback().await.unwrap(), state);
    }
}
