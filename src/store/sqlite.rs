use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, error, info};

use crate::Result;
use crate::error::StoreError;
use crate::types::{AckRecord, Fingerprint, MessageHandle};

use super::{AlertSnapshot, AlertStateStore, ack_key, handle_key, snapshot_key};

const MAX_CONNECTIONS: u32 = 4;

/// [`AlertStateStore`] backed by a single SQLite key-value table.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Open (creating if missing) the database and apply migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] for a bad URL or an unreachable
    /// database and [`StoreError::Migration`] when the schema cannot be
    /// brought up to date.
    #[tracing::instrument(level = "info")]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|err| StoreError::Open(err.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        // Every connection to an in-memory database gets its own database,
        // so the single connection must never be recycled.
        let pool_options = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|err| StoreError::Open(err.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| {
                error!(error = %err, "state store migration failed");
                StoreError::Migration(err.to_string())
            })?;
        info!(database_url, "state store ready");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| StoreError::Query {
                operation: "get",
                source,
            })?;
        let Some((value,)) = row else {
            return Ok(None);
        };
        serde_json::from_str(&value).map(Some).map_err(|err| {
            StoreError::Corrupt {
                key: key.to_string(),
                message: err.to_string(),
            }
            .into()
        })
    }

    async fn put_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_string(value).map_err(|err| StoreError::Corrupt {
            key: key.to_string(),
            message: err.to_string(),
        })?;
        sqlx::query("INSERT OR REPLACE INTO kv_store (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(encoded)
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Query {
                operation: "put",
                source,
            })?;
        debug!(key, "stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Query {
                operation: "delete",
                source,
            })?;
        Ok(())
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[async_trait]
impl AlertStateStore for SqliteStateStore {
    async fn put_handle(&self, fp: &Fingerprint, handle: &MessageHandle) -> Result<()> {
        self.put_json(&handle_key(fp), handle).await
    }

    async fn get_handle(&self, fp: &Fingerprint) -> Result<Option<MessageHandle>> {
        self.get_json(&handle_key(fp)).await
    }

    async fn delete_handle(&self, fp: &Fingerprint) -> Result<()> {
        self.delete(&handle_key(fp)).await
    }

    async fn put_ack(&self, fp: &Fingerprint, record: &AckRecord) -> Result<()> {
        self.put_json(&ack_key(fp), record).await
    }

    async fn get_ack(&self, fp: &Fingerprint) -> Result<Option<AckRecord>> {
        self.get_json(&ack_key(fp)).await
    }

    async fn delete_ack(&self, fp: &Fingerprint) -> Result<()> {
        self.delete(&ack_key(fp)).await
    }

    async fn put_snapshot(&self, fp: &Fingerprint, snapshot: &AlertSnapshot) -> Result<()> {
        self.put_json(&snapshot_key(fp), snapshot).await
    }

    async fn get_snapshot(&self, fp: &Fingerprint) -> Result<Option<AlertSnapshot>> {
        self.get_json(&snapshot_key(fp)).await
    }

    async fn forget(&self, fp: &Fingerprint) -> Result<()> {
        let query_err = |source| StoreError::Query {
            operation: "forget",
            source,
        };
        let mut tx = self.pool.begin().await.map_err(query_err)?;
        for key in [handle_key(fp), ack_key(fp), snapshot_key(fp)] {
            sqlx::query("DELETE FROM kv_store WHERE key = ?")
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
        }
        tx.commit().await.map_err(query_err)?;
        debug!(fingerprint = %fp, "alert state removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStateStore;
    use crate::error::{Error, StoreError};
    use crate::store::AlertStateStore;
    use crate::types::{AckRecord, Fingerprint, MessageHandle};

    async fn store() -> SqliteStateStore {
        match SqliteStateStore::connect("sqlite::memory:").await {
            Ok(store) => store,
            Err(err) => panic!("in-memory store: {err}"),
        }
    }

    fn handle(id: &str) -> MessageHandle {
        MessageHandle {
            message_id: id.into(),
            channel_id: "chan".into(),
        }
    }

    #[tokio::test]
    async fn handles_overwrite_and_delete_idempotently() {
        let store = store().await;
        let fp = Fingerprint::from("abc123");
        assert!(matches!(store.get_handle(&fp).await, Ok(None)));

        assert!(store.put_handle(&fp, &handle("p1")).await.is_ok());
        assert!(store.put_handle(&fp, &handle("p2")).await.is_ok());
        let got = store.get_handle(&fp).await.ok().flatten();
        assert_eq!(got.map(|h| h.message_id), Some("p2".to_string()));

        assert!(store.delete_handle(&fp).await.is_ok());
        assert!(store.delete_handle(&fp).await.is_ok());
        assert!(matches!(store.get_handle(&fp).await, Ok(None)));
    }

    #[tokio::test]
    async fn forget_clears_every_namespace_for_one_fingerprint() {
        let store = store().await;
        let fp = Fingerprint::from("abc123");
        let other = Fingerprint::from("def456");
        let record = AckRecord {
            user_id: "u1".into(),
            username: "alice".into(),
            timestamp_millis: 1,
        };
        for target in [&fp, &other] {
            assert!(store.put_handle(target, &handle("p1")).await.is_ok());
            assert!(store.put_ack(target, &record).await.is_ok());
        }

        assert!(store.forget(&fp).await.is_ok());
        assert!(matches!(store.get_handle(&fp).await, Ok(None)));
        assert!(matches!(store.get_ack(&fp).await, Ok(None)));
        assert!(matches!(store.get_snapshot(&fp).await, Ok(None)));
        assert_eq!(store.get_ack(&other).await.ok().flatten(), Some(record));
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_its_single_connection() {
        let store = store().await;
        assert!(super::is_in_memory("sqlite::memory:"));
        assert!(!super::is_in_memory("sqlite://alertbridge.db"));
        let options = store.pool.options();
        assert_eq!(options.get_max_connections(), 1);
        assert!(options.get_idle_timeout().is_none());
        assert!(options.get_max_lifetime().is_none());
    }

    #[tokio::test]
    async fn corrupt_values_are_reported() {
        let store = store().await;
        let inserted = sqlx::query("INSERT INTO kv_store (key, value) VALUES ('ack:bad', 'nope')")
            .execute(&store.pool)
            .await;
        assert!(inserted.is_ok());
        let result = store.get_ack(&Fingerprint::from("bad")).await;
        assert!(matches!(
            result,
            Err(Error::Store(StoreError::Corrupt { .. }))
        ));
    }
}
