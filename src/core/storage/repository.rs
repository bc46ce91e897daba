use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use super::models::SettingRecord;
use super::{KeyValueStore, StorageError};

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<SettingRecord>, StorageError> {
        let row = sqlx::query_as::<_, SettingRecord>(
            r#"
            SELECT key, value, updated_at
            FROM settings
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn set_setting(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value)
            VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET
              value = excluded.value,
              updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for SettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.get_setting(key).await?.map(|record| record.value))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.set_setting(key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::health::{FeedHealthTracker, HealthConfig};
    use sqlx::Row;
    use std::sync::Arc;

    #[tokio::test]
    async fn migration_creates_settings_table() {
        let repository = SettingsRepository::connect("sqlite::memory:")
            .await
            .expect("connect must succeed");
        let rows = sqlx::query(
            r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table'
              AND name = 'settings'
            "#,
        )
        .fetch_all(&repository.pool)
        .await
        .expect("query must succeed");
        assert_eq!(rows.len(), 1);

        let columns = sqlx::query("PRAGMA table_info(settings)")
            .fetch_all(&repository.pool)
            .await
            .expect("pragma should succeed");
        let names: Vec<String> = columns
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();
        assert_eq!(
            names,
            vec![
                "key".to_string(),
                "value".to_string(),
                "updated_at".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn set_setting_upserts_by_key() {
        let repository = SettingsRepository::connect("sqlite::memory:")
            .await
            .expect("connect must succeed");

        repository
            .set_setting("feedSlowThreshold", b"12.5")
            .await
            .expect("first write must succeed");
        repository
            .set_setting("feedSlowThreshold", b"20")
            .await
            .expect("second write must succeed");

        let record = repository
            .get_setting("feedSlowThreshold")
            .await
            .expect("read must succeed")
            .expect("record must exist");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
            .fetch_one(&repository.pool)
            .await
            .expect("count should succeed");

        assert_eq!(record.value, b"20".to_vec());
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let repository = SettingsRepository::connect("sqlite::memory:")
            .await
            .expect("connect must succeed");
        let value = KeyValueStore::get(&repository, "slowOrFailedFeeds")
            .await
            .expect("read must succeed");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn failure_counts_survive_reconnect() {
        let directory = tempfile::tempdir().expect("tempdir should be created");
        let database_url = crate::to_sqlite_url(directory.path().join("health.db"));

        let repository = SettingsRepository::connect(&database_url)
            .await
            .expect("connect must succeed");
        let tracker =
            FeedHealthTracker::load(Arc::new(repository.clone()), HealthConfig::default()).await;
        tracker.record_load_time("Rust Blog", 12.0).await;
        tracker.record_load_time("Rust Blog", 12.0).await;
        tracker.record_failed_feed("Hacker News").await;
        tracker.record_load_time("Lobsters", 2.0).await;
        let before = tracker.failure_counts().await;
        repository.close().await;

        let reopened = SettingsRepository::connect(&database_url)
            .await
            .expect("reconnect must succeed");
        let reloaded = FeedHealthTracker::load(Arc::new(reopened), HealthConfig::default()).await;

        assert_eq!(reloaded.failure_counts().await, before);
        assert_eq!(reloaded.failure_count("Rust Blog").await, 2);
        assert_eq!(reloaded.failure_count("Hacker News").await, 1);
        assert_eq!(reloaded.failure_count("Lobsters").await, 0);
        assert_eq!(reloaded.load_time("Rust Blog").await, 0.0);
    }
}
