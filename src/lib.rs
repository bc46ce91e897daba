pub mod core;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use crate::core::health::{
    ConfigError, FeedHealth, FeedHealthTracker, HealthConfig, LoadOutcome, LoadTimeEvent,
};
pub use crate::core::storage::repository::SettingsRepository;
pub use crate::core::storage::{KeyValueStore, MemoryStore, StorageError};
pub use crate::core::AppServices;

const DATABASE_FILE: &str = "rssr.db";

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn open_health_tracker(database_url: &str) -> Result<FeedHealthTracker, BootstrapError> {
    let _ = dotenvy::from_filename(".env.local");
    let config = HealthConfig::from_env()?;
    let repository = SettingsRepository::connect(database_url).await?;
    Ok(FeedHealthTracker::load(Arc::new(repository), config).await)
}

pub async fn open_services(app_data_dir: &Path) -> Result<AppServices, BootstrapError> {
    let database_url = build_database_url(app_data_dir)?;
    let tracker = open_health_tracker(&database_url).await?;
    Ok(AppServices::new(tracker))
}

pub fn build_database_url(app_data_dir: &Path) -> Result<String, std::io::Error> {
    std::fs::create_dir_all(app_data_dir)?;
    Ok(to_sqlite_url(app_data_dir.join(DATABASE_FILE)))
}

pub fn to_sqlite_url(path: PathBuf) -> String {
    format!("sqlite://{}?mode=rwc", path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_url_requests_create_mode() {
        let url = to_sqlite_url(PathBuf::from("/var/lib/rssr/rssr.db"));
        assert_eq!(url, "sqlite:///var/lib/rssr/rssr.db?mode=rwc");
    }

    #[test]
    fn database_url_creates_missing_directory() {
        let directory = tempfile::tempdir().expect("tempdir should be created");
        let app_data_dir = directory.path().join("nested").join("app");

        let url = build_database_url(&app_data_dir).expect("url should build");

        assert!(app_data_dir.is_dir());
        assert!(url.ends_with("rssr.db?mode=rwc"));
    }

    #[tokio::test]
    async fn open_services_persists_between_sessions() {
        let directory = tempfile::tempdir().expect("tempdir should be created");

        let services = open_services(directory.path())
            .await
            .expect("services should open");
        let health = services.health();
        health.record_failed_feed("Offline Feed").await;
        health.record_failed_feed("Offline Feed").await;
        health.record_failed_feed("Offline Feed").await;
        drop(health);
        drop(services);

        let reopened = open_services(directory.path())
            .await
            .expect("services should reopen");
        let report = reopened.health_report().await;

        assert!(reopened.health().should_skip_feed("Offline Feed").await);
        assert_eq!(report.get("Offline Feed").map(String::as_str), Some("skip"));
    }
}
