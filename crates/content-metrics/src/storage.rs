use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use thiserror::Error;

use crate::types::{ContentItem, MetricObservation};

pub type MetricsResult<T> = Result<T, MetricsError>;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("time parse error: {0}")]
    Chrono(#[from] chrono::ParseError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task join error: {0}")]
    Task(String),

    #[error("invalid analytics data: {0}")]
    InvalidData(String),
}

/// Read/write face of the event store and content catalog. Observations are
/// append-only; the only delete path is the subject cascade.
#[async_trait]
pub trait AnalyticsStorage: Send + Sync {
    async fn init(&self) -> MetricsResult<()>;

    /// Appends exactly one observation atomically.
    async fn insert_observation(&self, observation: MetricObservation) -> MetricsResult<()>;

    /// All observations for the owner with a date in `[start, end]`, both
    /// bounds inclusive, ordered by date then creation time.
    async fn observations_between(
        &self,
        owner_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> MetricsResult<Vec<MetricObservation>>;

    async fn insert_content_item(&self, item: ContentItem) -> MetricsResult<()>;

    /// Owner's catalog ordered by creation time, then id.
    async fn content_items(&self, owner_id: &str) -> MetricsResult<Vec<ContentItem>>;

    /// Deletes the item and every observation whose subject references it,
    /// in one transaction. Returns whether the item existed.
    async fn delete_content_item(&self, content_id: &str) -> MetricsResult<bool>;
}

#[derive(Debug, Clone)]
pub struct SqliteAnalyticsStorage {
    db_path: PathBuf,
}

impl SqliteAnalyticsStorage {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    async fn with_connection<T, F>(&self, func: F) -> MetricsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> MetricsResult<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let connection = open_connection(&db_path)?;
            func(&connection)
        })
        .await
        .map_err(|error| MetricsError::Task(error.to_string()))?
    }
}

#[async_trait]
impl AnalyticsStorage for SqliteAnalyticsStorage {
    async fn init(&self) -> MetricsResult<()> {
        self.with_connection(|connection| {
            // No foreign key on content_id: dangling subject references must
            // remain insertable, so the cascade is handled in
            // delete_content_item instead of the schema.
            connection.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS content_items (
                    content_id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    content_type TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS metric_observations (
                    observation_id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    content_id TEXT,
                    metric_kind TEXT NOT NULL,
                    metric_value REAL NOT NULL,
                    platform TEXT,
                    source TEXT,
                    extra_data TEXT,
                    metric_date TEXT NOT NULL,
                    hour INTEGER,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_obs_owner_date ON metric_observations(owner_id, metric_date);
                CREATE INDEX IF NOT EXISTS idx_obs_content ON metric_observations(content_id);
                CREATE INDEX IF NOT EXISTS idx_obs_kind ON metric_observations(metric_kind);
                CREATE INDEX IF NOT EXISTS idx_content_owner ON content_items(owner_id);
                "#,
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_observation(&self, observation: MetricObservation) -> MetricsResult<()> {
        self.with_connection(move |connection| {
            let extra_data = observation
                .extra_data
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            connection.execute(
                r#"
                INSERT INTO metric_observations (
                    observation_id, owner_id, content_id, metric_kind, metric_value,
                    platform, source, extra_data, metric_date, hour, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    observation.id,
                    observation.owner_id,
                    observation.content_id,
                    observation.metric_kind,
                    observation.metric_value,
                    observation.platform,
                    observation.source,
                    extra_data,
                    observation.date.to_string(),
                    observation.hour.map(i64::from),
                    format_timestamp(observation.created_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn observations_between(
        &self,
        owner_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> MetricsResult<Vec<MetricObservation>> {
        let owner_id = owner_id.to_string();
        self.with_connection(move |connection| {
            let mut stmt = connection.prepare(
                r#"
                SELECT observation_id, owner_id, content_id, metric_kind, metric_value,
                       platform, source, extra_data, metric_date, hour, created_at
                FROM metric_observations
                WHERE owner_id = ?1 AND metric_date BETWEEN date(?2) AND date(?3)
                ORDER BY metric_date ASC, created_at ASC
                "#,
            )?;

            let mut rows = stmt.query(params![owner_id, start.to_string(), end.to_string()])?;
            let mut observations = Vec::new();

            while let Some(row) = rows.next()? {
                let extra_raw: Option<String> = row.get(7)?;
                let extra_data = extra_raw
                    .map(|raw| serde_json::from_str(&raw))
                    .transpose()?;
                let created_at = parse_timestamp(row.get::<_, String>(10)?)?;

                observations.push(MetricObservation {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    content_id: row.get(2)?,
                    metric_kind: row.get(3)?,
                    metric_value: row.get(4)?,
                    platform: row.get(5)?,
                    source: row.get(6)?,
                    extra_data,
                    date: parse_date(&row.get::<_, String>(8)?)?,
                    hour: row.get::<_, Option<i64>>(9)?.map(|hour| hour as u8),
                    created_at,
                });
            }

            Ok(observations)
        })
        .await
    }

    async fn insert_content_item(&self, item: ContentItem) -> MetricsResult<()> {
        self.with_connection(move |connection| {
            connection.execute(
                r#"
                INSERT INTO content_items (
                    content_id, owner_id, title, content_type, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    item.id,
                    item.owner_id,
                    item.title,
                    item.content_type,
                    format_timestamp(item.created_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn content_items(&self, owner_id: &str) -> MetricsResult<Vec<ContentItem>> {
        let owner_id = owner_id.to_string();
        self.with_connection(move |connection| {
            let mut stmt = connection.prepare(
                r#"
                SELECT content_id, owner_id, title, content_type, created_at
                FROM content_items
                WHERE owner_id = ?1
                ORDER BY created_at ASC, content_id ASC
                "#,
            )?;

            let mut rows = stmt.query(params![owner_id])?;
            let mut items = Vec::new();

            while let Some(row) = rows.next()? {
                items.push(ContentItem {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    title: row.get(2)?,
                    content_type: row.get(3)?,
                    created_at: parse_timestamp(row.get::<_, String>(4)?)?,
                });
            }

            Ok(items)
        })
        .await
    }

    async fn delete_content_item(&self, content_id: &str) -> MetricsResult<bool> {
        let content_id = content_id.to_string();
        self.with_connection(move |connection| {
            let tx = connection.unchecked_transaction()?;
            tx.execute(
                "DELETE FROM metric_observations WHERE content_id = ?1",
                params![content_id],
            )?;
            let deleted = tx.execute(
                "DELETE FROM content_items WHERE content_id = ?1",
                params![content_id],
            )?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
    }
}

fn open_connection(path: &Path) -> MetricsResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let connection = Connection::open(path)?;
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        "#,
    )?;
    Ok(connection)
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339()
}

fn parse_timestamp(raw: String) -> MetricsResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc))
}

fn parse_date(raw: &str) -> MetricsResult<NaiveDate> {
    Ok(NaiveDate::parse_from_str(raw, "%Y-%m-%d")?)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::tempdir;
    use uuid::Uuid;

    use super::{AnalyticsStorage, SqliteAnalyticsStorage};
    use crate::types::{ContentItem, MetricObservation, KIND_VIEWS};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn observation(owner: &str, kind: &str, value: f64, day: NaiveDate) -> MetricObservation {
        MetricObservation {
            id: Uuid::new_v4().to_string(),
            owner_id: owner.to_string(),
            content_id: None,
            metric_kind: kind.to_string(),
            metric_value: value,
            platform: None,
            source: None,
            extra_data: None,
            date: day,
            hour: Some(12),
            created_at: day.and_hms_opt(12, 0, 0).expect("valid time").and_utc(),
        }
    }

    fn content_item(id: &str, owner: &str, content_type: &str, day: NaiveDate) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            owner_id: owner.to_string(),
            title: format!("{id} title"),
            content_type: content_type.to_string(),
            created_at: day.and_hms_opt(9, 0, 0).expect("valid time").and_utc(),
        }
    }

    async fn open_storage() -> (SqliteAnalyticsStorage, tempfile::TempDir) {
        let dir = tempdir().expect("temp dir");
        let storage = SqliteAnalyticsStorage::new(dir.path().join("analytics.db"));
        storage.init().await.expect("init storage");
        (storage, dir)
    }

    #[tokio::test]
    async fn storage_filters_observations_by_owner_and_inclusive_window() {
        let (storage, _dir) = open_storage().await;

        storage
            .insert_observation(observation("u1", KIND_VIEWS, 10.0, date(2026, 8, 1)))
            .await
            .expect("insert");
        storage
            .insert_observation(observation("u1", KIND_VIEWS, 20.0, date(2026, 8, 5)))
            .await
            .expect("insert");
        storage
            .insert_observation(observation("u1", KIND_VIEWS, 30.0, date(2026, 8, 9)))
            .await
            .expect("insert");
        storage
            .insert_observation(observation("u2", KIND_VIEWS, 99.0, date(2026, 8, 5)))
            .await
            .expect("insert");

        let observations = storage
            .observations_between("u1", date(2026, 8, 1), date(2026, 8, 5))
            .await
            .expect("query");

        assert_eq!(observations.len(), 2);
        assert!(observations.iter().all(|obs| obs.owner_id == "u1"));
        assert_eq!(observations[0].date, date(2026, 8, 1));
        assert_eq!(observations[1].date, date(2026, 8, 5));
    }

    #[tokio::test]
    async fn storage_accepts_dangling_subject_references() {
        let (storage, _dir) = open_storage().await;

        let mut dangling = observation("u1", KIND_VIEWS, 5.0, date(2026, 8, 1));
        dangling.content_id = Some("no-such-content".to_string());
        storage
            .insert_observation(dangling)
            .await
            .expect("dangling subject insert succeeds");

        let observations = storage
            .observations_between("u1", date(2026, 8, 1), date(2026, 8, 1))
            .await
            .expect("query");
        assert_eq!(observations.len(), 1);
        assert_eq!(
            observations[0].content_id.as_deref(),
            Some("no-such-content")
        );
    }

    #[tokio::test]
    async fn delete_content_item_cascades_to_subject_observations() {
        let (storage, _dir) = open_storage().await;

        storage
            .insert_content_item(content_item("c1", "u1", "article", date(2026, 8, 1)))
            .await
            .expect("insert item");

        let mut subject_obs = observation("u1", KIND_VIEWS, 50.0, date(2026, 8, 2));
        subject_obs.content_id = Some("c1".to_string());
        storage
            .insert_observation(subject_obs)
            .await
            .expect("insert");
        storage
            .insert_observation(observation("u1", KIND_VIEWS, 7.0, date(2026, 8, 2)))
            .await
            .expect("insert");

        let deleted = storage
            .delete_content_item("c1")
            .await
            .expect("delete item");
        assert!(deleted);

        let items = storage.content_items("u1").await.expect("items");
        assert!(items.is_empty());

        let observations = storage
            .observations_between("u1", date(2026, 8, 2), date(2026, 8, 2))
            .await
            .expect("query");
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].content_id, None);

        let missing = storage
            .delete_content_item("c1")
            .await
            .expect("second delete");
        assert!(!missing);
    }

    #[tokio::test]
    async fn content_items_are_ordered_by_creation_time() {
        let (storage, _dir) = open_storage().await;

        storage
            .insert_content_item(content_item("later", "u1", "article", date(2026, 8, 10)))
            .await
            .expect("insert");
        storage
            .insert_content_item(content_item("earlier", "u1", "email", date(2026, 8, 1)))
            .await
            .expect("insert");

        let items = storage.content_items("u1").await.expect("items");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "earlier");
        assert_eq!(items[1].id, "later");
    }

    #[tokio::test]
    async fn extra_data_round_trips_as_json() {
        let (storage, _dir) = open_storage().await;

        let mut obs = observation("u1", "shares", 3.0, date(2026, 8, 4));
        obs.extra_data = Some(json!({"campaign": "launch", "variant": 2}));
        storage.insert_observation(obs.clone()).await.expect("insert");

        let observations = storage
            .observations_between("u1", date(2026, 8, 4), date(2026, 8, 4))
            .await
            .expect("query");
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].extra_data, obs.extra_data);
        assert_eq!(observations[0].hour, Some(12));
    }
}
