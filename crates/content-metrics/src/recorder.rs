use std::sync::Arc;

use chrono::{Timelike, Utc};
use uuid::Uuid;

use crate::storage::AnalyticsStorage;
use crate::types::{MetricObservation, MetricRecord};

/// Validated append of one observation, stamped with the current UTC date and
/// hour. Returns a plain success flag so the boundary layer decides on error
/// presentation; failures are logged, never propagated.
#[derive(Clone)]
pub struct MetricRecorder {
    storage: Arc<dyn AnalyticsStorage>,
}

impl MetricRecorder {
    pub fn new(storage: Arc<dyn AnalyticsStorage>) -> Self {
        Self { storage }
    }

    pub async fn record(&self, record: MetricRecord) -> bool {
        if !record.metric_value.is_finite() {
            log::warn!(
                "rejected metric '{}' for owner {}: value is not finite",
                record.metric_kind,
                record.owner_id
            );
            return false;
        }

        let now = Utc::now();
        let observation = MetricObservation {
            id: Uuid::new_v4().to_string(),
            owner_id: record.owner_id,
            content_id: record.content_id,
            metric_kind: record.metric_kind,
            metric_value: record.metric_value,
            platform: record.platform,
            source: record.source,
            extra_data: record.extra_data,
            date: now.date_naive(),
            hour: Some(now.hour() as u8),
            created_at: now,
        };

        match self.storage.insert_observation(observation).await {
            Ok(()) => true,
            Err(error) => {
                log::warn!("metric append failed: {error}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use tempfile::tempdir;

    use super::MetricRecorder;
    use crate::engine::AnalyticsEngine;
    use crate::storage::{AnalyticsStorage, SqliteAnalyticsStorage};
    use crate::types::{MetricRecord, KIND_VIEWS};

    async fn open_recorder() -> (
        MetricRecorder,
        Arc<SqliteAnalyticsStorage>,
        tempfile::TempDir,
    ) {
        let dir = tempdir().expect("temp dir");
        let storage = Arc::new(SqliteAnalyticsStorage::new(dir.path().join("analytics.db")));
        storage.init().await.expect("init storage");
        let handle: Arc<dyn AnalyticsStorage> = storage.clone();
        (MetricRecorder::new(handle), storage, dir)
    }

    fn views_record(owner: &str, value: f64) -> MetricRecord {
        MetricRecord {
            owner_id: owner.to_string(),
            metric_kind: KIND_VIEWS.to_string(),
            metric_value: value,
            ..MetricRecord::default()
        }
    }

    #[tokio::test]
    async fn record_rejects_non_finite_values() {
        let (recorder, storage, _dir) = open_recorder().await;

        assert!(!recorder.record(views_record("u1", f64::NAN)).await);
        assert!(!recorder.record(views_record("u1", f64::INFINITY)).await);

        let today = Utc::now().date_naive();
        let observations = storage
            .observations_between("u1", today, today)
            .await
            .expect("query");
        assert!(observations.is_empty());
    }

    #[tokio::test]
    async fn record_stamps_current_date_and_hour() {
        let (recorder, storage, _dir) = open_recorder().await;

        assert!(recorder.record(views_record("u1", 100.0)).await);

        let today = Utc::now().date_naive();
        let observations = storage
            .observations_between("u1", today, today)
            .await
            .expect("query");
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].date, today);
        assert!(observations[0].hour.is_some());
        assert!(observations[0].hour.unwrap_or(0) <= 23);
        assert_eq!(observations[0].metric_value, 100.0);
    }

    #[tokio::test]
    async fn recorded_metric_is_visible_in_overview() {
        let (recorder, storage, _dir) = open_recorder().await;
        let handle: Arc<dyn AnalyticsStorage> = storage.clone();
        let engine = AnalyticsEngine::new(handle);

        assert!(recorder.record(views_record("u1", 100.0)).await);

        let report = engine.overview("u1", 1, None).await.expect("overview");
        assert!(report.total_views >= 100);
    }
}
