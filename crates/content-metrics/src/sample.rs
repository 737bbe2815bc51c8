use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::storage::{AnalyticsStorage, MetricsResult};
use crate::types::{
    ContentItem, MetricObservation, KIND_CLICKS, KIND_ENGAGEMENT_RATE, KIND_READ_TIME, KIND_VIEWS,
};

pub const SAMPLE_PLATFORMS: [&str; 6] = [
    "facebook",
    "twitter",
    "linkedin",
    "instagram",
    "email",
    "website",
];
pub const SAMPLE_SOURCES: [&str; 4] = ["organic", "paid", "referral", "direct"];

const ITEMS_PER_DAY: usize = 5;

/// Backfills the event store with synthetic observations for demos. For each
/// day of the window and each of the owner's first five content items it
/// records views, engagement rate, clicks, and read time, dated to that day.
/// No-op when the owner has no content.
#[derive(Clone)]
pub struct SampleDataGenerator {
    storage: Arc<dyn AnalyticsStorage>,
}

impl SampleDataGenerator {
    pub fn new(storage: Arc<dyn AnalyticsStorage>) -> Self {
        Self { storage }
    }

    pub async fn generate(&self, owner_id: &str, days: u32) -> MetricsResult<()> {
        self.generate_with(owner_id, days, None, &mut rand::thread_rng())
            .await
    }

    /// Seedable entry point: the caller owns the random source, so tests can
    /// assert on ranges deterministically.
    pub async fn generate_with<R: Rng>(
        &self,
        owner_id: &str,
        days: u32,
        end_date: Option<NaiveDate>,
        rng: &mut R,
    ) -> MetricsResult<()> {
        let end = end_date.unwrap_or_else(|| Utc::now().date_naive());
        let start = end - Duration::days(i64::from(days));

        let items = self.storage.content_items(owner_id).await?;
        if items.is_empty() {
            return Ok(());
        }

        let mut day = start;
        while day <= end {
            for item in items.iter().take(ITEMS_PER_DAY) {
                let views: i32 = rng.gen_range(10..=500);
                self.insert(owner_id, item, KIND_VIEWS, f64::from(views), day, rng)
                    .await?;

                let engagement = rng.gen_range(2.0..15.0);
                self.insert(owner_id, item, KIND_ENGAGEMENT_RATE, engagement, day, rng)
                    .await?;

                // Clicks cap at 10% of that day's views, minimum 1.
                let clicks = rng.gen_range(1..=(views / 10).max(1));
                self.insert(owner_id, item, KIND_CLICKS, f64::from(clicks), day, rng)
                    .await?;

                let read_time = rng.gen_range(30.0..300.0);
                self.insert(owner_id, item, KIND_READ_TIME, read_time, day, rng)
                    .await?;
            }
            day += Duration::days(1);
        }

        Ok(())
    }

    async fn insert<R: Rng>(
        &self,
        owner_id: &str,
        item: &ContentItem,
        kind: &str,
        value: f64,
        date: NaiveDate,
        rng: &mut R,
    ) -> MetricsResult<()> {
        let observation = MetricObservation {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            content_id: Some(item.id.clone()),
            metric_kind: kind.to_string(),
            metric_value: value,
            platform: SAMPLE_PLATFORMS.choose(rng).map(|p| (*p).to_string()),
            source: SAMPLE_SOURCES.choose(rng).map(|s| (*s).to_string()),
            extra_data: None,
            date,
            hour: None,
            created_at: Utc::now(),
        };
        self.storage.insert_observation(observation).await
    }
}
