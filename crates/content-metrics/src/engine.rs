use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use crate::storage::{AnalyticsStorage, MetricsResult};
use crate::types::{
    ContentItem, ContentPerformanceRow, DailyCountPoint, DailyMetricsReport, DailyValuePoint,
    ExportBundle, OverviewReport, PlatformPerformanceRow, TypeDistributionRow, KIND_CLICKS,
    KIND_ENGAGEMENT_RATE, KIND_READ_TIME, KIND_VIEWS,
};

const EXPORT_PERFORMANCE_LIMIT: usize = 50;

/// Stateless report engine over an injected store handle. Every operation is
/// a pure read over the window `[end - days, end]`, both bounds inclusive;
/// `end_date` defaults to today (UTC). `days` is not clamped here, that is a
/// boundary-layer concern.
#[derive(Clone)]
pub struct AnalyticsEngine {
    storage: Arc<dyn AnalyticsStorage>,
}

impl AnalyticsEngine {
    pub fn new(storage: Arc<dyn AnalyticsStorage>) -> Self {
        Self { storage }
    }

    /// Window totals plus percent change against the immediately preceding
    /// window of equal length.
    pub async fn overview(
        &self,
        owner_id: &str,
        days: u32,
        end_date: Option<NaiveDate>,
    ) -> MetricsResult<OverviewReport> {
        let (start, end) = resolve_window(days, end_date);

        let items = self.storage.content_items(owner_id).await?;
        let total_content = items.len() as u64;
        let period_content = count_created_between(&items, start, end);

        let observations = self.storage.observations_between(owner_id, start, end).await?;
        let mut total_views = 0.0;
        let mut total_read_time = 0.0;
        let mut engagement = Accumulator::default();
        for obs in &observations {
            match obs.metric_kind.as_str() {
                KIND_VIEWS => total_views += obs.metric_value,
                KIND_READ_TIME => total_read_time += obs.metric_value,
                KIND_ENGAGEMENT_RATE => engagement.push(obs.metric_value),
                _ => {}
            }
        }
        // Ratio of read time to views, so read-time records without a
        // matching view do not skew the average.
        let avg_read_time = total_read_time / total_views.max(1.0);

        // Previous window is [end - 2*days, end - days), end-exclusive.
        let prev_start = start - Duration::days(i64::from(days));
        let prev_end = start - Duration::days(1);
        let previous = self
            .storage
            .observations_between(owner_id, prev_start, prev_end)
            .await?;
        let prev_views: f64 = previous
            .iter()
            .filter(|obs| obs.metric_kind == KIND_VIEWS)
            .map(|obs| obs.metric_value)
            .sum();
        let prev_content = count_created_between(&items, prev_start, prev_end);

        Ok(OverviewReport {
            total_content,
            period_content,
            total_views: total_views as u64,
            avg_engagement_rate: round2(engagement.average()),
            avg_read_time: round2(avg_read_time),
            views_change: percent_change(total_views, prev_views),
            content_change: percent_change(period_content as f64, prev_content as f64),
        })
    }

    /// Every owned content item with its windowed view sum and engagement
    /// average, top `limit` by views. Ties break on content id ascending.
    pub async fn content_performance(
        &self,
        owner_id: &str,
        days: u32,
        limit: usize,
        end_date: Option<NaiveDate>,
    ) -> MetricsResult<Vec<ContentPerformanceRow>> {
        let (start, end) = resolve_window(days, end_date);

        let items = self.storage.content_items(owner_id).await?;
        let observations = self.storage.observations_between(owner_id, start, end).await?;

        let mut by_subject: HashMap<&str, (f64, Accumulator)> = HashMap::new();
        for obs in &observations {
            let Some(content_id) = obs.content_id.as_deref() else {
                continue;
            };
            let entry = by_subject.entry(content_id).or_default();
            match obs.metric_kind.as_str() {
                KIND_VIEWS => entry.0 += obs.metric_value,
                KIND_ENGAGEMENT_RATE => entry.1.push(obs.metric_value),
                _ => {}
            }
        }

        let mut rows: Vec<ContentPerformanceRow> = items
            .into_iter()
            .map(|item| {
                let (views, engagement) = by_subject
                    .get(item.id.as_str())
                    .map(|(views, engagement)| (*views, engagement.average()))
                    .unwrap_or((0.0, 0.0));
                ContentPerformanceRow {
                    total_views: views as u64,
                    avg_engagement: round2(engagement),
                    content_id: item.id,
                    title: item.title,
                    content_type: item.content_type,
                    created_at: item.created_at,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.total_views
                .cmp(&a.total_views)
                .then_with(|| a.content_id.cmp(&b.content_id))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    /// Count of content created in the window, grouped by type, with each
    /// group's share of the window total.
    pub async fn content_type_distribution(
        &self,
        owner_id: &str,
        days: u32,
        end_date: Option<NaiveDate>,
    ) -> MetricsResult<Vec<TypeDistributionRow>> {
        let (start, end) = resolve_window(days, end_date);

        let items = self.storage.content_items(owner_id).await?;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for item in items {
            let created = item.created_at.date_naive();
            if created >= start && created <= end {
                *counts.entry(item.content_type).or_insert(0) += 1;
            }
        }

        let total: u64 = counts.values().sum();
        let mut rows: Vec<TypeDistributionRow> = counts
            .into_iter()
            .map(|(content_type, count)| TypeDistributionRow {
                content_type,
                count,
                percentage: round1(count as f64 / total.max(1) as f64 * 100.0),
            })
            .collect();

        rows.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.content_type.cmp(&b.content_type))
        });
        Ok(rows)
    }

    /// Per-day view sums, content-creation counts, and engagement averages.
    /// Days without data for a series are absent from it.
    pub async fn daily_metrics(
        &self,
        owner_id: &str,
        days: u32,
        end_date: Option<NaiveDate>,
    ) -> MetricsResult<DailyMetricsReport> {
        let (start, end) = resolve_window(days, end_date);

        let observations = self.storage.observations_between(owner_id, start, end).await?;
        let mut daily_views: HashMap<NaiveDate, f64> = HashMap::new();
        let mut daily_engagement: HashMap<NaiveDate, Accumulator> = HashMap::new();
        for obs in &observations {
            match obs.metric_kind.as_str() {
                KIND_VIEWS => *daily_views.entry(obs.date).or_insert(0.0) += obs.metric_value,
                KIND_ENGAGEMENT_RATE => daily_engagement
                    .entry(obs.date)
                    .or_default()
                    .push(obs.metric_value),
                _ => {}
            }
        }

        let items = self.storage.content_items(owner_id).await?;
        let mut daily_content: HashMap<NaiveDate, u64> = HashMap::new();
        for item in &items {
            let created = item.created_at.date_naive();
            if created >= start && created <= end {
                *daily_content.entry(created).or_insert(0) += 1;
            }
        }

        let mut views: Vec<DailyCountPoint> = daily_views
            .into_iter()
            .map(|(date, value)| DailyCountPoint {
                date,
                value: value as u64,
            })
            .collect();
        views.sort_by_key(|point| point.date);

        let mut content_created: Vec<DailyCountPoint> = daily_content
            .into_iter()
            .map(|(date, value)| DailyCountPoint { date, value })
            .collect();
        content_created.sort_by_key(|point| point.date);

        let mut engagement: Vec<DailyValuePoint> = daily_engagement
            .into_iter()
            .map(|(date, accumulator)| DailyValuePoint {
                date,
                value: round2(accumulator.average()),
            })
            .collect();
        engagement.sort_by_key(|point| point.date);

        Ok(DailyMetricsReport {
            views,
            content_created,
            engagement,
        })
    }

    /// Windowed totals grouped by non-null platform tag. A platform appears
    /// whenever it has any observation, with zero defaults for kinds it never
    /// reported.
    pub async fn platform_performance(
        &self,
        owner_id: &str,
        days: u32,
        end_date: Option<NaiveDate>,
    ) -> MetricsResult<Vec<PlatformPerformanceRow>> {
        let (start, end) = resolve_window(days, end_date);

        let observations = self.storage.observations_between(owner_id, start, end).await?;
        let mut by_platform: HashMap<String, PlatformAccumulator> = HashMap::new();
        for obs in observations {
            let Some(platform) = obs.platform else {
                continue;
            };
            let entry = by_platform.entry(platform).or_default();
            match obs.metric_kind.as_str() {
                KIND_VIEWS => entry.views += obs.metric_value,
                KIND_ENGAGEMENT_RATE => entry.engagement.push(obs.metric_value),
                KIND_CLICKS => entry.clicks += obs.metric_value,
                _ => {}
            }
        }

        let mut rows: Vec<PlatformPerformanceRow> = by_platform
            .into_iter()
            .map(|(platform, accumulator)| PlatformPerformanceRow {
                platform,
                total_views: accumulator.views as u64,
                avg_engagement: round2(accumulator.engagement.average()),
                total_clicks: accumulator.clicks as u64,
            })
            .collect();

        rows.sort_by(|a, b| {
            b.total_views
                .cmp(&a.total_views)
                .then_with(|| a.platform.cmp(&b.platform))
        });
        Ok(rows)
    }

    /// Snapshot of every report for one owner. Content performance is capped
    /// at 50 rows in exports.
    pub async fn export(
        &self,
        owner_id: &str,
        days: u32,
        end_date: Option<NaiveDate>,
    ) -> MetricsResult<ExportBundle> {
        let overview = self.overview(owner_id, days, end_date).await?;
        let content_performance = self
            .content_performance(owner_id, days, EXPORT_PERFORMANCE_LIMIT, end_date)
            .await?;
        let content_distribution = self
            .content_type_distribution(owner_id, days, end_date)
            .await?;
        let daily_metrics = self.daily_metrics(owner_id, days, end_date).await?;
        let platform_performance = self.platform_performance(owner_id, days, end_date).await?;

        Ok(ExportBundle {
            exported_at: Utc::now(),
            period_days: days,
            owner_id: owner_id.to_string(),
            overview,
            content_performance,
            content_distribution,
            daily_metrics,
            platform_performance,
        })
    }
}

#[derive(Debug, Default, Clone)]
struct Accumulator {
    sum: f64,
    count: u64,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

#[derive(Debug, Default)]
struct PlatformAccumulator {
    views: f64,
    engagement: Accumulator,
    clicks: f64,
}

fn resolve_window(days: u32, end_date: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
    let end = end_date.unwrap_or_else(|| Utc::now().date_naive());
    (end - Duration::days(i64::from(days)), end)
}

fn count_created_between(items: &[ContentItem], start: NaiveDate, end: NaiveDate) -> u64 {
    items
        .iter()
        .filter(|item| {
            let created = item.created_at.date_naive();
            created >= start && created <= end
        })
        .count() as u64
}

// max(previous, 1) keeps the percentage defined when the prior window is
// empty; there is deliberately no "no previous data" sentinel.
fn percent_change(current: f64, previous: f64) -> f64 {
    round1((current - previous) / previous.max(1.0) * 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
