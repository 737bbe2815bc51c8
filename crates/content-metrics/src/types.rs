use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Metric kinds the engine derives reports from. The vocabulary is open:
/// observations may carry any tag, and the engine ignores kinds it does not
/// aggregate.
pub const KIND_VIEWS: &str = "views";
pub const KIND_ENGAGEMENT_RATE: &str = "engagement_rate";
pub const KIND_CLICKS: &str = "clicks";
pub const KIND_READ_TIME: &str = "read_time";

/// One immutable fact about owner activity. There is no update path: an
/// observation lives until its owner or subject is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricObservation {
    pub id: String,
    pub owner_id: String,
    /// Subject content item, absent for platform-level facts. A dangling
    /// reference is accepted and simply never matches a catalog join.
    pub content_id: Option<String>,
    pub metric_kind: String,
    pub metric_value: f64,
    pub platform: Option<String>,
    pub source: Option<String>,
    pub extra_data: Option<serde_json::Value>,
    pub date: NaiveDate,
    /// Optional 0-23 hour for intra-day granularity.
    pub hour: Option<u8>,
    pub created_at: DateTime<Utc>,
}

/// Catalog subset the engine reads. Content creation itself happens upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// Recorder input. Date, hour, and id are stamped at record time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    pub owner_id: String,
    pub metric_kind: String,
    pub metric_value: f64,
    pub content_id: Option<String>,
    pub platform: Option<String>,
    pub source: Option<String>,
    pub extra_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverviewReport {
    pub total_content: u64,
    pub period_content: u64,
    pub total_views: u64,
    pub avg_engagement_rate: f64,
    /// Sum of read-time observations over max(total_views, 1), not a plain
    /// average of read-time records.
    pub avg_read_time: f64,
    pub views_change: f64,
    pub content_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentPerformanceRow {
    pub content_id: String,
    pub title: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub total_views: u64,
    pub avg_engagement: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeDistributionRow {
    pub content_type: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyCountPoint {
    pub date: NaiveDate,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyValuePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Three independent daily series. Days without data for a series are absent,
/// never zero-filled, so dates are not necessarily contiguous.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyMetricsReport {
    pub views: Vec<DailyCountPoint>,
    pub content_created: Vec<DailyCountPoint>,
    pub engagement: Vec<DailyValuePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformPerformanceRow {
    pub platform: String,
    pub total_views: u64,
    pub avg_engagement: f64,
    pub total_clicks: u64,
}

/// Point-in-time snapshot of every report for one owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportBundle {
    pub exported_at: DateTime<Utc>,
    pub period_days: u32,
    pub owner_id: String,
    pub overview: OverviewReport,
    pub content_performance: Vec<ContentPerformanceRow>,
    pub content_distribution: Vec<TypeDistributionRow>,
    pub daily_metrics: DailyMetricsReport,
    pub platform_performance: Vec<PlatformPerformanceRow>,
}
