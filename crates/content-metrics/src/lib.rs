pub mod engine;
pub mod recorder;
pub mod sample;
pub mod storage;
pub mod types;

pub use engine::AnalyticsEngine;
pub use recorder::MetricRecorder;
pub use sample::{SampleDataGenerator, SAMPLE_PLATFORMS, SAMPLE_SOURCES};
pub use storage::{AnalyticsStorage, MetricsError, MetricsResult, SqliteAnalyticsStorage};
pub use types::{
    ContentItem, ContentPerformanceRow, DailyCountPoint, DailyMetricsReport, DailyValuePoint,
    ExportBundle, MetricObservation, MetricRecord, OverviewReport, PlatformPerformanceRow,
    TypeDistributionRow, KIND_CLICKS, KIND_ENGAGEMENT_RATE, KIND_READ_TIME, KIND_VIEWS,
};
