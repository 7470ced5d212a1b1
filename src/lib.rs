pub mod aggregation;
pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod reports;
pub mod sources;
pub mod types;
pub mod util;

// Re-exports for library users
pub use aggregation::{merge_costs, share, summarize_by_transporter, yoy_series, Aggregator};
pub use cache::{AggregationCache, Fingerprint};
pub use config::{LiveCredentials, Settings};
pub use error::{ReportError, Result};
pub use sources::{create_provider, QueryResult, QueryRunner, RemoteQuerySource, StaticFileSource, WeightProvider};
pub use types::{
    CostMergePolicy, CostRecord, Metric, MonthlyAggregate, MonthlyReport, ReportWarning, WeightRecord,
    WeightSource, YearMonth, YoySeries,
};
