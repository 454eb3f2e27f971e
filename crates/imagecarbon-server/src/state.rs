//! Application state for the API server.

use std::sync::Arc;

use imagecarbon_collect::SiteCollector;
use imagecarbon_core::ReportConfig;
use imagecarbon_storage::Database;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Collection flow and cache.
    pub collector: Arc<SiteCollector>,
    /// Display thresholds for reports.
    pub report_config: ReportConfig,
}

impl AppState {
    /// Creates application state around a collector.
    pub fn new(collector: SiteCollector) -> Self {
        Self {
            collector: Arc::new(collector),
            report_config: ReportConfig::default(),
        }
    }

    /// Overrides the report thresholds.
    pub fn with_report_config(mut self, config: ReportConfig) -> Self {
        self.report_config = config;
        self
    }

    /// The database behind the cache.
    pub fn db(&self) -> &Database {
        self.collector.cache().database()
    }
}
