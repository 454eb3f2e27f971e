//! Image Carbon Core - pure domain logic.
//!
//! This crate has no I/O. It provides:
//!
//! - Site URL normalization and validation ([`normalize`])
//! - Transfer-based CO2 estimation ([`emissions`])
//! - Shared image and collection models ([`models`])
//! - Whole-site aggregation and report building ([`report`])
//! - Human-readable formatting of sizes and masses ([`format`])
//! - The cache freshness rule and clocks ([`freshness`])
//!
//! # Example
//!
//! ```
//! use imagecarbon_core::emissions::EmissionsModel;
//! use imagecarbon_core::normalize::normalize_site;
//!
//! assert_eq!(normalize_site("https://Example.com/?ref=1"), "example.com");
//!
//! let model = EmissionsModel::default();
//! assert!(model.estimate(30_000, true) < model.estimate(30_000, false));
//! ```

pub mod emissions;
pub mod format;
pub mod freshness;
pub mod models;
pub mod normalize;
pub mod report;

pub use emissions::EmissionsModel;
pub use freshness::{is_fresh, Clock, ManualClock, SystemClock};
pub use models::{
    Collection, DiscoveredImage, ImageRecord, OptimizedImage, OriginalImage, UploadedImage,
    Variant,
};
pub use normalize::{is_valid_url, normalize, normalize_site, restore, NormalizeOptions};
pub use report::{
    DisplayImage, Equivalents, MonthlyRequests, ReportConfig, ReportOptions, SiteReport,
    YearlyEstimate,
};
