//! Image Carbon - measures how much CO2 a site's images cost and how much
//! re-encoding them would save.
//!
//! This crate holds the pieces of the `imagecarbon` binary that are worth
//! testing on their own:
//!
//! - Wiring the production collaborators into a collector ([`setup`])
//! - Plain-text rendering of a site report ([`render`])
//!
//! # Usage
//!
//! ```no_run
//! use imagecarbon_app::setup::{build_collector, CollectorSettings};
//! use imagecarbon_app::render::render_report;
//! use imagecarbon_core::{ReportConfig, ReportOptions};
//!
//! # async fn demo(credentials: imagecarbon_collect::CloudinaryCredentials) -> anyhow::Result<()> {
//! let collector = build_collector(&CollectorSettings::default().with_cloudinary(credentials))?;
//! let collection = collector.run("example.com", false).await?;
//! let report = collection.report(ReportOptions::default(), &ReportConfig::default());
//! println!("{}", render_report(&report));
//! # Ok(())
//! # }
//! ```

pub mod render;
pub mod setup;

pub use render::{render_report, ReportText};
pub use setup::{build_collector, CollectorSettings};
