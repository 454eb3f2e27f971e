//! Database repositories for each table.

pub mod images;
pub mod sites;

pub use images::ImageRepo;
pub use sites::SiteRepo;
