pub mod affiliation;
pub mod cache;
pub mod feed;
pub mod models;
pub mod pipeline;

pub use affiliation::AffiliationTable;
pub use cache::LinesCache;
pub use feed::{LinesSource, PredictionTracker};
