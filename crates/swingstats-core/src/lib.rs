// Library root: tennis match ingestion, storage and derived statistics for
// SwingVision workbook exports.

pub mod cache;
pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod quality;
pub mod report;
pub mod stats;
pub mod strokes;
pub mod tactics;
pub mod workbook;

#[cfg(test)]
pub(crate) mod test_support;
