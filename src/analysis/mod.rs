//! Batch results
//!
//! - Run accumulation and averaging
//! - Report types published to the host
//! - Metadata

pub mod metadata;
pub mod result;

pub use metadata::BatchMetadata;
pub use result::{BatchReport, RunAccumulator};
