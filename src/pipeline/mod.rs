//! Pipeline entry points.
//!
//! - `classify_pages`: fingerprint discovered pages, cluster and sample them
//! - `run_pipeline`: discover, classify, scan and wait for screenshot analysis

mod classify;
mod pipeline;

pub use classify::{Classification, classify_pages, extract_all};
pub use pipeline::{Pipeline, PipelineOutcome, run_pipeline};
