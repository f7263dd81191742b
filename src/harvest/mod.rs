//! Exhaustive data collection from the remote source.
//!
//! - [`paginator`]: offset pagination with cap and failure semantics
//! - [`extract`]: key terms, fuzzy title similarity, label and entity
//!   detection from track text
//! - [`engine`]: the seven-phase deep harvest crawl

pub mod engine;
pub mod extract;
pub mod paginator;

pub use engine::{HarvestEngine, HarvestStats};
pub use paginator::{fetch_all_pages, PageSet, PAGE_SIZE};
