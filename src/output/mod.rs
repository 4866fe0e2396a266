//! Reporting on harvest state
//!
//! This module handles:
//! - Loading queue, record and run statistics from storage
//! - Printing them for the CLI
//! - Writing a markdown report

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_report, write_markdown_report};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
