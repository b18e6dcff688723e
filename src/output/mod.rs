//! Report assembly and rendering

pub mod formatter;
pub mod report;

pub use formatter::{format_text, ReportGenerator};
pub use report::ScanReport;
