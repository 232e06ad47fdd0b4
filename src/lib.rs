#![warn(missing_docs)]
//! Automated extraction of UCD vendor-portal sales reports into a single
//! timestamped workbook.
//!
//! The crate drives the portal over WebDriver, parses each report's HTML
//! offline, and appends one sheet per report. The binary in `main.rs` wires
//! configuration and logging around [`pipeline::run`].

mod catalog;
mod config;
mod convert;
mod error;
mod extract;
mod filters;
mod nav;
mod period;
pub mod pipeline;
mod session;
mod table;
mod wait;
mod workbook;

pub use crate::catalog::{descriptor, ReportDescriptor, ReportKind, CATALOG};
pub use crate::config::{AppConfig, BrowserKind};
pub use crate::convert::{load_table, Converter};
pub use crate::error::AutomationError;
pub use crate::extract::parse_report_html;
pub use crate::period::FilterPeriod;
pub use crate::session::Session;
pub use crate::table::{CellValue, ExtractedTable};
pub use crate::workbook::{append_sheet, workbook_path, SheetOptions};
