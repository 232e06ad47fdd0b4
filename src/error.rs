//! Error taxonomy for portal automation and workbook aggregation.

use std::path::PathBuf;

/// Failure raised while driving the portal or aggregating its reports.
#[derive(thiserror::Error, Debug)]
pub enum AutomationError {
    /// An expected page element or navigation target did not appear in time.
    #[error("timed out waiting for {what}")]
    Timeout {
        /// Description of the awaited element or condition.
        what: String,
    },
    /// Login form interaction or credential submission failed.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Caller-supplied reporting month outside `[1, 12]`.
    #[error("invalid month value: {month}")]
    InvalidPeriod {
        /// The rejected month value.
        month: u32,
    },
    /// The external converter produced no usable output.
    #[error("conversion failed: {0}")]
    Conversion(String),
    /// A file path resolved outside its allowed directory.
    #[error("path escapes allowed directory: {path}")]
    Security {
        /// The offending path.
        path: PathBuf,
    },
    /// Underlying WebDriver command failure.
    #[error("webdriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),
    /// I/O error on the filesystem boundary.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Workbook read or write failure.
    #[error("workbook error: {0}")]
    Workbook(String),
    /// Configuration file missing or malformed.
    #[error("config error: {0}")]
    Config(String),
    /// Any other unexpected DOM or browser-interaction failure.
    #[error("automation error: {0}")]
    Automation(String),
}

impl From<rust_xlsxwriter::XlsxError> for AutomationError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Workbook(err.to_string())
    }
}

impl From<calamine::Error> for AutomationError {
    fn from(err: calamine::Error) -> Self {
        Self::Workbook(err.to_string())
    }
}
