//! On-disk configuration for credentials, timeouts and directories.

use crate::error::AutomationError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Supported browser backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Google Chrome via chromedriver.
    Chrome,
    /// Mozilla Firefox via geckodriver.
    Firefox,
}

/// Immutable run configuration loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Portal base URL, without a trailing slash.
    pub website_url: String,
    /// Portal account name.
    pub username: String,
    /// Portal account password.
    pub password: String,
    /// Bound for every element/navigation wait, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Browser backend to drive.
    #[serde(default = "default_browser")]
    pub browser: BrowserKind,
    /// WebDriver endpoint the browser session is created against.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// Absolute path of the external document converter executable.
    ///
    /// Environment-specific; there is no sensible compiled-in default.
    pub soffice_path: PathBuf,
    /// Directory the browser downloads legacy report files into.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    /// Directory receiving the aggregated workbook and converted files.
    #[serde(default = "default_exports_dir")]
    pub exports_dir: PathBuf,
    /// Directory receiving failure screenshots.
    #[serde(default = "default_screenshots_dir")]
    pub screenshots_dir: PathBuf,
}

fn default_timeout() -> u64 {
    30
}

fn default_browser() -> BrowserKind {
    BrowserKind::Chrome
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_exports_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_screenshots_dir() -> PathBuf {
    PathBuf::from("error_screenshots")
}

impl AppConfig {
    /// Loads and deserializes the TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AutomationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            AutomationError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        toml::from_str(&text)
            .map_err(|err| AutomationError::Config(format!("{}: {err}", path.display())))
    }

    /// Username with everything past a short prefix masked, for log output.
    pub fn masked_username(&self) -> String {
        let prefix: String = self.username.chars().take(2).collect();
        format!("{prefix}***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let cfg: AppConfig = toml::from_str(
            r#"
            website_url = "https://portal.example.com"
            username = "bookshop"
            password = "secret"
            soffice_path = "/usr/bin/soffice"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.browser, BrowserKind::Chrome);
        assert_eq!(cfg.downloads_dir, PathBuf::from("downloads"));
        assert_eq!(cfg.masked_username(), "bo***");
    }

    #[test]
    fn browser_kind_is_case_insensitive_lowercase() {
        let cfg: AppConfig = toml::from_str(
            r#"
            website_url = "https://portal.example.com"
            username = "x"
            password = "y"
            browser = "firefox"
            timeout_secs = 10
            soffice_path = "/opt/libreoffice/soffice"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.browser, BrowserKind::Firefox);
        assert_eq!(cfg.timeout_secs, 10);
    }
}
