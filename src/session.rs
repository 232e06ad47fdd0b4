//! One authenticated portal session wrapping the WebDriver handle.

use crate::config::{AppConfig, BrowserKind};
use crate::error::AutomationError;
use crate::wait::{wait_for_element, wait_until};
use chrono::Local;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use thirtyfour::prelude::*;
use thirtyfour::Capabilities;
use tracing::{error, info, warn};

/// Portal URL paths relative to the configured base.
mod paths {
    pub const LOGIN: &str = "/user_menu/user_login.jsp";
    pub const MEMBER: &str = "/user_menu/user_index.jsp";
    pub const LOGOUT: &str = "/user_menu/user_logout.jsp";
    pub const INDEX: &str = "/index.jsp";
}

/// Text marker the portal shows while logging out.
const LOGOUT_MARKER: &str = "您目前登出系統中";

/// Anchor text of the logout affordance in the member nav bar.
const LOGOUT_LINK_TEXT: &str = "會員登出";

/// An exclusive, long-lived browsing session against the portal.
///
/// At most one exists per run. The driver handle lives behind an `Option`
/// so that teardown is idempotent: once taken, later calls are no-ops.
pub struct Session {
    driver: Option<WebDriver>,
    base_url: String,
    timeout: Duration,
    screenshots_dir: PathBuf,
}

impl Session {
    /// Connects a fresh browser session configured from `cfg`.
    ///
    /// The browser runs incognito with caches disabled so stale portal
    /// state cannot leak between runs; downloads land in the configured
    /// downloads directory.
    pub async fn connect(cfg: &AppConfig) -> Result<Self, AutomationError> {
        let download_dir = std::fs::canonicalize(&cfg.downloads_dir)
            .unwrap_or_else(|_| cfg.downloads_dir.clone());
        let caps: Capabilities = match cfg.browser {
            BrowserKind::Chrome => {
                let mut caps = DesiredCapabilities::chrome();
                caps.add_arg("--start-maximized")?;
                caps.add_arg("--lang=zh-TW")?;
                caps.add_arg("--incognito")?;
                caps.add_arg("--disable-cache")?;
                caps.add_arg("--disable-application-cache")?;
                caps.add_experimental_option(
                    "prefs",
                    json!({
                        "download.default_directory": download_dir.to_string_lossy(),
                        "download.prompt_for_download": false,
                    }),
                )?;
                caps.into()
            }
            BrowserKind::Firefox => {
                let mut caps = DesiredCapabilities::firefox();
                caps.add_arg("-private")?;
                caps.into()
            }
        };

        let driver = WebDriver::new(&cfg.webdriver_url, caps).await?;
        Ok(Self {
            driver: Some(driver),
            base_url: cfg.website_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            screenshots_dir: cfg.screenshots_dir.clone(),
        })
    }

    /// The configured per-wait bound.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The authenticated landing-page URL.
    pub fn member_url(&self) -> String {
        format!("{}{}", self.base_url, paths::MEMBER)
    }

    /// Borrow of the live driver; errors once the session is torn down.
    pub fn driver(&self) -> Result<&WebDriver, AutomationError> {
        self.driver
            .as_ref()
            .ok_or_else(|| AutomationError::Automation("session already torn down".into()))
    }

    /// Logs in, waiting for the precise post-login redirect target.
    ///
    /// On any failure a `login_failure` screenshot is captured and the
    /// username is masked in log output.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AutomationError> {
        if let Err(err) = self.login_inner(username, password).await {
            let masked: String = username.chars().take(2).collect();
            error!("login failed for user {masked}***: {err}");
            self.save_screenshot("login_failure").await;
            return Err(AutomationError::Authentication(err.to_string()));
        }
        info!("successfully logged in");
        Ok(())
    }

    async fn login_inner(&self, username: &str, password: &str) -> Result<(), AutomationError> {
        let driver = self.driver()?;

        info!("navigating to portal root");
        driver.goto(&self.base_url).await?;

        let login_selector = format!("a[href*='{}']", paths::LOGIN);
        let login_link = wait_for_element(
            driver,
            By::Css(login_selector.as_str()),
            self.timeout,
            "login link",
        )
        .await?;
        login_link.click().await?;

        let username_field =
            wait_for_element(driver, By::Id("user_name"), self.timeout, "username field").await?;
        let password_field =
            wait_for_element(driver, By::Id("user_password"), self.timeout, "password field")
                .await?;

        username_field.clear().await?;
        username_field.send_keys(username).await?;
        password_field.clear().await?;
        password_field.send_keys(password).await?;

        let submit = wait_for_element(
            driver,
            By::Css("input[name='B1'][type='submit']"),
            self.timeout,
            "login submit button",
        )
        .await?;
        submit.click().await?;

        let member = self.member_url();
        let member = member.as_str();
        wait_until(self.timeout, "post-login redirect", || async move {
            match driver.current_url().await {
                Ok(url) if url.as_str().trim_end_matches('/') == member => Some(()),
                _ => None,
            }
        })
        .await?;

        Ok(())
    }

    /// Probes for the logout affordance; `false` on any lookup failure.
    pub async fn is_authenticated(&self) -> bool {
        let Some(driver) = self.driver.as_ref() else {
            return false;
        };
        let selector = format!("a[href*='{}']", paths::LOGOUT);
        match driver.find(By::Css(selector.as_str())).await {
            Ok(link) => link.is_displayed().await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Logs out and unconditionally tears the session down afterwards.
    pub async fn logout(&mut self) -> Result<(), AutomationError> {
        let result = self.logout_inner().await;
        // Teardown runs even when logout signaling fails.
        self.teardown().await;
        result
    }

    async fn logout_inner(&self) -> Result<(), AutomationError> {
        if !self.is_authenticated().await {
            info!("already logged out");
            return Ok(());
        }
        let driver = self.driver()?;

        let logout_xpath = format!(
            "//a[contains(@href, '{}')][text()='{LOGOUT_LINK_TEXT}']",
            paths::LOGOUT
        );
        let logout_link = wait_for_element(
            driver,
            By::XPath(logout_xpath.as_str()),
            self.timeout,
            "logout link",
        )
        .await?;
        logout_link.click().await?;

        let marker_xpath = format!("//*[contains(text(), '{LOGOUT_MARKER}')]");
        wait_for_element(
            driver,
            By::XPath(marker_xpath.as_str()),
            self.timeout,
            "logout confirmation",
        )
        .await?;

        let home = format!("{}{}", self.base_url, paths::INDEX);
        let home = home.as_str();
        wait_until(self.timeout, "redirect to home page", || async move {
            match driver.current_url().await {
                Ok(url) if url.as_str() == home => Some(()),
                _ => None,
            }
        })
        .await?;

        driver.delete_all_cookies().await?;
        driver
            .execute(
                "window.localStorage.clear(); window.sessionStorage.clear();",
                Vec::new(),
            )
            .await?;

        info!("successfully logged out");
        Ok(())
    }

    /// Releases the browser handle. Idempotent; never propagates errors.
    pub async fn teardown(&mut self) {
        if let Some(driver) = self.driver.take() {
            match driver.quit().await {
                Ok(()) => info!("browser session closed"),
                Err(err) => error!("error closing browser: {err}"),
            }
        }
    }

    /// Navigates straight to the member landing page and waits for the
    /// nav-menu marker. A single attempt may race the portal's session
    /// state; callers retry via the navigation router.
    pub async fn return_home(&self) -> Result<(), AutomationError> {
        let driver = self.driver()?;
        driver.goto(self.member_url()).await?;
        wait_for_element(driver, By::ClassName("nav"), self.timeout, "nav menu").await?;
        Ok(())
    }

    /// Best-effort diagnostic screenshot `<prefix>_<timestamp>.png`.
    pub async fn save_screenshot(&self, prefix: &str) {
        let Some(driver) = self.driver.as_ref() else {
            return;
        };
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = self
            .screenshots_dir
            .join(format!("{prefix}_{timestamp}.png"));
        if let Err(err) = std::fs::create_dir_all(&self.screenshots_dir) {
            warn!("cannot create screenshot directory: {err}");
            return;
        }
        match driver.screenshot(&filename).await {
            Ok(()) => info!("screenshot saved as {}", filename.display()),
            Err(err) => warn!("failed to save screenshot: {err}"),
        }
    }
}
