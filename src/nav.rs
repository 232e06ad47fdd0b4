//! Menu-tree navigation driven by declarative report descriptors.

use crate::catalog::ReportDescriptor;
use crate::error::AutomationError;
use crate::session::Session;
use crate::wait::{wait_for_element, with_retries, RetryPolicy};
use thirtyfour::prelude::*;
use tracing::info;

/// Moves the session from the home page to a report's data-entry page.
///
/// Pattern shared by every destination: wait for the generic nav-menu
/// marker (proof the home page fully rendered), click the menu link, then
/// wait for the page-specific signature element. A timeout on the
/// signature wait captures a screenshot before propagating.
pub async fn open_report(
    session: &Session,
    descriptor: &ReportDescriptor,
) -> Result<(), AutomationError> {
    let driver = session.driver()?;

    wait_for_element(driver, By::ClassName("nav"), session.timeout(), "nav menu").await?;

    if let Some(parent) = descriptor.parent_menu {
        click_menu_link(session, parent).await?;
        wait_for_element(driver, By::ClassName("nav"), session.timeout(), "sub menu").await?;
    }

    click_menu_link(session, descriptor.menu_link).await?;

    let what = format!("{} page signature", descriptor.sheet_name);
    match wait_for_element(
        driver,
        descriptor.signature.to_by(),
        session.timeout(),
        &what,
    )
    .await
    {
        Ok(_) => {
            info!("navigated to {} page", descriptor.sheet_name);
            Ok(())
        }
        Err(err) => {
            session
                .save_screenshot(&format!("{}_navigation_error", descriptor.sheet_name))
                .await;
            Err(err)
        }
    }
}

/// Locates a menu anchor by its literal display text and clicks it.
async fn click_menu_link(session: &Session, link_text: &str) -> Result<(), AutomationError> {
    let driver = session.driver()?;
    let xpath = format!("//a[contains(text(), '{link_text}')]");
    let link = wait_for_element(
        driver,
        By::XPath(xpath.as_str()),
        session.timeout(),
        link_text,
    )
    .await?;
    link.click().await?;
    Ok(())
}

/// Returns to the home page under the bounded navigation retry policy.
///
/// A single `return_home` may race the portal's session state; transient
/// failures here are expected and recoverable without operator
/// intervention, so this is the one place automatic retry is allowed.
pub async fn return_home_with_retry(session: &Session) -> Result<(), AutomationError> {
    with_retries(RetryPolicy::NAVIGATION, "return to home page", || {
        session.return_home()
    })
    .await
}
