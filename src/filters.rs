//! Per-report query-form population and submission.

use crate::catalog::{descriptor, ReportKind};
use crate::error::AutomationError;
use crate::period::FilterPeriod;
use crate::session::Session;
use crate::wait::wait_for_element;
use chrono::{Datelike, Local, NaiveDate};
use thirtyfour::components::SelectElement;
use thirtyfour::prelude::*;
use tracing::{debug, info};

/// Which analysis axis the checkbox group selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisAxis {
    /// Aggregate by customer account.
    Customer,
    /// Aggregate by product.
    Product,
}

/// Sets the monthly-supply dropdown filter and submits.
pub async fn set_monthly_supply_filter(
    session: &Session,
    period: FilterPeriod,
) -> Result<(), AutomationError> {
    let result = monthly_supply_inner(session, period).await;
    if result.is_err() {
        session.save_screenshot("monthly_supply_filter_error").await;
    }
    result
}

async fn monthly_supply_inner(
    session: &Session,
    period: FilterPeriod,
) -> Result<(), AutomationError> {
    let driver = session.driver()?;

    let year_elem =
        wait_for_element(driver, By::Name("p_year"), session.timeout(), "year dropdown").await?;
    SelectElement::new(&year_elem)
        .await?
        .select_by_value(&period.year.to_string())
        .await?;

    let month_elem =
        wait_for_element(driver, By::Name("p_period"), session.timeout(), "month dropdown")
            .await?;
    SelectElement::new(&month_elem)
        .await?
        .select_by_value(&period.month_padded())
        .await?;

    submit_and_wait_result(session, ReportKind::MonthlySupply).await?;
    info!("set supply filter for {}/{}", period.year, period.month_padded());
    Ok(())
}

/// Sets the analysis-report filter for one axis and submits.
///
/// The form retains checkbox state across submissions within a session, so
/// every pre-existing selection is cleared before the axis checkboxes are
/// applied.
pub async fn set_analysis_filter(
    session: &Session,
    period: FilterPeriod,
    axis: AnalysisAxis,
) -> Result<(), AutomationError> {
    let result = analysis_inner(session, period, axis).await;
    if result.is_err() {
        session.save_screenshot("analysis_filter_error").await;
    }
    result
}

async fn analysis_inner(
    session: &Session,
    period: FilterPeriod,
    axis: AnalysisAxis,
) -> Result<(), AutomationError> {
    let driver = session.driver()?;
    let token = period.token();
    debug!("setting analysis filter for {token}, axis {axis:?}");

    // Start and end of the range are the same month for this pipeline.
    for field in ["b_ym", "e_ym"] {
        let elem = wait_for_element(driver, By::Name(field), session.timeout(), field).await?;
        SelectElement::new(&elem)
            .await?
            .select_by_value(&token)
            .await?;
    }

    for checkbox in driver.find_all(By::Css("input[type='checkbox']")).await? {
        if checkbox.is_selected().await? {
            checkbox.click().await?;
        }
    }

    let names: [&str; 2] = match axis {
        AnalysisAxis::Customer => ["acc_code", "acc_cat1"],
        AnalysisAxis::Product => ["stk_c", "acc_cat"],
    };
    for name in names {
        let checkbox = wait_for_element(driver, By::Name(name), session.timeout(), name).await?;
        checkbox.click().await?;
    }

    let kind = match axis {
        AnalysisAxis::Customer => ReportKind::CustomerAnalysis,
        AnalysisAxis::Product => ReportKind::ProductAnalysis,
    };
    submit_and_wait_result(session, kind).await?;
    info!("set analysis filter {axis:?} for {token}");
    Ok(())
}

/// Drives the relative-navigation calendar widget on the settlement
/// summary pages and submits the day selection.
///
/// Precondition: the widget always opens on the current wall-clock month
/// and only supports stepping one month back per click, so the click count
/// is positional. A widget that opens elsewhere silently selects the wrong
/// month; there is no in-page anchor to verify against.
pub async fn set_summary_filter(
    session: &Session,
    kind: ReportKind,
    period: FilterPeriod,
) -> Result<(), AutomationError> {
    let result = summary_inner(session, kind, period).await;
    if result.is_err() {
        let tag = format!("{}_filter_error", descriptor(kind).sheet_name);
        session.save_screenshot(&tag).await;
    }
    result
}

async fn summary_inner(
    session: &Session,
    kind: ReportKind,
    period: FilterPeriod,
) -> Result<(), AutomationError> {
    let driver = session.driver()?;
    let today = Local::now().date_naive();
    let months_back = (today.year() - period.year) * 12 + today.month() as i32 - period.month as i32;
    if months_back < 0 {
        return Err(AutomationError::Automation(format!(
            "summary calendar cannot navigate forward to {}{}",
            period.year,
            period.month_padded()
        )));
    }

    let prev = wait_for_element(
        driver,
        By::Css(".calendar .prev-month"),
        session.timeout(),
        "calendar previous-month control",
    )
    .await?;
    for _ in 0..months_back {
        prev.click().await?;
    }

    let day = wait_for_element(
        driver,
        By::XPath("//td[contains(@class, 'day')][normalize-space(text())='1']"),
        session.timeout(),
        "calendar day cell",
    )
    .await?;
    day.click().await?;

    submit_and_wait_result(session, kind).await?;
    info!(
        "set {} calendar to {}{} ({months_back} steps back)",
        descriptor(kind).sheet_name,
        period.year,
        period.month_padded()
    );
    Ok(())
}

/// Fills the date-range text fields shared by the order, discount and
/// payment forms and submits.
pub async fn set_date_range_filter(
    session: &Session,
    kind: ReportKind,
    period: FilterPeriod,
) -> Result<(), AutomationError> {
    let result = date_range_inner(session, kind, period).await;
    if result.is_err() {
        let tag = format!("{}_filter_error", descriptor(kind).sheet_name);
        session.save_screenshot(&tag).await;
    }
    result
}

async fn date_range_inner(
    session: &Session,
    kind: ReportKind,
    period: FilterPeriod,
) -> Result<(), AutomationError> {
    let driver = session.driver()?;
    let start = period
        .first_day()
        .ok_or(AutomationError::InvalidPeriod { month: period.month })?;
    let end = last_day_of_month(start);

    for (name, date) in [("b_date", start), ("e_date", end)] {
        let field = wait_for_element(driver, By::Name(name), session.timeout(), name).await?;
        field.clear().await?;
        field.send_keys(date.format("%Y/%m/%d").to_string()).await?;
    }

    // The payment report opens its results in a new tab; the extractor
    // owns that wait, so only the in-page reports block on a result here.
    if kind == ReportKind::PaymentDetail {
        let submit =
            wait_for_element(driver, By::Name("B1"), session.timeout(), "submit button").await?;
        submit.click().await?;
    } else {
        submit_and_wait_result(session, kind).await?;
    }
    info!(
        "set {} date range {} - {}",
        descriptor(kind).sheet_name,
        start,
        end
    );
    Ok(())
}

/// Clicks the shared submit button and waits for the report's result
/// locator to render.
async fn submit_and_wait_result(
    session: &Session,
    kind: ReportKind,
) -> Result<(), AutomationError> {
    let driver = session.driver()?;
    let submit = wait_for_element(driver, By::Name("B1"), session.timeout(), "submit button").await?;
    submit.click().await?;

    let desc = descriptor(kind);
    let what = format!("{} results", desc.sheet_name);
    wait_for_element(driver, desc.result.to_by(), session.timeout(), &what).await?;
    Ok(())
}

/// Last calendar day of the month `date` falls in.
fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_day_handles_february_and_december() {
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(last_day_of_month(feb).day(), 29);
        let dec = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert_eq!(
            last_day_of_month(dec),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
    }
}
