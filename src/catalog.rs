//! Static per-report descriptors: menu paths, page signatures and schemas.
//!
//! Every literal display-language anchor text and structural locator the
//! portal forces on us lives here, so the fragile coupling stays in one
//! data structure instead of being scattered through control flow.

use thirtyfour::By;

/// Identifies one report type in the fixed processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Current inventory detail grid.
    Inventory,
    /// Monthly inventory/sales summary with a 合計 footer.
    MonthlySupply,
    /// Sales analysis aggregated by customer.
    CustomerAnalysis,
    /// Sales analysis aggregated by product.
    ProductAnalysis,
    /// Weekly settlement summary, delivered as a legacy spreadsheet download.
    WeeklySummary,
    /// Monthly settlement summary, delivered as a legacy spreadsheet download.
    MonthlySummary,
    /// Purchase order detail.
    PurchaseOrders,
    /// Return order detail.
    ReturnOrders,
    /// Discount/allowance detail with per-category drilldown downloads.
    DiscountDetail,
    /// Payment detail, rendered in a spawned browser tab.
    PaymentDetail,
}

/// A declarative DOM locator that can be turned into a live [`By`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// CSS class name.
    ClassName(&'static str),
    /// `name` attribute.
    Name(&'static str),
    /// CSS selector.
    Css(&'static str),
    /// XPath expression.
    XPath(&'static str),
    /// Anchor matched by a substring of its display text.
    PartialLinkText(&'static str),
}

impl Locator {
    /// Converts into the WebDriver locator type.
    pub fn to_by(self) -> By {
        match self {
            Self::ClassName(v) => By::ClassName(v),
            Self::Name(v) => By::Name(v),
            Self::Css(v) => By::Css(v),
            Self::XPath(v) => By::XPath(v),
            Self::PartialLinkText(v) => By::PartialLinkText(v),
        }
    }
}

/// Fixed per-report column typing.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSchema {
    /// Columns coerced to numbers (thousands separators stripped).
    pub numeric: &'static [&'static str],
    /// Columns coerced to dates.
    pub date: &'static [&'static str],
    /// Columns carrying a trailing `%` that is stripped before coercion.
    pub percent: &'static [&'static str],
}

impl ColumnSchema {
    /// Schema with no typed columns; everything stays text.
    pub const UNTYPED: Self = Self {
        numeric: &[],
        date: &[],
        percent: &[],
    };
}

/// Static navigation and extraction metadata for one report type.
#[derive(Debug, Clone, Copy)]
pub struct ReportDescriptor {
    /// Which report this describes.
    pub kind: ReportKind,
    /// Intermediate menu anchor to traverse first, when the report is not
    /// reachable from the top-level menu.
    pub parent_menu: Option<&'static str>,
    /// Literal anchor text of the report's menu link.
    pub menu_link: &'static str,
    /// Element proving the destination page finished rendering.
    pub signature: Locator,
    /// Element the result table is located by after filter submission.
    pub result: Locator,
    /// Sheet name in the aggregated workbook.
    pub sheet_name: &'static str,
    /// Filename the portal delivers for download-based reports.
    pub download_filename: Option<&'static str>,
    /// Column typing applied after extraction.
    pub schema: ColumnSchema,
}

/// Positional (cell index → column name) mapping for the monthly-supply
/// summary row, whose rendered layout does not align with the body columns.
///
/// Empirically patched against the portal's rendering; treat as versioned
/// configuration rather than a stable contract.
pub const SUPPLY_SUMMARY_MAP: &[(usize, &str)] = &[
    (0, "存量"),
    (1, "存額"),
    (2, "月進量"),
    (3, "退量"),
    (4, "進淨量"),
    (5, "出量"),
    (6, "退量.1"),
    (7, "出淨量"),
    (8, "年進量"),
    (9, "退量.2"),
    (10, "進淨量.1"),
    (11, "出量.1"),
    (12, "退量.3"),
    (13, "出淨量.1"),
];

/// Column the 合計 sentinel is written into for the supply summary row.
pub const SUPPLY_SUMMARY_LABEL_COLUMN: &str = "系列編號";

/// The sentinel label marking synthesized summary rows.
pub const SUMMARY_LABEL: &str = "合計";

const INVENTORY: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::Inventory,
    parent_menu: None,
    menu_link: "[606030] 庫存明細",
    signature: Locator::ClassName("dataGrid"),
    result: Locator::ClassName("dataGrid"),
    sheet_name: "inventory",
    download_filename: None,
    schema: ColumnSchema {
        numeric: &["庫存量", "庫存額", "定價", "安全存量"],
        date: &[],
        percent: &[],
    },
};

const MONTHLY_SUPPLY: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::MonthlySupply,
    parent_menu: None,
    menu_link: "[606031] 庫存月報表",
    signature: Locator::XPath("//form[@action='supp_summary.jsp']"),
    result: Locator::ClassName("sortable"),
    sheet_name: "monthly_supply",
    download_filename: None,
    schema: ColumnSchema {
        numeric: &[
            "定價", "存量", "存額", "月進量", "退量", "進淨量", "出量", "出淨量", "年進量",
            "退量.1", "退量.2", "退量.3", "進淨量.1", "出量.1", "出淨量.1",
        ],
        date: &["發書日"],
        percent: &[],
    },
};

const CUSTOMER_ANALYSIS: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::CustomerAnalysis,
    parent_menu: None,
    menu_link: "[606062] 銷售資料綜合分析",
    signature: Locator::Name("b_ym"),
    result: Locator::XPath("//table[@bgcolor='#008080']"),
    sheet_name: "customer_analysis",
    download_filename: None,
    schema: ColumnSchema {
        numeric: &["出量", "退量", "淨量"],
        date: &[],
        percent: &["退率"],
    },
};

const PRODUCT_ANALYSIS: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::ProductAnalysis,
    parent_menu: None,
    menu_link: "[606062] 銷售資料綜合分析",
    signature: Locator::Name("b_ym"),
    result: Locator::XPath("//table[@bgcolor='#008080']"),
    sheet_name: "product_analysis",
    download_filename: None,
    schema: ColumnSchema {
        numeric: &["出量", "退量", "淨量"],
        date: &[],
        percent: &["退率"],
    },
};

const WEEKLY_SUMMARY: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::WeeklySummary,
    parent_menu: None,
    menu_link: "[606040] 週結帳報表",
    signature: Locator::ClassName("calendar"),
    result: Locator::ClassName("dataGrid"),
    sheet_name: "weekly_summary",
    download_filename: Some("week_summary.xls"),
    schema: ColumnSchema::UNTYPED,
};

const MONTHLY_SUMMARY: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::MonthlySummary,
    parent_menu: None,
    menu_link: "[606041] 月結帳報表",
    signature: Locator::ClassName("calendar"),
    result: Locator::ClassName("dataGrid"),
    sheet_name: "monthly_summary",
    download_filename: Some("month_summary.xls"),
    schema: ColumnSchema::UNTYPED,
};

const PURCHASE_ORDERS: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::PurchaseOrders,
    parent_menu: None,
    menu_link: "[606050] 進貨明細表",
    signature: Locator::Name("b_date"),
    result: Locator::ClassName("dataGrid"),
    sheet_name: "purchase_orders",
    download_filename: None,
    schema: ColumnSchema {
        numeric: &["數量", "定價", "金額"],
        date: &["進貨日期"],
        percent: &[],
    },
};

const RETURN_ORDERS: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::ReturnOrders,
    parent_menu: None,
    menu_link: "[606051] 退貨明細表",
    signature: Locator::Name("b_date"),
    result: Locator::ClassName("dataGrid"),
    sheet_name: "return_orders",
    download_filename: None,
    schema: ColumnSchema {
        numeric: &["數量", "定價", "金額"],
        date: &["退貨日期"],
        percent: &[],
    },
};

const DISCOUNT_DETAIL: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::DiscountDetail,
    parent_menu: Some("[6060] 帳款查詢"),
    menu_link: "[606070] 帳款折讓明細",
    signature: Locator::Name("b_date"),
    result: Locator::ClassName("dataGrid"),
    sheet_name: "discount_detail",
    download_filename: None,
    schema: ColumnSchema {
        numeric: &["折讓金額"],
        date: &["折讓日期"],
        percent: &[],
    },
};

const PAYMENT_DETAIL: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::PaymentDetail,
    parent_menu: Some("[6060] 帳款查詢"),
    menu_link: "[606071] 付款明細表",
    signature: Locator::Name("b_date"),
    result: Locator::ClassName("dataGrid"),
    sheet_name: "payment_detail",
    download_filename: None,
    schema: ColumnSchema {
        numeric: &["付款金額"],
        date: &["付款日期"],
        percent: &[],
    },
};

/// The full catalog in processing order.
///
/// Order is load-bearing: the analysis reports share checkbox state with
/// each other, and the workbook is appended sheet-by-sheet in this order.
pub const CATALOG: &[ReportDescriptor] = &[
    INVENTORY,
    MONTHLY_SUPPLY,
    CUSTOMER_ANALYSIS,
    PRODUCT_ANALYSIS,
    WEEKLY_SUMMARY,
    MONTHLY_SUMMARY,
    PURCHASE_ORDERS,
    RETURN_ORDERS,
    DISCOUNT_DETAIL,
    PAYMENT_DETAIL,
];

/// Looks up the descriptor for a report kind.
pub fn descriptor(kind: ReportKind) -> &'static ReportDescriptor {
    CATALOG
        .iter()
        .find(|d| d.kind == kind)
        .expect("every ReportKind has a catalog entry")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_kind_once() {
        use std::collections::HashSet;
        let kinds: HashSet<_> = CATALOG.iter().map(|d| d.kind).collect();
        assert_eq!(kinds.len(), CATALOG.len());
        assert_eq!(CATALOG.len(), 10);
    }

    #[test]
    fn summary_map_targets_supply_columns() {
        for (_, col) in SUPPLY_SUMMARY_MAP {
            assert!(
                MONTHLY_SUPPLY.schema.numeric.contains(col),
                "summary map column {col} missing from supply schema"
            );
        }
    }

    #[test]
    fn sheet_names_are_unique() {
        use std::collections::HashSet;
        let names: HashSet<_> = CATALOG.iter().map(|d| d.sheet_name).collect();
        assert_eq!(names.len(), CATALOG.len());
    }
}
