use rust_decimal::Decimal;
use ucd_sales_report::{descriptor, parse_report_html, CellValue, ReportKind};

fn load_fixture(name: &str) -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(path).expect("read fixture")
}

#[test]
fn inventory_footer_becomes_one_extra_row() {
    let html = load_fixture("inventory.html");
    let table = parse_report_html(descriptor(ReportKind::Inventory), &html)
        .expect("inventory fixture has data");

    // 3 body rows plus the synthesized footer row.
    assert_eq!(table.row_count(), 4);
    assert_eq!(
        table.columns,
        vec!["書號", "書名", "庫存量", "庫存額", "定價", "安全存量"]
    );

    // Thousands separators are stripped during coercion.
    let quantity_col = table.column_index("庫存量").unwrap();
    assert_eq!(
        table.rows[1][quantity_col],
        CellValue::Number(Decimal::from(1234))
    );

    // The footer has fewer source cells than the header; mapped cells are
    // placed by class, the rest default to empty.
    let footer = table.rows.last().unwrap();
    assert_eq!(footer[0], CellValue::Text("總計".into()));
    assert_eq!(footer[quantity_col], CellValue::Number(Decimal::from(1362)));
    assert_eq!(footer[table.column_index("定價").unwrap()], CellValue::Null);
}

#[test]
fn inventory_without_rows_is_the_empty_sentinel() {
    let html = load_fixture("inventory_empty.html");
    assert!(parse_report_html(descriptor(ReportKind::Inventory), &html).is_none());
}

#[test]
fn empty_page_is_none_for_grid_reports_too() {
    let html = load_fixture("inventory_empty.html");
    assert!(parse_report_html(descriptor(ReportKind::PurchaseOrders), &html).is_none());
}

#[test]
fn supply_summary_row_is_mapped_positionally() {
    let html = load_fixture("supply.html");
    let table = parse_report_html(descriptor(ReportKind::MonthlySupply), &html)
        .expect("supply fixture has data");

    // 2 body rows plus the synthesized 合計 row.
    assert_eq!(table.row_count(), 3);

    // Repeated headers get dot-suffixed on first appearance order.
    assert_eq!(table.column_index("退量"), Some(7));
    assert_eq!(table.column_index("退量.1"), Some(10));
    assert_eq!(table.column_index("退量.3"), Some(16));

    let summary = table.rows.last().unwrap();
    let label_col = table.column_index("系列編號").unwrap();
    assert_eq!(summary[label_col], CellValue::Text("合計".into()));
    assert_eq!(
        summary[table.column_index("存量").unwrap()],
        CellValue::Number(Decimal::from(150))
    );
    assert_eq!(
        summary[table.column_index("出淨量.1").unwrap()],
        CellValue::Number(Decimal::from(151))
    );
    // The unparseable 存額 cell falls back to zero instead of failing.
    assert_eq!(
        summary[table.column_index("存額").unwrap()],
        CellValue::Number(Decimal::ZERO)
    );

    assert_eq!(
        table.title.as_deref(),
        Some("日盛圖書 2025年07月 庫存銷售月報表")
    );
}

#[test]
fn supply_body_rows_keep_their_types() {
    let html = load_fixture("supply.html");
    let table = parse_report_html(descriptor(ReportKind::MonthlySupply), &html).unwrap();

    let first = &table.rows[0];
    assert_eq!(first[0], CellValue::Text("S01".into()));
    assert_eq!(
        first[table.column_index("定價").unwrap()],
        CellValue::Number(Decimal::from(300))
    );
    assert_eq!(
        first[table.column_index("發書日").unwrap()],
        CellValue::Date(chrono::NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
    );
    assert_eq!(
        first[table.column_index("存額").unwrap()],
        CellValue::Number(Decimal::from(30_000))
    );
}

#[test]
fn analysis_total_row_expands_its_merged_cell() {
    let html = load_fixture("analysis.html");
    let table = parse_report_html(descriptor(ReportKind::CustomerAnalysis), &html)
        .expect("analysis fixture has data");

    assert_eq!(table.row_count(), 3);
    assert_eq!(
        table.columns,
        vec!["帳號", "客戶名稱", "出量", "退量", "淨量", "退率"]
    );

    let total = table.rows.last().unwrap();
    assert_eq!(total[0], CellValue::Text("合計".into()));
    assert_eq!(
        total[table.column_index("出量").unwrap()],
        CellValue::Number(Decimal::from(55))
    );
    // Blank cells in the total row read as genuine zeroes.
    assert_eq!(
        total[table.column_index("淨量").unwrap()],
        CellValue::Number(Decimal::ZERO)
    );
    // Percent columns lose their suffix.
    assert_eq!(
        total[table.column_index("退率").unwrap()]
            .as_number()
            .map(|n| n.to_string()),
        Some("12.7".to_string())
    );
}

#[test]
fn analysis_body_percent_column_is_numeric() {
    let html = load_fixture("analysis.html");
    let table = parse_report_html(descriptor(ReportKind::CustomerAnalysis), &html).unwrap();
    let rate_col = table.column_index("退率").unwrap();
    assert_eq!(
        table.rows[0][rate_col].as_number().map(|n| n.to_string()),
        Some("13.3".to_string())
    );
}
