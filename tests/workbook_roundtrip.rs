use calamine::{open_workbook_auto, Data, Reader};
use rust_decimal::Decimal;
use ucd_sales_report::{
    append_sheet, descriptor, parse_report_html, CellValue, ExtractedTable, ReportKind,
    SheetOptions,
};

fn sample_table(marker: &str) -> ExtractedTable {
    ExtractedTable {
        columns: vec!["code".into(), "amount".into()],
        rows: vec![
            vec![
                CellValue::Text(marker.to_string()),
                CellValue::Number(Decimal::from(10)),
            ],
            vec![
                CellValue::Text(format!("{marker}-2")),
                CellValue::Number(Decimal::from(20)),
            ],
        ],
        title: None,
    }
}

fn cell_string(sheet: &calamine::Range<Data>, row: u32, col: u32) -> String {
    match sheet.get_value((row, col)) {
        Some(Data::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[test]
fn rewriting_a_sheet_replaces_it_and_preserves_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xlsx");

    append_sheet(&path, "alpha", &sample_table("a1"), &SheetOptions::plain()).unwrap();
    append_sheet(&path, "beta", &sample_table("b1"), &SheetOptions::plain()).unwrap();
    // Same sheet name again: replace, not duplicate.
    append_sheet(&path, "alpha", &sample_table("a2"), &SheetOptions::plain()).unwrap();

    let mut workbook = open_workbook_auto(&path).unwrap();
    let names = workbook.sheet_names().to_vec();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"alpha".to_string()));
    assert!(names.contains(&"beta".to_string()));

    let alpha = workbook.worksheet_range("alpha").unwrap();
    assert_eq!(cell_string(&alpha, 1, 0), "a2");

    let beta = workbook.worksheet_range("beta").unwrap();
    assert_eq!(cell_string(&beta, 1, 0), "b1");
    assert_eq!(beta.get_value((1, 1)), Some(&Data::Float(10.0)));
}

#[test]
fn title_row_shifts_the_body_down() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("titled.xlsx");

    let options = SheetOptions::titled("月報表", true);
    append_sheet(&path, "supply", &sample_table("s1"), &options).unwrap();

    let mut workbook = open_workbook_auto(&path).unwrap();
    let sheet = workbook.worksheet_range("supply").unwrap();
    assert_eq!(cell_string(&sheet, 0, 0), "月報表");
    assert_eq!(cell_string(&sheet, 1, 0), "code");
    assert_eq!(cell_string(&sheet, 2, 0), "s1");
}

#[test]
fn inventory_fixture_lands_in_the_workbook_end_to_end() {
    let fixture = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("inventory.html");
    let html = std::fs::read_to_string(fixture).unwrap();
    let table = parse_report_html(descriptor(ReportKind::Inventory), &html).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sales.xlsx");
    append_sheet(&path, "inventory", &table, &SheetOptions::plain()).unwrap();

    let mut workbook = open_workbook_auto(&path).unwrap();
    let sheet = workbook.worksheet_range("inventory").unwrap();
    // Header plus 3 body rows plus the total row.
    assert_eq!(sheet.height(), 5);
    assert_eq!(cell_string(&sheet, 0, 2), "庫存量");
    assert_eq!(sheet.get_value((2, 2)), Some(&Data::Float(1234.0)));
    assert_eq!(cell_string(&sheet, 4, 0), "總計");
}
