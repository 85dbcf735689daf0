//! Workbook fixtures shared by the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sheetguard::{CellValue, Workbook, XlsxReader, XlsxWriter};
use tempfile::TempDir;

/// An orders sheet with no active Enterprise rows, plus an empty summary.
///
/// Columns: A customer, B plan, C amount, D region, E active flag.
pub fn orders_workbook() -> Workbook {
    let mut wb = Workbook::empty();
    let idx = wb.add_worksheet_with_name("Raw_Orders").unwrap();
    let ws = wb.worksheet_mut(idx).unwrap();
    for (col, header) in ["Customer", "Plan", "Amount", "Region", "Active"].iter().enumerate() {
        ws.set_cell_value_at(0, col as u16, *header).unwrap();
    }
    let rows = [
        ("Acme", "Pro", 120.0, "EU", 1.0),
        ("Globex", "Enterprise", 900.0, "US", 0.0),
        ("Initech", "Basic", 40.0, "US", 1.0),
        ("Umbrella", "Pro", 80.0, "APAC", 0.0),
        ("Hooli", "Enterprise", 1500.0, "EU", 0.0),
    ];
    for (i, (customer, plan, amount, region, active)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        ws.set_cell_value_at(row, 0, *customer).unwrap();
        ws.set_cell_value_at(row, 1, *plan).unwrap();
        ws.set_cell_value_at(row, 2, *amount).unwrap();
        ws.set_cell_value_at(row, 3, *region).unwrap();
        ws.set_cell_value_at(row, 4, *active).unwrap();
    }

    let idx = wb.add_worksheet_with_name("Summary").unwrap();
    let ws = wb.worksheet_mut(idx).unwrap();
    ws.set_cell_value("A1", "Total").unwrap();
    ws.set_cell_formula("B1", "=SUM(Raw_Orders!C:C)").unwrap();
    wb
}

/// Write the orders workbook into `dir`
pub fn orders_file(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("orders.xlsx");
    XlsxWriter::write_file(&orders_workbook(), &path).unwrap();
    path
}

/// Read one cell back from disk
pub fn read_cell(path: &Path, sheet: &str, address: &str) -> CellValue {
    XlsxReader::read_file(path)
        .unwrap()
        .worksheet_by_name(sheet)
        .unwrap()
        .get_value(address)
        .unwrap()
}

pub const RAW_ORDERS_FORMULA: &str =
    r#"=AVERAGEIFS(C:C,B:B,"Pro")/COUNTIFS(B:B,"Enterprise",E:E,1)"#;

pub const RAW_ORDERS_GUARDED: &str = r#"=IF(COUNTIFS(B:B,"Enterprise",E:E,1)=0,0,AVERAGEIFS(C:C,B:B,"Pro")/COUNTIFS(B:B,"Enterprise",E:E,1))"#;
