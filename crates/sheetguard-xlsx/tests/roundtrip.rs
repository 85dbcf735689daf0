//! Write, read and patch real files on disk

use std::io::{Cursor, Read, Write};

use pretty_assertions::assert_eq;
use sheetguard_core::{CellAddress, CellError, CellValue, Workbook};
use sheetguard_xlsx::{CellPatch, XlsxError, XlsxPatcher, XlsxReader, XlsxWriter};
use tempfile::TempDir;

fn orders_workbook() -> Workbook {
    let mut wb = Workbook::empty();
    let idx = wb.add_worksheet_with_name("Raw_Orders").unwrap();
    let ws = wb.worksheet_mut(idx).unwrap();
    ws.set_cell_value("A1", "Order").unwrap();
    ws.set_cell_value("B1", "Plan").unwrap();
    ws.set_cell_value("C1", "Amount").unwrap();
    for (i, (plan, amount)) in [("Pro", 120.0), ("Basic", 40.0), ("Pro", 80.0)].iter().enumerate() {
        let row = i as u32 + 1;
        ws.set_cell_value_at(row, 0, (i + 1) as f64).unwrap();
        ws.set_cell_value_at(row, 1, *plan).unwrap();
        ws.set_cell_value_at(row, 2, *amount).unwrap();
    }
    ws.set_cell_value("D2", true).unwrap();
    ws.set_cell_value("D3", CellError::Na).unwrap();

    let idx = wb.add_worksheet_with_name("Summary").unwrap();
    let ws = wb.worksheet_mut(idx).unwrap();
    ws.set_cell_value("A1", "Total").unwrap();
    ws.set_cell_value_at(
        0,
        1,
        CellValue::Formula {
            text: "=SUM(Raw_Orders!C:C)".into(),
            cached_value: Some(Box::new(CellValue::Number(240.0))),
        },
    )
    .unwrap();
    wb
}

fn values(wb: &Workbook, sheet: &str) -> Vec<(u32, u16, CellValue)> {
    wb.worksheet_by_name(sheet)
        .unwrap()
        .iter_cells()
        .map(|(row, col, cell)| (row, col, cell.value.clone()))
        .collect()
}

#[test]
fn test_write_then_read_preserves_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.xlsx");
    let original = orders_workbook();

    XlsxWriter::write_file(&original, &path).unwrap();
    let read = XlsxReader::read_file(&path).unwrap();

    assert_eq!(read.sheet_names(), vec!["Raw_Orders", "Summary"]);
    assert_eq!(values(&read, "Raw_Orders"), values(&original, "Raw_Orders"));
    assert_eq!(values(&read, "Summary"), values(&original, "Summary"));
}

#[test]
fn test_date_1904_survives_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mac.xlsx");
    let mut wb = Workbook::new();
    wb.settings_mut().date_1904 = true;

    XlsxWriter::write_file(&wb, &path).unwrap();
    assert!(XlsxReader::read_file(&path).unwrap().settings().date_1904);
}

#[test]
fn test_patch_writes_formula_and_keeps_other_cells() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.xlsx");
    XlsxWriter::write_file(&orders_workbook(), &path).unwrap();

    let patches = [
        CellPatch::new(
            "Raw_Orders",
            CellAddress::parse("E2").unwrap(),
            CellValue::formula("=C2/D2"),
        ),
        CellPatch::new(
            "Raw_Orders",
            CellAddress::parse("A10").unwrap(),
            CellValue::string("note"),
        ),
    ];
    XlsxPatcher::patch_file(&path, &patches).unwrap();

    let read = XlsxReader::read_file(&path).unwrap();
    let ws = read.worksheet_by_name("Raw_Orders").unwrap();
    assert_eq!(ws.get_value("E2").unwrap(), CellValue::formula("=C2/D2"));
    assert_eq!(ws.get_value("A10").unwrap(), CellValue::string("note"));
    assert_eq!(ws.get_value("C4").unwrap(), CellValue::Number(80.0));
    assert_eq!(ws.get_value("B1").unwrap(), CellValue::string("Plan"));
    assert_eq!(values(&read, "Summary"), values(&orders_workbook(), "Summary"));
}

#[test]
fn test_patch_overwrites_a_formula_with_a_literal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.xlsx");
    XlsxWriter::write_file(&orders_workbook(), &path).unwrap();

    let patch = CellPatch::new("summary", CellAddress::new(0, 1), CellValue::Number(0.0));
    XlsxPatcher::patch_file(&path, &[patch]).unwrap();

    let read = XlsxReader::read_file(&path).unwrap();
    assert_eq!(
        read.worksheet_by_name("Summary").unwrap().get_value("B1").unwrap(),
        CellValue::Number(0.0)
    );
}

#[test]
fn test_patch_unknown_sheet_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.xlsx");
    XlsxWriter::write_file(&orders_workbook(), &path).unwrap();
    let before = std::fs::read(&path).unwrap();

    let patch = CellPatch::new("Missing", CellAddress::new(0, 0), CellValue::Number(1.0));
    let err = XlsxPatcher::patch_file(&path, &[patch]).unwrap_err();

    assert!(matches!(err, XlsxError::SheetNotFound(ref name) if name == "Missing"));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_patch_drops_calc_chain_and_copies_unknown_parts() {
    // Start from a written workbook and add parts the writer never produces
    let mut written = Cursor::new(Vec::new());
    XlsxWriter::write(&orders_workbook(), &mut written).unwrap();

    let mut source = zip::ZipArchive::new(Cursor::new(written.into_inner())).unwrap();
    let mut package = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut package);
        let options = zip::write::SimpleFileOptions::default();
        for i in 0..source.len() {
            zip.raw_copy_file(source.by_index(i).unwrap()).unwrap();
        }
        zip.start_file("xl/calcChain.xml", options).unwrap();
        zip.write_all(br#"<calcChain><c r="B1" i="2"/></calcChain>"#).unwrap();
        zip.start_file("docProps/custom.xml", options).unwrap();
        zip.write_all(b"<Properties>kept</Properties>").unwrap();
        zip.finish().unwrap();
    }

    let mut output = Cursor::new(Vec::new());
    let patch = CellPatch::new("Raw_Orders", CellAddress::new(1, 4), CellValue::formula("=C2*2"));
    XlsxPatcher::patch(Cursor::new(package.into_inner()), &mut output, &[patch]).unwrap();

    let mut patched = zip::ZipArchive::new(Cursor::new(output.into_inner())).unwrap();
    assert!(patched.by_name("xl/calcChain.xml").is_err());

    let mut custom = String::new();
    patched
        .by_name("docProps/custom.xml")
        .unwrap()
        .read_to_string(&mut custom)
        .unwrap();
    assert_eq!(custom, "<Properties>kept</Properties>");

    let mut workbook_xml = String::new();
    patched
        .by_name("xl/workbook.xml")
        .unwrap()
        .read_to_string(&mut workbook_xml)
        .unwrap();
    assert!(workbook_xml.contains(r#"fullCalcOnLoad="1""#));
}

#[test]
fn test_reading_a_non_xlsx_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.xlsx");
    std::fs::write(&path, "not a zip").unwrap();

    assert!(matches!(XlsxReader::read_file(&path), Err(XlsxError::Zip(_))));
}
