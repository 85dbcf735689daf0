//! XLSX reader
//!
//! Loads sheet order, cell values, formulas with their cached results, the
//! cell style index and the workbook's date system. Formatting, comments and
//! drawings are left in the package untouched.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use sheetguard_core::{CellAddress, CellError, CellValue, Workbook, Worksheet};

/// Decode Excel's `_xHHHH_` escape sequences in strings.
///
/// Excel uses this format to encode special characters in XML:
/// - `_x000d_` = CR (carriage return)
/// - `_x000a_` = LF (line feed)
/// - `_x0009_` = Tab
/// - `_x005f_` = Underscore (escaped underscore)
fn decode_excel_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '_' {
            result.push(c);
            continue;
        }

        // Check if this looks like _xHHHH_
        if chars.peek() != Some(&'x') {
            result.push('_');
            continue;
        }
        chars.next();

        let mut hex_chars = String::new();
        while hex_chars.len() < 4 {
            match chars.peek() {
                Some(ch) if ch.is_ascii_hexdigit() => {
                    hex_chars.push(*ch);
                    chars.next();
                }
                _ => break,
            }
        }

        let decoded = if hex_chars.len() == 4 && chars.peek() == Some(&'_') {
            u32::from_str_radix(&hex_chars, 16)
                .ok()
                .and_then(char::from_u32)
        } else {
            None
        };

        match decoded {
            Some(ch) => {
                chars.next(); // closing '_'
                result.push(ch);
            }
            None => {
                // Not a valid escape sequence, output what we consumed
                result.push_str("_x");
                result.push_str(&hex_chars);
            }
        }
    }

    result
}

/// One `<sheet>` entry of `xl/workbook.xml`, resolved to its part name
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SheetPart {
    pub name: String,
    pub path: String,
}

/// What `xl/workbook.xml` and its relationships say about the package
#[derive(Debug, Default)]
pub(crate) struct WorkbookPart {
    pub sheets: Vec<SheetPart>,
    pub date_1904: bool,
}

/// Attribute value by key, unescaped
fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn is_true(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Cell state collected between `<c>` and `</c>`
#[derive(Default)]
struct PendingCell {
    reference: Option<String>,
    cell_type: Option<String>,
    style: Option<u32>,
    value: Option<String>,
    formula: Option<String>,
    shared_formula: bool,
}

impl PendingCell {
    fn from_start(e: &BytesStart<'_>) -> Self {
        Self {
            reference: attr_value(e, b"r"),
            cell_type: attr_value(e, b"t"),
            style: attr_value(e, b"s").and_then(|s| s.parse().ok()),
            ..Self::default()
        }
    }
}

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read a workbook from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Workbook> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read a workbook from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Workbook> {
        let mut archive = zip::ZipArchive::new(reader)?;
        Self::check_content_types(&mut archive)?;

        let shared_strings = Self::read_shared_strings(&mut archive)?;
        let workbook_part = Self::read_workbook_part(&mut archive)?;

        let mut workbook = Workbook::empty();
        workbook.settings_mut().date_1904 = workbook_part.date_1904;

        for sheet in &workbook_part.sheets {
            let mut worksheet = Worksheet::new(sheet.name.as_str());
            Self::read_worksheet(&mut archive, &sheet.path, &mut worksheet, &shared_strings)?;
            debug!(
                "read sheet '{}' from {} ({} cells)",
                sheet.name,
                sheet.path,
                worksheet.cell_count()
            );
            workbook.add_existing_worksheet(worksheet)?;
        }

        if workbook.sheet_count() == 0 {
            return Err(XlsxError::InvalidFormat("Workbook has no sheets".into()));
        }

        Ok(workbook)
    }

    /// Every XLSX package starts with a content-types part
    pub(crate) fn check_content_types<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<()> {
        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }
        Ok(())
    }

    /// Sheets in workbook order with their part names, plus the date system
    pub(crate) fn read_workbook_part<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<WorkbookPart> {
        let (entries, date_1904) = Self::read_workbook_xml(archive)?;
        let paths = Self::read_workbook_rels(archive)?;

        let mut sheets = Vec::with_capacity(entries.len());
        for (name, r_id) in entries {
            match paths.get(&r_id) {
                Some(path) => sheets.push(SheetPart {
                    name,
                    path: path.clone(),
                }),
                None => warn!("sheet '{}' has no worksheet relationship {}", name, r_id),
            }
        }

        Ok(WorkbookPart { sheets, date_1904 })
    }

    /// Read the shared strings table
    fn read_shared_strings<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<String>> {
        let mut strings = Vec::new();

        let file = match archive.by_name("xl/sharedStrings.xml") {
            Ok(f) => f,
            Err(_) => return Ok(strings), // No shared strings is valid
        };

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(false);

        let mut buf = Vec::new();
        let mut current_string = String::new();
        let mut in_si = false;
        let mut in_t = false;
        // Phonetic runs (<rPh>) carry their own <t> that is not part of the text
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current_string.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if in_si && !in_phonetic => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"si" => {
                        strings.push(decode_excel_escapes(&current_string));
                        current_string.clear();
                        in_si = false;
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_t => {
                    current_string.push_str(&e.unescape()?);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    /// Read workbook.xml to get sheet names, rIds and the date system
    fn read_workbook_xml<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<(Vec<(String, String)>, bool)> {
        let file = archive
            .by_name("xl/workbook.xml")
            .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();
        let mut date_1904 = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"sheet" => {
                        if let (Some(name), Some(r_id)) =
                            (attr_value(&e, b"name"), attr_value(&e, b"r:id"))
                        {
                            sheets.push((name, r_id));
                        }
                    }
                    b"workbookPr" => {
                        date_1904 = attr_value(&e, b"date1904").map_or(false, |v| is_true(&v));
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok((sheets, date_1904))
    }

    /// Read workbook.xml.rels to get sheet file paths
    fn read_workbook_rels<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<HashMap<String, String>> {
        let file = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .map_err(|_| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let id = attr_value(&e, b"Id");
                    let target = attr_value(&e, b"Target");
                    let rel_type = attr_value(&e, b"Type");

                    // Only include worksheet relationships
                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        if rel_type.ends_with("/worksheet") {
                            // Target is relative to xl/ folder
                            let full_path = match target.strip_prefix('/') {
                                Some(absolute) => absolute.to_string(),
                                None => format!("xl/{}", target),
                            };
                            rels.insert(id, full_path);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Read a worksheet from the archive
    fn read_worksheet<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        path: &str,
        worksheet: &mut Worksheet,
        shared_strings: &[String],
    ) -> XlsxResult<()> {
        let file = archive
            .by_name(path)
            .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(false);

        let mut buf = Vec::new();

        let mut cell: Option<PendingCell> = None;
        let mut in_value = false;
        let mut in_formula = false;
        let mut in_inline_str = false;
        let mut in_inline_text = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"c" => cell = Some(PendingCell::from_start(&e)),
                    b"v" if cell.is_some() => in_value = true,
                    b"f" => {
                        if let Some(cell) = cell.as_mut() {
                            in_formula = true;
                            cell.shared_formula =
                                attr_value(&e, b"t").map_or(false, |t| t == "shared");
                        }
                    }
                    b"is" if cell.is_some() => in_inline_str = true,
                    b"t" if in_inline_str => in_inline_text = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    // Style-only cell
                    b"c" => {
                        let pending = PendingCell::from_start(&e);
                        Self::process_cell(worksheet, pending, shared_strings)?;
                    }
                    // Dependent cell of a shared formula; its cached value stands
                    b"f" => {
                        if let Some(cell) = cell.as_mut() {
                            cell.shared_formula = true;
                        }
                    }
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if let Some(cell) = cell.as_mut() {
                        if in_value {
                            cell.value
                                .get_or_insert_with(String::new)
                                .push_str(&e.unescape()?);
                        } else if in_formula {
                            cell.formula
                                .get_or_insert_with(String::new)
                                .push_str(&e.unescape()?);
                        } else if in_inline_text {
                            cell.value
                                .get_or_insert_with(String::new)
                                .push_str(&e.unescape()?);
                        }
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"c" => {
                        if let Some(pending) = cell.take() {
                            Self::process_cell(worksheet, pending, shared_strings)?;
                        }
                    }
                    b"v" => in_value = false,
                    b"f" => in_formula = false,
                    b"is" => in_inline_str = false,
                    b"t" if in_inline_str => in_inline_text = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(())
    }

    /// Decode a `<v>` payload according to the cell's `t` attribute
    fn decode_value(
        cell_type: Option<&str>,
        value: &str,
        shared_strings: &[String],
    ) -> XlsxResult<CellValue> {
        Ok(match cell_type {
            // Shared string
            Some("s") => {
                let idx: usize = value.trim().parse().map_err(|_| {
                    XlsxError::Parse(format!("Invalid shared string index: {}", value))
                })?;
                let s = shared_strings.get(idx).ok_or_else(|| {
                    XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
                })?;
                CellValue::string(s.as_str())
            }

            Some("b") => CellValue::Boolean(is_true(value.trim())),

            Some("e") => CellError::from_str(value.trim())
                .map(CellValue::Error)
                .unwrap_or_else(|| CellValue::string(value)),

            Some("inlineStr") | Some("str") => CellValue::string(decode_excel_escapes(value)),

            None | Some("n") => match value.trim().parse::<f64>() {
                Ok(n) => CellValue::Number(n),
                Err(_) => {
                    warn!("non-numeric value '{}' in a numeric cell, kept as text", value);
                    CellValue::string(value)
                }
            },

            Some(other) => {
                warn!("unknown cell type '{}', value kept as text", other);
                CellValue::string(value)
            }
        })
    }

    /// Process a cell and add it to the worksheet
    fn process_cell(
        worksheet: &mut Worksheet,
        cell: PendingCell,
        shared_strings: &[String],
    ) -> XlsxResult<()> {
        let Some(cell_ref) = cell.reference.as_deref() else {
            warn!("cell without a reference in sheet '{}', skipped", worksheet.name());
            return Ok(());
        };
        let addr = match CellAddress::parse(cell_ref) {
            Ok(addr) => addr,
            Err(e) => {
                warn!("unparseable cell reference '{}': {}", cell_ref, e);
                return Ok(());
            }
        };

        let cell_type = cell.cell_type.as_deref();
        let cached = match cell.value.as_deref() {
            Some(v) => Some(Self::decode_value(cell_type, v, shared_strings)?),
            None => None,
        };

        match (cell.formula, cached) {
            (Some(f), cached) if !f.trim().is_empty() => {
                let formula_text = if f.starts_with('=') {
                    f
                } else {
                    format!("={}", f)
                };
                worksheet.set_cell_value_at(
                    addr.row,
                    addr.col,
                    CellValue::Formula {
                        text: formula_text,
                        cached_value: cached.map(Box::new),
                    },
                )?;
            }
            (_, Some(value)) => {
                if cell.shared_formula {
                    debug!("{}: shared formula read as its cached value", cell_ref);
                }
                worksheet.set_cell_value_at(addr.row, addr.col, value)?;
            }
            (_, None) => {}
        }

        if let Some(style) = cell.style.filter(|s| *s != 0) {
            worksheet.set_cell_style_index_at(addr.row, addr.col, style)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};

    #[test]
    fn test_decode_excel_escapes_carriage_return() {
        assert_eq!(decode_excel_escapes("hello_x000d_world"), "hello\rworld");
    }

    #[test]
    fn test_decode_excel_escapes_line_feed() {
        assert_eq!(decode_excel_escapes("hello_x000a_world"), "hello\nworld");
    }

    #[test]
    fn test_decode_excel_escapes_multiple() {
        assert_eq!(
            decode_excel_escapes("line1_x000d__x000a_line2"),
            "line1\r\nline2"
        );
    }

    #[test]
    fn test_decode_excel_escapes_underscore() {
        // _x005f_ is an escaped underscore
        assert_eq!(decode_excel_escapes("under_x005f_score"), "under_score");
        assert_eq!(decode_excel_escapes("Raw_Orders"), "Raw_Orders");
    }

    #[test]
    fn test_decode_excel_escapes_partial_sequence() {
        // Incomplete sequences should be left as-is
        assert_eq!(decode_excel_escapes("_x00"), "_x00");
        assert_eq!(decode_excel_escapes("_x000d"), "_x000d"); // missing trailing _
    }

    #[test]
    fn test_decode_excel_escapes_uppercase() {
        assert_eq!(decode_excel_escapes("_x000D_"), "\r");
        assert_eq!(decode_excel_escapes("_x000A_"), "\n");
    }

    fn package(sheet_xml: &str, workbook_pr: &str, shared: Option<&str>) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut zip = zip::ZipWriter::new(cursor);
            let options = zip::write::SimpleFileOptions::default();

            zip.start_file("[Content_Types].xml", options).unwrap();
            zip.write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#).unwrap();

            zip.start_file("_rels/.rels", options).unwrap();
            zip.write_all(br#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#).unwrap();

            zip.start_file("xl/workbook.xml", options).unwrap();
            let workbook = format!(
                r#"<?xml version="1.0"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">{}<sheets><sheet name="Raw_Orders" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
                workbook_pr
            );
            zip.write_all(workbook.as_bytes()).unwrap();

            zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
            zip.write_all(br#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#).unwrap();

            if let Some(shared) = shared {
                zip.start_file("xl/sharedStrings.xml", options).unwrap();
                zip.write_all(shared.as_bytes()).unwrap();
            }

            zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
            let sheet = format!(
                r#"<?xml version="1.0"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
                sheet_xml
            );
            zip.write_all(sheet.as_bytes()).unwrap();

            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_read_empty_sheet() {
        let workbook = XlsxReader::read(Cursor::new(package("", "", None))).unwrap();

        assert_eq!(workbook.sheet_count(), 1);
        assert_eq!(workbook.worksheet(0).unwrap().name(), "Raw_Orders");
        assert!(workbook.worksheet(0).unwrap().is_empty());
        assert!(!workbook.settings().date_1904);
    }

    #[test]
    fn test_read_cell_types() {
        let shared = r#"<sst><si><t>Pro</t></si><si><r><t>Enter</t></r><r><t>prise</t></r></si></sst>"#;
        let cells = concat!(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>"#,
            r#"<row r="2"><c r="A2"><v>12.5</v></c><c r="B2" t="b"><v>1</v></c>"#,
            r#"<c r="C2" t="e"><v>#DIV/0!</v></c><c r="D2" t="inlineStr"><is><t>note</t></is></c></row>"#,
            r#"<row r="3"><c r="A3" s="4"><f>A2*2</f><v>25</v></c><c r="B3" s="2"/></row>"#,
        );
        let workbook = XlsxReader::read(Cursor::new(package(cells, "", Some(shared)))).unwrap();
        let sheet = workbook.worksheet(0).unwrap();

        assert_eq!(sheet.get_value("A1").unwrap(), CellValue::string("Pro"));
        assert_eq!(sheet.get_value("B1").unwrap(), CellValue::string("Enterprise"));
        assert_eq!(sheet.get_value("A2").unwrap(), CellValue::Number(12.5));
        assert_eq!(sheet.get_value("B2").unwrap(), CellValue::Boolean(true));
        assert_eq!(sheet.get_value("C2").unwrap(), CellValue::Error(CellError::Div0));
        assert_eq!(sheet.get_value("D2").unwrap(), CellValue::string("note"));
        assert_eq!(
            sheet.get_value("A3").unwrap(),
            CellValue::Formula {
                text: "=A2*2".into(),
                cached_value: Some(Box::new(CellValue::Number(25.0))),
            }
        );
        assert_eq!(sheet.cell("A3").unwrap().map(|c| c.style_index), Some(4));
        assert_eq!(sheet.cell("B3").unwrap().map(|c| c.style_index), Some(2));
    }

    #[test]
    fn test_read_date_1904() {
        let workbook =
            XlsxReader::read(Cursor::new(package("", r#"<workbookPr date1904="1"/>"#, None)))
                .unwrap();
        assert!(workbook.settings().date_1904);
    }

    #[test]
    fn test_unparseable_reference_is_skipped() {
        let cells = r#"<row r="1"><c r="??"><v>1</v></c><c r="B1"><v>2</v></c></row>"#;
        let workbook = XlsxReader::read(Cursor::new(package(cells, "", None))).unwrap();
        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(sheet.cell_count(), 1);
        assert_eq!(sheet.get_value("B1").unwrap(), CellValue::Number(2.0));
    }

    #[test]
    fn test_not_a_zip() {
        let err = XlsxReader::read(Cursor::new(b"plain text".to_vec())).unwrap_err();
        assert!(matches!(err, XlsxError::Zip(_)));
    }
}
