//! In-place cell edits for existing XLSX packages
//!
//! A patch rewrites only the `<c>` elements it targets and copies every
//! other zip entry unchanged, so formatting, comments, charts and defined
//! names survive. Edited cells carry no cached value: the calculation chain
//! is dropped and the workbook asks for a full calculation on load.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{XlsxError, XlsxResult};
use crate::reader::{SheetPart, XlsxReader};
use crate::writer::cell_xml;
use sheetguard_core::{CellAddress, CellValue};

const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// A new value for one cell.
///
/// `CellValue::Formula` is written as a formula, `CellValue::Empty` clears
/// the cell (keeping its style), anything else is written as a literal.
#[derive(Debug, Clone, PartialEq)]
pub struct CellPatch {
    pub sheet: String,
    pub address: CellAddress,
    pub value: CellValue,
}

impl CellPatch {
    pub fn new<S: Into<String>>(sheet: S, address: CellAddress, value: CellValue) -> Self {
        Self {
            sheet: sheet.into(),
            address,
            value,
        }
    }
}

/// XLSX cell patcher
pub struct XlsxPatcher;

impl XlsxPatcher {
    /// Apply patches to the file at `path`, replacing it.
    ///
    /// The new package is built in memory first, so a failed patch leaves
    /// the file untouched.
    pub fn patch_file<P: AsRef<Path>>(path: P, patches: &[CellPatch]) -> XlsxResult<()> {
        let path = path.as_ref();
        let input = std::fs::read(path)?;
        let mut output = Cursor::new(Vec::with_capacity(input.len()));
        Self::patch(Cursor::new(input), &mut output, patches)?;
        std::fs::write(path, output.into_inner())?;
        debug!("patched {} cell(s) in {}", patches.len(), path.display());
        Ok(())
    }

    /// Copy the package from `input` to `output`, applying `patches`
    pub fn patch<R: Read + Seek, W: Write + Seek>(
        input: R,
        output: W,
        patches: &[CellPatch],
    ) -> XlsxResult<()> {
        let mut archive = zip::ZipArchive::new(input)?;
        XlsxReader::check_content_types(&mut archive)?;
        let workbook = XlsxReader::read_workbook_part(&mut archive)?;

        let mut by_part: HashMap<String, Vec<&CellPatch>> = HashMap::new();
        for patch in patches {
            let part = resolve_sheet(&workbook.sheets, &patch.sheet)
                .ok_or_else(|| XlsxError::SheetNotFound(patch.sheet.clone()))?;
            by_part.entry(part.path.clone()).or_default().push(patch);
        }
        let edited = !patches.is_empty();
        let mut missing: HashSet<&str> = by_part.keys().map(String::as_str).collect();

        let mut zip = ZipWriter::new(output);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();

            if edited && name == CALC_CHAIN_PART {
                debug!("dropping {}", CALC_CHAIN_PART);
                continue;
            }

            let rewritten = if let Some(cells) = by_part.get(&name) {
                missing.remove(name.as_str());
                Some(patch_worksheet_xml(&read_all(&mut file)?, cells)?)
            } else if edited && name == WORKBOOK_PART {
                Some(force_full_calc_on_load(&read_all(&mut file)?)?)
            } else if edited && name == WORKBOOK_RELS_PART {
                Some(remove_calc_chain_relationship(&read_all(&mut file)?)?)
            } else if edited && name == CONTENT_TYPES_PART {
                Some(remove_calc_chain_override(&read_all(&mut file)?)?)
            } else {
                None
            };

            match rewritten {
                Some(bytes) => {
                    zip.start_file(name, options)?;
                    zip.write_all(&bytes)?;
                }
                // Unchanged parts are copied without recompression
                None => zip.raw_copy_file(file)?,
            }
        }

        if let Some(part) = missing.into_iter().next() {
            return Err(XlsxError::MissingPart(part.to_string()));
        }

        zip.finish()?;
        Ok(())
    }
}

fn resolve_sheet<'a>(sheets: &'a [SheetPart], name: &str) -> Option<&'a SheetPart> {
    sheets
        .iter()
        .find(|s| s.name == name)
        .or_else(|| sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name)))
}

fn read_all<R: Read>(file: &mut R) -> XlsxResult<Vec<u8>> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|b| *b == b':') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> XlsxResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Copy of `e` with `skip` removed and `set` added
fn rewrite_attrs(
    e: &BytesStart<'_>,
    skip: &[u8],
    set: Option<(&str, &str)>,
) -> XlsxResult<BytesStart<'static>> {
    let mut updated = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() != skip {
            updated.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    if let Some(pair) = set {
        updated.push_attribute(pair);
    }
    Ok(updated)
}

/// 0-based row of a `<row>`; rows without `r` follow the previous one
fn row_index(e: &BytesStart<'_>, previous: Option<u32>) -> XlsxResult<u32> {
    match attr(e, b"r")? {
        Some(r) => r
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|r| r.checked_sub(1))
            .ok_or_else(|| XlsxError::Parse(format!("Invalid row number: {}", r))),
        None => Ok(previous.map_or(0, |p| p + 1)),
    }
}

/// 0-based column of a `<c>`; cells without `r` follow the previous one
fn cell_column(e: &BytesStart<'_>, previous: Option<u16>) -> XlsxResult<u16> {
    match attr(e, b"r")? {
        Some(r) => Ok(CellAddress::parse(&r)?.col),
        None => Ok(previous.map_or(0, |p| p + 1)),
    }
}

/// The row currently being copied, with the patches still to place in it
struct RowPatch {
    row: u32,
    cells: BTreeMap<u16, CellValue>,
    last_col: Option<u16>,
}

impl RowPatch {
    /// Remove and return the patches left of `col`
    fn take_before(&mut self, col: u16) -> BTreeMap<u16, CellValue> {
        let rest = self.cells.split_off(&col);
        std::mem::replace(&mut self.cells, rest)
    }
}

type XmlWriter = Writer<Vec<u8>>;

fn write_cell(
    writer: &mut XmlWriter,
    row: u32,
    col: u16,
    value: &CellValue,
    style: Option<&str>,
) -> XlsxResult<()> {
    if value.is_empty() && style.is_none() {
        return Ok(());
    }
    let cell_ref = CellAddress::new(row, col).to_a1_string();
    writer
        .get_mut()
        .write_all(cell_xml(&cell_ref, value, style).as_bytes())?;
    Ok(())
}

fn write_cells(writer: &mut XmlWriter, row: u32, cells: BTreeMap<u16, CellValue>) -> XlsxResult<()> {
    for (col, value) in cells {
        write_cell(writer, row, col, &value, None)?;
    }
    Ok(())
}

/// Write whole new rows for pending patches above `limit` (all when `None`)
fn write_rows(
    writer: &mut XmlWriter,
    pending: &mut BTreeMap<u32, BTreeMap<u16, CellValue>>,
    limit: Option<u32>,
) -> XlsxResult<()> {
    let rows = match limit {
        Some(limit) => {
            let rest = pending.split_off(&limit);
            std::mem::replace(pending, rest)
        }
        None => std::mem::take(pending),
    };

    for (row, cells) in rows {
        if cells.values().all(CellValue::is_empty) {
            continue;
        }
        let number = (row + 1).to_string();
        let mut start = BytesStart::new("row");
        start.push_attribute(("r", number.as_str()));
        writer.write_event(Event::Start(start))?;
        write_cells(writer, row, cells)?;
        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }
    Ok(())
}

/// Bounding box (first row, first col, last row, last col) of the patches
fn patch_bounds(pending: &BTreeMap<u32, BTreeMap<u16, CellValue>>) -> Option<(u32, u16, u32, u16)> {
    let first_row = *pending.keys().next()?;
    let last_row = *pending.keys().next_back()?;
    let first_col = pending.values().filter_map(|c| c.keys().next()).min()?;
    let last_col = pending.values().filter_map(|c| c.keys().next_back()).max()?;
    Some((first_row, *first_col, last_row, *last_col))
}

/// Widen a `<dimension ref>` to cover the patched cells
fn merged_dimension(current: &str, bounds: (u32, u16, u32, u16)) -> String {
    let (mut r1, mut c1, mut r2, mut c2) = bounds;
    let mut parts = current.split(':').map(CellAddress::parse);
    if let Some(Ok(start)) = parts.next() {
        let end = match parts.next() {
            Some(Ok(end)) => end,
            _ => start,
        };
        r1 = r1.min(start.row);
        c1 = c1.min(start.col);
        r2 = r2.max(end.row);
        c2 = c2.max(end.col);
    }

    let start = CellAddress::new(r1, c1).to_a1_string();
    if (r1, c1) == (r2, c2) {
        start
    } else {
        format!("{}:{}", start, CellAddress::new(r2, c2).to_a1_string())
    }
}

/// Rewrite the targeted cells of one worksheet part
pub(crate) fn patch_worksheet_xml(xml: &[u8], patches: &[&CellPatch]) -> XlsxResult<Vec<u8>> {
    let mut pending: BTreeMap<u32, BTreeMap<u16, CellValue>> = BTreeMap::new();
    for patch in patches {
        pending
            .entry(patch.address.row)
            .or_default()
            .insert(patch.address.col, patch.value.clone());
    }
    let bounds = patch_bounds(&pending);

    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 256));

    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();
    let mut in_sheet_data = false;
    let mut saw_sheet_data = false;
    let mut last_row: Option<u32> = None;
    let mut row: Option<RowPatch> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,

            Event::Start(ref e) if local_name(e.name().as_ref()) == b"sheetData" => {
                saw_sheet_data = true;
                in_sheet_data = true;
                writer.write_event(Event::Start(e.to_owned()))?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"sheetData" => {
                saw_sheet_data = true;
                // Expand `<sheetData/>` to hold the new rows
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.to_owned()))?;
                write_rows(&mut writer, &mut pending, None)?;
                writer.write_event(Event::End(BytesEnd::new(tag)))?;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"sheetData" => {
                write_rows(&mut writer, &mut pending, None)?;
                in_sheet_data = false;
                writer.write_event(Event::End(e.to_owned()))?;
            }

            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"dimension" => match bounds {
                Some(bounds) => {
                    let current = attr(e, b"ref")?.unwrap_or_default();
                    let merged = merged_dimension(&current, bounds);
                    let updated = rewrite_attrs(e, b"ref", Some(("ref", merged.as_str())))?;
                    writer.write_event(Event::Empty(updated))?;
                }
                None => writer.write_event(Event::Empty(e.to_owned()))?,
            },

            Event::Start(ref e) if in_sheet_data && local_name(e.name().as_ref()) == b"row" => {
                let index = row_index(e, last_row)?;
                last_row = Some(index);
                write_rows(&mut writer, &mut pending, Some(index))?;

                match pending.remove(&index) {
                    Some(cells) => {
                        // `spans` is only a hint and may no longer hold
                        writer.write_event(Event::Start(rewrite_attrs(e, b"spans", None)?))?;
                        row = Some(RowPatch {
                            row: index,
                            cells,
                            last_col: None,
                        });
                    }
                    None => writer.write_event(Event::Start(e.to_owned()))?,
                }
            }
            Event::Empty(ref e) if in_sheet_data && local_name(e.name().as_ref()) == b"row" => {
                let index = row_index(e, last_row)?;
                last_row = Some(index);
                write_rows(&mut writer, &mut pending, Some(index))?;

                match pending.remove(&index) {
                    Some(cells) => {
                        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        writer.write_event(Event::Start(rewrite_attrs(e, b"spans", None)?))?;
                        write_cells(&mut writer, index, cells)?;
                        writer.write_event(Event::End(BytesEnd::new(tag)))?;
                    }
                    None => writer.write_event(Event::Empty(e.to_owned()))?,
                }
            }
            Event::End(ref e) if in_sheet_data && local_name(e.name().as_ref()) == b"row" => {
                if let Some(state) = row.take() {
                    write_cells(&mut writer, state.row, state.cells)?;
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }

            Event::Start(ref e) if local_name(e.name().as_ref()) == b"c" => match row.as_mut() {
                Some(state) => {
                    let col = cell_column(e, state.last_col)?;
                    state.last_col = Some(col);
                    let before = state.take_before(col);
                    write_cells(&mut writer, state.row, before)?;

                    match state.cells.remove(&col) {
                        Some(value) => {
                            let style = attr(e, b"s")?;
                            write_cell(&mut writer, state.row, col, &value, style.as_deref())?;
                            // Drop the old cell's <f>, <v> and <is>
                            let end = e.name().as_ref().to_vec();
                            reader.read_to_end_into(QName(&end), &mut skip_buf)?;
                            skip_buf.clear();
                        }
                        None => writer.write_event(Event::Start(e.to_owned()))?,
                    }
                }
                None => writer.write_event(Event::Start(e.to_owned()))?,
            },
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"c" => match row.as_mut() {
                Some(state) => {
                    let col = cell_column(e, state.last_col)?;
                    state.last_col = Some(col);
                    let before = state.take_before(col);
                    write_cells(&mut writer, state.row, before)?;

                    match state.cells.remove(&col) {
                        Some(value) => {
                            let style = attr(e, b"s")?;
                            write_cell(&mut writer, state.row, col, &value, style.as_deref())?;
                        }
                        None => writer.write_event(Event::Empty(e.to_owned()))?,
                    }
                }
                None => writer.write_event(Event::Empty(e.to_owned()))?,
            },

            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    if !saw_sheet_data {
        return Err(XlsxError::InvalidFormat(
            "Worksheet has no sheetData element".into(),
        ));
    }

    Ok(writer.into_inner())
}

/// Set `fullCalcOnLoad="1"` on `<calcPr>`, adding the element when missing
fn force_full_calc_on_load(xml: &[u8]) -> XlsxResult<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 32));

    let mut buf = Vec::new();
    let mut saw_calc_pr = false;
    let full_calc = Some(("fullCalcOnLoad", "1"));

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"calcPr" => {
                saw_calc_pr = true;
                writer.write_event(Event::Empty(rewrite_attrs(e, b"fullCalcOnLoad", full_calc)?))?;
            }
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"calcPr" => {
                saw_calc_pr = true;
                writer.write_event(Event::Start(rewrite_attrs(e, b"fullCalcOnLoad", full_calc)?))?;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"workbook" => {
                if !saw_calc_pr {
                    let mut calc_pr = BytesStart::new("calcPr");
                    calc_pr.push_attribute(("fullCalcOnLoad", "1"));
                    writer.write_event(Event::Empty(calc_pr))?;
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

/// Copy `xml`, leaving out every `element` for which `remove` holds
fn filter_elements(
    xml: &[u8],
    element: &[u8],
    remove: impl Fn(&BytesStart<'_>) -> XlsxResult<bool>,
) -> XlsxResult<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Empty(ref e) if e.name().as_ref() == element => {
                if !remove(e)? {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                }
            }
            Event::Start(ref e) if e.name().as_ref() == element => {
                if remove(e)? {
                    reader.read_to_end_into(QName(element), &mut skip_buf)?;
                    skip_buf.clear();
                } else {
                    writer.write_event(Event::Start(e.to_owned()))?;
                }
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn remove_calc_chain_relationship(xml: &[u8]) -> XlsxResult<Vec<u8>> {
    filter_elements(xml, b"Relationship", |e| {
        let is_type = attr(e, b"Type")?.map_or(false, |t| t.ends_with("/calcChain"));
        let is_target = attr(e, b"Target")?.map_or(false, |t| t.ends_with("calcChain.xml"));
        Ok(is_type || is_target)
    })
}

fn remove_calc_chain_override(xml: &[u8]) -> XlsxResult<Vec<u8>> {
    filter_elements(xml, b"Override", |e| {
        Ok(attr(e, b"PartName")?.map_or(false, |p| p.ends_with("calcChain.xml")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEAD: &str = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#;

    fn sheet(body: &str) -> String {
        format!("{}{}</worksheet>", HEAD, body)
    }

    fn patch(xml: &str, cells: &[(&str, CellValue)]) -> String {
        let patches: Vec<CellPatch> = cells
            .iter()
            .map(|(a1, value)| CellPatch::new("Sheet1", CellAddress::parse(a1).unwrap(), value.clone()))
            .collect();
        let refs: Vec<&CellPatch> = patches.iter().collect();
        String::from_utf8(patch_worksheet_xml(xml.as_bytes(), &refs).unwrap()).unwrap()
    }

    #[test]
    fn test_replaces_existing_cell_and_keeps_style() {
        let xml = sheet(r#"<sheetData><row r="1" spans="1:2"><c r="A1"><v>1</v></c><c r="B1" s="5"><f>A1*2</f><v>2</v></c></row></sheetData>"#);
        let out = patch(&xml, &[("B1", CellValue::formula("=A1/0"))]);
        assert_eq!(
            out,
            sheet(r#"<sheetData><row r="1"><c r="A1"><v>1</v></c><c r="B1" s="5"><f>A1/0</f></c></row></sheetData>"#)
        );
    }

    #[test]
    fn test_inserts_cells_in_column_order() {
        let xml = sheet(r#"<sheetData><row r="2"><c r="A2"><v>1</v></c><c r="D2"><v>4</v></c></row></sheetData>"#);
        let out = patch(
            &xml,
            &[("C2", CellValue::Number(3.0)), ("F2", CellValue::Boolean(false))],
        );
        assert_eq!(
            out,
            sheet(r#"<sheetData><row r="2"><c r="A2"><v>1</v></c><c r="C2"><v>3</v></c><c r="D2"><v>4</v></c><c r="F2" t="b"><v>0</v></c></row></sheetData>"#)
        );
    }

    #[test]
    fn test_inserts_new_rows() {
        let xml = sheet(r#"<sheetData><row r="2"><c r="A2"><v>1</v></c></row></sheetData>"#);
        let out = patch(
            &xml,
            &[("B1", CellValue::string("top")), ("A5", CellValue::Number(5.0))],
        );
        assert_eq!(
            out,
            sheet(concat!(
                r#"<sheetData><row r="1"><c r="B1" t="inlineStr"><is><t>top</t></is></c></row>"#,
                r#"<row r="2"><c r="A2"><v>1</v></c></row>"#,
                r#"<row r="5"><c r="A5"><v>5</v></c></row></sheetData>"#
            ))
        );
    }

    #[test]
    fn test_expands_empty_sheet_data_and_dimension() {
        let xml = sheet(r#"<dimension ref="A1"/><sheetData/>"#);
        let out = patch(&xml, &[("C3", CellValue::Number(1.0))]);
        assert_eq!(
            out,
            sheet(r#"<dimension ref="A1:C3"/><sheetData><row r="3"><c r="C3"><v>1</v></c></row></sheetData>"#)
        );
    }

    #[test]
    fn test_clearing_a_cell() {
        let xml = sheet(r#"<sheetData><row r="1"><c r="A1"><v>1</v></c><c r="B1" s="2"><v>2</v></c></row></sheetData>"#);
        let out = patch(&xml, &[("A1", CellValue::Empty), ("B1", CellValue::Empty)]);
        assert_eq!(
            out,
            sheet(r#"<sheetData><row r="1"><c r="B1" s="2"/></row></sheetData>"#)
        );
    }

    #[test]
    fn test_missing_sheet_data_is_an_error() {
        let patches = [CellPatch::new("Sheet1", CellAddress::new(0, 0), CellValue::Number(1.0))];
        let refs: Vec<&CellPatch> = patches.iter().collect();
        let err = patch_worksheet_xml(sheet("").as_bytes(), &refs).unwrap_err();
        assert!(matches!(err, XlsxError::InvalidFormat(_)));
    }

    #[test]
    fn test_merged_dimension() {
        assert_eq!(merged_dimension("B2:D4", (0, 2, 1, 2)), "B1:D4");
        assert_eq!(merged_dimension("A1:B2", (9, 0, 9, 0)), "A1:B10");
        assert_eq!(merged_dimension("", (0, 0, 0, 0)), "A1");
    }

    #[test]
    fn test_force_full_calc_on_load() {
        let with = br#"<workbook><sheets/><calcPr calcId="191029"/></workbook>"#;
        assert_eq!(
            String::from_utf8(force_full_calc_on_load(with).unwrap()).unwrap(),
            r#"<workbook><sheets/><calcPr calcId="191029" fullCalcOnLoad="1"/></workbook>"#
        );

        let without = br#"<workbook><sheets/></workbook>"#;
        assert_eq!(
            String::from_utf8(force_full_calc_on_load(without).unwrap()).unwrap(),
            r#"<workbook><sheets/><calcPr fullCalcOnLoad="1"/></workbook>"#
        );
    }

    #[test]
    fn test_calc_chain_metadata_is_removed() {
        let rels = br#"<Relationships><Relationship Id="rId1" Type="http://x/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/></Relationships>"#;
        assert_eq!(
            String::from_utf8(remove_calc_chain_relationship(rels).unwrap()).unwrap(),
            r#"<Relationships><Relationship Id="rId1" Type="http://x/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#
        );

        let types = br#"<Types><Override PartName="/xl/calcChain.xml" ContentType="x"/><Override PartName="/xl/workbook.xml" ContentType="y"/></Types>"#;
        assert_eq!(
            String::from_utf8(remove_calc_chain_override(types).unwrap()).unwrap(),
            r#"<Types><Override PartName="/xl/workbook.xml" ContentType="y"/></Types>"#
        );
    }
}
