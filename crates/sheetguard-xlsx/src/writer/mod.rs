//! XLSX writer
//!
//! Writes a complete package for a [`Workbook`]: one worksheet part per
//! sheet, inline strings, formulas with their cached values, and a minimal
//! stylesheet.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::error::{XlsxError, XlsxResult};
use sheetguard_core::{CellAddress, CellValue, Workbook};

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
    <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
    <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
    <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
    <cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
    <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#;

/// Escape text for use in element content and attribute values
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// XLSX file writer
pub struct XlsxWriter;

impl XlsxWriter {
    /// Write a workbook to a file path
    pub fn write_file<P: AsRef<Path>>(workbook: &Workbook, path: P) -> XlsxResult<()> {
        let file = File::create(path)?;
        Self::write(workbook, file)
    }

    /// Write a workbook to a writer
    pub fn write<W: Write + Seek>(workbook: &Workbook, writer: W) -> XlsxResult<()> {
        if workbook.sheet_count() == 0 {
            return Err(XlsxError::InvalidFormat(
                "A workbook needs at least one sheet".into(),
            ));
        }

        let mut zip = zip::ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(Self::content_types_xml(workbook).as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(Self::root_rels_xml().as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(Self::workbook_xml(workbook).as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(Self::workbook_rels_xml(workbook).as_bytes())?;

        zip.start_file("xl/styles.xml", options)?;
        zip.write_all(STYLES_XML.as_bytes())?;

        for index in 0..workbook.sheet_count() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", index + 1), options)?;
            zip.write_all(Self::worksheet_xml(workbook, index)?.as_bytes())?;
        }

        zip.finish()?;
        Ok(())
    }

    fn content_types_xml(workbook: &Workbook) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
    <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
        );

        for i in 0..workbook.sheet_count() {
            content.push_str(&format!(
                r#"
    <Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i + 1
            ));
        }

        content.push_str("\n</Types>");
        content
    }

    fn root_rels_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
    }

    fn workbook_xml(workbook: &Workbook) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        );

        if workbook.settings().date_1904 {
            content.push_str("\n    <workbookPr date1904=\"1\"/>");
        }

        content.push_str("\n    <sheets>");
        for (i, sheet) in workbook.worksheets().enumerate() {
            content.push_str(&format!(
                r#"
        <sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_xml(sheet.name()),
                i + 1,
                i + 1
            ));
        }

        content.push_str(
            r#"
    </sheets>
</workbook>"#,
        );
        content
    }

    fn workbook_rels_xml(workbook: &Workbook) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );

        for i in 0..workbook.sheet_count() {
            content.push_str(&format!(
                r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                i + 1
            ));
        }

        // Styles relationship
        content.push_str(&format!(
            r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
            workbook.sheet_count() + 1
        ));

        content.push_str("\n</Relationships>");
        content
    }

    fn worksheet_xml(workbook: &Workbook, index: usize) -> XlsxResult<String> {
        let sheet = workbook
            .worksheet(index)
            .ok_or_else(|| XlsxError::InvalidFormat(format!("Sheet index {} not found", index)))?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );

        if let Some(used) = sheet.used_range() {
            content.push_str(&format!("\n    <dimension ref=\"{}\"/>", used.to_a1_string()));
        }
        content.push_str("\n    <sheetData>");

        // Sparse, row-major
        let mut current_row: Option<u32> = None;
        for (row, col, cell) in sheet.iter_cells() {
            if cell.value.is_empty() {
                continue;
            }
            if current_row != Some(row) {
                if current_row.is_some() {
                    content.push_str("\n        </row>");
                }
                content.push_str(&format!("\n        <row r=\"{}\">", row + 1));
                current_row = Some(row);
            }

            let cell_ref = CellAddress::new(row, col).to_a1_string();
            content.push_str("\n            ");
            content.push_str(&cell_xml(&cell_ref, &cell.value, None));
        }

        if current_row.is_some() {
            content.push_str("\n        </row>");
        }

        content.push_str("\n    </sheetData>\n</worksheet>");
        Ok(content)
    }
}

/// `t` attribute and `<v>` payload for a plain value; `None` for an empty cell
fn typed_value(value: &CellValue) -> Option<(Option<&'static str>, String)> {
    match value {
        CellValue::Number(n) => Some((None, n.to_string())),
        CellValue::Boolean(b) => Some((Some("b"), if *b { "1" } else { "0" }.to_string())),
        CellValue::Error(e) => Some((Some("e"), e.as_str().to_string())),
        CellValue::String(s) => Some((Some("str"), s.as_str().to_string())),
        CellValue::Empty | CellValue::Formula { .. } => None,
    }
}

/// Serialize one `<c>` element.
///
/// Text is written inline, formulas without their leading `=` and followed
/// by the cached value when there is one. `style` is carried through as the
/// `s` attribute.
pub(crate) fn cell_xml(cell_ref: &str, value: &CellValue, style: Option<&str>) -> String {
    let style_attr = style.map_or(String::new(), |s| format!(" s=\"{}\"", escape_xml(s)));

    match value {
        CellValue::Empty => format!("<c r=\"{}\"{}/>", cell_ref, style_attr),
        CellValue::String(s) => {
            let text = s.as_str();
            let space = if text.trim() != text {
                " xml:space=\"preserve\""
            } else {
                ""
            };
            format!(
                "<c r=\"{}\"{} t=\"inlineStr\"><is><t{}>{}</t></is></c>",
                cell_ref,
                style_attr,
                space,
                escape_xml(text)
            )
        }
        CellValue::Formula { text, cached_value } => {
            let body = text.strip_prefix('=').unwrap_or(text);
            let cached = cached_value.as_deref().and_then(typed_value);
            let type_attr = cached
                .as_ref()
                .and_then(|(t, _)| *t)
                .map_or(String::new(), |t| format!(" t=\"{}\"", t));
            let value_xml = cached.map_or(String::new(), |(_, v)| format!("<v>{}</v>", escape_xml(&v)));
            format!(
                "<c r=\"{}\"{}{}><f>{}</f>{}</c>",
                cell_ref,
                style_attr,
                type_attr,
                escape_xml(body),
                value_xml
            )
        }
        plain => match typed_value(plain) {
            Some((t, v)) => {
                // Plain strings are handled above; "str" only appears as a cached result
                let type_attr = t.map_or(String::new(), |t| format!(" t=\"{}\"", t));
                format!(
                    "<c r=\"{}\"{}{}><v>{}</v></c>",
                    cell_ref,
                    style_attr,
                    type_attr,
                    escape_xml(&v)
                )
            }
            None => format!("<c r=\"{}\"{}/>", cell_ref, style_attr),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetguard_core::CellError;

    #[test]
    fn test_cell_xml_values() {
        assert_eq!(
            cell_xml("A1", &CellValue::Number(1.5), None),
            r#"<c r="A1"><v>1.5</v></c>"#
        );
        assert_eq!(
            cell_xml("B1", &CellValue::Boolean(true), Some("3")),
            r#"<c r="B1" s="3" t="b"><v>1</v></c>"#
        );
        assert_eq!(
            cell_xml("C1", &CellValue::string("a<b"), None),
            r#"<c r="C1" t="inlineStr"><is><t>a&lt;b</t></is></c>"#
        );
        assert_eq!(
            cell_xml("D1", &CellValue::Error(CellError::Div0), None),
            r#"<c r="D1" t="e"><v>#DIV/0!</v></c>"#
        );
    }

    #[test]
    fn test_cell_xml_formula() {
        assert_eq!(
            cell_xml("E2", &CellValue::formula("=SUM(A1:A3)/B1"), None),
            r#"<c r="E2"><f>SUM(A1:A3)/B1</f></c>"#
        );

        let cached = CellValue::Formula {
            text: "=IF(B1=\"x\",\"yes\",\"no\")".into(),
            cached_value: Some(Box::new(CellValue::string("no"))),
        };
        assert_eq!(
            cell_xml("E3", &cached, None),
            r#"<c r="E3" t="str"><f>IF(B1=&quot;x&quot;,&quot;yes&quot;,&quot;no&quot;)</f><v>no</v></c>"#
        );
    }

    #[test]
    fn test_leading_space_is_preserved() {
        assert_eq!(
            cell_xml("A1", &CellValue::string(" x"), None),
            r#"<c r="A1" t="inlineStr"><is><t xml:space="preserve"> x</t></is></c>"#
        );
    }

    #[test]
    fn test_write_rejects_empty_workbook() {
        let mut buf = std::io::Cursor::new(Vec::new());
        let err = XlsxWriter::write(&Workbook::empty(), &mut buf).unwrap_err();
        assert!(matches!(err, XlsxError::InvalidFormat(_)));
    }
}
