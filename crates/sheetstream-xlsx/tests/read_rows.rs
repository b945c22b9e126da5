//! End-to-end reading tests over in-memory workbook fixtures.
//!
//! Each test builds a minimal XLSX container with the `zip` writer, then
//! reads it back through the public API and asserts on the yielded records.

use std::io::{Cursor, Write};

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use sheetstream_xlsx::{
    CellValue, RowRecord, Rows, SharedStringTable, SheetReader, XlsxError,
};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#;

fn workbook_xml(sheets: &[&str]) -> String {
    let mut entries = String::new();
    for (i, name) in sheets.iter().enumerate() {
        entries.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            name,
            i + 1,
            i + 1
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{MAIN_NS}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{entries}</sheets></workbook>"#
    )
}

fn workbook_rels(count: usize) -> String {
    let mut entries = String::new();
    for i in 1..=count {
        entries.push_str(&format!(
            r#"<Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{i}.xml"/>"#
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{entries}</Relationships>"#
    )
}

fn worksheet(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{MAIN_NS}">{body}</worksheet>"#
    )
}

fn shared_strings_xml(items: &[&str]) -> String {
    let mut entries = String::new();
    for item in items {
        entries.push_str(&format!("<si><t>{item}</t></si>"));
    }
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="{MAIN_NS}">{entries}</sst>"#)
}

fn build_archive(parts: &[(&str, &str)]) -> Cursor<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in parts {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    let mut cursor = writer.finish().unwrap();
    cursor.set_position(0);
    cursor
}

/// Workbook with one sheet whose worksheet element wraps `sheet_body`.
fn open_single(sheet_body: &str, shared: Option<&[&str]>) -> SheetReader<Cursor<Vec<u8>>> {
    open_with_worksheet_xml(&worksheet(sheet_body), shared)
}

/// Workbook with one sheet whose part content is `sheet_xml` verbatim.
fn open_with_worksheet_xml(
    sheet_xml: &str,
    shared: Option<&[&str]>,
) -> SheetReader<Cursor<Vec<u8>>> {
    let wb = workbook_xml(&["Sheet1"]);
    let rels = workbook_rels(1);
    let sst = shared.map(|items| shared_strings_xml(items));

    let mut parts = vec![
        ("[Content_Types].xml", CONTENT_TYPES),
        ("xl/workbook.xml", wb.as_str()),
        ("xl/_rels/workbook.xml.rels", rels.as_str()),
        ("xl/worksheets/sheet1.xml", sheet_xml),
    ];
    if let Some(sst) = sst.as_deref() {
        parts.push(("xl/sharedStrings.xml", sst));
    }

    SheetReader::new(build_archive(&parts)).unwrap()
}

fn collect(rows: Rows<'_>) -> Vec<RowRecord> {
    rows.map(|r| r.unwrap()).collect()
}

fn record_keys(record: &RowRecord) -> Vec<&str> {
    record.keys().map(|k| k.as_str()).collect()
}

#[test]
fn dimension_bounds_make_positional_records_dense() {
    let mut reader = open_single(
        r#"<dimension ref="A1:D10"/><sheetData>
            <row r="1"><c r="A1"><v>1</v></c></row>
            <row r="2"><c r="C2"><v>3</v></c></row>
        </sheetData>"#,
        None,
    );

    let records = collect(reader.rows().unwrap());
    assert_eq!(records.len(), 2);

    // Every record carries the full declared width, however sparse the source
    for record in &records {
        assert_eq!(record_keys(record), ["0", "1", "2", "3"]);
    }
    assert_eq!(records[0].get("0"), Some(&CellValue::Number(1.0)));
    assert_eq!(records[0].get("1"), Some(&CellValue::Empty));
    assert_eq!(records[1].get("2"), Some(&CellValue::Number(3.0)));
}

#[test]
fn skipped_row_indices_are_filled_with_empty_records() {
    let mut reader = open_single(
        r#"<dimension ref="A1:B5"/><sheetData>
            <row r="1"><c r="A1"><v>10</v></c></row>
            <row r="3"><c r="A3"><v>30</v></c></row>
            <row r="5"><c r="A5"><v>50</v></c></row>
        </sheetData>"#,
        None,
    );

    let records = collect(reader.rows().unwrap());
    assert_eq!(records.len(), 5);

    assert_eq!(records[0].get("0"), Some(&CellValue::Number(10.0)));
    assert!(records[1].is_blank());
    assert_eq!(records[1].len(), 2);
    assert_eq!(records[2].get("0"), Some(&CellValue::Number(30.0)));
    assert!(records[3].is_blank());
    assert_eq!(records[4].get("0"), Some(&CellValue::Number(50.0)));
}

#[test]
fn header_row_names_records_and_is_suppressed() {
    let mut reader = open_single(
        r#"<sheetData>
            <row r="1">
                <c r="A1" t="inlineStr"><is><t>Name</t></is></c>
                <c r="B1" t="inlineStr"><is><t>Age</t></is></c>
            </row>
            <row r="2">
                <c r="A2" t="inlineStr"><is><t>Ada</t></is></c>
                <c r="B2"><v>36</v></c>
            </row>
        </sheetData>"#,
        None,
    );

    let records = collect(reader.rows_with_header().unwrap());

    // The header row itself never appears in the output
    assert_eq!(records.len(), 1);
    assert_eq!(record_keys(&records[0]), ["Name", "Age"]);
    assert_eq!(records[0].get("Name"), Some(&CellValue::string("Ada")));
    assert_eq!(records[0].get("Age"), Some(&CellValue::Number(36.0)));
}

#[test]
fn shared_string_cells_resolve_through_the_table() {
    let mut reader = open_single(
        r#"<sheetData><row r="1">
            <c r="A1" t="s"><v>1</v></c>
            <c r="B1" t="s"><v>5</v></c>
            <c r="C1" t="s"><v>junk</v></c>
        </row></sheetData>"#,
        Some(&["Alpha", "Beta"]),
    );

    let records = collect(reader.rows().unwrap());
    assert_eq!(records[0].get("0"), Some(&CellValue::string("Beta")));
    // Out-of-range index degrades to the number itself
    assert_eq!(records[0].get("1"), Some(&CellValue::Number(5.0)));
    // Unparsable index degrades to the raw text
    assert_eq!(records[0].get("2"), Some(&CellValue::raw("junk")));
}

#[test]
fn missing_shared_strings_part_yields_an_empty_table() {
    let mut reader = open_single(
        r#"<sheetData><row r="1"><c r="A1" t="s"><v>0</v></c></row></sheetData>"#,
        None,
    );

    assert!(reader.shared_strings().is_empty());
    let records = collect(reader.rows().unwrap());
    // With nothing to resolve against, the index itself comes back
    assert_eq!(records[0].get("0"), Some(&CellValue::Number(0.0)));
}

#[test]
fn type_codes_coerce_per_the_format_rules() {
    let mut reader = open_single(
        r#"<sheetData><row r="1">
            <c r="A1" t="b"><v>1</v></c>
            <c r="B1" t="b"><v>0</v></c>
            <c r="C1" t="d"><v>2020-01-02</v></c>
            <c r="D1"><v>3.14</v></c>
            <c r="E1"><v>abc</v></c>
            <c r="F1" t="e"><v>#DIV/0!</v></c>
            <c r="G1" t="str"><v>a_x000a_b</v></c>
        </row></sheetData>"#,
        None,
    );

    let records = collect(reader.rows().unwrap());
    let row = &records[0];

    assert_eq!(row.get("0"), Some(&CellValue::Bool(true)));
    assert_eq!(row.get("1"), Some(&CellValue::Bool(false)));
    assert_eq!(
        row.get("2"),
        Some(&CellValue::Date(NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()))
    );
    assert_eq!(row.get("3"), Some(&CellValue::Number(3.14)));
    assert_eq!(row.get("4"), Some(&CellValue::raw("abc")));
    assert_eq!(row.get("5"), Some(&CellValue::raw("#DIV/0!")));
    assert_eq!(row.get("6"), Some(&CellValue::string("a\nb")));
}

#[test]
fn inline_rich_text_runs_are_flattened() {
    let mut reader = open_single(
        r#"<sheetData><row r="1">
            <c r="A1" t="inlineStr"><is><r><rPr><b/></rPr><t>Hel</t></r><r><t>lo</t></r></is></c>
        </row></sheetData>"#,
        None,
    );

    let records = collect(reader.rows().unwrap());
    assert_eq!(records[0].get("0"), Some(&CellValue::string("Hello")));
}

#[test]
fn empty_dimension_ref_is_fatal() {
    let mut reader = open_single(
        r#"<dimension ref=""/><sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData>"#,
        None,
    );

    let mut rows = reader.rows().unwrap();
    let first = rows.next().expect("the fatal error is yielded");
    assert!(matches!(first, Err(XlsxError::InvalidSheetMetadata(_))));
    // No further rows after a fatal error
    assert!(rows.next().is_none());
}

#[test]
fn dimension_without_end_reference_is_fatal() {
    let mut reader = open_single(
        r#"<dimension ref="A1"/><sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData>"#,
        None,
    );

    let errors: Vec<_> = reader.rows().unwrap().collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        Err(XlsxError::InvalidSheetMetadata(_))
    ));
}

#[test]
fn undecodable_dimension_end_is_fatal() {
    let mut reader = open_single(
        r#"<dimension ref="A1:???"/><sheetData/>"#,
        None,
    );

    let errors: Vec<_> = reader.rows().unwrap().collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        Err(XlsxError::InvalidSheetMetadata(_))
    ));
}

#[test]
fn rescanning_the_same_sheet_yields_equal_records() {
    let mut reader = open_single(
        r#"<dimension ref="A1:B3"/><sheetData>
            <row r="1"><c r="A1"><v>1</v></c><c r="B1"><v>2</v></c></row>
            <row r="3"><c r="B3" t="str"><v>x</v></c></row>
        </sheetData>"#,
        None,
    );

    let first = collect(reader.rows().unwrap());
    let second = collect(reader.rows().unwrap());
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn dropping_an_iterator_mid_scan_releases_the_sheet() {
    let mut reader = open_single(
        r#"<sheetData>
            <row r="1"><c r="A1"><v>1</v></c></row>
            <row r="2"><c r="A2"><v>2</v></c></row>
        </sheetData>"#,
        None,
    );

    {
        let mut rows = reader.rows().unwrap();
        assert!(rows.next().is_some());
        // Abandon the rest of the scan
    }

    let records = collect(reader.rows().unwrap());
    assert_eq!(records.len(), 2);
}

#[test]
fn sheets_are_cataloged_in_workbook_order_and_selectable_by_name() {
    let wb = workbook_xml(&["Summary", "Data"]);
    let rels = workbook_rels(2);
    let sheet1 = worksheet(r#"<sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData>"#);
    let sheet2 = worksheet(
        r#"<sheetData><row r="1"><c r="A1" t="str"><v>second</v></c></row></sheetData>"#,
    );

    let parts = vec![
        ("[Content_Types].xml", CONTENT_TYPES),
        ("xl/workbook.xml", wb.as_str()),
        ("xl/_rels/workbook.xml.rels", rels.as_str()),
        ("xl/worksheets/sheet1.xml", sheet1.as_str()),
        ("xl/worksheets/sheet2.xml", sheet2.as_str()),
    ];
    let mut reader = SheetReader::new(build_archive(&parts)).unwrap();

    assert_eq!(reader.sheet_names(), ["Summary", "Data"]);

    let records = collect(reader.sheet_rows("Data", false).unwrap());
    assert_eq!(records[0].get("0"), Some(&CellValue::string("second")));

    assert!(matches!(
        reader.sheet_rows("Nope", false),
        Err(XlsxError::SheetNotFound(_))
    ));
}

#[test]
fn non_worksheet_root_reads_as_an_empty_sheet() {
    let chart = format!(r#"<?xml version="1.0"?><chartsheet xmlns="{MAIN_NS}"/>"#);
    let mut reader = open_with_worksheet_xml(&chart, None);
    assert_eq!(collect(reader.rows().unwrap()).len(), 0);
}

#[test]
fn worksheet_in_a_foreign_namespace_reads_as_empty() {
    let alien = r#"<?xml version="1.0"?><worksheet xmlns="http://example.com/not-spreadsheetml"><sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData></worksheet>"#;
    let mut reader = open_with_worksheet_xml(alien, None);
    assert_eq!(collect(reader.rows().unwrap()).len(), 0);
}

#[test]
fn sheets_without_a_dimension_are_assembled_open_ended() {
    let mut reader = open_single(
        r#"<sheetData>
            <row r="1"><c r="A1"><v>1</v></c><c r="C1"><v>3</v></c></row>
            <row r="2"><c r="A2"><v>4</v></c></row>
        </sheetData>"#,
        None,
    );

    let records = collect(reader.rows().unwrap());

    // Each record spans up to its own right-most cell
    assert_eq!(record_keys(&records[0]), ["0", "1", "2"]);
    assert_eq!(records[0].get("1"), Some(&CellValue::Empty));
    assert_eq!(records[0].get("2"), Some(&CellValue::Number(3.0)));
    assert_eq!(record_keys(&records[1]), ["0"]);
}

#[test]
fn cells_and_rows_without_references_advance_sequentially() {
    let mut reader = open_single(
        r#"<sheetData>
            <row><c><v>1</v></c><c><v>2</v></c></row>
            <row><c t="str"><v>x</v></c></row>
        </sheetData>"#,
        None,
    );

    let records = collect(reader.rows().unwrap());
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("0"), Some(&CellValue::Number(1.0)));
    assert_eq!(records[0].get("1"), Some(&CellValue::Number(2.0)));
    assert_eq!(records[1].get("0"), Some(&CellValue::string("x")));
}

#[test]
fn undecodable_cell_references_fall_back_to_the_counter() {
    let mut reader = open_single(
        r#"<sheetData>
            <row r="1"><c r="B1"><v>2</v></c><c r="??"><v>3</v></c></row>
        </sheetData>"#,
        None,
    );

    let records = collect(reader.rows().unwrap());
    // The bad reference lands on the slot after the last resolved cell
    assert_eq!(records[0].get("1"), Some(&CellValue::Number(2.0)));
    assert_eq!(records[0].get("2"), Some(&CellValue::Number(3.0)));
}

#[test]
fn header_mode_ignores_cells_with_no_matching_header() {
    let mut reader = open_single(
        r#"<sheetData>
            <row r="1"><c r="A1" t="str"><v>Name</v></c><c r="B1" t="str"><v>Age</v></c></row>
            <row r="2"><c r="A2" t="str"><v>Ada</v></c><c r="D2"><v>9</v></c></row>
        </sheetData>"#,
        None,
    );

    let records = collect(reader.rows_with_header().unwrap());
    assert_eq!(records.len(), 1);
    // Column D has no header; its value is dropped rather than crashing
    assert_eq!(record_keys(&records[0]), ["Name", "Age"]);
    assert_eq!(records[0].get("Name"), Some(&CellValue::string("Ada")));
    assert_eq!(records[0].get("Age"), Some(&CellValue::Empty));
}

#[test]
fn gap_rows_under_header_mode_carry_the_header_keys() {
    let mut reader = open_single(
        r#"<sheetData>
            <row r="1"><c r="A1" t="str"><v>Name</v></c></row>
            <row r="4"><c r="A4" t="str"><v>Ada</v></c></row>
        </sheetData>"#,
        None,
    );

    let records = collect(reader.rows_with_header().unwrap());
    assert_eq!(records.len(), 3);
    for blank in &records[..2] {
        assert_eq!(record_keys(blank), ["Name"]);
        assert!(blank.is_blank());
    }
    assert_eq!(records[2].get("Name"), Some(&CellValue::string("Ada")));
}

#[test]
fn self_closing_rows_still_produce_a_record() {
    let mut reader = open_single(
        r#"<dimension ref="A1:B2"/><sheetData>
            <row r="1"><c r="A1"><v>1</v></c></row>
            <row r="2"/>
        </sheetData>"#,
        None,
    );

    let records = collect(reader.rows().unwrap());
    assert_eq!(records.len(), 2);
    assert!(records[1].is_blank());
    assert_eq!(records[1].len(), 2);
}

#[test]
fn cells_past_the_declared_width_extend_the_record() {
    let mut reader = open_single(
        r#"<dimension ref="A1:B1"/><sheetData>
            <row r="1"><c r="D1"><v>9</v></c></row>
        </sheetData>"#,
        None,
    );

    let records = collect(reader.rows().unwrap());
    assert_eq!(record_keys(&records[0]), ["0", "1", "2", "3"]);
    assert_eq!(records[0].get("3"), Some(&CellValue::Number(9.0)));
}

#[test]
fn scan_reads_a_bare_worksheet_stream() {
    let table: SharedStringTable = ["Alpha"].into_iter().collect();
    let sheet = worksheet(r#"<sheetData><row r="1"><c r="A1" t="s"><v>0</v></c></row></sheetData>"#);

    let rows = Rows::scan(Cursor::new(sheet.into_bytes()), &table, false);
    let records: Vec<RowRecord> = rows.map(|r| r.unwrap()).collect();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("0"), Some(&CellValue::string("Alpha")));
}

#[test]
fn workbooks_open_from_a_file_path() {
    let archive =
        open_single_bytes(r#"<sheetData><row r="1"><c r="A1"><v>7</v></c></row></sheetData>"#);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.xlsx");
    std::fs::write(&path, archive.into_inner()).unwrap();

    let mut reader = SheetReader::open(&path).unwrap();
    let records = collect(reader.rows().unwrap());
    assert_eq!(records[0].get("0"), Some(&CellValue::Number(7.0)));
}

/// Raw archive bytes for a single-sheet workbook.
fn open_single_bytes(sheet_body: &str) -> Cursor<Vec<u8>> {
    let wb = workbook_xml(&["Sheet1"]);
    let rels = workbook_rels(1);
    let ws = worksheet(sheet_body);
    let parts = vec![
        ("[Content_Types].xml", CONTENT_TYPES),
        ("xl/workbook.xml", wb.as_str()),
        ("xl/_rels/workbook.xml.rels", rels.as_str()),
        ("xl/worksheets/sheet1.xml", ws.as_str()),
    ];
    build_archive(&parts)
}
