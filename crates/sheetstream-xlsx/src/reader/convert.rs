//! Cell value conversion
//!
//! Maps a cell's raw text and type-code attribute to a typed [`CellValue`]
//! per the format's coercion rules. Conversion never fails: spreadsheet
//! producers are inconsistent, and unparsable input degrades to the raw text
//! instead of aborting the scan.

use chrono::NaiveDate;

use crate::escapes::decode_escapes;
use crate::reader::shared_strings::SharedStringTable;
use sheetstream_core::CellValue;

/// Convert a cell's raw text according to its `t` attribute.
///
/// Type codes:
/// - `"s"` - index into the shared-string table
/// - `"str"` / `"inlineStr"` - literal string, escape sequences decoded
/// - `"b"` - boolean, true iff the text is exactly `"1"`
/// - `"d"` - ISO `yyyy-mm-dd` date
/// - `"e"` - formula error code, surfaced verbatim
/// - anything else / absent - number, falling back to the raw text
pub(crate) fn convert_cell_value(
    raw: &str,
    type_code: Option<&str>,
    strings: &SharedStringTable,
) -> CellValue {
    match type_code {
        Some("s") => match raw.trim().parse::<i64>() {
            Ok(index) => {
                let resolved = usize::try_from(index)
                    .ok()
                    .and_then(|i| strings.get(i));
                match resolved {
                    Some(s) => CellValue::String(s.clone()),
                    // Index parsed but never interned: surface the index itself.
                    None => CellValue::Number(index as f64),
                }
            }
            Err(_) => CellValue::raw(raw),
        },
        Some("str") | Some("inlineStr") => CellValue::string(decode_escapes(raw)),
        Some("b") => CellValue::Bool(raw == "1"),
        Some("d") => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => CellValue::Date(date),
            Err(_) => CellValue::raw(raw),
        },
        Some("e") => CellValue::raw(raw),
        _ => match raw.trim().parse::<f64>() {
            Ok(number) => CellValue::Number(number),
            Err(_) => CellValue::raw(raw),
        },
    }
}
