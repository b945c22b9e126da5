//! XLSX streaming reader

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};

pub(crate) mod convert;
pub mod rows;
pub mod shared_strings;

pub use rows::Rows;
pub use shared_strings::SharedStringTable;

/// Unescaped value of an attribute on a start tag, if present.
pub(crate) fn attr_string(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// One worksheet as cataloged by the workbook part
#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    path: String,
}

/// Streaming reader over the worksheets of an XLSX container
///
/// Opening a reader eagerly loads the shared-string table and the sheet
/// catalog. Worksheet parts themselves are only read while a [`Rows`]
/// iterator obtained from [`rows`](Self::rows), or one of its variants, is
/// pulled; each call opens a fresh stream over the part, so a sheet can be
/// re-scanned by asking for a new iterator.
pub struct SheetReader<R> {
    archive: zip::ZipArchive<R>,
    shared_strings: SharedStringTable,
    sheets: Vec<SheetEntry>,
}

impl SheetReader<BufReader<File>> {
    /// Open a workbook from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> SheetReader<R> {
    /// Open a workbook from a reader
    pub fn new(reader: R) -> XlsxResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;

        // Verify this is an XLSX container
        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "missing [Content_Types].xml".into(),
            ));
        }

        let shared_strings = match archive.by_name("xl/sharedStrings.xml") {
            Ok(part) => SharedStringTable::read(BufReader::new(part))?,
            // No shared strings is valid; string cells then degrade to
            // their raw index (see the value converter).
            Err(_) => SharedStringTable::default(),
        };

        let sheet_info = Self::read_workbook_xml(&mut archive)?;
        let sheet_paths = Self::read_workbook_rels(&mut archive)?;

        let sheets = sheet_info
            .into_iter()
            .filter_map(|(name, r_id)| {
                sheet_paths.get(&r_id).map(|path| SheetEntry {
                    name,
                    path: path.clone(),
                })
            })
            .collect();

        Ok(Self {
            archive,
            shared_strings,
            sheets,
        })
    }

    /// Names of the cataloged worksheets, in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// The shared-string table loaded from the workbook
    pub fn shared_strings(&self) -> &SharedStringTable {
        &self.shared_strings
    }

    /// Scan the first worksheet with positional keys (`"0"`, `"1"`, ...)
    pub fn rows(&mut self) -> XlsxResult<Rows<'_>> {
        self.rows_at(0, false)
    }

    /// Scan the first worksheet, keying rows by the header names in row 0.
    ///
    /// Row 0 itself is consumed for its names and never yielded.
    pub fn rows_with_header(&mut self) -> XlsxResult<Rows<'_>> {
        self.rows_at(0, true)
    }

    /// Scan a worksheet selected by name
    pub fn sheet_rows(&mut self, name: &str, header_row: bool) -> XlsxResult<Rows<'_>> {
        let index = self
            .sheets
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| XlsxError::SheetNotFound(name.to_string()))?;
        self.rows_at(index, header_row)
    }

    fn rows_at(&mut self, index: usize, header_row: bool) -> XlsxResult<Rows<'_>> {
        let entry = self.sheets.get(index).ok_or_else(|| {
            XlsxError::InvalidFormat("workbook contains no worksheets".into())
        })?;
        let path = entry.path.clone();
        let part = self
            .archive
            .by_name(&path)
            .map_err(|_| XlsxError::MissingPart(path))?;
        Ok(Rows::scan(part, &self.shared_strings, header_row))
    }

    /// Read workbook.xml to get sheet names and rIds
    fn read_workbook_xml(archive: &mut zip::ZipArchive<R>) -> XlsxResult<Vec<(String, String)>> {
        let part = archive
            .by_name("xl/workbook.xml")
            .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

        let mut xml = Reader::from_reader(BufReader::new(part));
        xml.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();

        loop {
            match xml.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.local_name().as_ref() == b"sheet" =>
                {
                    let name = attr_string(&e, b"name");
                    let r_id = attr_string(&e, b"r:id");
                    if let (Some(name), Some(r_id)) = (name, r_id) {
                        sheets.push((name, r_id));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(sheets)
    }

    /// Read workbook.xml.rels to map rIds to worksheet part paths
    fn read_workbook_rels(archive: &mut zip::ZipArchive<R>) -> XlsxResult<HashMap<String, String>> {
        let part = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .map_err(|_| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

        let mut xml = Reader::from_reader(BufReader::new(part));
        xml.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match xml.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let id = attr_string(&e, b"Id");
                    let target = attr_string(&e, b"Target");
                    let rel_type = attr_string(&e, b"Type");

                    // Only worksheet relationships matter here
                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        if rel_type.ends_with("/worksheet") {
                            // Target is relative to the xl/ folder
                            let full_path = if let Some(absolute) = target.strip_prefix('/') {
                                absolute.to_string()
                            } else {
                                format!("xl/{}", target)
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
}
