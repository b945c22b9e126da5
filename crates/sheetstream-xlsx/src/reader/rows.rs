//! Lazy worksheet row scanning
//!
//! [`Rows`] walks one worksheet part in a single forward pass and yields one
//! [`RowRecord`] per row index. The source format omits empty rows and cells
//! entirely, so the scanner reconstructs the dense grid: skipped row indices
//! come back as fully empty records, and cells a row omits surface under
//! their positional key as [`CellValue::Empty`].

use std::io::{BufReader, Read};
use std::iter::FusedIterator;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::error::{XlsxError, XlsxResult};
use crate::reader::attr_string;
use crate::reader::convert::convert_cell_value;
use crate::reader::shared_strings::SharedStringTable;
use sheetstream_core::{CellAddress, CellValue, RowRecord, SharedString};

/// The worksheet markup namespace; elements outside it are not sheet content.
const SPREADSHEET_NS: &[u8] = b"http://schemas.openxmlformats.org/spreadsheetml/2006/main";

fn in_main_ns(ns: &ResolveResult) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(n)) if *n == SPREADSHEET_NS)
}

/// What a preamble/sheet-data event asks of the scanner, extracted from the
/// event before the shared parse buffer is reused
enum Action {
    Nothing,
    EnterWorksheet,
    EnterSheetData,
    Dimension(Option<String>),
    Row {
        explicit: Option<u32>,
        self_closing: bool,
    },
}

/// Scan progress through the worksheet document
enum Stage {
    /// Nothing read yet; the root element has not been checked
    Start,
    /// Inside `<worksheet>`, before the sheet data
    Preamble,
    /// Inside `<sheetData>`, positioned between rows
    SheetData,
    /// Worksheet closed, stream exhausted, or a fatal error was yielded
    Finished,
}

/// Lazy iterator over the rows of one worksheet
///
/// Obtained from [`SheetReader`](crate::SheetReader), or directly via
/// [`Rows::scan`] for an already-extracted worksheet byte stream. The
/// iterator is single-pass and non-restartable; re-reading a sheet means
/// opening a fresh stream. Dropping it mid-scan releases the underlying
/// stream immediately.
///
/// Fatal errors (invalid worksheet metadata, broken XML or IO) are yielded
/// once as an `Err` item, after which the iterator is exhausted. Per-cell
/// problems never abort the scan: an undecodable cell reference falls back
/// to the sequential column counter, and in header mode a cell whose column
/// has no matching header is ignored (logged at warn level).
pub struct Rows<'a> {
    xml: NsReader<BufReader<Box<dyn Read + 'a>>>,
    strings: &'a SharedStringTable,
    header_row: bool,
    stage: Stage,
    /// End bound of the declared dimension, if any; never revised mid-scan
    bound: Option<CellAddress>,
    /// Header names by column index, captured from row 0 in header mode
    headers: Vec<Option<SharedString>>,
    /// Column index -> slot in a header-keyed record
    header_slots: Vec<Option<usize>>,
    /// Index of the most recently consumed row element
    last_row: Option<u32>,
    /// Empty records still owed for skipped row indices
    pending_empty: u32,
    /// Assembled record for the row that triggered the gap fill
    queued: Option<RowRecord>,
    /// Cache of stringified positional keys ("0", "1", ...)
    index_keys: Vec<SharedString>,
    buf: Vec<u8>,
}

impl<'a> Rows<'a> {
    /// Scan a worksheet byte stream against an existing shared-string table.
    ///
    /// The stream must start at the worksheet part's first byte. If its root
    /// element is not a worksheet in the spreadsheet namespace the sequence
    /// is empty, not an error.
    pub fn scan<S: Read + 'a>(
        source: S,
        strings: &'a SharedStringTable,
        header_row: bool,
    ) -> Self {
        let source: Box<dyn Read + 'a> = Box::new(source);
        Self {
            xml: NsReader::from_reader(BufReader::new(source)),
            strings,
            header_row,
            stage: Stage::Start,
            bound: None,
            headers: Vec::new(),
            header_slots: Vec::new(),
            last_row: None,
            pending_empty: 0,
            queued: None,
            index_keys: Vec::new(),
            buf: Vec::new(),
        }
    }

    /// Read events until a record is queued, the header row is consumed, or
    /// the sheet ends. `Ok(true)` means "made progress, check the queues".
    ///
    /// Events are distilled into an [`Action`] before any state changes so
    /// the borrow of the event buffer has ended by the time row or dimension
    /// handling needs the reader again.
    fn advance(&mut self) -> XlsxResult<bool> {
        loop {
            self.buf.clear();
            let (ns, event) = self.xml.read_resolved_event_into(&mut self.buf)?;

            let action = match self.stage {
                Stage::Start => match event {
                    Event::Start(e) => {
                        if in_main_ns(&ns) && e.local_name().as_ref() == b"worksheet" {
                            Action::EnterWorksheet
                        } else {
                            // Not a worksheet: nothing to read.
                            return Ok(false);
                        }
                    }
                    Event::Empty(_) | Event::Eof => return Ok(false),
                    // Declaration, comments, doctype
                    _ => Action::Nothing,
                },
                Stage::Preamble => match event {
                    Event::Start(e) if in_main_ns(&ns) => match e.local_name().as_ref() {
                        b"dimension" => Action::Dimension(attr_string(&e, b"ref")),
                        b"sheetData" => Action::EnterSheetData,
                        _ => Action::Nothing,
                    },
                    // A self-closing <sheetData/> carries no rows; keep scanning.
                    Event::Empty(e) if in_main_ns(&ns) => match e.local_name().as_ref() {
                        b"dimension" => Action::Dimension(attr_string(&e, b"ref")),
                        _ => Action::Nothing,
                    },
                    Event::End(e)
                        if in_main_ns(&ns) && e.local_name().as_ref() == b"worksheet" =>
                    {
                        return Ok(false);
                    }
                    Event::Eof => return Ok(false),
                    _ => Action::Nothing,
                },
                Stage::SheetData => match event {
                    Event::Start(e) if in_main_ns(&ns) => match e.local_name().as_ref() {
                        b"row" => Action::Row {
                            explicit: row_index_attr(&e),
                            self_closing: false,
                        },
                        _ => Action::Nothing,
                    },
                    Event::Empty(e) if in_main_ns(&ns) => match e.local_name().as_ref() {
                        b"row" => Action::Row {
                            explicit: row_index_attr(&e),
                            self_closing: true,
                        },
                        _ => Action::Nothing,
                    },
                    Event::End(e) if in_main_ns(&ns) => match e.local_name().as_ref() {
                        // A worksheet has a single sheetData section; once it
                        // closes no further rows can appear.
                        b"sheetData" | b"worksheet" => return Ok(false),
                        _ => Action::Nothing,
                    },
                    Event::Eof => return Ok(false),
                    _ => Action::Nothing,
                },
                Stage::Finished => return Ok(false),
            };

            match action {
                Action::Nothing => {}
                Action::EnterWorksheet => self.stage = Stage::Preamble,
                Action::EnterSheetData => self.stage = Stage::SheetData,
                Action::Dimension(reference) => self.read_dimension(reference)?,
                Action::Row {
                    explicit,
                    self_closing,
                } => return self.read_row(explicit, self_closing),
            }
        }
    }

    /// Record the declared dimension's end bound.
    ///
    /// A dimension element that is present but unusable is the one fatal
    /// metadata condition: without usable bounds the positional key set
    /// the declaration promises cannot be honored.
    fn read_dimension(&mut self, reference: Option<String>) -> XlsxResult<()> {
        let reference = reference.filter(|r| !r.is_empty()).ok_or_else(|| {
            XlsxError::InvalidSheetMetadata("worksheet dimension has no ref".into())
        })?;

        let end_ref = reference.split(':').nth(1).ok_or_else(|| {
            XlsxError::InvalidSheetMetadata(format!(
                "dimension ref '{}' has no end reference",
                reference
            ))
        })?;

        let end = CellAddress::parse(end_ref).map_err(|e| {
            XlsxError::InvalidSheetMetadata(format!(
                "invalid dimension end reference '{}': {}",
                end_ref, e
            ))
        })?;

        self.bound = Some(end);
        Ok(())
    }

    /// Consume one row element and queue its record.
    ///
    /// Skipped row indices before it are owed as empty records first; in
    /// header mode row 0 populates the header map and queues nothing.
    fn read_row(&mut self, explicit_index: Option<u32>, self_closing: bool) -> XlsxResult<bool> {
        let expected = self.last_row.map_or(0, |r| r + 1);
        let row_index = explicit_index.unwrap_or(expected);
        self.last_row = Some(row_index);

        let mut cells = Vec::new();
        if !self_closing {
            self.read_cells(&mut cells)?;
        }

        if self.header_row && row_index == 0 {
            self.install_headers(cells);
            return Ok(true);
        }

        if row_index > expected {
            self.pending_empty = row_index - expected;
        }
        self.queued = Some(self.build_record(cells));
        Ok(true)
    }

    /// Consume the cell children of the current row element.
    ///
    /// Each cell resolves to a zero-based column index: its `r` reference if
    /// decodable, otherwise the running counter for documents that omit
    /// references. The counter continues after the resolved index either way.
    fn read_cells(&mut self, cells: &mut Vec<(usize, CellValue)>) -> XlsxResult<()> {
        let mut next_col: usize = 0;

        let mut cell_ref: Option<String> = None;
        let mut cell_type: Option<String> = None;
        let mut raw_value: Option<String> = None;
        let mut inline_text: Option<String> = None;
        let mut in_cell = false;
        let mut in_value = false;
        let mut in_inline = false;
        let mut in_inline_text = false;

        loop {
            self.buf.clear();
            let (ns, event) = self.xml.read_resolved_event_into(&mut self.buf)?;

            match event {
                Event::Start(e) if in_main_ns(&ns) => match e.local_name().as_ref() {
                    b"c" => {
                        in_cell = true;
                        cell_ref = attr_string(&e, b"r");
                        cell_type = attr_string(&e, b"t");
                        raw_value = None;
                        inline_text = None;
                    }
                    b"v" if in_cell => in_value = true,
                    b"is" if in_cell => {
                        in_inline = true;
                        inline_text = Some(String::new());
                    }
                    b"t" if in_inline => in_inline_text = true,
                    _ => {}
                },
                Event::Empty(e) if in_main_ns(&ns) => {
                    // Self-closing cell: position advances, value is absent.
                    if e.local_name().as_ref() == b"c" {
                        let col = resolve_column(attr_string(&e, b"r").as_deref(), next_col);
                        next_col = col + 1;
                        cells.push((col, CellValue::Empty));
                    }
                }
                Event::End(e) if in_main_ns(&ns) => match e.local_name().as_ref() {
                    b"c" if in_cell => {
                        let col = resolve_column(cell_ref.as_deref(), next_col);
                        next_col = col + 1;

                        let raw = raw_value.take().or_else(|| inline_text.take());
                        let value = match raw.as_deref() {
                            Some(text) if !text.is_empty() => {
                                convert_cell_value(text, cell_type.as_deref(), self.strings)
                            }
                            _ => CellValue::Empty,
                        };
                        cells.push((col, value));
                        in_cell = false;
                    }
                    b"v" => in_value = false,
                    b"is" => in_inline = false,
                    b"t" if in_inline => in_inline_text = false,
                    b"row" => return Ok(()),
                    _ => {}
                },
                Event::Text(e) => {
                    if in_value {
                        if let Ok(text) = e.unescape() {
                            raw_value = Some(text.into_owned());
                        }
                    } else if in_inline_text {
                        if let Ok(text) = e.unescape() {
                            if let Some(acc) = inline_text.as_mut() {
                                acc.push_str(&text);
                            }
                        }
                    }
                }
                // Truncated stream: hand back what the row had.
                Event::Eof => return Ok(()),
                _ => {}
            }
        }
    }

    /// Capture row 0 as the header map (header mode only).
    fn install_headers(&mut self, cells: Vec<(usize, CellValue)>) {
        for (col, value) in cells {
            if self.headers.len() <= col {
                self.headers.resize(col + 1, None);
            }
            self.headers[col] = Some(SharedString::new(value.to_string()));
        }

        let mut slot = 0;
        self.header_slots = self
            .headers
            .iter()
            .map(|h| {
                h.as_ref().map(|_| {
                    let s = slot;
                    slot += 1;
                    s
                })
            })
            .collect();
    }

    /// Place resolved cells into a fresh record.
    fn build_record(&mut self, cells: Vec<(usize, CellValue)>) -> RowRecord {
        let mut record = self.blank_record();

        if self.header_row {
            for (col, value) in cells {
                match self.header_slots.get(col).copied().flatten() {
                    Some(slot) => {
                        if let Some(v) = record.value_mut(slot) {
                            *v = value;
                        }
                    }
                    None => log::warn!(
                        "ignoring cell at column {} of row {}: no header for that column",
                        col,
                        self.last_row.unwrap_or(0)
                    ),
                }
            }
        } else {
            for (col, value) in cells {
                // Cells past the declared width (or with no declaration at
                // all) extend the record rather than being dropped.
                while record.len() <= col {
                    let key = self.index_key(record.len());
                    record.push(key, CellValue::Empty);
                }
                if let Some(v) = record.value_mut(col) {
                    *v = value;
                }
            }
        }

        record
    }

    /// A fully empty record with this scan's key set.
    fn blank_record(&mut self) -> RowRecord {
        if self.header_row {
            RowRecord::with_keys(self.headers.iter().flatten().cloned())
        } else {
            let width = self.bound.map_or(0, |b| b.col as usize + 1);
            let mut keys = Vec::with_capacity(width);
            for i in 0..width {
                keys.push(self.index_key(i));
            }
            RowRecord::with_keys(keys)
        }
    }

    fn index_key(&mut self, index: usize) -> SharedString {
        while self.index_keys.len() <= index {
            self.index_keys
                .push(SharedString::new(self.index_keys.len().to_string()));
        }
        self.index_keys[index].clone()
    }
}

/// Zero-based row index from a row element's `r` attribute (1-based in the
/// source), if present and usable.
fn row_index_attr(e: &BytesStart) -> Option<u32> {
    attr_string(e, b"r")
        .and_then(|r| r.trim().parse::<u32>().ok())
        .and_then(|r| r.checked_sub(1))
}

/// Zero-based column index for a cell: its decoded `r` reference, or the
/// sequential fallback when the reference is absent or undecodable.
fn resolve_column(reference: Option<&str>, next_col: usize) -> usize {
    match reference.map(CellAddress::parse) {
        Some(Ok(addr)) => addr.col as usize,
        Some(Err(e)) => {
            log::debug!("falling back to sequential column index: {}", e);
            next_col
        }
        None => next_col,
    }
}

impl Iterator for Rows<'_> {
    type Item = XlsxResult<RowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pending_empty > 0 {
                self.pending_empty -= 1;
                return Some(Ok(self.blank_record()));
            }
            if let Some(record) = self.queued.take() {
                return Some(Ok(record));
            }
            if matches!(self.stage, Stage::Finished) {
                return None;
            }

            match self.advance() {
                Ok(true) => {}
                Ok(false) => {
                    self.stage = Stage::Finished;
                    return None;
                }
                Err(e) => {
                    self.stage = Stage::Finished;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl FusedIterator for Rows<'_> {}
