//! Shared-string table loading

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::escapes::decode_escapes;
use sheetstream_core::SharedString;

/// The workbook's string-interning table (`xl/sharedStrings.xml`)
///
/// String-typed cells carry an index into this table instead of their text.
/// The table mirrors the order items appear in the part. Lookups are partial:
/// a malformed cell may reference an index that was never defined, and the
/// caller decides how to degrade.
#[derive(Debug, Default)]
pub struct SharedStringTable {
    strings: Vec<SharedString>,
}

impl SharedStringTable {
    /// Load the table by streaming over the shared-strings part.
    ///
    /// Each `<si>` item contributes one entry at the next ordinal index; the
    /// text of all its `<t>` runs (plain and rich alike) is concatenated and
    /// escape sequences are decoded. No deduplication or validation happens
    /// here.
    pub fn read<R: BufRead>(reader: R) -> XlsxResult<Self> {
        let mut xml = Reader::from_reader(reader);

        let mut buf = Vec::new();
        let mut strings = Vec::new();
        let mut current = String::new();
        let mut in_si = false;
        let mut in_t = false;

        loop {
            match xml.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current.clear();
                    }
                    b"t" if in_si => {
                        in_t = true;
                    }
                    _ => {}
                },
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        strings.push(SharedString::new(decode_escapes(&current)));
                        current.clear();
                        in_si = false;
                    }
                    b"t" => {
                        in_t = false;
                    }
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                    // A self-closing item still occupies an ordinal index.
                    strings.push(SharedString::new(""));
                }
                Ok(Event::Text(e)) if in_t => {
                    if let Ok(text) = e.unescape() {
                        current.push_str(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(Self { strings })
    }

    /// Look up a string by its ordinal index
    pub fn get(&self, index: usize) -> Option<&SharedString> {
        self.strings.get(index)
    }

    /// Number of entries in the table
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl<S: Into<SharedString>> FromIterator<S> for SharedStringTable {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            strings: iter.into_iter().map(Into::into).collect(),
        }
    }
}
