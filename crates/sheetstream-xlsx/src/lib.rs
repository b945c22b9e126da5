//! # sheetstream-xlsx
//!
//! Streaming row reader for XLSX (Office Open XML) worksheets.
//!
//! A worksheet part is walked in one forward pass and rows come back lazily,
//! so arbitrarily long sheets are read in bounded memory. The source format
//! omits empty rows and cells entirely; the reader reconstructs the dense
//! grid, yielding one [`RowRecord`] per row index with every column key
//! present. Records are keyed positionally (`"0"`, `"1"`, ...) or by the
//! sheet's header row.
//!
//! ```no_run
//! use sheetstream_xlsx::SheetReader;
//!
//! # fn main() -> sheetstream_xlsx::XlsxResult<()> {
//! let mut reader = SheetReader::open("report.xlsx")?;
//! for row in reader.rows_with_header()? {
//!     let row = row?;
//!     println!("{:?}", row.get("Name"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod reader;

mod escapes;

pub use error::{XlsxError, XlsxResult};
pub use reader::{Rows, SharedStringTable, SheetReader};
pub use sheetstream_core::{CellAddress, CellValue, RowRecord, SharedString};
