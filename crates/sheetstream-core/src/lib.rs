//! # sheetstream-core
//!
//! Core data structures for the sheetstream streaming spreadsheet reader:
//! - [`CellValue`] - Dynamically typed cell values (numbers, strings, booleans, dates)
//! - [`CellAddress`] - A1-style cell position decoding
//! - [`RowRecord`] - One sheet row as an ordered, keyed set of values
//!
//! ## Example
//!
//! ```rust
//! use sheetstream_core::{CellValue, RowRecord, SharedString};
//!
//! let mut row = RowRecord::new();
//! row.push(SharedString::new("Name"), CellValue::string("Ada"));
//! row.push(SharedString::new("Age"), CellValue::Number(36.0));
//!
//! assert_eq!(row.get("Name").and_then(CellValue::as_str), Some("Ada"));
//! assert_eq!(row.get("Age").and_then(CellValue::as_number), Some(36.0));
//! ```

pub mod cell;
pub mod error;
pub mod row;

// Re-exports for convenience
pub use cell::{CellAddress, CellValue, SharedString};
pub use error::{Error, Result};
pub use row::RowRecord;

/// Maximum number of rows in a worksheet (format limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (format limit)
pub const MAX_COLS: u16 = 16_384;
