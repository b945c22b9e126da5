//! Cell-related types
//!
//! This module contains:
//! - [`CellValue`] - The value read from a cell
//! - [`CellAddress`] - A cell's position (e.g., "C5")
//! - [`SharedString`] - Cheaply clonable interned string

mod address;
mod value;

pub use address::CellAddress;
pub use value::{CellValue, SharedString};
