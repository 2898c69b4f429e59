//! Readers and writers for Neverwinter Nights 2 data formats.
//!
//! - [`TwoDaTable`]: text `2DA V2.0` rule tables, with typed row decoding through
//!   [`TableSchema`].
//! - [`TlkTable`] / [`TlkBuilder`]: binary `TLK V3.0` string tables.
//! - [`ErfIndex`] / [`ErfBuilder`]: ERF-family containers (`.erf`, `.hak`, `.mod`).
//!
//! # Example
//!
//! ```
//! use nwn2_formats::TwoDaTable;
//!
//! let table = TwoDaTable::parse(b"2DA V2.0\n\nLabel HitDie\n0 Barbarian 12\n").unwrap();
//! assert_eq!(table.get(0, "label"), Some("Barbarian"));
//! assert_eq!(table.get_int(0, "HitDie"), Some(12));
//! ```

pub mod erf;
pub mod error;
pub mod restype;
pub mod schema;
pub mod tlk;
pub mod twoda;

pub use erf::{ErfBuilder, ErfEntry, ErfIndex, ErfVersion};
pub use error::{FormatError, Result};
pub use restype::{extension_for_type, type_for_extension};
pub use schema::{ClassRow, FeatRow, RaceRow, RowView, TableSchema};
pub use tlk::{TlkBuilder, TlkTable};
pub use twoda::TwoDaTable;
