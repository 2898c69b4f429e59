//! Text `2DA V2.0` tables.
//!
//! A 2DA file is a whitespace-separated grid:
//!
//! ```text
//! 2DA V2.0
//! DEFAULT: ****
//!        Label       Name     HitDie
//! 0      Barbarian   5213     12
//! 1      "Bard Two"  ****     6
//! ```
//!
//! The first token of every row is its index and is ignored; rows are addressed by
//! their position in the file. `****` marks an empty cell. Column lookup is
//! case-insensitive.

use crate::error::{FormatError, Result};
use crate::schema::{RowView, TableSchema};
use serde::{Deserialize, Serialize};

/// The empty-cell marker.
pub const EMPTY_CELL: &str = "****";

const HEADER: &str = "2DA V2.0";

/// A parsed 2DA table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TwoDaTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    default_value: Option<String>,
}

impl TwoDaTable {
    /// Create an empty table with the given column names.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            default_value: None,
        }
    }

    /// Parse a table from raw file bytes.
    ///
    /// Bytes are decoded lossily; hand-edited tables frequently contain stray
    /// Windows-1252 characters and those must not make the whole table unreadable.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes);
        let mut lines = text.lines();

        let header = lines
            .next()
            .ok_or(FormatError::Truncated("2DA header"))?
            .trim_start_matches('\u{feff}')
            .trim();
        if !header.starts_with("2DA") {
            return Err(FormatError::InvalidMagic {
                expected: "2DA",
                found: header.chars().take(16).collect(),
            });
        }
        let version = header.trim_start_matches("2DA").trim();
        if !version.is_empty() && version != "V2.0" {
            return Err(FormatError::UnsupportedVersion {
                format: "2DA",
                version: version.to_string(),
            });
        }

        let mut default_value = None;
        let columns = loop {
            let line = lines
                .next()
                .ok_or(FormatError::Truncated("2DA column header"))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("DEFAULT:") {
                default_value = tokenize(rest).into_iter().next().and_then(cell_value);
                continue;
            }
            break tokenize(trimmed);
        };

        if columns.is_empty() {
            return Err(FormatError::Malformed("2DA has no columns".to_string()));
        }

        let mut rows = Vec::new();
        for line in lines {
            let mut tokens = tokenize(line).into_iter();
            // Leading token is the row label.
            if tokens.next().is_none() {
                continue;
            }
            let mut row: Vec<Option<String>> = tokens.map(cell_value).collect();
            if row.len() > columns.len() {
                tracing::trace!(
                    "2DA row {} has {} extra cell(s), truncating",
                    rows.len(),
                    row.len() - columns.len()
                );
            }
            row.resize(columns.len(), None);
            rows.push(row);
        }

        Ok(Self {
            columns,
            rows,
            default_value,
        })
    }

    /// Render the table back to `2DA V2.0` text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER);
        out.push('\n');
        match &self.default_value {
            Some(value) => {
                out.push_str("DEFAULT: ");
                out.push_str(&quote(value));
                out.push('\n');
            }
            None => out.push('\n'),
        }

        out.push_str("   ");
        for column in &self.columns {
            out.push(' ');
            out.push_str(&quote(column));
        }
        out.push('\n');

        for (index, row) in self.rows.iter().enumerate() {
            out.push_str(&index.to_string());
            for cell in row {
                out.push(' ');
                match cell {
                    Some(value) => out.push_str(&quote(value)),
                    None => out.push_str(EMPTY_CELL),
                }
            }
            out.push('\n');
        }
        out
    }

    /// Append a row. Missing trailing cells are filled with empty cells.
    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let mut row: Vec<Option<String>> = cells.into_iter().map(|c| c.map(Into::into)).collect();
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Find a column by name, ignoring ASCII case.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Cell value by row and column name. Empty cells return `None`.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.get_by_index(row, col)
    }

    /// Cell value by row and column position. Empty cells return `None`.
    pub fn get_by_index(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    /// Cell value parsed as an integer. Accepts `0x`-prefixed hexadecimal.
    pub fn get_int(&self, row: usize, column: &str) -> Option<i64> {
        parse_int(self.get(row, column)?)
    }

    pub fn get_float(&self, row: usize, column: &str) -> Option<f64> {
        self.get(row, column)?.trim().parse().ok()
    }

    /// First row whose `column` equals `value` (ASCII case-insensitive).
    pub fn find_row(&self, column: &str, value: &str) -> Option<usize> {
        let col = self.column_index(column)?;
        self.rows.iter().position(|row| {
            row.get(col)
                .and_then(|c| c.as_deref())
                .is_some_and(|c| c.eq_ignore_ascii_case(value))
        })
    }

    /// Borrow a single row for schema decoding.
    pub fn row(&self, row: usize) -> Option<RowView<'_>> {
        (row < self.rows.len()).then(|| RowView::new(self, row))
    }

    /// Decode every row into a typed schema.
    ///
    /// Required columns are checked once up front; optional columns that are missing
    /// or empty fall back to the schema's defaults.
    pub fn rows_as<T: TableSchema>(&self) -> Result<Vec<T>> {
        for &column in T::REQUIRED_COLUMNS {
            if self.column_index(column).is_none() {
                return Err(FormatError::MissingColumn {
                    schema: T::TABLE_NAME,
                    column,
                });
            }
        }
        Ok((0..self.rows.len())
            .map(|row| T::from_row(&RowView::new(self, row)))
            .collect())
    }

    /// Rough in-memory footprint, used for cache accounting.
    pub fn approx_size(&self) -> usize {
        let columns: usize = self.columns.iter().map(|c| c.len() + 24).sum();
        let cells: usize = self
            .rows
            .iter()
            .map(|row| {
                24 + row
                    .iter()
                    .map(|cell| 24 + cell.as_ref().map_or(0, String::len))
                    .sum::<usize>()
            })
            .sum();
        std::mem::size_of::<Self>() + columns + cells
    }
}

pub(crate) fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).ok();
    }
    value.parse().ok()
}

fn cell_value(token: String) -> Option<String> {
    if token == EMPTY_CELL {
        None
    } else {
        Some(token)
    }
}

fn quote(value: &str) -> String {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// Split a line into tokens. Double-quoted tokens may contain whitespace.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };

        let mut token = String::new();
        if first == '"' {
            chars.next();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                token.push(c);
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                token.push(c);
            }
        }
        tokens.push(token);
    }

    tokens
}
