//! Plate data response parser
//!
//! After a triggered read the instrument sends the whole plate as one
//! ETX-terminated body. The data section starts at the first `01,01` (row 1,
//! column 1) and ends at the last CRLF. Rows are separated by `\r\n,` and each
//! row is a comma-joined run of `row,column,value` triples in column order.
//!
//! The grid always has 8 rows; a body that yields fewer is malformed.

use crate::error::{escape, AppResult, DaqError};
use serde::Serialize;

/// Rows on a plate, fixed by the instrument.
pub const PLATE_ROWS: usize = 8;

const DATA_START: &[u8] = b"01,01";
const ROW_SEPARATOR: &[u8] = b"\r\n,";
const CRLF: &[u8] = b"\r\n";

/// Per-well readings, row-major, 8 rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PlateMatrix {
    rows: Vec<Vec<f64>>,
}

impl PlateMatrix {
    /// Readings row by row.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Reading at zero-based `row`, `column`.
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.rows.get(row)?.get(column).copied()
    }

    /// Columns in the widest row.
    pub fn columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn split<'a>(data: &'a [u8], separator: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
    let mut rest = Some(data);
    std::iter::from_fn(move || {
        let current = rest?;
        match find(current, separator) {
            Some(i) => {
                rest = Some(&current[i + separator.len()..]);
                Some(&current[..i])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

fn parse_row(row: &[u8], index: usize) -> AppResult<Vec<f64>> {
    let fields: Vec<&[u8]> = row.split(|&b| b == b',').collect();
    if fields.len() % 3 != 0 {
        return Err(DaqError::Protocol(format!(
            "row {} has {} fields, not a whole number of row,column,value groups: {}",
            index + 1,
            fields.len(),
            escape(row)
        )));
    }

    fields
        .chunks(3)
        .map(|group| {
            let text = std::str::from_utf8(group[2])
                .map_err(|_| DaqError::Protocol(format!("non-ASCII value in row {}", index + 1)))?;
            text.trim().parse::<f64>().map_err(|_| {
                DaqError::Protocol(format!(
                    "invalid value '{}' in row {}",
                    text.trim(),
                    index + 1
                ))
            })
        })
        .collect()
}

/// Decode a plate read body into an 8-row matrix.
pub fn parse_plate(body: &[u8]) -> AppResult<PlateMatrix> {
    let start = find(body, DATA_START)
        .ok_or_else(|| DaqError::Protocol("plate data start marker 01,01 not found".to_string()))?;
    let end = rfind(body, CRLF)
        .filter(|&end| end > start)
        .ok_or_else(|| DaqError::Protocol("plate data is not CRLF terminated".to_string()))?;

    let segments: Vec<&[u8]> = split(&body[start..end], ROW_SEPARATOR)
        .take(PLATE_ROWS)
        .collect();
    if segments.len() < PLATE_ROWS {
        return Err(DaqError::Protocol(format!(
            "expected {PLATE_ROWS} plate rows, got {}",
            segments.len()
        )));
    }

    let rows = segments
        .iter()
        .enumerate()
        .map(|(index, row)| parse_row(row, index))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(PlateMatrix { rows })
}
