//! Column-aligned text rendering of query results.
//!
//! Rows are printed without a header line. Each cell is left-justified and
//! padded to its column width, then followed by a single space, so every
//! line ends with a trailing space.

use crate::db::QueryResult;
use std::io::{self, Write};
use unicode_width::UnicodeWidthStr;

/// Computes one display width per column.
///
/// A column's width is the widest non-null value in it. A NULL cell counts
/// as the column label instead, so a column that holds NULLs is never
/// narrower than its label.
pub fn column_widths(result: &QueryResult) -> Vec<usize> {
    let mut widths = vec![0; result.column_count()];

    for row in &result.rows {
        for (i, width) in widths.iter_mut().enumerate() {
            let candidate = match row.get(i) {
                Some(Some(value)) => value.width(),
                _ => result.columns[i].name.width(),
            };
            *width = (*width).max(candidate);
        }
    }

    widths
}

/// Writes the result as aligned rows.
pub fn write_table<W: Write + ?Sized>(out: &mut W, result: &QueryResult) -> io::Result<()> {
    let widths = column_widths(result);

    for row in &result.rows {
        let mut line = String::new();
        for (i, width) in widths.iter().enumerate() {
            let value = row.get(i).and_then(|cell| cell.as_deref()).unwrap_or("");
            push_padded(&mut line, value, *width);
            line.push(' ');
        }
        writeln!(out, "{line}")?;
    }

    Ok(())
}

/// Renders the result to a string.
pub fn format_table(result: &QueryResult) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_table(&mut buf, result);
    String::from_utf8_lossy(&buf).into_owned()
}

fn push_padded(line: &mut String, value: &str, width: usize) {
    line.push_str(value);
    let padding = width.saturating_sub(value.width());
    line.extend(std::iter::repeat(' ').take(padding));
}
