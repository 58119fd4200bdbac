//! Spreadsheet rendering: every sheet becomes a `--- Sheet: <name> ---` header
//! followed by one tab-joined line per row.

use std::fmt::Write as _;
use std::io::Cursor;

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto_from_rs};

/// Sheet name given to the single sheet of a CSV file.
pub const CSV_SHEET_NAME: &str = "Sheet1";

/// Render all sheets of an xlsx/xls workbook held in memory.
pub fn workbook_text(bytes: Vec<u8>) -> Result<String> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).context("Cannot open workbook")?;

    let mut out = String::new();
    for name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("Cannot read sheet '{name}'"))?;
        push_header(&mut out, &name);
        for row in range.rows() {
            push_row(&mut out, row.iter().map(cell_to_string));
        }
    }
    Ok(out)
}

/// Render CSV text as a single sheet.
pub fn csv_text(text: &str) -> String {
    let mut out = String::new();
    push_header(&mut out, CSV_SHEET_NAME);
    for record in parse_csv(text) {
        push_row(&mut out, record.into_iter());
    }
    out
}

fn push_header(out: &mut String, name: &str) {
    let _ = writeln!(out, "--- Sheet: {name} ---");
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>) {
    let line = cells.collect::<Vec<_>>().join("\t");
    out.push_str(&line);
    out.push('\n');
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Minimal RFC 4180 reader: quoted fields, doubled quotes, embedded
/// separators and newlines. CRLF and LF line endings are both accepted.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            other => field.push(other),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::fixtures;

    #[test]
    fn workbook_renders_every_sheet_in_order() {
        let first: &[&[&str]] = &[&["Name", "Score"], &["Ada", "2.5"], &["Linus", "3"]];
        let second: &[&[&str]] = &[&["only"]];
        let bytes = fixtures::xlsx(&[("First", first), ("Second", second)]);
        assert_eq!(
            workbook_text(bytes).unwrap(),
            "--- Sheet: First ---\nName\tScore\nAda\t2.5\nLinus\t3\n--- Sheet: Second ---\nonly\n"
        );
    }

    #[test]
    fn non_workbook_bytes_are_rejected() {
        let err = workbook_text(b"name,score\n".to_vec()).unwrap_err();
        assert!(err.to_string().starts_with("Cannot open workbook"));
    }

    #[test]
    fn csv_plain_rows() {
        assert_eq!(
            csv_text("a,b,c\n1,2,3\n"),
            "--- Sheet: Sheet1 ---\na\tb\tc\n1\t2\t3\n"
        );
    }

    #[test]
    fn csv_quotes_and_crlf() {
        let records = parse_csv("name,quote\r\n\"Doe, J\",\"say \"\"hi\"\"\"\r\n");
        assert_eq!(
            records,
            vec![
                vec!["name".to_string(), "quote".to_string()],
                vec!["Doe, J".to_string(), "say \"hi\"".to_string()],
            ]
        );
    }

    #[test]
    fn csv_embedded_newline_and_missing_trailing_newline() {
        let records = parse_csv("\"line1\nline2\",x\nlast,");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][0], "line1\nline2");
        assert_eq!(records[1], vec!["last".to_string(), String::new()]);
    }

    #[test]
    fn csv_blank_lines_are_kept_as_empty_rows() {
        assert_eq!(csv_text("a\n\nb\n"), "--- Sheet: Sheet1 ---\na\n\nb\n");
    }

    #[test]
    fn empty_cells_render_empty() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String("x".into())), "x");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
    }
}
