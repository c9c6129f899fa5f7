//! Output formatting helpers for the `keg` CLI.

use serde::Serialize;
use std::io::{self, Write};

use keg_build::InstallReceipt;

/// Print a value as pretty-printed JSON to stdout.
///
/// Terminates the process with exit code 1 if serialization fails.
pub fn output_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            // Ignore broken pipe errors (e.g., piped to `head`)
            let _ = writeln!(handle, "{}", json);
        }
        Err(e) => {
            eprintln!("Error: failed to serialize JSON: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print a simple table with headers and rows.
///
/// Column widths are computed from the data for alignment.
pub fn output_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = write!(handle, "{}", format_table(headers, rows));
}

fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    push_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        match widths.get(i) {
            Some(width) => line.push_str(&format!("{:<width$}", cell, width = *width)),
            None => line.push_str(cell),
        }
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

/// An install receipt as JSON, including the keg prefix the file itself omits.
pub fn receipt_json(receipt: &InstallReceipt) -> serde_json::Value {
    let mut value = serde_json::to_value(receipt).unwrap_or_default();
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "prefix".into(),
            receipt.prefix.display().to_string().into(),
        );
    }
    value
}

/// Format an install receipt as a row for `keg list`.
pub fn format_receipt_row(receipt: &InstallReceipt) -> Vec<String> {
    vec![
        receipt.name.clone(),
        receipt.version.clone(),
        receipt.installed_at.format("%Y-%m-%d %H:%M").to_string(),
        receipt.prefix.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn table_aligns_columns() {
        let rows = vec![
            vec!["mattext".into(), "0.8".into()],
            vec!["argp-standalone".into(), "1.5.0".into()],
        ];
        let table = format_table(&["NAME", "VERSION"], &rows);
        assert_eq!(
            table,
            "NAME             VERSION\n\
             ---------------  -------\n\
             mattext          0.8\n\
             argp-standalone  1.5.0\n"
        );
    }

    #[test]
    fn empty_table_prints_nothing() {
        // Just ensure it doesn't panic
        output_table(&["NAME"], &[]);
    }
}
