use anyhow::Context;
use serde::Serialize;
use std::path::Path;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// Pretty JSON to `path`, or stdout when no path is given.
pub fn emit_json<T: Serialize>(value: &T, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let mut json = serde_json::to_string_pretty(value)?;
            json.push('\n');
            taptik_core::io::atomic_write(path, json.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))
        }
        None => print_json(value),
    }
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

/// Print conversion warnings and lossy features on stderr.
pub fn print_notes(warnings: &[String], unsupported: &[String]) {
    for w in warnings {
        eprintln!("warning: {w}");
    }
    if !unsupported.is_empty() {
        eprintln!("not converted: {}", unsupported.join(", "));
    }
}
