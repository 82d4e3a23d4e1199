use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::analyze::FingerprintRow;
use crate::error::AppError;

pub const HEADERS: [&str; 10] = [
    "Song",
    "Artist",
    "Genre",
    "Release Date",
    "Fingerprint",
    "Energy",
    "Valence",
    "Intensity",
    "Complexity",
    "Size",
];

fn cells(row: &FingerprintRow) -> Vec<String> {
    let mut cells = vec![
        row.song.clone(),
        row.artist.clone(),
        row.genre.clone(),
        row.release_date.clone(),
        "Fingerprint:".to_string(),
    ];
    cells.extend(row.fingerprint.readings().iter().map(|r| r.label()));
    cells
}

fn format_line(cols: &[String], widths: &[usize]) -> String {
    cols.iter()
        .zip(widths)
        .map(|(col, width)| format!("{:<width$}", col, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

/// Renders rows as a fixed-width table. Each column is as wide as its
/// longest cell, header included.
pub fn render_table(rows: &[FingerprintRow]) -> String {
    let body: Vec<Vec<String>> = rows.iter().map(cells).collect();
    let widths: Vec<usize> = HEADERS
        .iter()
        .enumerate()
        .map(|(i, header)| {
            body.iter()
                .map(|cells| cells[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let headers: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    let mut out = String::new();
    out.push_str(&format_line(&headers, &widths));
    out.push('\n');
    out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 3 * (HEADERS.len() - 1)));
    out.push('\n');
    for cells in &body {
        out.push_str(&format_line(cells, &widths));
        out.push('\n');
    }
    out
}

pub fn write_json(rows: &[FingerprintRow], path: &Path) -> Result<(), AppError> {
    let json_content = serde_json::to_string_pretty(rows)?;
    let mut file = File::create(path)?;
    file.write_all(json_content.as_bytes())?;
    Ok(())
}
