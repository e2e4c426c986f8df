//! Terminal output: notes, tables and the config report.

use std::io::Write;

use switchboard_config::ValidationReport;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok() || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn note(color: &str, symbol: &str, plain: &str, msg: &str) -> String {
    if supports_color() {
        format!("{color}{BOLD}{symbol}{RESET} {msg}")
    } else {
        format!("{plain}: {msg}")
    }
}

pub fn note_info(msg: &str) {
    eprintln!("{}", note(CYAN, "ℹ", "INFO", msg));
}

pub fn note_warn(msg: &str) {
    eprintln!("{}", note(YELLOW, "⚠", "WARN", msg));
}

pub fn note_error(msg: &str) {
    eprintln!("{}", note(RED, "✗", "ERROR", msg));
}

pub fn note_success(msg: &str) {
    eprintln!("{}", note(GREEN, "✓", "OK", msg));
}

/// Print every warning and error of a config report.
pub fn print_report(report: &ValidationReport) {
    for warning in &report.warnings {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }
    for error in &report.errors {
        note_error(&format!("{}: {}", error.path, error.message));
    }
}

/// Render rows under left-aligned headers, padding by visible width.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(strip_ansi(cell).chars().count());
        }
    }

    let line = |cells: Vec<String>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let pad = width.saturating_sub(strip_ansi(cell).chars().count());
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect();
        format!("  {}\n", padded.join("  ").trim_end())
    };

    let mut out = String::new();
    out.push_str(&line(headers.iter().map(|h| format!("{BOLD}{h}{RESET}")).collect()));
    out.push_str(&line(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        let cells = (0..headers.len()).map(|i| row.get(i).cloned().unwrap_or_default()).collect();
        out.push_str(&line(cells));
    }
    out
}

/// Write a chunk and flush it.
pub fn stream_write(writer: &mut impl Write, chunk: &str) -> std::io::Result<()> {
    writer.write_all(chunk.as_bytes())?;
    writer.flush()
}
