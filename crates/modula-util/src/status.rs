//! Status lines for the command-line front end.
//!
//! Labels are right-aligned to 12 columns and written to stderr so that
//! stdout carries only command output.

use std::io::Write;

use console::Style;

/// Print a status line with a bold green label: `    Resolved 3 module(s)`
pub fn status(label: &str, message: &str) {
    write_status(Style::new().green().bold(), label, message);
}

/// Like [`status`] with a bold yellow label.
pub fn status_warn(label: &str, message: &str) {
    write_status(Style::new().yellow().bold(), label, message);
}

/// Format one status line without styling.
pub fn format_status(label: &str, message: &str) -> String {
    format!("{label:>12} {message}")
}

fn write_status(style: Style, label: &str, message: &str) {
    let _ = writeln!(
        std::io::stderr(),
        "{:>12} {message}",
        style.apply_to(label),
    );
}
