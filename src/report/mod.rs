pub mod sheet;
pub mod types;

pub use sheet::{write_results, InputSheet};
pub use types::{FlagColumn, RunSummary};

use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to read input workbook: {0}")]
    Read(#[from] calamine::Error),

    #[error("Input workbook {} has no worksheet", .0.display())]
    NoWorksheet(PathBuf),

    #[error("Failed to write result workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
}

/// Render the end-of-run summary table.
pub fn format_summary(summary: &RunSummary, output_dir: &Path) -> String {
    let rows = [
        ("Total PRs", summary.total),
        ("Merged PRs", summary.merged),
        ("Old & unmerged & no conflicts", summary.stale),
        ("PRs with external comments", summary.with_external_comments),
    ];
    let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let value_width = rows
        .iter()
        .map(|(_, value)| value.to_string().len())
        .max()
        .unwrap_or(1);
    let rule = format!("+{}+{}+", "-".repeat(label_width + 2), "-".repeat(value_width + 2));

    let mut out = String::new();
    out.push_str(&format!("Results saved to: {}\n\n", output_dir.display()));
    out.push_str(&rule);
    out.push('\n');
    for (label, value) in rows {
        out.push_str(&format!("| {label:<label_width$} | {value:>value_width$} |\n"));
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

/// Print the summary table to stdout.
pub fn print_summary(summary: &RunSummary, output_dir: &Path) {
    println!();
    println!("{}", "═══ Summary ═══".bold());
    print!("{}", format_summary(summary, output_dir));
}

/// Print the closing lines shown even when the run failed.
pub fn print_footer(folders: usize, elapsed: Duration) {
    println!();
    println!("Folders created today: {}", folders);
    println!("Execution time: {:.2} seconds", elapsed.as_secs_f64());
}

/// Print the banner for a run that aborted.
pub fn print_failure(error: &dyn std::error::Error) {
    eprintln!();
    eprintln!("{} {}", "═══ Run failed ═══".red().bold(), error.to_string().red());
}
