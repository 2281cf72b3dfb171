use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};
use std::path::Path;
use tracing::{debug, instrument};

use super::types::{FlagColumn, PrStatus};
use super::ReportError;
use crate::batch::{AuditedPr, BatchOutcome};

/// Longest text a single spreadsheet cell can hold.
const MAX_CELL_CHARS: usize = 32_767;

const FONT: &str = "Segoe UI";
const MERGED_FILL: u32 = 0xC6EFCE;
const UNMERGED_FILL: u32 = 0xFFC7CE;
const NOT_PR_FILL: u32 = 0xD9D9D9;
const NOT_APPLICABLE: &str = "N/A";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
const DURATION_FORMAT: &str = "[h]:mm:ss";

/// The first worksheet of the input workbook, as a dense grid of cells.
#[derive(Debug, Clone, Default)]
pub struct InputSheet {
    cells: Vec<Vec<Data>>,
}

impl InputSheet {
    /// Read the first worksheet of `path`.
    #[instrument]
    pub fn read(path: &Path) -> Result<Self, ReportError> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ReportError::NoWorksheet(path.to_path_buf()))??;

        let (row0, col0) = range.start().unwrap_or((0, 0));
        let (row0, col0) = (row0 as usize, col0 as usize);
        let mut cells: Vec<Vec<Data>> = vec![Vec::new(); row0 + range.height()];
        for (r, row) in range.rows().enumerate() {
            let target = &mut cells[row0 + r];
            target.resize(col0, Data::Empty);
            target.extend(row.iter().cloned());
        }
        debug!(rows = cells.len(), "read input sheet");
        Ok(Self { cells })
    }

    #[cfg(test)]
    pub fn from_rows(cells: Vec<Vec<Data>>) -> Self {
        Self { cells }
    }

    /// Column 1 of every data row (row 2 onwards), as trimmed text.
    pub fn references(&self) -> Vec<String> {
        self.cells
            .iter()
            .skip(1)
            .map(|row| row.first().map(cell_text).unwrap_or_default())
            .collect()
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.cells.iter().map(Vec::len).max().unwrap_or(0).max(1)
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Strip characters spreadsheets reject and cap the length of a cell value.
/// Tabs and line breaks are kept.
pub fn clean_cell_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .take(MAX_CELL_CHARS)
        .collect()
}

/// Write `sheet` plus the four audit columns to a new workbook at `path`.
///
/// Row `n` of `outcome` annotates spreadsheet row `n + 2`.
#[instrument(skip(sheet, outcome))]
pub fn write_results(
    sheet: &InputSheet,
    outcome: &BatchOutcome,
    column: FlagColumn,
    path: &Path,
) -> Result<(), ReportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (r, row) in sheet.cells.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            write_cell(worksheet, r as u32, c as u16, cell)?;
        }
    }

    let plain = Format::new().set_font_name(FONT);
    let first = sheet.width() as u16;
    let (author_col, status_col, flag_col, content_col) = (first, first + 1, first + 2, first + 3);

    worksheet.write_string_with_format(0, 0, "PR URL", &plain)?;
    worksheet.write_string_with_format(0, author_col, "Author", &plain)?;
    worksheet.write_string_with_format(0, status_col, "Merged Status", &plain)?;
    worksheet.write_string_with_format(0, flag_col, column.header(), &plain)?;
    worksheet.write_string_with_format(0, content_col, "External Comments Content", &plain)?;

    let filled = |status: Option<&PrStatus>| {
        plain
            .clone()
            .set_background_color(Color::RGB(status_fill(status)))
    };
    let not_pr = filled(None);

    for index in 0..outcome.row_count() {
        let r = index as u32 + 1;
        match outcome.row(index) {
            None => {
                for c in [author_col, status_col, flag_col, content_col] {
                    worksheet.write_string_with_format(r, c, NOT_APPLICABLE, &not_pr)?;
                }
            }
            Some(AuditedPr { record, staleness }) => {
                let status_format = filled(Some(&record.status));
                let flag = match column {
                    FlagColumn::Stale => staleness.to_string(),
                    FlagColumn::External => record.external_comment.to_string(),
                };
                worksheet.write_string_with_format(r, author_col, &record.author, &plain)?;
                worksheet.write_string_with_format(r, status_col, record.status.to_string(), &status_format)?;
                worksheet.write_string_with_format(r, flag_col, flag, &plain)?;
                worksheet.write_string_with_format(
                    r,
                    content_col,
                    clean_cell_text(&record.external_comment_text),
                    &plain,
                )?;
            }
        }
    }

    worksheet.autofit();
    workbook.save(path)?;
    debug!(path = %path.display(), "saved result workbook");
    Ok(())
}

/// Background colour of the status cell: green for merged, red for anything
/// else, gray for rows that are not PRs.
fn status_fill(status: Option<&PrStatus>) -> u32 {
    match status {
        Some(status) if status.is_merged() => MERGED_FILL,
        Some(_) => UNMERGED_FILL,
        None => NOT_PR_FILL,
    }
}

/// Copy one input cell, keeping numbers, booleans and dates typed.
fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Data) -> Result<(), ReportError> {
    match cell {
        Data::Empty => {}
        Data::Int(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        Data::Float(f) => {
            worksheet.write_number(row, col, *f)?;
        }
        Data::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Data::String(s) => {
            worksheet.write_string(row, col, clean_cell_text(s))?;
        }
        Data::DateTime(dt) if dt.is_duration() => {
            let format = Format::new().set_num_format(DURATION_FORMAT);
            worksheet.write_number_with_format(row, col, dt.as_f64(), &format)?;
        }
        Data::DateTime(dt) => {
            let format = Format::new().set_num_format(DATETIME_FORMAT);
            match dt.as_datetime() {
                Some(at) => worksheet.write_datetime_with_format(row, col, &at, &format)?,
                None => worksheet.write_number_with_format(row, col, dt.as_f64(), &format)?,
            };
        }
        other => {
            worksheet.write_string(row, col, other.to_string())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{self, BatchSettings};
    use crate::config::Config;
    use crate::pr::mock::{comment, metadata, MockApi};
    use crate::run::{RunLog, LOG_FILE};
    use calamine::Range;
    use indicatif::ProgressBar;

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    fn read_back(path: &Path) -> Range<Data> {
        let mut workbook = open_workbook_auto(path).unwrap();
        workbook.worksheet_range_at(0).unwrap().unwrap()
    }

    fn value(range: &Range<Data>, row: u32, col: u32) -> String {
        range
            .get_value((row, col))
            .map(|d| d.to_string())
            .unwrap_or_default()
    }

    async fn audit(sheet: &InputSheet, log: &RunLog) -> BatchOutcome {
        let api = MockApi::default();
        api.add_pr(1, vec![metadata("closed", true, Some("clean"))], vec![comment("bob", "User", "ok\u{7}\nthanks")]);
        api.add_pr(2, vec![metadata("open", false, Some("clean"))], vec![]);
        let mut config = Config::default();
        config.fetch.api_delay_ms = 0;
        let settings = BatchSettings::from_config(&config);
        batch::run(&api, &sheet.references(), &settings, log, &ProgressBar::hidden()).await
    }

    fn input() -> InputSheet {
        InputSheet::from_rows(vec![
            vec![text("Link"), text("Owner")],
            vec![text("https://github.com/org/repo/pull/1"), text("team-a")],
            vec![text("not a pr"), Data::Float(3.5)],
            vec![text("https://github.com/org/repo/pull/2")],
            vec![text(" https://github.com/org/repo/pull/1 "), Data::Bool(true)],
        ])
    }

    #[test]
    fn test_references_skip_header_and_trim() {
        let refs = input().references();
        assert_eq!(refs.len(), 4);
        assert_eq!(refs[0], "https://github.com/org/repo/pull/1");
        assert_eq!(refs[3], "https://github.com/org/repo/pull/1");
        assert_eq!(input().width(), 2);
    }

    #[test]
    fn test_clean_cell_text() {
        assert_eq!(clean_cell_text("a\u{0}b\u{1b}c\u{85}d"), "abcd");
        assert_eq!(clean_cell_text("line\n---\nline\t"), "line\n---\nline\t");
        assert_eq!(clean_cell_text(&"x".repeat(40_000)).chars().count(), MAX_CELL_CHARS);
    }

    #[tokio::test]
    async fn test_write_results_stale_column() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::create(&dir.path().join(LOG_FILE)).unwrap();
        let sheet = input();
        let outcome = audit(&sheet, &log).await;
        let path = dir.path().join("out.xlsx");

        write_results(&sheet, &outcome, FlagColumn::Stale, &path).unwrap();
        let range = read_back(&path);

        assert_eq!(value(&range, 0, 0), "PR URL");
        assert_eq!(value(&range, 0, 1), "Owner");
        assert_eq!(value(&range, 0, 2), "Author");
        assert_eq!(value(&range, 0, 3), "Merged Status");
        assert_eq!(value(&range, 0, 4), "Old & Unmerged & No Conflicts");
        assert_eq!(value(&range, 0, 5), "External Comments Content");

        assert_eq!(value(&range, 1, 1), "team-a");
        assert_eq!(value(&range, 1, 2), "author");
        assert_eq!(value(&range, 1, 3), "Merged");
        assert_eq!(value(&range, 1, 4), "No");
        assert_eq!(value(&range, 1, 5), "ok\nthanks");

        for col in 2..=5 {
            assert_eq!(value(&range, 2, col), "N/A");
        }
        assert_eq!(range.get_value((2, 1)), Some(&Data::Float(3.5)));

        assert_eq!(value(&range, 3, 3), "Not merged (Mergeable)");
        assert_eq!(value(&range, 3, 4), "Yes");
        assert_eq!(value(&range, 3, 5), "None");

        // duplicate reference row gets the same annotation as row 2
        for col in 2..=5 {
            assert_eq!(value(&range, 4, col), value(&range, 1, col));
        }
        assert_eq!(range.get_value((4, 1)), Some(&Data::Bool(true)));
    }

    #[tokio::test]
    async fn test_write_results_external_column() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::create(&dir.path().join(LOG_FILE)).unwrap();
        let sheet = input();
        let outcome = audit(&sheet, &log).await;
        let path = dir.path().join("out.xlsx");

        write_results(&sheet, &outcome, FlagColumn::External, &path).unwrap();
        let range = read_back(&path);

        assert_eq!(value(&range, 0, 4), "Has External Comment");
        assert_eq!(value(&range, 1, 4), "Yes");
        assert_eq!(value(&range, 3, 4), "No");
    }

    #[test]
    fn test_read_round_trips_written_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.xlsx");
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "PR").unwrap();
        worksheet.write_string(1, 0, "https://github.com/org/repo/pull/7").unwrap();
        worksheet.write_string(3, 0, "https://github.com/org/repo/pull/8").unwrap();
        workbook.save(&path).unwrap();

        let sheet = InputSheet::read(&path).unwrap();
        assert_eq!(
            sheet.references(),
            vec![
                "https://github.com/org/repo/pull/7".to_string(),
                String::new(),
                "https://github.com/org/repo/pull/8".to_string(),
            ]
        );
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(InputSheet::read(&dir.path().join("missing.xlsx")).is_err());
    }

    #[test]
    fn test_status_fill() {
        assert_eq!(status_fill(Some(&PrStatus::Merged)), MERGED_FILL);
        assert_eq!(status_fill(Some(&PrStatus::NotMerged(None))), UNMERGED_FILL);
        assert_eq!(status_fill(Some(&PrStatus::ClosedNotMerged)), UNMERGED_FILL);
        assert_eq!(status_fill(Some(&PrStatus::InvalidUrl)), UNMERGED_FILL);
        assert_eq!(status_fill(Some(&PrStatus::Error)), UNMERGED_FILL);
        assert_eq!(status_fill(None), NOT_PR_FILL);
    }

    #[tokio::test]
    async fn test_write_results_keeps_dates_typed() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("in.xlsx");
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let date = rust_xlsxwriter::ExcelDateTime::from_ymd(2025, 3, 14).unwrap();
        worksheet.write_string(0, 0, "PR").unwrap();
        worksheet.write_string(0, 1, "Opened").unwrap();
        worksheet.write_string(1, 0, "https://github.com/org/repo/pull/1").unwrap();
        worksheet
            .write_datetime_with_format(1, 1, &date, &Format::new().set_num_format("yyyy-mm-dd"))
            .unwrap();
        workbook.save(&input_path).unwrap();

        let sheet = InputSheet::read(&input_path).unwrap();
        let log = RunLog::create(&dir.path().join(LOG_FILE)).unwrap();
        let outcome = audit(&sheet, &log).await;
        let path = dir.path().join("out.xlsx");
        write_results(&sheet, &outcome, FlagColumn::Stale, &path).unwrap();

        let range = read_back(&path);
        match range.get_value((1, 1)) {
            Some(Data::DateTime(dt)) => {
                assert!(dt.is_datetime());
                assert!((dt.as_f64() - 45730.0).abs() < 1e-9);
            }
            other => panic!("date cell not kept as a date: {other:?}"),
        }
        assert_eq!(value(&range, 1, 3), "Merged");
    }
}
