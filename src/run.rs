use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::report::types::PullRequestRecord;

pub const RESULT_FILE: &str = "PR_Check_Result.xlsx";
pub const LOG_FILE: &str = "PR_check_log.txt";
const RUN_PREFIX: &str = "Run_";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to create output folder {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to open run log {}: {source}", .path.display())]
    OpenLog { path: PathBuf, source: io::Error },

    #[error("Failed to list run folders in {}: {source}", .path.display())]
    ListRuns { path: PathBuf, source: io::Error },
}

/// Everything one audit run writes to: its output folder, its log, and when it began.
#[derive(Debug)]
pub struct RunContext {
    /// `<base>/<YYYY-MM-DD>/Run_<HHMMSS>`
    pub output_dir: PathBuf,
    pub log: RunLog,
    pub started_at: DateTime<Local>,
}

impl RunContext {
    /// Create the run folder and its log, then drop the oldest run folders of
    /// the day so at most `keep_runs` remain.
    pub fn create(
        base: &Path,
        keep_runs: usize,
        started_at: DateTime<Local>,
    ) -> Result<Self, RunError> {
        let date_dir = date_dir(base, started_at);
        let output_dir = date_dir.join(format!("{RUN_PREFIX}{}", started_at.format("%H%M%S")));
        fs::create_dir_all(&output_dir).map_err(|source| RunError::CreateDir {
            path: output_dir.clone(),
            source,
        })?;

        let removed = prune_old_runs(&date_dir, keep_runs.max(1))?;
        if !removed.is_empty() {
            debug!(removed = removed.len(), "pruned old run folders");
        }

        let log = RunLog::create(&output_dir.join(LOG_FILE))?;
        info!(output_dir = %output_dir.display(), "created run folder");

        Ok(Self {
            output_dir,
            log,
            started_at,
        })
    }

    pub fn result_path(&self) -> PathBuf {
        self.output_dir.join(RESULT_FILE)
    }
}

/// The dated folder that run folders started at `at` live in.
pub fn date_dir(base: &Path, at: DateTime<Local>) -> PathBuf {
    base.join(at.format("%Y-%m-%d").to_string())
}

/// Delete the oldest `Run_*` folders in `dir` until at most `keep` remain.
/// Folder names sort chronologically. A folder that cannot be removed is
/// reported and skipped.
pub fn prune_old_runs(dir: &Path, keep: usize) -> Result<Vec<PathBuf>, RunError> {
    let list_err = |source| RunError::ListRuns {
        path: dir.to_path_buf(),
        source,
    };

    let mut runs = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        let is_run = entry.file_name().to_string_lossy().starts_with(RUN_PREFIX);
        if is_run && entry.path().is_dir() {
            runs.push(entry.path());
        }
    }
    runs.sort();

    let excess = runs.len().saturating_sub(keep);
    let mut removed = Vec::with_capacity(excess);
    for path in runs.into_iter().take(excess) {
        match fs::remove_dir_all(&path) {
            Ok(()) => removed.push(path),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to delete old run folder"),
        }
    }
    Ok(removed)
}

/// Number of entries directly inside `dir`, or 0 if it cannot be read.
pub fn count_entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Append-only, line-per-PR log file shared by every fetch task.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl RunLog {
    pub fn create(path: &Path) -> Result<Self, RunError> {
        let file = File::create(path).map_err(|source| RunError::OpenLog {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one `[timestamp] <reference> -> <status>, External: <flag>` line.
    pub fn record(&self, record: &PullRequestRecord) -> io::Result<()> {
        let line = format_entry(Local::now(), record);
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("run log lock poisoned"))?;
        file.write_all(line.as_bytes())
    }
}

fn format_entry(at: DateTime<Local>, record: &PullRequestRecord) -> String {
    format!(
        "[{}] {} -> {}, External: {}\n",
        at.format("%Y-%m-%d %H:%M:%S%.6f"),
        record.reference,
        record.status,
        record.external_comment
    )
}
