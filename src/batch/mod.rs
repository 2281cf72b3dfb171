pub mod staleness;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use std::collections::HashMap;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::pr::{fetch_and_classify, CommentFilter, FetchOptions, PullRequestApi};
use crate::report::types::{CommentFlag, PullRequestRecord, RunSummary, StalenessFlag};
use crate::run::RunLog;

/// Everything the orchestrator needs besides the API and the log.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// A row is a PR reference only if its cell contains this marker
    pub host: String,
    /// Maximum PR tasks holding a slot at once
    pub concurrency: usize,
    pub stale_after_days: i64,
    pub fetch: FetchOptions,
    pub filter: CommentFilter,
}

impl BatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.github.host.clone(),
            concurrency: config.fetch.concurrency.max(1),
            stale_after_days: config.output.stale_after_days,
            fetch: FetchOptions::from_config(&config.fetch),
            filter: CommentFilter::from_config(&config.filter),
        }
    }
}

/// A unique PR's record plus the staleness flag derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditedPr {
    pub record: PullRequestRecord,
    pub staleness: StalenessFlag,
}

/// Input rows split into the unique references to fetch and, per row, the
/// index of its reference (None for rows that are not PRs).
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Partition {
    pub unique: Vec<String>,
    pub rows: Vec<Option<usize>>,
}

/// Deduplicate the PR references among `references`, keeping first-seen order.
pub fn partition(references: &[String], host: &str) -> Partition {
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    let mut out = Partition::default();

    for reference in references {
        if reference.is_empty() || !reference.contains(host) {
            out.rows.push(None);
            continue;
        }
        let index = *index_of.entry(reference.as_str()).or_insert_with(|| {
            out.unique.push(reference.clone());
            out.unique.len() - 1
        });
        out.rows.push(Some(index));
    }
    out
}

/// Result of a batch: one AuditedPr per unique reference and a row-to-PR map.
#[derive(Debug)]
pub struct BatchOutcome {
    /// In first-seen order
    pub prs: Vec<AuditedPr>,
    rows: Vec<Option<usize>>,
}

impl BatchOutcome {
    /// Annotation for input row `row`; None for non-PR rows. Rows that share a
    /// reference share the same AuditedPr.
    pub fn row(&self, row: usize) -> Option<&AuditedPr> {
        self.rows
            .get(row)
            .copied()
            .flatten()
            .and_then(|index| self.prs.get(index))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total: self.prs.len(),
            merged: self.prs.iter().filter(|p| p.record.status.is_merged()).count(),
            stale: self
                .prs
                .iter()
                .filter(|p| p.staleness == StalenessFlag::Yes)
                .count(),
            with_external_comments: self
                .prs
                .iter()
                .filter(|p| p.record.external_comment == CommentFlag::Yes)
                .count(),
        }
    }
}

/// Audit every PR referenced by `references` (one entry per spreadsheet row).
///
/// Each unique reference is fetched exactly once. A task takes a slot from the
/// gate before its first request and gives it back when it finishes, so at most
/// `settings.concurrency` PRs are in progress at once. Results are collected
/// in completion order; `progress` advances once per finished PR.
#[instrument(skip_all, fields(rows = references.len()))]
pub async fn run<A: PullRequestApi + ?Sized>(
    api: &A,
    references: &[String],
    settings: &BatchSettings,
    log: &RunLog,
    progress: &ProgressBar,
) -> BatchOutcome {
    let Partition { unique, rows } = partition(references, &settings.host);
    info!(unique = unique.len(), "auditing pull requests");
    progress.set_length(unique.len() as u64);

    let gate = Semaphore::new(settings.concurrency.max(1));
    let mut pending: FuturesUnordered<_> = unique
        .iter()
        .enumerate()
        .map(|(index, reference)| {
            let gate = &gate;
            async move {
                let record = match gate.acquire().await {
                    Ok(_slot) => {
                        fetch_and_classify(api, reference, &settings.fetch, &settings.filter, log).await
                    }
                    Err(e) => PullRequestRecord::error(reference, e),
                };
                (index, record)
            }
        })
        .collect();

    let mut records: Vec<Option<PullRequestRecord>> = unique.iter().map(|_| None).collect();
    let mut completed = 0usize;
    while let Some((index, record)) = pending.next().await {
        completed += 1;
        debug!(completed, total = unique.len(), reference = %record.reference, status = %record.status, "pull request done");
        progress.inc(1);
        records[index] = Some(record);
    }

    let now = Utc::now();
    let prs = records
        .into_iter()
        .zip(&unique)
        .map(|(record, reference)| {
            let record = record.unwrap_or_else(|| PullRequestRecord::error(reference, "task did not complete"));
            let staleness = staleness::staleness(&record, now, settings.stale_after_days);
            AuditedPr { record, staleness }
        })
        .collect();

    BatchOutcome { prs, rows }
}
