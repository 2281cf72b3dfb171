use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::filter::{CommentFilter, COMMENT_SEPARATOR};
use super::types::{MergeableState, PrUrl, PullRequestMetadata};
use super::{parse_reference, PrError, PullRequestApi};
use crate::config::FetchConfig;
use crate::report::types::{CommentFlag, PrStatus, PullRequestRecord, UNKNOWN_AUTHOR};
use crate::run::RunLog;

/// Timing knobs for one PR's fetch sequence.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum metadata fetches while mergeable_state is "unknown"
    pub retries: u32,
    pub retry_delay: Duration,
    /// Pause between the metadata and comments calls
    pub api_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl FetchOptions {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            api_delay: Duration::from_millis(config.api_delay_ms),
        }
    }
}

/// Fetch one PR and turn it into a record. Never fails: malformed references
/// become `Invalid URL` records and every other failure becomes an `Error`
/// record carrying the failure message.
///
/// Classified and errored PRs each get one line in the run log.
#[instrument(skip_all, fields(reference = %reference))]
pub async fn fetch_and_classify<A: PullRequestApi + ?Sized>(
    api: &A,
    reference: &str,
    options: &FetchOptions,
    filter: &CommentFilter,
    log: &RunLog,
) -> PullRequestRecord {
    let pr_url = match parse_reference(reference) {
        Ok(pr_url) => pr_url,
        Err(PrError::InvalidUrl(_)) => {
            debug!("skipping malformed reference");
            return PullRequestRecord::invalid(reference);
        }
        Err(e) => {
            warn!(error = %e, "unusable reference");
            return PullRequestRecord::error(reference, e);
        }
    };

    let record = match classify(api, reference, &pr_url, options, filter).await {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, "failed to fetch pull request");
            PullRequestRecord::error(reference, e)
        }
    };

    if let Err(e) = log.record(&record) {
        warn!(path = %log.path().display(), error = %e, "failed to write run log entry");
    }
    record
}

async fn classify<A: PullRequestApi + ?Sized>(
    api: &A,
    reference: &str,
    pr_url: &PrUrl,
    options: &FetchOptions,
    filter: &CommentFilter,
) -> Result<PullRequestRecord, PrError> {
    let metadata = fetch_settled_metadata(api, pr_url, options).await?;
    let status = derive_status(&metadata);
    debug!(status = %status, "classified pull request");

    tokio::time::sleep(options.api_delay).await;

    let comments = api.issue_comments(pr_url).await?;
    let external = filter.external_bodies(&comments);
    debug!(total = comments.len(), external = external.len(), "filtered comments");

    let external_comment = CommentFlag::from_found(!external.is_empty());
    let external_comment_text = if external.is_empty() {
        "None".to_string()
    } else {
        external.join(COMMENT_SEPARATOR)
    };

    Ok(PullRequestRecord {
        reference: reference.to_string(),
        status,
        author: metadata.author().unwrap_or(UNKNOWN_AUTHOR).to_string(),
        external_comment,
        external_comment_text,
        created_at: metadata.created_at,
        mergeable_state: metadata.mergeable_state,
    })
}

/// GitHub computes mergeability in the background, so a fresh read often says
/// "unknown". Re-read up to `options.retries` fetches in total, waiting
/// `retry_delay` before each re-read, and keep whatever the last read returned.
async fn fetch_settled_metadata<A: PullRequestApi + ?Sized>(
    api: &A,
    pr_url: &PrUrl,
    options: &FetchOptions,
) -> Result<PullRequestMetadata, PrError> {
    let mut metadata = api.pull_request(pr_url).await?;
    let mut attempts = 1;
    while metadata.mergeable_state == Some(MergeableState::Unknown) && attempts < options.retries {
        debug!(attempt = attempts, "mergeable_state unknown, retrying");
        tokio::time::sleep(options.retry_delay).await;
        metadata = api.pull_request(pr_url).await?;
        attempts += 1;
    }
    Ok(metadata)
}

/// Closed-and-unmerged wins over everything, then merged; an open PR reports
/// its mergeability when GitHub provides one.
pub fn derive_status(metadata: &PullRequestMetadata) -> PrStatus {
    if metadata.is_closed() && !metadata.is_merged() {
        PrStatus::ClosedNotMerged
    } else if metadata.is_merged() {
        PrStatus::Merged
    } else {
        PrStatus::NotMerged(metadata.mergeable_state.clone())
    }
}
