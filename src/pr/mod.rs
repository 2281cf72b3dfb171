pub mod client;
pub mod fetch;
pub mod filter;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use client::GitHubClient;
pub use fetch::{fetch_and_classify, FetchOptions};
pub use filter::CommentFilter;
pub use types::{IssueComment, PrUrl, PullRequestMetadata};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("GitHub API returned {status} for {url}{detail}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
        /// ": <message>" from the response body, or empty
        detail: String,
    },

    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid PR number in URL: {0}")]
    InvalidNumber(String),

    #[error("GitHub token not found in config or GITHUB_TOKEN environment variable")]
    MissingToken,
}

/// The two read-only GitHub endpoints the audit consumes.
///
/// Implementations must be Send + Sync; one instance is shared by every
/// in-flight PR task.
#[async_trait]
pub trait PullRequestApi: Send + Sync {
    /// GET /repos/{owner}/{repo}/pulls/{number}
    async fn pull_request(&self, pr: &PrUrl) -> Result<PullRequestMetadata, PrError>;

    /// GET /repos/{owner}/{repo}/issues/{number}/comments (first page only)
    async fn issue_comments(&self, pr: &PrUrl) -> Result<Vec<IssueComment>, PrError>;
}

/// Minimum number of `/`-separated segments in a usable reference:
/// `https:`, ``, host, owner, repo, `pull`, number.
const MIN_REFERENCE_SEGMENTS: usize = 7;

/// Split a PR reference such as `https://github.com/org/repo/pull/42` into
/// owner, repo and number.
///
/// Anything with fewer than seven segments is `InvalidUrl`. The path word at
/// position 5 is not checked, and a query or fragment after the number is ignored.
pub fn parse_reference(reference: &str) -> Result<PrUrl, PrError> {
    let parts: Vec<&str> = reference.split('/').collect();
    if parts.len() < MIN_REFERENCE_SEGMENTS {
        return Err(PrError::InvalidUrl(reference.to_string()));
    }

    let number = parts[6].split(['?', '#']).next().unwrap_or_default();
    let pr_number = number
        .trim()
        .parse::<u64>()
        .map_err(|_| PrError::InvalidNumber(reference.to_string()))?;

    Ok(PrUrl {
        owner: parts[3].to_string(),
        repo: parts[4].to_string(),
        pr_number,
    })
}
