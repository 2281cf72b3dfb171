use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::types::{IssueComment, PrUrl, PullRequestMetadata, User};
use super::{PrError, PullRequestApi};

/// Scripted PullRequestApi for tests. PRs are keyed by number.
#[derive(Default)]
pub struct MockApi {
    prs: Mutex<HashMap<u64, MockPr>>,
    /// Simulated network time per call
    latency: Duration,
    pub metadata_calls: AtomicUsize,
    pub comment_calls: AtomicUsize,
    /// PRs between their first metadata call and their last call
    active: Mutex<HashSet<u64>>,
    pub max_active: AtomicUsize,
}

#[derive(Default)]
struct MockPr {
    /// Successive metadata responses; the last one repeats
    metadata: VecDeque<PullRequestMetadata>,
    comments: Vec<IssueComment>,
    fail_status: Option<u16>,
}

impl MockApi {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn add_pr(&self, number: u64, metadata: Vec<PullRequestMetadata>, comments: Vec<IssueComment>) {
        self.prs.lock().unwrap().insert(
            number,
            MockPr {
                metadata: metadata.into(),
                comments,
                fail_status: None,
            },
        );
    }

    /// Make every metadata call for `number` answer with `status`.
    pub fn fail_pr(&self, number: u64, status: u16) {
        self.prs.lock().unwrap().insert(
            number,
            MockPr {
                fail_status: Some(status),
                ..MockPr::default()
            },
        );
    }

    fn enter(&self, number: u64) {
        let mut active = self.active.lock().unwrap();
        active.insert(number);
        self.max_active.fetch_max(active.len(), Ordering::SeqCst);
    }

    fn leave(&self, number: u64) {
        self.active.lock().unwrap().remove(&number);
    }

    fn status_error(pr: &PrUrl, status: u16) -> PrError {
        PrError::Status {
            status: reqwest::StatusCode::from_u16(status).unwrap(),
            url: format!("mock://{}/{}/pulls/{}", pr.owner, pr.repo, pr.pr_number),
            detail: String::new(),
        }
    }
}

#[async_trait]
impl PullRequestApi for MockApi {
    async fn pull_request(&self, pr: &PrUrl) -> Result<PullRequestMetadata, PrError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(pr.pr_number);
        tokio::time::sleep(self.latency).await;

        let response = {
            let mut prs = self.prs.lock().unwrap();
            match prs.get_mut(&pr.pr_number) {
                None => Err(404),
                Some(scripted) => match scripted.fail_status {
                    Some(status) => Err(status),
                    None if scripted.metadata.len() > 1 => Ok(scripted.metadata.pop_front().unwrap()),
                    None => scripted.metadata.front().cloned().ok_or(404),
                },
            }
        };
        response.map_err(|status| {
            self.leave(pr.pr_number);
            Self::status_error(pr, status)
        })
    }

    async fn issue_comments(&self, pr: &PrUrl) -> Result<Vec<IssueComment>, PrError> {
        self.comment_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let comments = self
            .prs
            .lock()
            .unwrap()
            .get(&pr.pr_number)
            .map(|scripted| scripted.comments.clone())
            .unwrap_or_default();
        self.leave(pr.pr_number);
        Ok(comments)
    }
}

/// Metadata for a PR authored by "author", created 2025-01-01.
pub fn metadata(state: &str, merged: bool, mergeable_state: Option<&str>) -> PullRequestMetadata {
    PullRequestMetadata {
        state: Some(state.to_string()),
        merged: Some(merged),
        mergeable_state: mergeable_state.map(|s| s.to_string().into()),
        user: Some(User {
            login: Some("author".to_string()),
            kind: Some("User".to_string()),
        }),
        created_at: Some("2025-01-01T00:00:00Z".to_string()),
    }
}

pub fn comment(login: &str, kind: &str, body: &str) -> IssueComment {
    IssueComment {
        body: Some(body.to_string()),
        user: Some(User {
            login: Some(login.to_string()),
            kind: Some(kind.to_string()),
        }),
    }
}
