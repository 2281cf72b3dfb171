use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::types::{AuthenticatedUser, IssueComment, PrUrl, PullRequestMetadata};
use super::{PrError, PullRequestApi};
use crate::config::Config;

/// Authenticated GitHub REST client shared by every PR task.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: String,
    comments_per_page: u32,
}

impl GitHubClient {
    pub fn new(config: &Config) -> Result<Self, PrError> {
        let token = config.github_token().ok_or(PrError::MissingToken)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("pr-audit"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.github.request_timeout())
            .build()?;

        Ok(Self {
            http,
            api_url: config.github.api_url.trim_end_matches('/').to_string(),
            token,
            comments_per_page: config.fetch.comments_per_page,
        })
    }

    /// GET /user, to verify the configured token.
    #[instrument(skip(self))]
    pub async fn authenticated_user(&self) -> Result<AuthenticatedUser, PrError> {
        let url = format!("{}/user", self.api_url);
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        decode(response, &url).await
    }

    fn pull_url(&self, pr: &PrUrl) -> String {
        format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_url, pr.owner, pr.repo, pr.pr_number
        )
    }

    fn comments_url(&self, pr: &PrUrl) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, pr.owner, pr.repo, pr.pr_number
        )
    }
}

#[async_trait]
impl PullRequestApi for GitHubClient {
    #[instrument(skip(self, pr), fields(owner = %pr.owner, repo = %pr.repo, pr = pr.pr_number))]
    async fn pull_request(&self, pr: &PrUrl) -> Result<PullRequestMetadata, PrError> {
        let url = self.pull_url(pr);
        debug!("fetching PR metadata from GitHub API");
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let metadata: PullRequestMetadata = decode(response, &url).await?;
        debug!(
            state = ?metadata.state,
            merged = metadata.is_merged(),
            mergeable_state = ?metadata.mergeable_state,
            "received PR metadata"
        );
        Ok(metadata)
    }

    #[instrument(skip(self, pr), fields(owner = %pr.owner, repo = %pr.repo, pr = pr.pr_number))]
    async fn issue_comments(&self, pr: &PrUrl) -> Result<Vec<IssueComment>, PrError> {
        let url = self.comments_url(pr);
        debug!("fetching PR comments from GitHub API");
        let response = self
            .http
            .get(&url)
            .query(&[("per_page", self.comments_per_page)])
            .bearer_auth(&self.token)
            .send()
            .await?;
        let comments: Vec<IssueComment> = decode(response, &url).await?;
        debug!(count = comments.len(), "received PR comments");
        Ok(comments)
    }
}

/// Decode a 200 response as JSON; any other status is an error that carries
/// GitHub's `message` field when the body has one.
async fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, PrError> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
            .map(|message| format!(": {message}"))
            .unwrap_or_default();
        return Err(PrError::Status {
            status,
            url: url.to_string(),
            detail,
        });
    }
    Ok(response.json::<T>().await?)
}
