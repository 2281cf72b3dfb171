use serde::Deserialize;

/// Represents the parsed components of a GitHub PR URL.
/// Extracted by parse_reference() in pr/mod.rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

/// GitHub's asynchronously computed answer to "can this PR merge cleanly?".
///
/// Values outside the known vocabulary are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum MergeableState {
    Clean,
    Dirty,
    Blocked,
    Behind,
    Unstable,
    Unknown,
    Other(String),
}

impl From<String> for MergeableState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "clean" => MergeableState::Clean,
            "dirty" => MergeableState::Dirty,
            "blocked" => MergeableState::Blocked,
            "behind" => MergeableState::Behind,
            "unstable" => MergeableState::Unstable,
            "unknown" => MergeableState::Unknown,
            _ => MergeableState::Other(value),
        }
    }
}

impl MergeableState {
    /// Human-readable label used inside the "Not merged (...)" status.
    pub fn label(&self) -> &str {
        match self {
            MergeableState::Clean => "Mergeable",
            MergeableState::Dirty => "Has conflicts",
            MergeableState::Blocked => "Blocked",
            MergeableState::Behind => "Behind base branch",
            MergeableState::Unstable => "Checks failed",
            MergeableState::Unknown => "Unknown state",
            MergeableState::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for MergeableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub login: Option<String>,
    /// "User", "Bot" or "Organization"
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Subset of the `GET /repos/{owner}/{repo}/pulls/{number}` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestMetadata {
    /// "open" or "closed"
    pub state: Option<String>,
    pub merged: Option<bool>,
    pub mergeable_state: Option<MergeableState>,
    pub user: Option<User>,
    /// RFC 3339 timestamp, kept raw so a bad value surfaces as a staleness error
    pub created_at: Option<String>,
}

impl PullRequestMetadata {
    pub fn is_merged(&self) -> bool {
        self.merged.unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.state.as_deref() == Some("closed")
    }

    pub fn author(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.login.as_deref())
    }
}

/// One entry of `GET /repos/{owner}/{repo}/issues/{number}/comments`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueComment {
    pub body: Option<String>,
    pub user: Option<User>,
}

impl IssueComment {
    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

/// Response of `GET /user`, used by the token check.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatedUser {
    pub login: String,
}
