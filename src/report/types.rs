use crate::pr::types::MergeableState;

/// Merge status of a single PR, as shown in the "Merged Status" column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrStatus {
    Merged,
    /// Open (or closed-and-reopened) PR, with GitHub's mergeability if reported
    NotMerged(Option<MergeableState>),
    ClosedNotMerged,
    InvalidUrl,
    Error,
}

impl PrStatus {
    pub fn is_merged(&self) -> bool {
        matches!(self, PrStatus::Merged)
    }
}

impl std::fmt::Display for PrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrStatus::Merged => write!(f, "Merged"),
            PrStatus::NotMerged(None) => write!(f, "Not merged"),
            PrStatus::NotMerged(Some(state)) => write!(f, "Not merged ({})", state),
            PrStatus::ClosedNotMerged => write!(f, "Closed (Not merged)"),
            PrStatus::InvalidUrl => write!(f, "Invalid URL"),
            PrStatus::Error => write!(f, "Error"),
        }
    }
}

/// Whether a PR has at least one external comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentFlag {
    Yes,
    No,
    /// Reference was malformed, nothing was fetched
    Skipped,
    Error,
}

impl CommentFlag {
    pub fn from_found(found: bool) -> Self {
        if found {
            CommentFlag::Yes
        } else {
            CommentFlag::No
        }
    }
}

impl std::fmt::Display for CommentFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentFlag::Yes => write!(f, "Yes"),
            CommentFlag::No => write!(f, "No"),
            CommentFlag::Skipped => write!(f, "Skipped"),
            CommentFlag::Error => write!(f, "Error"),
        }
    }
}

/// "Old & unmerged & no conflicts" indicator derived from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessFlag {
    Yes,
    No,
    /// createdAt could not be parsed
    Error,
}

impl std::fmt::Display for StalenessFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StalenessFlag::Yes => write!(f, "Yes"),
            StalenessFlag::No => write!(f, "No"),
            StalenessFlag::Error => write!(f, "Error"),
        }
    }
}

/// Per-PR result. Built once per unique reference and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    /// The reference string exactly as it appeared in the spreadsheet
    pub reference: String,
    pub status: PrStatus,
    /// Author login, or "Unknown"
    pub author: String,
    pub external_comment: CommentFlag,
    /// External comment bodies joined with "\n---\n", "None" if there are none,
    /// or the failure message for error records
    pub external_comment_text: String,
    pub created_at: Option<String>,
    pub mergeable_state: Option<MergeableState>,
}

pub const UNKNOWN_AUTHOR: &str = "Unknown";

impl PullRequestRecord {
    /// Record for a reference too short to name a PR.
    pub fn invalid(reference: &str) -> Self {
        Self {
            reference: reference.to_string(),
            status: PrStatus::InvalidUrl,
            author: UNKNOWN_AUTHOR.to_string(),
            external_comment: CommentFlag::Skipped,
            external_comment_text: CommentFlag::Skipped.to_string(),
            created_at: None,
            mergeable_state: None,
        }
    }

    /// Record for a reference whose processing failed; the message becomes the comment payload.
    pub fn error(reference: &str, message: impl std::fmt::Display) -> Self {
        Self {
            reference: reference.to_string(),
            status: PrStatus::Error,
            author: UNKNOWN_AUTHOR.to_string(),
            external_comment: CommentFlag::Error,
            external_comment_text: message.to_string(),
            created_at: None,
            mergeable_state: None,
        }
    }
}

/// Which indicator fills the third appended spreadsheet column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FlagColumn {
    /// "Old & Unmerged & No Conflicts"
    #[default]
    Stale,
    /// "Has External Comment"
    External,
}

impl FlagColumn {
    pub fn header(self) -> &'static str {
        match self {
            FlagColumn::Stale => "Old & Unmerged & No Conflicts",
            FlagColumn::External => "Has External Comment",
        }
    }
}

/// Aggregate counts over the unique PRs of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub merged: usize,
    pub stale: usize,
    pub with_external_comments: usize,
}
