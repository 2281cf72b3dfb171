use std::collections::HashSet;

use super::types::{IssueComment, User};
use crate::config::FilterConfig;

/// Separator placed between external comment bodies in the report.
pub const COMMENT_SEPARATOR: &str = "\n---\n";

/// Decides which PR comments count as outside review engagement.
#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    excluded_users: HashSet<String>,
    excluded_keywords: Vec<String>,
}

impl CommentFilter {
    pub fn new(
        excluded_users: impl IntoIterator<Item = String>,
        excluded_keywords: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            excluded_users: excluded_users.into_iter().collect(),
            excluded_keywords: excluded_keywords.into_iter().collect(),
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(
            config.excluded_users.iter().cloned(),
            config.excluded_keywords.iter().cloned(),
        )
    }

    /// A comment is external when it has an author login that is neither
    /// excluded nor a bot, and its body carries none of the excluded keywords.
    pub fn is_external(&self, comment: &IssueComment) -> bool {
        let Some(user) = comment.user.as_ref() else {
            return false;
        };
        let Some(login) = user.login.as_deref().filter(|l| !l.is_empty()) else {
            return false;
        };
        if self.excluded_users.contains(login) || is_bot(user) {
            return false;
        }
        let body = comment.body();
        !self.excluded_keywords.iter().any(|keyword| body.contains(keyword.as_str()))
    }

    /// Bodies of the external comments, in API order.
    pub fn external_bodies<'a>(&self, comments: &'a [IssueComment]) -> Vec<&'a str> {
        comments
            .iter()
            .filter(|c| self.is_external(c))
            .map(IssueComment::body)
            .collect()
    }
}

/// GitHub marks app accounts with type "Bot"; older integrations only show up
/// through their login.
pub fn is_bot(user: &User) -> bool {
    let login = user.login.as_deref().unwrap_or_default().to_lowercase();
    user.kind.as_deref() == Some("Bot") || login.ends_with("[bot]") || login.contains("bot")
}
