use chrono::{DateTime, Utc};

use crate::pr::types::MergeableState;
use crate::report::types::{PullRequestRecord, StalenessFlag};

/// A PR is stale when it is older than `threshold_days`, is not merged, and
/// GitHub reports it as cleanly mergeable: ready to go but nobody merged it.
pub fn staleness(record: &PullRequestRecord, now: DateTime<Utc>, threshold_days: i64) -> StalenessFlag {
    let Some(raw) = record.created_at.as_deref() else {
        return StalenessFlag::No;
    };
    let Ok(created_at) = DateTime::parse_from_rfc3339(raw) else {
        return StalenessFlag::Error;
    };

    let age_days = (now - created_at.with_timezone(&Utc)).num_days();
    let stale = age_days > threshold_days
        && !record.status.is_merged()
        && record.mergeable_state == Some(MergeableState::Clean);

    if stale {
        StalenessFlag::Yes
    } else {
        StalenessFlag::No
    }
}
