//! Snapshot types the query engine evaluates against.
//!
//! These are plain data mirrors of the storage rows the compiled SQL runs
//! over. The evaluator consumes them to re-answer a query for one notification
//! without touching the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A notification snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Storage id.
    pub id: i64,
    /// Owning repository id, if any.
    pub repository_id: Option<i64>,
    /// Subject title (issue/PR/release title).
    pub subject_title: String,
    /// Subject type, e.g. `Issue`, `PullRequest`, `Release`.
    pub subject_type: String,
    /// Subject state extracted from the provider payload, e.g. `open`.
    pub subject_state: Option<String>,
    /// Issue/PR number.
    pub subject_number: Option<i64>,
    /// Raw provider subject payload (JSON). Only consulted as a legacy
    /// fallback when `subject_state` was never extracted.
    pub subject_raw: Option<String>,
    /// Login of the user that triggered the notification.
    pub author_login: Option<String>,
    /// Notification reason, e.g. `mention`, `review_requested`.
    pub reason: Option<String>,
    /// Read marker.
    pub is_read: bool,
    /// Archived marker.
    pub archived: bool,
    /// Muted marker.
    pub muted: bool,
    /// Starred marker.
    pub starred: bool,
    /// Set when a filter rule routed the notification out of the inbox.
    pub filtered: bool,
    /// Snoozed until this instant; a notification is actively snoozed while
    /// this is in the future.
    pub snoozed_until: Option<DateTime<Utc>>,
    /// Slugs of the tags assigned to this notification.
    pub tag_slugs: Vec<String>,
}

impl Notification {
    /// Returns true if the notification is actively snoozed at `now`.
    pub fn is_snoozed_at(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }
}

/// A repository snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Storage id.
    pub id: i64,
    /// Full name, `owner/name`.
    pub full_name: String,
}
