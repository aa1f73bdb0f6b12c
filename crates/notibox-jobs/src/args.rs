//! Typed argument payloads for the job types.
//!
//! Callers that persist jobs own the serialization format; these are the
//! shapes the built-in enqueue helpers and handlers exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Arguments for applying a rule to matching notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyRuleArgs {
    /// The user whose notifications the rule runs over.
    pub user_id: String,
    /// The rule to apply.
    pub rule_id: String,
}

/// Arguments for processing a single notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessNotificationArgs {
    /// The user the notification belongs to.
    pub user_id: String,
    /// Raw notification payload from the provider.
    pub notification_data: serde_json::Value,
}

/// Arguments for backfilling older notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOlderArgs {
    /// Number of days to sync back from `until_time`.
    pub days: i64,
    /// Only sync notifications older than this cutoff.
    pub until_time: DateTime<Utc>,
    /// Optional cap on the number of notifications to sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<i64>,
    /// Restrict the backfill to unread notifications.
    pub unread_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_older_args_round_trip() {
        let args = SyncOlderArgs {
            days: 30,
            until_time: Utc::now(),
            max_count: Some(500),
            unread_only: true,
        };
        let json = serde_json::to_string(&args).unwrap();
        let back: SyncOlderArgs = serde_json::from_str(&json).unwrap();
        assert_eq!(args, back);
    }

    #[test]
    fn test_sync_older_args_omits_absent_max_count() {
        let args = SyncOlderArgs {
            days: 7,
            until_time: Utc::now(),
            max_count: None,
            unread_only: false,
        };
        let json = serde_json::to_string(&args).unwrap();
        assert!(!json.contains("max_count"));
    }
}
