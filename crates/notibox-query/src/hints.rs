//! Action hints: which actions would remove a notification from a view.
//!
//! The frontend asks, per notification, "if I archived/muted/snoozed/… this,
//! would it still match the query driving the current view?", so it can
//! animate dismissals without re-querying. Answered by cloning the snapshot,
//! applying the action, and re-evaluating.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::eval::Evaluator;
use crate::model::{Notification, Repository};

/// The actions that can dismiss a notification from a view.
///
/// Read/unread and star/unstar are deliberately absent: marking read or
/// starring never dismisses, only a refresh does.
const DISMISSIVE_ACTIONS: &[&str] = &[
    "archive",
    "unarchive",
    "mute",
    "unmute",
    "snooze",
    "unsnooze",
    "filter",
    "unfilter",
];

/// The set of actions that would remove a notification from the current
/// result set, in a fixed order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionHints {
    /// Action names from the fixed dismissive set, in evaluation order.
    pub dismissed_on: Vec<String>,
}

/// Computes action hints for one notification against a query string.
///
/// On invalid query syntax this is conservative: no action is reported as
/// dismissive.
pub fn compute_action_hints(
    notif: &Notification,
    repo: Option<&Repository>,
    query: &str,
) -> ActionHints {
    let Ok(evaluator) = Evaluator::parse(query) else {
        return ActionHints::default();
    };

    compute_action_hints_with_evaluator(notif, repo, &evaluator)
}

/// Computes action hints with a pre-built evaluator. Preferred when computing
/// hints for many notifications under the same query.
pub fn compute_action_hints_with_evaluator(
    notif: &Notification,
    repo: Option<&Repository>,
    evaluator: &Evaluator,
) -> ActionHints {
    let now = Utc::now();
    let mut dismissed_on = Vec::new();

    for &action in DISMISSIVE_ACTIONS {
        // Only offer actions that apply to the notification's current state:
        // archiving an archived notification is not an action the UI shows.
        let applicable = match action {
            "archive" => !notif.archived,
            "unarchive" => notif.archived,
            "mute" => !notif.muted,
            "unmute" => notif.muted,
            "snooze" => !notif.is_snoozed_at(now),
            "unsnooze" => notif.is_snoozed_at(now),
            "filter" => !notif.filtered,
            "unfilter" => notif.filtered,
            _ => false,
        };

        if applicable && would_dismiss_on_action(notif, repo, evaluator, action) {
            dismissed_on.push(action.to_string());
        }
    }

    ActionHints { dismissed_on }
}

/// Applies an action to a clone of the notification and reports whether the
/// clone stops matching the query.
fn would_dismiss_on_action(
    notif: &Notification,
    repo: Option<&Repository>,
    evaluator: &Evaluator,
    action: &str,
) -> bool {
    let mut clone = notif.clone();

    match action {
        "archive" => clone.archived = true,
        "unarchive" => clone.archived = false,
        "mute" => clone.muted = true,
        "unmute" => clone.muted = false,
        "snooze" => clone.snoozed_until = Some(Utc::now() + Duration::hours(24)),
        "unsnooze" => clone.snoozed_until = None,
        "filter" => clone.filtered = true,
        "unfilter" => clone.filtered = false,
        _ => return false,
    }

    !evaluator.matches(&clone, repo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_notification() -> Notification {
        Notification {
            id: 1,
            repository_id: Some(10),
            subject_title: "Fix login crash".to_string(),
            subject_type: "Issue".to_string(),
            subject_state: Some("open".to_string()),
            subject_number: Some(1234),
            author_login: Some("octocat".to_string()),
            reason: Some("mention".to_string()),
            ..Notification::default()
        }
    }

    fn make_repo() -> Repository {
        Repository {
            id: 10,
            full_name: "cli/cli".to_string(),
        }
    }

    fn hints(query: &str, notif: &Notification) -> Vec<String> {
        let repo = make_repo();
        compute_action_hints(notif, Some(&repo), query).dismissed_on
    }

    #[test]
    fn test_inbox_view_dismisses_on_lifecycle_actions() {
        let dismissed = hints("in:inbox", &make_notification());
        assert!(dismissed.contains(&"archive".to_string()));
        assert!(dismissed.contains(&"mute".to_string()));
        assert!(dismissed.contains(&"snooze".to_string()));
        assert!(dismissed.contains(&"filter".to_string()));
        // Un-actions do not apply to a pristine inbox notification.
        assert!(!dismissed.contains(&"unarchive".to_string()));
        assert!(!dismissed.contains(&"unmute".to_string()));
    }

    #[test]
    fn test_empty_query_behaves_like_inbox() {
        let dismissed = hints("", &make_notification());
        assert!(dismissed.contains(&"archive".to_string()));
        assert!(dismissed.contains(&"mute".to_string()));
    }

    #[test]
    fn test_anywhere_view_never_dismisses() {
        assert!(hints("in:anywhere", &make_notification()).is_empty());

        let mut archived = make_notification();
        archived.archived = true;
        assert!(hints("in:anywhere", &archived).is_empty());

        let mut muted = make_notification();
        muted.muted = true;
        assert!(hints("in:anywhere", &muted).is_empty());
    }

    #[test]
    fn test_archive_view_dismisses_on_unarchive() {
        let mut archived = make_notification();
        archived.archived = true;

        let dismissed = hints("in:archive", &archived);
        assert!(dismissed.contains(&"unarchive".to_string()));
        assert!(dismissed.contains(&"mute".to_string()));
        assert!(!dismissed.contains(&"archive".to_string()));
    }

    #[test]
    fn test_snoozed_view_dismisses_on_unsnooze() {
        let mut snoozed = make_notification();
        snoozed.snoozed_until = Some(Utc::now() + Duration::hours(5));

        let dismissed = hints("in:snoozed", &snoozed);
        assert!(dismissed.contains(&"unsnooze".to_string()));
        assert!(!dismissed.contains(&"snooze".to_string()));
    }

    #[test]
    fn test_field_query_ignores_irrelevant_actions() {
        // An author query matches regardless of archived state, so archiving
        // does not dismiss; muting always does via the muted-only default.
        let dismissed = hints("author:octocat", &make_notification());
        assert!(!dismissed.contains(&"archive".to_string()));
        assert!(dismissed.contains(&"mute".to_string()));
    }

    #[test]
    fn test_invalid_query_is_conservative() {
        assert!(hints("badfield:x", &make_notification()).is_empty());
        assert!(hints("(repo:cli", &make_notification()).is_empty());
    }

    #[test]
    fn test_hints_with_shared_evaluator() {
        let repo = make_repo();
        let evaluator = Evaluator::parse("in:inbox").unwrap();

        let fresh = make_notification();
        let mut archived = make_notification();
        archived.archived = true;

        let fresh_hints = compute_action_hints_with_evaluator(&fresh, Some(&repo), &evaluator);
        assert!(fresh_hints.dismissed_on.contains(&"archive".to_string()));

        let archived_hints =
            compute_action_hints_with_evaluator(&archived, Some(&repo), &evaluator);
        assert!(!archived_hints.dismissed_on.contains(&"archive".to_string()));
    }
}
