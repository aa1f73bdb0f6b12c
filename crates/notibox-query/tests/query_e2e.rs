//! End-to-end tests for the full query pipeline: lex → parse → validate →
//! compile/evaluate, plus action hints.

use chrono::{Duration, Utc};

use notibox_query_rs::model::{Notification, Repository};
use notibox_query_rs::{
    build_query, compute_action_hints, parse, parse_and_validate, Evaluator, QueryError,
};

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

// ============================================================================
// Pipeline error surface
// ============================================================================

#[test]
fn test_build_query_reports_unknown_field() {
    let err = build_query("badfield:value", 50, 0).unwrap_err();
    assert!(err.to_string().contains("unknown field: badfield"));
}

#[test]
fn test_build_query_reports_invalid_in_value() {
    let err = build_query("in:badvalue", 50, 0).unwrap_err();
    assert!(err
        .to_string()
        .contains("invalid value for in: operator: badvalue"));
}

#[test]
fn test_build_query_reports_every_problem_at_once() {
    let err = build_query("badfield:x AND in:nowhere", 50, 0).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("unknown field: badfield"));
    assert!(message.contains("invalid value for in: operator: nowhere"));
}

#[test]
fn test_unterminated_quote_fails_with_position() {
    let err = parse("repo:\"oops").unwrap_err();
    match err {
        QueryError::Lex(lex) => assert!(lex.to_string().contains("position 5")),
        other => panic!("expected lex error, got {other:?}"),
    }
}

#[test]
fn test_parse_error_kinds_are_distinct() {
    let cases = [
        ("(repo:cli", "expected closing parenthesis"),
        (") x", "unexpected closing parenthesis"),
        ("repo:", "expected value after colon"),
        ("repo:cli AND", "unexpected token"),
    ];
    for (input, want) in cases {
        let err = parse(input).unwrap_err();
        assert!(
            err.to_string().contains(want),
            "expected {input:?} to fail with {want:?}, got {err}"
        );
    }
}

// ============================================================================
// Debug rendering stability
// ============================================================================

#[test]
fn test_parse_rendering_is_stable_and_structural() {
    let cases = [
        ("a:1 OR b:2 AND c:3", "(a:1 OR (b:2 AND c:3))"),
        ("a:1 AND b:2 AND c:3", "((a:1 AND b:2) AND c:3)"),
        ("(a:1 OR b:2) AND c:3", "(((a:1 OR b:2)) AND c:3)"),
        ("NOT a:1", "NOT(a:1)"),
        ("-a:1", "NOT(a:1)"),
        ("x y", "(FREE(\"x\") AND FREE(\"y\"))"),
    ];
    for (input, want) in cases {
        let ast = parse(input).unwrap().unwrap();
        assert_eq!(ast.to_string(), want, "for {input:?}");
        // A second parse renders identically.
        assert_eq!(parse(input).unwrap().unwrap().to_string(), want);
    }
}

// ============================================================================
// Compiler/evaluator consistency spot checks
// ============================================================================

#[test]
fn test_both_backends_accept_the_same_queries() {
    let queries = [
        "",
        "in:inbox",
        "repo:cli AND is:unread",
        "tags:triage",
        "-is:read urgent",
    ];
    for query in queries {
        assert!(build_query(query, 50, 0).is_ok(), "compile {query:?}");
        assert!(Evaluator::parse(query).is_ok(), "evaluate {query:?}");
    }

    for query in ["badfield:x", "in:nowhere", "(a:1"] {
        assert!(build_query(query, 50, 0).is_err());
        assert!(Evaluator::parse(query).is_err());
    }
}

#[test]
fn test_validated_ast_always_compiles() {
    let queries = [
        "in:inbox,archive,snoozed,filtered,anywhere",
        "is:unread,read,archived,muted,snoozed,starred,filtered",
        "repo:a repository:b org:c author:d reason:e type:f subject_type:g",
        "state:open read:1 archived:0 muted:no snoozed:yes filtered:false tags:x",
        "NOT (is:read OR is:muted)",
    ];
    for query in queries {
        let ast = parse_and_validate(query).unwrap();
        assert!(ast.is_some());
        assert!(build_query(query, 10, 0).is_ok());
    }
}

// ============================================================================
// Action hint round-trips
// ============================================================================

#[test]
fn test_inbox_notification_dismissed_on_archive() {
    let repo = make_repo();
    let hints = compute_action_hints(&make_notification(), Some(&repo), "in:inbox");
    assert!(hints.dismissed_on.contains(&"archive".to_string()));
}

#[test]
fn test_anywhere_dismisses_nothing_regardless_of_state() {
    let repo = make_repo();

    let variants = {
        let mut archived = make_notification();
        archived.archived = true;
        let mut muted = make_notification();
        muted.muted = true;
        let mut snoozed = make_notification();
        snoozed.snoozed_until = Some(Utc::now() + Duration::hours(1));
        let mut filtered = make_notification();
        filtered.filtered = true;
        vec![make_notification(), archived, muted, snoozed, filtered]
    };

    for notif in variants {
        let hints = compute_action_hints(&notif, Some(&repo), "in:anywhere");
        assert!(
            hints.dismissed_on.is_empty(),
            "in:anywhere dismissed {:?} for notification {:?}",
            hints.dismissed_on,
            notif.id
        );
    }
}

#[test]
fn test_hints_and_evaluator_are_consistent() {
    // Every reported dismissive action, applied by hand, must stop matching.
    let repo = make_repo();
    let notif = make_notification();
    let query = "in:inbox";
    let evaluator = Evaluator::parse(query).unwrap();
    assert!(evaluator.matches(&notif, Some(&repo)));

    let hints = compute_action_hints(&notif, Some(&repo), query);
    for action in &hints.dismissed_on {
        let mut clone = notif.clone();
        match action.as_str() {
            "archive" => clone.archived = true,
            "unarchive" => clone.archived = false,
            "mute" => clone.muted = true,
            "unmute" => clone.muted = false,
            "snooze" => clone.snoozed_until = Some(Utc::now() + Duration::hours(24)),
            "unsnooze" => clone.snoozed_until = None,
            "filter" => clone.filtered = true,
            "unfilter" => clone.filtered = false,
            other => panic!("unexpected action {other:?}"),
        }
        assert!(
            !evaluator.matches(&clone, Some(&repo)),
            "action {action:?} was reported dismissive but the clone still matches"
        );
    }
}
