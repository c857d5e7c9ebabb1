//! GitHub Issues adapter against a mock HTTP server.

use std::time::Duration;

use cadre::adapters::github_issues::{GithubClient, GithubClientConfig, GithubIssueTracker};
use cadre::domain::ports::{IssueState, IssueTracker, TrackerError};
use mockito::{Matcher, Server};

fn tracker(server: &Server) -> GithubIssueTracker {
    let config = GithubClientConfig {
        api_base: server.url(),
        token: "t0ken".to_string(),
        requests_per_hour: 5000,
        timeout: Duration::from_secs(5),
    };
    GithubIssueTracker::new(GithubClient::new(config).unwrap(), "acme", "shop")
}

#[tokio::test]
async fn test_create_issue_sends_auth_and_parses_number() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/repos/acme/shop/issues")
        .match_header("authorization", "Bearer t0ken")
        .match_header("x-github-api-version", "2022-11-28")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "title": "Checkout API"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"number": 42, "html_url": "https://github.com/acme/shop/issues/42", "state": "open"}"#)
        .create_async()
        .await;

    let issue = tracker(&server)
        .create_issue("Checkout API", "design the endpoints")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(issue.external_id, "42");
    assert_eq!(
        issue.url.as_deref(),
        Some("https://github.com/acme/shop/issues/42")
    );
}

#[tokio::test]
async fn test_update_and_comment_hit_issue_paths() {
    let mut server = Server::new_async().await;
    let update = server
        .mock("PATCH", "/repos/acme/shop/issues/7")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "state": "closed",
            "labels": ["status:completed"]
        })))
        .with_status(200)
        .with_body(r#"{"number": 7, "state": "closed"}"#)
        .create_async()
        .await;
    let comment = server
        .mock("POST", "/repos/acme/shop/issues/7/comments")
        .match_body(Matcher::PartialJson(serde_json::json!({"body": "done"})))
        .with_status(201)
        .with_body("{}")
        .create_async()
        .await;

    let tracker = tracker(&server);
    tracker
        .update_issue("7", IssueState::Closed, &["status:completed".to_string()])
        .await
        .unwrap();
    tracker.add_comment("7", "done").await.unwrap();

    update.assert_async().await;
    comment.assert_async().await;
}

#[tokio::test]
async fn test_get_issue_reads_state() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/acme/shop/issues/3")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"number": 3, "state": "closed"}"#)
        .create_async()
        .await;

    let state = tracker(&server).get_issue("3").await.unwrap();
    assert_eq!(state, IssueState::Closed);
}

#[tokio::test]
async fn test_server_errors_and_rate_limits_are_transient() {
    let mut server = Server::new_async().await;
    server
        .mock("PATCH", "/repos/acme/shop/issues/1")
        .with_status(503)
        .with_body(r#"{"message": "unavailable"}"#)
        .create_async()
        .await;
    server
        .mock("PATCH", "/repos/acme/shop/issues/2")
        .with_status(403)
        .with_header("x-ratelimit-remaining", "0")
        .with_body(r#"{"message": "API rate limit exceeded"}"#)
        .create_async()
        .await;

    let tracker = tracker(&server);
    for id in ["1", "2"] {
        let err = tracker
            .update_issue(id, IssueState::Open, &[])
            .await
            .unwrap_err();
        assert!(err.is_transient(), "issue {id}: {err}");
    }
}

#[tokio::test]
async fn test_validation_and_missing_issue_are_permanent() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/repos/acme/shop/issues/9/comments")
        .with_status(404)
        .with_body(r#"{"message": "Not Found"}"#)
        .create_async()
        .await;

    let tracker = tracker(&server);
    let err = tracker.add_comment("9", "hello").await.unwrap_err();
    assert!(matches!(err, TrackerError::Permanent(ref msg) if msg.contains("Not Found")));

    // Not a number: rejected before any request is made
    let err = tracker.get_issue("abc").await.unwrap_err();
    assert!(!err.is_transient());
}
