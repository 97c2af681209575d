//! Integration tests for the GitHub REST surface.
//!
//! These tests run the real `GitHubForge` against a wiremock server to pin
//! down paths, headers, payloads, and error mapping, with no live GitHub calls.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gitfarm::core::types::Sha;
use gitfarm::forge::github::GitHubForge;
use gitfarm::forge::{CreatePullRequest, Forge, ForgeError};
use gitfarm::workdir::{PollPolicy, WorkdirOptions, WorkingDirectory};

const SHA_A: &str = "abcdef0123456789abcdef0123456789abcdef01";

fn ref_payload(sha: &str) -> serde_json::Value {
    serde_json::json!({
        "ref": "refs/heads/master",
        "object": { "sha": sha, "type": "commit" }
    })
}

// =============================================================================
// branch_head
// =============================================================================

#[tokio::test]
async fn branch_head_queries_refs_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/git/refs/heads/master"))
        .and(header("accept", "application/vnd.github+json"))
        .and(header("user-agent", "gitfarm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_payload(SHA_A)))
        .expect(1)
        .mount(&server)
        .await;

    let forge = GitHubForge::with_api_base(None, server.uri());
    let sha = forge.branch_head("acme", "widgets", "master").await.unwrap();

    assert_eq!(sha, Sha::new(SHA_A).unwrap());
}

#[tokio::test]
async fn branch_head_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/git/refs/heads/master"))
        .and(header("authorization", "Bearer ghp_example"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_payload(SHA_A)))
        .expect(1)
        .mount(&server)
        .await;

    let forge = GitHubForge::with_api_base(Some("ghp_example".into()), server.uri());
    forge.branch_head("acme", "widgets", "master").await.unwrap();
}

#[tokio::test]
async fn branch_head_missing_branch_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/git/refs/heads/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "Not Found"})),
        )
        .mount(&server)
        .await;

    let forge = GitHubForge::with_api_base(None, server.uri());
    let result = forge.branch_head("acme", "widgets", "missing").await;

    assert!(matches!(result, Err(ForgeError::NotFound(_))));
}

#[tokio::test]
async fn branch_head_maps_rate_limiting() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/git/refs/heads/master"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(serde_json::json!({"message": "API rate limit exceeded"})),
        )
        .mount(&server)
        .await;

    let forge = GitHubForge::with_api_base(None, server.uri());
    let result = forge.branch_head("acme", "widgets", "master").await;

    assert!(matches!(result, Err(ForgeError::RateLimited)));
}

#[tokio::test]
async fn branch_head_rejects_payload_without_object() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/git/refs/heads/master"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"ref": "refs/x"})),
        )
        .mount(&server)
        .await;

    let forge = GitHubForge::with_api_base(None, server.uri());
    let result = forge.branch_head("acme", "widgets", "master").await;

    assert!(matches!(result, Err(ForgeError::MalformedResponse(_))));
}

// =============================================================================
// create_pull
// =============================================================================

#[tokio::test]
async fn create_pull_posts_expected_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/pulls"))
        .and(body_partial_json(serde_json::json!({
            "base": "master",
            "body": "See build 4711",
            "head": "acme:ci-fix",
            "title": "Fix flaky test",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "number": 17,
            "html_url": "https://github.com/acme/widgets/pull/17",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let forge = GitHubForge::with_api_base(None, server.uri());
    let pull = forge
        .create_pull(
            "acme",
            "widgets",
            CreatePullRequest {
                base: "master".into(),
                head: "acme:ci-fix".into(),
                title: "Fix flaky test".into(),
                body: Some("See build 4711".into()),
            },
        )
        .await
        .unwrap();

    assert_eq!(pull.number, 17);
    assert_eq!(pull.html_url, "https://github.com/acme/widgets/pull/17");
}

#[tokio::test]
async fn create_pull_validation_failure_maps_to_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/pulls"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(serde_json::json!({"message": "Validation Failed"})),
        )
        .mount(&server)
        .await;

    let forge = GitHubForge::with_api_base(None, server.uri());
    let result = forge
        .create_pull(
            "acme",
            "widgets",
            CreatePullRequest {
                base: "master".into(),
                head: "acme:ghost".into(),
                title: "Bad".into(),
                body: None,
            },
        )
        .await;

    match result {
        Err(ForgeError::ApiError { status, message }) => {
            assert_eq!(status, 422);
            assert_eq!(message, "Validation Failed");
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}

// =============================================================================
// Through the working-directory handle
// =============================================================================

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// A repository whose upstream points at acme/widgets on GitHub.
fn test_repo() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");

    run_git(dir.path(), &["init", "-b", "master"]);
    run_git(dir.path(), &["config", "user.email", "ci@example.com"]);
    run_git(dir.path(), &["config", "user.name", "CI Bot"]);

    std::fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
    run_git(dir.path(), &["add", "README.md"]);
    run_git(dir.path(), &["commit", "-m", "Initial commit"]);

    run_git(
        dir.path(),
        &["remote", "add", "upstream", "git@github.com:acme/widgets.git"],
    );

    dir
}

fn open_with_forge(dir: &Path, forge: GitHubForge) -> WorkingDirectory {
    WorkingDirectory::open_with(
        dir,
        WorkdirOptions {
            poll: PollPolicy {
                attempts: 24,
                interval: Duration::from_millis(10),
            },
            forge: Some(Arc::new(forge)),
            ..Default::default()
        },
    )
    .expect("open working directory")
}

#[tokio::test]
async fn github_branch_commit_uses_remote_owner_and_repo_name() {
    let server = MockServer::start().await;

    // Owner comes from the queried remote's URL, repository from identity.
    Mock::given(method("GET"))
        .and(path("/repos/alice/widgets/git/refs/heads/fix"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_payload(SHA_A)))
        .expect(1)
        .mount(&server)
        .await;

    let repo = test_repo();
    let workdir = open_with_forge(repo.path(), GitHubForge::with_api_base(None, server.uri()));

    let sender = workdir
        .add_remote(false, "sender", "git@github.com:alice/widgets.git")
        .unwrap();

    let sha = workdir.github_branch_commit("fix", &sender).await.unwrap();
    assert_eq!(sha, Sha::new(SHA_A).unwrap());
}

#[tokio::test]
async fn github_branch_commit_rejects_non_github_remote() {
    let repo = test_repo();
    let workdir = open_with_forge(repo.path(), GitHubForge::new(None));

    let elsewhere = workdir
        .add_remote(false, "elsewhere", "git@gitlab.com:acme/widgets.git")
        .unwrap();

    let result = workdir.github_branch_commit("master", &elsewhere).await;
    assert!(matches!(
        result,
        Err(gitfarm::workdir::WorkdirError::NotGitHubRemote { .. })
    ));
}

#[tokio::test]
async fn create_pull_request_targets_upstream_branch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/pulls"))
        .and(body_partial_json(serde_json::json!({
            "base": "master",
            "head": "acme:ci-fix",
            "title": "Fix flaky test",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "number": 4,
            "html_url": "https://github.com/acme/widgets/pull/4",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let repo = test_repo();
    let workdir = open_with_forge(repo.path(), GitHubForge::with_api_base(None, server.uri()));

    let url = workdir
        .create_pull_request("Fix flaky test", "See build 4711", "acme", "ci-fix")
        .await
        .unwrap();

    assert_eq!(url, "https://github.com/acme/widgets/pull/4");
}
