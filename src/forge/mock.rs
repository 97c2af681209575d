//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge provides a deterministic implementation of the `Forge`
//! trait for use in tests. Branch heads are preconfigured, created pull
//! requests are recorded in memory, and failure scenarios can be injected.
//!
//! # Example
//!
//! ```
//! use gitfarm::core::types::Sha;
//! use gitfarm::forge::mock::MockForge;
//! use gitfarm::forge::Forge;
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new();
//! let sha = Sha::new("abcdef0123456789abcdef0123456789abcdef01").unwrap();
//! forge.set_branch_head("acme", "widgets", "master", sha.clone());
//!
//! let head = forge.branch_head("acme", "widgets", "master").await.unwrap();
//! assert_eq!(head, sha);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{CreatePullRequest, CreatedPull, Forge, ForgeError};
use crate::core::types::Sha;

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockForge {
    inner: Arc<Mutex<MockForgeInner>>,
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct MockForgeInner {
    /// Branch heads keyed by (owner, repo, branch).
    branch_heads: HashMap<(String, String, String), Sha>,
    /// Recorded pull-request creations.
    pulls: Vec<RecordedPull>,
    /// Next PR number to assign.
    next_pull_number: u64,
    /// Injected failure, taken on the next matching call.
    fail_on: Option<FailOn>,
}

/// A recorded `create_pull` call.
#[derive(Debug, Clone)]
pub struct RecordedPull {
    /// Repository owner the request targeted
    pub owner: String,
    /// Repository name the request targeted
    pub repo: String,
    /// The request as sent
    pub request: CreatePullRequest,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail branch_head with the given error.
    BranchHead(ForgeError),
    /// Fail create_pull with the given error.
    CreatePull(ForgeError),
}

impl MockForge {
    /// Create an empty mock forge.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner {
                next_pull_number: 1,
                ..Default::default()
            })),
        }
    }

    /// Preconfigure the head sha reported for a branch.
    pub fn set_branch_head(&self, owner: &str, repo: &str, branch: &str, sha: Sha) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .branch_heads
            .insert((owner.into(), repo.into(), branch.into()), sha);
    }

    /// Inject a failure for the next matching operation.
    pub fn fail_on(&self, failure: FailOn) {
        self.inner.lock().unwrap().fail_on = Some(failure);
    }

    /// All recorded pull-request creations, in call order.
    pub fn recorded_pulls(&self) -> Vec<RecordedPull> {
        self.inner.lock().unwrap().pulls.clone()
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn branch_head(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Sha, ForgeError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(FailOn::BranchHead(err)) = inner.fail_on.clone() {
            inner.fail_on = None;
            return Err(err);
        }

        inner
            .branch_heads
            .get(&(owner.to_string(), repo.to_string(), branch.to_string()))
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("{owner}/{repo}#{branch}")))
    }

    async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        request: CreatePullRequest,
    ) -> Result<CreatedPull, ForgeError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(FailOn::CreatePull(err)) = inner.fail_on.clone() {
            inner.fail_on = None;
            return Err(err);
        }

        let number = inner.next_pull_number;
        inner.next_pull_number += 1;

        inner.pulls.push(RecordedPull {
            owner: owner.to_string(),
            repo: repo.to_string(),
            request,
        });

        Ok(CreatedPull {
            number,
            html_url: format!("https://github.com/{owner}/{repo}/pull/{number}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha(hex: char) -> Sha {
        Sha::new(hex.to_string().repeat(40)).unwrap()
    }

    #[tokio::test]
    async fn branch_head_returns_configured_sha() {
        let forge = MockForge::new();
        forge.set_branch_head("acme", "widgets", "master", sha('a'));

        let head = forge.branch_head("acme", "widgets", "master").await.unwrap();
        assert_eq!(head, sha('a'));
    }

    #[tokio::test]
    async fn branch_head_unknown_is_not_found() {
        let forge = MockForge::new();
        let result = forge.branch_head("acme", "widgets", "missing").await;
        assert!(matches!(result, Err(ForgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_pull_assigns_sequential_numbers() {
        let forge = MockForge::new();

        let request = CreatePullRequest {
            base: "master".into(),
            head: "sender:fix".into(),
            title: "Fix".into(),
            body: None,
        };

        let first = forge
            .create_pull("acme", "widgets", request.clone())
            .await
            .unwrap();
        let second = forge.create_pull("acme", "widgets", request).await.unwrap();

        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert_eq!(forge.recorded_pulls().len(), 2);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let forge = MockForge::new();
        forge.set_branch_head("acme", "widgets", "master", sha('b'));
        forge.fail_on(FailOn::BranchHead(ForgeError::RateLimited));

        let first = forge.branch_head("acme", "widgets", "master").await;
        assert!(matches!(first, Err(ForgeError::RateLimited)));

        let second = forge.branch_head("acme", "widgets", "master").await;
        assert!(second.is_ok());
    }
}
