//! forge::traits
//!
//! Forge trait definition for the GitHub REST surface the workdir layer
//! consumes: branch-head lookup and pull-request creation.
//!
//! # Design
//!
//! The `Forge` trait is async because forge operations involve network I/O.
//! Owner and repository are per-call parameters rather than construction-time
//! state: a single working directory talks to several forks (upstream, the
//! sender's fork, ad-hoc pull-request sources), so binding one owner at
//! construction would force a forge instance per remote.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::Sha;

/// Errors from forge operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Request to create a pull request.
#[derive(Debug, Clone)]
pub struct CreatePullRequest {
    /// Base branch name (the branch to merge into)
    pub base: String,
    /// Head in `user:branch` form
    pub head: String,
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: Option<String>,
}

/// A created pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPull {
    /// PR number
    pub number: u64,
    /// Web URL for viewing the PR
    pub html_url: String,
}

/// The Forge trait for the remote hosting service.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, ForgeError>`. Callers should handle:
/// - `AuthFailed`: token missing, expired, or under-scoped
/// - `NotFound`: repository or branch doesn't exist
/// - `RateLimited`: back off and retry
/// - `NetworkError`: check connectivity
#[async_trait]
pub trait Forge: Send + Sync {
    /// Get the forge name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Look up the commit sha at the head of `branch` in `owner/repo`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the repository or branch doesn't exist
    /// - `MalformedResponse` if the ref payload lacks the commit object
    async fn branch_head(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Sha, ForgeError>;

    /// Create a pull request against `owner/repo`.
    ///
    /// # Errors
    ///
    /// - `ApiError` with status 422 if validation fails (e.g., head missing)
    /// - `AuthFailed` if the token lacks permission
    async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        request: CreatePullRequest,
    ) -> Result<CreatedPull, ForgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forge_error_display() {
        assert_eq!(
            format!("{}", ForgeError::AuthFailed("expired token".into())),
            "authentication failed: expired token"
        );
        assert_eq!(
            format!("{}", ForgeError::NotFound("acme/widgets".into())),
            "not found: acme/widgets"
        );
        assert_eq!(format!("{}", ForgeError::RateLimited), "rate limited");
        assert_eq!(
            format!(
                "{}",
                ForgeError::ApiError {
                    status: 422,
                    message: "Validation failed".into()
                }
            ),
            "API error: 422 - Validation failed"
        );
        assert_eq!(
            format!("{}", ForgeError::NetworkError("connection refused".into())),
            "network error: connection refused"
        );
    }
}
