//! forge::github
//!
//! GitHub forge implementation using the REST API.
//!
//! # Authentication
//!
//! Requests carry a bearer token when one is configured. Unauthenticated
//! requests are allowed; branch-head lookups against public repositories
//! work without a token, which is the common case on read-only CI fleets.
//!
//! # Rate Limiting
//!
//! GitHub has rate limits. This implementation returns
//! [`ForgeError::RateLimited`] when limits are hit and does not retry
//! automatically; the caller owns retry policy.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::traits::{CreatePullRequest, CreatedPull, Forge, ForgeError};
use crate::core::types::Sha;

/// Default GitHub API base URL.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "gitfarm";

/// GitHub forge implementation.
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// Bearer token, if configured
    token: Option<String>,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("has_token", &self.token.is_some())
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubForge {
    /// Create a new GitHub forge against the public API.
    pub fn new(token: Option<String>) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Create a GitHub forge with a custom API base URL.
    ///
    /// Use this for GitHub Enterprise installations
    /// (e.g., `https://github.example.com/api/v3`).
    pub fn with_api_base(token: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token,
            api_base: api_base.into(),
        }
    }

    /// Create a forge from the environment: token from
    /// `GITFARM_GITHUB_TOKEN` / `GITHUB_TOKEN`, API base from config.
    pub fn from_env(api_base: Option<&str>) -> Self {
        Self::with_api_base(
            crate::core::config::github_token(),
            api_base.unwrap_or(DEFAULT_API_BASE),
        )
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let mut headers = HeaderMap::new();

        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ForgeError::AuthFailed("token contains invalid bytes".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, owner, repo, path)
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| ForgeError::MalformedResponse(e.to_string()))
        } else {
            Err(self.handle_error_response(response, status).await)
        }
    }

    /// Map an error response from the API to a typed error.
    async fn handle_error_response(&self, response: Response, status: StatusCode) -> ForgeError {
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(format!("permission denied: {message}")),
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn branch_head(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Sha, ForgeError> {
        let url = self.repo_url(owner, repo, &format!("git/refs/heads/{branch}"));

        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let branch_ref: BranchRefResponse = self.handle_response(response).await?;

        Sha::new(branch_ref.object.sha)
            .map_err(|e| ForgeError::MalformedResponse(e.to_string()))
    }

    async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        request: CreatePullRequest,
    ) -> Result<CreatedPull, ForgeError> {
        let url = self.repo_url(owner, repo, "pulls");

        let body = serde_json::json!({
            "base": request.base,
            "body": request.body.unwrap_or_default(),
            "head": request.head,
            "title": request.title,
        });

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let pull: PullResponse = self.handle_response(response).await?;

        Ok(CreatedPull {
            number: pull.number,
            html_url: pull.html_url,
        })
    }
}

/// `GET /repos/{owner}/{repo}/git/refs/heads/{branch}` response.
#[derive(Debug, Deserialize)]
struct BranchRefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

/// `POST /repos/{owner}/{repo}/pulls` response.
#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
}

/// Error response body from the GitHub API.
#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}
