//! workdir::identity
//!
//! Repository identity derived from the upstream remote URL.
//!
//! # Parsing rules
//!
//! - repository name: the segment between the last `/` and `.git`
//!   (or the end of the URL when the suffix is absent)
//! - repository username: the first path segment after the host:
//!   `https://host/<user>/...` or `git@host:<user>/...`
//!
//! # Name normalization
//!
//! Derived names drop the `-ee` and `-private` environment suffixes so that
//! internal clones report the public repository name. The suffix is kept
//! when the upstream branch is itself an internal line (contains `ee-` or
//! `-private`), and for the two repositories that exist only internally and
//! have no public counterpart. This table is organizational convention;
//! treat it as data, not as a policy to generalize.

use thiserror::Error;

/// Repositories that never have a public counterpart; their names are
/// reported as-is.
const ALWAYS_INTERNAL: [&str; 2] = ["liferay-jenkins-ee", "liferay-jenkins-tools-private"];

/// Suffixes stripped during normalization.
const INTERNAL_SUFFIXES: [&str; 2] = ["-ee", "-private"];

/// Branch-name markers indicating an internal upstream line.
const INTERNAL_BRANCH_MARKERS: [&str; 2] = ["ee-", "-private"];

/// Errors from identity parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The URL has no parseable repository segment.
    #[error("cannot derive repository name from url: {0}")]
    UnparseableName(String),

    /// The URL has no parseable username segment.
    #[error("cannot derive repository username from url: {0}")]
    UnparseableUsername(String),
}

/// Repository identity: the normalized name and the owning username,
/// both derived once from the upstream remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity {
    /// Normalized repository name
    pub name: String,
    /// Repository owner (user or organization)
    pub username: String,
}

impl RepoIdentity {
    /// Derive the identity from an upstream remote URL.
    ///
    /// `upstream_branch` drives name normalization (see module docs).
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when either segment cannot be parsed.
    pub fn from_upstream_url(url: &str, upstream_branch: &str) -> Result<Self, IdentityError> {
        let raw_name = repository_name_from_url(url)
            .ok_or_else(|| IdentityError::UnparseableName(url.to_string()))?;
        let username = repository_username_from_url(url)
            .ok_or_else(|| IdentityError::UnparseableUsername(url.to_string()))?;

        Ok(Self {
            name: normalize_repository_name(raw_name, upstream_branch),
            username,
        })
    }
}

/// Extract the raw repository name: between the last `/` and `.git`.
pub fn repository_name_from_url(url: &str) -> Option<&str> {
    let tail = &url[url.rfind('/')? + 1..];
    let name = tail.strip_suffix(".git").unwrap_or(tail);

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Extract the username: the first path segment after the host.
///
/// Accepts `https://host/<user>/<repo>` and `git@host:<user>/<repo>` forms.
pub fn repository_username_from_url(url: &str) -> Option<String> {
    let path = if let Some(rest) = url.strip_prefix("https://").or(url.strip_prefix("http://")) {
        // Skip the host segment
        let (_host, path) = rest.split_once('/')?;
        path
    } else if let Some((_, rest)) = url.split_once(':') {
        // scp-like form: git@host:user/repo.git
        rest
    } else {
        return None;
    };

    let user = path.split('/').next()?;

    if user.is_empty() {
        None
    } else {
        Some(user.to_string())
    }
}

/// Apply the environment-suffix normalization rule.
pub fn normalize_repository_name(name: &str, upstream_branch: &str) -> String {
    let internal_branch = INTERNAL_BRANCH_MARKERS
        .iter()
        .any(|marker| upstream_branch.contains(marker));

    if internal_branch || ALWAYS_INTERNAL.contains(&name) {
        return name.to_string();
    }

    let mut normalized = name.to_string();
    for suffix in INTERNAL_SUFFIXES {
        normalized = normalized.replace(suffix, "");
    }

    normalized
}

/// Extract the GitHub owner from a remote URL.
///
/// Handles both HTTPS and SSH URL forms:
/// - `https://github.com/owner/repo.git` -> `Some("owner")`
/// - `git@github.com:owner/repo.git` -> `Some("owner")`
///
/// Returns `None` for URLs that do not reference github.com; callers turn
/// that into their own typed error.
pub fn github_owner(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("git@github.com:"))?;

    let owner = rest.split('/').next()?;

    if owner.is_empty() {
        None
    } else {
        Some(owner.to_string())
    }
}

/// The companion repository that ships alongside `name`, if any.
///
/// Portal and plugins releases are cut together, so jobs that prepare one
/// usually need the clone of the other.
pub fn companion_repository(name: &str) -> Option<&'static str> {
    match name {
        "liferay-plugins" => Some("liferay-portal"),
        "liferay-plugins-ee" => Some("liferay-portal-ee"),
        "liferay-portal" => Some("liferay-plugins"),
        "liferay-portal-ee" => Some("liferay-plugins-ee"),
        _ => None,
    }
}
