//! git::backend
//!
//! Git engine implementation using git2.
//!
//! This module provides the **single doorway** to the Git engine. All
//! repository reads and writes flow through this interface, which provides
//! structured results and normalizes errors into typed failure categories.
//!
//! # Architecture
//!
//! The `GitBackend` struct is the only way to interact with a Git repository.
//! No other module should import `git2` directly. This ensures:
//!
//! - Consistent error handling across all Git operations
//! - Strong type guarantees at the boundary
//! - A single place where transport failures are tagged as retryable
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants. The important split is
//! between [`GitError::Transport`] (retryable by policy in the workdir layer)
//! and everything else (fatal). Callers check `is_transport()` explicitly
//! instead of matching on engine exception types.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::core::types::{BranchName, Sha, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {sha}")]
    ObjectNotFound {
        /// The sha that was not found
        sha: String,
    },

    /// Named remote does not exist.
    #[error("remote not found: {name}")]
    RemoteNotFound {
        /// The remote name
        name: String,
    },

    /// Transport-layer failure (connection reset, timeout, auth handshake).
    ///
    /// This variant is the retryable kind: the workdir layer retries fetches
    /// a bounded number of times when it sees it. All other variants are
    /// fatal and must propagate.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure
        message: String,
    },

    /// Invalid sha or ref spec format.
    #[error("invalid spec: {message}")]
    InvalidSpec {
        /// Description of the problem
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Whether this failure is transport-level and therefore retryable.
    pub fn is_transport(&self) -> bool {
        matches!(self, GitError::Transport { .. })
    }

    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        use git2::ErrorClass;

        match err.class() {
            ErrorClass::Net | ErrorClass::Ssh | ErrorClass::Http => GitError::Transport {
                message: format!("{}: {}", context, err.message()),
            },
            _ => match err.code() {
                git2::ErrorCode::NotFound => {
                    if context.starts_with("refs/") || context.contains("ref") {
                        GitError::RefNotFound {
                            refname: context.to_string(),
                        }
                    } else {
                        GitError::ObjectNotFound {
                            sha: context.to_string(),
                        }
                    }
                }
                git2::ErrorCode::InvalidSpec => GitError::InvalidSpec {
                    message: format!("{}: {}", context, err.message()),
                },
                // Callback cancellation is how the fetch deadline fires.
                git2::ErrorCode::User => GitError::Transport {
                    message: format!("{}: {}", context, err.message()),
                },
                _ => GitError::Internal {
                    message: format!("{}: {}", context, err.message()),
                },
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::InvalidSpec {
            message: err.to_string(),
        }
    }
}

/// State of in-progress Git operations.
///
/// Mirrors the engine's repository state. The rebase family has three
/// distinct engine states; [`GitState::is_rebasing`] groups them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,
    /// Plain rebase in progress.
    Rebase,
    /// Interactive rebase in progress.
    RebaseInteractive,
    /// Merge-backed rebase in progress.
    RebaseMerge,
    /// Merge in progress.
    Merge,
    /// Cherry-pick in progress.
    CherryPick,
    /// Revert in progress.
    Revert,
    /// Bisect in progress.
    Bisect,
    /// Apply mailbox in progress.
    ApplyMailbox,
}

impl GitState {
    /// Check if the repository is in any rebase-family state.
    pub fn is_rebasing(&self) -> bool {
        matches!(
            self,
            GitState::Rebase | GitState::RebaseInteractive | GitState::RebaseMerge
        )
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase => "rebase",
            GitState::RebaseInteractive => "interactive rebase",
            GitState::RebaseMerge => "merge rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A named remote definition.
///
/// The canonical URL is the *first* entry in `urls` by convention; push URLs
/// follow. `fetch_specs` are the remote's configured fetch ref-specs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Remote name (e.g. "origin", "upstream")
    pub name: String,
    /// Remote URLs; first is canonical
    pub urls: Vec<String>,
    /// Configured fetch ref-specs
    pub fetch_specs: Vec<String>,
}

impl RemoteInfo {
    /// The canonical URL: the first configured URL.
    pub fn url(&self) -> &str {
        self.urls.first().map(String::as_str).unwrap_or("")
    }
}

impl std::fmt::Display for RemoteInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.url())
    }
}

/// Reset mode for [`GitBackend::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Move HEAD only.
    Soft,
    /// Move HEAD and reset the index.
    Mixed,
    /// Move HEAD, reset the index and the working tree.
    Hard,
}

impl std::fmt::Display for ResetMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetMode::Soft => write!(f, "soft"),
            ResetMode::Mixed => write!(f, "mixed"),
            ResetMode::Hard => write!(f, "hard"),
        }
    }
}

/// Why a path failed to merge during a rebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// Both sides changed the content.
    Content,
    /// The path was deleted on the branch being rebased.
    DeletedByUs,
    /// The path was deleted on the new upstream.
    DeletedByThem,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictReason::Content => write!(f, "content conflict"),
            ConflictReason::DeletedByUs => write!(f, "deleted by us"),
            ConflictReason::DeletedByThem => write!(f, "deleted by them"),
        }
    }
}

/// A single conflicting path from a failed rebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseConflict {
    /// Repository-relative path
    pub path: String,
    /// Failure reason
    pub reason: ConflictReason,
}

/// Outcome of a rebase attempt.
#[derive(Debug)]
pub enum RebaseOutcome {
    /// All operations applied; the branch now sits on the new upstream.
    Success,
    /// The rebase stopped on conflicts. The repository is left in the
    /// in-progress rebase state so the caller can inspect or abort.
    Conflicts(Vec<RebaseConflict>),
}

/// A rejected ref update from a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefRejection {
    /// The remote ref that was rejected
    pub refname: String,
    /// The server's status message
    pub message: String,
}

/// Per-instance engine options.
///
/// SSH/TLS policy is explicit construction-time configuration, not ambient
/// process state, so tests and parallel jobs can differ per instance.
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// Accept SSH host keys that are not in known_hosts.
    pub accept_unknown_hosts: bool,
}

/// The Git engine interface.
///
/// This is the **single point of interaction** with Git. All repository
/// reads and writes flow through this interface. No other module should
/// import `git2` directly.
pub struct GitBackend {
    /// The underlying git2 repository
    repo: git2::Repository,
    /// Engine options
    options: BackendOptions,
}

impl std::fmt::Debug for GitBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitBackend")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl GitBackend {
    // =========================================================================
    // Opening and info
    // =========================================================================

    /// Open the repository whose working tree is at `path`.
    ///
    /// Unlike discovery-based opening, this requires `path` itself to be the
    /// repository root; CI drivers always know the exact clone location.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` is not a repository
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        Self::open_with(path, BackendOptions::default())
    }

    /// Open with explicit engine options.
    pub fn open_with(path: &Path, options: BackendOptions) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo, options })
    }

    /// Path to the `.git` directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Path to the working directory.
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    // =========================================================================
    // State detection
    // =========================================================================

    /// Get the current repository state (rebase, merge, etc.).
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase => GitState::Rebase,
            git2::RepositoryState::RebaseInteractive => GitState::RebaseInteractive,
            git2::RepositoryState::RebaseMerge => GitState::RebaseMerge,
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    // =========================================================================
    // Refs and commits
    // =========================================================================

    /// The current branch name, or `None` when HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None) // Detached HEAD
    }

    /// HEAD commit sha.
    pub fn head_sha(&self) -> Result<Sha, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();

        Sha::new(oid.to_string()).map_err(Into::into)
    }

    /// Look up a commit by sha. Returns `None` if no such commit exists.
    pub fn find_commit(&self, sha: &Sha) -> Result<Option<Sha>, GitError> {
        let oid = git2::Oid::from_str(sha.as_str())
            .map_err(|e| GitError::from_git2(e, sha.as_str()))?;

        match self.repo.find_commit(oid) {
            Ok(commit) => Ok(Some(Sha::new(commit.id().to_string())?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, sha.as_str())),
        }
    }

    /// List branch ref names: all of `refs/heads/*` and `refs/remotes/*`.
    pub fn branch_refs(&self) -> Result<Vec<String>, GitError> {
        let mut refs = self.refs_matching("refs/heads/*")?;
        refs.extend(self.refs_matching("refs/remotes/*")?);
        Ok(refs)
    }

    /// List full ref names under the local-heads namespace.
    pub fn local_branch_refs(&self) -> Result<Vec<String>, GitError> {
        self.refs_matching("refs/heads/*")
    }

    fn refs_matching(&self, pattern: &str) -> Result<Vec<String>, GitError> {
        let refs = self
            .repo
            .references_glob(pattern)
            .map_err(|e| GitError::from_git2(e, pattern))?;

        let mut names = Vec::new();
        for reference in refs {
            let reference = reference.map_err(|e| GitError::from_git2(e, pattern))?;
            if let Some(name) = reference.name() {
                names.push(name.to_string());
            }
        }

        Ok(names)
    }

    // =========================================================================
    // Branch lifecycle
    // =========================================================================

    /// Create a local branch at `start`, or at HEAD when `start` is `None`.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if `start` does not resolve to a commit
    /// - [`GitError::Internal`] if the branch exists and `force` is false
    pub fn create_branch(
        &self,
        name: &BranchName,
        force: bool,
        start: Option<&Sha>,
    ) -> Result<(), GitError> {
        let commit = match start {
            Some(sha) => {
                let oid = git2::Oid::from_str(sha.as_str())
                    .map_err(|e| GitError::from_git2(e, sha.as_str()))?;
                self.repo
                    .find_commit(oid)
                    .map_err(|e| GitError::from_git2(e, sha.as_str()))?
            }
            None => self
                .repo
                .head()
                .and_then(|head| head.peel_to_commit())
                .map_err(|e| GitError::from_git2(e, "HEAD"))?,
        };

        self.repo
            .branch(name.as_str(), &commit, force)
            .map_err(|e| GitError::from_git2(e, name.as_str()))?;

        Ok(())
    }

    /// Force-delete a local branch.
    pub fn delete_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let mut branch = self
            .repo
            .find_branch(name.as_str(), git2::BranchType::Local)
            .map_err(|e| GitError::from_git2(e, &format!("refs/heads/{name}")))?;

        branch
            .delete()
            .map_err(|e| GitError::from_git2(e, name.as_str()))?;

        Ok(())
    }

    // =========================================================================
    // Remotes
    // =========================================================================

    /// List all configured remotes.
    pub fn list_remotes(&self) -> Result<Vec<RemoteInfo>, GitError> {
        let names = self.repo.remotes().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        let mut remotes = Vec::new();
        for name in names.iter().flatten() {
            let remote = self
                .repo
                .find_remote(name)
                .map_err(|e| GitError::from_git2(e, name))?;

            let mut urls = Vec::new();
            if let Some(url) = remote.url() {
                urls.push(url.to_string());
            }
            if let Some(push_url) = remote.pushurl() {
                urls.push(push_url.to_string());
            }

            let fetch_specs = remote
                .fetch_refspecs()
                .map_err(|e| GitError::from_git2(e, name))?
                .iter()
                .flatten()
                .map(String::from)
                .collect();

            remotes.push(RemoteInfo {
                name: name.to_string(),
                urls,
                fetch_specs,
            });
        }

        Ok(remotes)
    }

    /// Add a remote. The engine itself rejects duplicates; existence checks
    /// and force semantics live in the workdir layer.
    pub fn add_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.repo
            .remote(name, url)
            .map_err(|e| GitError::from_git2(e, name))?;

        Ok(())
    }

    /// Remove a remote by name.
    pub fn remove_remote(&self, name: &str) -> Result<(), GitError> {
        match self.repo.remote_delete(name) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Err(GitError::RemoteNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(GitError::from_git2(e, name)),
        }
    }

    /// List branch heads advertised by the remote at `url` (ls-remote).
    ///
    /// Returns full `refs/heads/*` names as the server reports them.
    pub fn remote_branch_refs(&self, url: &str) -> Result<Vec<String>, GitError> {
        let mut remote = self
            .repo
            .remote_anonymous(url)
            .map_err(|e| GitError::from_git2(e, url))?;

        let connection = remote
            .connect_auth(git2::Direction::Fetch, Some(self.remote_callbacks(None)), None)
            .map_err(|e| GitError::from_git2(e, url))?;

        let heads = connection
            .list()
            .map_err(|e| GitError::from_git2(e, url))?
            .iter()
            .map(|head| head.name().to_string())
            .filter(|name| name.starts_with("refs/heads/"))
            .collect();

        Ok(heads)
    }

    // =========================================================================
    // Fetch and push
    // =========================================================================

    /// Fetch `refspecs` from the remote at `url`, canceling when the
    /// transfer outlives `deadline`.
    ///
    /// Deadline expiry surfaces as [`GitError::Transport`], the same
    /// retryable category as a connection reset.
    pub fn fetch(
        &self,
        url: &str,
        refspecs: &[String],
        deadline: Duration,
    ) -> Result<(), GitError> {
        let mut remote = self
            .repo
            .remote_anonymous(url)
            .map_err(|e| GitError::from_git2(e, url))?;

        let mut fetch_options = git2::FetchOptions::new();
        fetch_options.remote_callbacks(self.remote_callbacks(Some(Instant::now() + deadline)));

        let specs: Vec<&str> = refspecs.iter().map(String::as_str).collect();

        remote
            .fetch(&specs, Some(&mut fetch_options), None)
            .map_err(|e| GitError::from_git2(e, url))?;

        Ok(())
    }

    /// Push a single refspec to the remote at `url`.
    ///
    /// Returns the per-ref rejections the server reported. An empty list
    /// means every ref update was accepted. Transport failures are errors;
    /// rejected updates are not.
    pub fn push(&self, url: &str, refspec: &str) -> Result<Vec<RefRejection>, GitError> {
        use std::cell::RefCell;

        let mut remote = self
            .repo
            .remote_anonymous(url)
            .map_err(|e| GitError::from_git2(e, url))?;

        let rejections: RefCell<Vec<RefRejection>> = RefCell::new(Vec::new());

        let mut callbacks = self.remote_callbacks(None);
        callbacks.push_update_reference(|refname, status| {
            if let Some(message) = status {
                rejections.borrow_mut().push(RefRejection {
                    refname: refname.to_string(),
                    message: message.to_string(),
                });
            }
            Ok(())
        });

        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(callbacks);

        remote
            .push(&[refspec], Some(&mut push_options))
            .map_err(|e| GitError::from_git2(e, url))?;

        drop(push_options);
        Ok(rejections.into_inner())
    }

    /// Build remote callbacks: credentials, host-key policy, and an optional
    /// transfer deadline.
    fn remote_callbacks(&self, deadline: Option<Instant>) -> git2::RemoteCallbacks<'_> {
        let mut callbacks = git2::RemoteCallbacks::new();

        callbacks.credentials(|_url, username_from_url, allowed| {
            if allowed.contains(git2::CredentialType::SSH_KEY) {
                let username = username_from_url.unwrap_or("git");
                return git2::Cred::ssh_key_from_agent(username);
            }
            git2::Cred::default()
        });

        if self.options.accept_unknown_hosts {
            callbacks.certificate_check(|_cert, _host| {
                Ok(git2::CertificateCheckStatus::CertificateOk)
            });
        }

        if let Some(deadline) = deadline {
            callbacks.transfer_progress(move |_progress| Instant::now() < deadline);
        }

        callbacks
    }

    // =========================================================================
    // Staging and committing
    // =========================================================================

    /// Stage paths matching `pathspec` into the index.
    pub fn stage(&self, pathspec: &str) -> Result<(), GitError> {
        let mut index = self.repo.index().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        index
            .add_all([pathspec], git2::IndexAddOption::DEFAULT, None)
            .map_err(|e| GitError::from_git2(e, pathspec))?;

        index.write().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        Ok(())
    }

    /// Commit the staged index to the current branch.
    ///
    /// Author and committer come from the repository's configured identity.
    pub fn commit_staged(&self, message: &str) -> Result<Sha, GitError> {
        let signature = self.repo.signature().map_err(|e| GitError::Internal {
            message: format!("no committer identity configured: {}", e.message()),
        })?;

        let mut index = self.repo.index().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        let tree_oid = index.write_tree().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        let tree = self
            .repo
            .find_tree(tree_oid)
            .map_err(|e| GitError::from_git2(e, "index tree"))?;

        let parent = match self.repo.head() {
            Ok(head) => Some(
                head.peel_to_commit()
                    .map_err(|e| GitError::from_git2(e, "HEAD"))?,
            ),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };

        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        Sha::new(oid.to_string()).map_err(Into::into)
    }

    // =========================================================================
    // Reset and clean
    // =========================================================================

    /// Reset the current branch to `refname` with the given mode.
    pub fn reset(&self, refname: &str, mode: ResetMode) -> Result<(), GitError> {
        let object = self
            .repo
            .revparse_single(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let kind = match mode {
            ResetMode::Soft => git2::ResetType::Soft,
            ResetMode::Mixed => git2::ResetType::Mixed,
            ResetMode::Hard => git2::ResetType::Hard,
        };

        self.repo
            .reset(&object, kind, None)
            .map_err(|e| GitError::from_git2(e, refname))?;

        Ok(())
    }

    /// Remove untracked and ignored files and directories from the working
    /// tree (the `clean -dfx` surface).
    pub fn clean(&self) -> Result<(), GitError> {
        let work_dir = self.work_dir()?.to_path_buf();

        let mut options = git2::StatusOptions::new();
        options
            .include_untracked(true)
            .include_ignored(true)
            .recurse_untracked_dirs(false)
            .recurse_ignored_dirs(false);

        let statuses = self
            .repo
            .statuses(Some(&mut options))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        for entry in statuses.iter() {
            let status = entry.status();
            if !status.is_wt_new() && !status.is_ignored() {
                continue;
            }

            let Some(path) = entry.path() else { continue };
            let target = work_dir.join(path);

            let result = if target.is_dir() {
                std::fs::remove_dir_all(&target)
            } else {
                std::fs::remove_file(&target)
            };

            if let Err(e) = result {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(GitError::Internal {
                        message: format!("cannot remove {}: {}", target.display(), e),
                    });
                }
            }
        }

        Ok(())
    }

    // =========================================================================
    // Rebase
    // =========================================================================

    /// Rebase the current branch onto the commit at `upstream`.
    ///
    /// On conflict the repository is left in the in-progress rebase state and
    /// the conflicting paths are returned in the outcome; callers decide
    /// whether to abort.
    pub fn rebase_onto(&self, upstream: &Sha) -> Result<RebaseOutcome, GitError> {
        let oid = git2::Oid::from_str(upstream.as_str())
            .map_err(|e| GitError::from_git2(e, upstream.as_str()))?;

        let upstream_commit = self
            .repo
            .find_annotated_commit(oid)
            .map_err(|e| GitError::from_git2(e, upstream.as_str()))?;

        let signature = self.repo.signature().map_err(|e| GitError::Internal {
            message: format!("no committer identity configured: {}", e.message()),
        })?;

        let mut rebase_options = git2::RebaseOptions::new();
        let mut rebase = self
            .repo
            .rebase(None, Some(&upstream_commit), None, Some(&mut rebase_options))
            .map_err(|e| GitError::from_git2(e, upstream.as_str()))?;

        while let Some(operation) = rebase.next() {
            operation.map_err(|e| GitError::from_git2(e, upstream.as_str()))?;

            let conflicts = self.index_conflicts()?;
            if !conflicts.is_empty() {
                return Ok(RebaseOutcome::Conflicts(conflicts));
            }

            match rebase.commit(None, &signature, None) {
                Ok(_) => {}
                // A patch already present upstream produces nothing to commit.
                Err(e) if e.code() == git2::ErrorCode::Applied => {}
                Err(e) => return Err(GitError::from_git2(e, upstream.as_str())),
            }
        }

        rebase
            .finish(Some(&signature))
            .map_err(|e| GitError::from_git2(e, upstream.as_str()))?;

        Ok(RebaseOutcome::Success)
    }

    /// Abort the in-progress rebase. Callers must check [`GitBackend::state`]
    /// first; aborting with no rebase in progress is an engine error.
    pub fn abort_rebase(&self) -> Result<(), GitError> {
        let mut rebase = self
            .repo
            .open_rebase(None)
            .map_err(|e| GitError::from_git2(e, "rebase"))?;

        rebase
            .abort()
            .map_err(|e| GitError::from_git2(e, "rebase"))?;

        Ok(())
    }

    /// Collect the conflicting paths currently recorded in the index.
    fn index_conflicts(&self) -> Result<Vec<RebaseConflict>, GitError> {
        let index = self.repo.index().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        if !index.has_conflicts() {
            return Ok(Vec::new());
        }

        let mut conflicts = Vec::new();
        let iter = index.conflicts().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        for conflict in iter {
            let conflict = conflict.map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

            let reason = match (&conflict.our, &conflict.their) {
                (None, _) => ConflictReason::DeletedByUs,
                (_, None) => ConflictReason::DeletedByThem,
                _ => ConflictReason::Content,
            };

            let entry = conflict
                .our
                .as_ref()
                .or(conflict.their.as_ref())
                .or(conflict.ancestor.as_ref());

            if let Some(entry) = entry {
                conflicts.push(RebaseConflict {
                    path: String::from_utf8_lossy(&entry.path).into_owned(),
                    reason,
                });
            }
        }

        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod git_error {
        use super::*;

        #[test]
        fn transport_is_retryable() {
            let err = GitError::Transport {
                message: "connection reset".into(),
            };
            assert!(err.is_transport());
        }

        #[test]
        fn other_variants_are_fatal() {
            let fatal = [
                GitError::NotARepo {
                    path: PathBuf::from("/tmp/x"),
                },
                GitError::BareRepo,
                GitError::RefNotFound {
                    refname: "refs/heads/main".into(),
                },
                GitError::ObjectNotFound { sha: "abc".into() },
                GitError::RemoteNotFound {
                    name: "upstream".into(),
                },
                GitError::InvalidSpec {
                    message: "bad".into(),
                },
                GitError::Internal {
                    message: "oops".into(),
                },
            ];
            for err in fatal {
                assert!(!err.is_transport(), "{err} must not be retryable");
            }
        }

        #[test]
        fn display_names_the_target() {
            let err = GitError::RemoteNotFound {
                name: "upstream".into(),
            };
            assert!(err.to_string().contains("upstream"));
        }
    }

    mod git_state {
        use super::*;

        #[test]
        fn rebase_family_detection() {
            assert!(GitState::Rebase.is_rebasing());
            assert!(GitState::RebaseInteractive.is_rebasing());
            assert!(GitState::RebaseMerge.is_rebasing());

            assert!(!GitState::Clean.is_rebasing());
            assert!(!GitState::Merge.is_rebasing());
            assert!(!GitState::CherryPick.is_rebasing());
            assert!(!GitState::Bisect.is_rebasing());
        }

        #[test]
        fn display_formatting() {
            assert_eq!(format!("{}", GitState::Clean), "clean");
            assert_eq!(format!("{}", GitState::RebaseMerge), "merge rebase");
        }
    }

    mod remote_info {
        use super::*;

        #[test]
        fn canonical_url_is_first() {
            let remote = RemoteInfo {
                name: "origin".into(),
                urls: vec![
                    "git@github.com:acme/widgets.git".into(),
                    "https://github.com/acme/widgets.git".into(),
                ],
                fetch_specs: vec!["+refs/heads/*:refs/remotes/origin/*".into()],
            };
            assert_eq!(remote.url(), "git@github.com:acme/widgets.git");
        }

        #[test]
        fn empty_urls_yield_empty_canonical() {
            let remote = RemoteInfo {
                name: "broken".into(),
                urls: vec![],
                fetch_specs: vec![],
            };
            assert_eq!(remote.url(), "");
        }
    }

    mod conflict_reason {
        use super::*;

        #[test]
        fn display_formatting() {
            assert_eq!(format!("{}", ConflictReason::Content), "content conflict");
            assert_eq!(format!("{}", ConflictReason::DeletedByUs), "deleted by us");
            assert_eq!(
                format!("{}", ConflictReason::DeletedByThem),
                "deleted by them"
            );
        }
    }
}
