//! workdir::handle
//!
//! The working-directory handle.
//!
//! # Architecture
//!
//! A [`WorkingDirectory`] owns one local clone for the lifetime of a CI
//! task: its paths, the Git engine handle, the forge handle, the remote
//! cache, and the retry/wait policies. Callers drive every repository
//! operation through it.
//!
//! # Concurrency
//!
//! One logical owner per working directory. The index-lock wait defends
//! against *external* Git processes touching the same tree; it does not make
//! the handle safe for concurrent callers. The one internally serialized
//! region is push configure-and-execute, because two logical pushes sharing
//! the handle must not interleave ref-spec setup with execution. Everything
//! else is unsynchronized by design; use one handle per clone.
//!
//! # Waits and retries
//!
//! - Index lock and checkout convergence: bounded polls with a fixed delay
//!   ([`PollPolicy`], default 24 attempts x 5s); timeout is the only stop
//!   condition.
//! - Fetch: immediate retry, no backoff, on transport failures only, at most
//!   [`FETCH_TRANSPORT_RETRIES`] times. Unbounded retry would mask permanent
//!   failures such as revoked credentials.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::core::types::{BranchName, Sha, TypeError};
use crate::forge::{CreatePullRequest, Forge, ForgeError};
use crate::forge::github::GitHubForge;
use crate::git::{
    BackendOptions, GitBackend, GitError, RebaseConflict, RebaseOutcome, RemoteInfo, ResetMode,
};
use crate::workdir::identity::{self, IdentityError, RepoIdentity};
use crate::workdir::remotes::RemoteCache;

/// The remote from which repository identity is derived.
pub const UPSTREAM_REMOTE: &str = "upstream";

/// Name of the transient remote used by URL pushes.
const TEMP_REMOTE: &str = "temp";

/// Bounded retry count for transport-level fetch failures. The count is
/// deliberately not configurable: unbounded retry masks revoked credentials
/// and dead remotes.
pub const FETCH_TRANSPORT_RETRIES: u32 = 3;

/// Default network budget for a single fetch attempt.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(360);

/// Errors from working-directory operations.
#[derive(Debug, Error)]
pub enum WorkdirError {
    /// The working directory or its `.git` subdirectory does not exist.
    #[error("{path} is unavailable")]
    NotFound {
        /// The missing path
        path: PathBuf,
    },

    /// No `upstream` remote is configured; identity cannot be derived.
    #[error("no 'upstream' remote is configured")]
    UpstreamMissing,

    /// The upstream URL could not be parsed into an identity.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A GitHub operation was requested against a non-GitHub remote.
    #[error("remote '{remote}' does not point to a GitHub repository")]
    NotGitHubRemote {
        /// The offending remote name
        remote: String,
    },

    /// Adding a remote that already exists, without force.
    #[error("remote '{name}' already exists")]
    RemoteAlreadyExists {
        /// The remote name
        name: String,
    },

    /// Removing a remote that is not configured.
    #[error("unable to remove remote '{name}' because it does not exist")]
    RemoteNotFound {
        /// The remote name
        name: String,
    },

    /// HEAD is detached; there is no current branch.
    #[error("HEAD is detached; no current branch")]
    DetachedHead,

    /// The checkout command itself failed.
    #[error("unable to checkout branch '{branch}': {message}")]
    CheckoutFailed {
        /// The target branch
        branch: String,
        /// Captured failure output
        message: String,
    },

    /// Checkout did not converge within the poll budget.
    #[error("timed out waiting for checkout of branch '{branch}'")]
    CheckoutTimeout {
        /// The target branch
        branch: String,
    },

    /// A sha did not resolve to a commit.
    #[error("commit not found: {sha}")]
    CommitNotFound {
        /// The unresolvable sha
        sha: Sha,
    },

    /// A rebase stopped on conflicts.
    ///
    /// Carries the conflicting paths so callers can report or bail without
    /// re-reading the repository.
    #[error("rebase failed with {} conflicting path(s)", conflicts.len())]
    RebaseFailed {
        /// Path-level conflict detail
        conflicts: Vec<RebaseConflict>,
    },

    /// Could not read a repository file (e.g. `.git/HEAD`).
    #[error("unable to read {path}: {source}")]
    Io {
        /// The unreadable path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Git engine failure.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Forge failure.
    #[error(transparent)]
    Forge(#[from] ForgeError),

    /// Invalid branch name or sha.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Bounded polling policy: fixed attempt count, fixed delay.
///
/// Kept as explicit data so tests can run the same state machines with
/// near-zero delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of poll attempts
    pub attempts: u32,
    /// Delay between attempts
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 24,
            interval: Duration::from_secs(5),
        }
    }
}

/// Options for checkout.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutOptions {
    /// Pass `-f`, discarding local modifications
    pub force: bool,
}

impl Default for CheckoutOptions {
    fn default() -> Self {
        Self { force: true }
    }
}

/// Construction options for [`WorkingDirectory`].
#[derive(Default)]
pub struct WorkdirOptions {
    /// Upstream branch name; defaults to `master`
    pub upstream_branch: Option<BranchName>,
    /// Engine options (SSH/TLS policy)
    pub backend: BackendOptions,
    /// Lock and convergence polling policy
    pub poll: PollPolicy,
    /// Network budget per fetch attempt
    pub fetch_timeout: Option<Duration>,
    /// Forge override; defaults to [`GitHubForge::from_env`]
    pub forge: Option<Arc<dyn Forge>>,
    /// GitHub API base override (Enterprise installs)
    pub api_base: Option<String>,
}

/// A handle over one local clone.
///
/// Owns the on-disk state (git directory, work tree), the engine and forge
/// handles, and the cached remote configuration. Constructed once per
/// working directory for the lifetime of a CI task.
pub struct WorkingDirectory {
    work_dir: PathBuf,
    git_dir: PathBuf,
    upstream_branch: BranchName,
    repository_name: String,
    repository_username: String,
    backend: GitBackend,
    forge: Arc<dyn Forge>,
    remotes: Mutex<RemoteCache>,
    /// Serializes push configure-and-execute
    push_lock: Mutex<()>,
    poll: PollPolicy,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for WorkingDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingDirectory")
            .field("work_dir", &self.work_dir)
            .field("repository_name", &self.repository_name)
            .field("repository_username", &self.repository_username)
            .field("upstream_branch", &self.upstream_branch)
            .finish()
    }
}

impl WorkingDirectory {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Open the working directory at `path` with default options.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WorkdirError> {
        Self::open_with(path, WorkdirOptions::default())
    }

    /// Open the working directory at `path`.
    ///
    /// Validates that `path` and `path/.git` exist, waits for any external
    /// index lock to clear, opens the engine, and derives the repository
    /// identity from the `upstream` remote's URL.
    ///
    /// # Errors
    ///
    /// - [`WorkdirError::NotFound`] when a directory is missing
    /// - [`WorkdirError::UpstreamMissing`] when no `upstream` remote exists
    /// - [`WorkdirError::Identity`] when the upstream URL is unparseable
    pub fn open_with(
        path: impl Into<PathBuf>,
        options: WorkdirOptions,
    ) -> Result<Self, WorkdirError> {
        let work_dir = path.into();

        if !work_dir.exists() {
            return Err(WorkdirError::NotFound { path: work_dir });
        }

        let git_dir = work_dir.join(".git");
        if !git_dir.exists() {
            return Err(WorkdirError::NotFound { path: git_dir });
        }

        let poll = options.poll;
        wait_for_index_lock_in(&git_dir, &poll);

        let backend = GitBackend::open_with(&work_dir, options.backend)?;

        let upstream_branch = options
            .upstream_branch
            .unwrap_or_else(|| BranchName::new("master").expect("literal branch name is valid"));

        let remote_list = backend.list_remotes()?;
        let upstream = remote_list
            .iter()
            .find(|remote| remote.name == UPSTREAM_REMOTE)
            .ok_or(WorkdirError::UpstreamMissing)?;

        let RepoIdentity { name, username } =
            RepoIdentity::from_upstream_url(upstream.url(), upstream_branch.as_str())?;

        let forge = options
            .forge
            .unwrap_or_else(|| Arc::new(GitHubForge::from_env(options.api_base.as_deref())));

        Ok(Self {
            work_dir,
            git_dir,
            upstream_branch,
            repository_name: name,
            repository_username: username,
            backend,
            forge,
            remotes: Mutex::new(RemoteCache::Loaded(remote_list)),
            push_lock: Mutex::new(()),
            poll,
            fetch_timeout: options.fetch_timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The working-directory path.
    pub fn working_directory(&self) -> &Path {
        &self.work_dir
    }

    /// The `.git` directory path.
    pub fn git_directory(&self) -> &Path {
        &self.git_dir
    }

    /// The upstream branch used as rebase and pull-request base.
    pub fn upstream_branch_name(&self) -> &BranchName {
        &self.upstream_branch
    }

    /// The normalized repository name derived at construction.
    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    /// The repository owner derived at construction.
    pub fn repository_username(&self) -> &str {
        &self.repository_username
    }

    /// The repository that ships alongside this one, if any.
    pub fn companion_repository_name(&self) -> Option<&'static str> {
        identity::companion_repository(&self.repository_name)
    }

    // =========================================================================
    // Branch operations
    // =========================================================================

    /// The current branch name.
    ///
    /// Waits for the index lock first; reading HEAD while an external
    /// process rewrites the index races otherwise.
    pub fn current_branch(&self) -> Result<BranchName, WorkdirError> {
        self.wait_for_index_lock();

        self.backend
            .current_branch()?
            .ok_or(WorkdirError::DetachedHead)
    }

    /// Check out `branch` with default (force) options.
    ///
    /// See [`WorkingDirectory::checkout_branch_with`].
    pub async fn checkout_branch(&self, branch: &str) -> Result<(), WorkdirError> {
        self.checkout_branch_with(branch, CheckoutOptions::default())
            .await
    }

    /// Check out `branch`, then poll until HEAD reflects the target.
    ///
    /// Two convergence modes:
    /// - a plain local name converges when `.git/HEAD` reads
    ///   `ref: refs/heads/<branch>`;
    /// - a `<remote>/<branch>` name converges when HEAD's raw sha equals the
    ///   sha GitHub reports for that branch. Remote-tracking checkouts race
    ///   with asynchronous fetch propagation, so HEAD alone cannot confirm
    ///   them.
    ///
    /// # Errors
    ///
    /// - [`WorkdirError::CheckoutFailed`] when the checkout command fails
    /// - [`WorkdirError::CheckoutTimeout`] when the poll budget is exhausted
    pub async fn checkout_branch_with(
        &self,
        branch: &str,
        options: CheckoutOptions,
    ) -> Result<(), WorkdirError> {
        info!("checkout branch {branch}");

        self.wait_for_index_lock();

        let mut command = Command::new("git");
        command.current_dir(&self.work_dir).arg("checkout");
        if options.force {
            command.arg("-f");
        }
        command.arg(branch);

        let output = command.output().map_err(|e| WorkdirError::CheckoutFailed {
            branch: branch.to_string(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(WorkdirError::CheckoutFailed {
                branch: branch.to_string(),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        self.wait_for_checkout_convergence(branch).await?;

        Ok(())
    }

    /// Poll `.git/HEAD` until it matches the checkout target.
    ///
    /// Returns the number of polls that found HEAD not yet converged.
    async fn wait_for_checkout_convergence(&self, branch: &str) -> Result<u32, WorkdirError> {
        let head_path = self.git_dir.join("HEAD");

        for attempt in 0..self.poll.attempts {
            let head_content = std::fs::read_to_string(&head_path)
                .map_err(|e| WorkdirError::Io {
                    path: head_path.clone(),
                    source: e,
                })?
                .trim()
                .to_string();

            match branch.split_once('/') {
                None => {
                    if head_content == format!("ref: refs/heads/{branch}") {
                        return Ok(attempt);
                    }
                }
                Some((remote_name, remote_branch)) => {
                    let remote = self
                        .remote_config(remote_name)?
                        .ok_or_else(|| WorkdirError::RemoteNotFound {
                            name: remote_name.to_string(),
                        })?;

                    let github_commit = self.github_branch_commit(remote_branch, &remote).await?;

                    debug!(
                        "head: \"{head_content}\", github branch commit: \"{github_commit}\""
                    );

                    if head_content == github_commit.as_str() {
                        return Ok(attempt);
                    }
                }
            }

            info!("waiting for branch {branch} to be updated");
            tokio::time::sleep(self.poll.interval).await;
        }

        Err(WorkdirError::CheckoutTimeout {
            branch: branch.to_string(),
        })
    }

    /// Create a local branch at HEAD.
    pub fn create_local_branch(&self, name: &BranchName) -> Result<(), WorkdirError> {
        self.create_local_branch_at(name, false, None)
    }

    /// Create a local branch at `start` (HEAD when `None`).
    pub fn create_local_branch_at(
        &self,
        name: &BranchName,
        force: bool,
        start: Option<&Sha>,
    ) -> Result<(), WorkdirError> {
        info!(
            "create branch {name} force {force} at {}",
            start.map(Sha::as_str).unwrap_or("HEAD")
        );

        self.backend.create_branch(name, force, start)?;

        Ok(())
    }

    /// Force-delete a local branch.
    pub fn delete_local_branch(&self, name: &BranchName) -> Result<(), WorkdirError> {
        info!("delete local branch {name}");

        self.backend.delete_branch(name)?;

        Ok(())
    }

    /// All branch ref names, local and remote-tracking.
    pub fn branch_refs(&self) -> Result<Vec<String>, WorkdirError> {
        Ok(self.backend.branch_refs()?)
    }

    /// Short names of all local branches: the segment after the last `/` of
    /// each `refs/heads/*` ref.
    pub fn local_branch_names(&self) -> Result<Vec<String>, WorkdirError> {
        let refs = self.backend.local_branch_refs()?;
        Ok(to_short_names(&refs))
    }

    /// Whether a local branch with this short name exists.
    pub fn local_branch_exists(&self, name: &BranchName) -> Result<bool, WorkdirError> {
        Ok(self
            .local_branch_names()?
            .iter()
            .any(|short| short == name.as_str()))
    }

    // =========================================================================
    // Remote management
    // =========================================================================

    /// All configured remotes, from cache when loaded.
    pub fn remote_configs(&self) -> Result<Vec<RemoteInfo>, WorkdirError> {
        let mut cache = self.remotes.lock().unwrap();
        let remotes = cache.get_or_load(|| self.backend.list_remotes())?;
        Ok(remotes.to_vec())
    }

    /// Look up a remote by name. Linear scan; remote counts are small.
    pub fn remote_config(&self, name: &str) -> Result<Option<RemoteInfo>, WorkdirError> {
        Ok(self
            .remote_configs()?
            .into_iter()
            .find(|remote| remote.name == name))
    }

    /// The set of configured remote names.
    pub fn remote_names(&self) -> Result<HashSet<String>, WorkdirError> {
        Ok(self
            .remote_configs()?
            .into_iter()
            .map(|remote| remote.name)
            .collect())
    }

    /// Whether a remote with this name is configured.
    pub fn remote_exists(&self, name: &str) -> Result<bool, WorkdirError> {
        Ok(self.remote_names()?.contains(name))
    }

    /// Add a remote.
    ///
    /// With `force`, an existing remote of the same name is removed first;
    /// without it, a duplicate is [`WorkdirError::RemoteAlreadyExists`].
    /// Invalidates the remote cache and returns the fresh definition.
    pub fn add_remote(
        &self,
        force: bool,
        name: &str,
        url: &str,
    ) -> Result<RemoteInfo, WorkdirError> {
        info!(
            "remote add {}{name} url: {url}",
            if force { "-f " } else { "" }
        );

        if let Some(existing) = self.remote_config(name)? {
            if force {
                self.remove_remote(&existing)?;
            } else {
                return Err(WorkdirError::RemoteAlreadyExists {
                    name: name.to_string(),
                });
            }
        }

        self.backend.add_remote(name, url)?;
        self.remotes.lock().unwrap().invalidate();

        self.remote_config(name)?
            .ok_or_else(|| WorkdirError::RemoteNotFound {
                name: name.to_string(),
            })
    }

    /// Remove a remote. Invalidates the cache on success.
    ///
    /// # Errors
    ///
    /// [`WorkdirError::RemoteNotFound`] when no remote of that name is
    /// configured. The failure propagates so callers can decide; continuing
    /// silently would leave the cache inconsistent with the repository.
    pub fn remove_remote(&self, remote: &RemoteInfo) -> Result<(), WorkdirError> {
        if !self.remote_names()?.contains(&remote.name) {
            return Err(WorkdirError::RemoteNotFound {
                name: remote.name.clone(),
            });
        }

        info!("remote remove {}", remote.name);

        self.backend.remove_remote(&remote.name)?;
        self.remotes.lock().unwrap().invalidate();

        Ok(())
    }

    /// Remove several remotes, stopping at the first failure.
    pub fn remove_remotes(&self, remotes: &[RemoteInfo]) -> Result<(), WorkdirError> {
        for remote in remotes {
            self.remove_remote(remote)?;
        }
        Ok(())
    }

    /// Branch short names advertised by a remote (ls-remote heads), sorted.
    pub fn remote_branch_names(&self, remote: &RemoteInfo) -> Result<Vec<String>, WorkdirError> {
        let refs = self.backend.remote_branch_refs(remote.url())?;
        let mut names = to_short_names(&refs);
        names.sort();
        Ok(names)
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    /// Fetch from a remote.
    ///
    /// With `refspec` absent, the remote's configured fetch ref-specs are
    /// used. Transport failures retry immediately, at most
    /// [`FETCH_TRANSPORT_RETRIES`] times; the next failure propagates
    /// unchanged. All other failures propagate on first occurrence.
    pub fn fetch(&self, remote: &RemoteInfo, refspec: Option<&str>) -> Result<(), WorkdirError> {
        let specs: Vec<String> = match refspec {
            Some(spec) => {
                info!("fetch {} {spec}", remote.name);
                vec![spec.to_string()]
            }
            None => {
                info!("fetch {}", remote.url());
                remote.fetch_specs.clone()
            }
        };

        let url = remote.url();

        fetch_with_retry(FETCH_TRANSPORT_RETRIES, || {
            self.backend.fetch(url, &specs, self.fetch_timeout)
        })?;

        Ok(())
    }

    /// Fetch one remote branch into a local branch.
    ///
    /// Builds `refs/heads/<remote_branch>:refs/heads/<local_branch>`; the
    /// engine requires full ref names on both sides of a ref-spec.
    pub fn fetch_branch(
        &self,
        local_branch: &BranchName,
        remote_branch: &str,
        remote: &RemoteInfo,
    ) -> Result<(), WorkdirError> {
        let refspec = format!("refs/heads/{remote_branch}:refs/heads/{local_branch}");
        self.fetch(remote, Some(&refspec))
    }

    // =========================================================================
    // Push
    // =========================================================================

    /// Push the current branch to a same-named branch on `remote`.
    ///
    /// Returns `false` when the server rejected any ref update; callers
    /// branch on the result (e.g. retry under another name) instead of
    /// unwinding.
    pub fn push_to_remote(&self, remote: &RemoteInfo) -> Result<bool, WorkdirError> {
        let current = self.current_branch()?;
        self.push_branch(&current, current.as_str(), remote)
    }

    /// Push the current branch to `remote_branch` on `remote`.
    pub fn push_current_branch(
        &self,
        remote: &RemoteInfo,
        remote_branch: &str,
    ) -> Result<bool, WorkdirError> {
        let current = self.current_branch()?;
        self.push_branch(&current, remote_branch, remote)
    }

    /// Push `local_branch` to `remote_branch` on `remote`.
    pub fn push_branch(
        &self,
        local_branch: &BranchName,
        remote_branch: &str,
        remote: &RemoteInfo,
    ) -> Result<bool, WorkdirError> {
        let url = remote.url();

        info!("push {local_branch} to {url} {remote_branch}");

        let refspec = format!("refs/heads/{local_branch}:refs/heads/{remote_branch}");

        // Configure-and-execute is one critical section; see module docs.
        let _push_guard = self.push_lock.lock().unwrap();

        let rejections = self.backend.push(url, &refspec)?;

        if rejections.is_empty() {
            return Ok(true);
        }

        for rejection in &rejections {
            warn!("push rejected {}: {}", rejection.refname, rejection.message);
        }

        Ok(false)
    }

    /// Push the current branch to `remote_branch` at an ad-hoc URL.
    ///
    /// Registers a forced `temp` remote, pushes through it, and removes the
    /// remote again whether or not the push succeeded. A push failure takes
    /// precedence over a removal failure in the returned error.
    pub fn push_to_url(&self, remote_branch: &str, url: &str) -> Result<bool, WorkdirError> {
        let temp = self.add_remote(true, TEMP_REMOTE, url)?;

        let push_result = self.push_current_branch(&temp, remote_branch);
        let remove_result = self.remove_remote(&temp);

        match (push_result, remove_result) {
            (Err(push_err), _) => Err(push_err),
            (Ok(_), Err(remove_err)) => Err(remove_err),
            (Ok(pushed), Ok(())) => Ok(pushed),
        }
    }

    // =========================================================================
    // Rebase
    // =========================================================================

    /// Rebase `branch` onto the commit at `target`.
    ///
    /// Checks the branch out first when it is not current. On conflict the
    /// repository is left in the in-progress rebase state and
    /// [`WorkdirError::RebaseFailed`] carries the conflicting paths; call
    /// [`WorkingDirectory::rebase_abort`] to unwind.
    pub async fn rebase(&self, branch: &BranchName, target: &Sha) -> Result<(), WorkdirError> {
        self.wait_for_index_lock();

        if self.backend.current_branch()?.as_ref() != Some(branch) {
            self.checkout_branch(branch.as_str()).await?;
        }

        let commit = self
            .backend
            .find_commit(target)?
            .ok_or_else(|| WorkdirError::CommitNotFound { sha: target.clone() })?;

        info!("rebase {branch} {commit}");

        match self.backend.rebase_onto(&commit)? {
            RebaseOutcome::Success => Ok(()),
            RebaseOutcome::Conflicts(conflicts) => {
                warn!("rebase of {branch} stopped on conflicts");
                for conflict in &conflicts {
                    warn!("{} -- {}", conflict.reason, conflict.path);
                }
                Err(WorkdirError::RebaseFailed { conflicts })
            }
        }
    }

    /// Abort an in-progress rebase.
    ///
    /// A no-op when the repository is not in a rebase-family state, so
    /// cleanup paths can call it unconditionally.
    pub fn rebase_abort(&self) -> Result<(), WorkdirError> {
        if !self.backend.state().is_rebasing() {
            return Ok(());
        }

        info!("rebase abort");

        self.backend.abort_rebase()?;

        Ok(())
    }

    // =========================================================================
    // GitHub integration
    // =========================================================================

    /// The GitHub owner a remote's URL points at.
    ///
    /// # Errors
    ///
    /// [`WorkdirError::NotGitHubRemote`] for URLs not on github.com.
    pub fn github_user_name(&self, remote: &RemoteInfo) -> Result<String, WorkdirError> {
        identity::github_owner(remote.url()).ok_or_else(|| WorkdirError::NotGitHubRemote {
            remote: remote.name.clone(),
        })
    }

    /// The sha GitHub reports for `branch` in the repository `remote`
    /// points at.
    pub async fn github_branch_commit(
        &self,
        branch: &str,
        remote: &RemoteInfo,
    ) -> Result<Sha, WorkdirError> {
        let owner = self.github_user_name(remote)?;

        Ok(self
            .forge
            .branch_head(&owner, &self.repository_name, branch)
            .await?)
    }

    /// Create a pull request from `receiver_user`'s fork branch against the
    /// upstream branch, returning the web URL.
    pub async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        receiver_user: &str,
        branch: &str,
    ) -> Result<String, WorkdirError> {
        let request = CreatePullRequest {
            base: self.upstream_branch.to_string(),
            head: format!("{receiver_user}:{branch}"),
            title: title.to_string(),
            body: Some(body.to_string()),
        };

        let pull = self
            .forge
            .create_pull(receiver_user, &self.repository_name, request)
            .await?;

        info!("created a pull request at {}", pull.html_url);

        Ok(pull.html_url)
    }

    // =========================================================================
    // Housekeeping
    // =========================================================================

    /// Remove untracked and ignored files and directories.
    pub fn clean(&self) -> Result<(), WorkdirError> {
        info!("clean -dfx");

        self.backend.clean()?;

        Ok(())
    }

    /// Reset the current branch to `refname`.
    pub fn reset(&self, refname: &str, mode: ResetMode) -> Result<(), WorkdirError> {
        info!("reset {mode} {refname}");

        self.backend.reset(refname, mode)?;

        Ok(())
    }

    /// Stage paths matching `pathspec` on the current branch.
    pub fn stage_file_in_current_branch(&self, pathspec: &str) -> Result<(), WorkdirError> {
        info!("stage file in current branch {pathspec}");

        self.backend.stage(pathspec)?;

        Ok(())
    }

    /// Commit everything staged on the current branch.
    pub fn commit_staged_files_to_current_branch(
        &self,
        message: &str,
    ) -> Result<Sha, WorkdirError> {
        info!("commit staged files to current branch");

        Ok(self.backend.commit_staged(message)?)
    }

    /// Stage `pathspec` and commit it in one step.
    pub fn commit_file_to_current_branch(
        &self,
        pathspec: &str,
        message: &str,
    ) -> Result<Sha, WorkdirError> {
        info!("commit file to current branch {pathspec}");

        self.stage_file_in_current_branch(pathspec)?;
        self.commit_staged_files_to_current_branch(message)
    }

    /// Block until no external Git process holds the index lock.
    ///
    /// Polls for `.git/index.lock` on the handle's [`PollPolicy`]. Past the
    /// attempt budget the lock file is treated as orphaned by a crashed
    /// process and force-deleted.
    pub fn wait_for_index_lock(&self) {
        wait_for_index_lock_in(&self.git_dir, &self.poll);
    }
}

/// Derive short names from full ref names: the segment after the last `/`.
fn to_short_names(refs: &[String]) -> Vec<String> {
    refs.iter()
        .map(|name| name.rsplit('/').next().unwrap_or(name).to_string())
        .collect()
}

/// Index-lock wait used both at construction (before the handle exists) and
/// by handle operations.
fn wait_for_index_lock_in(git_dir: &Path, poll: &PollPolicy) {
    let lock_path = git_dir.join("index.lock");
    let mut attempts = 0;

    while lock_path.exists() {
        info!("waiting for {} to be cleared", lock_path.display());

        std::thread::sleep(poll.interval);
        attempts += 1;

        if attempts >= poll.attempts {
            warn!("stealing stale index lock {}", lock_path.display());
            let _ = std::fs::remove_file(&lock_path);
        }
    }
}

/// Run `attempt` until it succeeds, retrying immediately on transport
/// failures at most `retries` times. The `retries + 1`th transport failure
/// and every non-transport failure propagate unchanged.
fn fetch_with_retry<F>(retries: u32, mut attempt: F) -> Result<(), GitError>
where
    F: FnMut() -> Result<(), GitError>,
{
    let mut failures = 0;

    loop {
        match attempt() {
            Ok(()) => return Ok(()),
            Err(err) if err.is_transport() && failures < retries => {
                warn!("fetch attempt {failures} failed on transport: {err}; retrying");
                failures += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::MockForge;
    use std::process::Command;
    use tempfile::TempDir;

    const UPSTREAM_URL: &str = "git@github.com:liferay/liferay-portal-ee.git";

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

    /// A real repository with an `upstream` remote configured.
    fn test_repo() -> TempDir {
        test_repo_with_upstream(UPSTREAM_URL)
    }

    fn test_repo_with_upstream(url: &str) -> TempDir {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init", "-b", "master"]);
        run_git(dir.path(), &["config", "user.email", "ci@example.com"]);
        run_git(dir.path(), &["config", "user.name", "CI Bot"]);

        std::fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
        run_git(dir.path(), &["add", "README.md"]);
        run_git(dir.path(), &["commit", "-m", "Initial commit"]);

        run_git(dir.path(), &["remote", "add", "upstream", url]);

        dir
    }

    fn fast_poll() -> PollPolicy {
        PollPolicy {
            attempts: 24,
            interval: Duration::from_millis(10),
        }
    }

    fn open_fast(dir: &Path) -> WorkingDirectory {
        WorkingDirectory::open_with(
            dir,
            WorkdirOptions {
                poll: fast_poll(),
                forge: Some(Arc::new(MockForge::new())),
                ..Default::default()
            },
        )
        .expect("open working directory")
    }

    mod construction {
        use super::*;

        #[test]
        fn derives_identity_from_upstream_url() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());

            assert_eq!(workdir.repository_name(), "liferay-portal");
            assert_eq!(workdir.repository_username(), "liferay");
            assert_eq!(workdir.upstream_branch_name().as_str(), "master");
        }

        #[test]
        fn internal_upstream_branch_keeps_suffix() {
            let repo = test_repo();
            let workdir = WorkingDirectory::open_with(
                repo.path(),
                WorkdirOptions {
                    upstream_branch: Some(BranchName::new("7.0.x-private").unwrap()),
                    poll: fast_poll(),
                    forge: Some(Arc::new(MockForge::new())),
                    ..Default::default()
                },
            )
            .unwrap();

            assert_eq!(workdir.repository_name(), "liferay-portal-ee");
        }

        #[test]
        fn missing_working_directory_fails() {
            let result = WorkingDirectory::open("/no/such/directory");
            assert!(matches!(result, Err(WorkdirError::NotFound { .. })));
        }

        #[test]
        fn missing_git_directory_fails() {
            let dir = TempDir::new().unwrap();
            let result = WorkingDirectory::open(dir.path());
            assert!(matches!(result, Err(WorkdirError::NotFound { .. })));
        }

        #[test]
        fn missing_upstream_remote_fails() {
            let dir = TempDir::new().unwrap();
            run_git(dir.path(), &["init", "-b", "master"]);

            let result = WorkingDirectory::open(dir.path());
            assert!(matches!(result, Err(WorkdirError::UpstreamMissing)));
        }

        #[test]
        fn companion_repository_follows_name() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());
            assert_eq!(workdir.companion_repository_name(), Some("liferay-plugins"));
        }
    }

    mod remotes {
        use super::*;

        #[test]
        fn add_duplicate_without_force_fails() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());

            workdir
                .add_remote(false, "sender", "git@github.com:alice/liferay-portal.git")
                .unwrap();

            let result =
                workdir.add_remote(false, "sender", "git@github.com:bob/liferay-portal.git");
            assert!(matches!(
                result,
                Err(WorkdirError::RemoteAlreadyExists { .. })
            ));
        }

        #[test]
        fn add_with_force_replaces_url() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());

            workdir
                .add_remote(false, "sender", "git@github.com:alice/liferay-portal.git")
                .unwrap();
            workdir
                .add_remote(true, "sender", "git@github.com:bob/liferay-portal.git")
                .unwrap();

            let remote = workdir.remote_config("sender").unwrap().unwrap();
            assert_eq!(remote.url(), "git@github.com:bob/liferay-portal.git");
        }

        #[test]
        fn cache_reflects_add_and_remove() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());

            assert!(!workdir.remote_exists("sender").unwrap());

            let remote = workdir
                .add_remote(false, "sender", "git@github.com:alice/liferay-portal.git")
                .unwrap();
            assert!(workdir.remote_exists("sender").unwrap());

            workdir.remove_remote(&remote).unwrap();
            assert!(!workdir.remote_exists("sender").unwrap());
        }

        #[test]
        fn remove_missing_remote_is_typed_error() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());

            let ghost = RemoteInfo {
                name: "ghost".into(),
                urls: vec!["git@github.com:acme/ghost.git".into()],
                fetch_specs: vec![],
            };

            let result = workdir.remove_remote(&ghost);
            assert!(matches!(result, Err(WorkdirError::RemoteNotFound { .. })));
        }

        #[test]
        fn github_user_name_rejects_non_github_url() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());

            let remote = workdir
                .add_remote(false, "elsewhere", "git@gitlab.com:acme/widgets.git")
                .unwrap();

            let result = workdir.github_user_name(&remote);
            assert!(matches!(result, Err(WorkdirError::NotGitHubRemote { .. })));
        }
    }

    mod branches {
        use super::*;

        #[test]
        fn current_branch_reports_checked_out_branch() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());

            assert_eq!(workdir.current_branch().unwrap().as_str(), "master");
        }

        #[test]
        fn create_list_delete_local_branch() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());

            let name = BranchName::new("ci-candidate").unwrap();
            workdir.create_local_branch(&name).unwrap();
            assert!(workdir.local_branch_exists(&name).unwrap());
            assert!(workdir
                .local_branch_names()
                .unwrap()
                .contains(&"ci-candidate".to_string()));

            workdir.delete_local_branch(&name).unwrap();
            assert!(!workdir.local_branch_exists(&name).unwrap());
        }
    }

    mod convergence {
        use super::*;

        #[tokio::test]
        async fn plain_branch_converges_when_head_updates() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());

            let head_path = repo.path().join(".git").join("HEAD");
            std::fs::write(&head_path, "ref: refs/heads/master\n").unwrap();

            // HEAD flips to the target a few polls in.
            let writer = std::thread::spawn({
                let head_path = head_path.clone();
                move || {
                    std::thread::sleep(Duration::from_millis(50));
                    std::fs::write(&head_path, "ref: refs/heads/candidate\n").unwrap();
                }
            });

            let polls = workdir
                .wait_for_checkout_convergence("candidate")
                .await
                .unwrap();
            writer.join().unwrap();

            assert!(polls >= 1, "must not converge before HEAD was written");
        }

        #[tokio::test]
        async fn plain_branch_times_out() {
            let repo = test_repo();
            let workdir = WorkingDirectory::open_with(
                repo.path(),
                WorkdirOptions {
                    poll: PollPolicy {
                        attempts: 3,
                        interval: Duration::from_millis(1),
                    },
                    forge: Some(Arc::new(MockForge::new())),
                    ..Default::default()
                },
            )
            .unwrap();

            let result = workdir.wait_for_checkout_convergence("never-lands").await;
            assert!(matches!(
                result,
                Err(WorkdirError::CheckoutTimeout { .. })
            ));
        }

        #[tokio::test]
        async fn remote_qualified_branch_compares_github_sha() {
            let repo = test_repo();

            let forge = MockForge::new();
            let sha = Sha::new("abcdef0123456789abcdef0123456789abcdef01").unwrap();
            forge.set_branch_head("liferay", "liferay-portal", "master", sha.clone());

            let workdir = WorkingDirectory::open_with(
                repo.path(),
                WorkdirOptions {
                    poll: fast_poll(),
                    forge: Some(Arc::new(forge)),
                    ..Default::default()
                },
            )
            .unwrap();

            // Detached HEAD at exactly the sha GitHub reports.
            let head_path = repo.path().join(".git").join("HEAD");
            std::fs::write(&head_path, format!("{sha}\n")).unwrap();

            let polls = workdir
                .wait_for_checkout_convergence("upstream/master")
                .await
                .unwrap();
            assert_eq!(polls, 0);
        }

        #[tokio::test]
        async fn remote_qualified_branch_requires_known_remote() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());

            let result = workdir
                .wait_for_checkout_convergence("nowhere/master")
                .await;
            assert!(matches!(result, Err(WorkdirError::RemoteNotFound { .. })));
        }
    }

    mod index_lock {
        use super::*;

        #[test]
        fn returns_immediately_when_unlocked() {
            let repo = test_repo();
            let workdir = open_fast(repo.path());

            // No lock file; must not block.
            workdir.wait_for_index_lock();
        }

        #[test]
        fn steals_stale_lock_after_budget() {
            let repo = test_repo();
            let lock_path = repo.path().join(".git").join("index.lock");
            std::fs::write(&lock_path, "").unwrap();

            let poll = PollPolicy {
                attempts: 2,
                interval: Duration::from_millis(1),
            };
            wait_for_index_lock_in(&repo.path().join(".git"), &poll);

            assert!(!lock_path.exists(), "stale lock must be deleted");
        }

        #[test]
        fn waits_until_lock_released() {
            let repo = test_repo();
            let lock_path = repo.path().join(".git").join("index.lock");
            std::fs::write(&lock_path, "").unwrap();

            let releaser = std::thread::spawn({
                let lock_path = lock_path.clone();
                move || {
                    std::thread::sleep(Duration::from_millis(30));
                    std::fs::remove_file(&lock_path).unwrap();
                }
            });

            let poll = PollPolicy {
                attempts: 1000,
                interval: Duration::from_millis(5),
            };
            wait_for_index_lock_in(&repo.path().join(".git"), &poll);

            releaser.join().unwrap();
            assert!(!lock_path.exists());
        }
    }

    mod fetch_retry {
        use super::*;

        fn transport_error() -> GitError {
            GitError::Transport {
                message: "connection reset by peer".into(),
            }
        }

        #[test]
        fn retries_up_to_limit_then_propagates() {
            let mut calls = 0;

            let result = fetch_with_retry(FETCH_TRANSPORT_RETRIES, || {
                calls += 1;
                Err(transport_error())
            });

            assert!(matches!(result, Err(GitError::Transport { .. })));
            assert_eq!(calls, 4, "3 retries means 4 total attempts");
        }

        #[test]
        fn stops_retrying_after_success() {
            let mut calls = 0;

            let result = fetch_with_retry(FETCH_TRANSPORT_RETRIES, || {
                calls += 1;
                if calls < 3 {
                    Err(transport_error())
                } else {
                    Ok(())
                }
            });

            assert!(result.is_ok());
            assert_eq!(calls, 3);
        }

        #[test]
        fn fatal_errors_are_not_retried() {
            let mut calls = 0;

            let result = fetch_with_retry(FETCH_TRANSPORT_RETRIES, || {
                calls += 1;
                Err(GitError::Internal {
                    message: "repository corrupt".into(),
                })
            });

            assert!(matches!(result, Err(GitError::Internal { .. })));
            assert_eq!(calls, 1);
        }
    }

    mod short_names {
        use super::*;

        #[test]
        fn strips_ref_prefixes() {
            let refs = vec![
                "refs/heads/master".to_string(),
                "refs/heads/feature/widget".to_string(),
                "refs/remotes/origin/master".to_string(),
            ];

            assert_eq!(to_short_names(&refs), vec!["master", "widget", "master"]);
        }
    }
}
