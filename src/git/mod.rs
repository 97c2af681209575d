//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to the Git engine. All repository
//! reads and writes flow through this interface. No other module should
//! import `git2`.
//!
//! The one exception to engine routing is branch checkout, which the
//! [`crate::workdir`] layer performs through the `git` CLI and then verifies
//! by polling `.git/HEAD`; checkout convergence is a working-directory
//! concern, not an engine call.
//!
//! # Responsibilities
//!
//! - Repository opening with explicit per-instance SSH/TLS policy
//! - Branch lifecycle (create, delete, enumerate)
//! - Remote configuration (add, remove, list, ls-remote)
//! - Fetch and push with typed transport-failure tagging
//! - Staging, committing, reset, clean
//! - Rebase begin/abort with structured conflict reporting
//!
//! # Invariants
//!
//! - Transport failures are tagged [`GitError::Transport`]; retry policy
//!   lives in the workdir layer, never here
//! - No other module calls git2 directly

mod backend;

pub use backend::{
    BackendOptions, ConflictReason, GitBackend, GitError, GitState, RebaseConflict,
    RebaseOutcome, RefRejection, RemoteInfo, ResetMode,
};
