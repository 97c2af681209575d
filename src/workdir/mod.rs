//! workdir
//!
//! The working-directory handle and its supporting pieces.
//!
//! # Responsibilities
//!
//! - [`handle::WorkingDirectory`] - one handle per clone: branch lifecycle,
//!   remote management, fetch/push/rebase orchestration, housekeeping
//! - [`identity`] - repository name/username derivation from the upstream URL
//! - [`remotes`] - the two-state remote-configuration cache
//! - [`lock`] - exclusive ownership lock for clone pools
//!
//! # Invariants
//!
//! - Repository identity is immutable after construction
//! - The remote cache is fully loaded or fully invalidated, never partial
//! - Branch-affecting operations wait on the external index lock first

pub mod handle;
pub mod identity;
pub mod lock;
pub mod remotes;

pub use handle::{
    CheckoutOptions, PollPolicy, WorkdirError, WorkdirOptions, WorkingDirectory,
    DEFAULT_FETCH_TIMEOUT, FETCH_TRANSPORT_RETRIES, UPSTREAM_REMOTE,
};
pub use lock::{LockError, WorkdirLock};
