//! cli::commands::rebase
//!
//! Rebase a branch onto a commit, or abort an in-progress rebase.
//!
//! # Example
//!
//! ```bash
//! gitfarm rebase ci-candidate 4f0e98c4a37e81a5c8e5c1dd6e7f9cf14a2b3d41
//! gitfarm rebase --abort
//! ```

use anyhow::{bail, Context as _, Result};

use crate::core::types::{BranchName, Sha};
use crate::workdir::{WorkdirError, WorkingDirectory};

/// Run the rebase command.
///
/// This is a synchronous wrapper that uses tokio to run the async
/// implementation (rebase may need to check the branch out first).
pub fn run(
    workdir: &WorkingDirectory,
    branch: Option<&str>,
    sha: Option<&str>,
    abort: bool,
) -> Result<()> {
    if abort {
        workdir.rebase_abort()?;
        println!("rebase aborted (no-op when none was in progress)");
        return Ok(());
    }

    let (Some(branch), Some(sha)) = (branch, sha) else {
        bail!("rebase requires <branch> and <sha>, or --abort");
    };

    let branch = BranchName::new(branch)?;
    let sha = Sha::new(sha).context("invalid target sha")?;

    let rt = tokio::runtime::Runtime::new()?;
    match rt.block_on(workdir.rebase(&branch, &sha)) {
        Ok(()) => {
            println!("rebased {branch} onto {}", sha.short(12));
            Ok(())
        }
        Err(WorkdirError::RebaseFailed { conflicts }) => {
            eprintln!("rebase failed; conflicting paths:");
            for conflict in &conflicts {
                eprintln!("  {} -- {}", conflict.reason, conflict.path);
            }
            bail!("rebase of {branch} failed with {} conflict(s)", conflicts.len());
        }
        Err(e) => Err(e.into()),
    }
}
