//! cli::commands::fetch
//!
//! Fetch from a configured remote.
//!
//! # Example
//!
//! ```bash
//! # The remote's configured ref-specs
//! gitfarm fetch upstream
//!
//! # An explicit ref-spec
//! gitfarm fetch upstream --refspec refs/heads/master:master
//!
//! # One remote branch into one local branch
//! gitfarm fetch upstream --branch master --local ci-base
//! ```

use anyhow::{bail, Result};

use crate::core::types::BranchName;
use crate::workdir::WorkingDirectory;

/// Run the fetch command.
pub fn run(
    workdir: &WorkingDirectory,
    remote_name: &str,
    refspec: Option<&str>,
    remote_branch: Option<&str>,
    local_branch: Option<&str>,
) -> Result<()> {
    let Some(remote) = workdir.remote_config(remote_name)? else {
        bail!("remote '{remote_name}' is not configured");
    };

    match (remote_branch, local_branch) {
        (Some(remote_branch), Some(local_branch)) => {
            let local = BranchName::new(local_branch)?;
            workdir.fetch_branch(&local, remote_branch, &remote)?;
        }
        _ => workdir.fetch(&remote, refspec)?,
    }

    println!("fetched from {remote_name}");

    Ok(())
}
