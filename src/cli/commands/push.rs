//! cli::commands::push
//!
//! Push a branch to a remote or an ad-hoc URL.
//!
//! # Exit behavior
//!
//! A rejected ref update is not an error at the workdir layer; it surfaces
//! here as a nonzero exit so CI steps can branch on it.
//!
//! # Example
//!
//! ```bash
//! # Current branch to a same-named remote branch
//! gitfarm push --remote origin
//!
//! # Explicit local/remote pair
//! gitfarm push --remote origin --local ci-candidate --branch candidate
//!
//! # Ad-hoc URL (registers and removes a temporary remote)
//! gitfarm push --url git@github.com:acme/widgets.git --branch candidate
//! ```

use anyhow::{bail, Result};

use crate::core::types::BranchName;
use crate::workdir::WorkingDirectory;

/// Run the push command.
pub fn run(
    workdir: &WorkingDirectory,
    remote_name: Option<&str>,
    url: Option<&str>,
    remote_branch: Option<&str>,
    local_branch: Option<&str>,
) -> Result<()> {
    let pushed = match (remote_name, url) {
        (Some(remote_name), None) => {
            let Some(remote) = workdir.remote_config(remote_name)? else {
                bail!("remote '{remote_name}' is not configured");
            };

            match (local_branch, remote_branch) {
                (Some(local), Some(branch)) => {
                    let local = BranchName::new(local)?;
                    workdir.push_branch(&local, branch, &remote)?
                }
                (None, Some(branch)) => workdir.push_current_branch(&remote, branch)?,
                (None, None) => workdir.push_to_remote(&remote)?,
                (Some(_), None) => bail!("--local requires --branch"),
            }
        }
        (None, Some(url)) => {
            let Some(branch) = remote_branch else {
                bail!("--url requires --branch");
            };
            workdir.push_to_url(branch, url)?
        }
        _ => bail!("exactly one of --remote or --url is required"),
    };

    if !pushed {
        bail!("push was rejected by the remote");
    }

    println!("pushed");

    Ok(())
}
