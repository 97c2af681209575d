//! cli::commands::remote
//!
//! Manage configured remotes.
//!
//! # Example
//!
//! ```bash
//! gitfarm remote add sender git@github.com:alice/widgets.git
//! gitfarm remote add -f sender git@github.com:bob/widgets.git
//! gitfarm remote list
//! gitfarm remote branches upstream
//! gitfarm remote remove sender
//! ```

use anyhow::{bail, Result};

use crate::cli::args::RemoteCommand;
use crate::workdir::WorkingDirectory;

/// Run a remote subcommand.
pub fn run(workdir: &WorkingDirectory, command: RemoteCommand) -> Result<()> {
    match command {
        RemoteCommand::Add { name, url, force } => {
            let remote = workdir.add_remote(force, &name, &url)?;
            println!("added {remote}");
        }
        RemoteCommand::Remove { name } => {
            let Some(remote) = workdir.remote_config(&name)? else {
                bail!("remote '{name}' is not configured");
            };
            workdir.remove_remote(&remote)?;
            println!("removed {name}");
        }
        RemoteCommand::List => {
            for remote in workdir.remote_configs()? {
                println!("{remote}");
            }
        }
        RemoteCommand::Branches { name } => {
            let Some(remote) = workdir.remote_config(&name)? else {
                bail!("remote '{name}' is not configured");
            };
            for branch in workdir.remote_branch_names(&remote)? {
                println!("{branch}");
            }
        }
    }

    Ok(())
}
