//! cli::commands
//!
//! Command handlers.
//!
//! # Design
//!
//! Handlers are thin: they resolve arguments, call into
//! [`crate::workdir::WorkingDirectory`], and print results. Commands that
//! touch the forge are async internally and bridged with a tokio runtime in
//! their sync wrappers.

pub mod checkout;
pub mod completion;
pub mod fetch;
pub mod maintenance;
pub mod pr;
pub mod push;
pub mod rebase;
pub mod remote;

use anyhow::{Context as _, Result};

use crate::cli::args::{Cli, Command};
use crate::core::config::Config;
use crate::core::types::BranchName;
use crate::workdir::{PollPolicy, WorkdirOptions, WorkingDirectory};

/// Dispatch a parsed command line.
pub fn dispatch(cli: Cli) -> Result<()> {
    // Completion needs no repository.
    if let Command::Completion { shell } = cli.command {
        return completion::run(shell);
    }

    let config = Config::load().context("loading configuration")?;
    let options = build_options(&cli, &config)?;

    let workdir = WorkingDirectory::open_with(&cli.workdir, options)
        .with_context(|| format!("opening working directory {}", cli.workdir.display()))?;

    match cli.command {
        Command::Checkout { branch, no_force } => checkout::run(&workdir, &branch, no_force),
        Command::Fetch {
            remote,
            refspec,
            branch,
            local,
        } => fetch::run(&workdir, &remote, refspec.as_deref(), branch.as_deref(), local.as_deref()),
        Command::Push {
            remote,
            url,
            branch,
            local,
        } => push::run(
            &workdir,
            remote.as_deref(),
            url.as_deref(),
            branch.as_deref(),
            local.as_deref(),
        ),
        Command::Rebase { branch, sha, abort } => {
            rebase::run(&workdir, branch.as_deref(), sha.as_deref(), abort)
        }
        Command::Pr {
            title,
            body,
            user,
            branch,
        } => pr::run(&workdir, &title, &body, &user, &branch),
        Command::Remote { command } => remote::run(&workdir, command),
        Command::Clean => maintenance::clean(&workdir),
        Command::Reset { r#ref, mode } => maintenance::reset(&workdir, &r#ref, mode),
        Command::Commit { pathspec, message } => {
            maintenance::commit(&workdir, &pathspec, &message)
        }
        Command::Completion { .. } => unreachable!("handled above"),
    }
}

/// Fold config and global flags into construction options.
fn build_options(cli: &Cli, config: &Config) -> Result<WorkdirOptions> {
    let upstream_branch = cli
        .upstream_branch
        .as_deref()
        .or(config.upstream_branch.as_deref())
        .map(BranchName::new)
        .transpose()
        .context("invalid upstream branch name")?;

    let mut poll = PollPolicy::default();
    if let Some(overrides) = &config.poll {
        if let Some(attempts) = overrides.attempts {
            poll.attempts = attempts;
        }
        if let Some(secs) = overrides.interval_secs {
            poll.interval = std::time::Duration::from_secs(secs);
        }
    }

    Ok(WorkdirOptions {
        upstream_branch,
        backend: crate::git::BackendOptions {
            accept_unknown_hosts: config.accept_unknown_hosts.unwrap_or(false),
        },
        poll,
        fetch_timeout: None,
        forge: None,
        api_base: config.api_base.clone(),
    })
}
