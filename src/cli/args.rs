//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--workdir <path>`: The working directory to operate on
//! - `--upstream-branch <name>`: Override the upstream branch name
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Gitfarm - Git working-directory automation for CI build farms
#[derive(Parser, Debug)]
#[command(name = "gitfarm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The working directory to operate on
    #[arg(long, global = true, default_value = ".")]
    pub workdir: PathBuf,

    /// Upstream branch name (default from config, then "master")
    #[arg(long, global = true)]
    pub upstream_branch: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check out a branch and wait for HEAD to converge
    Checkout {
        /// Local branch name, or <remote>/<branch> for a remote-tracking target
        branch: String,

        /// Do not pass -f to checkout
        #[arg(long)]
        no_force: bool,
    },

    /// Fetch from a configured remote
    Fetch {
        /// Remote name
        remote: String,

        /// Explicit ref-spec; the remote's configured specs when absent
        #[arg(long, conflicts_with_all = ["branch", "local"])]
        refspec: Option<String>,

        /// Remote branch to fetch (paired with --local)
        #[arg(long, requires = "local")]
        branch: Option<String>,

        /// Local branch to fetch into (paired with --branch)
        #[arg(long, requires = "branch")]
        local: Option<String>,
    },

    /// Push a branch to a remote or an ad-hoc URL
    Push {
        /// Remote name to push to
        #[arg(long, conflicts_with = "url")]
        remote: Option<String>,

        /// Ad-hoc URL to push to (registers a temporary remote)
        #[arg(long)]
        url: Option<String>,

        /// Remote branch name (defaults to the current branch name)
        #[arg(long)]
        branch: Option<String>,

        /// Local branch to push (defaults to the current branch)
        #[arg(long)]
        local: Option<String>,
    },

    /// Rebase a branch onto a commit
    Rebase {
        /// Branch to rebase (checked out first when not current)
        branch: Option<String>,

        /// Target commit sha
        sha: Option<String>,

        /// Abort an in-progress rebase instead
        #[arg(long, conflicts_with_all = ["branch", "sha"])]
        abort: bool,
    },

    /// Create a pull request against the upstream branch
    Pr {
        /// PR title
        #[arg(long)]
        title: String,

        /// PR body
        #[arg(long, default_value = "")]
        body: String,

        /// Receiving user or organization
        #[arg(long)]
        user: String,

        /// Source branch name
        #[arg(long)]
        branch: String,
    },

    /// Manage configured remotes
    Remote {
        #[command(subcommand)]
        command: RemoteCommand,
    },

    /// Remove untracked and ignored files and directories
    Clean,

    /// Reset the current branch to a ref
    Reset {
        /// Target ref or sha
        r#ref: String,

        /// Reset mode
        #[arg(long, value_enum, default_value_t = ResetModeArg::Mixed)]
        mode: ResetModeArg,
    },

    /// Stage a pathspec and commit it to the current branch
    Commit {
        /// Pathspec to stage
        pathspec: String,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Remote management subcommands.
#[derive(Subcommand, Debug)]
pub enum RemoteCommand {
    /// Add a remote
    Add {
        /// Remote name
        name: String,

        /// Remote URL
        url: String,

        /// Replace an existing remote of the same name
        #[arg(short, long)]
        force: bool,
    },

    /// Remove a remote
    Remove {
        /// Remote name
        name: String,
    },

    /// List configured remotes
    List,

    /// List branches advertised by a remote
    Branches {
        /// Remote name
        name: String,
    },
}

/// Reset mode argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResetModeArg {
    /// Move HEAD only
    Soft,
    /// Move HEAD and reset the index
    Mixed,
    /// Move HEAD, reset the index and the working tree
    Hard,
}

/// Supported completion shells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_checkout() {
        let cli = Cli::try_parse_from(["gitfarm", "checkout", "upstream/master"]).unwrap();
        match cli.command {
            Command::Checkout { branch, no_force } => {
                assert_eq!(branch, "upstream/master");
                assert!(!no_force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn fetch_refspec_conflicts_with_branch_pair() {
        let result = Cli::try_parse_from([
            "gitfarm",
            "fetch",
            "upstream",
            "--refspec",
            "refs/heads/master:master",
            "--branch",
            "master",
            "--local",
            "master",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn push_remote_conflicts_with_url() {
        let result = Cli::try_parse_from([
            "gitfarm",
            "push",
            "--remote",
            "origin",
            "--url",
            "git@github.com:acme/widgets.git",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rebase_abort_excludes_positionals() {
        let result = Cli::try_parse_from(["gitfarm", "rebase", "master", "--abort"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["gitfarm", "rebase", "--abort"]).unwrap();
        match cli.command {
            Command::Rebase { abort, .. } => assert!(abort),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
