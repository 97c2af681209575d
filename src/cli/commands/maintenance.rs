//! cli::commands::maintenance
//!
//! Housekeeping: clean, reset, commit.

use anyhow::Result;

use crate::cli::args::ResetModeArg;
use crate::git::ResetMode;
use crate::workdir::WorkingDirectory;

/// Run the clean command.
pub fn clean(workdir: &WorkingDirectory) -> Result<()> {
    workdir.clean()?;
    println!("cleaned");
    Ok(())
}

/// Run the reset command.
pub fn reset(workdir: &WorkingDirectory, refname: &str, mode: ResetModeArg) -> Result<()> {
    let mode = match mode {
        ResetModeArg::Soft => ResetMode::Soft,
        ResetModeArg::Mixed => ResetMode::Mixed,
        ResetModeArg::Hard => ResetMode::Hard,
    };

    workdir.reset(refname, mode)?;
    println!("reset {mode} to {refname}");
    Ok(())
}

/// Run the commit command: stage a pathspec and commit it.
pub fn commit(workdir: &WorkingDirectory, pathspec: &str, message: &str) -> Result<()> {
    let sha = workdir.commit_file_to_current_branch(pathspec, message)?;
    println!("committed {}", sha.short(12));
    Ok(())
}
