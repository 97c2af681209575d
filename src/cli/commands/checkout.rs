//! cli::commands::checkout
//!
//! Check out a branch and wait for HEAD to converge.
//!
//! # Example
//!
//! ```bash
//! # Local branch
//! gitfarm checkout ci-candidate
//!
//! # Remote-tracking target; convergence is confirmed against GitHub
//! gitfarm checkout upstream/master
//! ```

use anyhow::Result;

use crate::workdir::{CheckoutOptions, WorkingDirectory};

/// Run the checkout command.
///
/// This is a synchronous wrapper that uses tokio to run the async
/// implementation; remote-tracking targets consult the forge.
pub fn run(workdir: &WorkingDirectory, branch: &str, no_force: bool) -> Result<()> {
    let options = CheckoutOptions { force: !no_force };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(workdir.checkout_branch_with(branch, options))?;

    println!("checked out {branch}");

    Ok(())
}
