//! cli::commands::pr
//!
//! Create a pull request against the upstream branch.
//!
//! # Example
//!
//! ```bash
//! gitfarm pr --title "Fix flaky widget test" \
//!     --body "See build 4711" \
//!     --user acme \
//!     --branch ci-fix-widgets
//! ```

use anyhow::Result;

use crate::workdir::WorkingDirectory;

/// Run the pr command.
///
/// This is a synchronous wrapper that uses tokio to run the async
/// implementation.
pub fn run(
    workdir: &WorkingDirectory,
    title: &str,
    body: &str,
    user: &str,
    branch: &str,
) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let url = rt.block_on(workdir.create_pull_request(title, body, user, branch))?;

    println!("{url}");

    Ok(())
}
