use std::path::Path;

use crate::error::Result;

use super::host::Host;
use super::runner::{run_checked, CommandRunner};

/// Runs git inside a service checkout as the account that owns it.
pub struct GitCheckout<'a> {
    runner: &'a dyn CommandRunner,
    host: &'a Host,
    owner: &'a str,
    directory: &'a Path,
}

impl<'a> GitCheckout<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        host: &'a Host,
        owner: &'a str,
        directory: &'a Path,
    ) -> Self {
        Self {
            runner,
            host,
            owner,
            directory,
        }
    }

    async fn run_git(&self, args: &[&str]) -> Result<String> {
        let dir = self.directory.to_string_lossy();
        let argv = ["git", "-C", &*dir]
            .into_iter()
            .chain(args.iter().copied());
        run_checked(self.runner, &self.host.as_user(self.owner, argv)).await
    }

    pub async fn pull(&self, branch: &str) -> Result<()> {
        self.run_git(&["pull", "--ff-only", "origin", branch]).await?;
        Ok(())
    }

    /// Short hash and subject of HEAD, e.g. `a1b2c3d Fix login`.
    pub async fn head(&self) -> Result<String> {
        self.run_git(&["log", "-1", "--format=%h %s"]).await
    }

    /// Discard HEAD and move the working tree to its parent commit.
    pub async fn reset_to_parent(&self) -> Result<()> {
        self.run_git(&["reset", "--hard", "HEAD~1"]).await?;
        Ok(())
    }
}
