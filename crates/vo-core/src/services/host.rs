use std::fs::{Metadata, Permissions};
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{OpsError, Result};

use super::runner::{run_checked, CommandRunner, CommandSpec};

/// Mode given to files `write_file` creates.
const NEW_FILE_MODE: u32 = 0o644;

/// Builds host-side commands, applying privilege elevation where needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Host {
    elevate: Vec<String>,
}

impl Host {
    /// `elevate` is an argv prefix such as `["sudo"]`; empty runs everything
    /// as the invoking user.
    pub fn new(elevate: Vec<String>) -> Self {
        Self { elevate }
    }

    pub fn privileged<I, S>(&self, argv: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(
            self.elevate
                .iter()
                .cloned()
                .chain(argv.into_iter().map(Into::into)),
        )
    }

    /// Run as another account (`sudo -u <user>`). Without elevation the
    /// command runs as the invoking user.
    pub fn as_user<I, S>(&self, user: &str, argv: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.elevate.is_empty() {
            return CommandSpec::new(argv);
        }
        let prefix = self
            .elevate
            .iter()
            .cloned()
            .chain(["-u".to_string(), user.to_string()]);
        CommandSpec::new(prefix.chain(argv.into_iter().map(Into::into)))
    }

    /// Replace `dest` so readers see either the old or the new contents.
    /// An existing file keeps its mode; a new one gets `0644`.
    pub async fn write_file(
        &self,
        runner: &dyn CommandRunner,
        dest: &Path,
        contents: &str,
    ) -> Result<()> {
        if self.elevate.is_empty() {
            return write_local(dest, contents).map_err(|e| {
                OpsError::Command(format!("failed to write {}: {e}", dest.display()))
            });
        }

        let mut staged = NamedTempFile::new()?;
        staged.write_all(contents.as_bytes())?;
        staged.flush()?;
        let staged_path = staged.path().to_string_lossy().to_string();
        let dest_path = dest.to_string_lossy().to_string();

        // cp onto an existing file keeps its owner and mode.
        let spec = if self.exists(runner, &dest_path).await? {
            self.privileged(["cp".to_string(), staged_path, dest_path])
        } else {
            self.privileged([
                "install".to_string(),
                "-m".to_string(),
                format!("{NEW_FILE_MODE:04o}"),
                staged_path,
                dest_path,
            ])
        };
        run_checked(runner, &spec).await?;
        Ok(())
    }

    pub async fn copy(&self, runner: &dyn CommandRunner, from: &str, to: &str) -> Result<()> {
        run_checked(runner, &self.privileged(["cp", from, to])).await?;
        Ok(())
    }

    pub async fn rename(&self, runner: &dyn CommandRunner, from: &str, to: &str) -> Result<()> {
        run_checked(runner, &self.privileged(["mv", "-f", from, to])).await?;
        Ok(())
    }

    pub async fn exists(&self, runner: &dyn CommandRunner, path: &str) -> Result<bool> {
        let output = runner.run(&self.privileged(["test", "-e", path])).await?;
        Ok(output.success())
    }
}

/// Stage next to `dest` and rename over it. A destination that is itself a
/// mount point cannot be renamed over, so its contents are rewritten instead.
fn write_local(dest: &Path, contents: &str) -> std::io::Result<()> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;

    let existing = std::fs::metadata(dest).ok();
    if let Some(metadata) = &existing {
        if is_mount_point(metadata, parent) {
            tracing::debug!(path = %dest.display(), "mount point, rewriting in place");
            return std::fs::write(dest, contents);
        }
    }

    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(contents.as_bytes())?;
    staged.as_file().sync_all()?;
    let permissions = match &existing {
        Some(metadata) => Some(metadata.permissions()),
        None => new_file_permissions(),
    };
    if let Some(permissions) = permissions {
        staged.as_file().set_permissions(permissions)?;
    }
    staged.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn is_mount_point(existing: &Metadata, parent: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(parent)
        .map(|p| p.dev() != existing.dev())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_mount_point(_existing: &Metadata, _parent: &Path) -> bool {
    false
}

#[cfg(unix)]
fn new_file_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(NEW_FILE_MODE))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<Permissions> {
    None
}
