//! Thin async wrapper over the `git` executable.

use crate::error::{GitError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// A local git repository, driven through the `git` command line.
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
}

impl GitRepository {
    /// Opens `path`, which must be a work tree or a bare repository.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let is_work_tree = path.join(".git").exists();
        let is_bare = path.join("HEAD").is_file() && path.join("objects").is_dir();
        if !is_work_tree && !is_bare {
            return Err(GitError::NotARepository { path });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs git with `args` and returns its stdout.
    async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        tracing::debug!(repository = %self.path.display(), args = ?args, "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(GitError::Spawn)?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// All tag names.
    pub async fn tags(&self) -> Result<Vec<String>> {
        let stdout = self.run(&["tag", "--list"]).await?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// Names of the files at the root of `tag`'s tree.
    pub async fn root_files(&self, tag: &str) -> Result<Vec<String>> {
        let stdout = self
            .run(&["ls-tree", "--name-only", &format!("{tag}^{{tree}}")])
            .await?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(String::from)
            .collect())
    }

    /// Contents of `file` as of `tag`.
    pub async fn show(&self, tag: &str, file: &str) -> Result<Vec<u8>> {
        self.run(&["show", &format!("{tag}:{file}")]).await
    }

    /// `tag`'s tree as an uncompressed tar stream.
    pub async fn archive(&self, tag: &str) -> Result<Vec<u8>> {
        self.run(&["archive", "--format=tar", tag]).await
    }
}
