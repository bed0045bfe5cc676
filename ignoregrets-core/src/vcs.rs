/*!
Version-control collaborator.

The engine only needs two facts from the repository: the current revision and
the list of ignored paths. [`RevisionSource`] is the port; [`GitCli`] is the
adapter that shells out to `git`, and [`StaticRevisionSource`] serves fixed
answers for tests and scripted use.
*/

use crate::{IgnoregretsError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Source of the current revision and the ignored-file listing
pub trait RevisionSource {
    /// Identifier of the checked-out revision
    fn current_revision(&self) -> Result<String>;

    /// Repository-relative paths excluded from tracking
    fn ignored_paths(&self) -> Result<Vec<String>>;
}

impl<T: RevisionSource + ?Sized> RevisionSource for &T {
    fn current_revision(&self) -> Result<String> {
        (**self).current_revision()
    }

    fn ignored_paths(&self) -> Result<Vec<String>> {
        (**self).ignored_paths()
    }
}

/// `git` command-line adapter
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
}

impl GitCli {
    /// Adapter running `git` inside `workdir`
    pub fn new<P: AsRef<Path>>(workdir: P) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
        }
    }

    /// Fail unless `workdir` is inside a git working tree
    pub fn ensure_repository(&self) -> Result<()> {
        let inside = self
            .run(&["rev-parse", "--is-inside-work-tree"])
            .map_err(|e| IgnoregretsError::NotARepository(e.to_string()))?;
        if inside.trim() == "true" {
            Ok(())
        } else {
            Err(IgnoregretsError::NotARepository(format!(
                "{} is not inside a work tree",
                self.workdir.display()
            )))
        }
    }

    /// Top-level directory of the working tree
    pub fn toplevel(&self) -> Result<PathBuf> {
        let out = self.run(&["rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(out.trim()))
    }

    /// Location of the git directory, resolved against `workdir`
    pub fn git_dir(&self) -> Result<PathBuf> {
        let out = self.run(&["rev-parse", "--git-dir"])?;
        Ok(self.workdir.join(out.trim()))
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        debug!(?args, workdir = %self.workdir.display(), "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| IgnoregretsError::vcs(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            return Err(IgnoregretsError::vcs(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| IgnoregretsError::vcs(format!("git produced non UTF-8 output: {e}")))
    }
}

impl RevisionSource for GitCli {
    fn current_revision(&self) -> Result<String> {
        let out = self.run(&["rev-parse", "HEAD"]).map_err(|e| {
            IgnoregretsError::vcs(format!("failed to get current commit: {e}"))
        })?;
        Ok(out.trim().to_string())
    }

    fn ignored_paths(&self) -> Result<Vec<String>> {
        // --exclude-standard covers .gitignore, .git/info/exclude and core.excludesFile;
        // -z keeps paths verbatim instead of C-quoting non-ASCII names
        let out = self
            .run(&["ls-files", "-z", "--others", "--ignored", "--exclude-standard"])
            .map_err(|e| IgnoregretsError::vcs(format!("failed to list ignored files: {e}")))?;
        Ok(parse_path_list(&out))
    }
}

/// Fixed answers, for tests and for driving the engine without git
#[derive(Debug, Clone, Default)]
pub struct StaticRevisionSource {
    revision: Option<String>,
    paths: Vec<String>,
}

impl StaticRevisionSource {
    pub fn new<S: Into<String>>(revision: S, paths: Vec<String>) -> Self {
        Self {
            revision: Some(revision.into()),
            paths,
        }
    }

    /// A source that behaves like a directory outside any repository
    pub fn outside_repository() -> Self {
        Self::default()
    }
}

impl RevisionSource for StaticRevisionSource {
    fn current_revision(&self) -> Result<String> {
        self.revision
            .clone()
            .ok_or_else(|| IgnoregretsError::NotARepository("no revision available".to_string()))
    }

    fn ignored_paths(&self) -> Result<Vec<String>> {
        if self.revision.is_none() {
            return Err(IgnoregretsError::NotARepository(
                "no revision available".to_string(),
            ));
        }
        Ok(self.paths.clone())
    }
}

/// Split NUL-terminated `git ls-files -z` output
fn parse_path_list(output: &str) -> Vec<String> {
    output
        .split('\0')
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect()
}
