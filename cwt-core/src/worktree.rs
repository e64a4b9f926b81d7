use crate::{
    constants::{DEFAULT_SYMLINKS, ROOT_ENV_VAR, SETUP_MARKER_NAME},
    git, paths, process,
    repo::Repository,
};
use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Whether a teardown script ran, and how it went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// No executable teardown script configured; nothing was run.
    Skipped,
    Ran { success: bool },
}

#[derive(Debug, Error)]
pub enum SetupError {
    /// The user declined to continue past a failed setup script. Distinct
    /// from an I/O failure: the resume flow aborts without marking setup
    /// complete.
    #[error("setup aborted")]
    Aborted,
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Worktree and branch both removed.
    Removed,
    /// Worktree removed; the branch was intentionally kept.
    BranchKept { warning: String },
}

#[derive(Debug, Error)]
pub enum DeleteError {
    /// Teardown ran and failed without force; nothing was removed.
    #[error("Teardown script failed")]
    TeardownFailed,
    /// `git worktree remove` failed; trimmed stderr.
    #[error("{0}")]
    WorktreeRemove(String),
    /// Worktree removed but the branch could not be deleted.
    #[error("Worktree removed, but branch delete failed: {0}")]
    BranchDelete(String),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// One git worktree and its lifecycle state. `dirty` and `last_commit`
/// stay unset until the refresh engine delivers results for the current
/// generation.
#[derive(Debug, Clone)]
pub struct Worktree {
    repo: Repository,
    path: PathBuf,
    branch: Option<String>,
    sha: Option<String>,
    pub dirty: Option<bool>,
    pub last_commit: Option<String>,
}

impl Worktree {
    pub fn new(
        repo: Repository,
        path: impl Into<PathBuf>,
        branch: Option<String>,
        sha: Option<String>,
    ) -> Self {
        Self {
            repo,
            path: paths::absolutize(&path.into()),
            branch,
            sha,
            dirty: None,
            last_commit: None,
        }
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn sha(&self) -> Option<&str> {
        self.sha.as_deref()
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    fn setup_marker_path(&self) -> PathBuf {
        self.path.join(SETUP_MARKER_NAME)
    }

    pub fn needs_setup(&self) -> bool {
        self.setup_marker_path().exists()
    }

    pub fn mark_needs_setup(&self) -> anyhow::Result<()> {
        fs::write(self.setup_marker_path(), "")?;
        Ok(())
    }

    pub fn mark_setup_complete(&self) -> anyhow::Result<()> {
        let marker = self.setup_marker_path();
        if marker.exists() {
            fs::remove_file(marker)?;
        }
        Ok(())
    }

    /// Run the repository's setup script, or fall back to the default
    /// symlink set when none is configured. With `visible`, a failed script
    /// prompts for consent to continue; declining aborts.
    pub fn run_setup(&self, visible: bool) -> Result<(), SetupError> {
        if self.repo.has_setup_script() {
            self.run_setup_script(visible, &mut io::stdin().lock())
        } else {
            self.setup_default_symlinks().map_err(SetupError::Io)
        }
    }

    fn run_setup_script(&self, visible: bool, input: &mut dyn BufRead) -> Result<(), SetupError> {
        if visible {
            println!("\x1b[1;36m=== Running .cwt/setup ===\x1b[0m\n");
        }

        let script = self.repo.setup_script_path();
        let root_env = self.canonical_root();
        let status = process::run_attached(
            &script.to_string_lossy(),
            &[],
            &self.path,
            &[(ROOT_ENV_VAR, root_env.as_str())],
        )?;

        if visible {
            println!();
        }

        if !status.success() && visible {
            println!(
                "\x1b[1;33mWarning: .cwt/setup failed (exit code: {})\x1b[0m",
                status.code().unwrap_or(-1)
            );
            print!("Continue anyway? [y/N]: ");
            io::stdout().flush().map_err(anyhow::Error::from)?;

            let mut answer = String::new();
            let read = input.read_line(&mut answer).map_err(anyhow::Error::from)?;
            let answer = answer.trim().to_ascii_lowercase();
            if read == 0 || !matches!(answer.as_str(), "y" | "yes") {
                return Err(SetupError::Aborted);
            }
        }

        Ok(())
    }

    /// Link the default entries from the repository root into the worktree,
    /// only when the source exists and nothing sits at the target yet.
    fn setup_default_symlinks(&self) -> anyhow::Result<()> {
        for entry in DEFAULT_SYMLINKS {
            let source = self.repo.root().join(entry);
            let target = self.path.join(entry);

            if source.exists() && !target.exists() {
                #[cfg(unix)]
                std::os::unix::fs::symlink(&source, &target)?;
            }
        }
        Ok(())
    }

    /// Run the teardown script if one is configured. Working directory is
    /// the worktree; `CWT_ROOT` points at the canonical repository root.
    pub fn run_teardown(&self) -> TeardownOutcome {
        if !self.repo.has_teardown_script() {
            return TeardownOutcome::Skipped;
        }

        println!("\x1b[1;36m=== Running .cwt/teardown ===\x1b[0m\n");

        let script = self.repo.teardown_script_path();
        let root_env = self.canonical_root();
        let success = process::run_attached(
            &script.to_string_lossy(),
            &[],
            &self.path,
            &[(ROOT_ENV_VAR, root_env.as_str())],
        )
        .is_ok_and(|status| status.success());

        println!();

        TeardownOutcome::Ran { success }
    }

    /// Delete this worktree and its branch.
    ///
    /// Teardown failure without `force` blocks the whole deletion. A safe
    /// branch delete refused over unmerged commits still counts as success,
    /// with the branch kept.
    pub fn delete(&self, force: bool) -> Result<DeleteOutcome, DeleteError> {
        if self.exists()
            && matches!(self.run_teardown(), TeardownOutcome::Ran { success: false })
            && !force
        {
            return Err(DeleteError::TeardownFailed);
        }

        self.cleanup_symlinks();

        if self.exists() {
            let root = self.repo.root().to_string_lossy().into_owned();
            let path = self.path.to_string_lossy().into_owned();
            let mut args = vec!["-C", &root, "worktree", "remove", &path];
            if force {
                args.push("--force");
            }
            let out = process::run_captured("git", &args, None).map_err(DeleteError::Io)?;
            if !out.success {
                return Err(DeleteError::WorktreeRemove(out.stderr.trim().to_string()));
            }
        }

        self.delete_branch(force)
    }

    /// Best-effort removal of the default symlinked entries.
    fn cleanup_symlinks(&self) {
        for entry in DEFAULT_SYMLINKS {
            let target = self.path.join(entry);
            if target.symlink_metadata().is_ok() {
                let _ = fs::remove_file(&target);
            }
        }
    }

    fn delete_branch(&self, force: bool) -> Result<DeleteOutcome, DeleteError> {
        let Some(branch) = self.branch.as_deref() else {
            // Detached worktree: no branch to clean up
            return Ok(DeleteOutcome::Removed);
        };

        let root = self.repo.root().to_string_lossy().into_owned();
        let flag = if force { "-D" } else { "-d" };
        let out = process::run_captured("git", &["-C", &root, "branch", flag, branch], None)
            .map_err(DeleteError::Io)?;

        if out.success {
            Ok(DeleteOutcome::Removed)
        } else if force {
            if out.stderr.contains("not found") {
                Ok(DeleteOutcome::Removed)
            } else {
                Err(DeleteError::BranchDelete(out.stderr.trim().to_string()))
            }
        } else {
            // Safe delete refused (unmerged commits): worktree gone, branch kept
            Ok(DeleteOutcome::BranchKept {
                warning: "branch kept (unmerged)".to_string(),
            })
        }
    }

    /// Synchronous status refresh. A failed probe reads as clean, so a
    /// broken git invocation is indistinguishable from "no changes".
    pub fn fetch_status(&mut self) {
        self.dirty = Some(git::status_dirty(&self.path).unwrap_or_else(|err| {
            log::debug!("status probe failed for {}: {err}", self.path.display());
            false
        }));
    }

    fn canonical_root(&self) -> String {
        paths::normalize(self.repo.root()).to_string_lossy().into_owned()
    }
}
