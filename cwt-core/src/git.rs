//! Thin wrappers around the git subprocess invocations cwt relies on.
//! Business logic lives in `repo` and `worktree`.

use crate::process;
use anyhow::Result;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// One record parsed from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeRecord {
    pub path: PathBuf,
    pub sha: Option<String>,
    /// `None` for a detached-HEAD worktree
    pub branch: Option<String>,
}

/// Parse `git worktree list --porcelain` output.
///
/// Records are blank-line delimited, but a new `worktree` line also closes
/// the previous record and a trailing record without a terminating blank
/// line is still captured.
pub fn parse_worktree_porcelain(output: &str) -> Vec<WorktreeRecord> {
    let mut records = Vec::new();
    let mut current: Option<WorktreeRecord> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(record) = current.take() {
                records.push(record);
            }
            current = Some(WorktreeRecord {
                path: PathBuf::from(path.trim()),
                sha: None,
                branch: None,
            });
        } else if let Some(sha) = line.strip_prefix("HEAD ")
            && let Some(record) = current.as_mut()
        {
            record.sha = Some(sha.trim().to_string());
        } else if let Some(branch) = line.strip_prefix("branch refs/heads/")
            && let Some(record) = current.as_mut()
        {
            record.branch = Some(branch.trim().to_string());
        }
    }

    if let Some(record) = current {
        records.push(record);
    }

    records
}

/// List the worktrees registered against `repo_root`.
pub fn list_worktrees(repo_root: &Path) -> Result<Vec<WorktreeRecord>> {
    let root = repo_root.to_string_lossy();
    let out = process::run_captured(
        "git",
        &["-C", &root, "worktree", "list", "--porcelain"],
        None,
    )?;
    if !out.success {
        anyhow::bail!("git worktree list failed: {}", out.stderr.trim());
    }
    Ok(parse_worktree_porcelain(&out.stdout))
}

/// Batched relative-age lookup: one `git show` across all hashes, keyed by
/// hash in the result. Missing or unknown hashes are simply absent. Any
/// failure yields an empty map.
pub fn commit_ages(repo_root: &Path, shas: &[String]) -> HashMap<String, String> {
    if shas.is_empty() {
        return HashMap::new();
    }

    let root = repo_root.to_string_lossy();
    let mut args = vec![
        "-C",
        &root,
        "--no-optional-locks",
        "show",
        "-s",
        "--format=%H|%cr",
    ];
    args.extend(shas.iter().map(String::as_str));

    let Ok(out) = process::run_captured("git", &args, None) else {
        return HashMap::new();
    };
    if !out.success {
        log::debug!("commit age lookup failed: {}", out.stderr.trim());
        return HashMap::new();
    }

    out.stdout
        .lines()
        .filter_map(|line| {
            let (sha, age) = line.trim().split_once('|')?;
            Some((sha.to_string(), age.to_string()))
        })
        .collect()
}

/// Check a worktree for uncommitted changes.
///
/// `--no-optional-locks` keeps the probe from contending on the index.
/// A non-zero git exit reads as clean; only a spawn failure is an `Err`.
pub fn status_dirty(worktree_path: &Path) -> Result<bool> {
    let path = worktree_path.to_string_lossy();
    let out = process::run_captured(
        "git",
        &["--no-optional-locks", "-C", &path, "status", "--porcelain"],
        None,
    )?;
    Ok(out.success && !out.stdout.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::run_captured;
    use std::fs;

    fn init_test_repo(dir: &Path) {
        for args in [
            vec!["init"],
            vec!["config", "user.email", "test@test.com"],
            vec!["config", "user.name", "Test"],
        ] {
            run_captured("git", &args, Some(dir)).unwrap();
        }
        fs::write(dir.join("README.md"), "# test").unwrap();
        run_captured("git", &["add", "."], Some(dir)).unwrap();
        run_captured("git", &["commit", "-m", "init"], Some(dir)).unwrap();
    }

    #[test]
    fn test_parse_porcelain_single() {
        let output = "worktree /home/user/project\nHEAD abc123\nbranch refs/heads/main\n\n";
        let records = parse_worktree_porcelain(output);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, PathBuf::from("/home/user/project"));
        assert_eq!(records[0].sha.as_deref(), Some("abc123"));
        assert_eq!(records[0].branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_parse_porcelain_multiple() {
        let output = "\
worktree /home/user/project
HEAD abc123
branch refs/heads/main

worktree /home/user/project/.worktrees/feat
HEAD def456
branch refs/heads/feat

";
        let records = parse_worktree_porcelain(output);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].branch.as_deref(), Some("feat"));
    }

    #[test]
    fn test_parse_porcelain_detached_has_no_branch() {
        let output = "worktree /home/user/project\nHEAD abc123\ndetached\n\n";
        let records = parse_worktree_porcelain(output);
        assert_eq!(records.len(), 1);
        assert!(records[0].branch.is_none());
    }

    #[test]
    fn test_parse_porcelain_trailing_record_without_blank_line() {
        let output = "worktree /home/user/project\nHEAD abc123\nbranch refs/heads/main";
        let records = parse_worktree_porcelain(output);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_parse_porcelain_empty() {
        assert!(parse_worktree_porcelain("").is_empty());
    }

    #[test]
    fn test_list_worktrees_real_repo() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        let records = list_worktrees(tmp.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].sha.is_some());
        assert!(records[0].branch.is_some());
    }

    #[test]
    fn test_commit_ages_batched() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        let head = run_captured("git", &["rev-parse", "HEAD"], Some(tmp.path())).unwrap();
        let sha = head.stdout.trim().to_string();

        let ages = commit_ages(tmp.path(), std::slice::from_ref(&sha));
        assert_eq!(ages.len(), 1);
        assert!(ages[&sha].contains("ago"), "unexpected age: {ages:?}");
    }

    #[test]
    fn test_commit_ages_wrong_root_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        let other = tempfile::tempdir().unwrap();
        init_test_repo(other.path());

        let head = run_captured("git", &["rev-parse", "HEAD"], Some(tmp.path())).unwrap();
        let sha = head.stdout.trim().to_string();

        // A hash looked up against the wrong repository is a "bad object"
        let ages = commit_ages(other.path(), &[sha]);
        assert!(ages.is_empty());
    }

    #[test]
    fn test_commit_ages_empty_input() {
        assert!(commit_ages(Path::new("/tmp"), &[]).is_empty());
    }

    #[test]
    fn test_status_dirty_transitions() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        assert!(!status_dirty(tmp.path()).unwrap());

        fs::write(tmp.path().join("dirty.txt"), "change").unwrap();
        assert!(status_dirty(tmp.path()).unwrap());
    }

    #[test]
    fn test_status_dirty_outside_repo_reads_clean() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!status_dirty(tmp.path()).unwrap());
    }
}
