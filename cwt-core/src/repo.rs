use crate::{
    constants::{
        CONFIG_DIR_NAME, DISCOVER_SCAN_DEPTH, GIT_DIR_ENTRY, SETUP_SCRIPT_NAME,
        TEARDOWN_SCRIPT_NAME, WORKTREE_DIR_NAME,
    },
    git, paths, process,
    worktree::Worktree,
};
use anyhow::Result;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// A git repository root. Immutable after construction; worktrees hold it
/// by value to resolve config and script paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    root: PathBuf,
}

impl Repository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: paths::absolutize(&root.into()),
        }
    }

    /// Resolve the main repository root from anywhere inside it, including
    /// from within a secondary worktree.
    pub fn discover(start: &Path) -> Option<Self> {
        let out = process::run_captured(
            "git",
            &["rev-parse", "--path-format=absolute", "--git-common-dir"],
            Some(start),
        )
        .ok()?;
        if !out.success {
            return None;
        }

        let common_dir = out.stdout.trim();
        if common_dir.is_empty() {
            return None;
        }

        // --git-common-dir returns /path/to/repo/.git; the root is its parent
        let common_dir = Path::new(common_dir);
        let root = if common_dir.file_name().is_some_and(|n| n == GIT_DIR_ENTRY) {
            common_dir.parent()?
        } else {
            common_dir
        };
        Some(Self::new(root))
    }

    /// Discover the enclosing repository plus any repositories nested below
    /// `start`. The enclosing repository is always first. Empty when `start`
    /// is not inside a git repository.
    pub fn discover_all(start: &Path) -> Vec<Self> {
        let Some(primary) = Self::discover(start) else {
            return Vec::new();
        };

        let mut repos = vec![primary.clone()];
        scan_nested(start, DISCOVER_SCAN_DEPTH, &primary, &mut repos);
        repos
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn worktrees_dir(&self) -> PathBuf {
        self.root.join(WORKTREE_DIR_NAME)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR_NAME)
    }

    pub fn setup_script_path(&self) -> PathBuf {
        self.config_dir().join(SETUP_SCRIPT_NAME)
    }

    pub fn teardown_script_path(&self) -> PathBuf {
        self.config_dir().join(TEARDOWN_SCRIPT_NAME)
    }

    pub fn has_setup_script(&self) -> bool {
        is_executable_file(&self.setup_script_path())
    }

    pub fn has_teardown_script(&self) -> bool {
        is_executable_file(&self.teardown_script_path())
    }

    /// List this repository's worktrees in git's listing order. Listing
    /// failures read as an empty list.
    pub fn worktrees(&self) -> Vec<Worktree> {
        let records = match git::list_worktrees(&self.root) {
            Ok(records) => records,
            Err(err) => {
                log::debug!("worktree listing failed for {}: {err}", self.root.display());
                return Vec::new();
            }
        };

        records
            .into_iter()
            .map(|record| Worktree::new(self.clone(), record.path, record.branch, record.sha))
            .collect()
    }

    /// Create a worktree (and branch) named after the sanitized `name` under
    /// `.worktrees/`, marked as needing setup. Does not refresh any listing.
    pub fn create_worktree(&self, name: &str) -> Result<Worktree> {
        let safe_name = sanitize_name(name);
        let path = self.worktrees_dir().join(&safe_name);

        fs::create_dir_all(self.worktrees_dir())?;

        let root = self.root.to_string_lossy();
        let path_str = path.to_string_lossy();
        let out = process::run_captured(
            "git",
            &["-C", &root, "worktree", "add", "-b", &safe_name, &path_str],
            None,
        )?;
        if !out.success {
            anyhow::bail!("{}", out.stderr.trim());
        }

        // sha stays unset until the next list refresh
        let worktree = Worktree::new(self.clone(), path, Some(safe_name), None);
        worktree.mark_needs_setup()?;
        Ok(worktree)
    }

    /// Find a worktree by exact name or by normalized path.
    pub fn find_worktree(&self, name_or_path: &str) -> Option<Worktree> {
        let normalized = paths::normalize(Path::new(name_or_path));
        self.worktrees()
            .into_iter()
            .find(|wt| wt.name() == name_or_path || wt.path() == normalized)
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn is_executable_file(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn scan_nested(dir: &Path, depth: u16, primary: &Repository, repos: &mut Vec<Repository>) {
    if depth == 0 {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() || path.file_name().is_some_and(|n| n == WORKTREE_DIR_NAME) {
            continue;
        }

        if path.join(GIT_DIR_ENTRY).is_dir() {
            let repo = Repository::new(path);
            if repo != *primary {
                repos.push(repo);
            }
        } else if depth > 1 {
            scan_nested(&path, depth - 1, primary, repos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::run_captured;

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
    fn test_discover_finds_repo_root() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        let repo = Repository::discover(tmp.path()).unwrap();
        assert_eq!(
            dunce::canonicalize(repo.root()).unwrap(),
            dunce::canonicalize(tmp.path()).unwrap()
        );
    }

    #[test]
    fn test_discover_from_subdir_returns_root() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());
        let nested = tmp.path().join("subdir").join("nested");
        fs::create_dir_all(&nested).unwrap();

        let repo = Repository::discover(&nested).unwrap();
        assert_eq!(
            dunce::canonicalize(repo.root()).unwrap(),
            dunce::canonicalize(tmp.path()).unwrap()
        );
    }

    #[test]
    fn test_discover_from_worktree_returns_main_root() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        let repo = Repository::new(tmp.path());
        let worktree = repo.create_worktree("test-wt").unwrap();

        let discovered = Repository::discover(worktree.path()).unwrap();
        assert_eq!(
            dunce::canonicalize(discovered.root()).unwrap(),
            dunce::canonicalize(tmp.path()).unwrap()
        );
    }

    #[test]
    fn test_discover_outside_repo_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Repository::discover(tmp.path()).is_none());
    }

    #[test]
    fn test_discover_all_outside_repo_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Repository::discover_all(tmp.path()).is_empty());
    }

    #[test]
    fn test_discover_all_finds_nested_repos() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        let nested = tmp.path().join("vendor").join("nested-repo");
        fs::create_dir_all(&nested).unwrap();
        init_test_repo(&nested);

        let repos = Repository::discover_all(tmp.path());
        assert_eq!(repos.len(), 2);
        assert_eq!(
            dunce::canonicalize(repos[0].root()).unwrap(),
            dunce::canonicalize(tmp.path()).unwrap()
        );
        assert!(repos[1].root().ends_with("nested-repo"));
    }

    #[test]
    fn test_worktrees_returns_main_worktree() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        let repo = Repository::new(tmp.path());
        let worktrees = repo.worktrees();
        assert_eq!(worktrees.len(), 1);
        assert!(worktrees[0].branch().is_some());
        assert!(worktrees[0].sha().is_some());
    }

    #[test]
    fn test_create_worktree() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        let repo = Repository::new(tmp.path());
        let worktree = repo.create_worktree("test-session").unwrap();

        assert_eq!(worktree.name(), "test-session");
        assert_eq!(worktree.branch(), Some("test-session"));
        assert!(worktree.path().exists());
        assert!(worktree.needs_setup());
        assert_eq!(repo.worktrees().len(), 2);
    }

    #[test]
    fn test_create_worktree_sanitizes_name() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        let repo = Repository::new(tmp.path());
        let worktree = repo.create_worktree("test session!").unwrap();
        assert_eq!(worktree.name(), "test_session_");
    }

    #[test]
    fn test_create_worktree_duplicate_reports_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        let repo = Repository::new(tmp.path());
        repo.create_worktree("dup").unwrap();
        let err = repo.create_worktree("dup").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_find_worktree_by_name_and_path() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());

        let repo = Repository::new(tmp.path());
        let created = repo.create_worktree("findable").unwrap();

        let by_name = repo.find_worktree("findable").unwrap();
        assert_eq!(by_name.path(), created.path());

        let by_path = repo
            .find_worktree(&created.path().to_string_lossy())
            .unwrap();
        assert_eq!(by_path.name(), "findable");

        assert!(repo.find_worktree("no-such-worktree").is_none());
    }

    #[test]
    fn test_script_paths_and_detection() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = Repository::new(tmp.path());

        assert_eq!(repo.worktrees_dir(), tmp.path().join(".worktrees"));
        assert_eq!(repo.config_dir(), tmp.path().join(".cwt"));
        assert!(!repo.has_setup_script());

        fs::create_dir_all(repo.config_dir()).unwrap();
        fs::write(repo.setup_script_path(), "#!/bin/sh\n").unwrap();
        // A plain file without the executable bit is not honored
        #[cfg(unix)]
        assert!(!repo.has_setup_script());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(
                repo.setup_script_path(),
                fs::Permissions::from_mode(0o755),
            )
            .unwrap();
            assert!(repo.has_setup_script());
        }
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("test session!"), "test_session_");
        assert_eq!(sanitize_name("  spaced  "), "spaced");
        assert_eq!(sanitize_name("feat/thing"), "feat_thing");
        assert_eq!(sanitize_name("ok_name-1"), "ok_name-1");
    }
}
