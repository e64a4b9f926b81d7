/// Directory under the repository root holding managed worktrees.
pub const WORKTREE_DIR_NAME: &str = ".worktrees";

/// Per-repository config directory with the optional setup/teardown scripts.
pub const CONFIG_DIR_NAME: &str = ".cwt";

pub const SETUP_SCRIPT_NAME: &str = "setup";
pub const TEARDOWN_SCRIPT_NAME: &str = "teardown";

/// Sentinel file marking a worktree whose setup has not run yet.
pub const SETUP_MARKER_NAME: &str = ".cwt_needs_setup";

/// Entries symlinked from the repository root when no setup script exists.
pub const DEFAULT_SYMLINKS: &[&str] = &[".env", "node_modules"];

/// Environment variable exposing the canonical repository root to scripts.
pub const ROOT_ENV_VAR: &str = "CWT_ROOT";

pub const GIT_DIR_ENTRY: &str = ".git";

/// Size of the persistent status probe worker pool.
pub const STATUS_POOL_SIZE: usize = 4;

/// How many directory levels below the start path nested repository
/// discovery scans.
pub const DISCOVER_SCAN_DEPTH: u16 = 2;
