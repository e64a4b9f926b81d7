use std::path::{Path, PathBuf};

/// Make a path absolute without touching the filesystem.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Resolve a path for comparison (handles macOS /var -> /private/var
/// symlinks). Falls back to plain absolutization when the path does not
/// exist yet.
pub fn normalize(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| absolutize(path))
}
