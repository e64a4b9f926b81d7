use std::path::PathBuf;

const APP_NAME: &str = "cwt";

/// Log file under the user's cache directory (`XDG_CACHE_HOME` respected
/// on unix).
pub fn log_file() -> PathBuf {
    let cache = match std::env::var("XDG_CACHE_HOME") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::cache_dir().unwrap_or_else(std::env::temp_dir),
    };
    cache.join(APP_NAME).join("cwt.log")
}

pub fn setup_logging(level: log::LevelFilter) -> anyhow::Result<()> {
    let log_file = log_file();
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    simple_log::file(log_file.to_string_lossy().into_owned(), level, 10, 10)
        .map_err(|e| anyhow::anyhow!(e))?;
    log::info!("cwt logging initialised (level={level})");
    Ok(())
}
