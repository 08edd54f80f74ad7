use anyhow::{anyhow, Context, Result};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive
const LOG_ENV: &str = "HOTWORD_LOG";

/// Initialize logging
///
/// Logs go to stderr unless `enabled`, in which case they are appended to
/// `log_path`. The filter comes from `HOTWORD_LOG` (default `info`).
///
/// # Errors
/// Returns error if the log file cannot be opened or a subscriber is already set
pub fn init(enabled: bool, log_path: &str) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    if !enabled {
        return tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow!("failed to install log subscriber: {e}"));
    }

    let expanded_path = expand_log_path(log_path)?;

    // Create parent directory if needed
    if let Some(parent) = expanded_path.parent() {
        fs::create_dir_all(parent).context("failed to create log directory")?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&expanded_path)
        .context("failed to open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_target(false)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    tracing::info!("logging to {}", expanded_path.display());

    Ok(())
}

fn expand_log_path(path: &str) -> Result<PathBuf> {
    if let Some(stripped) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(stripped))
    } else {
        Ok(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_expand_log_path_with_tilde() {
        let home = env::var("HOME").expect("HOME not set");
        let result = expand_log_path("~/logs/engine.log").unwrap();
        assert_eq!(result, PathBuf::from(home).join("logs/engine.log"));
    }

    #[test]
    fn test_expand_log_path_without_tilde() {
        let result = expand_log_path("/var/log/hotword.log").unwrap();
        assert_eq!(result, PathBuf::from("/var/log/hotword.log"));
    }

    #[test]
    fn test_expand_log_path_relative() {
        let result = expand_log_path("logs/hotword.log").unwrap();
        assert_eq!(result, PathBuf::from("logs/hotword.log"));
    }

    #[test]
    #[ignore = "installs the global tracing subscriber"]
    fn test_init_to_file() {
        let dir = env::temp_dir().join("hotword_telemetry_test");
        let path = dir.join("engine.log");
        init(true, path.to_str().unwrap()).unwrap();
        tracing::info!("hello");
        assert!(path.exists());
        let _ = fs::remove_dir_all(&dir);
    }
}
