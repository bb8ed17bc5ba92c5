//! Logging setup for the operator client.
//!
//! Provides:
//! - **Log directory** resolution (config override or platform data dir)
//! - **Log rotation**: daily rolling files, pruned to `MAX_LOG_FILES`
//! - **Subscriber init**: console + file layers behind one `EnvFilter`

use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;

const LOG_FILE_PREFIX: &str = "labstock";
const DEFAULT_FILTER: &str = "info,lab_supplies_lib=debug";

/// `<data dir>/lab-supplies/logs`, where the data dir is `LOCALAPPDATA` on
/// Windows and `XDG_DATA_HOME` (or `~/.local/share`) elsewhere.
pub fn get_log_dir() -> PathBuf {
    data_dir().join("lab-supplies").join("logs")
}

fn data_dir() -> PathBuf {
    let from_env = |key: &str| {
        std::env::var_os(key)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    };
    let dir = if cfg!(target_os = "windows") {
        from_env("LOCALAPPDATA")
            .or_else(|| from_env("USERPROFILE").map(|home| home.join("AppData").join("Local")))
    } else {
        from_env("XDG_DATA_HOME")
            .or_else(|| from_env("HOME").map(|home| home.join(".local").join("share")))
    };
    dir.unwrap_or_else(|| PathBuf::from("."))
}

/// Delete all but the `keep` most recently modified `labstock*` files in
/// `log_dir`. Other files are left alone; a missing dir is a no-op.
pub fn prune_old_logs(log_dir: &Path, keep: usize) {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };

    let mut logs: Vec<(SystemTime, PathBuf)> = entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| e.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX))
        .map(|e| {
            let modified = e
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(UNIX_EPOCH);
            (modified, e.path())
        })
        .collect();
    logs.sort_by_key(|(modified, _)| Reverse(*modified));

    for (_, path) in logs.into_iter().skip(keep) {
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "pruned old log file"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to prune log file"),
        }
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// life of the process; dropping it flushes the file writer.
pub fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER))
    });

    let log_dir = config.dir.clone().unwrap_or_else(get_log_dir);
    prune_old_logs(&log_dir, MAX_LOG_FILES);
    fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_is_stable() {
        let d1 = get_log_dir();
        let d2 = get_log_dir();
        assert_eq!(d1, d2);
        assert!(d1.ends_with("lab-supplies/logs"));
    }

    #[test]
    fn test_prune_missing_dir_is_noop() {
        let dir = std::env::temp_dir().join(format!("labstock-missing-{}", uuid::Uuid::new_v4()));
        prune_old_logs(&dir, 0);
        assert!(!dir.exists());
    }

    #[test]
    fn test_prune_keeps_newest_logs_only() {
        let dir = std::env::temp_dir().join(format!("labstock-prune-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        for i in 0..4u64 {
            let path = dir.join(format!("{LOG_FILE_PREFIX}.2024-01-0{i}"));
            fs::write(&path, "x").unwrap();
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(std::time::UNIX_EPOCH + std::time::Duration::from_secs(86_400 * (i + 1)))
                .unwrap();
        }
        fs::write(dir.join("notes.txt"), "keep me").unwrap();

        prune_old_logs(&dir, 2);

        let mut left: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                format!("{LOG_FILE_PREFIX}.2024-01-02"),
                format!("{LOG_FILE_PREFIX}.2024-01-03"),
                "notes.txt".to_string(),
            ]
        );
        fs::remove_dir_all(&dir).ok();
    }
}
