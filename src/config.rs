//! Configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::error::ConfigError;
use crate::pipeline::extractor::{DEFAULT_BACKOFF_STEP, DEFAULT_MAX_ATTEMPTS, RetryPolicy, default_system_prompt};
use crate::store::SeenSet;

/// Default seconds between directory scans.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default prompt file, relative to the working directory.
pub const DEFAULT_SYSTEM_PROMPT_PATH: &str = "system_prompt.md";

/// Watcher and pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory scanned for `*.eml` files.
    pub watch_dir: PathBuf,
    /// Directory receiving `<stem>.reject.txt` files.
    pub rejects_dir: PathBuf,
    /// The xlsx ledger.
    pub table_path: PathBuf,
    /// Seen-set sidecar, next to the table.
    pub seen_path: PathBuf,
    /// Optional prompt file; the built-in prompt is used when it is missing.
    pub system_prompt_path: PathBuf,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    /// Build from `INCIDENT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let desktop = var("HOME")
            .map(|home| PathBuf::from(home).join("Desktop"))
            .unwrap_or_else(|| PathBuf::from("."));

        let path_var = |key: &str, default: PathBuf| -> PathBuf {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        let watch_dir = path_var("INCIDENT_WATCH_DIR", desktop.join("CY 25"));
        let rejects_dir = path_var("INCIDENT_REJECTS_DIR", desktop.join("rejects"));
        let table_path = path_var("INCIDENT_TABLE_PATH", desktop.join("valid.xlsx"));
        let system_prompt_path =
            path_var("INCIDENT_SYSTEM_PROMPT", PathBuf::from(DEFAULT_SYSTEM_PROMPT_PATH));
        let seen_path = SeenSet::sidecar_path(&table_path);

        let poll_interval_secs: u64 = parse_var(&var, "INCIDENT_POLL_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "INCIDENT_POLL_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let max_attempts: u32 =
            parse_var(&var, "INCIDENT_MAX_ATTEMPTS")?.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "INCIDENT_MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let backoff_step = parse_var::<u64>(&var, "INCIDENT_BACKOFF_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BACKOFF_STEP);

        Ok(Self {
            watch_dir,
            rejects_dir,
            table_path,
            seen_path,
            system_prompt_path,
            poll_interval: Duration::from_secs(poll_interval_secs),
            retry: RetryPolicy {
                max_attempts,
                backoff_step,
            },
        })
    }
}

/// Parse an optional numeric variable; a present but unparseable value is an
/// error rather than a silent default.
fn parse_var<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match var(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}' is not a valid number"),
            }),
    }
}

/// Read the system prompt file, falling back to the built-in prompt when it
/// does not exist or is empty.
pub fn load_system_prompt(path: &Path) -> Result<String, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => {
            info!(path = %path.display(), "Loaded system prompt");
            Ok(text)
        }
        Ok(_) => {
            warn!(path = %path.display(), "System prompt file is empty; using built-in prompt");
            Ok(default_system_prompt())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No system prompt file; using built-in prompt");
            Ok(default_system_prompt())
        }
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_live_on_the_desktop() {
        let config = PipelineConfig::from_vars(vars(&[("HOME", "/home/safety")])).unwrap();
        assert_eq!(config.watch_dir, PathBuf::from("/home/safety/Desktop/CY 25"));
        assert_eq!(config.rejects_dir, PathBuf::from("/home/safety/Desktop/rejects"));
        assert_eq!(config.table_path, PathBuf::from("/home/safety/Desktop/valid.xlsx"));
        assert_eq!(config.seen_path, PathBuf::from("/home/safety/Desktop/valid.seen.json"));
        assert_eq!(config.system_prompt_path, PathBuf::from("system_prompt.md"));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = PipelineConfig::from_vars(vars(&[
            ("INCIDENT_WATCH_DIR", "/in"),
            ("INCIDENT_TABLE_PATH", "/out/table.xlsx"),
            ("INCIDENT_POLL_INTERVAL_SECS", "30"),
            ("INCIDENT_MAX_ATTEMPTS", "5"),
            ("INCIDENT_BACKOFF_MS", "100"),
        ]))
        .unwrap();
        assert_eq!(config.watch_dir, PathBuf::from("/in"));
        assert_eq!(config.seen_path, PathBuf::from("/out/table.seen.json"));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff_step, Duration::from_millis(100));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = PipelineConfig::from_vars(vars(&[("INCIDENT_POLL_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("INCIDENT_POLL_INTERVAL_SECS"));

        assert!(PipelineConfig::from_vars(vars(&[("INCIDENT_MAX_ATTEMPTS", "0")])).is_err());
    }

    // ── System prompt ───────────────────────────────────────────────

    #[test]
    fn prompt_file_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_prompt.md");
        std::fs::write(&path, "Custom prompt").unwrap();
        assert_eq!(load_system_prompt(&path).unwrap(), "Custom prompt");
    }

    #[test]
    fn missing_prompt_file_uses_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = load_system_prompt(&dir.path().join("absent.md")).unwrap();
        assert_eq!(prompt, default_system_prompt());
    }
}
