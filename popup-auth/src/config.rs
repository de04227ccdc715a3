use crate::popup::WindowSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TITLE: &str = "Auth";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_MESSAGE_SOURCE: &str = "oauth";

/// Controller settings. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupConfig {
    /// Target name passed to `window.open`.
    pub title: String,
    /// Size used when `StartOptions::window` is not given.
    pub default_window: WindowSize,
    /// Period of the liveness poll.
    pub poll_interval_ms: u64,
    /// Required value of the `source` field of completion messages.
    pub message_source: String,
    /// Discard messages whose origin differs from the provider URL's origin.
    pub verify_origin: bool,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            default_window: WindowSize::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            message_source: DEFAULT_MESSAGE_SOURCE.to_string(),
            verify_origin: true,
        }
    }
}

impl PopupConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Parse a JSON document.
    pub fn from_json_str(content: &str) -> anyhow::Result<Self> {
        let cfg: PopupConfig = serde_json::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a JSON file. Returns defaults if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        if self.message_source.is_empty() {
            anyhow::bail!("message_source must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PopupConfig::default();
        assert_eq!(cfg.title, "Auth");
        assert_eq!(cfg.default_window, WindowSize::new(660, 370));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.message_source, "oauth");
        assert!(cfg.verify_origin);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let cfg = PopupConfig::from_json_str(r#"{"verify_origin": false, "poll_interval_ms": 250}"#)
            .unwrap();
        assert!(!cfg.verify_origin);
        assert_eq!(cfg.poll_interval_ms, 250);
        assert_eq!(cfg.title, "Auth");
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = PopupConfig::from_json_str(r#"{"poll_interval_ms": 0}"#).unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PopupConfig::load(dir.path().join("popup.json")).unwrap();
        assert_eq!(cfg, PopupConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("popup.json");
        fs::write(
            &path,
            r#"{"title": "Login", "default_window": {"width": 500, "height": 600}}"#,
        )
        .unwrap();
        let cfg = PopupConfig::load(&path).unwrap();
        assert_eq!(cfg.title, "Login");
        assert_eq!(cfg.default_window, WindowSize::new(500, 600));
    }
}
