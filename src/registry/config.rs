//! Stream registry configuration

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the stream registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory archive files are written to
    pub storage_dir: PathBuf,

    /// Replay cache retention window (data-timestamp based)
    pub replay_window: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("archive"),
            replay_window: Duration::from_secs(10 * 60),
        }
    }
}

impl RegistryConfig {
    /// Set the archive storage directory
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// Set the replay cache window
    pub fn replay_window(mut self, window: Duration) -> Self {
        self.replay_window = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.storage_dir, PathBuf::from("archive"));
        assert_eq!(config.replay_window, Duration::from_secs(600));
    }

    #[test]
    fn test_builder() {
        let config = RegistryConfig::default()
            .storage_dir("/tmp/streams")
            .replay_window(Duration::from_secs(60));
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/streams"));
        assert_eq!(config.replay_window, Duration::from_secs(60));
    }
}
