use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::queue::QueueOptions;

pub const DATA_DIR_ENV: &str = "HEARTHLIST_DATA_DIR";
pub const STORE_FILE_NAME: &str = "offline-store.json";

/// Tunables for the sync core. Defaults mirror shipped behavior; tests
/// shrink the timers.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Liveness window for a cold start stuck in `initializing`.
    pub init_timeout: Duration,
    /// Bounded retry loop on the foreground-resume path.
    pub resume_retry_attempts: u32,
    pub resume_retry_delay: Duration,
    pub queue: QueueOptions,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(60),
            resume_retry_attempts: 3,
            resume_retry_delay: Duration::from_secs(2),
            queue: QueueOptions::default(),
        }
    }
}

/// Where the local store lives: `HEARTHLIST_DATA_DIR` when set (tests,
/// portable installs), the platform data dir otherwise.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hearthlist")
}

pub fn store_path() -> PathBuf {
    data_dir().join(STORE_FILE_NAME)
}
