use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect_chrome_executable;

/// Configuration for launching and tuning the driver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverConfig {
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    /// Default per-command deadline.
    pub default_deadline_ms: u64,
    /// Interval between condition/target polls.
    pub poll_interval_ms: u64,
    /// Number of intermediate mouse moves dispatched during a drag.
    pub drag_steps: u32,
    /// Pause between drag move events so the page's drag handlers keep up.
    pub drag_step_delay_ms: u64,
    /// Attach to an already-running browser instead of launching one.
    pub websocket_url: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: default_profile_dir(),
            headless: true,
            default_deadline_ms: 30_000,
            poll_interval_ms: 100,
            drag_steps: 12,
            drag_step_delay_ms: 16,
            websocket_url: None,
        }
    }
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = std::env::var("DEMOQA_CHROME_PROFILE") {
        return PathBuf::from(path);
    }
    Path::new("./.demoqa-profile").into()
}
