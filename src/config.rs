//! Run configuration: file plus `DEMOQA_*` environment overrides.

use std::path::{Path, PathBuf};

use cdp_driver::DriverConfig;
use config::{Config, Environment, File};
use page_flows::{Pacing, ProgressPacing};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Target base address.
    pub base_url: String,
    pub headless: bool,
    /// Whole-scenario retries on failure.
    pub retries: u32,
    /// Fixed at 1: scenarios share one remote site and run strictly
    /// sequentially.
    pub workers: u32,
    pub artifacts_dir: PathBuf,
    /// Local file exercised by the upload scenario.
    pub upload_fixture: PathBuf,
    pub capture: CaptureConfig,
    pub driver: DriverSettings,
    pub pacing: Pacing,
    pub progress: ProgressPacing,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture a screenshot when a scenario attempt fails.
    pub screenshots: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    pub chrome_path: Option<PathBuf>,
    pub websocket_url: Option<String>,
    pub deadline_ms: u64,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://demoqa.com".to_string(),
            headless: true,
            retries: 1,
            workers: 1,
            artifacts_dir: PathBuf::from("artifacts"),
            upload_fixture: PathBuf::from("fixtures/upload-sample.txt"),
            capture: CaptureConfig::default(),
            driver: DriverSettings::default(),
            pacing: Pacing::default(),
            progress: ProgressPacing::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { screenshots: true }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            websocket_url: None,
            deadline_ms: 30_000,
        }
    }
}

impl SuiteConfig {
    /// Load from an explicit file, or `suite.toml` when present, then layer
    /// `DEMOQA_*` environment overrides on top.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        builder = match path {
            Some(path) => builder.add_source(File::from(path.to_path_buf())),
            None => builder.add_source(File::with_name("suite").required(false)),
        };
        builder = builder.add_source(Environment::with_prefix("DEMOQA").separator("__"));
        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn driver_config(&self) -> DriverConfig {
        let mut cfg = DriverConfig::default();
        if let Some(path) = &self.driver.chrome_path {
            cfg.executable = path.clone();
        }
        cfg.headless = self.headless;
        cfg.websocket_url = self.driver.websocket_url.clone();
        cfg.default_deadline_ms = self.driver.deadline_ms;
        cfg
    }

    /// Absolute page address under the configured base.
    pub fn page_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
