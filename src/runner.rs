//! Scenario runner: strictly sequential execution, whole-scenario retry,
//! artifact capture on failure. There is no per-operation retry anywhere —
//! a failed wait or assertion fails the attempt, and only the runner may
//! try the scenario again.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use cdp_driver::{Driver, PageId};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::SuiteConfig;

/// One end-to-end ordered sequence of user-observable steps and assertions.
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this scenario drives a browser page. API-only scenarios run
    /// without a driver.
    fn requires_browser(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &ScenarioContext, report: &mut ScenarioReport) -> Result<()>;
}

/// Everything a scenario needs, passed explicitly. The current page is
/// tracked so the runner can screenshot it when an attempt fails.
pub struct ScenarioContext {
    pub config: SuiteConfig,
    driver: Option<Arc<Driver>>,
    current_page: Mutex<Option<PageId>>,
}

impl ScenarioContext {
    pub fn new(config: SuiteConfig, driver: Option<Arc<Driver>>) -> Self {
        Self {
            config,
            driver,
            current_page: Mutex::new(None),
        }
    }

    pub fn driver(&self) -> Result<Arc<Driver>> {
        self.driver
            .clone()
            .ok_or_else(|| anyhow::anyhow!("scenario requires a browser driver"))
    }

    pub async fn set_current_page(&self, page: Option<PageId>) {
        *self.current_page.lock().await = page;
    }

    pub async fn current_page(&self) -> Option<PageId> {
        *self.current_page.lock().await
    }
}

#[derive(Clone, Debug)]
pub struct StepRecord {
    pub description: String,
    pub passed: bool,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Step-level record of one scenario attempt.
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    pub scenario: &'static str,
    pub attempt: u32,
    pub steps: Vec<StepRecord>,
}

impl ScenarioReport {
    pub fn new(scenario: &'static str, attempt: u32) -> Self {
        Self {
            scenario,
            attempt,
            steps: Vec::new(),
        }
    }

    /// Run one described step, recording outcome and duration. The failing
    /// step's description travels with the error to the summary.
    pub async fn step<T, F>(&mut self, description: &str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        info!(target: "demoqa-suite", scenario = self.scenario, step = description, "step");
        let started = Instant::now();
        match fut.await {
            Ok(value) => {
                self.steps.push(StepRecord {
                    description: description.to_string(),
                    passed: true,
                    duration: started.elapsed(),
                    error: None,
                });
                Ok(value)
            }
            Err(err) => {
                error!(
                    target: "demoqa-suite",
                    scenario = self.scenario,
                    step = description,
                    error = %err,
                    "step failed"
                );
                self.steps.push(StepRecord {
                    description: description.to_string(),
                    passed: false,
                    duration: started.elapsed(),
                    error: Some(err.to_string()),
                });
                Err(err)
            }
        }
    }
}

/// Final state of one scenario after all attempts.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub scenario: &'static str,
    pub passed: bool,
    pub attempts: u32,
    pub reports: Vec<ScenarioReport>,
    pub artifacts: Vec<PathBuf>,
}

/// Run the scenarios strictly in order, retrying each whole scenario up to
/// `retries` extra times.
pub async fn run_scenarios(
    ctx: &ScenarioContext,
    scenarios: &[Box<dyn Scenario>],
    retries: u32,
) -> Vec<RunOutcome> {
    let mut outcomes = Vec::with_capacity(scenarios.len());

    for scenario in scenarios {
        let mut outcome = RunOutcome {
            scenario: scenario.name(),
            passed: false,
            attempts: 0,
            reports: Vec::new(),
            artifacts: Vec::new(),
        };

        for attempt in 0..=retries {
            outcome.attempts = attempt + 1;
            ctx.set_current_page(None).await;
            let mut report = ScenarioReport::new(scenario.name(), attempt + 1);
            info!(
                target: "demoqa-suite",
                scenario = scenario.name(),
                attempt = attempt + 1,
                "scenario starting"
            );

            let result = scenario.run(ctx, &mut report).await;
            outcome.reports.push(report);

            match result {
                Ok(()) => {
                    outcome.passed = true;
                    info!(target: "demoqa-suite", scenario = scenario.name(), "scenario passed");
                    release_current_page(ctx).await;
                    break;
                }
                Err(err) => {
                    error!(
                        target: "demoqa-suite",
                        scenario = scenario.name(),
                        attempt = attempt + 1,
                        error = %err,
                        "scenario failed"
                    );
                    if let Some(artifact) =
                        capture_failure_artifact(ctx, scenario.name(), attempt + 1).await
                    {
                        outcome.artifacts.push(artifact);
                    }
                    release_current_page(ctx).await;
                    if attempt < retries {
                        warn!(
                            target: "demoqa-suite",
                            scenario = scenario.name(),
                            "retrying scenario"
                        );
                    }
                }
            }
        }

        outcomes.push(outcome);
    }

    outcomes
}

/// Close whatever page the attempt left behind; each attempt opens fresh.
async fn release_current_page(ctx: &ScenarioContext) {
    if let Some(page) = ctx.current_page().await {
        if let Some(driver) = ctx.driver.as_ref() {
            if let Err(err) = driver.close_page(page).await {
                warn!(target: "demoqa-suite", %err, "could not close scenario page");
            }
        }
        ctx.set_current_page(None).await;
    }
}

/// Screenshot the scenario's current page into the artifact directory.
async fn capture_failure_artifact(
    ctx: &ScenarioContext,
    scenario: &str,
    attempt: u32,
) -> Option<PathBuf> {
    if !ctx.config.capture.screenshots {
        return None;
    }
    let driver = ctx.driver.as_ref()?;
    let page = ctx.current_page().await?;

    match driver.screenshot(page).await {
        Ok(bytes) => {
            let dir = &ctx.config.artifacts_dir;
            if let Err(err) = std::fs::create_dir_all(dir) {
                warn!(target: "demoqa-suite", %err, "could not create artifact directory");
                return None;
            }
            let slug = scenario.to_lowercase().replace(' ', "-");
            let path = dir.join(format!("{slug}-attempt{attempt}.png"));
            match std::fs::write(&path, bytes) {
                Ok(()) => {
                    info!(target: "demoqa-suite", artifact = %path.display(), "failure screenshot captured");
                    Some(path)
                }
                Err(err) => {
                    warn!(target: "demoqa-suite", %err, "could not write artifact");
                    None
                }
            }
        }
        Err(err) => {
            warn!(target: "demoqa-suite", %err, "screenshot capture failed");
            None
        }
    }
}
