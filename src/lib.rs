//! DemoQA end-to-end suite: scenario layer over the page flows and the
//! Book Store client, plus run configuration and reporting.

pub mod config;
pub mod report;
pub mod runner;
pub mod scenarios;

pub use config::SuiteConfig;
pub use runner::{run_scenarios, RunOutcome, Scenario, ScenarioContext, ScenarioReport};
