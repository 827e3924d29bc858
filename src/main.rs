use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use cdp_driver::Driver;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use demoqa_suite::scenarios;
use demoqa_suite::{report, run_scenarios, ScenarioContext, SuiteConfig};

#[derive(Parser)]
#[command(
    name = "demoqa-suite",
    version,
    about = "End-to-end UI and API test suite for the DemoQA demo site"
)]
struct Cli {
    /// Configuration file (defaults to suite.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios sequentially on a single worker.
    Run {
        /// Only run scenarios whose name contains this filter
        /// (case-insensitive).
        #[arg(long)]
        scenario: Option<String>,

        /// Run with a visible browser window.
        #[arg(long)]
        headed: bool,
    },
    /// List the registered scenarios.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!(
        target: "demoqa-suite",
        build_date = env!("BUILD_DATE"),
        git = env!("GIT_HASH"),
        "demoqa-suite starting"
    );

    let cli = Cli::parse();
    let mut config = SuiteConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::List => {
            for scenario in scenarios::registry() {
                println!("{}", scenario.name());
            }
            Ok(())
        }
        Commands::Run { scenario, headed } => {
            if headed {
                config.headless = false;
            }
            run(config, scenario).await
        }
    }
}

async fn run(config: SuiteConfig, filter: Option<String>) -> Result<()> {
    if config.workers != 1 {
        tracing::warn!(
            target: "demoqa-suite",
            workers = config.workers,
            "scenarios always run on a single worker; the setting is ignored"
        );
    }

    let selected: Vec<_> = scenarios::registry()
        .into_iter()
        .filter(|scenario| match &filter {
            Some(filter) => scenario
                .name()
                .to_lowercase()
                .contains(&filter.to_lowercase()),
            None => true,
        })
        .collect();
    anyhow::ensure!(!selected.is_empty(), "no scenario matches the filter");

    let driver = if selected.iter().any(|scenario| scenario.requires_browser()) {
        let driver = Arc::new(Driver::new(config.driver_config()));
        Arc::clone(&driver).start().await?;
        Some(driver)
    } else {
        None
    };

    let ctx = ScenarioContext::new(config.clone(), driver.clone());
    let outcomes = run_scenarios(&ctx, &selected, config.retries).await;
    let summary = report::log_summary(&outcomes);

    if let Some(driver) = driver {
        driver.shutdown().await;
    }

    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
