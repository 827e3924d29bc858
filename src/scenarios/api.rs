//! Book Store API scenario: direct REST calls, no browser.

use anyhow::{ensure, Result};
use async_trait::async_trait;
use bookstore_client::{run_reservation_flow, BookStoreClient, Credentials};
use tracing::info;

use crate::runner::{Scenario, ScenarioContext, ScenarioReport};

pub struct BookStoreScenario;

#[async_trait]
impl Scenario for BookStoreScenario {
    fn name(&self) -> &'static str {
        "Book Store API Flow"
    }

    fn requires_browser(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &ScenarioContext, report: &mut ScenarioReport) -> Result<()> {
        let client = BookStoreClient::new(&ctx.config.base_url)?;

        let credentials = report
            .step("Given generated session credentials", async {
                let credentials = Credentials::generate();
                info!(
                    target: "demoqa-suite",
                    user_name = %credentials.user_name,
                    "credentials generated"
                );
                Ok(credentials)
            })
            .await?;

        let outcome = report
            .step(
                "When the account, token and reservation flow runs end to end",
                async { Ok(run_reservation_flow(&client, &credentials).await?) },
            )
            .await?;

        report
            .step(
                "Then the profile lists exactly the two reserved titles",
                async {
                    ensure!(
                        outcome.reserved_titles.len() == 2,
                        "profile lists {} titles",
                        outcome.reserved_titles.len()
                    );
                    info!(
                        target: "demoqa-suite",
                        user_id = %outcome.user_id,
                        titles = ?outcome.reserved_titles,
                        "reservation verified"
                    );
                    Ok(())
                },
            )
            .await
    }
}
