//! Front-end scenarios, one per exercised page.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Result};
use async_trait::async_trait;
use cdp_driver::{Driver, PageId, WaitGate};
use chrono::Utc;
use page_flows::{
    clean_interface, BrowserWindowsPage, PracticeFormPage, ProgressBarPage, Record, SortablePage,
    UploadPage, WebTablesPage,
};
use tracing::info;

use crate::runner::{Scenario, ScenarioContext, ScenarioReport};

/// Create the page, wait for the DOM and strip the site's noise elements.
async fn open(ctx: &ScenarioContext, path: &str) -> Result<(Arc<Driver>, PageId)> {
    let driver = ctx.driver()?;
    let url = ctx.config.page_url(path);
    let page = driver.create_page(&url).await?;
    driver
        .wait_gate(
            page,
            WaitGate::DomReady,
            Duration::from_millis(ctx.config.driver.deadline_ms),
        )
        .await?;
    ctx.set_current_page(Some(page)).await;
    clean_interface(&driver, page).await?;
    Ok((driver, page))
}

pub struct PracticeFormScenario;

#[async_trait]
impl Scenario for PracticeFormScenario {
    fn name(&self) -> &'static str {
        "Practice Form Submission"
    }

    async fn run(&self, ctx: &ScenarioContext, report: &mut ScenarioReport) -> Result<()> {
        let (driver, page) = report
            .step(
                "Given the user is on the Automation Practice Form page",
                open(ctx, "automation-practice-form"),
            )
            .await?;
        let form = PracticeFormPage::new(driver, page, ctx.config.pacing.clone());

        report
            .step(
                "When the user fills in the form with valid dynamic data",
                async {
                    let email = format!("pedro{}@test.com", Utc::now().timestamp_millis());
                    form.fill("Pedro", "Amaral", &email).await?;
                    Ok(())
                },
            )
            .await?;

        report
            .step("Then a success modal should be displayed", async {
                let text = form.submission_modal_text().await?;
                ensure!(
                    text.contains("Thanks for submitting the form"),
                    "modal text was: {text}"
                );
                form.dismiss_modal().await?;
                Ok(())
            })
            .await
    }
}

pub struct BrowserWindowsScenario;

#[async_trait]
impl Scenario for BrowserWindowsScenario {
    fn name(&self) -> &'static str {
        "Browser Windows Validation"
    }

    async fn run(&self, ctx: &ScenarioContext, report: &mut ScenarioReport) -> Result<()> {
        let (driver, page) = report
            .step(
                "Given the user navigates to the Browser Windows page",
                open(ctx, "browser-windows"),
            )
            .await?;
        let windows = BrowserWindowsPage::new(driver, page, ctx.config.pacing.clone());

        report
            .step(
                "Then the new window is opened and contains the expected sample text",
                async {
                    windows.validate_new_window().await?;
                    Ok(())
                },
            )
            .await
    }
}

pub struct WebTablesScenario;

#[async_trait]
impl Scenario for WebTablesScenario {
    fn name(&self) -> &'static str {
        "Web Tables CRUD and Dynamic Bulk Creation"
    }

    async fn run(&self, ctx: &ScenarioContext, report: &mut ScenarioReport) -> Result<()> {
        let (driver, page) = report
            .step(
                "Given the user is on the Web Tables page",
                open(ctx, "webtables"),
            )
            .await?;
        let table = WebTablesPage::new(driver, page, ctx.config.pacing.clone());
        let email = "pedro.amaral@test.com";

        report
            .step(
                "When the user performs CRUD operations on a single record",
                async {
                    table
                        .create_record(&Record::new("Pedro", "Amaral", email, "30", "5000", "IT"))
                        .await?;
                    table.edit_record(email, "Pedro Edited").await?;
                    table.delete_record(email).await?;
                    ensure!(
                        table.dynamic_row_count(email).await? == 0,
                        "the deleted record still has matching rows"
                    );
                    Ok(())
                },
            )
            .await?;

        report
            .step("And the user creates 12 dynamic records", async {
                table.create_multiple_records(12).await?;
                Ok(())
            })
            .await?;

        report
            .step(
                "Then the user deletes all created dynamic records successfully",
                async {
                    let before = table.dynamic_row_count("@test.com").await?;
                    ensure!(before == 12, "expected 12 dynamic rows, found {before}");

                    let deleted = table.delete_all_dynamic_records().await?;
                    info!(target: "demoqa-suite", deleted, "bulk deletion finished");

                    let after = table.dynamic_row_count("@test.com").await?;
                    ensure!(after == 0, "expected 0 dynamic rows, found {after}");
                    Ok(())
                },
            )
            .await
    }
}

pub struct ProgressBarScenario;

#[async_trait]
impl Scenario for ProgressBarScenario {
    fn name(&self) -> &'static str {
        "Progress Bar Control"
    }

    async fn run(&self, ctx: &ScenarioContext, report: &mut ScenarioReport) -> Result<()> {
        let (driver, page) = report
            .step(
                "Given the user is on the Progress Bar page",
                open(ctx, "progress-bar"),
            )
            .await?;
        let progress = ProgressBarPage::new(
            driver,
            page,
            ctx.config.progress.clone(),
            Duration::from_millis(ctx.config.pacing.action_deadline_ms),
        );

        report
            .step(
                "Then the user interacts with the progress bar and resets it after 100%",
                async {
                    let outcome = progress.run().await?;
                    info!(
                        target: "demoqa-suite",
                        stopped_at = outcome.stopped_at,
                        "progress cycle finished"
                    );
                    Ok(())
                },
            )
            .await
    }
}

pub struct SortableScenario;

#[async_trait]
impl Scenario for SortableScenario {
    fn name(&self) -> &'static str {
        "Sortable List Drag and Drop"
    }

    async fn run(&self, ctx: &ScenarioContext, report: &mut ScenarioReport) -> Result<()> {
        let (driver, page) = report
            .step(
                "Given the user is on the Sortable List page",
                open(ctx, "sortable"),
            )
            .await?;
        let sortable = SortablePage::new(driver, page, ctx.config.pacing.clone());

        report
            .step(
                "Then the user reorders the list to descending order successfully",
                async {
                    let drags = sortable.sort_descending().await?;
                    info!(target: "demoqa-suite", drags, "list reordered");
                    Ok(())
                },
            )
            .await
    }
}

pub struct UploadScenario;

#[async_trait]
impl Scenario for UploadScenario {
    fn name(&self) -> &'static str {
        "Upload File Validation"
    }

    async fn run(&self, ctx: &ScenarioContext, report: &mut ScenarioReport) -> Result<()> {
        let (driver, page) = report
            .step(
                "Given the user is on the Upload and Download page",
                open(ctx, "upload-download"),
            )
            .await?;
        let upload = UploadPage::new(driver, page, ctx.config.pacing.clone());

        report
            .step("When a local file is uploaded", async {
                let label = upload.upload_file(&ctx.config.upload_fixture).await?;
                info!(target: "demoqa-suite", %label, "upload accepted");
                Ok(())
            })
            .await
    }
}
