//! Automation Practice Form operations.

use std::sync::Arc;
use std::time::Duration;

use cdp_driver::{Driver, PageId, QuerySpec, WaitGate};
use tracing::info;

use crate::error::FlowError;
use crate::pacing::Pacing;
use crate::selectors;

/// Fixed phone number the form is always submitted with.
const PHONE_NUMBER: &str = "1234567890";

pub struct PracticeFormPage {
    driver: Arc<Driver>,
    page: PageId,
    pacing: Pacing,
}

impl PracticeFormPage {
    pub fn new(driver: Arc<Driver>, page: PageId, pacing: Pacing) -> Self {
        Self {
            driver,
            page,
            pacing,
        }
    }

    /// Fill the four fields, pick the fixed gender option, fill the fixed
    /// phone number and submit. The caller verifies the success modal.
    pub async fn fill(&self, first: &str, last: &str, email: &str) -> Result<(), FlowError> {
        let deadline = Duration::from_millis(self.pacing.action_deadline_ms);
        info!(target: "page-flows", first, last, email, "filling practice form");

        self.driver
            .type_text(self.page, selectors::FIRST_NAME, first, deadline)
            .await?;
        self.driver
            .type_text(self.page, selectors::LAST_NAME, last, deadline)
            .await?;
        self.driver
            .type_text(self.page, selectors::USER_EMAIL, email, deadline)
            .await?;
        self.driver
            .click(
                self.page,
                &QuerySpec::css(selectors::GENDER_MALE_LABEL),
                deadline,
            )
            .await?;
        self.driver
            .type_text(self.page, selectors::USER_NUMBER, PHONE_NUMBER, deadline)
            .await?;
        self.driver
            .click(self.page, &QuerySpec::css(selectors::SUBMIT), deadline)
            .await?;
        Ok(())
    }

    /// Wait for the success modal and return its text.
    pub async fn submission_modal_text(&self) -> Result<String, FlowError> {
        self.driver
            .wait_gate(
                self.page,
                WaitGate::Condition {
                    expression: selectors::present(selectors::MODAL_CONTENT),
                },
                Duration::from_millis(self.pacing.wait_timeout_ms),
            )
            .await
            .map_err(|err| FlowError::wait_context(err, "submission modal did not appear"))?;

        Ok(self
            .driver
            .inner_text(self.page, &QuerySpec::css(selectors::MODAL_CONTENT))
            .await?)
    }

    /// Dismiss the modal with Escape.
    pub async fn dismiss_modal(&self) -> Result<(), FlowError> {
        self.driver.press_key(self.page, "Escape").await?;
        Ok(())
    }
}
