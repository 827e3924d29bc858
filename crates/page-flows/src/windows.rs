//! Browser Windows popup validation.

use std::sync::Arc;
use std::time::Duration;

use cdp_driver::{Driver, PageId, QuerySpec, WaitGate};
use tracing::info;

use crate::error::FlowError;
use crate::pacing::Pacing;
use crate::selectors;

const EXPECTED_HEADING: &str = "This is a sample page";

pub struct BrowserWindowsPage {
    driver: Arc<Driver>,
    page: PageId,
    pacing: Pacing,
}

impl BrowserWindowsPage {
    pub fn new(driver: Arc<Driver>, page: PageId, pacing: Pacing) -> Self {
        Self {
            driver,
            page,
            pacing,
        }
    }

    /// Trigger the popup, wait for its target to attach, assert the sample
    /// heading and close it. The subscription happens before the click so
    /// the attach event cannot be missed.
    pub async fn validate_new_window(&self) -> Result<(), FlowError> {
        let events = self.driver.page_events();

        self.driver
            .click(
                self.page,
                &QuerySpec::css(selectors::WINDOW_BUTTON),
                Duration::from_millis(self.pacing.action_deadline_ms),
            )
            .await?;

        let popup = self
            .driver
            .wait_for_attached(
                events,
                self.page,
                Duration::from_millis(self.pacing.popup_timeout_ms),
            )
            .await
            .map_err(|err| FlowError::wait_context(err, "popup window never attached"))?;

        self.driver
            .wait_gate(
                popup,
                WaitGate::DomReady,
                Duration::from_millis(self.pacing.wait_timeout_ms),
            )
            .await
            .map_err(|err| FlowError::wait_context(err, "popup window never finished loading"))?;

        let heading = self
            .driver
            .inner_text(popup, &QuerySpec::css(selectors::SAMPLE_HEADING))
            .await?;

        let result = if heading == EXPECTED_HEADING {
            info!(target: "page-flows", "popup heading validated");
            Ok(())
        } else {
            Err(FlowError::assertion(
                "popup heading",
                EXPECTED_HEADING,
                heading,
            ))
        };

        // Close the popup even when the assertion failed; the scenario owns
        // only one driving session.
        self.driver.close_page(popup).await?;
        result
    }
}
