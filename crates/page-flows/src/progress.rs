//! Progress bar controller.
//!
//! Drives the widget through its full cycle: start, stop inside a safety
//! window below 25%, resume to completion, then force a reset back to zero.
//! Every blocking step is a polled condition wait — the animation rate is
//! not guaranteed, so a fixed sleep would race the widget.

use std::sync::Arc;
use std::time::Duration;

use cdp_driver::{Driver, PageId, QuerySpec, WaitGate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::FlowError;
use crate::pacing::settle;
use crate::selectors;

/// Timing and window constants for the progress-bar cycle. Tuned to the
/// target site's current animation timing; override from configuration when
/// the site changes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressPacing {
    /// Lower bound of the stop window.
    pub stop_window_low: u32,
    /// Upper bound of the stop window, kept below the ceiling to tolerate
    /// overshoot from polling granularity.
    pub stop_window_high: u32,
    /// The value observed after stopping must not exceed this. Guards
    /// against the stop click landing after the bar advanced past the
    /// window.
    pub stop_ceiling: u32,
    /// Bound for the value to enter the stop window after starting.
    pub window_timeout_ms: u64,
    /// Pause after the stop click before reading the settled value.
    pub stop_settle_ms: u64,
    /// Bound for the success-styled completion marker. Generous: a full run
    /// is long and variable.
    pub completion_timeout_ms: u64,
    /// Bound for the reset control to appear after completion.
    pub reset_visible_timeout_ms: u64,
    /// Pause before clicking the freshly rendered reset control — the site
    /// binds its handler to the new node late.
    pub reset_bind_settle_ms: u64,
    /// Bound for the value to read exactly "0" after reset.
    pub reset_value_timeout_ms: u64,
}

impl Default for ProgressPacing {
    fn default() -> Self {
        Self {
            stop_window_low: 15,
            stop_window_high: 22,
            stop_ceiling: 25,
            window_timeout_ms: 30_000,
            stop_settle_ms: 5_000,
            completion_timeout_ms: 40_000,
            reset_visible_timeout_ms: 10_000,
            reset_bind_settle_ms: 1_000,
            reset_value_timeout_ms: 10_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ProgressState {
    Idle,
    Running,
    Stopped,
    Completed,
    ResetInFlight,
}

/// What the cycle observed; scenarios assert on the stop value.
#[derive(Clone, Copy, Debug)]
pub struct ProgressOutcome {
    pub stopped_at: u32,
}

pub struct ProgressBarPage {
    driver: Arc<Driver>,
    page: PageId,
    pacing: ProgressPacing,
    action_deadline: Duration,
}

impl ProgressBarPage {
    pub fn new(
        driver: Arc<Driver>,
        page: PageId,
        pacing: ProgressPacing,
        action_deadline: Duration,
    ) -> Self {
        Self {
            driver,
            page,
            pacing,
            action_deadline,
        }
    }

    /// Run the full cycle. Any wait past its bound is a hard failure; the
    /// surrounding run configuration may retry the whole scenario.
    pub async fn run(&self) -> Result<ProgressOutcome, FlowError> {
        let pacing = &self.pacing;
        let mut state = ProgressState::Idle;

        // Idle -> Running
        self.click_start_stop().await?;
        state = self.transition(state, ProgressState::Running);

        // Running -> Stopped once the value enters the safety window.
        self.driver
            .wait_gate(
                self.page,
                WaitGate::Condition {
                    expression: selectors::attr_in_range(
                        selectors::PROGRESS_BAR,
                        "aria-valuenow",
                        pacing.stop_window_low,
                        pacing.stop_window_high,
                    ),
                },
                Duration::from_millis(pacing.window_timeout_ms),
            )
            .await
            .map_err(|err| {
                FlowError::wait_context(err, "progress value never entered the stop window")
            })?;
        self.click_start_stop().await?;
        state = self.transition(state, ProgressState::Stopped);

        settle(pacing.stop_settle_ms).await;
        let stopped_at = self.value().await?;
        if stopped_at == 0 || stopped_at > pacing.stop_ceiling {
            return Err(FlowError::assertion(
                "progress value after stop",
                format!("within (0, {}]", pacing.stop_ceiling),
                stopped_at.to_string(),
            ));
        }
        info!(target: "page-flows", stopped_at, "progress stopped inside the window");

        // Stopped -> Running (resume)
        self.click_start_stop().await?;
        state = self.transition(state, ProgressState::Running);

        // Running -> Completed when the success marker renders.
        self.driver
            .wait_gate(
                self.page,
                WaitGate::Condition {
                    expression: selectors::present(selectors::PROGRESS_SUCCESS),
                },
                Duration::from_millis(pacing.completion_timeout_ms),
            )
            .await
            .map_err(|err| FlowError::wait_context(err, "completion marker never appeared"))?;
        state = self.transition(state, ProgressState::Completed);

        // Completed -> ResetInFlight. The reset control is freshly rendered
        // and momentarily non-interactive, hence the settle plus forced
        // click.
        self.driver
            .wait_gate(
                self.page,
                WaitGate::Condition {
                    expression: selectors::present(selectors::RESET_BUTTON),
                },
                Duration::from_millis(pacing.reset_visible_timeout_ms),
            )
            .await
            .map_err(|err| FlowError::wait_context(err, "reset control never became visible"))?;
        settle(pacing.reset_bind_settle_ms).await;
        self.driver
            .click_forced(self.page, selectors::RESET_BUTTON)
            .await?;
        state = self.transition(state, ProgressState::ResetInFlight);

        // ResetInFlight -> Idle at exactly "0".
        self.driver
            .wait_gate(
                self.page,
                WaitGate::Condition {
                    expression: selectors::attr_equals(
                        selectors::PROGRESS_BAR,
                        "aria-valuenow",
                        "0",
                    ),
                },
                Duration::from_millis(pacing.reset_value_timeout_ms),
            )
            .await
            .map_err(|err| FlowError::wait_context(err, "progress value did not reset to 0"))?;
        self.transition(state, ProgressState::Idle);

        Ok(ProgressOutcome { stopped_at })
    }

    async fn click_start_stop(&self) -> Result<(), FlowError> {
        self.driver
            .click(
                self.page,
                &QuerySpec::css(selectors::START_STOP_BUTTON),
                self.action_deadline,
            )
            .await?;
        Ok(())
    }

    async fn value(&self) -> Result<u32, FlowError> {
        let raw = self
            .driver
            .attribute(self.page, selectors::PROGRESS_BAR, "aria-valuenow")
            .await?
            .unwrap_or_default();
        raw.parse().map_err(|_| {
            FlowError::assertion("aria-valuenow", "an integer", raw)
        })
    }

    fn transition(&self, from: ProgressState, to: ProgressState) -> ProgressState {
        debug!(target: "page-flows", ?from, ?to, "progress transition");
        to
    }
}
