//! Pacing configuration and the settle primitive.
//!
//! The durations here are tuned to one specific external site's current
//! rendering behavior. They are site-tuning data, not invariants, which is
//! why they live in configuration instead of the flow logic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// Deadline for locating an element before acting on it.
    pub action_deadline_ms: u64,
    /// Generic bound for condition waits (element present, modal visible).
    pub wait_timeout_ms: u64,
    /// Pause after each drag so the list reflow settles before the next
    /// position is evaluated.
    pub drag_settle_ms: u64,
    /// Pause after the last drag before the final order is verified.
    pub reorder_settle_ms: u64,
    /// Two elements within this vertical distance occupy the same slot.
    /// Layout rounding makes exact pixel equality unreliable.
    pub position_tolerance_px: f64,
    /// Bound for the popup target to attach after the triggering click.
    pub popup_timeout_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            action_deadline_ms: 10_000,
            wait_timeout_ms: 30_000,
            drag_settle_ms: 1_000,
            reorder_settle_ms: 5_000,
            position_tolerance_px: 5.0,
            popup_timeout_ms: 10_000,
        }
    }
}

/// Deliberate pause compensating for asynchronous rendering on the target
/// site. Every fixed delay in the flows goes through here so call sites can
/// be found and replaced with event-based waits if the target changes.
pub async fn settle(duration_ms: u64) {
    if duration_ms > 0 {
        tokio::time::sleep(Duration::from_millis(duration_ms)).await;
    }
}
