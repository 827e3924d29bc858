//! Progress-bar controller against a scripted widget simulation. The fake
//! advances the reported value on every poll while running, so the tests
//! observe the controller's actual polling behavior instead of sleeping.

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdp_driver::{CdpTransport, CommandTarget, DriverError, TransportEvent};
use page_flows::{FlowError, ProgressBarPage, ProgressPacing};
use serde_json::Value;
use tokio::sync::Mutex;

use support::{
    element, equals_value_of, evaluate_ok, query_selector_of, range_bounds_of, sim_driver,
    single_selector_of,
};

struct ProgressModel {
    value: i64,
    tick: i64,
    /// Added when the stop click lands, simulating the bar advancing past
    /// the window before the click registers.
    overshoot: i64,
    running: bool,
    completed: bool,
    start_stop_clicks: usize,
    window_polls: usize,
    forced_reset_clicks: usize,
}

impl ProgressModel {
    fn new(tick: i64, overshoot: i64) -> Self {
        Self {
            value: 0,
            tick,
            overshoot,
            running: false,
            completed: false,
            start_stop_clicks: 0,
            window_polls: 0,
            forced_reset_clicks: 0,
        }
    }

    fn tick_if_running(&mut self) {
        if self.running {
            self.value += self.tick;
            if self.value >= 100 {
                self.value = 100;
                self.running = false;
                self.completed = true;
            }
        }
    }
}

struct ProgressSim {
    model: Mutex<ProgressModel>,
}

impl ProgressSim {
    fn new(tick: i64, overshoot: i64) -> Arc<Self> {
        Arc::new(Self {
            model: Mutex::new(ProgressModel::new(tick, overshoot)),
        })
    }

    async fn snapshot(&self) -> (i64, bool, usize, usize, usize) {
        let model = self.model.lock().await;
        (
            model.value,
            model.completed,
            model.start_stop_clicks,
            model.window_polls,
            model.forced_reset_clicks,
        )
    }
}

#[async_trait]
impl CdpTransport for ProgressSim {
    async fn start(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        None
    }

    async fn send_command(
        &self,
        _target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError> {
        let mut model = self.model.lock().await;
        match method {
            "Runtime.evaluate" => {
                let expression = params
                    .get("expression")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();

                if expression.contains("querySelectorAll(") {
                    let selector = query_selector_of(expression).unwrap_or_default();
                    let entries = if selector == "#startStopButton" {
                        vec![element(10.0, 30.0, 100.0, 20.0, "Start")]
                    } else {
                        vec![]
                    };
                    return Ok(evaluate_ok(Value::Array(entries)));
                }

                if expression.contains("el.click()") {
                    let selector = single_selector_of(expression).unwrap_or_default();
                    if selector == "#resetButton" {
                        model.forced_reset_clicks += 1;
                        if model.completed {
                            model.value = 0;
                            model.completed = false;
                        }
                    }
                    return Ok(evaluate_ok(
                        serde_json::json!({ "status": "clicked" }),
                    ));
                }

                if expression.contains("parseInt(") {
                    model.tick_if_running();
                    model.window_polls += 1;
                    let (low, high) = range_bounds_of(expression).expect("range bounds");
                    let inside = model.value >= low && model.value <= high;
                    return Ok(evaluate_ok(Value::Bool(inside)));
                }

                if expression.contains("=== ") {
                    let expected = equals_value_of(expression).expect("equals literal");
                    return Ok(evaluate_ok(Value::Bool(
                        model.value.to_string() == expected,
                    )));
                }

                if expression.contains("'ok'") {
                    return Ok(evaluate_ok(serde_json::json!({
                        "status": "ok",
                        "value": model.value.to_string(),
                    })));
                }

                if expression.contains("!== null") {
                    let selector = single_selector_of(expression).unwrap_or_default();
                    let satisfied = match selector.as_str() {
                        ".progress-bar.bg-success" => {
                            model.tick_if_running();
                            model.completed
                        }
                        "#resetButton" => model.completed,
                        _ => false,
                    };
                    return Ok(evaluate_ok(Value::Bool(satisfied)));
                }

                Ok(evaluate_ok(Value::Null))
            }
            "Input.dispatchMouseEvent" => {
                if params.get("type").and_then(|v| v.as_str()) == Some("mousePressed") {
                    model.start_stop_clicks += 1;
                    if model.running {
                        model.running = false;
                        model.value += model.overshoot;
                    } else if !model.completed {
                        model.running = true;
                    }
                }
                Ok(Value::Null)
            }
            _ => Ok(Value::Null),
        }
    }
}

fn fast_pacing() -> ProgressPacing {
    ProgressPacing {
        stop_window_low: 15,
        stop_window_high: 22,
        stop_ceiling: 25,
        window_timeout_ms: 2_000,
        stop_settle_ms: 0,
        completion_timeout_ms: 2_000,
        reset_visible_timeout_ms: 500,
        reset_bind_settle_ms: 0,
        reset_value_timeout_ms: 500,
    }
}

#[tokio::test]
async fn full_cycle_stops_inside_window_and_resets_to_zero() {
    let sim = ProgressSim::new(4, 2);
    let (driver, page) = sim_driver(sim.clone());
    let controller =
        ProgressBarPage::new(driver, page, fast_pacing(), Duration::from_millis(500));

    let outcome = controller.run().await.expect("full cycle");

    // Stopped at 16 when the window condition fired, plus the simulated
    // overshoot when the click landed.
    assert_eq!(outcome.stopped_at, 18);

    let (value, completed, clicks, window_polls, resets) = sim.snapshot().await;
    assert_eq!(value, 0, "reset must land on exactly zero");
    assert!(!completed);
    assert_eq!(clicks, 3, "start, stop, resume");
    assert!(
        window_polls >= 2,
        "the stop window wait must poll, not sleep once"
    );
    assert_eq!(resets, 1, "reset goes through the forced click path");
}

#[tokio::test]
async fn stalled_widget_times_out_on_the_window_wait() {
    let sim = ProgressSim::new(0, 0);
    let (driver, page) = sim_driver(sim.clone());
    let mut pacing = fast_pacing();
    pacing.window_timeout_ms = 60;
    let controller = ProgressBarPage::new(driver, page, pacing, Duration::from_millis(500));

    let err = controller.run().await.expect_err("window never reached");
    match err {
        FlowError::WaitTimeout(message) => {
            assert!(message.contains("stop window"), "got: {message}")
        }
        other => panic!("expected WaitTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn overshoot_past_the_ceiling_fails_the_stop_assertion() {
    let sim = ProgressSim::new(4, 15);
    let (driver, page) = sim_driver(sim.clone());
    let controller =
        ProgressBarPage::new(driver, page, fast_pacing(), Duration::from_millis(500));

    let err = controller.run().await.expect_err("stop value too high");
    match err {
        FlowError::Assertion { what, actual, .. } => {
            assert!(what.contains("after stop"));
            assert_eq!(actual, "31");
        }
        other => panic!("expected Assertion, got {other:?}"),
    }
}
