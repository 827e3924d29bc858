//! Popup validation against a fake transport that emits target events when
//! the window button is clicked, exercising the driver's event pump the way
//! the real browser does.

mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cdp_driver::{CdpTransport, CommandTarget, DriverError, TransportEvent};
use page_flows::{BrowserWindowsPage, FlowError, Pacing};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use support::{element, evaluate_ok, query_selector_of, sim_driver};

const POPUP_SESSION: &str = "popup-session";
const POPUP_TARGET: &str = "popup-target";

struct WindowSim {
    heading: String,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: Mutex<mpsc::Receiver<TransportEvent>>,
    popup_closed: AtomicBool,
}

impl WindowSim {
    fn new(heading: &str) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel(16);
        Arc::new(Self {
            heading: heading.to_string(),
            events_tx,
            events_rx: Mutex::new(events_rx),
            popup_closed: AtomicBool::new(false),
        })
    }

    fn popup_closed(&self) -> bool {
        self.popup_closed.load(Ordering::SeqCst)
    }

    async fn emit_popup(&self) {
        let created = TransportEvent {
            method: "Target.targetCreated".into(),
            params: json!({
                "targetInfo": {
                    "targetId": POPUP_TARGET,
                    "type": "page",
                    "url": "https://demoqa.com/sample",
                }
            }),
            session_id: None,
        };
        let attached = TransportEvent {
            method: "Target.attachedToTarget".into(),
            params: json!({
                "sessionId": POPUP_SESSION,
                "targetInfo": {
                    "targetId": POPUP_TARGET,
                    "type": "page",
                }
            }),
            session_id: None,
        };
        let _ = self.events_tx.send(created).await;
        let _ = self.events_tx.send(attached).await;
    }
}

#[async_trait]
impl CdpTransport for WindowSim {
    async fn start(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        let mut guard = self.events_rx.lock().await;
        guard.recv().await
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError> {
        let on_popup =
            matches!(&target, CommandTarget::Session(session) if session.as_str() == POPUP_SESSION);

        match method {
            "Runtime.evaluate" => {
                let expression = params
                    .get("expression")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();

                if expression.contains("readyState") {
                    return Ok(evaluate_ok(Value::String("complete".into())));
                }

                if expression.contains("querySelectorAll(") {
                    let selector = query_selector_of(expression).unwrap_or_default();
                    let entries = match (on_popup, selector.as_str()) {
                        (true, "#sampleHeading") => {
                            vec![element(20.0, 20.0, 200.0, 30.0, &self.heading)]
                        }
                        (false, "#windowButton") => {
                            vec![element(10.0, 30.0, 120.0, 20.0, "New Window")]
                        }
                        _ => vec![],
                    };
                    return Ok(evaluate_ok(Value::Array(entries)));
                }

                Ok(evaluate_ok(Value::Null))
            }
            "Input.dispatchMouseEvent" => {
                if !on_popup
                    && params.get("type").and_then(|v| v.as_str()) == Some("mousePressed")
                {
                    self.emit_popup().await;
                }
                Ok(Value::Null)
            }
            "Target.closeTarget" => {
                if params.get("targetId").and_then(|v| v.as_str()) == Some(POPUP_TARGET) {
                    self.popup_closed.store(true, Ordering::SeqCst);
                }
                Ok(json!({ "success": true }))
            }
            _ => Ok(Value::Null),
        }
    }
}

#[tokio::test]
async fn popup_heading_is_validated_and_the_window_closed() {
    let sim = WindowSim::new("This is a sample page");
    let (driver, page) = sim_driver(sim.clone());
    Arc::clone(&driver).start().await.expect("start driver");

    let flows = BrowserWindowsPage::new(Arc::clone(&driver), page, Pacing::default());
    flows.validate_new_window().await.expect("popup validation");

    assert!(sim.popup_closed(), "popup must be closed after validation");
    driver.shutdown().await;
}

#[tokio::test]
async fn wrong_heading_fails_but_still_closes_the_popup() {
    let sim = WindowSim::new("Wrong heading");
    let (driver, page) = sim_driver(sim.clone());
    Arc::clone(&driver).start().await.expect("start driver");

    let flows = BrowserWindowsPage::new(Arc::clone(&driver), page, Pacing::default());
    let err = flows
        .validate_new_window()
        .await
        .expect_err("heading mismatch");
    match err {
        FlowError::Assertion { what, actual, .. } => {
            assert_eq!(what, "popup heading");
            assert_eq!(actual, "Wrong heading");
        }
        other => panic!("expected Assertion, got {other:?}"),
    }

    assert!(sim.popup_closed(), "popup is closed even on failure");
    driver.shutdown().await;
}
