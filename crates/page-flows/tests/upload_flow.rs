//! Upload flow against a fake DOM domain, plus the clean-interface
//! idempotence check.

mod support;

use std::sync::Arc;

use async_trait::async_trait;
use cdp_driver::{CdpTransport, CommandTarget, DriverError, TransportEvent};
use page_flows::{clean_interface, FlowError, Pacing, UploadPage};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use support::{element, evaluate_ok, query_selector_of, sim_driver};

struct UploadModel {
    uploaded_label: Option<String>,
    noise_nodes: u64,
    missing_input: bool,
}

struct UploadSim {
    model: Mutex<UploadModel>,
}

impl UploadSim {
    fn new(missing_input: bool) -> Arc<Self> {
        Arc::new(Self {
            model: Mutex::new(UploadModel {
                uploaded_label: None,
                noise_nodes: 4,
                missing_input,
            }),
        })
    }
}

#[async_trait]
impl CdpTransport for UploadSim {
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
            "DOM.getDocument" => Ok(json!({ "root": { "nodeId": 1 } })),
            "DOM.querySelector" => {
                let node_id = if model.missing_input { 0 } else { 9 };
                Ok(json!({ "nodeId": node_id }))
            }
            "DOM.setFileInputFiles" => {
                let path = params
                    .get("files")
                    .and_then(|files| files.get(0))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
                model.uploaded_label = Some(format!("C:\\fakepath\\{name}"));
                Ok(Value::Null)
            }
            "Runtime.evaluate" => {
                let expression = params
                    .get("expression")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();

                if expression.contains("let removed") {
                    let removed = model.noise_nodes;
                    model.noise_nodes = 0;
                    return Ok(evaluate_ok(json!(removed)));
                }

                if expression.contains("querySelectorAll(") {
                    let selector = query_selector_of(expression).unwrap_or_default();
                    let entries = match (selector.as_str(), &model.uploaded_label) {
                        ("#uploadedFilePath", Some(label)) => {
                            vec![element(10.0, 120.0, 300.0, 18.0, label)]
                        }
                        _ => vec![],
                    };
                    return Ok(evaluate_ok(Value::Array(entries)));
                }

                if expression.contains("!== null") {
                    return Ok(evaluate_ok(Value::Bool(model.uploaded_label.is_some())));
                }

                Ok(evaluate_ok(Value::Null))
            }
            _ => Ok(Value::Null),
        }
    }
}

#[tokio::test]
async fn upload_reports_the_fixture_file_name() {
    let sim = UploadSim::new(false);
    let (driver, page) = sim_driver(sim);
    let flows = UploadPage::new(driver, page, Pacing::default());

    let dir = tempfile::tempdir().expect("temp dir");
    let fixture = dir.path().join("upload-sample.txt");
    std::fs::write(&fixture, b"sample upload payload\n").expect("write fixture");

    let label = flows.upload_file(&fixture).await.expect("upload");
    assert!(
        label.contains("upload-sample.txt"),
        "label must carry the file name, got: {label}"
    );
}

#[tokio::test]
async fn missing_file_input_is_a_not_found_failure() {
    let sim = UploadSim::new(true);
    let (driver, page) = sim_driver(sim);
    let flows = UploadPage::new(driver, page, Pacing::default());

    let dir = tempfile::tempdir().expect("temp dir");
    let fixture = dir.path().join("upload-sample.txt");
    std::fs::write(&fixture, b"sample upload payload\n").expect("write fixture");

    let err = flows
        .upload_file(&fixture)
        .await
        .expect_err("input missing");
    match err {
        FlowError::NotFound(message) => {
            assert!(message.contains("#uploadFile"), "got: {message}")
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn clean_interface_is_idempotent() {
    let sim = UploadSim::new(false);
    let (driver, page) = sim_driver(sim);

    let first = clean_interface(&driver, page).await.expect("first pass");
    let second = clean_interface(&driver, page).await.expect("second pass");

    assert_eq!(first, 4);
    assert_eq!(second, 0, "second pass finds nothing left to remove");
}
