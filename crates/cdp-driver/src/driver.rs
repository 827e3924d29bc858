//! Driver surface: page lifecycle, live element queries, input dispatch and
//! polled wait gates over a pluggable CDP transport.
//!
//! Queries are re-evaluated against the live document on every call; the
//! driver never hands out element handles that could go stale when the page
//! re-renders.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::select;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::error::{DriverError, DriverErrorKind};
use crate::events::PageEvent;
use crate::ids::{PageId, SessionId};
use crate::registry::Registry;
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};
use crate::wait::WaitGate;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// A live element query: CSS selector plus an optional visible-text filter.
#[derive(Clone, Debug)]
pub struct QuerySpec {
    pub selector: String,
    pub text: Option<String>,
}

impl QuerySpec {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: None,
        }
    }

    pub fn with_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: Some(text.into()),
        }
    }
}

/// Geometry and text of one matched element at query time.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementInfo {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub text: String,
}

impl ElementInfo {
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

pub struct Driver {
    pub cfg: DriverConfig,
    registry: Arc<Registry>,
    transport: Arc<dyn CdpTransport>,
    bus: broadcast::Sender<PageEvent>,
    targets: DashMap<String, PageId>,
    sessions: DashMap<String, PageId>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Driver {
    pub fn new(cfg: DriverConfig) -> Self {
        let transport: Arc<dyn CdpTransport> = Arc::new(ChromiumTransport::new(cfg.clone()));
        Self::with_transport(cfg, transport)
    }

    pub fn with_transport(cfg: DriverConfig, transport: Arc<dyn CdpTransport>) -> Self {
        let (bus, _) = broadcast::channel(256);
        Self {
            cfg,
            registry: Arc::new(Registry::new()),
            transport,
            bus,
            targets: DashMap::new(),
            sessions: DashMap::new(),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Subscribe to page lifecycle events. Subscribe before triggering the
    /// action that opens a popup, then use [`Driver::wait_for_attached`].
    pub fn page_events(&self) -> broadcast::Receiver<PageEvent> {
        self.bus.subscribe()
    }

    pub async fn start(self: Arc<Self>) -> Result<(), DriverError> {
        {
            let guard = self.tasks.lock().await;
            if !guard.is_empty() {
                return Ok(());
            }
        }

        self.transport.start().await?;
        let loop_task = tokio::spawn(Self::event_loop(Arc::clone(&self)));
        self.tasks.lock().await.push(loop_task);
        info!(target: "cdp-driver", "event loop started");
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut handles = self.tasks.lock().await;
        while let Some(handle) = handles.pop() {
            let _ = handle.await;
        }
    }

    pub fn register_page(
        &self,
        page: PageId,
        session: SessionId,
        target_id: Option<String>,
        cdp_session: Option<String>,
    ) {
        if let Some(cdp_session) = &cdp_session {
            self.sessions.insert(cdp_session.clone(), page);
        }
        if let Some(target_id) = &target_id {
            self.targets.insert(target_id.clone(), page);
        }
        self.registry
            .insert_page(page, session, target_id, cdp_session);
    }

    // ------------------------------------------------------------------
    // Page lifecycle
    // ------------------------------------------------------------------

    pub async fn create_page(&self, url: &str) -> Result<PageId, DriverError> {
        let response = self
            .send_command("Target.createTarget", json!({ "url": url }))
            .await?;
        let target_id = response
            .get("targetId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint("createTarget missing targetId")
            })?
            .to_string();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(entry) = self.targets.get(&target_id) {
                let page = *entry.value();
                if self
                    .registry
                    .get(&page)
                    .map(|ctx| ctx.cdp_session.is_some())
                    .unwrap_or(false)
                {
                    return Ok(page);
                }
            }

            if Instant::now() >= deadline {
                return Err(DriverError::new(DriverErrorKind::Internal)
                    .with_hint("timed out waiting for target attach"));
            }

            sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn close_page(&self, page: PageId) -> Result<(), DriverError> {
        let ctx = self.registry.get(&page).ok_or_else(|| {
            DriverError::new(DriverErrorKind::TargetNotFound).with_hint("page not registered")
        })?;

        if let Some(target_id) = &ctx.target_id {
            self.send_command("Target.closeTarget", json!({ "targetId": target_id }))
                .await?;
            self.targets.remove(target_id);
        }
        if let Some(cdp_session) = &ctx.cdp_session {
            self.sessions.remove(cdp_session);
        }
        self.registry.remove_page(&page);
        let _ = self.bus.send(PageEvent::Closed { page });
        Ok(())
    }

    pub async fn navigate(&self, page: PageId, url: &str) -> Result<(), DriverError> {
        self.registry.set_recent_url(&page, url.to_string());
        self.send_page_command(page, "Page.navigate", json!({ "url": url }))
            .await?;
        self.wait_gate(
            page,
            WaitGate::DomReady,
            Duration::from_millis(self.cfg.default_deadline_ms),
        )
        .await
    }

    /// Wait for the next page attach that is not `exclude` — the popup
    /// opened by a click issued after subscribing.
    pub async fn wait_for_attached(
        &self,
        mut rx: broadcast::Receiver<PageEvent>,
        exclude: PageId,
        timeout: Duration,
    ) -> Result<PageId, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or_else(|| {
                    DriverError::new(DriverErrorKind::NavTimeout)
                        .with_hint("popup did not attach before deadline")
                })?;

            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Ok(PageEvent::Attached { page })) if page != exclude => return Ok(page),
                Ok(Ok(_)) => continue,
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(DriverError::new(DriverErrorKind::Internal)
                        .with_hint("page event bus closed"));
                }
                Err(_) => {
                    return Err(DriverError::new(DriverErrorKind::NavTimeout)
                        .with_hint("popup did not attach before deadline"));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Evaluate the query against the current document. Always a fresh
    /// evaluation; the result reflects the DOM at this instant only.
    pub async fn query(
        &self,
        page: PageId,
        spec: &QuerySpec,
    ) -> Result<Vec<ElementInfo>, DriverError> {
        let selector_literal = json_literal(&spec.selector)?;
        let needle_literal = match &spec.text {
            Some(text) => json_literal(text)?,
            None => "null".to_string(),
        };

        let expression = format!(
            r#"(() => {{
    const needle = {needle};
    let elements;
    try {{
        elements = document.querySelectorAll({selector});
    }} catch (err) {{
        return [];
    }}
    return Array.from(elements)
        .filter((el) => needle === null || ((el.innerText || el.textContent || '').includes(needle)))
        .map((el) => {{
            const rect = el.getBoundingClientRect();
            return {{
                x: Number.isFinite(rect.left) ? rect.left : 0,
                y: Number.isFinite(rect.top) ? rect.top : 0,
                width: Number.isFinite(rect.width) ? rect.width : 0,
                height: Number.isFinite(rect.height) ? rect.height : 0,
                text: (el.innerText || el.textContent || '').trim()
            }};
        }});
}})()"#,
            needle = needle_literal,
            selector = selector_literal,
        );

        let value = self.evaluate(page, &expression).await?;
        let entries = value.as_array().ok_or_else(|| {
            DriverError::new(DriverErrorKind::Internal)
                .with_hint("query did not return an array value")
        })?;

        let mut infos = Vec::with_capacity(entries.len());
        for entry in entries {
            let info: RawElementInfo = serde_json::from_value(entry.clone()).map_err(|err| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint(format!("query entry malformed: {err}"))
            })?;
            infos.push(ElementInfo {
                x: info.x,
                y: info.y,
                width: info.width,
                height: info.height,
                text: info.text,
            });
        }
        Ok(infos)
    }

    pub async fn count(&self, page: PageId, spec: &QuerySpec) -> Result<usize, DriverError> {
        Ok(self.query(page, spec).await?.len())
    }

    pub async fn inner_texts(
        &self,
        page: PageId,
        spec: &QuerySpec,
    ) -> Result<Vec<String>, DriverError> {
        Ok(self
            .query(page, spec)
            .await?
            .into_iter()
            .map(|info| info.text)
            .collect())
    }

    /// Text of the first match; `TargetNotFound` when nothing matches.
    pub async fn inner_text(&self, page: PageId, spec: &QuerySpec) -> Result<String, DriverError> {
        self.query(page, spec)
            .await?
            .into_iter()
            .next()
            .map(|info| info.text)
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::TargetNotFound)
                    .with_hint(format!("no element matches '{}'", spec.selector))
            })
    }

    /// Attribute of the first match; `TargetNotFound` when nothing matches,
    /// `Ok(None)` when the element exists but lacks the attribute.
    pub async fn attribute(
        &self,
        page: PageId,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let selector_literal = json_literal(selector)?;
        let name_literal = json_literal(name)?;
        let expression = format!(
            r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) {{ return {{ status: 'not-found' }}; }}
    const value = el.getAttribute({name});
    return {{ status: 'ok', value: value }};
}})()"#,
            selector = selector_literal,
            name = name_literal,
        );

        let value = self.evaluate(page, &expression).await?;
        match value.get("status").and_then(|v| v.as_str()) {
            Some("ok") => Ok(value
                .get("value")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())),
            Some("not-found") => Err(DriverError::new(DriverErrorKind::TargetNotFound)
                .with_hint(format!("no element matches '{selector}'"))),
            _ => Err(DriverError::new(DriverErrorKind::Internal)
                .with_hint("attribute read returned unexpected payload")),
        }
    }

    // ------------------------------------------------------------------
    // Input dispatch
    // ------------------------------------------------------------------

    /// Click the first match with trusted mouse events, polling for the
    /// target until the deadline.
    pub async fn click(
        &self,
        page: PageId,
        spec: &QuerySpec,
        deadline: Duration,
    ) -> Result<(), DriverError> {
        self.click_nth(page, spec, 0, deadline).await
    }

    /// Click the match at `index`. The query is re-evaluated each poll so
    /// re-rendered lists resolve against current indices.
    pub async fn click_nth(
        &self,
        page: PageId,
        spec: &QuerySpec,
        index: usize,
        deadline: Duration,
    ) -> Result<(), DriverError> {
        let poll_interval = Duration::from_millis(self.cfg.poll_interval_ms);
        let deadline_instant = Instant::now() + deadline;

        let target = loop {
            let infos = self.query(page, spec).await?;
            if let Some(info) = infos.get(index) {
                break info.clone();
            }

            if Instant::now() >= deadline_instant {
                return Err(DriverError::new(DriverErrorKind::TargetNotFound).with_hint(format!(
                    "click target not found for selector '{}' (index {index})",
                    spec.selector
                )));
            }

            sleep(poll_interval).await;
        };

        self.dispatch_click_at(page, target.center_x(), target.center_y())
            .await
    }

    async fn dispatch_click_at(&self, page: PageId, x: f64, y: f64) -> Result<(), DriverError> {
        let press = json!({
            "type": "mousePressed",
            "x": x,
            "y": y,
            "button": "left",
            "buttons": 1,
            "clickCount": 1,
            "pointerType": "mouse",
        });
        self.send_page_command(page, "Input.dispatchMouseEvent", press)
            .await?;

        let release = json!({
            "type": "mouseReleased",
            "x": x,
            "y": y,
            "button": "left",
            "buttons": 1,
            "clickCount": 1,
            "pointerType": "mouse",
        });
        self.send_page_command(page, "Input.dispatchMouseEvent", release)
            .await?;
        Ok(())
    }

    /// Scripted `el.click()` bypassing hit testing. Used where a control is
    /// rendered but momentarily not interactable through real input.
    pub async fn click_forced(&self, page: PageId, selector: &str) -> Result<(), DriverError> {
        let selector_literal = json_literal(selector)?;
        let expression = format!(
            r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) {{ return {{ status: 'not-found' }}; }}
    el.click();
    return {{ status: 'clicked' }};
}})()"#,
            selector = selector_literal,
        );

        let value = self.evaluate(page, &expression).await?;
        match value.get("status").and_then(|v| v.as_str()) {
            Some("clicked") => Ok(()),
            Some("not-found") => Err(DriverError::new(DriverErrorKind::TargetNotFound)
                .with_hint(format!("forced click target '{selector}' not found"))),
            _ => Err(DriverError::new(DriverErrorKind::Internal)
                .with_hint("forced click returned unexpected payload")),
        }
    }

    /// Focus the element (selecting any existing content) and insert text,
    /// replacing what was there — fill semantics, not append.
    pub async fn type_text(
        &self,
        page: PageId,
        selector: &str,
        text: &str,
        deadline: Duration,
    ) -> Result<(), DriverError> {
        let selector_literal = json_literal(selector)?;
        let focus_expression = format!(
            r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) {{ return {{ status: 'not-found' }}; }}
    if (typeof el.focus === 'function') {{ el.focus(); }}
    if (typeof el.select === 'function') {{ el.select(); }}
    return {{ status: 'focused' }};
}})()"#,
            selector = selector_literal,
        );

        let poll_interval = Duration::from_millis(self.cfg.poll_interval_ms);
        let deadline_instant = Instant::now() + deadline;

        loop {
            let value = self.evaluate(page, &focus_expression).await?;
            match value.get("status").and_then(|v| v.as_str()) {
                Some("focused") => break,
                Some("not-found") => {
                    if Instant::now() >= deadline_instant {
                        return Err(DriverError::new(DriverErrorKind::TargetNotFound).with_hint(
                            format!("selector '{selector}' not found before deadline"),
                        ));
                    }
                    sleep(poll_interval).await;
                }
                other => {
                    return Err(DriverError::new(DriverErrorKind::Internal).with_hint(format!(
                        "failed to focus element for selector '{selector}' (status: {other:?})"
                    )));
                }
            }
        }

        self.send_page_command(page, "Input.insertText", json!({ "text": text }))
            .await?;
        Ok(())
    }

    /// Set a `<select>` value and dispatch the `input`/`change` events the
    /// page's framework listens for.
    pub async fn select_option(
        &self,
        page: PageId,
        selector: &str,
        value: &str,
        deadline: Duration,
    ) -> Result<(), DriverError> {
        let selector_literal = json_literal(selector)?;
        let selector_expression = format!("document.querySelector({selector_literal})");

        let poll_interval = Duration::from_millis(self.cfg.poll_interval_ms);
        let deadline_instant = Instant::now() + deadline;

        let object_id = loop {
            let response = self
                .send_page_command(
                    page,
                    "Runtime.evaluate",
                    json!({
                        "expression": selector_expression.clone(),
                        "objectGroup": "demoqa-select",
                        "returnByValue": false,
                    }),
                )
                .await?;

            if let Some(object_id) = response
                .get("result")
                .and_then(|res| res.get("objectId"))
                .and_then(|val| val.as_str())
            {
                break object_id.to_string();
            }

            if Instant::now() >= deadline_instant {
                return Err(DriverError::new(DriverErrorKind::TargetNotFound)
                    .with_hint(format!("select target '{selector}' not found")));
            }

            sleep(poll_interval).await;
        };

        const SELECT_FN: &str = r#"
function(targetValue) {
    if (!this) { return { status: 'not-found' }; }
    const options = Array.from(this.options || []);
    let option = options.find(opt => opt.value === targetValue);
    if (!option) {
        option = options.find(opt => opt.text === targetValue);
    }
    if (!option) { return { status: 'option-missing' }; }
    this.value = option.value;
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
    return { status: 'selected', value: this.value };
}
"#;

        let call_response = self
            .send_page_command(
                page,
                "Runtime.callFunctionOn",
                json!({
                    "objectId": object_id.clone(),
                    "functionDeclaration": SELECT_FN.trim(),
                    "arguments": [ { "value": value } ],
                    "awaitPromise": true,
                    "returnByValue": true,
                }),
            )
            .await?;

        let status = call_response
            .get("result")
            .and_then(|res| res.get("value"))
            .and_then(|val| val.get("status"))
            .and_then(|val| val.as_str())
            .unwrap_or("unknown")
            .to_string();

        let _ = self
            .send_page_command(
                page,
                "Runtime.releaseObject",
                json!({ "objectId": object_id }),
            )
            .await;

        match status.as_str() {
            "selected" => Ok(()),
            "not-found" => Err(DriverError::new(DriverErrorKind::TargetNotFound)
                .with_hint(format!("select target '{selector}' not found"))),
            "option-missing" => Err(DriverError::new(DriverErrorKind::OptionNotFound)
                .with_hint(format!("option '{value}' not found in '{selector}'"))),
            other => Err(DriverError::new(DriverErrorKind::Internal)
                .with_hint(format!("select_option failed: {other}"))),
        }
    }

    /// Populate a file input through the DOM domain.
    pub async fn set_file_input(
        &self,
        page: PageId,
        selector: &str,
        path: &str,
    ) -> Result<(), DriverError> {
        let document = self
            .send_page_command(page, "DOM.getDocument", json!({ "depth": 0 }))
            .await?;
        let root_id = document
            .get("root")
            .and_then(|root| root.get("nodeId"))
            .and_then(|v| v.as_u64())
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint("DOM.getDocument missing root nodeId")
            })?;

        let node = self
            .send_page_command(
                page,
                "DOM.querySelector",
                json!({ "nodeId": root_id, "selector": selector }),
            )
            .await?;
        let node_id = node
            .get("nodeId")
            .and_then(|v| v.as_u64())
            .filter(|id| *id != 0)
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::TargetNotFound)
                    .with_hint(format!("file input '{selector}' not found"))
            })?;

        self.send_page_command(
            page,
            "DOM.setFileInputFiles",
            json!({ "files": [path], "nodeId": node_id }),
        )
        .await?;
        Ok(())
    }

    /// Dispatch a key press (down + up). Known keys carry their virtual key
    /// codes so widgets keyed on them react.
    pub async fn press_key(&self, page: PageId, key: &str) -> Result<(), DriverError> {
        let (code, virtual_key) = match key {
            "Escape" => ("Escape", 27),
            "Enter" => ("Enter", 13),
            "Tab" => ("Tab", 9),
            other => (other, 0),
        };

        let down = json!({
            "type": "rawKeyDown",
            "key": key,
            "code": code,
            "windowsVirtualKeyCode": virtual_key,
            "nativeVirtualKeyCode": virtual_key,
        });
        self.send_page_command(page, "Input.dispatchKeyEvent", down)
            .await?;

        let up = json!({
            "type": "keyUp",
            "key": key,
            "code": code,
            "windowsVirtualKeyCode": virtual_key,
            "nativeVirtualKeyCode": virtual_key,
        });
        self.send_page_command(page, "Input.dispatchKeyEvent", up)
            .await?;
        Ok(())
    }

    /// Drag from one element's center to another's: press, interpolated
    /// moves, release. Pacing comes from the driver config so drag-aware
    /// widgets see a plausible pointer trajectory.
    pub async fn drag(
        &self,
        page: PageId,
        from: &ElementInfo,
        to: &ElementInfo,
    ) -> Result<(), DriverError> {
        let (from_x, from_y) = (from.center_x(), from.center_y());
        let (to_x, to_y) = (to.center_x(), to.center_y());
        let step_delay = Duration::from_millis(self.cfg.drag_step_delay_ms);
        let steps = self.cfg.drag_steps.max(1);

        self.dispatch_mouse_move(page, from_x, from_y, 0).await?;

        let press = json!({
            "type": "mousePressed",
            "x": from_x,
            "y": from_y,
            "button": "left",
            "buttons": 1,
            "clickCount": 1,
            "pointerType": "mouse",
        });
        self.send_page_command(page, "Input.dispatchMouseEvent", press)
            .await?;

        for step in 1..=steps {
            let t = step as f64 / steps as f64;
            let x = from_x + (to_x - from_x) * t;
            let y = from_y + (to_y - from_y) * t;
            self.dispatch_mouse_move(page, x, y, 1).await?;
            sleep(step_delay).await;
        }

        let release = json!({
            "type": "mouseReleased",
            "x": to_x,
            "y": to_y,
            "button": "left",
            "buttons": 1,
            "clickCount": 1,
            "pointerType": "mouse",
        });
        self.send_page_command(page, "Input.dispatchMouseEvent", release)
            .await?;
        Ok(())
    }

    async fn dispatch_mouse_move(
        &self,
        page: PageId,
        x: f64,
        y: f64,
        buttons: u32,
    ) -> Result<(), DriverError> {
        let payload = json!({
            "type": "mouseMoved",
            "x": x,
            "y": y,
            "button": if buttons == 0 { "none" } else { "left" },
            "buttons": buttons,
            "pointerType": "mouse",
        });
        self.send_page_command(page, "Input.dispatchMouseEvent", payload)
            .await
            .map(|_| ())
    }

    // ------------------------------------------------------------------
    // Evaluation and waits
    // ------------------------------------------------------------------

    pub async fn evaluate(&self, page: PageId, expression: &str) -> Result<Value, DriverError> {
        let response = self
            .send_page_command(
                page,
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;

        if response.get("exceptionDetails").is_some() {
            return Err(DriverError::new(DriverErrorKind::Internal)
                .with_hint("evaluate raised a page exception"));
        }

        Ok(response
            .get("result")
            .and_then(|res| res.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Poll the gate until satisfied or the timeout elapses. Condition waits
    /// are the driver's only blocking primitive — never a bare sleep where
    /// the page's own progress decides readiness.
    pub async fn wait_gate(
        &self,
        page: PageId,
        gate: WaitGate,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let poll_interval = Duration::from_millis(self.cfg.poll_interval_ms);
        let deadline = Instant::now() + timeout;

        loop {
            if Instant::now() >= deadline {
                return Err(DriverError::new(DriverErrorKind::NavTimeout)
                    .with_hint(format!("{} wait timed out", gate.label())));
            }

            let satisfied = match &gate {
                WaitGate::DomReady => {
                    let value = self.evaluate(page, "document.readyState").await?;
                    value
                        .as_str()
                        .map(|state| matches!(state, "interactive" | "complete"))
                        .unwrap_or(false)
                }
                WaitGate::Condition { expression } => self
                    .evaluate(page, expression)
                    .await?
                    .as_bool()
                    .unwrap_or(false),
            };

            if satisfied {
                return Ok(());
            }

            sleep(poll_interval).await;
        }
    }

    pub async fn screenshot(&self, page: PageId) -> Result<Vec<u8>, DriverError> {
        let response = self
            .send_page_command(page, "Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        let data = response
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal).with_hint("missing screenshot data")
            })?;
        STANDARD
            .decode(data)
            .map_err(|err| DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string()))
    }

    // ------------------------------------------------------------------
    // Transport plumbing
    // ------------------------------------------------------------------

    async fn send_command(&self, method: &str, params: Value) -> Result<Value, DriverError> {
        self.transport
            .send_command(CommandTarget::Browser, method, params)
            .await
    }

    pub async fn send_page_command(
        &self,
        page: PageId,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError> {
        let cdp_session = self.registry.get_cdp_session(&page).ok_or_else(|| {
            DriverError::new(DriverErrorKind::Internal)
                .with_hint("page has no attached cdp session")
        })?;
        self.transport
            .send_command(CommandTarget::Session(cdp_session), method, params)
            .await
    }

    // ------------------------------------------------------------------
    // Event pump
    // ------------------------------------------------------------------

    async fn event_loop(self: Arc<Self>) {
        debug!(target: "cdp-driver", "event loop entered");
        const MIN_BACKOFF: Duration = Duration::from_millis(100);
        const MAX_BACKOFF: Duration = Duration::from_secs(5);
        let mut backoff = MIN_BACKOFF;

        loop {
            select! {
                _ = self.shutdown.cancelled() => {
                    break;
                }
                event = self.transport.next_event() => {
                    match event {
                        Some(ev) => {
                            backoff = MIN_BACKOFF;
                            self.handle_event(ev);
                        }
                        None => {
                            if self.shutdown.is_cancelled() {
                                break;
                            }
                            self.handle_transport_disconnect();
                            warn!(target: "cdp-driver", "transport stream ended; attempting restart");
                            if let Err(err) = self.transport.start().await {
                                warn!(target: "cdp-driver", ?err, "transport restart failed");
                            }
                            if self.shutdown.is_cancelled() {
                                break;
                            }
                            sleep(backoff).await;
                            if backoff < MAX_BACKOFF {
                                backoff = (backoff + MIN_BACKOFF).min(MAX_BACKOFF);
                            }
                        }
                    }
                }
            }
        }
        debug!(target: "cdp-driver", "event loop exiting");
    }

    fn handle_transport_disconnect(&self) {
        for (page, _) in self.registry.iter() {
            let _ = self.bus.send(PageEvent::Closed { page });
            self.registry.remove_page(&page);
        }
        self.targets.clear();
        self.sessions.clear();
    }

    fn handle_event(&self, event: TransportEvent) {
        match event.method.as_str() {
            "Target.targetCreated" => self.on_target_created(event.params),
            "Target.targetDestroyed" => self.on_target_destroyed(event.params),
            "Target.attachedToTarget" => self.on_target_attached(event.params),
            "Target.detachedFromTarget" => self.on_target_detached(event.params),
            _ => {
                debug!(target: "cdp-driver", method = %event.method, "unhandled cdp event");
            }
        }
    }

    fn on_target_created(&self, params: Value) {
        let payload: TargetCreatedParams = match serde_json::from_value(params) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "cdp-driver", ?err, "malformed targetCreated");
                return;
            }
        };

        if payload.target_info.target_type != "page" {
            return;
        }

        let target_id = payload.target_info.target_id;
        if self.targets.contains_key(&target_id) {
            return;
        }

        let page = PageId::new();
        let session = SessionId::new();
        self.targets.insert(target_id.clone(), page);
        self.registry
            .insert_page(page, session, Some(target_id), None);

        if let Some(url) = payload.target_info.url.filter(|u| !u.is_empty()) {
            self.registry.set_recent_url(&page, url);
        }

        let opener = payload
            .target_info
            .opener_id
            .and_then(|opener_id| self.targets.get(&opener_id).map(|entry| *entry.value()));
        let _ = self.bus.send(PageEvent::Opened { page, opener });
    }

    fn on_target_destroyed(&self, params: Value) {
        let payload: TargetDestroyedParams = match serde_json::from_value(params) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "cdp-driver", ?err, "malformed targetDestroyed");
                return;
            }
        };

        if let Some((_, page)) = self.targets.remove(&payload.target_id) {
            self.sessions.retain(|_, v| *v != page);
            self.registry.remove_page(&page);
            let _ = self.bus.send(PageEvent::Closed { page });
        }
    }

    fn on_target_attached(&self, params: Value) {
        let payload: AttachedToTargetParams = match serde_json::from_value(params) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "cdp-driver", ?err, "malformed attachedToTarget");
                return;
            }
        };

        if payload.target_info.target_type != "page" {
            return;
        }

        if let Some(entry) = self.targets.get(&payload.target_info.target_id) {
            let page = *entry.value();
            self.sessions.insert(payload.session_id.clone(), page);
            self.registry.set_cdp_session(&page, payload.session_id);
            let _ = self.bus.send(PageEvent::Attached { page });
        }
    }

    fn on_target_detached(&self, params: Value) {
        let payload: DetachedFromTargetParams = match serde_json::from_value(params) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "cdp-driver", ?err, "malformed detachedFromTarget");
                return;
            }
        };
        self.sessions.remove(&payload.session_id);
    }
}

#[derive(Debug, Deserialize)]
struct RawElementInfo {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetCreatedParams {
    target_info: TargetInfoParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfoParams {
    target_id: String,
    #[serde(rename = "type")]
    target_type: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    opener_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachedToTargetParams {
    session_id: String,
    target_info: TargetInfoParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetDestroyedParams {
    target_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetachedFromTargetParams {
    session_id: String,
}

fn json_literal(value: &str) -> Result<String, DriverError> {
    serde_json::to_string(value)
        .map_err(|err| DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    struct MockTransport {
        started: AtomicBool,
        rx: Mutex<mpsc::Receiver<TransportEvent>>,
        commands: Mutex<Vec<(String, Value)>>,
        responses: Mutex<VecDeque<Value>>,
    }

    impl MockTransport {
        fn new_pair() -> (Arc<Self>, mpsc::Sender<TransportEvent>) {
            let (tx, rx) = mpsc::channel(16);
            (
                Arc::new(Self {
                    started: AtomicBool::new(false),
                    rx: Mutex::new(rx),
                    commands: Mutex::new(Vec::new()),
                    responses: Mutex::new(VecDeque::new()),
                }),
                tx,
            )
        }

        async fn commands(&self) -> Vec<(String, Value)> {
            self.commands.lock().await.clone()
        }

        async fn set_response(&self, value: Value) {
            self.responses.lock().await.push_back(value);
        }
    }

    #[async_trait]
    impl CdpTransport for MockTransport {
        async fn start(&self) -> Result<(), DriverError> {
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn next_event(&self) -> Option<TransportEvent> {
            let mut guard = self.rx.lock().await;
            guard.recv().await
        }

        async fn send_command(
            &self,
            _target: CommandTarget,
            method: &str,
            params: Value,
        ) -> Result<Value, DriverError> {
            self.commands
                .lock()
                .await
                .push((method.to_string(), params));
            Ok(self
                .responses
                .lock()
                .await
                .pop_front()
                .unwrap_or(Value::Null))
        }
    }

    fn test_driver(transport: Arc<MockTransport>) -> (Arc<Driver>, PageId) {
        let driver = Arc::new(Driver::with_transport(
            DriverConfig {
                poll_interval_ms: 5,
                drag_step_delay_ms: 0,
                ..DriverConfig::default()
            },
            transport as Arc<dyn CdpTransport>,
        ));
        let page = PageId::new();
        driver.register_page(
            page,
            SessionId::new(),
            Some("mock-target".into()),
            Some("mock-session".into()),
        );
        (driver, page)
    }

    fn query_result(entries: Vec<Value>) -> Value {
        json!({ "result": { "value": entries } })
    }

    fn element_entry(x: f64, y: f64, text: &str) -> Value {
        json!({ "x": x, "y": y, "width": 100.0, "height": 20.0, "text": text })
    }

    #[tokio::test]
    async fn click_queries_then_dispatches_mouse_events() {
        let (transport, _tx) = MockTransport::new_pair();
        let (driver, page) = test_driver(transport.clone());

        transport
            .set_response(query_result(vec![element_entry(10.0, 30.0, "Submit")]))
            .await;

        driver
            .click(
                page,
                &QuerySpec::css("#submit"),
                Duration::from_millis(200),
            )
            .await
            .expect("click");

        let commands = transport.commands().await;
        assert_eq!(commands[0].0, "Runtime.evaluate");
        let mouse: Vec<_> = commands
            .iter()
            .filter(|(method, _)| method == "Input.dispatchMouseEvent")
            .collect();
        assert_eq!(mouse.len(), 2);
        assert_eq!(mouse[0].1["type"], "mousePressed");
        assert_eq!(mouse[1].1["type"], "mouseReleased");
        // Click lands at the element center.
        assert_eq!(mouse[0].1["x"], 60.0);
        assert_eq!(mouse[0].1["y"], 40.0);
    }

    #[tokio::test]
    async fn click_times_out_when_target_never_appears() {
        let (transport, _tx) = MockTransport::new_pair();
        let (driver, page) = test_driver(transport.clone());

        for _ in 0..16 {
            transport.set_response(query_result(vec![])).await;
        }

        let err = driver
            .click(page, &QuerySpec::css("#missing"), Duration::from_millis(30))
            .await
            .expect_err("click should time out");
        assert_eq!(err.kind, DriverErrorKind::TargetNotFound);
    }

    #[tokio::test]
    async fn query_filters_are_sent_inside_the_expression() {
        let (transport, _tx) = MockTransport::new_pair();
        let (driver, page) = test_driver(transport.clone());

        transport
            .set_response(query_result(vec![element_entry(0.0, 0.0, "row")]))
            .await;

        driver
            .query(page, &QuerySpec::with_text(".rt-tr-group", "a@b.com"))
            .await
            .expect("query");

        let commands = transport.commands().await;
        let expression = commands[0].1["expression"].as_str().unwrap();
        assert!(expression.contains(".rt-tr-group"));
        assert!(expression.contains("a@b.com"));
    }

    #[tokio::test]
    async fn wait_gate_condition_polls_until_true() {
        let (transport, _tx) = MockTransport::new_pair();
        let (driver, page) = test_driver(transport.clone());

        transport
            .set_response(json!({ "result": { "value": false } }))
            .await;
        transport
            .set_response(json!({ "result": { "value": false } }))
            .await;
        transport
            .set_response(json!({ "result": { "value": true } }))
            .await;

        driver
            .wait_gate(
                page,
                WaitGate::Condition {
                    expression: "window.__ready === true".into(),
                },
                Duration::from_millis(500),
            )
            .await
            .expect("condition gate");

        let evaluates = transport
            .commands()
            .await
            .iter()
            .filter(|(method, _)| method == "Runtime.evaluate")
            .count();
        assert_eq!(evaluates, 3);
    }

    #[tokio::test]
    async fn wait_gate_dom_ready_times_out() {
        let (transport, _tx) = MockTransport::new_pair();
        let (driver, page) = test_driver(transport.clone());

        for _ in 0..16 {
            transport
                .set_response(json!({ "result": { "value": "loading" } }))
                .await;
        }

        let err = driver
            .wait_gate(page, WaitGate::DomReady, Duration::from_millis(25))
            .await
            .expect_err("should time out");
        assert_eq!(err.kind, DriverErrorKind::NavTimeout);
    }

    #[tokio::test]
    async fn type_text_focuses_then_inserts() {
        let (transport, _tx) = MockTransport::new_pair();
        let (driver, page) = test_driver(transport.clone());

        transport
            .set_response(json!({ "result": { "value": { "status": "focused" } } }))
            .await;

        driver
            .type_text(page, "#firstName", "Pedro", Duration::from_millis(200))
            .await
            .expect("type text");

        let commands = transport.commands().await;
        assert_eq!(commands[0].0, "Runtime.evaluate");
        assert_eq!(commands[1].0, "Input.insertText");
        assert_eq!(commands[1].1["text"], "Pedro");
    }

    #[tokio::test]
    async fn attribute_surfaces_not_found() {
        let (transport, _tx) = MockTransport::new_pair();
        let (driver, page) = test_driver(transport.clone());

        transport
            .set_response(json!({ "result": { "value": { "status": "not-found" } } }))
            .await;

        let err = driver
            .attribute(page, "#ghost", "aria-valuenow")
            .await
            .expect_err("missing element");
        assert_eq!(err.kind, DriverErrorKind::TargetNotFound);
    }

    #[tokio::test]
    async fn set_file_input_walks_the_dom_domain() {
        let (transport, _tx) = MockTransport::new_pair();
        let (driver, page) = test_driver(transport.clone());

        transport
            .set_response(json!({ "root": { "nodeId": 1 } }))
            .await;
        transport.set_response(json!({ "nodeId": 42 })).await;
        transport.set_response(Value::Null).await;

        driver
            .set_file_input(page, "#uploadFile", "/tmp/upload-sample.txt")
            .await
            .expect("set file input");

        let commands = transport.commands().await;
        assert_eq!(commands[0].0, "DOM.getDocument");
        assert_eq!(commands[1].0, "DOM.querySelector");
        assert_eq!(commands[2].0, "DOM.setFileInputFiles");
        assert_eq!(commands[2].1["nodeId"], 42);
        assert_eq!(commands[2].1["files"][0], "/tmp/upload-sample.txt");
    }

    #[tokio::test]
    async fn drag_presses_moves_and_releases() {
        let (transport, _tx) = MockTransport::new_pair();
        let (driver, page) = test_driver(transport.clone());

        let from = ElementInfo {
            x: 0.0,
            y: 100.0,
            width: 100.0,
            height: 20.0,
            text: "Six".into(),
        };
        let to = ElementInfo {
            x: 0.0,
            y: 300.0,
            width: 100.0,
            height: 20.0,
            text: "One".into(),
        };

        driver.drag(page, &from, &to).await.expect("drag");

        let commands = transport.commands().await;
        let types: Vec<_> = commands
            .iter()
            .filter(|(method, _)| method == "Input.dispatchMouseEvent")
            .map(|(_, params)| params["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(types.first().map(String::as_str), Some("mouseMoved"));
        assert!(types.contains(&"mousePressed".to_string()));
        assert_eq!(types.last().map(String::as_str), Some("mouseReleased"));
        let moves = types.iter().filter(|t| *t == "mouseMoved").count();
        assert!(moves >= driver.cfg.drag_steps as usize);
    }

    #[tokio::test]
    async fn popup_attach_resolves_through_the_event_pump() {
        let (transport, tx) = MockTransport::new_pair();
        let (driver, page) = test_driver(transport.clone());

        Arc::clone(&driver).start().await.expect("start driver");

        let events = driver.page_events();

        tx.send(TransportEvent {
            method: "Target.targetCreated".into(),
            params: json!({
                "targetInfo": {
                    "targetId": "popup-target",
                    "type": "page",
                    "url": "https://demoqa.com/sample",
                }
            }),
            session_id: None,
        })
        .await
        .expect("send created");

        tx.send(TransportEvent {
            method: "Target.attachedToTarget".into(),
            params: json!({
                "sessionId": "popup-session",
                "targetInfo": {
                    "targetId": "popup-target",
                    "type": "page",
                }
            }),
            session_id: None,
        })
        .await
        .expect("send attached");

        let popup = driver
            .wait_for_attached(events, page, Duration::from_millis(500))
            .await
            .expect("popup attach");
        assert_ne!(popup, page);
        assert_eq!(
            driver.registry().get_cdp_session(&popup).as_deref(),
            Some("popup-session")
        );

        driver.shutdown().await;
    }

    #[tokio::test]
    async fn select_option_reports_missing_option() {
        let (transport, _tx) = MockTransport::new_pair();
        let (driver, page) = test_driver(transport.clone());

        transport
            .set_response(json!({ "result": { "objectId": "obj-1" } }))
            .await;
        transport
            .set_response(json!({ "result": { "value": { "status": "option-missing" } } }))
            .await;
        transport.set_response(Value::Null).await;

        let err = driver
            .select_option(page, "select[aria-label=\"rows per page\"]", "20", Duration::from_millis(100))
            .await
            .expect_err("missing option");
        assert_eq!(err.kind, DriverErrorKind::OptionNotFound);
    }
}
