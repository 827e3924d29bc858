//! Shared helpers for the scripted fake transports that stand in for the
//! remote site. Each test file owns its widget model; this module only
//! provides expression parsing, geometry payloads and driver bootstrap.
#![allow(dead_code)]

use std::sync::Arc;

use cdp_driver::{CdpTransport, Driver, DriverConfig, PageId, SessionId};
use serde_json::{json, Value};

pub const SIM_SESSION: &str = "sim-session";
pub const SIM_TARGET: &str = "sim-target";

/// Build a driver over the fake transport with fast polling and register the
/// driving page, the way the driver's own tests do.
pub fn sim_driver(transport: Arc<dyn CdpTransport>) -> (Arc<Driver>, PageId) {
    let driver = Arc::new(Driver::with_transport(
        DriverConfig {
            poll_interval_ms: 2,
            drag_steps: 4,
            drag_step_delay_ms: 0,
            ..DriverConfig::default()
        },
        transport,
    ));
    let page = PageId::new();
    driver.register_page(
        page,
        SessionId::new(),
        Some(SIM_TARGET.into()),
        Some(SIM_SESSION.into()),
    );
    (driver, page)
}

/// Wrap an evaluation result the way `Runtime.evaluate` reports it.
pub fn evaluate_ok(value: Value) -> Value {
    json!({ "result": { "value": value } })
}

/// One query entry with the geometry the driver expects.
pub fn element(x: f64, y: f64, width: f64, height: f64, text: &str) -> Value {
    json!({ "x": x, "y": y, "width": width, "height": height, "text": text })
}

/// Extract the JSON string literal that follows `marker` in the expression.
pub fn str_literal_after(expression: &str, marker: &str) -> Option<String> {
    let start = expression.find(marker)? + marker.len();
    let rest = &expression[start..];
    let open = rest.find('"')?;
    let rest = &rest[open..];

    let mut escaped = false;
    for (idx, ch) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => {
                return serde_json::from_str::<String>(&rest[..=idx]).ok();
            }
            _ => {}
        }
    }
    None
}

/// Selector of a `querySelectorAll(...)` query expression.
pub fn query_selector_of(expression: &str) -> Option<String> {
    str_literal_after(expression, "querySelectorAll(")
}

/// Selector of a single `document.querySelector(...)` lookup.
pub fn single_selector_of(expression: &str) -> Option<String> {
    str_literal_after(expression, "document.querySelector(")
}

/// Text filter of a query expression; `None` when the needle is null.
pub fn needle_of(expression: &str) -> Option<String> {
    if expression.contains("const needle = null") {
        return None;
    }
    str_literal_after(expression, "const needle = ")
}

/// Bounds of an `attr_in_range` condition expression.
pub fn range_bounds_of(expression: &str) -> Option<(i64, i64)> {
    let low = int_after(expression, "value >= ")?;
    let high = int_after(expression, "value <= ")?;
    Some((low, high))
}

/// Expected value of an `attr_equals` condition expression.
pub fn equals_value_of(expression: &str) -> Option<String> {
    str_literal_after(expression, "=== ")
}

fn int_after(expression: &str, marker: &str) -> Option<i64> {
    let start = expression.find(marker)? + marker.len();
    let digits: String = expression[start..]
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
