//! The DOM surface consumed from the target site, treated as a stable
//! contract, plus builders for the boolean condition expressions the
//! driver's wait gates poll.

// Practice form
pub const FIRST_NAME: &str = "#firstName";
pub const LAST_NAME: &str = "#lastName";
pub const USER_EMAIL: &str = "#userEmail";
pub const GENDER_MALE_LABEL: &str = "label[for=\"gender-radio-1\"]";
pub const USER_NUMBER: &str = "#userNumber";
pub const SUBMIT: &str = "#submit";
pub const MODAL_CONTENT: &str = ".modal-content";

// Web tables
pub const ADD_RECORD_BUTTON: &str = "#addNewRecordButton";
pub const TABLE_ROW_GROUP: &str = ".rt-tr-group";
pub const EDIT_CONTROL: &str = "[id^=\"edit-record\"]";
pub const DELETE_CONTROL: &str = "[id^=\"delete-record\"]";
pub const AGE: &str = "#age";
pub const SALARY: &str = "#salary";
pub const DEPARTMENT: &str = "#department";
pub const ROWS_PER_PAGE_SELECT: &str = "select[aria-label=\"rows per page\"]";

// Browser windows
pub const WINDOW_BUTTON: &str = "#windowButton";
pub const SAMPLE_HEADING: &str = "#sampleHeading";

// Upload
pub const UPLOAD_INPUT: &str = "#uploadFile";
pub const UPLOADED_PATH_LABEL: &str = "#uploadedFilePath";

// Progress bar
pub const START_STOP_BUTTON: &str = "#startStopButton";
pub const RESET_BUTTON: &str = "#resetButton";
pub const PROGRESS_BAR: &str = "div[role=\"progressbar\"]";
pub const PROGRESS_SUCCESS: &str = ".progress-bar.bg-success";

// Sortable list
pub const LIST_ITEM: &str = ".list-group-item";

/// Fixed noise elements removed by `clean_interface`.
pub const NOISE_SELECTORS: &[&str] = &["#fixedban", "footer", "iframe", ".sidebar-content"];

/// Condition: an element matching the selector exists.
pub fn present(selector: &str) -> String {
    format!(
        "document.querySelector({}) !== null",
        literal(selector)
    )
}

/// Condition: the element's integer attribute is within the closed interval.
pub fn attr_in_range(selector: &str, attr: &str, low: u32, high: u32) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) {{ return false; }}
    const value = parseInt(el.getAttribute({attr}) || '0', 10);
    return value >= {low} && value <= {high};
}})()"#,
        selector = literal(selector),
        attr = literal(attr),
        low = low,
        high = high,
    )
}

/// Condition: the element's attribute equals the value exactly.
pub fn attr_equals(selector: &str, attr: &str, value: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) {{ return false; }}
    return (el.getAttribute({attr}) || '') === {value};
}})()"#,
        selector = literal(selector),
        attr = literal(attr),
        value = literal(value),
    )
}

fn literal(value: &str) -> String {
    serde_json::to_string(value).expect("string literals always serialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_embeds_selector_literal() {
        let expr = present("#resetButton");
        assert!(expr.contains("\"#resetButton\""));
        assert!(expr.contains("!== null"));
    }

    #[test]
    fn range_condition_carries_bounds() {
        let expr = attr_in_range(PROGRESS_BAR, "aria-valuenow", 15, 22);
        assert!(expr.contains("value >= 15"));
        assert!(expr.contains("value <= 22"));
        assert!(expr.contains("aria-valuenow"));
    }

    #[test]
    fn equals_condition_quotes_the_value() {
        let expr = attr_equals(PROGRESS_BAR, "aria-valuenow", "0");
        assert!(expr.contains("=== \"0\""));
    }
}
