use cdp_driver::{Driver, PageId};
use tracing::debug;

use crate::error::FlowError;
use crate::selectors::NOISE_SELECTORS;

/// Remove the site's fixed noise elements (ad banner, footer, iframes,
/// sidebar) so they cannot intercept clicks. Idempotent: a second run finds
/// nothing left to remove. Returns the number of removed nodes.
pub async fn clean_interface(driver: &Driver, page: PageId) -> Result<u64, FlowError> {
    let selectors =
        serde_json::to_string(NOISE_SELECTORS).expect("static selector list serializes");
    let expression = format!(
        r#"(() => {{
    const selectors = {selectors};
    let removed = 0;
    selectors.forEach((s) =>
        document.querySelectorAll(s).forEach((el) => {{ el.remove(); removed += 1; }}),
    );
    return removed;
}})()"#,
    );

    let value = driver.evaluate(page, &expression).await?;
    let removed = value.as_u64().unwrap_or(0);
    debug!(target: "page-flows", removed, "interface cleaned");
    Ok(removed)
}
