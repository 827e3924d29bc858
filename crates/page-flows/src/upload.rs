//! File upload operation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cdp_driver::{Driver, PageId, QuerySpec, WaitGate};
use tracing::info;

use crate::error::FlowError;
use crate::pacing::Pacing;
use crate::selectors;

pub struct UploadPage {
    driver: Arc<Driver>,
    page: PageId,
    pacing: Pacing,
}

impl UploadPage {
    pub fn new(driver: Arc<Driver>, page: PageId, pacing: Pacing) -> Self {
        Self {
            driver,
            page,
            pacing,
        }
    }

    /// Populate the file input with a local file and assert the uploaded
    /// path label contains its name. Returns the label text.
    pub async fn upload_file(&self, path: &Path) -> Result<String, FlowError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                FlowError::NotFound(format!("upload fixture has no file name: {}", path.display()))
            })?
            .to_string();
        let path_str = path.to_str().ok_or_else(|| {
            FlowError::NotFound(format!("upload fixture path is not utf-8: {}", path.display()))
        })?;

        self.driver
            .set_file_input(self.page, selectors::UPLOAD_INPUT, path_str)
            .await?;

        self.driver
            .wait_gate(
                self.page,
                WaitGate::Condition {
                    expression: selectors::present(selectors::UPLOADED_PATH_LABEL),
                },
                Duration::from_millis(self.pacing.wait_timeout_ms),
            )
            .await
            .map_err(|err| FlowError::wait_context(err, "uploaded path label never appeared"))?;

        let label = self
            .driver
            .inner_text(self.page, &QuerySpec::css(selectors::UPLOADED_PATH_LABEL))
            .await?;

        if !label.contains(&file_name) {
            return Err(FlowError::assertion(
                "uploaded path label",
                format!("contains '{file_name}'"),
                label,
            ));
        }

        info!(target: "page-flows", %label, "upload validated");
        Ok(label)
    }
}
