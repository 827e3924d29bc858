//! Web Tables operations: single-record CRUD, sequential bulk creation and
//! the delete-until-protected loop.

use std::sync::Arc;
use std::time::Duration;

use cdp_driver::{Driver, PageId, QuerySpec};
use tracing::{debug, info};

use crate::error::FlowError;
use crate::pacing::Pacing;
use crate::selectors;

/// Number of permanent leading rows the table ships with. Everything past
/// them is dynamic and fair game for bulk deletion.
pub const PROTECTED_ROWS: usize = 3;

/// Rows-per-page value selected before bulk creation so all dynamic rows
/// stay on one page.
const BULK_PAGE_SIZE: &str = "20";

/// One table row, identified by email. Uniqueness by email is assumed, not
/// enforced locally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: String,
    pub salary: String,
    pub department: String,
}

impl Record {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        age: impl Into<String>,
        salary: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            age: age.into(),
            salary: salary.into(),
            department: department.into(),
        }
    }

    /// The fixed shape used for bulk-created dynamic rows.
    pub fn dynamic(index: usize) -> Self {
        Self::new(
            format!("User{index}"),
            format!("Test{index}"),
            format!("dynamic{index}@test.com"),
            "30",
            "2000",
            "IT",
        )
    }
}

pub struct WebTablesPage {
    driver: Arc<Driver>,
    page: PageId,
    pacing: Pacing,
}

impl WebTablesPage {
    pub fn new(driver: Arc<Driver>, page: PageId, pacing: Pacing) -> Self {
        Self {
            driver,
            page,
            pacing,
        }
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.pacing.action_deadline_ms)
    }

    pub async fn create_record(&self, record: &Record) -> Result<(), FlowError> {
        debug!(target: "page-flows", email = %record.email, "creating record");
        self.driver
            .click(
                self.page,
                &QuerySpec::css(selectors::ADD_RECORD_BUTTON),
                self.deadline(),
            )
            .await?;
        self.fill_registration_form(record).await?;
        self.driver
            .click(self.page, &QuerySpec::css(selectors::SUBMIT), self.deadline())
            .await?;
        Ok(())
    }

    /// Open the row's edit form and replace the first name.
    pub async fn edit_record(&self, email: &str, new_first: &str) -> Result<(), FlowError> {
        debug!(target: "page-flows", email, new_first, "editing record");
        self.click_row_control(email, selectors::EDIT_CONTROL)
            .await?;
        self.driver
            .type_text(
                self.page,
                selectors::FIRST_NAME,
                new_first,
                self.deadline(),
            )
            .await?;
        self.driver
            .click(self.page, &QuerySpec::css(selectors::SUBMIT), self.deadline())
            .await?;
        Ok(())
    }

    pub async fn delete_record(&self, email: &str) -> Result<(), FlowError> {
        debug!(target: "page-flows", email, "deleting record");
        self.click_row_control(email, selectors::DELETE_CONTROL)
            .await
    }

    /// Create `count` records sequentially. Never parallel: the table
    /// reflows after each insert and concurrent submission would corrupt
    /// row indices.
    pub async fn create_multiple_records(&self, count: usize) -> Result<(), FlowError> {
        info!(target: "page-flows", count, "bulk creating records");
        self.driver
            .select_option(
                self.page,
                selectors::ROWS_PER_PAGE_SELECT,
                BULK_PAGE_SIZE,
                self.deadline(),
            )
            .await?;

        for index in 1..=count {
            self.create_record(&Record::dynamic(index)).await?;
        }
        Ok(())
    }

    /// Delete the first dynamic row until only protected rows remain. The
    /// live delete-control count is re-queried every iteration because the
    /// table re-renders after each removal; an index cached across
    /// iterations would skip or double-delete rows. Returns the number of
    /// rows deleted.
    pub async fn delete_all_dynamic_records(&self) -> Result<usize, FlowError> {
        let spec = QuerySpec::css(selectors::DELETE_CONTROL);
        let mut deleted = 0;
        let mut count = self.driver.count(self.page, &spec).await?;

        while count > PROTECTED_ROWS {
            self.driver
                .click_nth(self.page, &spec, PROTECTED_ROWS, self.deadline())
                .await?;

            let next = self.driver.count(self.page, &spec).await?;
            if next >= count {
                return Err(FlowError::WaitTimeout(format!(
                    "delete control count did not shrink (still {next})"
                )));
            }
            count = next;
            deleted += 1;
        }

        info!(target: "page-flows", deleted, remaining = count, "dynamic records deleted");
        Ok(deleted)
    }

    /// Count rows whose visible text contains the needle.
    pub async fn dynamic_row_count(&self, needle: &str) -> Result<usize, FlowError> {
        Ok(self
            .driver
            .count(
                self.page,
                &QuerySpec::with_text(selectors::TABLE_ROW_GROUP, needle),
            )
            .await?)
    }

    async fn fill_registration_form(&self, record: &Record) -> Result<(), FlowError> {
        let deadline = self.deadline();
        self.driver
            .type_text(self.page, selectors::FIRST_NAME, &record.first_name, deadline)
            .await?;
        self.driver
            .type_text(self.page, selectors::LAST_NAME, &record.last_name, deadline)
            .await?;
        self.driver
            .type_text(self.page, selectors::USER_EMAIL, &record.email, deadline)
            .await?;
        self.driver
            .type_text(self.page, selectors::AGE, &record.age, deadline)
            .await?;
        self.driver
            .type_text(self.page, selectors::SALARY, &record.salary, deadline)
            .await?;
        self.driver
            .type_text(self.page, selectors::DEPARTMENT, &record.department, deadline)
            .await?;
        Ok(())
    }

    /// Locate the row whose visible text contains the email and click the
    /// row-scoped control. Zero matching rows is a not-found failure,
    /// propagated as-is.
    async fn click_row_control(&self, email: &str, control: &str) -> Result<(), FlowError> {
        let needle = serde_json::to_string(email).expect("email literal serializes");
        let control_literal = serde_json::to_string(control).expect("control literal serializes");
        let row_literal = serde_json::to_string(selectors::TABLE_ROW_GROUP)
            .expect("row selector literal serializes");

        let expression = format!(
            r#"(() => {{
    const needle = {needle};
    const rows = Array.from(document.querySelectorAll({row_literal}));
    const row = rows.find((el) => ((el.innerText || el.textContent || '')).includes(needle));
    if (!row) {{ return {{ status: 'not-found' }}; }}
    const control = row.querySelector({control_literal});
    if (!control) {{ return {{ status: 'control-missing' }}; }}
    control.click();
    return {{ status: 'clicked' }};
}})()"#,
        );

        let value = self.driver.evaluate(self.page, &expression).await?;
        match value.get("status").and_then(|v| v.as_str()) {
            Some("clicked") => Ok(()),
            Some("not-found") => Err(FlowError::NotFound(format!(
                "no table row contains '{email}'"
            ))),
            Some("control-missing") => Err(FlowError::NotFound(format!(
                "row for '{email}' has no '{control}' control"
            ))),
            _ => Err(FlowError::NotFound(format!(
                "row control click for '{email}' returned unexpected payload"
            ))),
        }
    }
}
