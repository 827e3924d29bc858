//! Sortable list controller: insertion-sort-by-drag toward a fixed target
//! order. Each iteration fixes exactly one position and never revisits
//! earlier ones; the widget shifts the intermediate items itself.

use std::sync::Arc;

use cdp_driver::{Driver, PageId, QuerySpec};
use tracing::{debug, info};

use crate::error::FlowError;
use crate::pacing::{settle, Pacing};
use crate::selectors;

/// The fixed target permutation.
pub const TARGET_ORDER: [&str; 6] = ["Six", "Five", "Four", "Three", "Two", "One"];

pub struct SortablePage {
    driver: Arc<Driver>,
    page: PageId,
    pacing: Pacing,
}

impl SortablePage {
    pub fn new(driver: Arc<Driver>, page: PageId, pacing: Pacing) -> Self {
        Self {
            driver,
            page,
            pacing,
        }
    }

    /// Rearrange the six items into [`TARGET_ORDER`]. Returns the number of
    /// drags performed; items already in place are skipped.
    pub async fn sort_descending(&self) -> Result<usize, FlowError> {
        let mut drags = 0;

        for (position, label) in TARGET_ORDER.iter().enumerate() {
            let source = self
                .driver
                .query(
                    self.page,
                    &QuerySpec::with_text(selectors::LIST_ITEM, *label),
                )
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| FlowError::NotFound(format!("no list item labeled '{label}'")))?;

            let slots = self
                .driver
                .query(self.page, &QuerySpec::css(selectors::LIST_ITEM))
                .await?;
            let destination = slots.get(position).cloned().ok_or_else(|| {
                FlowError::NotFound(format!("list has no slot at position {position}"))
            })?;

            let distance = (source.center_y() - destination.center_y()).abs();
            if distance < self.pacing.position_tolerance_px {
                debug!(target: "page-flows", label, position, "already in place");
                continue;
            }

            debug!(target: "page-flows", label, position, distance, "dragging into place");
            self.driver.drag(self.page, &source, &destination).await?;
            settle(self.pacing.drag_settle_ms).await;
            drags += 1;
        }

        settle(self.pacing.reorder_settle_ms).await;
        self.verify_order().await?;
        info!(target: "page-flows", drags, "list reordered");
        Ok(drags)
    }

    /// Re-query the full sequence and assert each slot's label.
    async fn verify_order(&self) -> Result<(), FlowError> {
        let observed = self
            .driver
            .inner_texts(self.page, &QuerySpec::css(selectors::LIST_ITEM))
            .await?;

        if observed.len() != TARGET_ORDER.len() {
            return Err(FlowError::assertion(
                "list length",
                TARGET_ORDER.len().to_string(),
                observed.len().to_string(),
            ));
        }

        for (position, (observed_label, expected_label)) in
            observed.iter().zip(TARGET_ORDER.iter()).enumerate()
        {
            if observed_label != expected_label {
                return Err(FlowError::assertion(
                    format!("list slot {position}"),
                    (*expected_label).to_string(),
                    observed_label.clone(),
                ));
            }
        }
        Ok(())
    }
}
