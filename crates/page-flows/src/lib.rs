//! Page interaction layer for the DemoQA suite.
//!
//! One operation per user-visible action, hiding selector details from the
//! scenario layer. Element lookups are always live queries against the
//! current document — the remote site re-renders aggressively and cached
//! handles go stale. Deliberate pauses compensating for the site's own
//! rendering quirks are isolated behind [`pacing::settle`].

pub mod cleanup;
pub mod error;
pub mod pacing;
pub mod practice_form;
pub mod progress;
pub mod selectors;
pub mod sortable;
pub mod upload;
pub mod web_tables;
pub mod windows;

pub use cleanup::clean_interface;
pub use error::FlowError;
pub use pacing::{settle, Pacing};
pub use practice_form::PracticeFormPage;
pub use progress::{ProgressBarPage, ProgressOutcome, ProgressPacing};
pub use sortable::{SortablePage, TARGET_ORDER};
pub use upload::UploadPage;
pub use web_tables::{Record, WebTablesPage};
pub use windows::BrowserWindowsPage;
