//! Scenario registry. Order matters only for readability; every scenario
//! is independent and drives its own page.

pub mod api;
pub mod frontend;

use crate::runner::Scenario;

pub fn registry() -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(frontend::PracticeFormScenario),
        Box::new(frontend::BrowserWindowsScenario),
        Box::new(frontend::WebTablesScenario),
        Box::new(frontend::ProgressBarScenario),
        Box::new(frontend::SortableScenario),
        Box::new(frontend::UploadScenario),
        Box::new(api::BookStoreScenario),
    ]
}
