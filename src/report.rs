//! Run summary: per-scenario lines plus aggregate counts, through tracing.

use tracing::{error, info};

use crate::runner::RunOutcome;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub retried: usize,
}

pub fn summarize(outcomes: &[RunOutcome]) -> RunSummary {
    let mut summary = RunSummary {
        total: outcomes.len(),
        ..RunSummary::default()
    };
    for outcome in outcomes {
        if outcome.passed {
            summary.passed += 1;
        } else {
            summary.failed += 1;
        }
        if outcome.attempts > 1 {
            summary.retried += 1;
        }
    }
    summary
}

pub fn log_summary(outcomes: &[RunOutcome]) -> RunSummary {
    for outcome in outcomes {
        let duration: std::time::Duration = outcome
            .reports
            .iter()
            .flat_map(|report| report.steps.iter())
            .map(|step| step.duration)
            .sum();

        if outcome.passed {
            info!(
                target: "demoqa-suite",
                scenario = outcome.scenario,
                attempts = outcome.attempts,
                duration = %humantime::format_duration(duration),
                "passed"
            );
        } else {
            let failing_step = outcome
                .reports
                .last()
                .and_then(|report| report.steps.iter().find(|step| !step.passed));
            error!(
                target: "demoqa-suite",
                scenario = outcome.scenario,
                attempts = outcome.attempts,
                step = failing_step.map(|step| step.description.as_str()).unwrap_or("<none>"),
                error = failing_step.and_then(|step| step.error.as_deref()).unwrap_or("<none>"),
                artifacts = ?outcome.artifacts,
                "failed"
            );
        }
    }

    let summary = summarize(outcomes);
    info!(
        target: "demoqa-suite",
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        retried = summary.retried,
        "run complete"
    );
    summary
}
