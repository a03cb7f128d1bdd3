//! Exit code logic for the arxin process.
//!
//! Single responsibility: map a backfill report to the process exit outcome.

use std::process::ExitCode;

use arxin_core::BackfillReport;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Command finished normally (rejections included).
    Success,
    /// Backfill stopped early after writing some articles.
    Partial,
    /// Backfill stopped early without writing anything.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(outcome: ProcessExit) -> Self {
        match outcome {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Partial => ExitCode::from(1),
            ProcessExit::Failure => ExitCode::from(2),
        }
    }
}

/// Determines the process exit outcome of a backfill run.
pub(crate) fn determine_exit_outcome(report: &BackfillReport) -> ProcessExit {
    if !report.stop.is_fatal() {
        ProcessExit::Success
    } else if report.inserted + report.updated > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use arxin_core::{BackfillWindow, StopReason};
    use chrono::{TimeZone, Utc};

    use super::*;

    fn report(inserted: u64, updated: u64, parse_rejections: u64, stop: StopReason) -> BackfillReport {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        BackfillReport {
            window: BackfillWindow {
                start,
                end: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            },
            pages_fetched: 1,
            entries_seen: inserted + updated + parse_rejections,
            inserted,
            updated,
            duplicates_skipped: 0,
            parse_rejections,
            sync_rejections: 0,
            cursor: start,
            stop,
        }
    }

    #[test]
    fn test_exit_outcome_success_when_exhausted() {
        assert_eq!(
            determine_exit_outcome(&report(3, 1, 0, StopReason::Exhausted)),
            ProcessExit::Success
        );
    }

    #[test]
    fn test_exit_outcome_success_with_rejections() {
        assert_eq!(
            determine_exit_outcome(&report(0, 0, 4, StopReason::Exhausted)),
            ProcessExit::Success
        );
    }

    #[test]
    fn test_exit_outcome_partial_when_stopped_after_writes() {
        let stop = StopReason::TaxonomyMismatch {
            id: "2401.00001".to_string(),
            code: "cs.XX".to_string(),
        };
        assert_eq!(determine_exit_outcome(&report(2, 0, 0, stop)), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_stopped_before_writes() {
        assert_eq!(
            determine_exit_outcome(&report(0, 0, 0, StopReason::MissingCursor)),
            ProcessExit::Failure
        );
    }
}
