// Copyright (c) The outcome-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events emitted during a suite run, and a JUnit reporter that consumes them.
//!
//! The [`SuiteRunner`](crate::suite::SuiteRunner) passes every [`SuiteEvent`] to a callback.
//! [`JunitReporter`] is one such consumer: it turns the events into a JUnit XML report.

use crate::{
    config::JunitConfig, errors::WriteJunitError, outcome::TestOutcome, signal::ShutdownEvent,
    suite::SuiteRunStats,
};
use chrono::{DateTime, Local};
use debug_ignore::DebugIgnore;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::{fmt, fs::File, time::Duration};

/// An event that occurred during a suite run.
#[derive(Clone, Debug)]
pub enum SuiteEvent<'a> {
    /// The suite passed setup and is about to run its first test.
    RunStarted {
        /// The name of the suite.
        suite_name: &'a str,

        /// The number of tests in the suite.
        test_count: usize,
    },

    /// A test started running.
    TestStarted {
        /// The name of the test.
        name: &'a str,

        /// The zero-based position of the test in the suite.
        index: usize,
    },

    /// A test finished running.
    TestFinished {
        /// The name of the test.
        name: &'a str,

        /// The outcome of the test after the run.
        outcome: TestOutcome,

        /// The time at which the test started.
        start_time: DateTime<Local>,

        /// The time it took for the test to run, including the wait for its pass/fail
        /// message.
        duration: Duration,

        /// The stats for the run so far.
        stats: SuiteRunStats,
    },

    /// A test was not run because the suite was canceled.
    TestSkipped {
        /// The name of the test.
        name: &'a str,

        /// The reason the suite was canceled.
        reason: CancelReason,
    },

    /// The suite stopped before running all of its tests.
    RunCanceled {
        /// The reason the suite was canceled.
        reason: CancelReason,
    },

    /// The suite finished.
    RunFinished {
        /// The name of the suite.
        suite_name: &'a str,

        /// The time at which the suite started.
        start_time: DateTime<Local>,

        /// The amount of time the suite took.
        elapsed: Duration,

        /// Statistics for the run.
        stats: SuiteRunStats,
    },
}

/// The reason a suite stopped early.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CancelReason {
    /// A test didn't pass and fail-fast is enabled.
    TestFailure,

    /// A shutdown signal was received.
    Signal(ShutdownEvent),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TestFailure => f.write_str("test failure"),
            Self::Signal(event) => write!(f, "{event} signal"),
        }
    }
}

/// Collects test results into a JUnit report, written out when the run finishes.
#[derive(Debug)]
pub struct JunitReporter<'cfg> {
    config: JunitConfig<'cfg>,
    test_suite: DebugIgnore<TestSuite>,
}

impl<'cfg> JunitReporter<'cfg> {
    /// Creates a new reporter whose single test suite is named `suite_name`.
    pub fn new(suite_name: &str, config: JunitConfig<'cfg>) -> Self {
        Self {
            config,
            test_suite: DebugIgnore(TestSuite::new(suite_name)),
        }
    }

    /// Records an event. The report is written to disk on [`SuiteEvent::RunFinished`].
    pub fn write_event(&mut self, event: &SuiteEvent<'_>) -> Result<(), WriteJunitError> {
        match event {
            SuiteEvent::RunStarted { .. }
            | SuiteEvent::TestStarted { .. }
            | SuiteEvent::RunCanceled { .. } => {}
            SuiteEvent::TestFinished {
                name,
                outcome,
                start_time,
                duration,
                ..
            } => {
                let status = match non_success_kind_and_type(*outcome) {
                    None => TestCaseStatus::success(),
                    Some((kind, ty)) => {
                        let mut status = TestCaseStatus::non_success(kind);
                        status
                            .set_type(ty)
                            .set_message(format!("test finished with outcome {outcome}"));
                        status
                    }
                };

                let mut testcase = TestCase::new(*name, status);
                testcase
                    .set_classname(self.test_suite.name.clone())
                    .set_timestamp(*start_time)
                    .set_time(*duration);
                self.test_suite.add_test_case(testcase);
            }
            SuiteEvent::TestSkipped { name, reason } => {
                let mut status = TestCaseStatus::skipped();
                status.set_message(format!("not run: suite canceled due to {reason}"));
                let mut testcase = TestCase::new(*name, status);
                testcase.set_classname(self.test_suite.name.clone());
                self.test_suite.add_test_case(testcase);
            }
            SuiteEvent::RunFinished {
                start_time,
                elapsed,
                ..
            } => {
                let mut report = Report::new(self.config.report_name());
                report
                    .set_timestamp(*start_time)
                    .set_time(*elapsed)
                    .add_test_suite(self.test_suite.0.clone());

                let junit_path = self.config.path();
                if let Some(junit_dir) = junit_path.parent() {
                    std::fs::create_dir_all(junit_dir).map_err(|error| WriteJunitError::Fs {
                        file: junit_dir.to_path_buf(),
                        error,
                    })?;
                }

                let f = File::create(junit_path).map_err(|error| WriteJunitError::Fs {
                    file: junit_path.to_path_buf(),
                    error,
                })?;
                report
                    .serialize(f)
                    .map_err(|error| WriteJunitError::Junit {
                        file: junit_path.to_path_buf(),
                        error,
                    })?;
            }
        }

        Ok(())
    }
}

/// Returns the JUnit kind and type for an outcome, or `None` if it passed.
fn non_success_kind_and_type(outcome: TestOutcome) -> Option<(NonSuccessKind, &'static str)> {
    match outcome {
        TestOutcome::Success => None,
        TestOutcome::Fail => Some((NonSuccessKind::Failure, "test failure")),
        TestOutcome::NotStarted | TestOutcome::Running => {
            Some((NonSuccessKind::Error, "unexpected outcome"))
        }
    }
}
