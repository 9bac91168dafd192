// Copyright (c) The outcome-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The suite runner.
//!
//! The main structure in this module is [`SuiteRunner`]. It runs a list of
//! [`UnitTest`]s in order on its own Tokio runtime, and reports what happens through
//! [`SuiteEvent`]s.

use crate::{
    config::HarnessProfile,
    context::ExecutionContext,
    errors::{DisplayErrorChain, SignalHandlerSetupError, SuiteBuildError, SuiteRunError},
    outcome::TestOutcome,
    reporter::{CancelReason, SuiteEvent},
    signal::{ShutdownWatcher, SignalHandlerKind},
    stopwatch::stopwatch,
    unit_test::{UnitTest, check_duplicate_names},
};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, error, info};

/// The tag attached to the start and end lines of each test.
pub const SUITE_LOG_TAG: &str = "outcome-harness";

/// Test runner options.
#[derive(Debug, Default)]
pub struct SuiteRunnerBuilder {
    fail_fast: Option<bool>,
    message_timeout: Option<Duration>,
}

impl SuiteRunnerBuilder {
    /// Sets whether the suite stops after the first test that doesn't pass. Overrides the
    /// profile.
    pub fn set_fail_fast(&mut self, fail_fast: bool) -> &mut Self {
        self.fail_fast = Some(fail_fast);
        self
    }

    /// Sets how long each test waits for its pass/fail message. Overrides the profile.
    pub fn set_message_timeout(&mut self, message_timeout: Duration) -> &mut Self {
        self.message_timeout = Some(message_timeout);
        self
    }

    /// Creates a new suite runner.
    ///
    /// Settings not set on the builder are read from `profile`.
    pub fn build(
        self,
        profile: &HarnessProfile<'_>,
        signal_handler_kind: SignalHandlerKind,
    ) -> Result<SuiteRunner, SuiteBuildError> {
        self.build_with(profile, || signal_handler_kind.build())
    }

    fn build_with(
        self,
        profile: &HarnessProfile<'_>,
        make_shutdown: impl FnOnce() -> Result<ShutdownWatcher, SignalHandlerSetupError>,
    ) -> Result<SuiteRunner, SuiteBuildError> {
        let runtime = Runtime::new().map_err(SuiteBuildError::TokioRuntimeCreate)?;
        let _guard = runtime.enter();

        // OS signal streams must be registered from within the runtime.
        let shutdown = make_shutdown()?;

        Ok(SuiteRunner {
            fail_fast: self.fail_fast.unwrap_or_else(|| profile.fail_fast()),
            message_timeout: self
                .message_timeout
                .unwrap_or_else(|| profile.message_timeout()),
            shutdown,
            runtime,
        })
    }
}

/// Runs the tests of a suite one at a time.
///
/// Created using [`SuiteRunnerBuilder::build`].
#[derive(Debug)]
pub struct SuiteRunner {
    fail_fast: bool,
    message_timeout: Duration,
    shutdown: ShutdownWatcher,
    runtime: Runtime,
}

impl SuiteRunner {
    /// Runs `tests` in order, calling `callback` for each event.
    ///
    /// Tests are checked for duplicate names before anything runs. Failures inside tests are
    /// recorded in their outcomes, which can be read back from `tests` afterwards. The run
    /// aborts early only if the callback returns an error.
    pub fn execute<C, F, E>(
        self,
        suite_name: &str,
        tests: &mut [UnitTest<C>],
        mut callback: F,
    ) -> Result<SuiteRunStats, SuiteRunError<E>>
    where
        C: ExecutionContext,
        F: FnMut(SuiteEvent<'_>) -> Result<(), E>,
    {
        check_duplicate_names(tests.iter())?;

        let Self {
            fail_fast,
            message_timeout,
            mut shutdown,
            runtime,
        } = self;

        runtime.block_on(async move {
            let run_stopwatch = stopwatch();
            let mut stats = SuiteRunStats {
                initial_run_count: tests.len(),
                ..SuiteRunStats::default()
            };
            let mut cancel_reason = None;

            callback(SuiteEvent::RunStarted {
                suite_name,
                test_count: tests.len(),
            })
            .map_err(SuiteRunError::Callback)?;

            for (index, test) in tests.iter_mut().enumerate() {
                if let Some(reason) = cancel_reason {
                    stats.not_run += 1;
                    callback(SuiteEvent::TestSkipped {
                        name: test.name(),
                        reason,
                    })
                    .map_err(SuiteRunError::Callback)?;
                    continue;
                }

                test.set_message_timeout(message_timeout);
                test.log_start(SUITE_LOG_TAG, suite_name);
                callback(SuiteEvent::TestStarted {
                    name: test.name(),
                    index,
                })
                .map_err(SuiteRunError::Callback)?;

                let test_stopwatch = stopwatch();
                let canceller = test.canceller();
                let test_name = test.name().to_owned();
                let res = {
                    let run = test.run_test();
                    tokio::pin!(run);

                    // A test that has already recorded its result finishes before shutdown is
                    // looked at.
                    tokio::select! {
                        biased;
                        res = &mut run => res,
                        event = shutdown.cancel_on_shutdown(&test_name, &canceller) => {
                            cancel_reason = Some(CancelReason::Signal(event));
                            run.await
                        }
                    }
                };

                if let Err(err) = res {
                    error!(
                        suite = suite_name,
                        "{}",
                        DisplayErrorChain::new(&err),
                    );
                    test.mark_failed();
                }
                test.log_end(SUITE_LOG_TAG);

                let outcome = test.outcome();
                stats.on_test_finished(outcome);
                let snapshot = test_stopwatch.snapshot();
                callback(SuiteEvent::TestFinished {
                    name: test.name(),
                    outcome,
                    start_time: snapshot.start_time,
                    duration: snapshot.duration,
                    stats,
                })
                .map_err(SuiteRunError::Callback)?;

                if fail_fast && cancel_reason.is_none() && !outcome.is_success() {
                    cancel_reason = Some(CancelReason::TestFailure);
                }
                if let Some(reason) = cancel_reason
                    && stats.finished_count + stats.not_run < stats.initial_run_count
                {
                    info!(suite = suite_name, %reason, "canceling remaining tests");
                    callback(SuiteEvent::RunCanceled { reason })
                        .map_err(SuiteRunError::Callback)?;
                }
            }

            let snapshot = run_stopwatch.snapshot();
            debug!(
                suite = suite_name,
                passed = stats.passed,
                failed = stats.failed,
                unexpected = stats.unexpected,
                not_run = stats.not_run,
                "suite finished",
            );
            callback(SuiteEvent::RunFinished {
                suite_name,
                start_time: snapshot.start_time,
                elapsed: snapshot.duration,
                stats,
            })
            .map_err(SuiteRunError::Callback)?;

            Ok::<_, SuiteRunError<E>>(stats)
        })
    }
}

/// Statistics for a suite run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct SuiteRunStats {
    /// The number of tests in the suite.
    pub initial_run_count: usize,

    /// The number of tests that ran to completion.
    pub finished_count: usize,

    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests that failed.
    pub failed: usize,

    /// The number of tests that finished without recording a result, i.e. whose outcome was
    /// still `NotStarted` or `Running` afterwards.
    pub unexpected: usize,

    /// The number of tests that were not run because the suite was canceled.
    pub not_run: usize,
}

impl SuiteRunStats {
    /// Returns true if every test in the suite ran and passed.
    pub fn is_success(&self) -> bool {
        self.passed == self.initial_run_count
    }

    fn on_test_finished(&mut self, outcome: TestOutcome) {
        self.finished_count += 1;
        match outcome {
            TestOutcome::Success => self.passed += 1,
            TestOutcome::Fail => self.failed += 1,
            TestOutcome::NotStarted | TestOutcome::Running => self.unexpected += 1,
        }
    }
}
