// Copyright (c) The outcome-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The outcome of a single unit test.
//!
//! An outcome is written from two places: the thread running the test body, and the worker
//! thread on which the compute framework delivers messages. All writes go through
//! [`OutcomeHandle`], which serializes them with a mutex.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

/// The four-valued result of a unit test.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum TestOutcome {
    /// The test has not been run yet.
    #[default]
    NotStarted,

    /// The test body is running, or the test is waiting for its pass/fail message.
    Running,

    /// The test passed.
    Success,

    /// The test failed.
    Fail,
}

impl TestOutcome {
    /// Returns the human-readable label for this outcome.
    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT STARTED",
            Self::Running => "RUNNING",
            Self::Success => "PASS",
            Self::Fail => "FAIL",
        }
    }

    /// Returns true if this outcome is a legitimate final state for a finished test.
    ///
    /// `NotStarted` and `Running` observed after a run indicate that the test neither recorded
    /// a result nor set up a pass/fail message.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Fail)
    }

    /// Returns true if this outcome is `Success`.
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A shared, thread-safe handle to one test's outcome.
///
/// `Fail` dominates: once it's been recorded, [`mark_passed`](Self::mark_passed) is a no-op.
#[derive(Clone, Debug, Default)]
pub struct OutcomeHandle {
    inner: Arc<Mutex<TestOutcome>>,
}

impl OutcomeHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the current outcome.
    pub fn get(&self) -> TestOutcome {
        *self.lock()
    }

    /// Records a failure. Idempotent.
    pub fn mark_failed(&self) {
        *self.lock() = TestOutcome::Fail;
    }

    /// Records a pass, unless a failure has already been recorded. Idempotent.
    pub fn mark_passed(&self) {
        let mut outcome = self.lock();
        if *outcome != TestOutcome::Fail {
            *outcome = TestOutcome::Success;
        }
    }

    pub(crate) fn set_running(&self) {
        *self.lock() = TestOutcome::Running;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TestOutcome> {
        // The critical sections can't panic, but a poisoned lock still holds a valid outcome.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use test_strategy::{Arbitrary, proptest};

    #[test_case(TestOutcome::NotStarted, "NOT STARTED", false ; "not started")]
    #[test_case(TestOutcome::Running, "RUNNING", false ; "running")]
    #[test_case(TestOutcome::Success, "PASS", true ; "success")]
    #[test_case(TestOutcome::Fail, "FAIL", true ; "fail")]
    fn labels_and_terminality(outcome: TestOutcome, label: &str, terminal: bool) {
        assert_eq!(outcome.label(), label);
        assert_eq!(outcome.to_string(), label);
        assert_eq!(outcome.is_terminal(), terminal);
    }

    #[test]
    fn pass_after_fail_is_ignored() {
        let handle = OutcomeHandle::new();
        assert_eq!(handle.get(), TestOutcome::NotStarted);

        handle.mark_passed();
        assert_eq!(handle.get(), TestOutcome::Success);

        handle.mark_failed();
        handle.mark_passed();
        assert_eq!(handle.get(), TestOutcome::Fail);
    }

    #[derive(Clone, Copy, Debug, Arbitrary)]
    enum Mark {
        Pass,
        Fail,
    }

    #[proptest]
    fn fail_is_sticky(marks: Vec<Mark>) {
        let handle = OutcomeHandle::new();
        handle.set_running();

        let mut failed = false;
        for mark in marks {
            match mark {
                Mark::Pass => handle.mark_passed(),
                Mark::Fail => {
                    handle.mark_failed();
                    failed = true;
                }
            }
            if failed {
                assert_eq!(handle.get(), TestOutcome::Fail);
            } else {
                assert_eq!(handle.get(), TestOutcome::Success);
            }
        }
    }

    #[test]
    fn concurrent_marks_end_in_fail() {
        let handle = OutcomeHandle::new();
        handle.set_running();

        std::thread::scope(|s| {
            for i in 0..8 {
                let handle = handle.clone();
                s.spawn(move || {
                    for j in 0..1000 {
                        if i == 3 && j == 500 {
                            handle.mark_failed();
                        } else {
                            handle.mark_passed();
                        }
                    }
                });
            }
        });

        assert_eq!(handle.get(), TestOutcome::Fail);
    }
}
