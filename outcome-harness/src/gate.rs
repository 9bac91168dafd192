// Copyright (c) The outcome-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A one-shot gate between the compute framework's worker thread and the test runner.

use std::{sync::Arc, time::Duration};
use tokio::sync::{Notify, watch};

/// A single-permit gate, awaited once by the test runner.
///
/// Created together with a [`GateReleaser`]. The gate is consumed by [`wait`](Self::wait).
#[derive(Debug)]
pub(crate) struct AsyncGate {
    notify: Arc<Notify>,
}

impl AsyncGate {
    pub(crate) fn new() -> (Self, GateReleaser) {
        let notify = Arc::new(Notify::new());
        let releaser = GateReleaser {
            notify: notify.clone(),
        };
        (Self { notify }, releaser)
    }

    /// Waits for the gate to be released, for `ceiling` to elapse, or for a cancellation
    /// request.
    pub(crate) async fn wait(self, ceiling: Duration, canceller: &RunCanceller) -> GateWait {
        let mut cancel_rx = canceller.sender.subscribe();
        let sleep = tokio::time::sleep(ceiling);
        tokio::pin!(sleep);

        tokio::select! {
            // Prefer a release that raced with the deadline or a cancel request.
            biased;

            () = self.notify.notified() => GateWait::Released,
            () = cancel_requested(&mut cancel_rx) => {
                canceller.clear();
                GateWait::Canceled
            }
            () = &mut sleep => GateWait::TimedOut { waited: ceiling },
        }
    }
}

async fn cancel_requested(cancel_rx: &mut watch::Receiver<bool>) {
    // The sender lives in the RunCanceller, which outlives the wait.
    if cancel_rx.wait_for(|canceled| *canceled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// How a wait on an [`AsyncGate`] ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum GateWait {
    /// The worker released the gate.
    Released,

    /// The ceiling elapsed before the gate was released.
    TimedOut { waited: Duration },

    /// The wait was canceled through a [`RunCanceller`].
    Canceled,
}

/// Releases an [`AsyncGate`] from any thread.
///
/// Releases after the first are absorbed: the gate only ever hands out one permit.
#[derive(Clone, Debug)]
pub(crate) struct GateReleaser {
    notify: Arc<Notify>,
}

impl GateReleaser {
    pub(crate) fn release(&self) {
        // notify_one stores a single permit if nobody is waiting yet.
        self.notify.notify_one();
    }
}

/// Cancels a test's pending wait for its pass/fail message.
///
/// Obtained through [`UnitTest::canceller`](crate::unit_test::UnitTest::canceller). A request
/// made during a run, before the wait begins, is picked up as soon as it does. A canceled wait
/// records the test as failed. Each run starts with no request pending.
#[derive(Clone, Debug)]
pub struct RunCanceller {
    sender: Arc<watch::Sender<bool>>,
}

impl RunCanceller {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Requests cancellation of the pending wait.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Returns true if a cancellation request is pending.
    pub fn is_cancel_pending(&self) -> bool {
        *self.sender.borrow()
    }

    pub(crate) fn clear(&self) {
        self.sender.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn release_before_wait_is_kept() {
        let (gate, releaser) = AsyncGate::new();
        releaser.release();

        let result = gate.wait(Duration::from_secs(300), &RunCanceller::new()).await;
        assert_eq!(result, GateWait::Released);
    }

    #[tokio::test]
    async fn release_from_another_thread() {
        let (gate, releaser) = AsyncGate::new();
        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            releaser.release();
        });

        let result = gate.wait(Duration::from_secs(300), &RunCanceller::new()).await;
        assert_eq!(result, GateWait::Released);
        worker.join().expect("worker thread panicked");
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_ceiling() {
        let (gate, _releaser) = AsyncGate::new();
        let start = Instant::now();

        let result = gate.wait(Duration::from_secs(300), &RunCanceller::new()).await;
        assert_eq!(
            result,
            GateWait::TimedOut {
                waited: Duration::from_secs(300)
            }
        );
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_secs(300) && elapsed < Duration::from_secs(301),
            "waited for the ceiling ({elapsed:?})"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_wait() {
        let (gate, _releaser) = AsyncGate::new();
        let canceller = RunCanceller::new();

        let remote = canceller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            remote.cancel();
        });

        let start = Instant::now();
        let result = gate.wait(Duration::from_secs(300), &canceller).await;
        assert_eq!(result, GateWait::Canceled);
        assert!(start.elapsed() < Duration::from_secs(300));
        assert!(!canceller.is_cancel_pending(), "request was consumed");
    }

    #[tokio::test]
    async fn cancel_before_wait_is_observed() {
        let (gate, _releaser) = AsyncGate::new();
        let canceller = RunCanceller::new();
        canceller.cancel();
        assert!(canceller.is_cancel_pending());

        let result = gate.wait(Duration::from_secs(300), &canceller).await;
        assert_eq!(result, GateWait::Canceled);
    }
}
