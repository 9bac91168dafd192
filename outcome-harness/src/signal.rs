// Copyright (c) The outcome-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shutdown handling during a suite run.
//!
//! While a test waits for its pass/fail message, the suite runner also listens for shutdown
//! events. The first one cancels that wait through the test's [`RunCanceller`], which records
//! the test as failed, and the rest of the suite is skipped.

use crate::{errors::SignalHandlerSetupError, gate::RunCanceller};
use std::fmt;
use tracing::warn;

/// Where a suite run gets its shutdown events from.
///
/// Passed into [`SuiteRunnerBuilder::build`](crate::suite::SuiteRunnerBuilder::build).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SignalHandlerKind {
    /// Listen for interrupt, hangup and terminate signals on Unix, and Ctrl-C on Windows.
    Standard,

    /// Never shut down early. Useful for tests and for embedding in a host that handles
    /// signals itself.
    Noop,
}

impl SignalHandlerKind {
    /// Sets up the shutdown source. Must be called from within a Tokio runtime.
    pub(crate) fn build(self) -> Result<ShutdownWatcher, SignalHandlerSetupError> {
        let source = match self {
            Self::Standard => ShutdownSource::Os(imp::OsSignals::new()?),
            Self::Noop => ShutdownSource::Exhausted,
        };
        Ok(ShutdownWatcher { source })
    }
}

/// Watches for shutdown events on behalf of the suite runner.
#[derive(Debug)]
pub(crate) struct ShutdownWatcher {
    source: ShutdownSource,
}

#[derive(Debug)]
enum ShutdownSource {
    Os(imp::OsSignals),
    #[cfg(test)]
    Injected(tokio::sync::mpsc::UnboundedReceiver<ShutdownEvent>),
    Exhausted,
}

impl ShutdownWatcher {
    /// Returns a watcher fed by the returned sender instead of OS signals.
    #[cfg(test)]
    pub(crate) fn injected() -> (Self, tokio::sync::mpsc::UnboundedSender<ShutdownEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        let watcher = Self {
            source: ShutdownSource::Injected(receiver),
        };
        (watcher, sender)
    }

    /// Waits for the next shutdown event, then cancels the pass/fail wait of `test_name`
    /// through `canceller`.
    ///
    /// Once the source can't produce any more events, this never resolves.
    pub(crate) async fn cancel_on_shutdown(
        &mut self,
        test_name: &str,
        canceller: &RunCanceller,
    ) -> ShutdownEvent {
        let Some(event) = self.next_event().await else {
            self.source = ShutdownSource::Exhausted;
            return std::future::pending().await;
        };

        warn!(
            test = test_name,
            %event,
            "received shutdown signal, canceling the running test",
        );
        canceller.cancel();
        event
    }

    async fn next_event(&mut self) -> Option<ShutdownEvent> {
        match &mut self.source {
            ShutdownSource::Os(signals) => signals.recv().await,
            #[cfg(test)]
            ShutdownSource::Injected(receiver) => receiver.recv().await,
            ShutdownSource::Exhausted => None,
        }
    }
}

#[cfg(unix)]
mod imp {
    use super::ShutdownEvent;
    use tokio::signal::unix::{Signal, SignalKind, signal};

    #[derive(Debug)]
    pub(super) struct OsSignals {
        interrupt: Signal,
        hangup: Signal,
        terminate: Signal,
    }

    impl OsSignals {
        pub(super) fn new() -> std::io::Result<Self> {
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                hangup: signal(SignalKind::hangup())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        /// Returns `None` once every stream has closed.
        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            tokio::select! {
                Some(()) = self.interrupt.recv() => Some(ShutdownEvent::Interrupt),
                Some(()) = self.hangup.recv() => Some(ShutdownEvent::Hangup),
                Some(()) = self.terminate.recv() => Some(ShutdownEvent::Term),
                else => None,
            }
        }
    }
}

#[cfg(windows)]
mod imp {
    use super::ShutdownEvent;
    use tokio::signal::windows::{CtrlC, ctrl_c};

    #[derive(Debug)]
    pub(super) struct OsSignals {
        ctrl_c: CtrlC,
    }

    impl OsSignals {
        pub(super) fn new() -> std::io::Result<Self> {
            Ok(Self { ctrl_c: ctrl_c()? })
        }

        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            self.ctrl_c.recv().await.map(|()| ShutdownEvent::Interrupt)
        }
    }
}

/// An event that stops a suite run early.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShutdownEvent {
    /// SIGHUP.
    #[cfg(unix)]
    Hangup,

    /// SIGTERM.
    #[cfg(unix)]
    Term,

    /// SIGINT, or Ctrl-C on Windows.
    Interrupt,
}

impl fmt::Display for ShutdownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            Self::Hangup => f.write_str("hangup"),
            #[cfg(unix)]
            Self::Term => f.write_str("terminate"),
            Self::Interrupt => f.write_str("interrupt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_event_cancels_test() {
        let (mut watcher, sender) = ShutdownWatcher::injected();
        let canceller = RunCanceller::new();
        sender
            .send(ShutdownEvent::Interrupt)
            .expect("watcher is alive");

        let event = watcher.cancel_on_shutdown("kernel_add", &canceller).await;
        assert_eq!(event, ShutdownEvent::Interrupt);
        assert!(canceller.is_cancel_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_source_never_cancels() {
        let (mut watcher, sender) = ShutdownWatcher::injected();
        drop(sender);
        let canceller = RunCanceller::new();

        let res = tokio::time::timeout(
            Duration::from_secs(60),
            watcher.cancel_on_shutdown("kernel_add", &canceller),
        )
        .await;
        assert!(res.is_err(), "no event once the source is closed");
        assert!(!canceller.is_cancel_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn noop_never_cancels() {
        let mut watcher = SignalHandlerKind::Noop.build().expect("noop never fails");
        let canceller = RunCanceller::new();

        let res = tokio::time::timeout(
            Duration::from_secs(60),
            watcher.cancel_on_shutdown("kernel_add", &canceller),
        )
        .await;
        assert!(res.is_err(), "noop source has no events");
        assert!(!canceller.is_cancel_pending());
    }

    #[tokio::test]
    async fn standard_listens_for_os_signals() {
        let watcher = SignalHandlerKind::Standard
            .build()
            .expect("OS signal handlers installed");
        assert!(matches!(watcher.source, ShutdownSource::Os(_)));
    }
}
