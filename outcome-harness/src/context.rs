// Copyright (c) The outcome-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The execution context: the compute framework as seen by a unit test.
//!
//! A test only needs three things from the framework: a way to create a session, a way to
//! install a message handler on that session, and the id of each message delivered to the
//! handler. [`ExecutionContext`] and [`MessageSession`] capture exactly that.
//!
//! [`LocalContext`] is an in-process implementation, where messages are posted by the caller
//! instead of by a device kernel.

use crate::errors::SessionCreateError;
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    thread::JoinHandle,
};
use tracing::debug;

/// Message id posted by a kernel when the test passed.
///
/// Must match the value used by the device-side test kernels.
pub const MSG_TEST_PASSED: i32 = 100;

/// Message id posted by a kernel when the test failed.
///
/// Must match the value used by the device-side test kernels.
pub const MSG_TEST_FAILED: i32 = 101;

/// A message delivered by the compute framework.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    /// The message id.
    pub id: i32,

    /// Data sent along with the message.
    pub payload: Vec<i32>,
}

impl Message {
    /// Creates a message with the given id and no payload.
    pub fn new(id: i32) -> Self {
        Self {
            id,
            payload: Vec::new(),
        }
    }

    /// A pass message.
    pub fn passed() -> Self {
        Self::new(MSG_TEST_PASSED)
    }

    /// A fail message.
    pub fn failed() -> Self {
        Self::new(MSG_TEST_FAILED)
    }
}

/// A message handler, called on the compute framework's worker thread.
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// The device and platform a test runs on, included in start-of-test log lines.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceInfo {
    /// The device name.
    pub device: String,

    /// The platform version.
    pub platform_version: String,
}

impl DeviceInfo {
    /// Creates a new `DeviceInfo`.
    pub fn new(device: impl Into<String>, platform_version: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            platform_version: platform_version.into(),
        }
    }

    /// Describes the host this process is running on.
    pub fn host() -> Self {
        Self::new(std::env::consts::ARCH, std::env::consts::OS)
    }
}

/// A handle to the compute framework, shared by every test in a suite.
pub trait ExecutionContext: Send + Sync + 'static {
    /// The session type created by this context.
    type Session: MessageSession;

    /// Creates a new session.
    fn create_session(&self) -> Result<Self::Session, SessionCreateError>;

    /// Returns the device this context runs on.
    fn device_info(&self) -> DeviceInfo;
}

/// A session that can deliver messages from the compute framework.
pub trait MessageSession: Send + Sync {
    /// Installs the handler called for each message, replacing any previous handler.
    fn set_message_handler(&self, handler: MessageHandler);
}

/// An in-process [`ExecutionContext`].
#[derive(Clone, Debug)]
pub struct LocalContext {
    device_info: DeviceInfo,
}

impl LocalContext {
    /// Creates a new context describing the host.
    pub fn new() -> Self {
        Self::with_device_info(DeviceInfo::host())
    }

    /// Creates a new context describing the given device.
    pub fn with_device_info(device_info: DeviceInfo) -> Self {
        Self { device_info }
    }
}

impl Default for LocalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext for LocalContext {
    type Session = LocalSession;

    fn create_session(&self) -> Result<Self::Session, SessionCreateError> {
        Ok(LocalSession::default())
    }

    fn device_info(&self) -> DeviceInfo {
        self.device_info.clone()
    }
}

/// A session created by [`LocalContext`].
#[derive(Clone, Default)]
pub struct LocalSession {
    handler: Arc<Mutex<Option<MessageHandler>>>,
}

impl LocalSession {
    /// Returns a poster that delivers messages to this session's handler.
    pub fn poster(&self) -> MessagePoster {
        MessagePoster {
            handler: self.handler.clone(),
        }
    }
}

impl fmt::Debug for LocalSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let installed = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("LocalSession")
            .field("handler_installed", &installed)
            .finish()
    }
}

impl MessageSession for LocalSession {
    fn set_message_handler(&self, handler: MessageHandler) {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }
}

/// Delivers messages to a [`LocalSession`], standing in for a device kernel.
#[derive(Clone)]
pub struct MessagePoster {
    handler: Arc<Mutex<Option<MessageHandler>>>,
}

impl MessagePoster {
    /// Delivers a message on the current thread.
    ///
    /// Messages posted while no handler is installed are dropped.
    pub fn post(&self, message: Message) {
        // Clone the handler out so it isn't called with the lock held.
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handler {
            Some(handler) => handler(&message),
            None => debug!(id = message.id, "no message handler installed, dropping message"),
        }
    }

    /// Delivers a message from a new worker thread.
    pub fn post_from_worker(&self, message: Message) -> JoinHandle<()> {
        let this = self.clone();
        std::thread::spawn(move || this.post(message))
    }
}

impl fmt::Debug for MessagePoster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePoster").finish_non_exhaustive()
    }
}
