// Copyright (c) The outcome-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Outcome tracking for device-side unit tests of a GPU compute framework.
//!
//! A [`UnitTest`](unit_test::UnitTest) runs a synchronous body, then optionally blocks until
//! the compute framework posts exactly one pass/fail message from a worker thread, or until a
//! timeout elapses. The result is merged into a four-valued
//! [`TestOutcome`](outcome::TestOutcome) in which a recorded failure is never overwritten.
//!
//! Tests are found through an explicit [`TestRegistry`](registry::TestRegistry) and run in
//! order by a [`SuiteRunner`](suite::SuiteRunner).

pub mod config;
pub mod context;
pub mod errors;
mod gate;
pub mod outcome;
pub mod output;
pub mod registry;
pub mod reporter;
pub mod signal;
mod stopwatch;
pub mod suite;

pub use gate::RunCanceller;
