// Copyright (c) The outcome-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by outcome-harness.
//!
//! Failures inside a test (failed assertions, a missing or late pass/fail message) are
//! recorded in the test's [`TestOutcome`](crate::outcome::TestOutcome) and never show up here.
//! The errors in this module are infrastructure failures that the caller must handle.

use camino::Utf8PathBuf;
use config::ConfigError;
use itertools::Itertools;
use std::{error::Error, fmt};
use thiserror::Error;

/// The error type returned by a [`TestBody`](crate::unit_test::TestBody).
pub type TestBodyError = Box<dyn Error + Send + Sync + 'static>;

/// Two or more tests in a suite share a name.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("duplicate test name(s): {}", .duplicates.iter().join(", "))]
pub struct DuplicateNameError {
    duplicates: Vec<String>,
}

impl DuplicateNameError {
    pub(crate) fn new(duplicates: Vec<String>) -> Self {
        Self { duplicates }
    }

    /// Returns each duplicated name once, in the order its first repeat was seen.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }
}

/// An error that occurred while discovering or instantiating test classes.
///
/// Discovery never returns partial results: any of these aborts it entirely.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The list of classes could not be read.
    #[error("failed to read the list of test classes")]
    CatalogRead(#[source] std::io::Error),

    /// A class name, or the name of one of its ancestors, could not be resolved.
    #[error("class `{name}` could not be resolved")]
    ClassResolution {
        /// The name that failed to resolve.
        name: String,
    },

    /// A class's ancestor chain loops back on itself.
    #[error("inheritance cycle detected starting from class `{name}`")]
    InheritanceCycle {
        /// The class whose ancestor chain was being walked.
        name: String,
    },

    /// A discovered test class has no factory and cannot be instantiated.
    #[error("test class `{name}` was discovered but has no factory")]
    NotInstantiable {
        /// The name of the class.
        name: String,
    },
}

/// An error that occurred while creating an execution session.
#[derive(Debug, Error)]
#[error("failed to create execution session")]
pub struct SessionCreateError {
    #[source]
    source: TestBodyError,
}

impl SessionCreateError {
    /// Creates a new `SessionCreateError` wrapping the framework's error.
    pub fn new(source: impl Into<TestBodyError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// The body of a test returned an error instead of recording an outcome.
#[derive(Debug, Error)]
#[error("test `{name}` returned an error")]
pub struct RunTestError {
    name: String,
    #[source]
    source: TestBodyError,
}

impl RunTestError {
    pub(crate) fn new(name: impl Into<String>, source: TestBodyError) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Returns the name of the test that failed.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse outcome-harness config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// A profile was requested but not found in the config.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// An error occurred while setting up the signal handler.
#[derive(Debug, Error)]
#[error("error setting up signal handler")]
pub struct SignalHandlerSetupError(#[from] std::io::Error);

/// An error that occurred while building a [`SuiteRunner`](crate::suite::SuiteRunner).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SuiteBuildError {
    /// Failed to create the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] std::io::Error),

    /// Failed to set up the signal handler.
    #[error("error setting up signals")]
    SignalHandlerSetupError(#[from] SignalHandlerSetupError),
}

/// An error that aborted a suite run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SuiteRunError<E> {
    /// The suite contained tests with the same name. No tests were run.
    #[error("suite setup failed")]
    DuplicateNames(#[from] DuplicateNameError),

    /// The event callback returned an error. The suite stopped at that point.
    #[error("event callback failed")]
    Callback(#[source] E),
}

/// An error that occurred while writing a JUnit report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteJunitError {
    /// An error occurred while operating on the file system.
    #[error("error operating on path {file}")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while producing JUnit XML.
    #[error("error writing JUnit output to {file}")]
    Junit {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },
}

/// Displays an error along with its chain of sources, one per line.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain` for the given error.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(error) = source {
            write!(f, "\n  - {error}")?;
            source = error.source();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_message() {
        let error = DuplicateNameError::new(vec!["A".to_owned(), "B".to_owned()]);
        assert_eq!(error.to_string(), "duplicate test name(s): A, B");
    }

    #[test]
    fn error_chain_lists_sources() {
        let error = RunTestError::new(
            "kernel_add",
            Box::new(SessionCreateError::new("device lost")),
        );
        assert_eq!(
            DisplayErrorChain::new(&error).to_string(),
            "test `kernel_add` returned an error\n  caused by:\n  \
             - failed to create execution session\n  - device lost",
        );
    }
}
