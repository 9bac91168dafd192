// Copyright (c) The outcome-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for outcome-harness.
//!
//! The built-in [default config](HarnessConfig::DEFAULT_CONFIG) is always loaded first. A
//! user config file, either passed in explicitly or found at
//! [`HarnessConfig::CONFIG_PATH`] under the workspace root, is layered on top of it.

use crate::errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};
use tracing::warn;

/// Overall configuration for outcome-harness.
///
/// This is the root data structure for configuration. Individual profiles are obtained with
/// [`profile`](Self::profile).
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    workspace_root: Utf8PathBuf,
    inner: HarnessConfigImpl,
}

impl HarnessConfig {
    /// The default location of the config within the workspace root.
    pub const CONFIG_PATH: &'static str = ".config/outcome-harness.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the config from the given file, or the default location under the workspace root
    /// if it exists.
    ///
    /// An explicitly passed-in file must exist, while the file at the default location is
    /// optional.
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let inner = Self::build_and_deserialize_config(&builder, &config_file)
            .map_err(|kind| ConfigParseError::new(config_file, kind))?;

        Ok(Self {
            workspace_root,
            inner,
        })
    }

    /// Returns the default config, with no user config layered on top.
    pub fn default_config(workspace_root: impl Into<Utf8PathBuf>) -> Self {
        let builder = Self::make_default_config();
        let inner = Self::build_and_deserialize_config(&builder, Utf8Path::new("<default>"))
            .expect("default config is always valid");

        Self {
            workspace_root: workspace_root.into(),
            inner,
        }
    }

    /// Returns the profile with the given name, or an error if a profile by that name wasn't
    /// found.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<HarnessProfile<'_>, ProfileNotFound> {
        self.make_profile(name.as_ref())
    }

    /// Returns the names of all profiles, the default profile first.
    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(Self::DEFAULT_PROFILE)
            .chain(self.inner.profiles.other.keys().map(|name| name.as_str()))
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn make_profile(&self, name: &str) -> Result<HarnessProfile<'_>, ProfileNotFound> {
        let custom_profile = match name {
            Self::DEFAULT_PROFILE => None,
            other => Some(self.inner.profiles.other.get(other).ok_or_else(|| {
                ProfileNotFound::new(name, self.profile_names().collect::<Vec<_>>())
            })?),
        };

        let store_dir = self
            .workspace_root
            .join(&self.inner.store.dir)
            .join(name);

        Ok(HarnessProfile {
            name: name.to_owned(),
            store_dir,
            default_profile: &self.inner.profiles.default,
            custom_profile,
        })
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
        config_file: &Utf8Path,
    ) -> Result<HarnessConfigImpl, ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = Vec::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let inner: HarnessConfigImpl =
            serde_path_to_error::deserialize(ignored_de).map_err(|error| {
                // The config crate reports the key as well. Drop it so the path is only
                // shown once.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        for key in &ignored {
            warn!(config_file = %config_file, key = %key, "ignoring unknown configuration key");
        }

        Ok(inner)
    }
}

/// A configuration profile for outcome-harness. Contains the settings a suite run uses.
///
/// Returned by [`HarnessConfig::profile`].
#[derive(Clone, Debug)]
pub struct HarnessProfile<'cfg> {
    name: String,
    store_dir: Utf8PathBuf,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg CustomProfileImpl>,
}

impl<'cfg> HarnessProfile<'cfg> {
    /// Returns the name of this profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the absolute directory that reports for this profile are written to.
    pub fn store_dir(&self) -> &Utf8Path {
        &self.store_dir
    }

    /// Returns how long a test waits for its pass/fail message before it is recorded as
    /// failed.
    pub fn message_timeout(&self) -> Duration {
        self.custom_profile
            .and_then(|profile| profile.message_timeout)
            .unwrap_or(self.default_profile.message_timeout)
    }

    /// Returns true if the suite should stop after the first test that doesn't pass.
    pub fn fail_fast(&self) -> bool {
        self.custom_profile
            .and_then(|profile| profile.fail_fast)
            .unwrap_or(self.default_profile.fail_fast)
    }

    /// Returns the JUnit configuration for this profile, or `None` if no report should be
    /// written.
    pub fn junit(&self) -> Option<JunitConfig<'cfg>> {
        let path = self
            .custom_profile
            .and_then(|profile| profile.junit.path.as_deref())
            .or(self.default_profile.junit.path.as_deref())?;
        let report_name = self
            .custom_profile
            .and_then(|profile| profile.junit.report_name.as_deref())
            .unwrap_or(&self.default_profile.junit.report_name);

        Some(JunitConfig {
            path: self.store_dir.join(path),
            report_name,
        })
    }
}

/// JUnit configuration for outcome-harness, returned by [`HarnessProfile::junit`].
#[derive(Clone, Debug)]
pub struct JunitConfig<'cfg> {
    path: Utf8PathBuf,
    report_name: &'cfg str,
}

impl<'cfg> JunitConfig<'cfg> {
    /// Returns the absolute path to the JUnit report.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the name of the JUnit report.
    pub fn report_name(&self) -> &'cfg str {
        self.report_name
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct HarnessConfigImpl {
    store: StoreConfigImpl,
    #[serde(rename = "profile")]
    profiles: HarnessProfilesImpl,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StoreConfigImpl {
    dir: Utf8PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct HarnessProfilesImpl {
    default: DefaultProfileImpl,
    #[serde(flatten)]
    other: BTreeMap<String, CustomProfileImpl>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DefaultProfileImpl {
    #[serde(with = "humantime_serde")]
    message_timeout: Duration,
    fail_fast: bool,
    junit: DefaultJunitImpl,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DefaultJunitImpl {
    #[serde(default)]
    path: Option<Utf8PathBuf>,
    report_name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomProfileImpl {
    #[serde(default, with = "humantime_serde")]
    message_timeout: Option<Duration>,
    #[serde(default)]
    fail_fast: Option<bool>,
    #[serde(default)]
    junit: JunitImpl,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JunitImpl {
    #[serde(default)]
    path: Option<Utf8PathBuf>,
    #[serde(default)]
    report_name: Option<String>,
}
