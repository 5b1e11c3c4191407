// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Settings data types and the persisted `KEY='VALUE'` format.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::Error;

#[cfg(test)]
#[path = "./settings_test.rs"]
mod settings_test;

/// Every key the configuration file format knows about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, AsRefStr, Display, EnumIter, EnumString,
)]
pub enum ConfigKey {
    #[strum(serialize = "BUILDDIR")]
    BuildDir,
    #[strum(serialize = "LAYERDIR")]
    LayerDir,
    #[strum(serialize = "INIT_ARGS")]
    InitArgs,
    #[strum(serialize = "INIT_SETUP_SCRIPT")]
    InitSetupScript,
    #[strum(serialize = "SETUP_SCRIPT")]
    SetupScript,
    #[strum(serialize = "SHELL_PROMPT")]
    ShellPrompt,
    #[strum(serialize = "EXTRA_ENV_ARGS")]
    ExtraEnvArgs,
    #[strum(serialize = "LM_LICENSE_FILE")]
    LicenseFile,
    #[strum(serialize = "SSH_AUTH_SOCK")]
    SshAuthSock,
    #[strum(serialize = "CMD_LINE_INIT")]
    CmdLineInit,
    #[strum(serialize = "USER_CONF_ONLY")]
    UserConfOnly,
}

impl ConfigKey {
    /// Keys persisted after initialization, in file order.
    pub const PERSISTED: [ConfigKey; 7] = [
        ConfigKey::BuildDir,
        ConfigKey::LayerDir,
        ConfigKey::InitArgs,
        ConfigKey::InitSetupScript,
        ConfigKey::SetupScript,
        ConfigKey::ShellPrompt,
        ConfigKey::ExtraEnvArgs,
    ];

    /// Keys that may be applied from a configuration file.
    pub fn is_allowed_in_file(self) -> bool {
        !self.is_forbidden_in_file()
    }

    /// Invocation control keys that files must never set.
    pub fn is_forbidden_in_file(self) -> bool {
        matches!(self, ConfigKey::CmdLineInit | ConfigKey::UserConfOnly)
    }

    /// Keys exported verbatim into the child environment.
    pub fn is_passthrough(self) -> bool {
        matches!(self, ConfigKey::LicenseFile | ConfigKey::SshAuthSock)
    }
}

/// Settings as they accumulate from files, the command line and defaults.
///
/// Values are kept as written until final validation turns them into a
/// [`ResolvedSettings`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub build_dir: Option<String>,
    pub layer_dir: Option<String>,
    pub setup_script: Option<String>,
    pub init_setup_script: Option<String>,
    pub init_args: Vec<String>,
    pub shell_prompt: Option<String>,
    pub extra_env: Vec<String>,
    /// Pass-through credential variables taken from configuration files.
    pub passthrough: IndexMap<String, String>,
    pub debug: bool,
    pub user_conf_only: bool,
    pub init: bool,
}

impl Settings {
    /// Apply a single configuration value.
    ///
    /// An empty value clears the setting, so a later layer can hand it back
    /// to the built-in default. Invocation control keys are ignored here;
    /// they only ever come from the command line.
    pub fn apply(&mut self, key: ConfigKey, value: &str) {
        let text = Some(value.to_string()).filter(|v| !v.is_empty());
        match key {
            ConfigKey::BuildDir => self.build_dir = text,
            ConfigKey::LayerDir => self.layer_dir = text,
            ConfigKey::InitArgs => self.init_args = split_list(value),
            ConfigKey::InitSetupScript => self.init_setup_script = text,
            ConfigKey::SetupScript => self.setup_script = text,
            ConfigKey::ShellPrompt => self.shell_prompt = text,
            ConfigKey::ExtraEnvArgs => self.extra_env = split_list(value),
            ConfigKey::LicenseFile | ConfigKey::SshAuthSock => match text {
                Some(value) => {
                    self.passthrough.insert(key.to_string(), value);
                }
                None => {
                    let name: &str = key.as_ref();
                    self.passthrough.shift_remove(name);
                }
            },
            ConfigKey::CmdLineInit | ConfigKey::UserConfOnly => {}
        }
    }
}

/// Fully validated settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSettings {
    /// Directory the invocation started from.
    pub start_dir: PathBuf,
    pub build_dir: PathBuf,
    pub layer_dir: PathBuf,
    pub setup_script: PathBuf,
    pub init_setup_script: PathBuf,
    pub init_args: Vec<String>,
    pub shell_prompt: String,
    pub extra_env: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub passthrough: IndexMap<String, String>,
    pub debug: bool,
    pub user_conf_only: bool,
    pub init: bool,
}

impl ResolvedSettings {
    /// The script that runs for this invocation.
    pub fn active_script(&self) -> &Path {
        if self.init {
            &self.init_setup_script
        } else {
            &self.setup_script
        }
    }

    /// Render the persisted configuration, one single-quoted key per line.
    pub fn to_config_string(&self) -> String {
        let mut out = String::new();
        for key in ConfigKey::PERSISTED {
            let value = match key {
                ConfigKey::BuildDir => self.build_dir.display().to_string(),
                ConfigKey::LayerDir => self.layer_dir.display().to_string(),
                ConfigKey::InitArgs => self.init_args.join(" "),
                ConfigKey::InitSetupScript => self.init_setup_script.display().to_string(),
                ConfigKey::SetupScript => self.setup_script.display().to_string(),
                ConfigKey::ShellPrompt => self.shell_prompt.clone(),
                ConfigKey::ExtraEnvArgs => self.extra_env.join(" "),
                _ => continue,
            };
            out.push_str(&format!("{key}={}\n", single_quote(&value)));
        }
        out
    }

    /// Write the persisted configuration to `path`.
    ///
    /// Fails with [`Error::OutputConfigExists`] when the file is already there
    /// unless `overwrite` is set, in which case a warning is logged.
    pub fn write_config(&self, path: &Path, overwrite: bool) -> crate::Result<()> {
        if path.exists() {
            if !overwrite {
                return Err(Error::OutputConfigExists(path.to_path_buf()));
            }
            tracing::warn!("Overwriting existing configuration {}", path.display());
        }
        std::fs::write(path, self.to_config_string()).map_err(|error| Error::WriteFailed {
            path: path.to_path_buf(),
            error,
        })?;
        tracing::debug!("Wrote configuration to {}", path.display());
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(String::from).collect()
}

/// Quote `value` for a POSIX shell using single quotes.
pub fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
