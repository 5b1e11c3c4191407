// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Settings resolution: command line, layered files and defaults.
//!
//! Resolution runs through a fixed sequence of phases:
//!
//! ```text
//! ParsedArgs -> ValidatedPre -> Merged(1) -> Overridden(1) -> Defaulted
//!            -> Merged(2) -> Overridden(2) -> ValidatedFinal
//! ```
//!
//! Configuration files are merged twice so that a defaulted build directory
//! can still contribute its own `buildenv.conf`. The command line is
//! re-applied after each merge and therefore always wins over files.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config_file::ConfigWarning;
use crate::layers::{ConfigCandidate, ConfigSources, SourceOptions};
use crate::path::{Existence, PathResolver};
use crate::settings::{ResolvedSettings, Settings};
use crate::{Error, HostContext};

#[cfg(test)]
#[path = "./resolve_test.rs"]
mod resolve_test;

/// Build directory used when none is configured, relative to the start directory.
pub const DEFAULT_BUILD_DIR: &str = "build";

/// Setup script used when none is configured, relative to the layer directory.
pub const DEFAULT_SETUP_SCRIPT: &str = "poky/oe-init-build-env";

/// Prompt label used when none is configured.
pub const DEFAULT_SHELL_PROMPT: &str = "buildenv";

/// Settings requested on the command line.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub build_dir: Option<String>,
    pub config_files: Vec<String>,
    pub debug: bool,
    pub init: bool,
    pub init_args: Vec<String>,
    pub init_setup_script: Option<String>,
    pub layer_dir: Option<String>,
    pub setup_script: Option<String>,
    pub shell_prompt: Option<String>,
    pub extra_env: Vec<String>,
    pub user_conf_only: bool,
}

/// Resolution phases, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    ParsedArgs,
    ValidatedPre,
    Merged(u8),
    Overridden(u8),
    Defaulted,
    ValidatedFinal,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParsedArgs => f.write_str("parsed arguments"),
            Self::ValidatedPre => f.write_str("validated arguments"),
            Self::Merged(pass) => write!(f, "merged configuration (pass {pass})"),
            Self::Overridden(pass) => write!(f, "applied command line (pass {pass})"),
            Self::Defaulted => f.write_str("applied defaults"),
            Self::ValidatedFinal => f.write_str("validated settings"),
        }
    }
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub settings: ResolvedSettings,

    /// Candidates consulted in the last merge pass.
    pub sources: Vec<ConfigCandidate>,

    /// Files that existed and were applied in the last merge pass.
    pub loaded: Vec<PathBuf>,

    /// Forbidden keys found in any loaded file, without duplicates.
    pub warnings: Vec<ConfigWarning>,
}

/// Resolve and validate the settings for one invocation.
///
/// Any failure aborts resolution; nothing has been executed at that point.
pub fn resolve_settings(invocation: &Invocation, host: &HostContext) -> crate::Result<Resolution> {
    let mut resolver = SettingsResolver::new(invocation, host);
    resolver.validate_arguments()?;
    resolver.merge_config(1)?;
    resolver.apply_command_line(1);
    resolver.apply_defaults()?;
    resolver.merge_config(2)?;
    resolver.apply_command_line(2);
    resolver.finish()
}

struct SettingsResolver<'a> {
    invocation: &'a Invocation,
    host: &'a HostContext,
    paths: PathResolver,
    phase: Phase,
    settings: Settings,
    cli_build_dir: Option<PathBuf>,
    sources: Vec<ConfigCandidate>,
    loaded: Vec<PathBuf>,
    warnings: Vec<ConfigWarning>,
}

impl<'a> SettingsResolver<'a> {
    fn new(invocation: &'a Invocation, host: &'a HostContext) -> Self {
        let settings = Settings {
            debug: invocation.debug,
            init: invocation.init,
            user_conf_only: invocation.user_conf_only,
            ..Default::default()
        };
        Self {
            invocation,
            host,
            paths: PathResolver::for_host(host),
            phase: Phase::ParsedArgs,
            settings,
            cli_build_dir: None,
            sources: Vec::new(),
            loaded: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn advance(&mut self, next: Phase) {
        tracing::debug!("settings: {} -> {next}", self.phase);
        self.phase = next;
    }

    /// Cross-flag checks that run before any configuration file is read.
    fn validate_arguments(&mut self) -> crate::Result<()> {
        let invocation = self.invocation;

        if invocation.user_conf_only {
            if invocation.config_files.is_empty() {
                return Err(Error::Usage(
                    "--user-conf-only requires at least one --config file".to_string(),
                ));
            }
            for file in &invocation.config_files {
                self.paths.resolve_file(
                    Some(Path::new(file)),
                    "configuration file",
                    Existence::Required,
                    None,
                )?;
            }
        }

        let build_dir = non_empty(&invocation.build_dir);
        match (build_dir, invocation.init) {
            (None, true) => {
                return Err(Error::Usage(
                    "--init requires an explicit --build-dir".to_string(),
                ));
            }
            (None, false) => {}
            (Some(dir), init) => {
                let existence = if init {
                    Existence::MustNotExistYet
                } else {
                    Existence::Required
                };
                self.cli_build_dir = self.paths.resolve_dir(
                    Some(Path::new(dir)),
                    "build directory",
                    existence,
                    None,
                )?;
            }
        }

        self.advance(Phase::ValidatedPre);
        Ok(())
    }

    fn merge_config(&mut self, pass: u8) -> crate::Result<()> {
        let build_dir = match (&self.cli_build_dir, non_empty(&self.settings.build_dir)) {
            (Some(dir), _) => Some(dir.clone()),
            (None, Some(dir)) => Some(self.paths.canonicalize(dir)?),
            (None, None) => None,
        };
        let options = SourceOptions {
            init: self.invocation.init,
            build_dir: build_dir.as_deref(),
            explicit: &self.invocation.config_files,
            user_conf_only: self.invocation.user_conf_only,
        };

        let sources = ConfigSources::collect(self.host, &options);
        let report = sources.merge_into(&mut self.settings, &self.paths)?;

        for warning in report.warnings {
            if !self.warnings.contains(&warning) {
                tracing::warn!("{warning}");
                self.warnings.push(warning);
            }
        }
        self.sources = sources.candidates().to_vec();
        self.loaded = report.loaded;

        self.advance(Phase::Merged(pass));
        Ok(())
    }

    fn apply_command_line(&mut self, pass: u8) {
        let invocation = self.invocation;
        let settings = &mut self.settings;

        if let Some(dir) = &self.cli_build_dir {
            settings.build_dir = Some(dir.display().to_string());
        }
        override_with(&mut settings.layer_dir, &invocation.layer_dir);
        override_with(&mut settings.setup_script, &invocation.setup_script);
        override_with(&mut settings.init_setup_script, &invocation.init_setup_script);
        override_with(&mut settings.shell_prompt, &invocation.shell_prompt);
        if !invocation.init_args.is_empty() {
            settings.init_args = invocation.init_args.clone();
        }
        if !invocation.extra_env.is_empty() {
            settings.extra_env = invocation.extra_env.clone();
        }
        settings.debug |= invocation.debug;
        settings.init = invocation.init;
        settings.user_conf_only = invocation.user_conf_only;

        self.advance(Phase::Overridden(pass));
    }

    fn apply_defaults(&mut self) -> crate::Result<()> {
        let settings = &mut self.settings;

        let build_dir = self
            .paths
            .canonicalize(non_empty(&settings.build_dir).unwrap_or(DEFAULT_BUILD_DIR))?;
        let layer_dir = match non_empty(&settings.layer_dir) {
            Some(dir) => self.paths.canonicalize(dir)?,
            None => build_dir
                .parent()
                .unwrap_or(build_dir.as_path())
                .to_path_buf(),
        };
        let setup_script = match non_empty(&settings.setup_script) {
            Some(script) => self.paths.canonicalize(script)?,
            None => layer_dir.join(DEFAULT_SETUP_SCRIPT),
        };

        if settings.init_args.is_empty() {
            settings.init_args = vec![build_dir.display().to_string()];
        }
        if non_empty(&settings.init_setup_script).is_none() {
            settings.init_setup_script = Some(setup_script.display().to_string());
        }
        if non_empty(&settings.shell_prompt).is_none() {
            settings.shell_prompt = Some(DEFAULT_SHELL_PROMPT.to_string());
        }
        settings.build_dir = Some(build_dir.display().to_string());
        settings.layer_dir = Some(layer_dir.display().to_string());
        settings.setup_script = Some(setup_script.display().to_string());

        self.advance(Phase::Defaulted);
        Ok(())
    }

    fn finish(mut self) -> crate::Result<Resolution> {
        let settings = &self.settings;
        let init = settings.init;

        let build_dir = self.required_path(&settings.build_dir, "BUILDDIR")?;
        if init && build_dir.is_dir() {
            return Err(Error::DirectoryAlreadyExists {
                what: "build directory".to_string(),
                path: build_dir,
            });
        }
        if !init && !build_dir.is_dir() {
            return Err(Error::MissingBuildDirectory(build_dir));
        }

        let layer_dir = self.required_path(&settings.layer_dir, "LAYERDIR")?;
        if !layer_dir.is_dir() {
            return Err(Error::MissingLayerDirectory(layer_dir));
        }

        let setup_script = self.required_path(&settings.setup_script, "SETUP_SCRIPT")?;
        let init_setup_script =
            self.required_path(&settings.init_setup_script, "INIT_SETUP_SCRIPT")?;
        let (active, what) = if init {
            (&init_setup_script, "initial setup script")
        } else {
            (&setup_script, "setup script")
        };
        self.paths
            .resolve_file(Some(active.as_path()), what, Existence::Required, None)?
            .ok_or_else(|| Error::MissingOrUnreadableFile {
                what: what.to_string(),
                path: active.clone(),
            })?;

        let init_args = if settings.init_args.is_empty() {
            vec![build_dir.display().to_string()]
        } else {
            settings.init_args.clone()
        };
        let resolved = ResolvedSettings {
            start_dir: self.host.start_dir.clone(),
            build_dir,
            layer_dir,
            setup_script,
            init_setup_script,
            init_args,
            shell_prompt: non_empty(&settings.shell_prompt)
                .unwrap_or(DEFAULT_SHELL_PROMPT)
                .to_string(),
            extra_env: settings.extra_env.clone(),
            passthrough: settings.passthrough.clone(),
            debug: settings.debug,
            user_conf_only: settings.user_conf_only,
            init,
        };

        self.advance(Phase::ValidatedFinal);
        Ok(Resolution {
            settings: resolved,
            sources: self.sources,
            loaded: self.loaded,
            warnings: self.warnings,
        })
    }

    fn required_path(&self, value: &Option<String>, key: &str) -> crate::Result<PathBuf> {
        let value = non_empty(value)
            .ok_or_else(|| Error::Usage(format!("{key} is not set after applying defaults")))?;
        self.paths.canonicalize(Path::new(value))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn override_with(setting: &mut Option<String>, cli: &Option<String>) {
    if let Some(value) = non_empty(cli) {
        *setting = Some(value.to_string());
    }
}
