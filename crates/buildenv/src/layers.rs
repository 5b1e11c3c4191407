// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Discovery and merging of layered configuration files.
//!
//! Candidates are applied in a fixed order, with later files overriding
//! earlier ones key by key:
//!
//! 1. `buildenv.conf` next to the executable
//! 2. `buildenv.conf` in the start directory
//! 3. `buildenv.conf` in the build directory (not while initializing)
//! 4. every `--config` file, in the order given
//!
//! With `--user-conf-only` the list is just the `--config` files.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config_file::{ConfigFile, ConfigWarning};
use crate::path::{Existence, PathResolver};
use crate::settings::Settings;
use crate::{CONFIG_FILENAME, HostContext};

#[cfg(test)]
#[path = "./layers_test.rs"]
mod layers_test;

/// Where a configuration candidate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    ScriptAdjacent,
    WorkingDirectory,
    BuildDirectory,
    Explicit,
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ScriptAdjacent => "executable",
            Self::WorkingDirectory => "working directory",
            Self::BuildDirectory => "build directory",
            Self::Explicit => "--config",
        };
        f.write_str(name)
    }
}

/// A file that may or may not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigCandidate {
    pub origin: ConfigOrigin,
    pub path: PathBuf,
}

/// Inputs that decide which candidates are consulted.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions<'a> {
    pub init: bool,
    pub build_dir: Option<&'a Path>,
    pub explicit: &'a [String],
    pub user_conf_only: bool,
}

/// What a merge pass did.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    /// Files that existed and were applied, in order.
    pub loaded: Vec<PathBuf>,

    /// Forbidden keys seen across all loaded files.
    pub warnings: Vec<ConfigWarning>,
}

/// The ordered candidate list for one merge pass.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    candidates: Vec<ConfigCandidate>,
}

impl ConfigSources {
    /// Build the candidate list for an invocation.
    pub fn collect(host: &HostContext, options: &SourceOptions<'_>) -> Self {
        let mut candidates = Vec::new();
        let mut push = |origin, path: PathBuf| candidates.push(ConfigCandidate { origin, path });

        if !options.user_conf_only {
            if let Some(exe_dir) = &host.exe_dir {
                push(ConfigOrigin::ScriptAdjacent, exe_dir.join(CONFIG_FILENAME));
            }
            push(
                ConfigOrigin::WorkingDirectory,
                host.start_dir.join(CONFIG_FILENAME),
            );
            if let (false, Some(build_dir)) = (options.init, options.build_dir) {
                push(ConfigOrigin::BuildDirectory, build_dir.join(CONFIG_FILENAME));
            }
        }
        for explicit in options.explicit {
            push(ConfigOrigin::Explicit, PathBuf::from(explicit));
        }

        Self { candidates }
    }

    /// The candidates in application order.
    pub fn candidates(&self) -> &[ConfigCandidate] {
        &self.candidates
    }

    /// Load every existing candidate and apply it onto `settings` in order.
    pub fn merge_into(
        &self,
        settings: &mut Settings,
        resolver: &PathResolver,
    ) -> crate::Result<MergeReport> {
        let mut report = MergeReport::default();

        for candidate in &self.candidates {
            let resolved = resolver.resolve_file(
                Some(candidate.path.as_path()),
                "configuration file",
                Existence::OptionalIfMissing,
                None,
            )?;
            let Some(path) = resolved else {
                if candidate.origin == ConfigOrigin::Explicit {
                    tracing::warn!(
                        "Configuration file {} does not exist, skipping it",
                        candidate.path.display()
                    );
                }
                continue;
            };

            tracing::debug!("Loading {} configuration {}", candidate.origin, path.display());
            let config = ConfigFile::load(&path)?;
            config.apply_to(settings);
            report.warnings.extend(config.warnings);
            report.loaded.push(path);
        }

        Ok(report)
    }
}
