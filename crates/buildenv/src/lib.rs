// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! buildenv - Isolated Build Tool Environments
//!
//! This crate provides the core library for entering a build tool's setup
//! script in a clean environment, configured through layered `buildenv.conf`
//! files.
//!
//! # Overview
//!
//! An invocation resolves its settings from the command line and up to four
//! kinds of configuration file, validates the build and layer directories,
//! and assembles an environment made only of allow-listed variables. The
//! setup script is sourced inside that environment and whatever it exports
//! is handed to the final command or interactive shell.
//!
//! # Example
//!
//! ```text
//! # buildenv.conf
//! BUILDDIR='/work/builds/qemux86-64'
//! LAYERDIR='/work/layers'
//! SETUP_SCRIPT='/work/layers/poky/oe-init-build-env'
//! SHELL_PROMPT='qemu'
//! EXTRA_ENV_ARGS='MACHINE=qemux86-64'
//! ```

pub mod config_file;
pub mod environment;
pub mod error;
pub mod host;
pub mod invoke;
pub mod layers;
pub mod path;
pub mod resolve;
pub mod settings;

pub use config_file::{ConfigFile, ConfigLine, ConfigWarning};
pub use environment::{EnvironmentOptions, EnvironmentSet, build_environment};
pub use error::{Error, Result};
pub use host::HostContext;
pub use invoke::{InvokeOptions, run};
pub use layers::{ConfigCandidate, ConfigOrigin, ConfigSources};
pub use path::{Existence, PathResolver};
pub use resolve::{Invocation, Resolution, resolve_settings};
pub use settings::{ConfigKey, ResolvedSettings, Settings};

/// Well-known filename for configuration files.
pub const CONFIG_FILENAME: &str = "buildenv.conf";
