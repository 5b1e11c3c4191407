// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for buildenv operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience Result type with buildenv Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving settings or entering the environment.
///
/// Every variant is fatal. The command line front end maps all of them
/// to exit status 1.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Bad flag or flag combination
    #[error("{0}")]
    #[diagnostic(code(buildenv::usage), help("Run with --help to see the available options"))]
    Usage(String),

    /// A file that must exist is missing or cannot be read
    #[error("{what} is missing or unreadable: {path:?}")]
    #[diagnostic(code(buildenv::missing_or_unreadable_file))]
    MissingOrUnreadableFile { what: String, path: PathBuf },

    /// A directory that must exist is missing or cannot be entered
    #[error("{what} is missing or inaccessible: {path:?}")]
    #[diagnostic(code(buildenv::missing_or_inaccessible_directory))]
    MissingOrInaccessibleDirectory { what: String, path: PathBuf },

    /// A directory that must not exist yet is already present
    #[error("{what} already exists: {path:?}")]
    #[diagnostic(
        code(buildenv::directory_already_exists),
        help("Initialization always creates a new build directory; drop --init to reuse an existing one")
    )]
    DirectoryAlreadyExists { what: String, path: PathBuf },

    /// Build directory missing on a normal invocation
    #[error("Build directory does not exist: {0:?}")]
    #[diagnostic(
        code(buildenv::missing_build_directory),
        help("Create it first with --init, or pass an existing directory with --build-dir")
    )]
    MissingBuildDirectory(PathBuf),

    /// Layer directory missing
    #[error("Layer directory does not exist: {0:?}")]
    #[diagnostic(
        code(buildenv::missing_layer_directory),
        help("Pass the directory holding your layers with --layer-dir")
    )]
    MissingLayerDirectory(PathBuf),

    /// Neither pass-through allow-list variable is set
    #[error("Neither {legacy} nor {current} is set in the environment")]
    #[diagnostic(
        code(buildenv::no_passthrough_allowlist),
        help("Export {} (it may be empty) before running buildenv", current)
    )]
    NoPassthroughAllowlist {
        legacy: &'static str,
        current: &'static str,
    },

    /// A --prepend-path component is not an existing directory
    #[error("Path to prepend does not exist or is not a directory: {0}")]
    #[diagnostic(code(buildenv::missing_prepend_path))]
    MissingPrependPath(String),

    /// The setup script ran and exited unsuccessfully
    #[error("Setup script {script:?} failed{}", exit_suffix(.code))]
    #[diagnostic(code(buildenv::setup_script_failed))]
    SetupScriptFailed { script: PathBuf, code: Option<i32> },

    /// Refusing to overwrite a configuration file
    #[error("Configuration file already exists: {0:?}")]
    #[diagnostic(
        code(buildenv::output_config_exists),
        help("Pass --force to overwrite it")
    )]
    OutputConfigExists(PathBuf),

    /// Malformed KEY=VALUE assignment
    #[error("Invalid environment assignment {0:?}, expected KEY=VALUE")]
    #[diagnostic(code(buildenv::invalid_assignment))]
    InvalidAssignment(String),

    /// Failed to read file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(buildenv::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to write file
    #[error("Failed to write file: {path:?}")]
    #[diagnostic(code(buildenv::write_failed))]
    WriteFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to start a process
    #[error("Failed to run {program:?}")]
    #[diagnostic(code(buildenv::spawn_failed))]
    SpawnFailed {
        program: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(buildenv::io_error))]
    Io(#[from] std::io::Error),
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => " (terminated by signal)".to_string(),
    }
}
