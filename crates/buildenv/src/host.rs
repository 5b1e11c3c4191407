// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Snapshot of the calling process: where it started, where it lives and
//! what its environment holds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Process context captured once and threaded through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    /// Directory relative paths and defaults are resolved from.
    pub start_dir: PathBuf,

    /// Directory holding the running executable, if known.
    pub exe_dir: Option<PathBuf>,

    /// The caller's environment.
    pub env: HashMap<String, String>,

    /// Home directory used to expand `~`.
    pub home: Option<PathBuf>,
}

impl HostContext {
    /// Capture the current process.
    pub fn from_process() -> crate::Result<Self> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| dunce::canonicalize(exe).ok())
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let env: HashMap<String, String> = std::env::vars().collect();
        let home = env
            .get("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::home_dir);
        Ok(Self {
            start_dir: resolve_start_dir()?,
            exe_dir,
            env,
            home,
        })
    }

    /// Look up a caller variable, treating empty values as unset.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.env
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Current directory, preferring $PWD to preserve symlinks.
fn resolve_start_dir() -> crate::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let Some(pwd) = std::env::var_os("PWD").map(PathBuf::from) else {
        return Ok(cwd);
    };
    match (dunce::canonicalize(&pwd), dunce::canonicalize(&cwd)) {
        (Ok(a), Ok(b)) if a == b => Ok(pwd),
        _ => Ok(cwd),
    }
}
