// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Canonical path resolution with existence classification.
//!
//! Paths are resolved the way `realpath -m` does it: every component that
//! exists on disk has its symlinks resolved, and whatever does not exist yet
//! is appended textually. This lets a build directory that has not been
//! created be named, compared and validated like any other.

use std::path::{Component, Path, PathBuf};

use nix::unistd::{AccessFlags, access};

use crate::{Error, HostContext};

#[cfg(test)]
#[path = "./path_test.rs"]
mod path_test;

/// How strictly a resolved path must already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    /// Must exist with the expected type and permissions.
    Required,
    /// Yields "unresolved" instead of failing when it does not exist.
    OptionalIfMissing,
    /// Must not exist yet (only meaningful for directories).
    MustNotExistYet,
}

/// What a path looks like on disk right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    /// Exists with the expected type and is accessible.
    Valid,
    /// Exists, but is the wrong type or cannot be accessed.
    WrongType,
    /// Does not exist.
    Missing,
}

/// Resolves user supplied paths relative to a fixed base directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base: PathBuf,
    home: Option<PathBuf>,
}

impl PathResolver {
    /// Create a resolver for relative paths under `base`.
    ///
    /// Without [`PathResolver::with_home`], paths starting with `~` fail.
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base: base.into(),
            home: None,
        }
    }

    /// A resolver rooted at the caller's start directory, expanding `~` to
    /// the caller's home.
    pub fn for_host(host: &HostContext) -> Self {
        Self::new(&host.start_dir).with_home(host.home.clone())
    }

    /// Use `home` when expanding a leading `~`.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// The directory relative paths are resolved against.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Canonicalize a path without requiring it to exist.
    pub fn canonicalize<P: AsRef<Path>>(&self, path: P) -> crate::Result<PathBuf> {
        let expanded = self.expand_home(path.as_ref())?;
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            self.base.join(expanded)
        };

        let mut resolved = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::Prefix(prefix) => resolved.push(prefix.as_os_str()),
                Component::RootDir => resolved.push(Component::RootDir.as_os_str()),
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::Normal(name) => {
                    resolved.push(name);
                    // dangling links keep their textual form
                    if resolved.symlink_metadata().is_ok() {
                        if let Ok(real) = dunce::canonicalize(&resolved) {
                            resolved = real;
                        }
                    }
                }
            }
        }
        Ok(resolved)
    }

    /// Resolve a file setting.
    ///
    /// An empty or missing `value` falls back to `default`; with neither the
    /// result is `Ok(None)` and the caller decides what that means.
    pub fn resolve_file(
        &self,
        value: Option<&Path>,
        what: &str,
        existence: Existence,
        default: Option<&Path>,
    ) -> crate::Result<Option<PathBuf>> {
        let Some(path) = self.canonical_or_default(value, default)? else {
            return Ok(None);
        };

        match (existence, classify_file(&path)) {
            (_, PathState::Valid) => Ok(Some(path)),
            (Existence::Required, _) => Err(Error::MissingOrUnreadableFile {
                what: what.to_string(),
                path,
            }),
            (Existence::OptionalIfMissing, _) => {
                tracing::debug!("{what} not found at {}", path.display());
                Ok(None)
            }
            (Existence::MustNotExistYet, _) => Ok(Some(path)),
        }
    }

    /// Resolve a directory setting.
    ///
    /// Only `Required` and `MustNotExistYet` check the filesystem; otherwise
    /// the canonical path is returned and validated later by the caller.
    pub fn resolve_dir(
        &self,
        value: Option<&Path>,
        what: &str,
        existence: Existence,
        default: Option<&Path>,
    ) -> crate::Result<Option<PathBuf>> {
        let Some(path) = self.canonical_or_default(value, default)? else {
            return Ok(None);
        };

        match existence {
            Existence::Required if classify_dir(&path) != PathState::Valid => {
                Err(Error::MissingOrInaccessibleDirectory {
                    what: what.to_string(),
                    path,
                })
            }
            Existence::MustNotExistYet if path.is_dir() => Err(Error::DirectoryAlreadyExists {
                what: what.to_string(),
                path,
            }),
            _ => Ok(Some(path)),
        }
    }

    fn canonical_or_default(
        &self,
        value: Option<&Path>,
        default: Option<&Path>,
    ) -> crate::Result<Option<PathBuf>> {
        match (value.filter(|v| !v.as_os_str().is_empty()), default) {
            (Some(value), _) => self.canonicalize(value).map(Some),
            (None, Some(default)) => self.canonicalize(default).map(Some),
            (None, None) => Ok(None),
        }
    }

    /// Expand a leading `~` to the configured home directory.
    fn expand_home(&self, path: &Path) -> crate::Result<PathBuf> {
        let Ok(rest) = path.strip_prefix("~") else {
            return Ok(path.to_path_buf());
        };
        let home = self.home.as_ref().ok_or_else(|| {
            Error::Usage(format!("Cannot resolve {} without HOME", path.display()))
        })?;
        Ok(home.join(rest))
    }
}

/// Classify `path` as a readable regular file.
pub fn classify_file(path: &Path) -> PathState {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && access(path, AccessFlags::R_OK).is_ok() => PathState::Valid,
        Ok(_) => PathState::WrongType,
        Err(_) => PathState::Missing,
    }
}

/// Classify `path` as a readable and searchable directory.
pub fn classify_dir(path: &Path) -> PathState {
    match std::fs::metadata(path) {
        Ok(meta)
            if meta.is_dir() && access(path, AccessFlags::R_OK | AccessFlags::X_OK).is_ok() =>
        {
            PathState::Valid
        }
        Ok(_) => PathState::WrongType,
        Err(_) => PathState::Missing,
    }
}
