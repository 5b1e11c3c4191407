// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Loading of a single `KEY=VALUE` configuration file.
//!
//! Values are taken literally and never evaluated. Lines carrying any of
//! the characters in [`DISALLOWED_CHARACTERS`] are dropped without a word,
//! which also removes comments.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;

use crate::Error;
use crate::settings::{ConfigKey, Settings};

#[cfg(test)]
#[path = "./config_file_test.rs"]
mod config_file_test;

/// Characters that disqualify a whole line.
pub const DISALLOWED_CHARACTERS: [char; 7] = ['#', '%', '&', ';', '<', '>', '|'];

/// How one raw line of a configuration file is treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLine {
    /// Blank, comment, disallowed characters or an unknown key.
    Ignored,
    /// A key that files may not set.
    Warned(ConfigKey),
    /// An allowed key and its unquoted value.
    Applied(ConfigKey, String),
}

impl ConfigLine {
    /// Classify a single line.
    pub fn classify(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.contains(DISALLOWED_CHARACTERS) {
            return Self::Ignored;
        }

        let (name, value) = match line.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value)),
            None => (line, None),
        };
        let Ok(key) = ConfigKey::from_str(name) else {
            return Self::Ignored;
        };

        if key.is_forbidden_in_file() {
            return Self::Warned(key);
        }
        match value {
            Some(value) => Self::Applied(key, unquote(value.trim()).to_string()),
            None => Self::Ignored,
        }
    }
}

/// A forbidden key found in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigWarning {
    pub path: PathBuf,
    pub line: usize,
    pub key: ConfigKey,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} cannot be set from a configuration file, ignoring it",
            self.path.display(),
            self.line,
            self.key
        )
    }
}

/// The usable contents of one configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// Where the file was loaded from.
    pub path: PathBuf,

    /// Allowed settings, last occurrence of a key wins.
    pub applied: IndexMap<ConfigKey, String>,

    /// Forbidden keys, in file order.
    pub warnings: Vec<ConfigWarning>,
}

impl ConfigFile {
    /// Load a configuration file.
    ///
    /// A missing file loads as empty; existence is checked by the caller.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(error) => {
                return Err(Error::ReadFailed {
                    path: path.to_path_buf(),
                    error,
                });
            }
        };
        Ok(Self::parse(path, &text))
    }

    /// Parse configuration text that was read from `path`.
    pub fn parse<P: Into<PathBuf>>(path: P, text: &str) -> Self {
        let mut config = Self {
            path: path.into(),
            ..Default::default()
        };

        for (index, line) in text.lines().enumerate() {
            match ConfigLine::classify(line) {
                ConfigLine::Ignored => {}
                ConfigLine::Warned(key) => config.warnings.push(ConfigWarning {
                    path: config.path.clone(),
                    line: index + 1,
                    key,
                }),
                ConfigLine::Applied(key, value) => {
                    config.applied.insert(key, value);
                }
            }
        }

        config
    }

    /// Apply the allowed settings onto `settings`.
    pub fn apply_to(&self, settings: &mut Settings) {
        for (key, value) in &self.applied {
            tracing::debug!("{}: {key}={value}", self.path.display());
            settings.apply(*key, value);
        }
    }
}

/// Strip one pair of matching surrounding quotes.
fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
