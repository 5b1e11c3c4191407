// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Construction of the sanitized child environment.
//!
//! The child sees exactly the variables assembled here and nothing else
//! from the caller.

use std::collections::{BTreeMap, BTreeSet};

use crate::path::{PathResolver, PathState, classify_dir};
use crate::settings::ResolvedSettings;
use crate::{Error, HostContext};

#[cfg(test)]
#[path = "./environment_test.rs"]
mod environment_test;

/// Nesting depth of buildenv shells.
pub const LEVEL_VAR: &str = "BUILDENV_LEVEL";

/// Older name of the build tool's pass-through allow-list.
pub const LEGACY_PASSTHROUGH_VAR: &str = "BB_ENV_EXTRAWHITE";

/// Current name of the build tool's pass-through allow-list.
pub const PASSTHROUGH_VAR: &str = "BB_ENV_PASSTHROUGH_ADDITIONS";

/// Caller variables forwarded when set.
pub const INHERITED_VARS: [&str; 4] = ["HOME", "TERM", "LANG", "DISPLAY"];

/// Search path used when the caller has none.
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// The complete environment of a child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSet {
    vars: BTreeMap<String, String>,
}

impl EnvironmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Flatten into `NAME=value` strings.
    pub fn to_assignments(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

impl FromIterator<(String, String)> for EnvironmentSet {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// Extra knobs for [`build_environment`].
#[derive(Debug, Clone, Default)]
pub struct EnvironmentOptions {
    /// Colon separated directories to put in front of the caller's PATH.
    pub prepend_path: Option<String>,
}

/// Assemble the child environment for `settings`.
pub fn build_environment(
    settings: &ResolvedSettings,
    host: &HostContext,
    options: &EnvironmentOptions,
) -> crate::Result<EnvironmentSet> {
    let level = nesting_level(host);
    let (allowlist_var, allowlist) = passthrough_allowlist(host)?;

    let mut extra = Vec::new();
    for name in allowlist.iter() {
        if let Some(value) = host.var(name) {
            extra.push((name.to_string(), value.to_string()));
        }
    }
    for (name, value) in &settings.passthrough {
        extra.push((name.clone(), value.clone()));
    }
    for assignment in &settings.extra_env {
        extra.push(parse_assignment(assignment)?);
    }

    let mut names: Vec<&str> = allowlist.iter().map(String::as_str).collect();
    for (name, _) in &extra {
        if !names.contains(&name.as_str()) {
            names.push(name.as_str());
        }
    }

    let mut env = EnvironmentSet::new();
    env.set(LEVEL_VAR, level.to_string());
    env.set(allowlist_var, names.join(" "));
    env.set("BUILDDIR", settings.build_dir.display().to_string());
    for name in INHERITED_VARS {
        if let Some(value) = host.var(name) {
            env.set(name, value);
        }
    }
    env.set("PATH", search_path(host, options)?);
    env.set("PS1", format!("[{}:{level}] \\w\\$ ", settings.shell_prompt));

    for (name, value) in extra {
        tracing::debug!("Passing {name} through to the build environment");
        env.set(name, value);
    }

    Ok(env)
}

/// One more than the caller's level, starting at 1.
fn nesting_level(host: &HostContext) -> u32 {
    match host.var(LEVEL_VAR).map(str::parse::<u32>) {
        None => 1,
        Some(Ok(level)) => level.saturating_add(1),
        Some(Err(_)) => {
            tracing::warn!("Ignoring unparseable {LEVEL_VAR}");
            1
        }
    }
}

/// Pick the allow-list variable, preferring the legacy name when present.
fn passthrough_allowlist(host: &HostContext) -> crate::Result<(&'static str, BTreeSet<String>)> {
    let (name, value) = [LEGACY_PASSTHROUGH_VAR, PASSTHROUGH_VAR]
        .into_iter()
        .find_map(|name| host.env.get(name).map(|value| (name, value)))
        .ok_or(Error::NoPassthroughAllowlist {
            legacy: LEGACY_PASSTHROUGH_VAR,
            current: PASSTHROUGH_VAR,
        })?;
    tracing::debug!("Using {name} as the pass-through allow-list");
    Ok((name, value.split_whitespace().map(String::from).collect()))
}

/// The caller's PATH with the requested directories in front.
fn search_path(host: &HostContext, options: &EnvironmentOptions) -> crate::Result<String> {
    let base = host.var("PATH").unwrap_or(DEFAULT_PATH);
    let Some(prepend) = &options.prepend_path else {
        return Ok(base.to_string());
    };

    let resolver = PathResolver::for_host(host);
    let mut parts = Vec::new();
    for component in prepend.split(':').filter(|c| !c.is_empty()) {
        let dir = resolver.canonicalize(component)?;
        if classify_dir(&dir) != PathState::Valid {
            return Err(Error::MissingPrependPath(component.to_string()));
        }
        parts.push(dir.display().to_string());
    }
    parts.push(base.to_string());
    Ok(parts.join(":"))
}

/// Split `NAME=value`, requiring a shell-compatible name.
pub fn parse_assignment(assignment: &str) -> crate::Result<(String, String)> {
    let invalid = || Error::InvalidAssignment(assignment.to_string());
    let (name, value) = assignment.split_once('=').ok_or_else(invalid)?;
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid());
    }
    Ok((name.to_string(), value.to_string()))
}
