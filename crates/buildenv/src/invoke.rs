// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Running the setup script and entering the build environment.
//!
//! The setup script is sourced by a shell running with the sanitized
//! environment. Once it returns, the shell prints [`ENV_SENTINEL`] and
//! dumps its exported variables, which become the environment of the final
//! command. Only exported variables survive this hand-off; shell functions
//! and aliases defined by the script do not.

use std::io::Write;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::environment::EnvironmentSet;
use crate::path::{PathState, classify_file};
use crate::settings::ResolvedSettings;
use crate::{CONFIG_FILENAME, Error};

#[cfg(test)]
#[path = "./invoke_test.rs"]
mod invoke_test;

/// Shell used to source the setup script and for interactive sessions.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// File name of the build tool's own setup script.
pub const DEFAULT_ENTRY_POINT: &str = "oe-init-build-env";

/// Marks the start of the environment dump on the wrapper's stdout.
pub const ENV_SENTINEL: &str = "__BUILDENV_ENVIRONMENT__";

/// Variables maintained by the shell itself rather than the setup script.
const SHELL_BOOKKEEPING: [&str; 4] = ["_", "SHLVL", "OLDPWD", "PWD"];

/// Sources `$0` with the wrapper's own positional arguments.
const SOURCE_WRAPPER: &str = r#". "$0" || exit $?
printf '\n%s\n' __BUILDENV_ENVIRONMENT__
exec /usr/bin/env -0
"#;

/// Options for [`run`].
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    /// Shell that sources the setup script and runs the final command.
    pub shell: PathBuf,

    /// Replace an existing `buildenv.conf` in a freshly initialized build directory.
    pub overwrite_config: bool,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            overwrite_config: false,
        }
    }
}

/// Source the setup script, then run `command` (or an interactive shell)
/// inside the build directory. Returns the exit code of that final process.
pub fn run(
    settings: &ResolvedSettings,
    env: EnvironmentSet,
    command: &[String],
    options: &InvokeOptions,
) -> crate::Result<i32> {
    let script = settings.active_script();
    if classify_file(script) != PathState::Valid {
        return Err(Error::MissingOrUnreadableFile {
            what: "setup script".to_string(),
            path: script.to_path_buf(),
        });
    }

    let args = script_arguments(settings);
    if settings.init {
        prepare_build_parent(&settings.build_dir)?;
    }

    tracing::info!("Sourcing {}", script.display());
    let env = source_setup_script(
        script,
        &args,
        &settings.start_dir,
        env,
        &options.shell,
        settings.debug,
    )?;

    if settings.init {
        persist_settings(settings, options.overwrite_config)?;
    }

    enter(&settings.build_dir, env, command, &options.shell)
}

/// Arguments handed to the active setup script.
pub fn script_arguments(settings: &ResolvedSettings) -> Vec<String> {
    let build_dir = settings.build_dir.display().to_string();
    if settings.init {
        if settings.init_args.is_empty() {
            vec![build_dir]
        } else {
            settings.init_args.clone()
        }
    } else if settings
        .setup_script
        .file_name()
        .is_some_and(|name| name == DEFAULT_ENTRY_POINT)
    {
        vec![build_dir]
    } else {
        Vec::new()
    }
}

/// Create the missing ancestors of a build directory that is about to be
/// initialized, never the directory itself.
pub fn prepare_build_parent(build_dir: &Path) -> crate::Result<()> {
    let Some(parent) = build_dir.parent() else {
        return Ok(());
    };
    if parent.is_dir() {
        return Ok(());
    }
    tracing::debug!("Creating {}", parent.display());
    std::fs::create_dir_all(parent).map_err(|error| Error::WriteFailed {
        path: parent.to_path_buf(),
        error,
    })
}

/// Source `script` with `args` and return the environment it leaves behind.
pub fn source_setup_script(
    script: &Path,
    args: &[String],
    working_dir: &Path,
    env: EnvironmentSet,
    shell: &Path,
    trace: bool,
) -> crate::Result<EnvironmentSet> {
    let mut cmd = Command::new(shell);
    if trace {
        cmd.arg("-x");
    }
    cmd.arg("-c")
        .arg(SOURCE_WRAPPER)
        .arg(script)
        .args(args)
        .current_dir(working_dir)
        .env_clear()
        .envs(env.iter())
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    let output = cmd.output().map_err(|error| Error::SpawnFailed {
        program: shell.to_path_buf(),
        error,
    })?;

    let (script_output, dump) = split_environment_dump(&output.stdout);
    std::io::stdout().write_all(script_output)?;

    if !output.status.success() {
        return Err(Error::SetupScriptFailed {
            script: script.to_path_buf(),
            code: output.status.code(),
        });
    }

    match dump {
        Some(captured) => Ok(captured),
        None => {
            tracing::warn!(
                "{} exited without reporting its environment, keeping the environment unchanged",
                script.display()
            );
            Ok(env)
        }
    }
}

/// Split wrapper output into the script's own output and the parsed dump.
pub fn split_environment_dump(stdout: &[u8]) -> (&[u8], Option<EnvironmentSet>) {
    let needle = format!("\n{ENV_SENTINEL}\n");
    let Some(start) = stdout
        .windows(needle.len())
        .rposition(|window| window == needle.as_bytes())
    else {
        return (stdout, None);
    };

    let dump = &stdout[start + needle.len()..];
    let env = dump
        .split(|byte| *byte == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let Ok(entry) = std::str::from_utf8(entry) else {
                tracing::warn!(
                    "Dropping non UTF-8 variable {:?} exported by the setup script",
                    String::from_utf8_lossy(entry)
                );
                return None;
            };
            let (name, value) = entry.split_once('=')?;
            if SHELL_BOOKKEEPING.contains(&name) {
                return None;
            }
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    (&stdout[..start], Some(env))
}

/// Record the resolved settings inside a freshly initialized build directory.
pub fn persist_settings(settings: &ResolvedSettings, overwrite: bool) -> crate::Result<()> {
    if !settings.build_dir.is_dir() {
        return Err(Error::MissingBuildDirectory(settings.build_dir.clone()));
    }
    settings.write_config(&settings.build_dir.join(CONFIG_FILENAME), overwrite)
}

/// Run the final command, or an interactive shell, inside `build_dir`.
pub fn enter(
    build_dir: &Path,
    mut env: EnvironmentSet,
    command: &[String],
    shell: &Path,
) -> crate::Result<i32> {
    if !build_dir.is_dir() {
        return Err(Error::MissingBuildDirectory(build_dir.to_path_buf()));
    }
    env.set("PWD", build_dir.display().to_string());

    let mut cmd = Command::new(shell);
    if command.is_empty() {
        if shell.file_name().is_some_and(|name| name == "bash") {
            // keep our PS1 instead of the user's rc file
            cmd.arg("--norc");
        }
        cmd.arg("-i");
        tracing::info!("Entering build environment in {}", build_dir.display());
    } else {
        cmd.arg("-c").arg(r#""$@""#).arg(shell).args(command);
        tracing::info!("Running {:?} in {}", command, build_dir.display());
    }
    cmd.current_dir(build_dir).env_clear().envs(env.iter());

    let status = cmd.status().map_err(|error| Error::SpawnFailed {
        program: shell.to_path_buf(),
        error,
    })?;
    Ok(exit_code(status))
}

/// Exit code of a finished child, using the shell's 128+N convention for signals.
fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}
