// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Resolve settings, then enter the build environment.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use miette::Result;

/// Options of the single buildenv command
#[derive(Debug, Args)]
pub struct CmdEnter {
    /// Build directory to enter, or to create with --init
    #[clap(short = 'b', long)]
    pub build_dir: Option<String>,

    /// Extra configuration file, applied after the discovered ones
    #[clap(short = 'c', long = "config", env = "BUILDENV_CONFIG", value_delimiter = ':')]
    pub configs: Vec<String>,

    /// Trace the setup script and log debug output
    #[clap(short = 'd', long)]
    pub debug: bool,

    /// Initialize a new build directory
    #[clap(short = 'i', long)]
    pub init: bool,

    /// Argument for the initial setup script (repeatable)
    #[clap(short = 'a', long = "init-arg", allow_hyphen_values = true)]
    pub init_args: Vec<String>,

    /// Script to source when initializing
    #[clap(long)]
    pub init_setup_script: Option<String>,

    /// Directory holding the metadata layers
    #[clap(short = 'l', long)]
    pub layer_dir: Option<String>,

    /// Write the resolved settings to PATH and exit
    #[clap(short = 'o', long, value_name = "PATH")]
    pub output_config: Option<PathBuf>,

    /// Overwrite existing configuration files
    #[clap(short = 'f', long)]
    pub force: bool,

    /// Colon separated directories to prepend to PATH
    #[clap(short = 'p', long)]
    pub prepend_path: Option<String>,

    /// Script to source on normal invocations
    #[clap(short = 's', long)]
    pub setup_script: Option<String>,

    /// Label shown in the shell prompt
    #[clap(short = 'P', long)]
    pub prompt: Option<String>,

    /// Extra KEY=VALUE for the build environment (repeatable)
    #[clap(short = 'e', long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Only read the files given with --config
    #[clap(short = 'u', long)]
    pub user_conf_only: bool,

    /// Shell that sources the setup script and runs the command
    #[clap(long, env = "BUILDENV_SHELL", default_value = buildenv::invoke::DEFAULT_SHELL)]
    pub shell: PathBuf,

    /// Show what would be run without running it
    #[clap(long)]
    pub dry_run: bool,

    /// Command to run (default: interactive shell)
    #[clap(last = true)]
    pub command: Vec<String>,
}

impl CmdEnter {
    pub fn run(&mut self) -> Result<i32> {
        let host = buildenv::HostContext::from_process()?;

        let invocation = buildenv::Invocation {
            build_dir: self.build_dir.clone(),
            config_files: self.configs.clone(),
            debug: self.debug,
            init: self.init,
            init_args: self.init_args.clone(),
            init_setup_script: self.init_setup_script.clone(),
            layer_dir: self.layer_dir.clone(),
            setup_script: self.setup_script.clone(),
            shell_prompt: self.prompt.clone(),
            extra_env: self.env.clone(),
            user_conf_only: self.user_conf_only,
        };

        let resolution = buildenv::resolve_settings(&invocation, &host)?;
        let settings = &resolution.settings;

        if let Some(path) = &self.output_config {
            settings.write_config(path, self.force)?;
            println!("Wrote configuration to {}", path.display());
            return Ok(0);
        }

        let env_options = buildenv::EnvironmentOptions {
            prepend_path: self.prepend_path.clone(),
        };
        let env = buildenv::build_environment(settings, &host, &env_options)?;

        // Dry run: just show what would be used
        if self.dry_run {
            self.show(&resolution, &env)?;
            return Ok(0);
        }

        let options = buildenv::InvokeOptions {
            shell: self.shell.clone(),
            overwrite_config: self.force,
        };
        Ok(buildenv::run(settings, env, &self.command, &options)?)
    }

    fn show(&self, resolution: &buildenv::Resolution, env: &buildenv::EnvironmentSet) -> Result<()> {
        println!("{}", "Configuration files:".bold());
        for (i, candidate) in resolution.sources.iter().enumerate() {
            let path = candidate.path.display().to_string();
            let origin = format!("({})", candidate.origin);
            if candidate.path.is_file() {
                println!("  {}. {} {}", i + 1, path.cyan(), origin.dimmed());
            } else {
                println!("  {}. {} {}", i + 1, path.dimmed(), "(not found)".dimmed());
            }
        }
        for warning in &resolution.warnings {
            println!("  {} {}", "warning:".yellow(), warning);
        }
        println!();

        println!("{}", "Settings:".bold());
        let yaml = serde_yaml::to_string(&resolution.settings)
            .map_err(|e| miette::miette!("Failed to render settings: {e}"))?;
        for line in yaml.lines() {
            println!("  {line}");
        }
        println!();

        println!("{}", "Environment:".bold());
        for (name, value) in env.iter() {
            println!("  {}={}", name.cyan(), value.green());
        }
        println!();

        let script = resolution.settings.active_script();
        let args = buildenv::invoke::script_arguments(&resolution.settings);
        println!("{} {} {}", "Would source:".bold(), script.display(), args.join(" "));
        if self.command.is_empty() {
            println!("{} {}", "Then run:".bold(), self.shell.display());
        } else {
            println!("{} {}", "Then run:".bold(), self.command.join(" "));
        }

        Ok(())
    }
}
