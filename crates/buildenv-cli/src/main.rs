// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! buildenv - Isolated Build Tool Environment CLI

use clap::Parser;
use miette::Result;

mod cmd_enter;

use cmd_enter::CmdEnter;

#[derive(Parser)]
#[clap(
    name = "buildenv",
    about = "Enter a build tool's setup script in an isolated environment",
    version,
    long_about = "Resolve settings from layered buildenv.conf files, source the build tool's \
                  setup script in a clean environment, then run a command or an interactive \
                  shell inside the build directory"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(flatten)]
    cmd: CmdEnter,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long)]
    quiet: bool,
}

impl Opt {
    fn run(mut self) -> Result<i32> {
        // Setup logging
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (_, _) if self.cmd.debug => tracing::Level::DEBUG,
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        self.cmd.run()
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run()?;
    std::process::exit(code);
}
