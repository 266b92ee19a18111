//! Argument definitions and command dispatch.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser)]
#[command(name = "serulian", version, about = "The Serulian compiler")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose phase logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compiles an entrypoint file or directory into an ES5 bundle.
    Build {
        /// The entrypoint source file or directory.
        entrypoint: String,

        /// Library declarations, as `alias=path` or `alias=scm:url`.
        #[arg(long = "library", value_name = "ALIAS=PATH")]
        libraries: Vec<String>,

        /// Directories checked for VCS packages before any remote fetch.
        #[arg(long = "dev-dir", value_name = "DIR")]
        dev_directories: Vec<String>,
    },
}

pub fn dispatch(args: Args) -> ExitCode {
    match args.command {
        Command::Build {
            entrypoint,
            libraries,
            dev_directories,
        } => commands::build(entrypoint, libraries, dev_directories),
    }
}
