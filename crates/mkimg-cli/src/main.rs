//! `mkimg`: the command-line entry point. Dispatches to one of four
//! verbs and has no domain logic of its own (see `SPEC_FULL.md` §4.7).

mod cli;
mod rom;
mod verbs;

use clap::Parser;
use mkimg_fat::FatVariant;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Covers bad/missing verbs, malformed arguments, `-h`/`--help`
            // and the literal word `help` alike: print usage and exit 0.
            let _ = err.print();
            std::process::exit(0);
        }
    };

    init_tracing(cli.verbose);

    let result = match &cli.command {
        Command::Disk { size_mib, out_path } => verbs::disk(*size_mib, out_path),
        Command::Fat16 { size_mib, src_dir } => verbs::fat(FatVariant::Fat16, *size_mib, src_dir),
        Command::Fat32 { size_mib, src_dir } => verbs::fat(FatVariant::Fat32, *size_mib, src_dir),
        Command::Rom => verbs::rom(),
        Command::Check { kernel_path } => verbs::check(kernel_path),
    };

    if let Err(err) = result {
        eprintln!("mkimg: {err}");
        std::process::exit(err.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "trace" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}
