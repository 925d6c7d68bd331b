//! alix-leds: drives the ALIX front-panel LEDs from system state.

use std::sync::atomic::AtomicBool;

use clap::Parser;

mod cli;
mod daemon;
mod signals;

/// Shared shutdown flag, cleared by the SIGINT/SIGTERM handler.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Parser)]
#[command(
    name = "alix-leds",
    version,
    about = "Status LED daemon for PC Engines ALIX boards"
)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: cli::Command,
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);

    if let Err(e) = cli::run(args.command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
