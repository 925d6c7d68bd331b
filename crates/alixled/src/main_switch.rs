//! alix-switch: exit 0 if the ALIX front switch is pressed, 1 otherwise.

use std::process::ExitCode;

use alixled_lib::hw::IoPorts;
use alixled_lib::switch;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "alix-switch",
    version,
    about = "Check the ALIX front switch and exit 0 if it is pressed"
)]
struct Args {
    /// Blink the LEDs until the switch is released
    #[arg(short = 'l', long)]
    blink: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let io = match IoPorts::acquire() {
        Ok(io) => io,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if switch::check(&io, args.blink, std::thread::sleep) {
        log::info!("switch pressed");
        ExitCode::SUCCESS
    } else {
        log::info!("switch not pressed");
        ExitCode::FAILURE
    }
}
