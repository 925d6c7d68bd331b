//! `alix-leds` subcommands.

mod config_cmd;
mod probe;
mod run;

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use alixled_lib::config::{self, Config, LedPlan, SlotAssignment};
pub(super) use alixled_lib::error::Result;

const PADDING: usize = 2;

/// Alignment width for key-value output: the longest key plus padding.
pub(super) fn kv_width(keys: &[&str]) -> usize {
    keys.iter().map(|k| k.len()).max().map_or(0, |m| m + PADDING)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{text}");
    Ok(())
}

// ── Shared plan arguments ──

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Configuration file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Assign a LED: SLOT=heartbeat|cpu|disk|net:LINKS[/SLAVES[/TUNNELS]] (repeatable)
    #[arg(short, long = "led", value_name = "SLOT=SPEC")]
    pub leds: Vec<String>,

    /// Start in fast mode
    #[arg(long)]
    pub fast: bool,
}

/// Load config from `path`, logging any parse warnings.
pub(super) fn load_config(path: &Path) -> Config {
    let (config, warnings) = Config::load_from(path);
    for w in &warnings {
        log::warn!("{w}");
    }
    config
}

/// Effective configuration: file, then `--led` overrides, then defaults.
pub(super) fn resolve(args: &PlanArgs) -> Result<(Config, LedPlan)> {
    let config = load_config(&args.config);
    let overrides = args
        .leds
        .iter()
        .map(|arg| config::parse_led_arg(arg))
        .collect::<config::Result<Vec<_>>>()?;
    let plan = LedPlan::resolve(&config, &overrides)?;
    Ok((config, plan))
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct SlotJson {
    pub led: usize,
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub slave: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tunnel: Vec<String>,
}

fn spec_names(list: &[config::IfaceSpec]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

impl SlotJson {
    pub fn new(led: usize, assignment: &SlotAssignment) -> Self {
        let (link, slave, tunnel) = match assignment {
            SlotAssignment::Network(n) => (
                spec_names(&n.link),
                spec_names(&n.slave),
                spec_names(&n.tunnel),
            ),
            _ => (Vec::new(), Vec::new(), Vec::new()),
        };
        SlotJson {
            led,
            mode: assignment.mode().map(|m| m.to_string()),
            link,
            slave,
            tunnel,
        }
    }
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: String,
    pub config_file_exists: bool,
    pub fast: bool,
    pub pidfile: String,
    pub leds: Vec<SlotJson>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Drive the LEDs (daemonizes unless --foreground)
    Run {
        #[command(flatten)]
        plan: PlanArgs,

        /// Stay in the foreground
        #[arg(short, long)]
        foreground: bool,

        /// Pid file written when daemonizing (overrides the config file)
        #[arg(short, long)]
        pidfile: Option<PathBuf>,
    },

    /// Show presence, admin and link state of interfaces
    Probe {
        /// Interfaces to query
        #[arg(required = true)]
        ifaces: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective LED configuration
    Config {
        #[command(flatten)]
        plan: PlanArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cmd: Command) -> Result<()> {
    match cmd {
        Command::Run {
            plan,
            foreground,
            pidfile,
        } => run::cmd_run(&plan, foreground, pidfile),
        Command::Probe { ifaces, json } => probe::cmd_probe(&ifaces, json),
        Command::Config { plan, json } => config_cmd::cmd_config(&plan, json),
    }
}
