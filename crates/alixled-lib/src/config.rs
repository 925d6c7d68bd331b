//! Configuration: TOML file, `--led` arguments and the validated LED plan.
//!
//! The file and the command line both produce [`SlotAssignment`]s; they are
//! combined into a [`LedPlan`] which the scheduler consumes. Nothing here
//! touches hardware, so every error is reported before the LEDs are driven.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::iface::{Checks, validate_name};
use crate::led::LedMode;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/alix-leds.toml";
pub const DEFAULT_PIDFILE: &str = "/var/run/alix-leds.pid";

/// Number of front-panel LEDs.
pub const SLOTS: usize = 3;

// ── Errors ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two different behaviors were assigned to the same LED.
    SlotConflict {
        slot: usize,
        existing: LedMode,
        requested: LedMode,
    },
    /// LED number outside `1..=3` or not a number.
    InvalidSlot(String),
    /// Malformed LED specification.
    InvalidSpec(String),
    /// Interface name the kernel could never list.
    InvalidInterface(String),
    TooManyInterfaces { limit: usize },
    /// A network LED without any interface to watch.
    NoInterfaces { slot: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::SlotConflict {
                slot,
                existing,
                requested,
            } => write!(
                f,
                "LED{slot} is already configured as {existing}, cannot also be {requested}"
            ),
            ConfigError::InvalidSlot(s) => write!(f, "Invalid LED number: {s}"),
            ConfigError::InvalidSpec(s) => write!(f, "Invalid LED specification: {s}"),
            ConfigError::InvalidInterface(s) => write!(f, "Invalid interface: {s}"),
            ConfigError::TooManyInterfaces { limit } => {
                write!(f, "Too many interfaces (at most {limit})")
            }
            ConfigError::NoInterfaces { slot } => {
                write!(f, "LED{slot} is a network LED without interfaces")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ── Interface specs ──

/// Position of an interface list inside a network LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Link,
    Slave,
    Tunnel,
}

impl Role {
    /// Checks applied when a name carries no `@` suffix.
    pub fn default_checks(self) -> Checks {
        match self {
            Role::Link => Checks::LINK_UP,
            Role::Slave | Role::Tunnel => Checks::ADMIN_UP,
        }
    }
}

/// An interface name plus the checks one LED requires of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfaceSpec {
    pub name: String,
    pub checks: Checks,
}

impl IfaceSpec {
    /// Parse `name` or `name@present|up|link|both`.
    pub fn parse(text: &str, role: Role) -> Result<Self> {
        let (name, checks) = match text.split_once('@') {
            None => (text, role.default_checks()),
            Some((name, suffix)) => {
                let checks = match suffix {
                    "present" => Checks::PRESENT,
                    "up" => Checks::ADMIN_UP,
                    "link" => Checks::LINK_UP,
                    "both" => Checks::BOTH,
                    _ => {
                        return Err(ConfigError::InvalidSpec(format!(
                            "{text}: unknown check '{suffix}' (expected present, up, link or both)"
                        )));
                    }
                };
                (name, checks)
            }
        };
        validate_name(name)?;
        Ok(IfaceSpec {
            name: name.to_string(),
            checks,
        })
    }
}

impl fmt::Display for IfaceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.checks)
    }
}

fn parse_list<S: AsRef<str>>(items: &[S], role: Role) -> Result<Vec<IfaceSpec>> {
    items
        .iter()
        .map(|s| IfaceSpec::parse(s.as_ref().trim(), role))
        .collect()
}

// ── Slot assignments ──

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkSpec {
    pub link: Vec<IfaceSpec>,
    pub slave: Vec<IfaceSpec>,
    pub tunnel: Vec<IfaceSpec>,
}

impl NetworkSpec {
    pub fn is_empty(&self) -> bool {
        self.link.is_empty() && self.slave.is_empty() && self.tunnel.is_empty()
    }

    fn merge(&mut self, other: NetworkSpec) {
        self.link.extend(other.link);
        self.slave.extend(other.slave);
        self.tunnel.extend(other.tunnel);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SlotAssignment {
    #[default]
    Unused,
    Network(NetworkSpec),
    Heartbeat,
    Cpu,
    Disk,
}

impl SlotAssignment {
    pub fn mode(&self) -> Option<LedMode> {
        match self {
            SlotAssignment::Unused => None,
            SlotAssignment::Network(_) => Some(LedMode::Network),
            SlotAssignment::Heartbeat => Some(LedMode::Heartbeat),
            SlotAssignment::Cpu => Some(LedMode::Cpu),
            SlotAssignment::Disk => Some(LedMode::Disk),
        }
    }
}

fn slot_index(slot: usize) -> Result<usize> {
    if (1..=SLOTS).contains(&slot) {
        Ok(slot - 1)
    } else {
        Err(ConfigError::InvalidSlot(format!("{slot} (expected 1-{SLOTS})")))
    }
}

/// Parse a `--led` argument: `SLOT=heartbeat|cpu|disk|net:LINKS[/SLAVES[/TUNNELS]]`.
pub fn parse_led_arg(arg: &str) -> Result<(usize, SlotAssignment)> {
    let Some((slot, spec)) = arg.split_once('=') else {
        return Err(ConfigError::InvalidSpec(format!("{arg}: expected SLOT=SPEC")));
    };
    let slot = slot
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidSlot(slot.to_string()))?;
    slot_index(slot)?;

    let assignment = match spec.trim() {
        "heartbeat" => SlotAssignment::Heartbeat,
        "cpu" => SlotAssignment::Cpu,
        "disk" => SlotAssignment::Disk,
        other => match other.strip_prefix("net:") {
            Some(lists) => SlotAssignment::Network(parse_net_lists(lists)?),
            None => {
                return Err(ConfigError::InvalidSpec(format!(
                    "{other}: expected heartbeat, cpu, disk or net:LINKS[/SLAVES[/TUNNELS]]"
                )));
            }
        },
    };
    Ok((slot, assignment))
}

fn parse_net_lists(lists: &str) -> Result<NetworkSpec> {
    let parts: Vec<&str> = lists.split('/').collect();
    if parts.len() > 3 {
        return Err(ConfigError::InvalidSpec(format!(
            "net:{lists}: at most three interface lists"
        )));
    }
    let roles = [Role::Link, Role::Slave, Role::Tunnel];
    let mut spec = NetworkSpec::default();
    for (part, role) in parts.iter().zip(roles) {
        let names: Vec<&str> = part.split(',').filter(|s| !s.trim().is_empty()).collect();
        let list = parse_list(&names, role)?;
        match role {
            Role::Link => spec.link = list,
            Role::Slave => spec.slave = list,
            Role::Tunnel => spec.tunnel = list,
        }
    }
    Ok(spec)
}

// ── LED plan ──

/// What each of the three LEDs shows, LED1 first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedPlan {
    slots: [SlotAssignment; SLOTS],
}

impl LedPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// LED3 watching `eth2`, `ppp0` and `tun0`.
    pub fn default_plan() -> Self {
        let mut plan = Self::new();
        plan.slots[2] = SlotAssignment::Network(NetworkSpec {
            link: vec![IfaceSpec {
                name: "eth2".into(),
                checks: Role::Link.default_checks(),
            }],
            slave: vec![IfaceSpec {
                name: "ppp0".into(),
                checks: Role::Slave.default_checks(),
            }],
            tunnel: vec![IfaceSpec {
                name: "tun0".into(),
                checks: Role::Tunnel.default_checks(),
            }],
        });
        plan
    }

    /// Add `assignment` to LED `slot` (1-based).
    ///
    /// A second network assignment appends its interfaces; repeating another
    /// behavior is a no-op; a different behavior is a conflict.
    pub fn assign(&mut self, slot: usize, assignment: SlotAssignment) -> Result<()> {
        let idx = slot_index(slot)?;
        let current = &mut self.slots[idx];
        match (current.mode(), assignment.mode()) {
            (_, None) => Ok(()),
            (None, Some(_)) => {
                *current = assignment;
                Ok(())
            }
            (Some(existing), Some(requested)) if existing != requested => {
                Err(ConfigError::SlotConflict {
                    slot,
                    existing,
                    requested,
                })
            }
            _ => {
                if let (SlotAssignment::Network(cur), SlotAssignment::Network(new)) =
                    (current, assignment)
                {
                    cur.merge(new);
                }
                Ok(())
            }
        }
    }

    /// Overwrite LED `slot`, dropping whatever was there.
    pub fn replace(&mut self, slot: usize, assignment: SlotAssignment) -> Result<()> {
        let idx = slot_index(slot)?;
        self.slots[idx] = assignment;
        Ok(())
    }

    pub fn slot(&self, slot: usize) -> Option<&SlotAssignment> {
        slot.checked_sub(1).and_then(|i| self.slots.get(i))
    }

    pub fn slots(&self) -> &[SlotAssignment; SLOTS] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| *s == SlotAssignment::Unused)
    }

    pub fn validate(&self) -> Result<()> {
        for (i, slot) in self.slots.iter().enumerate() {
            if matches!(slot, SlotAssignment::Network(spec) if spec.is_empty()) {
                return Err(ConfigError::NoInterfaces { slot: i + 1 });
            }
        }
        Ok(())
    }

    /// Combine the file plan with `--led` overrides.
    ///
    /// The first override for a slot replaces the file's assignment, later
    /// ones for the same slot merge with it. With nothing configured at all
    /// the default plan applies.
    pub fn resolve(config: &Config, overrides: &[(usize, SlotAssignment)]) -> Result<Self> {
        let mut plan = config.to_plan()?;
        let mut overridden = [false; SLOTS];
        for (slot, assignment) in overrides {
            let idx = slot_index(*slot)?;
            if overridden[idx] {
                plan.assign(*slot, assignment.clone())?;
            } else {
                plan.replace(*slot, assignment.clone())?;
                overridden[idx] = true;
            }
        }
        if plan.is_empty() {
            log::info!("no LED configured, using defaults");
            plan = Self::default_plan();
        }
        plan.validate()?;
        Ok(plan)
    }
}

// ── TOML file ──

/// One `[ledN]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedConfig {
    pub mode: LedMode,
    #[serde(default)]
    pub link: Vec<String>,
    #[serde(default)]
    pub slave: Vec<String>,
    #[serde(default)]
    pub tunnel: Vec<String>,
}

impl LedConfig {
    fn to_assignment(&self, slot: usize) -> Result<SlotAssignment> {
        let has_lists = !(self.link.is_empty() && self.slave.is_empty() && self.tunnel.is_empty());
        let assignment = match self.mode {
            LedMode::Network => SlotAssignment::Network(NetworkSpec {
                link: parse_list(&self.link, Role::Link)?,
                slave: parse_list(&self.slave, Role::Slave)?,
                tunnel: parse_list(&self.tunnel, Role::Tunnel)?,
            }),
            mode if has_lists => {
                return Err(ConfigError::InvalidSpec(format!(
                    "led{slot}: interface lists only apply to network mode, not {mode}"
                )));
            }
            LedMode::Heartbeat => SlotAssignment::Heartbeat,
            LedMode::Cpu => SlotAssignment::Cpu,
            LedMode::Disk => SlotAssignment::Disk,
        };
        Ok(assignment)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Start in fast mode (heartbeat at 10 Hz).
    #[serde(default)]
    pub fast: bool,

    /// Where the daemon writes its pid.
    #[serde(default = "default_pidfile")]
    pub pidfile: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led1: Option<LedConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led2: Option<LedConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led3: Option<LedConfig>,
}

fn default_pidfile() -> PathBuf {
    PathBuf::from(DEFAULT_PIDFILE)
}

impl Default for Config {
    fn default() -> Self {
        Config {
            fast: false,
            pidfile: default_pidfile(),
            led1: None,
            led2: None,
            led3: None,
        }
    }
}

impl Config {
    /// Load config from `path`, returning the config and any warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if it exists but can't be read or parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => (Self::default(), vec![]),
            Err(e) => {
                let warning = format!("cannot read config ({}): {e}", path.display());
                (Self::default(), vec![warning])
            }
        }
    }

    pub fn leds(&self) -> [Option<&LedConfig>; SLOTS] {
        [self.led1.as_ref(), self.led2.as_ref(), self.led3.as_ref()]
    }

    /// Validate the `[ledN]` tables into a plan. Does not apply defaults.
    pub fn to_plan(&self) -> Result<LedPlan> {
        let mut plan = LedPlan::new();
        for (i, led) in self.leds().into_iter().enumerate() {
            if let Some(led) = led {
                plan.assign(i + 1, led.to_assignment(i + 1)?)?;
            }
        }
        Ok(plan)
    }
}
