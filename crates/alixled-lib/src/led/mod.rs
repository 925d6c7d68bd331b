//! LED behaviors: one small state machine per configured LED.
//!
//! A machine is stepped by the scheduler whenever its countdown elapses. It
//! writes the LED through [`StepCtx`] and returns how long to wait before the
//! next step. Every machine starts in an `Init` variant and leaves it on its
//! first step.

mod cpu;
mod disk;
mod heartbeat;
mod network;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::hw::{LedAddr, PortIo};
use crate::iface::Registry;

pub use cpu::{CpuLed, CpuState, cpu_off_time, cpu_on_time};
pub use disk::{DISK_ON, DISK_PERIOD, DiskLed, DiskState};
pub use heartbeat::{HEARTBEAT_PERIOD, HeartbeatLed, HeartbeatState};
pub use network::{Flash, NetState, NetworkLed};

/// Scheduler time unit.
pub type Micros = i64;

/// Base network LED step.
pub const BASE_PERIOD: Micros = 500_000;

/// Steps per network LED cycle.
pub const MAX_STEPS: u32 = 2;

/// `pct` percent of `period`.
pub fn fraction(period: Micros, pct: i64) -> Micros {
    period * pct / 100
}

/// What a LED slot shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedMode {
    Network,
    Heartbeat,
    Cpu,
    Disk,
}

impl fmt::Display for LedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedMode::Network => write!(f, "network"),
            LedMode::Heartbeat => write!(f, "heartbeat"),
            LedMode::Cpu => write!(f, "cpu"),
            LedMode::Disk => write!(f, "disk"),
        }
    }
}

/// Shared fast/slow flag, toggled from the signal boundary.
#[derive(Debug, Clone, Default)]
pub struct FastMode(Arc<AtomicBool>);

impl FastMode {
    pub fn new(fast: bool) -> Self {
        FastMode(Arc::new(AtomicBool::new(fast)))
    }

    pub fn is_fast(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Async-signal-safe: a single atomic store.
    pub fn set(&self, fast: bool) {
        self.0.store(fast, Ordering::Relaxed);
    }
}

/// Everything a machine may touch during one step.
pub struct StepCtx<'a> {
    io: &'a dyn PortIo,
    addr: LedAddr,
    pub registry: &'a Registry,
    pub fast: bool,
}

impl<'a> StepCtx<'a> {
    pub fn new(io: &'a dyn PortIo, addr: LedAddr, registry: &'a Registry, fast: bool) -> Self {
        StepCtx {
            io,
            addr,
            registry,
            fast,
        }
    }

    pub fn set(&self, on: bool) {
        self.io.set_led(self.addr, on);
    }

    pub fn on(&self) {
        self.set(true);
    }

    pub fn off(&self) {
        self.set(false);
    }
}

pub trait LedMachine {
    /// Advance one state; returns microseconds until the next step.
    fn step(&mut self, ctx: &StepCtx<'_>) -> Micros;
}

/// Behavior assigned to a slot.
pub enum Behavior {
    Unused,
    Network(NetworkLed),
    Heartbeat(HeartbeatLed),
    Cpu(CpuLed),
    Disk(DiskLed),
}

impl Behavior {
    pub fn mode(&self) -> Option<LedMode> {
        match self {
            Behavior::Unused => None,
            Behavior::Network(_) => Some(LedMode::Network),
            Behavior::Heartbeat(_) => Some(LedMode::Heartbeat),
            Behavior::Cpu(_) => Some(LedMode::Cpu),
            Behavior::Disk(_) => Some(LedMode::Disk),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Behavior::Unused)
    }

    pub fn machine_mut(&mut self) -> Option<&mut dyn LedMachine> {
        match self {
            Behavior::Unused => None,
            Behavior::Network(m) => Some(m),
            Behavior::Heartbeat(m) => Some(m),
            Behavior::Cpu(m) => Some(m),
            Behavior::Disk(m) => Some(m),
        }
    }
}
