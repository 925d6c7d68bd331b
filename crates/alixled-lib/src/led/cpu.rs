//! CPU-load LED. Blinks slowly when idle and quickly under load.

use std::path::Path;

use super::{LedMachine, Micros, StepCtx};
use crate::sampler::CpuSampler;

/// Delay after seeding the sampler before the first real reading.
const SEED_DELAY: Micros = 100_000;

pub fn cpu_on_time(usage: u32) -> Micros {
    40_000 + (100 - usage.min(100)) as Micros * 4_600
}

pub fn cpu_off_time(usage: u32) -> Micros {
    60_000 + (100 - usage.min(100)) as Micros * 4_400
}

/// Blink cycles to run before the next re-sample.
fn resample_interval(prev: u32, usage: u32) -> u32 {
    if prev.abs_diff(usage) < 10 {
        1 + usage / 10
    } else {
        1 + usage / 50
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Init,
    On,
    Off,
}

#[derive(Debug)]
pub struct CpuLed {
    sampler: CpuSampler,
    state: CpuState,
    steps_left: u32,
    last_usage: u32,
}

impl CpuLed {
    /// Read uptime from `path` instead of `/proc/uptime`.
    pub fn with_source(path: impl AsRef<Path>) -> Self {
        CpuLed {
            sampler: CpuSampler::with_path(path),
            state: CpuState::Init,
            steps_left: 0,
            last_usage: 0,
        }
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn usage(&self) -> u32 {
        self.sampler.usage()
    }

    pub fn steps_left(&self) -> u32 {
        self.steps_left
    }

    fn resample(&mut self) {
        self.sampler.sample();
        let usage = self.sampler.usage();
        self.steps_left = resample_interval(self.last_usage, usage);
        self.last_usage = usage;
    }
}

impl LedMachine for CpuLed {
    fn step(&mut self, ctx: &StepCtx<'_>) -> Micros {
        match self.state {
            CpuState::Init => {
                self.sampler.sample();
                self.state = CpuState::Off;
                SEED_DELAY
            }
            CpuState::Off => {
                if self.steps_left == 0 {
                    self.resample();
                }
                self.steps_left = self.steps_left.saturating_sub(1);
                ctx.on();
                self.state = CpuState::On;
                cpu_on_time(self.sampler.usage())
            }
            CpuState::On => {
                ctx.off();
                self.state = CpuState::Off;
                cpu_off_time(self.sampler.usage())
            }
        }
    }
}
