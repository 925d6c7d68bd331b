//! Disk-activity LED: a short pulse for every period with storage
//! interrupts.

use std::path::Path;

use super::{LedMachine, Micros, StepCtx};
use crate::sampler::DiskSampler;

pub const DISK_PERIOD: Micros = 100_000;
pub const DISK_ON: Micros = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskState {
    Init,
    Idle,
    Pulse,
}

#[derive(Debug)]
pub struct DiskLed {
    sampler: DiskSampler,
    state: DiskState,
}

impl DiskLed {
    /// Read interrupt counts from `path` instead of `/proc/interrupts`.
    pub fn with_source(path: impl AsRef<Path>) -> Self {
        DiskLed {
            sampler: DiskSampler::with_path(path),
            state: DiskState::Init,
        }
    }

    pub fn state(&self) -> DiskState {
        self.state
    }
}

impl LedMachine for DiskLed {
    fn step(&mut self, ctx: &StepCtx<'_>) -> Micros {
        match self.state {
            DiskState::Init => {
                self.sampler.sample();
                ctx.off();
                self.state = DiskState::Idle;
                DISK_PERIOD
            }
            DiskState::Idle => {
                if self.sampler.sample() && self.sampler.active() {
                    ctx.on();
                    self.state = DiskState::Pulse;
                    DISK_ON
                } else {
                    ctx.off();
                    DISK_PERIOD
                }
            }
            DiskState::Pulse => {
                ctx.off();
                self.state = DiskState::Idle;
                DISK_PERIOD - DISK_ON
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::LED_ADDRS;
    use crate::hw::mock::MockPorts;
    use crate::iface::Registry;

    #[test]
    fn activity_gives_one_pulse_per_period() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interrupts");
        std::fs::write(&path, " 14: 100 IO-APIC ide0\n").unwrap();

        let io = MockPorts::new();
        let reg = Registry::new();
        let ctx = StepCtx::new(&io, LED_ADDRS[0], &reg, false);
        let mut led = DiskLed::with_source(&path);

        assert_eq!(led.step(&ctx), DISK_PERIOD);
        assert_eq!(io.level(LED_ADDRS[0]), Some(false));

        std::fs::write(&path, " 14: 104 IO-APIC ide0\n").unwrap();
        assert_eq!(led.step(&ctx), DISK_ON);
        assert_eq!(io.level(LED_ADDRS[0]), Some(true));
        assert_eq!(led.step(&ctx), 70_000);
        assert_eq!(io.level(LED_ADDRS[0]), Some(false));
        assert_eq!(led.state(), DiskState::Idle);
    }

    #[test]
    fn no_activity_stays_dark() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interrupts");
        std::fs::write(&path, " 14: 100 IO-APIC ide0\n").unwrap();

        let io = MockPorts::new();
        let reg = Registry::new();
        let ctx = StepCtx::new(&io, LED_ADDRS[0], &reg, false);
        let mut led = DiskLed::with_source(&path);
        for _ in 0..4 {
            assert_eq!(led.step(&ctx), DISK_PERIOD);
        }
        assert!(io.levels(LED_ADDRS[0]).iter().all(|&on| !on));
    }

    #[test]
    fn unreadable_source_stays_dark() {
        let io = MockPorts::new();
        let reg = Registry::new();
        let ctx = StepCtx::new(&io, LED_ADDRS[0], &reg, false);
        let mut led = DiskLed::with_source("/nonexistent/interrupts");
        led.step(&ctx);
        assert_eq!(led.step(&ctx), DISK_PERIOD);
        assert_eq!(led.state(), DiskState::Idle);
    }
}
