//! Heartbeat LED: 40 % on over a one second period, or a 100 ms blink in
//! fast mode.

use super::{LedMachine, Micros, StepCtx, fraction};

pub const HEARTBEAT_PERIOD: Micros = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatState {
    Init,
    On,
    Off,
}

#[derive(Debug)]
pub struct HeartbeatLed {
    state: HeartbeatState,
}

impl HeartbeatLed {
    pub fn new() -> Self {
        HeartbeatLed {
            state: HeartbeatState::Init,
        }
    }

    pub fn state(&self) -> HeartbeatState {
        self.state
    }
}

impl Default for HeartbeatLed {
    fn default() -> Self {
        Self::new()
    }
}

fn on_time(fast: bool) -> Micros {
    fraction(HEARTBEAT_PERIOD, if fast { 5 } else { 40 })
}

fn off_time(fast: bool) -> Micros {
    fraction(HEARTBEAT_PERIOD, if fast { 5 } else { 60 })
}

impl LedMachine for HeartbeatLed {
    fn step(&mut self, ctx: &StepCtx<'_>) -> Micros {
        match self.state {
            HeartbeatState::Init | HeartbeatState::Off => {
                ctx.on();
                self.state = HeartbeatState::On;
                on_time(ctx.fast)
            }
            HeartbeatState::On => {
                ctx.off();
                self.state = HeartbeatState::Off;
                off_time(ctx.fast)
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

    fn run(led: &mut HeartbeatLed, io: &MockPorts, fast: bool, steps: usize) -> Vec<Micros> {
        let reg = Registry::new();
        let ctx = StepCtx::new(io, LED_ADDRS[0], &reg, fast);
        (0..steps).map(|_| led.step(&ctx)).collect()
    }

    #[test]
    fn normal_period_is_forty_sixty() {
        let io = MockPorts::new();
        let mut led = HeartbeatLed::new();
        assert_eq!(
            run(&mut led, &io, false, 4),
            vec![400_000, 600_000, 400_000, 600_000]
        );
        assert_eq!(io.levels(LED_ADDRS[0]), vec![true, false, true, false]);
    }

    #[test]
    fn fast_mode_blinks_at_ten_hertz() {
        let io = MockPorts::new();
        let mut led = HeartbeatLed::new();
        assert_eq!(run(&mut led, &io, true, 2), vec![50_000, 50_000]);
    }

    #[test]
    fn fast_mode_applies_on_next_step() {
        let io = MockPorts::new();
        let mut led = HeartbeatLed::new();
        run(&mut led, &io, false, 1);
        assert_eq!(led.state(), HeartbeatState::On);
        assert_eq!(run(&mut led, &io, true, 1), vec![50_000]);
    }
}
