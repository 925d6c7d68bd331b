//! Network status LED.
//!
//! Reads three interface roles in priority order and maps them to a duty:
//! steady on when everything is up, two quick flashes when only the tunnel is
//! down, 50 % blinking with just the link, off without link. Any status
//! change is shown as one brief flash instead, so a transition is always
//! visible.

use super::{BASE_PERIOD, LedMachine, MAX_STEPS, Micros, StepCtx, fraction};
use crate::iface::{Group, Registry, RoleStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetState {
    /// Just configured.
    Init,
    /// Regular step; re-reads the roles at the top of each cycle.
    Poll,
    /// Inverse level inside a flash.
    FlashInverse,
    /// Second base-level phase of a double flash.
    FlashBase,
    /// Closing inverse phase of a double flash.
    FlashLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    None,
    Single,
    Double,
}

pub struct NetworkLed {
    link: Group,
    slave: Group,
    tunnel: Group,
    state: NetState,
    count: u32,
    limit: u32,
    flash: Flash,
    /// Level of the step a flash was inserted into.
    base: bool,
}

impl NetworkLed {
    pub fn new(link: Group, slave: Group, tunnel: Group) -> Self {
        NetworkLed {
            link,
            slave,
            tunnel,
            state: NetState::Init,
            count: 0,
            limit: 0,
            flash: Flash::None,
            base: false,
        }
    }

    pub fn state(&self) -> NetState {
        self.state
    }

    /// Current duty limit, in steps out of [`MAX_STEPS`].
    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn flash(&self) -> Flash {
        self.flash
    }

    pub fn link(&self) -> &Group {
        &self.link
    }

    fn evaluate(&mut self, registry: &Registry) {
        let link = self.link.status(registry);
        let slave = self.slave.status(registry);
        let tunnel = self.tunnel.status(registry);
        let (limit, flash) = plan(link, slave, tunnel);
        self.limit = limit;
        self.flash = flash;
    }

    fn poll(&mut self, ctx: &StepCtx<'_>) -> Micros {
        if self.count == 0 {
            self.evaluate(ctx.registry);
        }
        let step = self.count;
        self.count = (self.count + 1) % MAX_STEPS;

        let base = step < self.limit;
        ctx.set(base);
        if step != MAX_STEPS - 1 {
            return BASE_PERIOD;
        }
        self.base = base;
        match self.flash {
            Flash::None => BASE_PERIOD,
            Flash::Single => {
                self.state = NetState::FlashInverse;
                fraction(BASE_PERIOD, 85)
            }
            Flash::Double => {
                self.state = NetState::FlashInverse;
                fraction(BASE_PERIOD, 45)
            }
        }
    }
}

/// Duty limit and flash plan for one evaluation.
///
/// Changes on several roles in the same evaluation still give one flash.
pub fn plan(link: RoleStatus, slave: RoleStatus, tunnel: RoleStatus) -> (u32, Flash) {
    let (limit, flash) = match (link.up, slave.up, tunnel.up) {
        (true, true, true) => (MAX_STEPS, Flash::None),
        (true, true, false) => (MAX_STEPS, Flash::Double),
        (true, false, _) => (MAX_STEPS / 2, Flash::None),
        (false, _, _) => (0, Flash::None),
    };
    if link.changed || slave.changed || tunnel.changed {
        (limit, Flash::Single)
    } else {
        (limit, flash)
    }
}

impl LedMachine for NetworkLed {
    fn step(&mut self, ctx: &StepCtx<'_>) -> Micros {
        match self.state {
            NetState::Init => {
                self.count = 0;
                self.state = NetState::Poll;
                self.poll(ctx)
            }
            NetState::Poll => self.poll(ctx),
            NetState::FlashInverse => {
                ctx.set(!self.base);
                self.state = if self.flash == Flash::Double {
                    NetState::FlashBase
                } else {
                    NetState::Poll
                };
                fraction(BASE_PERIOD, 15)
            }
            NetState::FlashBase => {
                ctx.set(self.base);
                self.state = NetState::FlashLast;
                fraction(BASE_PERIOD, 25)
            }
            NetState::FlashLast => {
                ctx.set(!self.base);
                self.state = NetState::Poll;
                fraction(BASE_PERIOD, 15)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::LED_ADDRS;
    use crate::hw::mock::MockPorts;
    use crate::iface::Checks;
    use crate::iface::mock::MockNet;

    const UP: RoleStatus = RoleStatus {
        up: true,
        changed: false,
    };
    const DOWN: RoleStatus = RoleStatus {
        up: false,
        changed: false,
    };
    const CHANGED_UP: RoleStatus = RoleStatus {
        up: true,
        changed: true,
    };

    struct Rig {
        net: MockNet,
        reg: Registry,
        io: MockPorts,
        led: NetworkLed,
    }

    impl Rig {
        fn new() -> Self {
            let mut reg = Registry::new();
            let mut link = Group::new();
            let mut slave = Group::new();
            let mut tunnel = Group::new();
            link.push(reg.register("eth0", Checks::LINK_UP).unwrap(), Checks::LINK_UP);
            slave.push(reg.register("ppp0", Checks::ADMIN_UP).unwrap(), Checks::ADMIN_UP);
            tunnel.push(reg.register("tun0", Checks::ADMIN_UP).unwrap(), Checks::ADMIN_UP);
            Rig {
                net: MockNet::new(),
                reg,
                io: MockPorts::new(),
                led: NetworkLed::new(link, slave, tunnel),
            }
        }

        fn step(&mut self) -> Micros {
            self.reg.probe_all(&self.net);
            let ctx = StepCtx::new(&self.io, LED_ADDRS[2], &self.reg, false);
            self.led.step(&ctx)
        }

        /// Step through one full cycle, returning (level, delay) pairs.
        fn cycle(&mut self) -> Vec<(bool, Micros)> {
            let mut out = Vec::new();
            loop {
                let delay = self.step();
                let level = self.io.level(LED_ADDRS[2]).unwrap();
                out.push((level, delay));
                if self.led.state() == NetState::Poll && self.led.count == 0 {
                    return out;
                }
            }
        }
    }

    #[test]
    fn plan_all_up_is_steady_on() {
        assert_eq!(plan(UP, UP, UP), (MAX_STEPS, Flash::None));
    }

    #[test]
    fn plan_tunnel_down_flashes_twice() {
        assert_eq!(plan(UP, UP, DOWN), (MAX_STEPS, Flash::Double));
    }

    #[test]
    fn plan_link_only_is_half_duty() {
        assert_eq!(plan(UP, DOWN, UP), (MAX_STEPS / 2, Flash::None));
        assert_eq!(plan(UP, DOWN, DOWN), (MAX_STEPS / 2, Flash::None));
    }

    #[test]
    fn plan_link_down_is_off() {
        assert_eq!(plan(DOWN, UP, UP), (0, Flash::None));
    }

    #[test]
    fn plan_change_overrides_double_flash() {
        assert_eq!(plan(UP, CHANGED_UP, DOWN), (MAX_STEPS, Flash::Single));
    }

    #[test]
    fn init_goes_straight_to_poll() {
        let mut rig = Rig::new();
        assert_eq!(rig.led.state(), NetState::Init);
        rig.step();
        assert_eq!(rig.led.state(), NetState::Poll);
    }

    #[test]
    fn all_up_cycle_is_steady_on() {
        let mut rig = Rig::new();
        for name in ["eth0", "ppp0", "tun0"] {
            rig.net.bring_up(name);
        }
        assert_eq!(
            rig.cycle(),
            vec![(true, BASE_PERIOD), (true, BASE_PERIOD)]
        );
    }

    #[test]
    fn link_only_cycle_blinks_half() {
        let mut rig = Rig::new();
        rig.net.bring_up("eth0");
        assert_eq!(
            rig.cycle(),
            vec![(true, BASE_PERIOD), (false, BASE_PERIOD)]
        );
        assert_eq!(rig.led.limit(), MAX_STEPS / 2);
    }

    #[test]
    fn link_down_cycle_is_off() {
        let mut rig = Rig::new();
        rig.net.bring_up("ppp0");
        rig.net.bring_up("tun0");
        assert_eq!(
            rig.cycle(),
            vec![(false, BASE_PERIOD), (false, BASE_PERIOD)]
        );
        assert_eq!(rig.led.limit(), 0);
    }

    #[test]
    fn tunnel_down_cycle_has_double_flash() {
        let mut rig = Rig::new();
        rig.net.bring_up("eth0");
        rig.net.bring_up("ppp0");
        let cycle = rig.cycle();
        assert_eq!(
            cycle,
            vec![
                (true, BASE_PERIOD),
                (true, 225_000),
                (false, 75_000),
                (true, 125_000),
                (false, 75_000),
            ]
        );
        let flash_time: Micros = cycle[1..].iter().map(|&(_, d)| d).sum();
        assert_eq!(flash_time, BASE_PERIOD);
    }

    #[test]
    fn link_loss_flashes_once_then_goes_dark() {
        let mut rig = Rig::new();
        for name in ["eth0", "ppp0", "tun0"] {
            rig.net.bring_up(name);
        }
        rig.cycle();

        rig.net.remove("eth0");
        assert_eq!(
            rig.cycle(),
            vec![(false, BASE_PERIOD), (false, 425_000), (true, 75_000)]
        );
        assert_eq!(
            rig.cycle(),
            vec![(false, BASE_PERIOD), (false, BASE_PERIOD)]
        );
    }

    #[test]
    fn first_cycle_has_no_transition_flash() {
        let mut rig = Rig::new();
        rig.net.bring_up("eth0");
        rig.cycle();
        assert_eq!(rig.led.flash(), Flash::None);
    }
}
