//! Cooperative mini-scheduler driving the three LED slots.
//!
//! Each slot carries a countdown in microseconds. A tick steps every slot
//! whose countdown elapsed and reports how long the caller may sleep; after
//! sleeping, the caller subtracts the slept time with [`SchedulerState::elapse`].
//! Interface probing is a fourth, hidden task with its own countdown.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::{self, IfaceSpec, LedPlan, SLOTS, SlotAssignment};
use crate::hw::{self, HwError, LED_ADDRS, LedAddr, PortIo};
use crate::iface::{Checks, Group, Interface, NetSource, Registry};
use crate::led::{
    BASE_PERIOD, Behavior, CpuLed, DiskLed, FastMode, HeartbeatLed, LedMode, MAX_STEPS, Micros,
    NetworkLed, StepCtx,
};
use crate::sampler::{PROC_INTERRUPTS, PROC_UPTIME};

/// Upper bound for a single sleep.
pub const MAX_SLEEP: Micros = 1_000_000;

/// Interval between interface probes: one network LED cycle.
pub const PROBE_PERIOD: Micros = BASE_PERIOD * MAX_STEPS as Micros;

/// Counter files read by the CPU and disk LEDs.
#[derive(Debug, Clone)]
pub struct Sources {
    pub uptime: PathBuf,
    pub interrupts: PathBuf,
}

impl Default for Sources {
    fn default() -> Self {
        Sources {
            uptime: PathBuf::from(PROC_UPTIME),
            interrupts: PathBuf::from(PROC_INTERRUPTS),
        }
    }
}

pub struct Slot {
    pub addr: LedAddr,
    countdown: Micros,
    behavior: Behavior,
}

impl Slot {
    pub fn countdown(&self) -> Micros {
        self.countdown
    }

    pub fn mode(&self) -> Option<LedMode> {
        self.behavior.mode()
    }

    pub fn is_active(&self) -> bool {
        self.behavior.is_active()
    }
}

pub struct SchedulerState<P: PortIo, N: NetSource> {
    slots: [Slot; SLOTS],
    registry: Registry,
    net: N,
    io: P,
    /// `None` when no slot shows network status.
    probe_countdown: Option<Micros>,
    fast: FastMode,
}

fn build_group(specs: &[IfaceSpec], registry: &mut Registry) -> config::Result<Group> {
    let mut group = Group::new();
    for spec in specs {
        let id = registry.register(&spec.name, spec.checks)?;
        group.push(id, spec.checks);
    }
    Ok(group)
}

fn build_behavior(
    assignment: &SlotAssignment,
    registry: &mut Registry,
    sources: &Sources,
) -> config::Result<Behavior> {
    let behavior = match assignment {
        SlotAssignment::Unused => Behavior::Unused,
        SlotAssignment::Network(spec) => Behavior::Network(NetworkLed::new(
            build_group(&spec.link, registry)?,
            build_group(&spec.slave, registry)?,
            build_group(&spec.tunnel, registry)?,
        )),
        SlotAssignment::Heartbeat => Behavior::Heartbeat(HeartbeatLed::new()),
        SlotAssignment::Cpu => Behavior::Cpu(CpuLed::with_source(&sources.uptime)),
        SlotAssignment::Disk => Behavior::Disk(DiskLed::with_source(&sources.interrupts)),
    };
    Ok(behavior)
}

impl<P: PortIo, N: NetSource> SchedulerState<P, N> {
    pub fn new(plan: &LedPlan, io: P, net: N, fast: FastMode) -> config::Result<Self> {
        Self::with_sources(plan, io, net, fast, &Sources::default())
    }

    /// Build the slots from `plan`, registering every referenced interface.
    pub fn with_sources(
        plan: &LedPlan,
        io: P,
        net: N,
        fast: FastMode,
        sources: &Sources,
    ) -> config::Result<Self> {
        let mut registry = Registry::new();
        let assignments = plan.slots();
        let mut build = |i: usize| -> config::Result<Slot> {
            Ok(Slot {
                addr: LED_ADDRS[i],
                countdown: 0,
                behavior: build_behavior(&assignments[i], &mut registry, sources)?,
            })
        };
        let slots = [build(0)?, build(1)?, build(2)?];

        for (i, slot) in slots.iter().enumerate() {
            match slot.mode() {
                Some(mode) => log::info!("LED{}: {mode}", i + 1),
                None => log::debug!("LED{}: unused", i + 1),
            }
        }

        let probe_countdown = slots
            .iter()
            .any(|s| s.mode() == Some(LedMode::Network))
            .then_some(0);

        Ok(SchedulerState {
            slots,
            registry,
            net,
            io,
            probe_countdown,
            fast,
        })
    }

    /// Query the link of the first link interface once.
    ///
    /// Only `EPERM` is fatal: the daemon would otherwise run with every link
    /// reading as down. Other errors (e.g. the interface is absent) pass.
    pub fn check_link_permission(&self) -> hw::Result<()> {
        let first = self.slots.iter().find_map(|slot| match &slot.behavior {
            Behavior::Network(led) => led.link().members().first(),
            _ => None,
        });
        let Some(member) = first else {
            return Ok(());
        };
        let name = &self.registry.get(member.id).name;
        match self.net.link_up(name) {
            Err(e) if e.raw_os_error() == Some(libc::EPERM) => Err(HwError::LinkProbeDenied {
                iface: name.clone(),
                source: e,
            }),
            Err(e) => {
                log::debug!("link probe on {name}: {e}");
                Ok(())
            }
            Ok(_) => Ok(()),
        }
    }

    /// Run every task that is due and return the time until the next one.
    pub fn tick(&mut self) -> Micros {
        if let Some(countdown) = self.probe_countdown {
            if countdown <= 0 {
                self.registry.probe_all(&self.net);
                self.probe_countdown = Some(PROBE_PERIOD);
            }
        }

        let fast = self.fast.is_fast();
        for slot in &mut self.slots {
            if slot.countdown > 0 {
                continue;
            }
            let Some(machine) = slot.behavior.machine_mut() else {
                continue;
            };
            let ctx = StepCtx::new(&self.io, slot.addr, &self.registry, fast);
            slot.countdown = machine.step(&ctx);
        }

        self.next_sleep()
    }

    /// Smallest pending countdown, clamped to `[0, MAX_SLEEP]`.
    pub fn next_sleep(&self) -> Micros {
        self.slots
            .iter()
            .filter(|s| s.is_active())
            .map(|s| s.countdown)
            .chain(self.probe_countdown)
            .min()
            .unwrap_or(MAX_SLEEP)
            .clamp(0, MAX_SLEEP)
    }

    /// Account for `us` microseconds of elapsed time.
    pub fn elapse(&mut self, us: Micros) {
        for slot in self.slots.iter_mut().filter(|s| s.is_active()) {
            slot.countdown = slot.countdown.saturating_sub(us);
        }
        if let Some(countdown) = self.probe_countdown.as_mut() {
            *countdown = countdown.saturating_sub(us);
        }
    }

    /// Drive the loop until `running` clears, then switch the LEDs off.
    ///
    /// Countdowns are charged with the wall-clock time measured around each
    /// sleep, not the requested sleep, so oversleeping and time spent in
    /// `tick` are both accounted for. Each slot and the probe task re-arm
    /// from their own countdown, so the probe is not phase-locked to a
    /// network LED's poll step and the two may drift apart over long runs.
    pub fn run(&mut self, running: &AtomicBool) {
        let mut last = Instant::now();
        while running.load(Ordering::SeqCst) {
            let sleep = self.tick();
            std::thread::sleep(Duration::from_micros(sleep.unsigned_abs()));
            let now = Instant::now();
            let elapsed =
                Micros::try_from(now.duration_since(last).as_micros()).unwrap_or(Micros::MAX);
            self.elapse(elapsed);
            last = now;
        }
        self.shutdown();
    }

    /// Switch every configured LED off.
    pub fn shutdown(&self) {
        for slot in self.slots.iter().filter(|s| s.is_active()) {
            self.io.set_led(slot.addr, false);
        }
    }

    pub fn slots(&self) -> &[Slot; SLOTS] {
        &self.slots
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn io(&self) -> &P {
        &self.io
    }

    pub fn net(&self) -> &N {
        &self.net
    }

    pub fn fast(&self) -> &FastMode {
        &self.fast
    }

    pub fn probe_countdown(&self) -> Option<Micros> {
        self.probe_countdown
    }
}

/// Probe `names` once and return their state, in the given order.
pub fn probe_names(names: &[String], net: &impl NetSource) -> config::Result<Vec<Interface>> {
    let mut registry = Registry::new();
    for name in names {
        registry.register(name, Checks::BOTH)?;
    }
    registry.probe_all(net);
    Ok(registry.iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_led_arg;
    use crate::hw::mock::MockPorts;
    use crate::iface::mock::MockNet;

    fn plan(args: &[&str]) -> LedPlan {
        let mut plan = LedPlan::new();
        for arg in args {
            let (slot, a) = parse_led_arg(arg).unwrap();
            plan.assign(slot, a).unwrap();
        }
        plan
    }

    fn sched(args: &[&str]) -> SchedulerState<MockPorts, MockNet> {
        SchedulerState::with_sources(
            &plan(args),
            MockPorts::new(),
            MockNet::new(),
            FastMode::new(false),
            &Sources {
                uptime: "/nonexistent/uptime".into(),
                interrupts: "/nonexistent/interrupts".into(),
            },
        )
        .unwrap()
    }

    #[test]
    fn empty_plan_sleeps_max_and_writes_nothing() {
        let mut s = sched(&[]);
        assert_eq!(s.tick(), MAX_SLEEP);
        assert!(s.io().writes.borrow().is_empty());
        assert_eq!(s.probe_countdown(), None);
    }

    #[test]
    fn unused_slots_are_never_written() {
        let mut s = sched(&["1=heartbeat"]);
        for _ in 0..6 {
            let d = s.tick();
            s.elapse(d);
        }
        assert!(s.io().levels(LED_ADDRS[1]).is_empty());
        assert!(s.io().levels(LED_ADDRS[2]).is_empty());
        assert!(!s.io().levels(LED_ADDRS[0]).is_empty());
    }

    #[test]
    fn sleep_is_minimum_countdown() {
        let mut s = sched(&["1=heartbeat", "2=disk"]);
        assert_eq!(s.tick(), 100_000);
        s.elapse(100_000);
        // Heartbeat still has 300 ms left; disk re-armed for 100 ms.
        assert_eq!(s.tick(), 100_000);
        assert_eq!(s.slots()[0].countdown(), 300_000);
    }

    #[test]
    fn only_due_slots_are_stepped() {
        let mut s = sched(&["1=heartbeat", "2=disk"]);
        s.tick();
        s.io().clear();
        s.elapse(100_000);
        s.tick();
        assert!(s.io().levels(LED_ADDRS[0]).is_empty());
        assert_eq!(s.io().levels(LED_ADDRS[1]), vec![false]);
    }

    #[test]
    fn sleep_is_clamped() {
        let mut s = sched(&["1=heartbeat"]);
        s.tick();
        s.elapse(2_000_000);
        assert_eq!(s.next_sleep(), 0);
    }

    #[test]
    fn overdue_slot_fires_once_per_tick() {
        let mut s = sched(&["1=heartbeat"]);
        s.tick();
        s.elapse(5_000_000);
        s.tick();
        assert_eq!(s.io().levels(LED_ADDRS[0]), vec![true, false]);
    }

    #[test]
    fn probe_runs_first_and_every_cycle() {
        let mut s = sched(&["3=net:eth0"]);
        s.tick();
        assert_eq!(s.net().listing_reads.get(), 1);
        assert_eq!(s.probe_countdown(), Some(PROBE_PERIOD));
        s.elapse(BASE_PERIOD);
        s.tick();
        assert_eq!(s.net().listing_reads.get(), 1);
        s.elapse(BASE_PERIOD);
        s.tick();
        assert_eq!(s.net().listing_reads.get(), 2);
    }

    #[test]
    fn shared_interface_is_probed_once() {
        let mut s = sched(&["2=net:eth0", "3=net:eth0/eth0"]);
        s.net().bring_up("eth0");
        s.tick();
        assert_eq!(s.registry().len(), 1);
        assert_eq!(s.net().link_queries.get(), 1);
        assert_eq!(s.net().admin_queries.get(), 1);
    }

    #[test]
    fn network_led_reflects_probe() {
        let mut s = sched(&["3=net:eth0"]);
        s.net().bring_up("eth0");
        s.tick();
        assert_eq!(s.io().level(LED_ADDRS[2]), Some(true));
    }

    #[test]
    fn fast_mode_is_read_each_tick() {
        let mut s = sched(&["1=heartbeat"]);
        assert_eq!(s.tick(), 400_000);
        s.fast().set(true);
        s.elapse(400_000);
        assert_eq!(s.tick(), 50_000);
    }

    #[test]
    fn link_permission_denied_is_fatal() {
        let s = sched(&["3=net:eth0/ppp0"]);
        s.net().link_denied.borrow_mut().insert("eth0".into());
        let err = s.check_link_permission().unwrap_err();
        assert!(matches!(err, HwError::LinkProbeDenied { ref iface, .. } if iface == "eth0"));
    }

    #[test]
    fn link_permission_ok_without_network_led() {
        let s = sched(&["1=cpu"]);
        assert!(s.check_link_permission().is_ok());
        assert_eq!(s.net().link_queries.get(), 0);
    }

    #[test]
    fn shutdown_turns_active_leds_off() {
        let mut s = sched(&["1=heartbeat", "3=disk"]);
        s.tick();
        s.io().clear();
        s.shutdown();
        assert_eq!(s.io().levels(LED_ADDRS[0]), vec![false]);
        assert_eq!(s.io().levels(LED_ADDRS[2]), vec![false]);
        assert!(s.io().levels(LED_ADDRS[1]).is_empty());
    }

    #[test]
    fn run_stops_when_flag_is_clear() {
        let mut s = sched(&["1=heartbeat"]);
        let running = AtomicBool::new(false);
        s.run(&running);
        assert_eq!(s.io().levels(LED_ADDRS[0]), vec![false]);
    }

    #[test]
    fn too_many_interfaces_is_a_config_error() {
        let names: Vec<String> = (0..=crate::iface::MAX_INTERFACES)
            .map(|i| format!("if{i}"))
            .collect();
        let arg = format!("3=net:{}", names.join(","));
        let result = SchedulerState::new(
            &plan(&[&arg]),
            MockPorts::new(),
            MockNet::new(),
            FastMode::default(),
        );
        assert!(matches!(result, Err(config::ConfigError::TooManyInterfaces { .. })));
    }

    #[test]
    fn probe_names_reports_in_order() {
        let net = MockNet::new();
        net.bring_up("eth1");
        let ifaces = probe_names(&["eth1".into(), "eth0".into()], &net).unwrap();
        assert_eq!(ifaces[0].name, "eth1");
        assert!(ifaces[0].status.contains(Checks::LINK_UP));
        assert_eq!(ifaces[1].status, Checks::NONE);
    }
}
