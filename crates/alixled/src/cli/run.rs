//! `run` subcommand: the LED daemon.

use std::path::PathBuf;

use alixled_lib::hw::IoPorts;
use alixled_lib::iface::ProcNet;
use alixled_lib::led::FastMode;
use alixled_lib::scheduler::SchedulerState;

use super::{PlanArgs, RUNNING, Result};
use crate::{daemon, signals};

pub(super) fn cmd_run(args: &PlanArgs, foreground: bool, pidfile: Option<PathBuf>) -> Result<()> {
    // Configuration first: nothing below runs on a bad plan.
    let (config, plan) = super::resolve(args)?;
    let fast = FastMode::new(args.fast || config.fast);
    let pidfile = pidfile.unwrap_or_else(|| config.pidfile.clone());

    let io = IoPorts::acquire()?;
    let net = ProcNet::open()?;
    let mut sched = SchedulerState::new(&plan, io, net, fast.clone())?;
    sched.check_link_permission()?;

    if foreground {
        log::info!("running in foreground");
    } else {
        log::info!("daemonizing, pid file {}", pidfile.display());
        daemon::daemonize(&pidfile)?;
    }

    signals::install_fast_mode(&fast)?;
    signals::install_termination()?;
    daemon::lower_priority();

    sched.run(&RUNNING);
    log::info!("stopped");
    Ok(())
}
