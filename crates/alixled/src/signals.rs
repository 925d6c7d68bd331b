//! Fast-mode signals and termination handling.
//!
//! SIGUSR1 turns fast mode on, SIGUSR2 turns it off. The handler only stores
//! into the shared atomic and re-arms itself. SIGINT and SIGTERM go through
//! `ctrlc`, which clears [`crate::RUNNING`] from its own thread.

use std::io;
use std::sync::OnceLock;
use std::sync::atomic::Ordering;

use alixled_lib::led::FastMode;

static FAST: OnceLock<FastMode> = OnceLock::new();

extern "C" fn on_usr(sig: libc::c_int) {
    if let Some(fast) = FAST.get() {
        fast.set(sig == libc::SIGUSR1);
    }
    // SAFETY: re-installing the same async-signal-safe handler.
    unsafe {
        libc::signal(sig, on_usr as libc::sighandler_t);
    }
}

/// Route SIGUSR1/SIGUSR2 to `fast`. Only the first call takes effect.
pub fn install_fast_mode(fast: &FastMode) -> io::Result<()> {
    if FAST.set(fast.clone()).is_err() {
        log::debug!("fast-mode signals already installed");
        return Ok(());
    }
    for sig in [libc::SIGUSR1, libc::SIGUSR2] {
        // SAFETY: the handler only touches an initialized OnceLock and an atomic.
        let prev = unsafe { libc::signal(sig, on_usr as libc::sighandler_t) };
        if prev == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Clear `RUNNING` on SIGINT/SIGTERM.
pub fn install_termination() -> io::Result<()> {
    ctrlc::set_handler(|| {
        crate::RUNNING.store(false, Ordering::SeqCst);
    })
    .map_err(io::Error::other)
}
