//! Backgrounding and process priority.

use std::ffi::CString;
use std::io;
use std::path::Path;

fn cvt(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

/// Detach from the terminal.
///
/// The parent writes the child's pid to `pidfile` and exits 0. Only the
/// child returns.
pub fn daemonize(pidfile: &Path) -> io::Result<()> {
    std::env::set_current_dir("/")?;

    // SAFETY: single-threaded at this point; no handler threads exist yet.
    let pid = cvt(unsafe { libc::fork() })?;
    if pid > 0 {
        if let Err(e) = std::fs::write(pidfile, format!("{pid}\n")) {
            eprintln!("Error: cannot write pid file {}: {e}", pidfile.display());
        }
        std::process::exit(0);
    }

    // SAFETY: plain syscall in the child.
    cvt(unsafe { libc::setsid() })?;
    redirect_stdio()
}

fn redirect_stdio() -> io::Result<()> {
    let null = CString::new("/dev/null").map_err(io::Error::other)?;
    // SAFETY: valid NUL-terminated path.
    let fd = cvt(unsafe { libc::open(null.as_ptr(), libc::O_RDWR) })?;
    for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        // SAFETY: both descriptors are open.
        cvt(unsafe { libc::dup2(fd, target) })?;
    }
    if fd > libc::STDERR_FILENO {
        // SAFETY: `fd` is ours and no longer needed.
        unsafe { libc::close(fd) };
    }
    Ok(())
}

/// Move to the idle scheduling class, or to nice 20 if that is refused.
pub fn lower_priority() {
    let param = libc::sched_param { sched_priority: 0 };
    // SAFETY: `param` outlives the call.
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_IDLE, &param) } == 0 {
        log::debug!("running in SCHED_IDLE");
        return;
    }
    log::debug!("SCHED_IDLE refused: {}", io::Error::last_os_error());
    // SAFETY: as above.
    unsafe {
        libc::sched_setscheduler(0, libc::SCHED_OTHER, &param);
        if libc::setpriority(libc::PRIO_PROCESS, 0, 20) == -1 {
            log::debug!("setpriority failed: {}", io::Error::last_os_error());
        }
    }
}
