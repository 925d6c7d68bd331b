//! Hardware port access: trait plus the x86 `outl`/`inl` backend.
//!
//! The ALIX GPIO block lives in I/O space. Each LED register takes a 32-bit
//! word whose upper half sets bits and lower half clears them, so writing
//! `LED_ON & mask` lights a LED and `!LED_ON & mask` turns it off without
//! touching the other LEDs sharing the same port.

use std::fmt;
use std::io;

// ── Error type ──

/// Hardware initialization errors.
#[derive(Debug)]
pub enum HwError {
    /// `iopl(3)` was refused (not root, or locked down kernel).
    PermissionDenied(io::Error),
    /// Port I/O is not available on this architecture.
    Unsupported,
    /// The control socket used for interface queries could not be opened.
    SocketFailed(io::Error),
    /// The startup link query was refused with `EPERM`.
    LinkProbeDenied { iface: String, source: io::Error },
}

impl fmt::Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HwError::PermissionDenied(e) => write!(f, "Cannot get I/O port: {e}"),
            HwError::Unsupported => write!(f, "Port I/O is not supported on this platform"),
            HwError::SocketFailed(e) => write!(f, "Failed to get socket: {e}"),
            HwError::LinkProbeDenied { iface, source } => {
                write!(f, "Failed to get link status of {iface}: {source}")
            }
        }
    }
}

impl std::error::Error for HwError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HwError::PermissionDenied(e) | HwError::SocketFailed(e) => Some(e),
            HwError::LinkProbeDenied { source, .. } => Some(source),
            HwError::Unsupported => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HwError>;

// ── Board constants ──

/// Set-half pattern: written masked, it lights a LED; its complement turns it off.
pub const LED_ON: u32 = 0xFFFF_0000;

/// One LED output: the I/O port and the bit pair driving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedAddr {
    pub port: u16,
    pub mask: u32,
}

impl LedAddr {
    /// Word to write for the requested level.
    pub fn word(&self, on: bool) -> u32 {
        if on { LED_ON & self.mask } else { !LED_ON & self.mask }
    }
}

/// The three front-panel LEDs, LED1 first.
pub const LED_ADDRS: [LedAddr; 3] = [
    LedAddr {
        port: 0x6100,
        mask: 0x0040_0040,
    },
    LedAddr {
        port: 0x6180,
        mask: 0x0200_0200,
    },
    LedAddr {
        port: 0x6180,
        mask: 0x0800_0800,
    },
];

/// Front switch input port. The switch is active low.
pub const SWITCH_PORT: u16 = 0x61B0;
pub const SWITCH_MASK: u32 = 0x0100;

// ── Trait ──

/// Narrow port-I/O surface used by the LED engine and the switch tool.
pub trait PortIo {
    fn write_led_word(&self, port: u16, value: u32);
    fn read_switch_word(&self, port: u16) -> u32;

    /// Drive one LED on or off.
    fn set_led(&self, addr: LedAddr, on: bool) {
        self.write_led_word(addr.port, addr.word(on));
    }
}

// ── x86 implementation ──

#[cfg(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64")))]
mod x86_impl {
    use super::*;
    use std::arch::asm;

    /// Raw port access, valid once `iopl(3)` succeeded for this process.
    pub struct IoPorts {
        _private: (),
    }

    impl IoPorts {
        /// Raise the I/O privilege level so `inl`/`outl` work from user space.
        pub fn acquire() -> Result<Self> {
            // SAFETY: plain syscall with an integer argument.
            let rc = unsafe { libc::syscall(libc::SYS_iopl, 3 as libc::c_long) };
            if rc == -1 {
                return Err(HwError::PermissionDenied(io::Error::last_os_error()));
            }
            Ok(IoPorts { _private: () })
        }
    }

    impl PortIo for IoPorts {
        fn write_led_word(&self, port: u16, value: u32) {
            // SAFETY: I/O privilege was granted in `acquire`; the ports are the
            // board's GPIO registers.
            unsafe {
                asm!("out dx, eax", in("dx") port, in("eax") value, options(nomem, nostack, preserves_flags));
            }
        }

        fn read_switch_word(&self, port: u16) -> u32 {
            let value: u32;
            // SAFETY: see `write_led_word`.
            unsafe {
                asm!("in eax, dx", out("eax") value, in("dx") port, options(nomem, nostack, preserves_flags));
            }
            value
        }
    }
}

#[cfg(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64")))]
pub use x86_impl::IoPorts;

#[cfg(not(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64"))))]
mod fallback_impl {
    use super::*;

    /// Placeholder backend: this board family is x86 only.
    pub struct IoPorts {
        _private: (),
    }

    impl IoPorts {
        pub fn acquire() -> Result<Self> {
            Err(HwError::Unsupported)
        }
    }

    impl PortIo for IoPorts {
        fn write_led_word(&self, _port: u16, _value: u32) {}

        fn read_switch_word(&self, _port: u16) -> u32 {
            SWITCH_MASK
        }
    }
}

#[cfg(not(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64"))))]
pub use fallback_impl::IoPorts;

// ── Mock ports for testing ──

/// In-memory port backend for unit and integration tests.
///
/// Built into every profile so integration tests can reach it; kept out of
/// the rendered docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Records every LED write; the switch word is settable.
    pub struct MockPorts {
        /// Recorded writes: (port, value), oldest first.
        pub writes: RefCell<Vec<(u16, u32)>>,
        /// Value returned by `read_switch_word` (released by default).
        pub switch_word: Cell<u32>,
        /// Number of switch reads performed.
        pub switch_reads: Cell<usize>,
    }

    impl Default for MockPorts {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockPorts {
        pub fn new() -> Self {
            MockPorts {
                writes: RefCell::new(Vec::new()),
                switch_word: Cell::new(SWITCH_MASK),
                switch_reads: Cell::new(0),
            }
        }

        /// Level of `addr` according to the last write touching its bits.
        pub fn level(&self, addr: LedAddr) -> Option<bool> {
            self.writes
                .borrow()
                .iter()
                .rev()
                .find(|&&(port, value)| port == addr.port && value & addr.mask != 0)
                .map(|&(_, value)| value == addr.word(true))
        }

        /// Levels written for `addr`, oldest first.
        pub fn levels(&self, addr: LedAddr) -> Vec<bool> {
            self.writes
                .borrow()
                .iter()
                .filter(|&&(port, value)| port == addr.port && value & addr.mask != 0)
                .map(|&(_, value)| value == addr.word(true))
                .collect()
        }

        pub fn clear(&self) {
            self.writes.borrow_mut().clear();
        }
    }

    impl PortIo for MockPorts {
        fn write_led_word(&self, port: u16, value: u32) {
            self.writes.borrow_mut().push((port, value));
        }

        fn read_switch_word(&self, _port: u16) -> u32 {
            self.switch_reads.set(self.switch_reads.get() + 1);
            self.switch_word.get()
        }
    }
}
