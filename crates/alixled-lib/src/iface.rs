//! Network interface registry, prober and per-role group aggregation.
//!
//! Every LED that watches interfaces registers them here. Names are
//! deduplicated so one probe per cycle serves all LEDs, and the checks each
//! LED asks for are OR-ed together so the prober only issues the ioctls some
//! LED actually needs.

use std::fmt;
use std::io;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ConfigError;

/// Upper bound on distinct interface names across all LEDs.
pub const MAX_INTERFACES: usize = 32;

/// Kernel limit on interface names, terminating NUL included.
pub const IFNAMSIZ: usize = 16;

/// Default presence listing.
pub const PROC_NET_DEV: &str = "/proc/net/dev";

// ── Check bitmask ──

/// Set of interface checks, used both for what is required and what was seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Checks(u8);

impl Checks {
    pub const NONE: Checks = Checks(0);
    pub const PRESENT: Checks = Checks(0x01);
    pub const ADMIN_UP: Checks = Checks(0x02);
    pub const LINK_UP: Checks = Checks(0x04);
    pub const BOTH: Checks = Checks(0x06);

    pub fn contains(self, other: Checks) -> bool {
        self.0 & other.0 == other.0
    }

}

impl BitOr for Checks {
    type Output = Checks;

    fn bitor(self, rhs: Checks) -> Checks {
        Checks(self.0 | rhs.0)
    }
}

impl BitAnd for Checks {
    type Output = Checks;

    fn bitand(self, rhs: Checks) -> Checks {
        Checks(self.0 & rhs.0)
    }
}

impl BitOrAssign for Checks {
    fn bitor_assign(&mut self, rhs: Checks) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Checks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Checks::PRESENT) {
            parts.push("present");
        }
        if self.contains(Checks::ADMIN_UP) {
            parts.push("up");
        }
        if self.contains(Checks::LINK_UP) {
            parts.push("link");
        }
        if parts.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", parts.join("+"))
        }
    }
}

// ── Registry ──

/// Index of an interface inside its [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfaceId(usize);

#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    /// Union of checks requested by every reference.
    pub checks: Checks,
    /// What the last probe observed.
    pub status: Checks,
}

#[derive(Debug, Default)]
pub struct Registry {
    ifaces: Vec<Interface>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` or merge `checks` into its existing record.
    pub fn register(&mut self, name: &str, checks: Checks) -> Result<IfaceId, ConfigError> {
        validate_name(name)?;
        let checks = checks | Checks::PRESENT;
        if let Some(pos) = self.ifaces.iter().position(|i| i.name == name) {
            self.ifaces[pos].checks |= checks;
            return Ok(IfaceId(pos));
        }
        if self.ifaces.len() >= MAX_INTERFACES {
            return Err(ConfigError::TooManyInterfaces {
                limit: MAX_INTERFACES,
            });
        }
        self.ifaces.push(Interface {
            name: name.to_string(),
            checks,
            status: Checks::NONE,
        });
        Ok(IfaceId(self.ifaces.len() - 1))
    }

    pub fn get(&self, id: IfaceId) -> &Interface {
        &self.ifaces[id.0]
    }

    pub fn find(&self, name: &str) -> Option<&Interface> {
        self.ifaces.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        self.ifaces.iter()
    }

    pub fn len(&self) -> usize {
        self.ifaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ifaces.is_empty()
    }

    /// Refresh every interface's status from `source` in one pass.
    ///
    /// Presence comes from a single listing read; admin and link queries are
    /// only issued for present interfaces that some LED asked them for.
    pub fn probe_all(&mut self, source: &impl NetSource) {
        let names = source.interface_names().unwrap_or_else(|| {
            log::debug!("interface listing unreadable, treating all as absent");
            Vec::new()
        });
        for iface in &mut self.ifaces {
            let mut status = Checks::NONE;
            if names.iter().any(|n| *n == iface.name) {
                status |= Checks::PRESENT;
                if iface.checks.contains(Checks::ADMIN_UP) && source.admin_up(&iface.name) {
                    status |= Checks::ADMIN_UP;
                }
                if iface.checks.contains(Checks::LINK_UP)
                    && matches!(source.link_up(&iface.name), Ok(true))
                {
                    status |= Checks::LINK_UP;
                }
            }
            iface.status = status;
        }
    }
}

/// Reject names the kernel could never list.
pub fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::InvalidInterface("empty interface name".into()));
    }
    if name.len() >= IFNAMSIZ {
        return Err(ConfigError::InvalidInterface(format!(
            "{name}: longer than {} characters",
            IFNAMSIZ - 1
        )));
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == ':' || c == ',')
    {
        return Err(ConfigError::InvalidInterface(format!(
            "{name}: contains a forbidden character"
        )));
    }
    Ok(())
}

// ── Groups ──

/// One LED's reference to a registered interface.
#[derive(Debug, Clone)]
pub struct IfaceRef {
    pub id: IfaceId,
    /// Checks this LED requires, presence included.
    pub required: Checks,
    last: Option<Checks>,
}

/// Aggregated state of one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleStatus {
    pub up: bool,
    pub changed: bool,
}

/// Ordered interface references for one role of one LED.
#[derive(Debug, Clone, Default)]
pub struct Group {
    members: Vec<IfaceRef>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: IfaceId, required: Checks) {
        self.members.push(IfaceRef {
            id,
            required: required | Checks::PRESENT,
            last: None,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[IfaceRef] {
        &self.members
    }

    /// Up if any member satisfies its checks; an empty role counts as up.
    ///
    /// `changed` is set when the checks a member requires read differently
    /// from last time. Bits only other LEDs asked for are ignored. A member's
    /// first observation only records it.
    pub fn status(&mut self, registry: &Registry) -> RoleStatus {
        if self.is_empty() {
            return RoleStatus {
                up: true,
                changed: false,
            };
        }
        let mut up = false;
        let mut changed = false;
        for member in &mut self.members {
            let status = registry.get(member.id).status & member.required;
            if status == member.required {
                up = true;
            }
            if member.last.is_some_and(|last| last != status) {
                changed = true;
            }
            member.last = Some(status);
        }
        RoleStatus { up, changed }
    }
}

// ── OS source ──

/// Operating-system queries the prober relies on.
pub trait NetSource {
    /// Names currently listed by the kernel, `None` if the listing is unreadable.
    fn interface_names(&self) -> Option<Vec<String>>;
    /// Administrative `IFF_UP` flag; false on any error.
    fn admin_up(&self, name: &str) -> bool;
    /// Physical link state through the ethtool ioctl.
    fn link_up(&self, name: &str) -> io::Result<bool>;
}

/// Extract interface names from `/proc/net/dev` text.
///
/// Header lines carry no `name:` prefix and are skipped.
pub fn parse_net_dev(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let end = line.find(|c: char| c.is_whitespace() || c == ':')?;
            if line[end..].starts_with(':') && end > 0 {
                Some(line[..end].to_string())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    use crate::hw::HwError;

    const SIOCETHTOOL: libc::c_ulong = 0x8946;
    const ETHTOOL_GLINK: u32 = 0x0000_000a;

    #[repr(C)]
    struct EthtoolValue {
        cmd: u32,
        data: u32,
    }

    #[repr(C)]
    union IfReqData {
        flags: libc::c_short,
        data: *mut libc::c_void,
        _pad: [u8; 24],
    }

    #[repr(C)]
    struct IfReq {
        name: [libc::c_char; IFNAMSIZ],
        data: IfReqData,
    }

    impl IfReq {
        fn new(name: &str) -> Self {
            let mut req = IfReq {
                name: [0; IFNAMSIZ],
                data: IfReqData { _pad: [0; 24] },
            };
            for (dst, &src) in req.name.iter_mut().zip(name.as_bytes().iter().take(IFNAMSIZ - 1)) {
                *dst = src as libc::c_char;
            }
            req
        }
    }

    /// `/proc/net/dev` listing plus ioctls on a datagram socket.
    pub struct ProcNet {
        listing: PathBuf,
        sock: OwnedFd,
    }

    impl ProcNet {
        pub fn open() -> crate::hw::Result<Self> {
            Self::with_listing(PROC_NET_DEV)
        }

        pub fn with_listing(listing: impl AsRef<Path>) -> crate::hw::Result<Self> {
            // SAFETY: plain socket(2) call; the fd is owned right below.
            let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
            if fd < 0 {
                return Err(HwError::SocketFailed(io::Error::last_os_error()));
            }
            // SAFETY: fd is a freshly created, valid descriptor we own.
            let sock = unsafe { OwnedFd::from_raw_fd(fd) };
            Ok(ProcNet {
                listing: listing.as_ref().to_path_buf(),
                sock,
            })
        }

        fn ioctl(&self, request: libc::c_ulong, req: &mut IfReq) -> io::Result<()> {
            // SAFETY: `req` is a properly sized ifreq living across the call.
            let rc = unsafe { libc::ioctl(self.sock.as_raw_fd(), request as _, req as *mut IfReq) };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
    }

    impl NetSource for ProcNet {
        fn interface_names(&self) -> Option<Vec<String>> {
            std::fs::read_to_string(&self.listing)
                .ok()
                .map(|text| parse_net_dev(&text))
        }

        fn admin_up(&self, name: &str) -> bool {
            let mut req = IfReq::new(name);
            if self.ioctl(libc::SIOCGIFFLAGS as libc::c_ulong, &mut req).is_err() {
                return false;
            }
            // SAFETY: SIOCGIFFLAGS filled the flags member.
            let flags = unsafe { req.data.flags };
            flags as libc::c_int & libc::IFF_UP != 0
        }

        fn link_up(&self, name: &str) -> io::Result<bool> {
            let mut value = EthtoolValue {
                cmd: ETHTOOL_GLINK,
                data: 0,
            };
            let mut req = IfReq::new(name);
            req.data.data = (&mut value as *mut EthtoolValue).cast();
            self.ioctl(SIOCETHTOOL, &mut req)?;
            Ok(value.data != 0)
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux_impl::ProcNet;

#[cfg(not(target_os = "linux"))]
mod fallback_impl {
    use super::*;
    use crate::hw::HwError;

    /// Placeholder source: the interface ioctls are Linux only.
    pub struct ProcNet {
        _private: (),
    }

    impl ProcNet {
        pub fn open() -> crate::hw::Result<Self> {
            Err(HwError::Unsupported)
        }
    }

    impl NetSource for ProcNet {
        fn interface_names(&self) -> Option<Vec<String>> {
            None
        }

        fn admin_up(&self, _name: &str) -> bool {
            false
        }

        fn link_up(&self, _name: &str) -> io::Result<bool> {
            Ok(false)
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub use fallback_impl::ProcNet;

// ── Mock source for testing ──

/// In-memory interface source for unit and integration tests.
///
/// Built into every profile so integration tests can reach it; kept out of
/// the rendered docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;

    #[derive(Default)]
    pub struct MockNet {
        pub present: RefCell<HashSet<String>>,
        pub admin: RefCell<HashSet<String>>,
        pub link: RefCell<HashSet<String>>,
        /// Names whose link query fails with `EPERM`.
        pub link_denied: RefCell<HashSet<String>>,
        /// If true, the listing behaves as unreadable.
        pub unreadable: Cell<bool>,
        pub listing_reads: Cell<usize>,
        pub admin_queries: Cell<usize>,
        pub link_queries: Cell<usize>,
    }

    impl MockNet {
        pub fn new() -> Self {
            Self::default()
        }

        /// Mark `name` present, administratively up and with link.
        pub fn bring_up(&self, name: &str) {
            self.present.borrow_mut().insert(name.into());
            self.admin.borrow_mut().insert(name.into());
            self.link.borrow_mut().insert(name.into());
        }

        /// Remove `name` from the listing entirely.
        pub fn remove(&self, name: &str) {
            self.present.borrow_mut().remove(name);
            self.admin.borrow_mut().remove(name);
            self.link.borrow_mut().remove(name);
        }
    }

    impl NetSource for MockNet {
        fn interface_names(&self) -> Option<Vec<String>> {
            self.listing_reads.set(self.listing_reads.get() + 1);
            if self.unreadable.get() {
                return None;
            }
            let mut names: Vec<String> = self.present.borrow().iter().cloned().collect();
            names.sort();
            Some(names)
        }

        fn admin_up(&self, name: &str) -> bool {
            self.admin_queries.set(self.admin_queries.get() + 1);
            self.admin.borrow().contains(name)
        }

        fn link_up(&self, name: &str) -> io::Result<bool> {
            self.link_queries.set(self.link_queries.get() + 1);
            if self.link_denied.borrow().contains(name) {
                return Err(io::Error::from_raw_os_error(libc::EPERM));
            }
            Ok(self.link.borrow().contains(name))
        }
    }
}

/// Serializable snapshot of one interface, for status output.
#[derive(Debug, Clone, Serialize)]
pub struct IfaceReport {
    pub name: String,
    pub present: bool,
    pub admin_up: bool,
    pub link_up: bool,
}

impl From<&Interface> for IfaceReport {
    fn from(iface: &Interface) -> Self {
        IfaceReport {
            name: iface.name.clone(),
            present: iface.status.contains(Checks::PRESENT),
            admin_up: iface.status.contains(Checks::ADMIN_UP),
            link_up: iface.status.contains(Checks::LINK_UP),
        }
    }
}
