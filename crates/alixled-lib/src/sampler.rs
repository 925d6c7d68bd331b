//! CPU and disk activity samplers over `/proc` text counters.
//!
//! Both keep a two-sample window: the first successful read only seeds it,
//! every later read derives a value from the delta. A failed read leaves the
//! window and the last derived value untouched.

use std::path::{Path, PathBuf};

pub const PROC_UPTIME: &str = "/proc/uptime";
pub const PROC_INTERRUPTS: &str = "/proc/interrupts";

/// Device-name prefixes treated as storage controllers.
pub const STORAGE_FAMILIES: &[&str] = &[
    "ide", "ata", "sata", "pata", "ahci", "nvme", "mmc", "sdhci", "libata",
];

fn read_source(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            log::debug!("cannot read {}: {e}", path.display());
            None
        }
    }
}

// ── CPU ──

/// Parse a `/proc/uptime` field, folding the fraction in by concatenation.
///
/// `"4567.89"` → `456789`. The kernel always prints two decimals, so the
/// result is in hundredths of a second.
pub fn parse_fixed_point(field: &str) -> Option<u64> {
    let (int, frac) = field.split_once('.').unwrap_or((field, ""));
    if int.is_empty() || !int.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut digits = String::with_capacity(int.len() + frac.len());
    digits.push_str(int);
    digits.push_str(frac);
    digits.parse().ok()
}

/// Parse `(total, idle)` from `/proc/uptime` text.
pub fn parse_uptime(text: &str) -> Option<(u64, u64)> {
    let mut fields = text.split_whitespace();
    let total = parse_fixed_point(fields.next()?)?;
    let idle = parse_fixed_point(fields.next()?)?;
    Some((total, idle))
}

/// Usage percentage between two `(total, idle)` readings.
///
/// Idle time is summed over CPUs, so on SMP hosts (or after clock skew) its
/// delta can exceed the total delta; it is capped there. `None` when no time
/// elapsed.
pub fn cpu_usage(prev: (u64, u64), cur: (u64, u64)) -> Option<u32> {
    let dt = cur.0.checked_sub(prev.0)?;
    if dt == 0 {
        return None;
    }
    let di = cur.1.saturating_sub(prev.1).min(dt);
    let usage = (dt - di) * 100 / dt;
    Some(usage.min(100) as u32)
}

#[derive(Debug)]
pub struct CpuSampler {
    path: PathBuf,
    prev: Option<(u64, u64)>,
    usage: u32,
}

impl CpuSampler {
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        CpuSampler {
            path: path.as_ref().to_path_buf(),
            prev: None,
            usage: 0,
        }
    }

    /// Read the source and update usage. False when nothing was updated.
    pub fn sample(&mut self) -> bool {
        match read_source(&self.path) {
            Some(text) => self.ingest(&text),
            None => false,
        }
    }

    /// Feed one reading of `/proc/uptime` text.
    pub fn ingest(&mut self, text: &str) -> bool {
        let Some(cur) = parse_uptime(text) else {
            log::debug!("unparsable uptime sample: {text:?}");
            return false;
        };
        let Some(prev) = self.prev.replace(cur) else {
            return false;
        };
        match cpu_usage(prev, cur) {
            Some(usage) => {
                self.usage = usage;
                true
            }
            None => false,
        }
    }

    /// Last computed usage, 0..=100.
    pub fn usage(&self) -> u32 {
        self.usage
    }
}

// ── Disk ──

fn is_storage_device(token: &str) -> bool {
    STORAGE_FAMILIES.iter().any(|family| token.starts_with(family))
}

/// Sum of `/proc/interrupts` counts on storage-controller lines.
///
/// Each line is `IRQ: count [count...] chip [type] dev[, dev...]`. Lines
/// whose IRQ field is not numeric (`NMI`, `LOC`, headers) are skipped.
pub fn parse_interrupts(text: &str) -> u64 {
    let mut total = 0u64;
    for line in text.lines() {
        let Some((irq, rest)) = line.split_once(':') else {
            continue;
        };
        let irq = irq.trim();
        if irq.is_empty() || !irq.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let mut count = 0u64;
        let mut tokens = rest.split_whitespace().peekable();
        while let Some(n) = tokens.peek().and_then(|t| t.parse::<u64>().ok()) {
            count = count.saturating_add(n);
            tokens.next();
        }
        let qualifies = tokens
            .flat_map(|t| t.split(','))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .any(is_storage_device);
        if qualifies {
            total = total.saturating_add(count);
        }
    }
    total
}

#[derive(Debug)]
pub struct DiskSampler {
    path: PathBuf,
    prev: Option<u64>,
    delta: u64,
}

impl DiskSampler {
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        DiskSampler {
            path: path.as_ref().to_path_buf(),
            prev: None,
            delta: 0,
        }
    }

    pub fn sample(&mut self) -> bool {
        match read_source(&self.path) {
            Some(text) => self.ingest(&text),
            None => false,
        }
    }

    pub fn ingest(&mut self, text: &str) -> bool {
        let cur = parse_interrupts(text);
        match self.prev.replace(cur) {
            Some(prev) => {
                // A counter going backwards (hotplug, wrap) reads as activity.
                self.delta = if cur >= prev { cur - prev } else { cur };
                true
            }
            None => false,
        }
    }

    /// Storage interrupts between the last two samples.
    pub fn delta(&self) -> u64 {
        self.delta
    }

    pub fn active(&self) -> bool {
        self.delta > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_point_concatenates_fraction() {
        assert_eq!(parse_fixed_point("4567.89"), Some(456_789));
        assert_eq!(parse_fixed_point("12"), Some(12));
        assert_eq!(parse_fixed_point("0.05"), Some(5));
    }

    #[test]
    fn fixed_point_rejects_garbage() {
        assert_eq!(parse_fixed_point(""), None);
        assert_eq!(parse_fixed_point("12a.3"), None);
        assert_eq!(parse_fixed_point(".5"), None);
        assert_eq!(parse_fixed_point("1.x"), None);
    }

    #[test]
    fn uptime_needs_two_fields() {
        assert_eq!(parse_uptime("350735.47 234388.90\n"), Some((35_073_547, 23_438_890)));
        assert_eq!(parse_uptime("350735.47\n"), None);
    }

    #[test]
    fn usage_quarter_load() {
        assert_eq!(cpu_usage((1000, 500), (1100, 575)), Some(25));
    }

    #[test]
    fn usage_caps_idle_at_total() {
        // Dual-core idle accrues twice as fast as uptime.
        assert_eq!(cpu_usage((1000, 500), (1100, 700)), Some(0));
    }

    #[test]
    fn usage_full_load() {
        assert_eq!(cpu_usage((0, 0), (100, 0)), Some(100));
    }

    #[test]
    fn usage_needs_elapsed_time() {
        assert_eq!(cpu_usage((100, 0), (100, 0)), None);
        assert_eq!(cpu_usage((200, 0), (100, 0)), None);
    }

    #[test]
    fn cpu_first_sample_only_seeds() {
        let mut s = CpuSampler::with_path("/nonexistent");
        assert!(!s.ingest("10.00 5.00"));
        assert!(s.ingest("11.00 5.75"));
        assert_eq!(s.usage(), 25);
    }

    #[test]
    fn cpu_bad_sample_keeps_last_value() {
        let mut s = CpuSampler::with_path("/nonexistent");
        s.ingest("10.00 5.00");
        s.ingest("11.00 5.75");
        assert!(!s.ingest("garbage"));
        assert_eq!(s.usage(), 25);
    }

    #[test]
    fn cpu_unreadable_source_reports_no_update() {
        let mut s = CpuSampler::with_path("/nonexistent/uptime");
        assert!(!s.sample());
        assert!(!s.sample());
        assert_eq!(s.usage(), 0);
    }

    #[test]
    fn cpu_reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uptime");
        let mut s = CpuSampler::with_path(&path);
        std::fs::write(&path, "100.00 50.00\n").unwrap();
        assert!(!s.sample());
        std::fs::write(&path, "101.00 50.00\n").unwrap();
        assert!(s.sample());
        assert_eq!(s.usage(), 100);
    }

    const INTERRUPTS: &str = "\
           CPU0       CPU1
  0:        142          0   IO-APIC   2-edge      timer
  8:          1          0   IO-APIC   8-edge      rtc0
 14:       1000        500   IO-APIC  14-edge      pata_cs5536
 15:          7          3   XT-PIC    ide1
 19:         20         30   IO-APIC  19-fasteoi   ata_piix, ehci_hcd:usb1
 23:         99          0   IO-APIC  23-fasteoi   ehci_hcd:usb2
NMI:          0          0   Non-maskable interrupts
LOC:     123456     123456   Local timer interrupts
ERR:          0
";

    #[test]
    fn interrupts_sum_storage_lines_across_cpus() {
        // 1500 (pata) + 10 (ide1) + 50 (shared ata_piix line)
        assert_eq!(parse_interrupts(INTERRUPTS), 1560);
    }

    #[test]
    fn interrupts_skip_malformed_lines() {
        let text = "garbage line\n 14: notanumber IO-APIC ide0\n 15: 5 XT-PIC ide1\n";
        // The second line has no counts but still names a storage device.
        assert_eq!(parse_interrupts(text), 5);
    }

    #[test]
    fn interrupts_ignore_non_storage() {
        assert_eq!(parse_interrupts(" 23: 99 IO-APIC 23-fasteoi ehci_hcd:usb2\n"), 0);
    }

    #[test]
    fn disk_reports_delta() {
        let mut s = DiskSampler::with_path("/nonexistent");
        assert!(!s.ingest(" 14: 100 IO-APIC ide0\n"));
        assert!(s.ingest(" 14: 100 IO-APIC ide0\n"));
        assert!(!s.active());
        assert!(s.ingest(" 14: 112 IO-APIC ide0\n"));
        assert_eq!(s.delta(), 12);
        assert!(s.active());
    }

    #[test]
    fn disk_unreadable_keeps_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interrupts");
        let mut s = DiskSampler::with_path(&path);
        assert!(!s.sample());
        std::fs::write(&path, " 14: 10 IO-APIC ide0\n").unwrap();
        assert!(!s.sample());
        std::fs::write(&path, " 14: 15 IO-APIC ide0\n").unwrap();
        assert!(s.sample());
        assert_eq!(s.delta(), 5);
        std::fs::remove_file(&path).unwrap();
        assert!(!s.sample());
        assert_eq!(s.delta(), 5);
    }
}
