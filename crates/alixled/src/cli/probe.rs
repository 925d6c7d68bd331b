//! `probe` subcommand: one-shot interface status query.

use alixled_lib::iface::{IfaceReport, ProcNet};
use alixled_lib::scheduler::probe_names;

use super::{Result, kv, kv_width, print_json};

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

pub(super) fn cmd_probe(ifaces: &[String], json: bool) -> Result<()> {
    let net = ProcNet::open()?;
    let reports: Vec<IfaceReport> = probe_names(ifaces, &net)?
        .iter()
        .map(IfaceReport::from)
        .collect();

    if json {
        return print_json(&reports);
    }

    let w = kv_width(&["Present:"]);
    for (i, r) in reports.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", r.name);
        kv("  Present:", yes_no(r.present), w + 2);
        kv("  Admin up:", yes_no(r.admin_up), w + 2);
        kv("  Link:", yes_no(r.link_up), w + 2);
    }
    Ok(())
}
