//! `config` subcommand: show the effective LED plan.

use super::{ConfigOutput, PlanArgs, Result, SlotAssignment, SlotJson, kv, kv_width, print_json};

pub(super) fn cmd_config(args: &PlanArgs, json: bool) -> Result<()> {
    let (config, plan) = super::resolve(args)?;
    let exists = args.config.exists();
    let fast = args.fast || config.fast;

    if json {
        let output = ConfigOutput {
            config_file: args.config.display().to_string(),
            config_file_exists: exists,
            fast,
            pidfile: config.pidfile.display().to_string(),
            leds: plan
                .slots()
                .iter()
                .enumerate()
                .map(|(i, a)| SlotJson::new(i + 1, a))
                .collect(),
        };
        return print_json(&output);
    }

    let w = kv_width(&["Config file:", "Pid file:", "Fast mode:", "LED1:"]);
    if exists {
        kv("Config file:", format_args!("{} (loaded)", args.config.display()), w);
    } else {
        kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", args.config.display()),
            w,
        );
    }
    kv("Pid file:", config.pidfile.display(), w);
    kv("Fast mode:", fast, w);
    println!();

    for (i, slot) in plan.slots().iter().enumerate() {
        let key = format!("LED{}:", i + 1);
        match slot {
            SlotAssignment::Unused => kv(&key, "unused", w),
            SlotAssignment::Network(n) => {
                kv(&key, "network", w);
                let roles = [("link", &n.link), ("slave", &n.slave), ("tunnel", &n.tunnel)];
                for (role, list) in roles {
                    if list.is_empty() {
                        continue;
                    }
                    let names: Vec<String> = list.iter().map(ToString::to_string).collect();
                    println!("  {role:<8}{}", names.join(", "));
                }
            }
            other => {
                if let Some(mode) = other.mode() {
                    kv(&key, mode, w);
                }
            }
        }
    }
    Ok(())
}
