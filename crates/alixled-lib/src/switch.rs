//! Front pushbutton.

use std::time::Duration;

use crate::hw::{LED_ADDRS, PortIo, SWITCH_MASK, SWITCH_PORT};

/// Toggle interval while blinking.
pub const BLINK_INTERVAL: Duration = Duration::from_millis(150);

/// The switch pulls its bit low when pressed.
pub fn is_pressed(io: &impl PortIo) -> bool {
    io.read_switch_word(SWITCH_PORT) & SWITCH_MASK == 0
}

/// Toggle all LEDs until the switch is let go. Returns the number of toggles.
pub fn blink_until_released(io: &impl PortIo, mut sleep: impl FnMut(Duration)) -> usize {
    let mut on = true;
    let mut toggles = 0;
    while is_pressed(io) {
        for addr in LED_ADDRS {
            io.set_led(addr, on);
        }
        sleep(BLINK_INTERVAL);
        on = !on;
        toggles += 1;
    }
    toggles
}

/// LED1 on, the others off.
pub fn restore_leds(io: &impl PortIo) {
    io.set_led(LED_ADDRS[0], true);
    io.set_led(LED_ADDRS[1], false);
    io.set_led(LED_ADDRS[2], false);
}

/// Whole `alix-switch` run: `true` if the switch was pressed.
///
/// LEDs are only touched when it was.
pub fn check(io: &impl PortIo, blink: bool, sleep: impl FnMut(Duration)) -> bool {
    if !is_pressed(io) {
        return false;
    }
    if blink {
        let toggles = blink_until_released(io, sleep);
        log::debug!("switch released after {toggles} toggles");
    }
    restore_leds(io);
    true
}
