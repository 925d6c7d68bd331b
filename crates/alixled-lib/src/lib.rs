//! alix-leds: front-panel LED and pushbutton control for PC Engines ALIX boards.

pub mod config;
pub mod error;
pub mod hw;
pub mod iface;
pub mod led;
pub mod sampler;
pub mod scheduler;
pub mod switch;

pub use error::AlixError;
