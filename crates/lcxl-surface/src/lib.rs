//! Control-surface macro binding for an 8-encoder track bank
//!
//! This crate keeps a bank of hardware rotary encoders bound to the cutoff
//! ("Frequency") of the first "Auto Filter" device on each mixer track
//! inside the controller's visible window:
//!
//! ```text
//! bank scroll ──► full remap ──► per slot: resolve track → find device → bind
//! device change on a watched track ──► rebind that slot only
//! ```
//!
//! The host application owns transport and event dispatch; it constructs a
//! [`MacroBank`] from `lcxl-host` capability refs and forwards bank-scroll
//! and shutdown events to it. Slots degrade independently: a track without
//! the target device leaves its encoder passive, and host faults during
//! lookup or binding are treated as absence rather than errors.

mod bank;
mod config;

pub use bank::MacroBank;
pub use config::{
    default_surface_config_path, load_surface_config, save_surface_config, MacroTarget,
    SurfaceConfig,
};
