//! Host object model for the lcxl control surface
//!
//! This crate provides:
//! - Abstract contracts for the host-side collaborators a control surface
//!   script is handed: a song of visible tracks, each with an ordered
//!   device chain, plus the mixer's track-bank offset and the physical
//!   encoder controls
//! - Stable identity handles for tracks and parameters
//! - An in-memory session model implementing every contract, for offline
//!   use and test scripting
//!
//! # Architecture
//!
//! ```text
//! host application ──► capability refs (Rc<dyn …>) ──► surface components
//!                                                          │
//!                      devices-changed listeners  ◄────────┘
//! ```
//!
//! Everything here is single-threaded: the host invokes surface entry
//! points and listener callbacks on its one control-surface callback
//! thread, so capabilities are plain `Rc` trait objects and the session
//! model uses `Cell`/`RefCell` interior mutability.

mod api;
mod error;
mod session;

pub use api::{
    Device, DeviceRef, DevicesListener, Encoder, EncoderRef, ListenerId, Mixer, MixerRef,
    Parameter, ParameterId, ParameterRef, Song, SongRef, Track, TrackId, TrackRef,
};
pub use error::{HostError, HostResult};
pub use session::{Session, SessionDevice, SessionEncoder, SessionParameter, SessionTrack};
