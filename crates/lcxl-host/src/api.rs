//! Host object-model contracts
//!
//! The surface never opens MIDI ports or enumerates hardware itself; the
//! host application owns transport, dispatch and the document model. These
//! traits are the seam the surface is programmed against. Real embeddings
//! implement them over a host bridge; the [`crate::Session`] model
//! implements them in memory.
//!
//! Contract notes:
//! - Every method that crosses into the host is fallible. Callers decide
//!   whether a fault is fatal; surface components treat each one as
//!   "absent" and degrade.
//! - Listener callbacks take no arguments; registrants capture whatever
//!   context they need. Hosts must not invoke a listener from inside
//!   `add_devices_listener` or `remove_devices_listener`.

use std::rc::Rc;

use crate::error::HostResult;

/// Stable identity of a track within the host document.
///
/// Keys listener registries. Survives device-chain edits; a deleted track's
/// id is never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub u64);

/// Stable identity of a device parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterId(pub u64);

/// Removal token returned by [`Track::add_devices_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(pub u64);

/// Devices-changed callback, fired after a track's device chain mutates.
pub type DevicesListener = Rc<dyn Fn()>;

/// Shared handle to a [`Mixer`] capability
pub type MixerRef = Rc<dyn Mixer>;
/// Shared handle to a [`Song`] capability
pub type SongRef = Rc<dyn Song>;
/// Shared handle to a [`Track`] capability
pub type TrackRef = Rc<dyn Track>;
/// Shared handle to a [`Device`] capability
pub type DeviceRef = Rc<dyn Device>;
/// Shared handle to a [`Parameter`] capability
pub type ParameterRef = Rc<dyn Parameter>;
/// Shared handle to an [`Encoder`] control
pub type EncoderRef = Rc<dyn Encoder>;

/// The mixer section of the host: exposes the track-bank scroll position
pub trait Mixer {
    /// Index of the first track currently inside the controller's
    /// track-bank window.
    fn track_offset(&self) -> HostResult<usize>;
}

/// The host document's track list
pub trait Song {
    /// Ordered list of currently visible tracks.
    fn visible_tracks(&self) -> HostResult<Vec<TrackRef>>;
}

/// A mixer track hosting an ordered device chain
pub trait Track {
    /// Stable identity handle for this track.
    fn id(&self) -> TrackId;

    /// Display name of the track.
    fn name(&self) -> String;

    /// Devices on this track, in host-reported chain order.
    fn devices(&self) -> HostResult<Vec<DeviceRef>>;

    /// Register a callback fired whenever this track's device chain
    /// changes. Returns a token for [`Track::remove_devices_listener`].
    fn add_devices_listener(&self, listener: DevicesListener) -> HostResult<ListenerId>;

    /// Remove a previously registered devices-listener.
    fn remove_devices_listener(&self, listener: ListenerId) -> HostResult<()>;
}

/// An audio effect or instrument on a track, identified by display name
pub trait Device {
    /// Display name of the device (e.g. "Auto Filter").
    fn name(&self) -> String;

    /// Parameters of the device, in host-reported order.
    fn parameters(&self) -> HostResult<Vec<ParameterRef>>;
}

/// An automatable device parameter, the unit of encoder binding
pub trait Parameter {
    /// Stable identity handle for this parameter.
    fn id(&self) -> ParameterId;

    /// Display name of the parameter (e.g. "Frequency").
    fn name(&self) -> String;
}

/// A physical rotary encoder control on the hardware surface
pub trait Encoder {
    /// Bind this encoder to a parameter, replacing any previous binding.
    fn connect_to(&self, parameter: &ParameterRef) -> HostResult<()>;

    /// Release the current binding. Releasing an already unbound encoder
    /// is a no-op `Ok`, never an error.
    fn release_parameter(&self) -> HostResult<()>;
}
