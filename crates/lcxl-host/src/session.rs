//! In-memory session model
//!
//! A scripted implementation of the host contracts. Test suites and
//! embeddings without a live host bridge mutate the model (insert or
//! remove devices, scroll the bank offset, toggle fault injection) and
//! registered devices-listeners fire synchronously, the way they would on
//! the host's callback thread.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::api::{
    Device, DeviceRef, DevicesListener, Encoder, ListenerId, Mixer, MixerRef, Parameter,
    ParameterId, ParameterRef, Song, SongRef, Track, TrackId, TrackRef,
};
use crate::error::{HostError, HostResult};

// Process-wide so identities stay unique across sessions in one test run.
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

fn next_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// In-memory host session: an ordered visible-track list plus the
/// controller's track-bank offset.
///
/// Cheap to clone; clones share the same underlying model.
#[derive(Clone, Default)]
pub struct Session {
    state: Rc<SessionState>,
}

#[derive(Default)]
struct SessionState {
    tracks: RefCell<Vec<Rc<SessionTrack>>>,
    track_offset: Cell<usize>,
    fail_track_offset: Cell<bool>,
    fail_track_list: Cell<bool>,
}

impl Session {
    /// Create an empty session with offset 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capability ref for the visible-track list.
    pub fn song(&self) -> SongRef {
        Rc::new(SessionSong {
            state: Rc::clone(&self.state),
        })
    }

    /// Capability ref for the mixer's bank-offset lookup.
    pub fn mixer(&self) -> MixerRef {
        Rc::new(SessionMixer {
            state: Rc::clone(&self.state),
        })
    }

    /// Append a track to the visible list.
    pub fn add_track(&self, name: &str) -> Rc<SessionTrack> {
        let track = Rc::new(SessionTrack::new(name));
        self.state.tracks.borrow_mut().push(Rc::clone(&track));
        track
    }

    /// Track at `index` in the visible list, if any.
    pub fn track(&self, index: usize) -> Option<Rc<SessionTrack>> {
        self.state.tracks.borrow().get(index).cloned()
    }

    /// Scroll the track-bank window.
    pub fn set_track_offset(&self, offset: usize) {
        self.state.track_offset.set(offset);
    }

    /// Make subsequent offset lookups fail until reset.
    pub fn fail_track_offset(&self, fail: bool) {
        self.state.fail_track_offset.set(fail);
    }

    /// Make subsequent visible-track lookups fail until reset.
    pub fn fail_track_list(&self, fail: bool) {
        self.state.fail_track_list.set(fail);
    }
}

struct SessionSong {
    state: Rc<SessionState>,
}

impl Song for SessionSong {
    fn visible_tracks(&self) -> HostResult<Vec<TrackRef>> {
        if self.state.fail_track_list.get() {
            return Err(HostError::Unavailable("visible track list"));
        }
        Ok(self
            .state
            .tracks
            .borrow()
            .iter()
            .map(|track| Rc::clone(track) as TrackRef)
            .collect())
    }
}

struct SessionMixer {
    state: Rc<SessionState>,
}

impl Mixer for SessionMixer {
    fn track_offset(&self) -> HostResult<usize> {
        if self.state.fail_track_offset.get() {
            return Err(HostError::Unavailable("track offset"));
        }
        Ok(self.state.track_offset.get())
    }
}

/// A mixer track with a mutable device chain.
///
/// `insert_device`/`remove_device` notify registered devices-listeners
/// synchronously over a snapshot of the listener list, so a firing
/// callback never observes registrations made while it runs.
pub struct SessionTrack {
    id: TrackId,
    name: String,
    devices: RefCell<Vec<Rc<SessionDevice>>>,
    listeners: RefCell<Vec<(ListenerId, DevicesListener)>>,
}

impl SessionTrack {
    fn new(name: &str) -> Self {
        Self {
            id: TrackId(next_object_id()),
            name: name.to_string(),
            devices: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Append a device to the chain and notify listeners.
    pub fn insert_device(&self, device: SessionDevice) -> Rc<SessionDevice> {
        let device = Rc::new(device);
        self.devices.borrow_mut().push(Rc::clone(&device));
        self.notify_devices_changed();
        device
    }

    /// Remove the device at `index` from the chain, if present, and notify
    /// listeners.
    pub fn remove_device(&self, index: usize) {
        let removed = {
            let mut devices = self.devices.borrow_mut();
            if index < devices.len() {
                Some(devices.remove(index))
            } else {
                None
            }
        };
        if removed.is_some() {
            self.notify_devices_changed();
        }
    }

    /// Number of currently registered devices-listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn notify_devices_changed(&self) {
        let snapshot: Vec<DevicesListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        log::debug!(
            "session: devices changed on '{}', notifying {} listener(s)",
            self.name,
            snapshot.len()
        );
        for listener in snapshot {
            listener();
        }
    }
}

impl Track for SessionTrack {
    fn id(&self) -> TrackId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn devices(&self) -> HostResult<Vec<DeviceRef>> {
        Ok(self
            .devices
            .borrow()
            .iter()
            .map(|device| Rc::clone(device) as DeviceRef)
            .collect())
    }

    fn add_devices_listener(&self, listener: DevicesListener) -> HostResult<ListenerId> {
        let token = ListenerId(next_object_id());
        self.listeners.borrow_mut().push((token, listener));
        Ok(token)
    }

    fn remove_devices_listener(&self, listener: ListenerId) -> HostResult<()> {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(token, _)| *token != listener);
        if listeners.len() == before {
            return Err(HostError::UnknownListener);
        }
        Ok(())
    }
}

/// A device in a track's chain, identified by display name.
pub struct SessionDevice {
    name: String,
    parameters: Vec<Rc<SessionParameter>>,
}

impl SessionDevice {
    /// Create a device with an empty parameter list.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: Vec::new(),
        }
    }

    /// Builder: append a parameter with the given display name.
    pub fn with_parameter(mut self, name: &str) -> Self {
        self.parameters.push(Rc::new(SessionParameter::new(name)));
        self
    }

    /// First parameter with the given display name, if any.
    pub fn parameter_named(&self, name: &str) -> Option<Rc<SessionParameter>> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name == name)
            .cloned()
    }
}

impl Device for SessionDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn parameters(&self) -> HostResult<Vec<ParameterRef>> {
        Ok(self
            .parameters
            .iter()
            .map(|parameter| Rc::clone(parameter) as ParameterRef)
            .collect())
    }
}

/// A named, automatable device parameter.
pub struct SessionParameter {
    id: ParameterId,
    name: String,
}

impl SessionParameter {
    fn new(name: &str) -> Self {
        Self {
            id: ParameterId(next_object_id()),
            name: name.to_string(),
        }
    }
}

impl Parameter for SessionParameter {
    fn id(&self) -> ParameterId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// A physical-encoder stand-in that records what it is bound to.
#[derive(Default)]
pub struct SessionEncoder {
    connected: RefCell<Option<ParameterRef>>,
    connect_fault: Cell<bool>,
}

impl SessionEncoder {
    /// Create an unbound encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameter this encoder is currently connected to, if any.
    pub fn connected(&self) -> Option<ParameterRef> {
        self.connected.borrow().clone()
    }

    /// Identity of the connected parameter, if any.
    pub fn connected_id(&self) -> Option<ParameterId> {
        self.connected.borrow().as_ref().map(|p| p.id())
    }

    /// Make subsequent connect attempts fail until reset.
    pub fn fail_connect(&self, fail: bool) {
        self.connect_fault.set(fail);
    }
}

impl Encoder for SessionEncoder {
    fn connect_to(&self, parameter: &ParameterRef) -> HostResult<()> {
        if self.connect_fault.get() {
            return Err(HostError::Unavailable("encoder"));
        }
        *self.connected.borrow_mut() = Some(Rc::clone(parameter));
        Ok(())
    }

    fn release_parameter(&self) -> HostResult<()> {
        // Releasing an unbound encoder is a no-op by contract.
        self.connected.borrow_mut().take();
        Ok(())
    }
}
