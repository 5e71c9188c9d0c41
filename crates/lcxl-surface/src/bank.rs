//! The encoder/macro bank
//!
//! One [`MacroBank`] owns the whole behavior: per slot it resolves the
//! visible track behind `bank offset + slot`, scans that track's device
//! chain for the target device and parameter by exact name, and binds the
//! slot's encoder to the result. Each resolved track carries one
//! devices-listener so a device added or removed at runtime rebinds just
//! the affected slot; a bank scroll remaps all slots.
//!
//! Every host call is best-effort: lookup faults degrade to "no track",
//! binding faults are swallowed and the bookkeeping still advances. The
//! bank never surfaces an error to its owner.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use lcxl_host::{
    DeviceRef, DevicesListener, EncoderRef, ListenerId, MixerRef, ParameterRef, SongRef, TrackId,
    TrackRef,
};

use crate::config::MacroTarget;

/// A registered devices-listener on one watched track.
struct TrackWatch {
    track: TrackRef,
    listener: ListenerId,
}

/// Binds each encoder slot to the target parameter of the first matching
/// device on the slot's visible track.
///
/// Construction performs the initial full remap. The owning script calls
/// [`MacroBank::on_track_offset_changed`] on bank-scroll events and
/// [`MacroBank::disconnect`] on shutdown. All entry points, including the
/// listener callbacks the bank registers on tracks, run on the host's
/// single control-surface callback thread.
pub struct MacroBank {
    mixer: MixerRef,
    song: SongRef,
    encoders: Vec<Option<EncoderRef>>,
    target: MacroTarget,
    bank_size: usize,
    /// Parameter last bound per slot (`None` = encoder passive).
    bound: Vec<Option<ParameterRef>>,
    /// At most one watch per distinct track identity.
    watches: HashMap<TrackId, TrackWatch>,
    /// Self-handle handed to listener closures.
    handle: Weak<RefCell<MacroBank>>,
}

impl MacroBank {
    /// Create a bank with the default Auto Filter / Frequency target and
    /// perform the initial full remap.
    ///
    /// `encoders` holds the physical controls in slot order; a `None`
    /// entry marks a slot with no encoder, which is never bound.
    pub fn new(
        mixer: MixerRef,
        encoders: Vec<Option<EncoderRef>>,
        song: SongRef,
        bank_size: usize,
    ) -> Rc<RefCell<Self>> {
        Self::with_target(mixer, encoders, song, bank_size, MacroTarget::default())
    }

    /// Create a bank looking up a custom device/parameter name pair.
    pub fn with_target(
        mixer: MixerRef,
        encoders: Vec<Option<EncoderRef>>,
        song: SongRef,
        bank_size: usize,
        target: MacroTarget,
    ) -> Rc<RefCell<Self>> {
        let bank = Rc::new_cyclic(|handle: &Weak<RefCell<Self>>| {
            RefCell::new(Self {
                mixer,
                song,
                encoders,
                target,
                bank_size,
                bound: vec![None; bank_size],
                watches: HashMap::new(),
                handle: handle.clone(),
            })
        });
        bank.borrow_mut().remap_all();
        bank
    }

    /// Number of encoder slots in the bank.
    pub fn bank_size(&self) -> usize {
        self.bank_size
    }

    /// Parameter currently recorded as bound to `slot`, if any.
    pub fn bound_parameter(&self, slot: usize) -> Option<ParameterRef> {
        self.bound.get(slot).and_then(|parameter| parameter.clone())
    }

    /// Number of tracks currently carrying a devices-listener.
    pub fn watched_track_count(&self) -> usize {
        self.watches.len()
    }

    /// Bank-scroll notification: the visible window moved, so every slot
    /// resolves against a new track.
    pub fn on_track_offset_changed(&mut self) {
        self.remap_all();
    }

    /// Remove every registered listener and release every encoder.
    ///
    /// Safe to call repeatedly and on a bank that never bound anything.
    pub fn disconnect(&mut self) {
        self.clear_watches();
        for encoder in self.encoders.iter().flatten() {
            let _ = encoder.release_parameter();
        }
        for slot in self.bound.iter_mut() {
            *slot = None;
        }
        log::debug!("disconnect: bank released");
    }

    /// Track behind `slot` under the current bank offset.
    ///
    /// Any host fault or out-of-range index is "no track".
    fn resolve_track(&self, slot: usize) -> Option<TrackRef> {
        let offset = self.mixer.track_offset().ok()?;
        let index = offset.checked_add(slot)?;
        self.song.visible_tracks().ok()?.into_iter().nth(index)
    }

    /// First device on `track` whose name matches the target exactly.
    fn find_target_device(&self, track: &TrackRef) -> Option<DeviceRef> {
        track
            .devices()
            .ok()?
            .into_iter()
            .find(|device| device.name() == self.target.device_name)
    }

    /// Target parameter of `device`, by exact name.
    fn find_target_parameter(&self, device: &DeviceRef) -> Option<ParameterRef> {
        device
            .parameters()
            .ok()?
            .into_iter()
            .find(|parameter| parameter.name() == self.target.parameter_name)
    }

    /// Re-resolve and rebind one slot.
    ///
    /// The previous binding is released unconditionally before the new
    /// resolution is recorded; release and connect are both best-effort,
    /// so the bookkeeping stays consistent even when the host refuses a
    /// call. Slots without a physical encoder are skipped entirely.
    fn bind_slot(&mut self, slot: usize) {
        let encoder = match self.encoders.get(slot).and_then(|encoder| encoder.clone()) {
            Some(encoder) => encoder,
            None => return,
        };

        let track = self.resolve_track(slot);
        let device = track.as_ref().and_then(|track| self.find_target_device(track));
        let parameter = device
            .as_ref()
            .and_then(|device| self.find_target_parameter(device));

        if self.bound[slot].is_some() {
            let _ = encoder.release_parameter();
        }

        self.bound[slot] = parameter.clone();

        if let Some(parameter) = &parameter {
            let _ = encoder.connect_to(parameter);
            log::debug!("bind_slot: slot {} -> '{}'", slot, parameter.name());
        } else {
            log::debug!("bind_slot: slot {} passive", slot);
        }
    }

    /// Full remap: drop every watch, then rebind and re-watch each slot in
    /// index order. Runs on initialization and after every bank scroll.
    fn remap_all(&mut self) {
        log::debug!("remap_all: remapping {} slot(s)", self.bank_size);
        self.clear_watches();
        for slot in 0..self.bank_size {
            self.bind_slot(slot);
            self.watch_track(slot);
        }
    }

    /// Watch `slot`'s resolved track for device-chain changes so the slot
    /// rebinds without a full rescan.
    ///
    /// The listener closure captures the slot index and a weak bank
    /// handle; a track already watched for an earlier slot is not watched
    /// again.
    fn watch_track(&mut self, slot: usize) {
        let track = match self.resolve_track(slot) {
            Some(track) => track,
            None => return,
        };

        let id = track.id();
        if self.watches.contains_key(&id) {
            return;
        }

        let handle = self.handle.clone();
        let listener: DevicesListener = Rc::new(move || {
            if let Some(bank) = handle.upgrade() {
                bank.borrow_mut().bind_slot(slot);
            }
        });

        if let Ok(token) = track.add_devices_listener(listener) {
            log::debug!("watch_track: watching '{}' for slot {}", track.name(), slot);
            self.watches.insert(
                id,
                TrackWatch {
                    track,
                    listener: token,
                },
            );
        }
    }

    /// Remove every registered devices-listener, best-effort per track.
    fn clear_watches(&mut self) {
        for (_, watch) in self.watches.drain() {
            let _ = watch.track.remove_devices_listener(watch.listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcxl_host::{Parameter, Session, SessionDevice, SessionEncoder};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// An Auto Filter with Frequency buried between other parameters.
    fn auto_filter() -> SessionDevice {
        SessionDevice::new("Auto Filter")
            .with_parameter("LFO Amount")
            .with_parameter("Frequency")
            .with_parameter("Resonance")
    }

    fn encoder_bank(n: usize) -> Vec<Rc<SessionEncoder>> {
        (0..n).map(|_| Rc::new(SessionEncoder::new())).collect()
    }

    fn encoder_refs(encoders: &[Rc<SessionEncoder>]) -> Vec<Option<EncoderRef>> {
        encoders
            .iter()
            .map(|encoder| Some(Rc::clone(encoder) as EncoderRef))
            .collect()
    }

    fn session_with_tracks(n: usize) -> Session {
        let session = Session::new();
        for i in 0..n {
            session.add_track(&format!("Track {}", i + 1));
        }
        session
    }

    #[test]
    fn test_slot_binds_iff_filter_with_frequency_present() {
        init_logging();
        let session = session_with_tracks(8);
        let filter = session.track(3).unwrap().insert_device(auto_filter());
        // A filter without the target parameter never binds.
        session
            .track(6)
            .unwrap()
            .insert_device(SessionDevice::new("Auto Filter").with_parameter("Resonance"));
        let frequency = filter.parameter_named("Frequency").unwrap();

        let encoders = encoder_bank(8);
        let bank = MacroBank::new(
            session.mixer(),
            encoder_refs(&encoders),
            session.song(),
            8,
        );

        for slot in 0..8 {
            if slot == 3 {
                assert_eq!(encoders[slot].connected_id(), Some(frequency.id()));
                assert_eq!(
                    bank.borrow().bound_parameter(slot).map(|p| p.id()),
                    Some(frequency.id())
                );
            } else {
                assert!(encoders[slot].connected().is_none());
                assert!(bank.borrow().bound_parameter(slot).is_none());
            }
        }
    }

    #[test]
    fn test_remap_is_idempotent() {
        let session = session_with_tracks(8);
        session.track(0).unwrap().insert_device(auto_filter());
        session.track(5).unwrap().insert_device(auto_filter());

        let encoders = encoder_bank(8);
        let bank = MacroBank::new(
            session.mixer(),
            encoder_refs(&encoders),
            session.song(),
            8,
        );

        let before: Vec<_> = (0..8)
            .map(|slot| bank.borrow().bound_parameter(slot).map(|p| p.id()))
            .collect();

        bank.borrow_mut().on_track_offset_changed();
        bank.borrow_mut().on_track_offset_changed();

        let after: Vec<_> = (0..8)
            .map(|slot| bank.borrow().bound_parameter(slot).map(|p| p.id()))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_one_listener_per_track_across_remaps() {
        let session = session_with_tracks(8);
        let encoders = encoder_bank(8);
        let bank = MacroBank::new(
            session.mixer(),
            encoder_refs(&encoders),
            session.song(),
            8,
        );

        assert_eq!(bank.borrow().watched_track_count(), 8);
        for i in 0..8 {
            assert_eq!(session.track(i).unwrap().listener_count(), 1);
        }

        // Remapping must not stack listeners.
        bank.borrow_mut().on_track_offset_changed();
        bank.borrow_mut().on_track_offset_changed();
        assert_eq!(bank.borrow().watched_track_count(), 8);
        for i in 0..8 {
            assert_eq!(session.track(i).unwrap().listener_count(), 1);
        }
    }

    #[test]
    fn test_bank_scroll_rebinds_against_new_window() {
        let session = session_with_tracks(16);
        let filter = session.track(10).unwrap().insert_device(auto_filter());
        let frequency = filter.parameter_named("Frequency").unwrap();

        let encoders = encoder_bank(8);
        let bank = MacroBank::new(
            session.mixer(),
            encoder_refs(&encoders),
            session.song(),
            8,
        );

        // Track 10 is outside the initial window.
        assert!((0..8).all(|slot| bank.borrow().bound_parameter(slot).is_none()));

        session.set_track_offset(8);
        bank.borrow_mut().on_track_offset_changed();

        assert_eq!(encoders[2].connected_id(), Some(frequency.id()));
        for slot in [0, 1, 3, 4, 5, 6, 7] {
            assert!(encoders[slot].connected().is_none());
        }

        // All listeners moved with the window.
        for i in 0..8 {
            assert_eq!(session.track(i).unwrap().listener_count(), 0);
        }
        for i in 8..16 {
            assert_eq!(session.track(i).unwrap().listener_count(), 1);
        }
    }

    #[test]
    fn test_device_added_at_runtime_rebinds_only_that_slot() {
        let session = session_with_tracks(8);
        let filter0 = session.track(0).unwrap().insert_device(auto_filter());
        let frequency0 = filter0.parameter_named("Frequency").unwrap();

        let encoders = encoder_bank(8);
        let bank = MacroBank::new(
            session.mixer(),
            encoder_refs(&encoders),
            session.song(),
            8,
        );
        assert!(encoders[5].connected().is_none());

        let filter5 = session.track(5).unwrap().insert_device(auto_filter());
        let frequency5 = filter5.parameter_named("Frequency").unwrap();

        assert_eq!(encoders[5].connected_id(), Some(frequency5.id()));
        assert_eq!(
            bank.borrow().bound_parameter(5).map(|p| p.id()),
            Some(frequency5.id())
        );
        // Slot 0 kept its original binding, untouched by slot 5's change.
        assert_eq!(encoders[0].connected_id(), Some(frequency0.id()));

        // Removing the filter makes the slot passive again.
        session.track(5).unwrap().remove_device(0);
        assert!(encoders[5].connected().is_none());
        assert!(bank.borrow().bound_parameter(5).is_none());
    }

    #[test]
    fn test_offset_fault_degrades_to_unbound() {
        let session = session_with_tracks(8);
        session.track(2).unwrap().insert_device(auto_filter());
        session.fail_track_offset(true);

        let encoders = encoder_bank(8);
        let bank = MacroBank::new(
            session.mixer(),
            encoder_refs(&encoders),
            session.song(),
            8,
        );

        assert!((0..8).all(|slot| bank.borrow().bound_parameter(slot).is_none()));
        assert_eq!(bank.borrow().watched_track_count(), 0);

        // Recovery on the next remap once the host answers again.
        session.fail_track_offset(false);
        bank.borrow_mut().on_track_offset_changed();
        assert!(bank.borrow().bound_parameter(2).is_some());
        assert_eq!(bank.borrow().watched_track_count(), 8);
    }

    #[test]
    fn test_track_list_fault_degrades_to_unbound() {
        let session = session_with_tracks(8);
        session.track(0).unwrap().insert_device(auto_filter());
        session.fail_track_list(true);

        let encoders = encoder_bank(8);
        let bank = MacroBank::new(
            session.mixer(),
            encoder_refs(&encoders),
            session.song(),
            8,
        );

        assert!((0..8).all(|slot| bank.borrow().bound_parameter(slot).is_none()));
        assert!(encoders[0].connected().is_none());
    }

    #[test]
    fn test_disconnect_twice_is_a_no_op() {
        let session = session_with_tracks(8);
        session.track(1).unwrap().insert_device(auto_filter());

        let encoders = encoder_bank(8);
        let bank = MacroBank::new(
            session.mixer(),
            encoder_refs(&encoders),
            session.song(),
            8,
        );
        assert!(encoders[1].connected().is_some());

        bank.borrow_mut().disconnect();
        assert!((0..8).all(|slot| encoders[slot].connected().is_none()));
        assert!((0..8).all(|slot| bank.borrow().bound_parameter(slot).is_none()));
        assert_eq!(bank.borrow().watched_track_count(), 0);
        assert_eq!(session.track(1).unwrap().listener_count(), 0);

        bank.borrow_mut().disconnect();
        assert!((0..8).all(|slot| encoders[slot].connected().is_none()));
        assert_eq!(bank.borrow().watched_track_count(), 0);
    }

    #[test]
    fn test_first_matching_device_wins() {
        let session = session_with_tracks(1);
        let track = session.track(0).unwrap();
        let first = track.insert_device(auto_filter());
        track.insert_device(auto_filter());
        let frequency = first.parameter_named("Frequency").unwrap();

        let encoders = encoder_bank(1);
        MacroBank::new(session.mixer(), encoder_refs(&encoders), session.song(), 1);

        assert_eq!(encoders[0].connected_id(), Some(frequency.id()));
    }

    #[test]
    fn test_device_name_match_is_case_sensitive() {
        let session = session_with_tracks(1);
        session
            .track(0)
            .unwrap()
            .insert_device(SessionDevice::new("auto filter").with_parameter("Frequency"));

        let encoders = encoder_bank(1);
        let bank = MacroBank::new(session.mixer(), encoder_refs(&encoders), session.song(), 1);

        assert!(bank.borrow().bound_parameter(0).is_none());
        assert!(encoders[0].connected().is_none());
    }

    #[test]
    fn test_slot_without_encoder_is_skipped_but_still_watched() {
        let session = session_with_tracks(8);
        session.track(2).unwrap().insert_device(auto_filter());

        let encoders = encoder_bank(8);
        let mut refs = encoder_refs(&encoders);
        refs[2] = None;

        let bank = MacroBank::new(session.mixer(), refs, session.song(), 8);

        // No encoder, no binding and no bookkeeping for that slot.
        assert!(bank.borrow().bound_parameter(2).is_none());
        // The track is still watched so a later remap with hardware works.
        assert_eq!(session.track(2).unwrap().listener_count(), 1);
        assert_eq!(bank.borrow().watched_track_count(), 8);
    }

    #[test]
    fn test_short_track_list_leaves_tail_slots_unbound() {
        let session = session_with_tracks(4);
        session.track(3).unwrap().insert_device(auto_filter());

        let encoders = encoder_bank(8);
        let bank = MacroBank::new(
            session.mixer(),
            encoder_refs(&encoders),
            session.song(),
            8,
        );

        assert!(bank.borrow().bound_parameter(3).is_some());
        assert!((4..8).all(|slot| bank.borrow().bound_parameter(slot).is_none()));
        assert_eq!(bank.borrow().watched_track_count(), 4);
    }

    #[test]
    fn test_connect_fault_still_advances_bookkeeping() {
        let session = session_with_tracks(1);
        session.track(0).unwrap().insert_device(auto_filter());

        let encoders = encoder_bank(1);
        encoders[0].fail_connect(true);

        let bank = MacroBank::new(session.mixer(), encoder_refs(&encoders), session.song(), 1);

        // The host refused the bind, but the bank's state advanced.
        assert!(encoders[0].connected().is_none());
        assert!(bank.borrow().bound_parameter(0).is_some());
    }

    #[test]
    fn test_custom_target_names() {
        let session = session_with_tracks(1);
        let device = session.track(0).unwrap().insert_device(
            SessionDevice::new("Operator").with_parameter("Filter Freq"),
        );
        let parameter = device.parameter_named("Filter Freq").unwrap();

        let encoders = encoder_bank(1);
        MacroBank::with_target(
            session.mixer(),
            encoder_refs(&encoders),
            session.song(),
            1,
            MacroTarget {
                device_name: "Operator".to_string(),
                parameter_name: "Filter Freq".to_string(),
            },
        );

        assert_eq!(encoders[0].connected_id(), Some(parameter.id()));
    }
}
