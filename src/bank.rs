// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor bank.
//!
//! The stamp carries two of each sensor family. The bank owns the shared
//! transport and the sub-drivers attached to the six slots, brings them
//! online and polls them for new samples. A failing sub-driver is disabled
//! or skipped on its own; it never holds up the other five.

use std::fmt;

use log::{debug, trace, warn};

use crate::{
    error::{AttachError, SensorError, TransportError},
    interface::Transport,
    reports::{Reading, ReportKind},
    sensor::{DecodePath, SensorDriver, SensorFamily},
};

/// Position of a sub-driver on the stamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorSlot {
    Gyro0,
    Gyro1,
    Accel0,
    Accel1,
    Mag0,
    Mag1,
}

impl SensorSlot {
    pub const ALL: [SensorSlot; 6] = [
        SensorSlot::Gyro0,
        SensorSlot::Gyro1,
        SensorSlot::Accel0,
        SensorSlot::Accel1,
        SensorSlot::Mag0,
        SensorSlot::Mag1,
    ];

    pub fn family(self) -> SensorFamily {
        match self {
            SensorSlot::Gyro0 | SensorSlot::Gyro1 => SensorFamily::Gyroscope,
            SensorSlot::Accel0 | SensorSlot::Accel1 => SensorFamily::Accelerometer,
            SensorSlot::Mag0 | SensorSlot::Mag1 => SensorFamily::Magnetometer,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SensorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorSlot::Gyro0 => "gyro0",
            SensorSlot::Gyro1 => "gyro1",
            SensorSlot::Accel0 => "accel0",
            SensorSlot::Accel1 => "accel1",
            SensorSlot::Mag0 => "mag0",
            SensorSlot::Mag1 => "mag1",
        };
        f.write_str(name)
    }
}

/// True if `candidate` follows `seen` in wrapping sequence order
fn is_newer(candidate: u32, seen: u32) -> bool {
    (candidate.wrapping_sub(seen) as i32) > 0
}

struct SlotState<T> {
    slot: SensorSlot,
    driver: Box<dyn SensorDriver<T>>,
    enabled: bool,
    decode_failures: u32,
    /// Last accepted sample sequence, calibrated then raw
    last_sequence: [Option<u32>; 2],
}

impl<T: Transport> SlotState<T> {
    /// Accept `sequence` on `path` unless it repeats or predates the last one
    fn accept(&mut self, path: DecodePath, sequence: u32) -> bool {
        let seen = &mut self.last_sequence[path as usize];
        if seen.is_some_and(|last| !is_newer(sequence, last)) {
            return false;
        }
        *seen = Some(sequence);
        true
    }

    fn record_failure(&mut self, what: &str, err: &SensorError) {
        self.decode_failures = self.decode_failures.saturating_add(1);
        warn!(
            "{} (0x{:02X}) {} failed: {}",
            self.slot,
            self.driver.address(),
            what,
            err
        );
    }
}

/// Owner of the transport and of up to six sub-drivers
pub struct SensorBank<T> {
    bus: T,
    slots: [Option<SlotState<T>>; 6],
    /// Sequence stamped on the last accepted reading
    stamp: u64,
}

impl<T: Transport> SensorBank<T> {
    pub fn new(bus: T) -> Self {
        Self {
            bus,
            slots: std::array::from_fn(|_| None),
            stamp: 0,
        }
    }

    /// Put `driver` in `slot`, replacing any driver already there.
    ///
    /// The slot starts disabled until [`bring_online`](Self::bring_online).
    pub fn attach(
        &mut self,
        slot: SensorSlot,
        driver: Box<dyn SensorDriver<T>>,
    ) -> Result<(), AttachError> {
        if driver.family() != slot.family() {
            return Err(AttachError {
                slot,
                expected: slot.family(),
                found: driver.family(),
            });
        }
        self.slots[slot.index()] = Some(SlotState {
            slot,
            driver,
            enabled: false,
            decode_failures: 0,
            last_sequence: [None; 2],
        });
        Ok(())
    }

    pub fn detach(&mut self, slot: SensorSlot) -> Option<Box<dyn SensorDriver<T>>> {
        self.slots[slot.index()].take().map(|state| state.driver)
    }

    pub fn is_attached(&self, slot: SensorSlot) -> bool {
        self.slots[slot.index()].is_some()
    }

    pub fn is_enabled(&self, slot: SensorSlot) -> bool {
        self.slots[slot.index()]
            .as_ref()
            .is_some_and(|state| state.enabled)
    }

    /// Re-enable a slot after the caller dealt with its failure.
    ///
    /// Returns false if nothing is attached to `slot`.
    pub fn enable(&mut self, slot: SensorSlot) -> bool {
        match self.slots[slot.index()].as_mut() {
            Some(state) => {
                state.enabled = true;
                true
            }
            None => false,
        }
    }

    pub fn enabled_slots(&self) -> Vec<SensorSlot> {
        self.slots
            .iter()
            .flatten()
            .filter(|state| state.enabled)
            .map(|state| state.slot)
            .collect()
    }

    /// Per-device failures seen by `poll_pending` since the slot was attached
    pub fn decode_failures(&self, slot: SensorSlot) -> u32 {
        self.slots[slot.index()]
            .as_ref()
            .map_or(0, |state| state.decode_failures)
    }

    pub fn bus(&self) -> &T {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut T {
        &mut self.bus
    }

    /// Initialize every attached sub-driver.
    ///
    /// A sub-driver that fails is disabled and reported; the others are
    /// still brought up. Sample sequences restart after a reset, so the
    /// history of each slot is dropped.
    pub fn bring_online(&mut self) -> Vec<SensorSlot> {
        let mut failed = Vec::new();
        for state in self.slots.iter_mut().flatten() {
            state.last_sequence = [None; 2];
            match state.driver.initialize(&mut self.bus) {
                Ok(()) => {
                    debug!("{} online", state.slot);
                    state.enabled = true;
                }
                Err(e) => {
                    warn!("{} failed to initialize, disabling: {}", state.slot, e);
                    state.enabled = false;
                    failed.push(state.slot);
                }
            }
        }
        failed
    }

    /// Ask every attached sub-driver for its identity.
    ///
    /// Returns how many confirmed. A sub-driver that NACKs or times out is
    /// still rebooting and simply does not count; any other bus fault is
    /// returned.
    pub fn identify(&mut self) -> Result<usize, TransportError> {
        let mut identified = 0;
        for state in self.slots.iter_mut().flatten() {
            match state.driver.identify(&mut self.bus) {
                Ok(true) => identified += 1,
                Ok(false) => debug!("{} returned an unexpected identity", state.slot),
                Err(SensorError::Transport(e)) if !e.is_transient() => return Err(e),
                Err(e) => debug!("{} did not identify: {}", state.slot, e),
            }
        }
        Ok(identified)
    }

    /// Decode one pending sample from every enabled sub-driver.
    ///
    /// Never blocks on a sensor: one without new data is skipped this pass.
    /// Failures are counted per slot and do not stop the pass. A sample whose
    /// sequence does not advance past the last one from the same sensor is
    /// dropped. Accepted readings are stamped with a bank-wide sequence that
    /// only grows.
    pub fn poll_pending(&mut self) -> Vec<Reading> {
        let mut readings = Vec::new();
        for state in self.slots.iter_mut().flatten() {
            if !state.enabled {
                continue;
            }
            match state.driver.has_new_sample(&mut self.bus) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    state.record_failure("sample check", &e);
                    continue;
                }
            }

            let family = state.driver.family();
            for &path in state.driver.decode_paths() {
                let decoded = match path {
                    DecodePath::Calibrated => state.driver.decode_calibrated(&mut self.bus),
                    DecodePath::Raw => state.driver.decode_raw(&mut self.bus),
                };
                match decoded {
                    Ok(sample) => {
                        let kind = ReportKind::for_path(family, path);
                        if !state.accept(path, sample.sequence) {
                            trace!(
                                "{} dropping stale {} seq {}",
                                state.slot,
                                kind,
                                sample.sequence
                            );
                            continue;
                        }
                        self.stamp += 1;
                        trace!(
                            "{} {} seq {} (#{}): {:?}",
                            state.slot,
                            kind,
                            sample.sequence,
                            self.stamp,
                            sample.axes
                        );
                        readings.push(Reading {
                            kind,
                            slot: state.slot,
                            axes: sample.axes,
                            sequence: self.stamp,
                        });
                    }
                    Err(e) => state.record_failure("decode", &e),
                }
            }
        }
        readings
    }

    /// Returns the transport, dropping the sub-drivers.
    pub fn free(self) -> T {
        self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        interface::mock::MockBus,
        sensor::tests::ScriptedSensor,
    };

    fn scripted(slot: SensorSlot, sequences: &[u32]) -> Box<ScriptedSensor> {
        Box::new(ScriptedSensor::new(
            slot.family(),
            0x10 + slot as u8,
            sequences,
        ))
    }

    fn full_bank(sequences: &[u32]) -> SensorBank<MockBus> {
        let mut bank = SensorBank::new(MockBus::new());
        for slot in SensorSlot::ALL {
            bank.attach(slot, scripted(slot, sequences)).unwrap();
        }
        bank
    }

    #[test]
    fn test_slot_families() {
        assert_eq!(SensorSlot::Gyro1.family(), SensorFamily::Gyroscope);
        assert_eq!(SensorSlot::Accel0.family(), SensorFamily::Accelerometer);
        assert_eq!(SensorSlot::Mag1.family(), SensorFamily::Magnetometer);
        assert_eq!(SensorSlot::Mag1.to_string(), "mag1");
    }

    #[test]
    fn test_attach_rejects_wrong_family() {
        let mut bank = SensorBank::new(MockBus::new());
        let err = bank
            .attach(SensorSlot::Gyro0, scripted(SensorSlot::Mag0, &[]))
            .unwrap_err();
        assert_eq!(
            err,
            AttachError {
                slot: SensorSlot::Gyro0,
                expected: SensorFamily::Gyroscope,
                found: SensorFamily::Magnetometer,
            }
        );
        assert!(!bank.is_attached(SensorSlot::Gyro0));
    }

    #[test]
    fn test_attached_slots_start_disabled() {
        let mut bank = full_bank(&[1]);
        assert!(bank.enabled_slots().is_empty());
        assert!(bank.poll_pending().is_empty());
    }

    #[test]
    fn test_bring_online_isolates_failures() {
        let mut bank = SensorBank::new(MockBus::new());
        let mut stuck = ScriptedSensor::new(SensorFamily::Magnetometer, 0x30, &[1]);
        stuck.init_error = Some(SensorError::Transport(TransportError::Timeout {
            address: 0x30,
        }));
        bank.attach(SensorSlot::Mag0, Box::new(stuck)).unwrap();
        bank.attach(SensorSlot::Accel0, scripted(SensorSlot::Accel0, &[1]))
            .unwrap();

        let failed = bank.bring_online();

        assert_eq!(failed, vec![SensorSlot::Mag0]);
        assert!(!bank.is_enabled(SensorSlot::Mag0));
        assert!(bank.is_enabled(SensorSlot::Accel0));

        let readings = bank.poll_pending();
        assert!(readings.iter().all(|r| r.slot == SensorSlot::Accel0));
        assert_eq!(readings.len(), 2);
    }

    #[test]
    fn test_enable_after_failure() {
        let mut bank = SensorBank::new(MockBus::new());
        assert!(!bank.enable(SensorSlot::Gyro1));
        bank.attach(SensorSlot::Gyro1, scripted(SensorSlot::Gyro1, &[3]))
            .unwrap();
        assert!(bank.enable(SensorSlot::Gyro1));
        assert_eq!(bank.poll_pending().len(), 2);
    }

    #[test]
    fn test_poll_tags_readings_by_path() {
        let mut bank = full_bank(&[9]);
        bank.bring_online();

        let readings = bank.poll_pending();

        assert_eq!(readings.len(), 12);
        for kind in ReportKind::ALL {
            assert_eq!(readings.iter().filter(|r| r.kind == kind).count(), 2);
        }
        let stamps: Vec<u64> = readings.iter().map(|r| r.sequence).collect();
        assert_eq!(stamps, (1..=12).collect::<Vec<u64>>());
    }

    #[test]
    fn test_poll_drops_repeated_and_older_samples() {
        let mut bank = SensorBank::new(MockBus::new());
        bank.attach(SensorSlot::Accel0, scripted(SensorSlot::Accel0, &[5, 5, 3, 6]))
            .unwrap();
        bank.bring_online();

        let accepted: Vec<usize> = (0..4).map(|_| bank.poll_pending().len()).collect();

        assert_eq!(accepted, vec![2, 0, 0, 2]);
    }

    #[test]
    fn test_poll_follows_sequence_wrap() {
        let mut bank = SensorBank::new(MockBus::new());
        bank.attach(
            SensorSlot::Gyro0,
            scripted(SensorSlot::Gyro0, &[u32::MAX - 1, u32::MAX, 0, 1]),
        )
        .unwrap();
        bank.bring_online();

        let mut stamps = Vec::new();
        for _ in 0..4 {
            let readings = bank.poll_pending();
            assert_eq!(readings.len(), 2);
            stamps.extend(readings.iter().map(|r| r.sequence));
        }

        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_bring_online_forgets_sequence_history() {
        let mut bank = SensorBank::new(MockBus::new());
        bank.attach(SensorSlot::Mag0, scripted(SensorSlot::Mag0, &[900, 1]))
            .unwrap();
        bank.bring_online();
        assert_eq!(bank.poll_pending().len(), 2);

        // the sensor restarted its counter after a reset
        bank.bring_online();
        assert_eq!(bank.poll_pending().len(), 2);
    }

    #[test]
    fn test_ready_check_failure_does_not_block_other_sensors() {
        let mut bank = full_bank(&[4]);
        let mut stuck = ScriptedSensor::new(SensorFamily::Magnetometer, 0x30, &[4]);
        stuck.ready_error = Some(SensorError::Transport(TransportError::Timeout {
            address: 0x30,
        }));
        bank.attach(SensorSlot::Mag1, Box::new(stuck)).unwrap();
        bank.bring_online();

        let readings = bank.poll_pending();

        assert_eq!(readings.len(), 10);
        assert!(readings.iter().all(|r| r.slot != SensorSlot::Mag1));
        assert_eq!(bank.decode_failures(SensorSlot::Mag1), 1);
        assert!(bank.is_enabled(SensorSlot::Mag1));
    }

    #[test]
    fn test_poll_skips_idle_sensors() {
        let mut bank = full_bank(&[]);
        bank.bring_online();
        assert!(bank.poll_pending().is_empty());
    }

    #[test]
    fn test_raw_only_driver_produces_raw_kind() {
        let mut bank = SensorBank::new(MockBus::new());
        let mut sensor = ScriptedSensor::new(SensorFamily::Magnetometer, 0x30, &[1]);
        sensor.paths = &[DecodePath::Raw];
        bank.attach(SensorSlot::Mag1, Box::new(sensor)).unwrap();
        bank.bring_online();

        let readings = bank.poll_pending();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].kind, ReportKind::RawMagnetometer);
    }

    #[test]
    fn test_decode_failure_does_not_block_other_sensors() {
        let mut bank = full_bank(&[2]);
        let mut broken = ScriptedSensor::new(SensorFamily::Gyroscope, 0x68, &[2]);
        broken.decode_error = Some(SensorError::Decode {
            reason: "checksum".into(),
        });
        bank.attach(SensorSlot::Gyro0, Box::new(broken)).unwrap();
        bank.bring_online();

        let readings = bank.poll_pending();

        // five healthy sensors, two paths each
        assert_eq!(readings.len(), 10);
        assert!(readings.iter().all(|r| r.slot != SensorSlot::Gyro0));
        assert_eq!(bank.decode_failures(SensorSlot::Gyro0), 2);
        assert_eq!(bank.decode_failures(SensorSlot::Gyro1), 0);
        // the failing device stays enabled for the next pass
        assert!(bank.is_enabled(SensorSlot::Gyro0));
    }

    #[test]
    fn test_identify_counts_and_tolerates_nack() {
        let mut bank = full_bank(&[]);
        let mut rebooting = ScriptedSensor::new(SensorFamily::Accelerometer, 0x4C, &[]);
        rebooting.identity = Err(SensorError::Transport(TransportError::Nack { address: 0x4C }));
        bank.attach(SensorSlot::Accel1, Box::new(rebooting)).unwrap();
        let mut wrong = ScriptedSensor::new(SensorFamily::Magnetometer, 0x30, &[]);
        wrong.identity = Ok(false);
        bank.attach(SensorSlot::Mag0, Box::new(wrong)).unwrap();

        assert_eq!(bank.identify(), Ok(4));
    }

    #[test]
    fn test_identify_propagates_bus_fault() {
        let mut bank = full_bank(&[]);
        let fault = TransportError::Bus {
            address: 0x68,
            reason: "arbitration lost".into(),
        };
        let mut broken = ScriptedSensor::new(SensorFamily::Gyroscope, 0x68, &[]);
        broken.identity = Err(SensorError::Transport(fault.clone()));
        bank.attach(SensorSlot::Gyro0, Box::new(broken)).unwrap();

        assert_eq!(bank.identify(), Err(fault));
    }

    #[test]
    fn test_detach() {
        let mut bank = full_bank(&[]);
        assert!(bank.detach(SensorSlot::Mag1).is_some());
        assert!(!bank.is_attached(SensorSlot::Mag1));
        assert!(bank.detach(SensorSlot::Mag1).is_none());
    }
}
