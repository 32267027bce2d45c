// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Report kinds and the reading cache.
//!
//! Every decoded sample becomes a [`Reading`] tagged with the [`ReportKind`]
//! it belongs to. The [`ReadingCache`] keeps the newest reading per kind and
//! serves the typed accessors of the driver.

use std::{collections::HashMap, fmt};

use log::trace;

use crate::{
    bank::{SensorBank, SensorSlot},
    constants::{
        REPORT_ACCELEROMETER, REPORT_GYROSCOPE, REPORT_MAGNETOMETER, REPORT_RAW_ACCELEROMETER,
        REPORT_RAW_GYROSCOPE, REPORT_RAW_MAGNETOMETER,
    },
    error::ReportNotEnabledError,
    interface::Transport,
    sensor::{DecodePath, SensorFamily},
};

/// Measurement category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportKind {
    /// Calibrated acceleration (m/s^2)
    Accelerometer,
    /// Calibrated angular rate (rad/s)
    Gyroscope,
    /// Calibrated magnetic field (uTesla)
    Magnetometer,
    /// Unscaled accelerometer counts
    RawAccelerometer,
    /// Unscaled gyroscope counts
    RawGyroscope,
    /// Unscaled magnetometer counts
    RawMagnetometer,
}

impl ReportKind {
    pub const ALL: [ReportKind; 6] = [
        ReportKind::Accelerometer,
        ReportKind::Gyroscope,
        ReportKind::Magnetometer,
        ReportKind::RawAccelerometer,
        ReportKind::RawGyroscope,
        ReportKind::RawMagnetometer,
    ];

    /// Report ID on the wire
    pub fn report_id(self) -> u8 {
        match self {
            ReportKind::Accelerometer => REPORT_ACCELEROMETER,
            ReportKind::Gyroscope => REPORT_GYROSCOPE,
            ReportKind::Magnetometer => REPORT_MAGNETOMETER,
            ReportKind::RawAccelerometer => REPORT_RAW_ACCELEROMETER,
            ReportKind::RawGyroscope => REPORT_RAW_GYROSCOPE,
            ReportKind::RawMagnetometer => REPORT_RAW_MAGNETOMETER,
        }
    }

    pub fn from_report_id(report_id: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.report_id() == report_id)
    }

    /// Kind produced by decoding a `family` sample through `path`
    pub fn for_path(family: SensorFamily, path: DecodePath) -> Self {
        match (family, path) {
            (SensorFamily::Accelerometer, DecodePath::Calibrated) => ReportKind::Accelerometer,
            (SensorFamily::Gyroscope, DecodePath::Calibrated) => ReportKind::Gyroscope,
            (SensorFamily::Magnetometer, DecodePath::Calibrated) => ReportKind::Magnetometer,
            (SensorFamily::Accelerometer, DecodePath::Raw) => ReportKind::RawAccelerometer,
            (SensorFamily::Gyroscope, DecodePath::Raw) => ReportKind::RawGyroscope,
            (SensorFamily::Magnetometer, DecodePath::Raw) => ReportKind::RawMagnetometer,
        }
    }

    pub fn family(self) -> SensorFamily {
        match self {
            ReportKind::Accelerometer | ReportKind::RawAccelerometer => SensorFamily::Accelerometer,
            ReportKind::Gyroscope | ReportKind::RawGyroscope => SensorFamily::Gyroscope,
            ReportKind::Magnetometer | ReportKind::RawMagnetometer => SensorFamily::Magnetometer,
        }
    }

    pub fn is_raw(self) -> bool {
        matches!(
            self,
            ReportKind::RawAccelerometer | ReportKind::RawGyroscope | ReportKind::RawMagnetometer
        )
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_raw() {
            write!(f, "raw {}", self.family())
        } else {
            write!(f, "{}", self.family())
        }
    }
}

/// One decoded measurement.
///
/// Readings are never mutated; a newer reading of the same kind replaces the
/// cached one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub kind: ReportKind,
    /// Sensor that produced the sample
    pub slot: SensorSlot,
    /// [x, y, z]
    pub axes: [f32; 3],
    /// Acceptance order stamped by the bank; grows with every reading
    pub sequence: u64,
}

/// Latest reading per report kind.
///
/// A kind is present only after at least one reading for it was accepted;
/// absence means the stream is not enabled or has not produced data yet,
/// never a zero reading. The cached reading of a kind always carries the
/// highest sequence seen for that kind.
#[derive(Debug, Default)]
pub struct ReadingCache {
    readings: HashMap<ReportKind, Reading>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a reading to the cache.
    ///
    /// Returns false (and keeps the cached value) when a reading of this
    /// kind with an equal or higher sequence is already cached.
    pub fn insert(&mut self, reading: Reading) -> bool {
        if let Some(cached) = self.readings.get(&reading.kind) {
            if reading.sequence <= cached.sequence {
                trace!(
                    "dropping stale {} from {}: seq {} <= {}",
                    reading.kind,
                    reading.slot,
                    reading.sequence,
                    cached.sequence
                );
                return false;
            }
        }
        self.readings.insert(reading.kind, reading);
        true
    }

    /// Pull newly decoded readings from the bank into the cache.
    ///
    /// Returns how many readings were accepted.
    pub fn refresh<T: Transport>(&mut self, bank: &mut SensorBank<T>) -> usize {
        bank.poll_pending()
            .into_iter()
            .filter(|reading| self.insert(*reading))
            .count()
    }

    /// Refresh, then return the latest reading of `kind`.
    pub fn get<T: Transport>(
        &mut self,
        bank: &mut SensorBank<T>,
        kind: ReportKind,
    ) -> Result<Reading, ReportNotEnabledError> {
        self.refresh(bank);
        self.latest(kind)
            .copied()
            .ok_or(ReportNotEnabledError { kind })
    }

    /// Latest cached reading of `kind`, without polling the sensors
    pub fn latest(&self, kind: ReportKind) -> Option<&Reading> {
        self.readings.get(&kind)
    }

    /// Drop every cached reading, e.g. after the sensors rebooted
    pub fn clear(&mut self) {
        self.readings.clear();
    }
}
