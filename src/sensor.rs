// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sub-driver capability.
//!
//! Each physical chip on the stamp is driven by a [`SensorDriver`]. The
//! driver owns no bus: every call borrows the transport owned by the
//! [`SensorBank`](crate::SensorBank), so transactions never overlap.
//!
//! [`RegisterSensor`] covers chips that expose an identity register, a
//! data-ready flag and three consecutive 16-bit output registers. The
//! register values of a particular chip are supplied by the caller through a
//! [`RegisterMap`].

use std::fmt;

use log::{debug, trace};

use crate::{error::SensorError, interface::Transport};

/// Kind of physical sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorFamily {
    Gyroscope,
    Accelerometer,
    Magnetometer,
}

impl SensorFamily {
    pub const ALL: [SensorFamily; 3] = [
        SensorFamily::Gyroscope,
        SensorFamily::Accelerometer,
        SensorFamily::Magnetometer,
    ];
}

impl fmt::Display for SensorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorFamily::Gyroscope => "gyroscope",
            SensorFamily::Accelerometer => "accelerometer",
            SensorFamily::Magnetometer => "magnetometer",
        };
        f.write_str(name)
    }
}

/// Decode entry point exposed by a sub-driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodePath {
    /// Scaled to physical units with the sub-driver's calibration applied
    Calibrated,
    /// Unscaled register counts
    Raw,
}

/// A sub-driver's native sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// [x, y, z]
    pub axes: [f32; 3],
    /// Per-sensor sample counter, wraps around at `u32::MAX`
    pub sequence: u32,
}

/// Capability implemented once per chip family
pub trait SensorDriver<T> {
    fn family(&self) -> SensorFamily;

    /// Bus address of the chip
    fn address(&self) -> u8;

    /// Configure the chip for measurement
    fn initialize(&mut self, bus: &mut T) -> Result<(), SensorError>;

    /// Does the chip answer with the expected identity?
    fn identify(&mut self, bus: &mut T) -> Result<bool, SensorError>;

    /// Is a sample ready that has not been decoded yet?
    fn has_new_sample(&mut self, bus: &mut T) -> Result<bool, SensorError>;

    fn decode_calibrated(&mut self, bus: &mut T) -> Result<Sample, SensorError>;

    fn decode_raw(&mut self, bus: &mut T) -> Result<Sample, SensorError>;

    /// Decode paths this driver exposes, in the order they are read
    fn decode_paths(&self) -> &'static [DecodePath] {
        &[DecodePath::Calibrated, DecodePath::Raw]
    }
}

/// Byte order of the output registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// Register layout of a chip driven by [`RegisterSensor`]
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMap {
    pub family: SensorFamily,
    /// 7-bit bus address
    pub address: u8,
    /// Register holding the chip identity
    pub id_register: u8,
    pub expected_id: u8,
    /// Register holding the data-ready flag
    pub status_register: u8,
    pub ready_mask: u8,
    /// First of six output registers (x, y, z)
    pub data_register: u8,
    pub byte_order: ByteOrder,
    /// (register, value) pairs written by `initialize`, in order
    pub config_writes: Vec<(u8, u8)>,
    /// Physical units per count
    pub scale: f32,
    /// Subtracted after scaling
    pub bias: [f32; 3],
}

/// Generic register-mapped sub-driver
pub struct RegisterSensor {
    map: RegisterMap,
    /// Counts of the last sample latched by `has_new_sample`
    latched: Option<[i16; 3]>,
    sequence: u32,
}

impl RegisterSensor {
    pub fn new(map: RegisterMap) -> Self {
        Self {
            map,
            latched: None,
            sequence: 0,
        }
    }

    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    fn read_register<T: Transport>(&self, bus: &mut T, register: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        bus.write_read(self.map.address, &[register], &mut buf)?;
        Ok(buf[0])
    }

    fn read_counts<T: Transport>(&self, bus: &mut T) -> Result<[i16; 3], SensorError> {
        let mut buf = [0u8; 6];
        bus.write_read(self.map.address, &[self.map.data_register], &mut buf)?;
        let word = |i: usize| match self.map.byte_order {
            ByteOrder::LittleEndian => i16::from_le_bytes([buf[i], buf[i + 1]]),
            ByteOrder::BigEndian => i16::from_be_bytes([buf[i], buf[i + 1]]),
        };
        Ok([word(0), word(2), word(4)])
    }

    fn latched(&self) -> Result<[i16; 3], SensorError> {
        self.latched.ok_or_else(|| SensorError::Decode {
            reason: format!("no sample latched on 0x{:02X}", self.map.address),
        })
    }
}

impl<T: Transport> SensorDriver<T> for RegisterSensor {
    fn family(&self) -> SensorFamily {
        self.map.family
    }

    fn address(&self) -> u8 {
        self.map.address
    }

    fn initialize(&mut self, bus: &mut T) -> Result<(), SensorError> {
        let found = self.read_register(bus, self.map.id_register)?;
        if found != self.map.expected_id {
            return Err(SensorError::Identity {
                expected: self.map.expected_id,
                found,
            });
        }
        for &(register, value) in &self.map.config_writes {
            trace!("0x{:02X}: write 0x{:02X} = 0x{:02X}", self.map.address, register, value);
            bus.write(self.map.address, &[register, value])?;
        }
        self.latched = None;
        debug!("{} at 0x{:02X} configured", self.map.family, self.map.address);
        Ok(())
    }

    fn identify(&mut self, bus: &mut T) -> Result<bool, SensorError> {
        let found = self.read_register(bus, self.map.id_register)?;
        trace!("0x{:02X}: id 0x{:02X}", self.map.address, found);
        Ok(found == self.map.expected_id)
    }

    fn has_new_sample(&mut self, bus: &mut T) -> Result<bool, SensorError> {
        let status = self.read_register(bus, self.map.status_register)?;
        if status & self.map.ready_mask == 0 {
            return Ok(false);
        }
        // reading the outputs clears the ready flag on the chip
        self.latched = Some(self.read_counts(bus)?);
        self.sequence = self.sequence.wrapping_add(1);
        Ok(true)
    }

    fn decode_calibrated(&mut self, _bus: &mut T) -> Result<Sample, SensorError> {
        let counts = self.latched()?;
        let mut axes = [0.0; 3];
        for (axis, (&count, bias)) in axes.iter_mut().zip(counts.iter().zip(self.map.bias)) {
            *axis = f32::from(count) * self.map.scale - bias;
        }
        Ok(Sample {
            axes,
            sequence: self.sequence,
        })
    }

    fn decode_raw(&mut self, _bus: &mut T) -> Result<Sample, SensorError> {
        let counts = self.latched()?;
        Ok(Sample {
            axes: counts.map(f32::from),
            sequence: self.sequence,
        })
    }
}
