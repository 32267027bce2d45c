// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hardware capabilities consumed by the driver.
//!
//! The driver never touches a bus directly. Sub-drivers and the reset
//! sequencer talk to devices through a [`Transport`], drive the reset line
//! through [`gpio::OutputPin`] and wait through [`delay::DelayMs`].

pub mod delay;
pub mod gpio;
pub mod packet;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use embedded_hal::i2c::{ErrorKind, I2c};
use std::{io, path::Path};

use crate::error::TransportError;

pub use packet::{Packet, PacketChannel};

/// Synchronous byte transfers to a device address.
///
/// A transport is owned by exactly one [`SensorBank`](crate::SensorBank) and
/// used strictly sequentially.
pub trait Transport {
    /// Write `bytes` to the device at `address`
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), TransportError>;

    /// Fill `buf` from the device at `address`
    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Write `bytes`, then fill `buf` in the same transaction
    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buf: &mut [u8],
    ) -> Result<(), TransportError>;
}

/// [`Transport`] over any `embedded-hal` I2C bus
pub struct HalBus<I> {
    i2c: I,
}

impl<I: I2c> HalBus<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Returns the wrapped bus.
    pub fn free(self) -> I {
        self.i2c
    }
}

impl HalBus<linux_embedded_hal::I2cdev> {
    /// Open a Linux I2C adapter, e.g. "/dev/i2c-1"
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let i2c = linux_embedded_hal::I2cdev::new(path)
            .map_err(|e| io::Error::other(e.to_string()))?;
        Ok(Self::new(i2c))
    }
}

fn hal_error<E: embedded_hal::i2c::Error>(address: u8, err: E) -> TransportError {
    match err.kind() {
        ErrorKind::NoAcknowledge(_) => TransportError::Nack { address },
        kind => TransportError::Bus {
            address,
            reason: kind.to_string(),
        },
    }
}

impl<I: I2c> Transport for HalBus<I> {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), TransportError> {
        self.i2c
            .write(address, bytes)
            .map_err(|e| hal_error(address, e))
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), TransportError> {
        self.i2c.read(address, buf).map_err(|e| hal_error(address, e))
    }

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        self.i2c
            .write_read(address, bytes, buf)
            .map_err(|e| hal_error(address, e))
    }
}
