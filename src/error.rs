// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the imu-stamp driver.

use crate::{bank::SensorSlot, driver::State, reports::ReportKind, sensor::SensorFamily};

/// Result type for facade operations
pub type Result<T> = core::result::Result<T, ImuError>;

/// Bus-level failure reported by a [`Transport`](crate::interface::Transport)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The device at `address` did not acknowledge
    #[error("device 0x{address:02X} did not acknowledge")]
    Nack { address: u8 },

    /// The transaction did not complete in time
    #[error("transaction with device 0x{address:02X} timed out")]
    Timeout { address: u8 },

    /// Any other bus fault
    #[error("bus error talking to device 0x{address:02X}: {reason}")]
    Bus { address: u8, reason: String },
}

impl TransportError {
    /// NACK and timeout are expected while a device is still rebooting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Nack { .. } | Self::Timeout { .. })
    }
}

/// Failure to receive a control packet
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// The endpoint had nothing queued
    #[error("no packet available")]
    NoData,

    /// Header length outside the valid range
    #[error("malformed packet header (length {length})")]
    Malformed { length: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Per-device failure raised by a sub-driver
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Sample bytes could not be turned into a reading
    #[error("could not decode sample: {reason}")]
    Decode { reason: String },

    /// Identity register returned an unexpected value
    #[error("unexpected identity 0x{found:02X} (expected 0x{expected:02X})")]
    Identity { expected: u8, found: u8 },
}

/// The identity check never succeeded within the retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("could not confirm sensor identity after {attempts} attempts")]
pub struct InitializationError {
    pub attempts: u8,
}

/// No reading has been cached for the requested report kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no {kind} report found, is it enabled?")]
pub struct ReportNotEnabledError {
    pub kind: ReportKind,
}

/// A driver was attached to a slot of another sensor family
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("slot {slot} takes a {expected} driver, not a {found} driver")]
pub struct AttachError {
    pub slot: SensorSlot,
    pub expected: SensorFamily,
    pub found: SensorFamily,
}

/// Facade-level errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImuError {
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    ReportNotEnabled(#[from] ReportNotEnabledError),

    /// The operation is not allowed in the driver's current state
    #[error("operation not allowed while driver is {0}")]
    InvalidState(State),
}
