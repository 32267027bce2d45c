// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Driver for a six-sensor IMU stamp: two gyroscopes, two accelerometers and
//! two magnetometers sharing one bus, plus a control endpoint used for the
//! reset handshake.
//!
//! ```no_run
//! use imu_stamp::{ImuStamp, RegisterMap, RegisterSensor, SensorSlot};
//!
//! # fn accel_map() -> RegisterMap { unimplemented!() }
//! let mut imu = ImuStamp::new_linux("/dev/i2c-1", Some("IMU_RST"))?;
//! imu.attach(SensorSlot::Accel0, Box::new(RegisterSensor::new(accel_map())))?;
//! imu.begin()?;
//! let [x, y, z] = imu.acceleration()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bank;
pub mod constants;
pub mod driver;
pub mod error;
pub mod interface;
pub mod reports;
pub mod reset;
pub mod sensor;

pub use bank::{SensorBank, SensorSlot};
pub use driver::{ImuStamp, State};
pub use error::{
    AttachError, ImuError, InitializationError, PacketError, ReportNotEnabledError, Result,
    SensorError, TransportError,
};
pub use interface::{HalBus, Transport};
pub use reports::{Reading, ReadingCache, ReportKind};
pub use reset::ResetSequencer;
pub use sensor::{
    ByteOrder, DecodePath, RegisterMap, RegisterSensor, Sample, SensorDriver, SensorFamily,
};
