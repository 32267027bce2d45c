// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reset line control
//!
//! The stamp's shared reset line is a plain digital output. [`GpiodOut`]
//! drives it through the Linux GPIO character device.

use gpiod::{Chip, Lines, Options, Output};
use log::trace;
use std::io::{self, Error, ErrorKind};

/// Digital output level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    /// Low pin state
    Low,
    /// High pin state
    High,
}

pub trait OutputPin {
    /// Error type
    type Error: core::fmt::Debug;

    /// Drives the pin low
    ///
    /// *NOTE* the actual electrical state of the pin may not actually be low,
    /// e.g. due to external electrical sources
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Drives the pin high
    ///
    /// *NOTE* the actual electrical state of the pin may not actually be high,
    /// e.g. due to external electrical sources
    fn set_high(&mut self) -> Result<(), Self::Error>;

    /// Drives the pin high or low depending on the provided value
    fn set_state(&mut self, state: PinState) -> Result<(), Self::Error> {
        match state {
            PinState::Low => self.set_low(),
            PinState::High => self.set_high(),
        }
    }
}

/// Output line requested from a GPIO chip
pub struct GpiodOut {
    output: Lines<Output>,
}

impl GpiodOut {
    /// Request line `pin` of `chip` as an output, initially high so the
    /// sensors are not held in reset.
    pub fn new(chip: &Chip, pin: u32) -> io::Result<GpiodOut> {
        let opts = Options::output([pin])
            .values([true])
            .consumer("imu-stamp-reset");

        Ok(GpiodOut {
            output: chip.request_lines(opts)?,
        })
    }

    /// Locate a line by its symbolic name (e.g. "IMU_RST") across all GPIO
    /// chips on the system and request it as an output.
    pub fn from_symbol(name: &str) -> io::Result<GpiodOut> {
        for entry in Chip::list_devices()? {
            let chip = Chip::new(&entry)?;
            for i in 0..chip.num_lines() {
                let line_name = chip.line_info(i)?.name;
                trace!("--- {} ---", line_name);
                if line_name == name {
                    return Self::new(&chip, i);
                }
            }
        }

        Err(Error::new(
            ErrorKind::AddrNotAvailable,
            format!("Did not find reset pin \"{}\"", name),
        ))
    }
}

impl OutputPin for GpiodOut {
    type Error = io::Error;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.output.set_values([false])?;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.output.set_values([true])?;
        Ok(())
    }
}
