// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Blocking delays
//!
//! Every wait in the driver happens during reset: the edges of the hardware
//! reset pulse, the settle time after a soft reset command, and the pause
//! before retrying a packet read. All of them go through [`DelayMs`] so that
//! tests can record them instead of sleeping.

use std::{thread, time::Duration};

/// Millisecond delay
pub trait DelayMs {
    /// Pauses execution for `ms` milliseconds
    fn delay_ms(&mut self, ms: u16);
}

/// Delay source backed by `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct TimerMs {}

impl DelayMs for TimerMs {
    fn delay_ms(&mut self, ms: u16) {
        delay_ms(ms);
    }
}

/// Sleep the current thread for `ms` milliseconds
pub fn delay_ms(ms: u16) {
    thread::sleep(Duration::from_millis(ms.into()));
}
