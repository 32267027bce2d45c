// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Recording test doubles for the hardware capabilities.
//!
//! Compiled for unit tests and, through the `mock` feature, for downstream
//! crates that want to exercise the driver without hardware.

use std::collections::{HashMap, VecDeque};

use super::{delay::DelayMs, gpio::OutputPin, gpio::PinState, Transport};
use crate::{constants::PACKET_HEADER_LENGTH, error::TransportError};

/// Bus transaction recorded by [`MockBus`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Write { address: u8, bytes: Vec<u8> },
    Read { address: u8, len: usize },
    WriteRead { address: u8, bytes: Vec<u8>, len: usize },
}

/// In-memory bus.
///
/// Plain reads are served from a per-address queue; reads with nothing
/// queued return zeros. Register reads (`write_read` whose first byte is the
/// register) are served from a per-register queue whose last entry sticks.
#[derive(Debug, Default)]
pub struct MockBus {
    transactions: Vec<Transaction>,
    reads: HashMap<u8, VecDeque<Vec<u8>>>,
    registers: HashMap<(u8, u8), VecDeque<Vec<u8>>>,
    failures: HashMap<u8, TransportError>,
    read_failures: HashMap<u8, TransportError>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get transaction log (for test verification)
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    /// Clear transaction log
    pub fn clear_transactions(&mut self) {
        self.transactions.clear();
    }

    /// Queue the bytes returned by the next plain read of `address`
    pub fn queue_read(&mut self, address: u8, bytes: &[u8]) {
        self.reads
            .entry(address)
            .or_default()
            .push_back(bytes.to_vec());
    }

    /// Queue a control packet: one read for the header, one for the whole
    /// packet.
    pub fn queue_packet(&mut self, address: u8, channel: u8, sequence: u8, body: &[u8]) {
        let length = (body.len() + PACKET_HEADER_LENGTH) as u16;
        let mut packet = vec![(length & 0xFF) as u8, (length >> 8) as u8, channel, sequence];
        packet.extend_from_slice(body);
        self.queue_read(address, &packet[..PACKET_HEADER_LENGTH]);
        self.queue_read(address, &packet);
    }

    /// Replace the contents of a register
    pub fn set_register(&mut self, address: u8, register: u8, bytes: &[u8]) {
        let queue = self.registers.entry((address, register)).or_default();
        queue.clear();
        queue.push_back(bytes.to_vec());
    }

    /// Append a value the register will hold after the current one is read
    pub fn queue_register(&mut self, address: u8, register: u8, bytes: &[u8]) {
        self.registers
            .entry((address, register))
            .or_default()
            .push_back(bytes.to_vec());
    }

    /// Fail every transaction with `address` until cleared
    pub fn fail_address(&mut self, address: u8, error: TransportError) {
        self.failures.insert(address, error);
    }

    /// Fail reads from `address` until cleared; writes still succeed
    pub fn fail_reads(&mut self, address: u8, error: TransportError) {
        self.read_failures.insert(address, error);
    }

    pub fn clear_failure(&mut self, address: u8) {
        self.failures.remove(&address);
        self.read_failures.remove(&address);
    }

    fn check(&self, address: u8) -> Result<(), TransportError> {
        match self.failures.get(&address) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn check_read(&self, address: u8) -> Result<(), TransportError> {
        self.check(address)?;
        match self.read_failures.get(&address) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn fill(buf: &mut [u8], bytes: Option<&[u8]>) {
        buf.fill(0);
        if let Some(bytes) = bytes {
            let len = bytes.len().min(buf.len());
            buf[..len].copy_from_slice(&bytes[..len]);
        }
    }
}

impl Transport for MockBus {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), TransportError> {
        self.transactions.push(Transaction::Write {
            address,
            bytes: bytes.to_vec(),
        });
        self.check(address)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), TransportError> {
        self.transactions.push(Transaction::Read {
            address,
            len: buf.len(),
        });
        self.check_read(address)?;
        let next = self.reads.get_mut(&address).and_then(|q| q.pop_front());
        Self::fill(buf, next.as_deref());
        Ok(())
    }

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buf: &mut [u8],
    ) -> Result<(), TransportError> {
        self.transactions.push(Transaction::WriteRead {
            address,
            bytes: bytes.to_vec(),
            len: buf.len(),
        });
        self.check_read(address)?;
        let register = bytes.first().copied().unwrap_or(0);
        let value = match self.registers.get_mut(&(address, register)) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Self::fill(buf, value.as_deref());
        Ok(())
    }
}

/// Pin error raised by a [`MockPin`] set to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

/// Output pin that records every level it is driven to
#[derive(Debug, Default)]
pub struct MockPin {
    history: Vec<PinState>,
    failing: bool,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pin whose every write fails
    pub fn failing() -> Self {
        Self {
            history: Vec::new(),
            failing: true,
        }
    }

    pub fn history(&self) -> &[PinState] {
        &self.history
    }

    /// Number of complete high-low-high reset pulses driven
    pub fn pulse_count(&self) -> usize {
        self.history
            .windows(3)
            .filter(|w| **w == [PinState::High, PinState::Low, PinState::High])
            .count()
    }

    fn drive(&mut self, state: PinState) -> Result<(), MockPinError> {
        if self.failing {
            return Err(MockPinError);
        }
        self.history.push(state);
        Ok(())
    }
}

impl OutputPin for MockPin {
    type Error = MockPinError;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(PinState::Low)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(PinState::High)
    }
}

/// Delay source that records requested delays instead of sleeping
#[derive(Debug, Default)]
pub struct MockDelay {
    calls: Vec<u16>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[u16] {
        &self.calls
    }

    pub fn total_ms(&self) -> u32 {
        self.calls.iter().map(|&ms| u32::from(ms)).sum()
    }
}

impl DelayMs for MockDelay {
    fn delay_ms(&mut self, ms: u16) {
        self.calls.push(ms);
    }
}
