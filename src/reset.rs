// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reset and startup handshake.
//!
//! Startup pulses the optional hardware reset line, asks the control
//! endpoint for a soft reset, then checks that the sensors answer with their
//! expected identities. The whole cycle is retried a fixed number of times.

use log::{debug, trace, warn};

use crate::{
    bank::SensorBank,
    constants::{
        CHANNEL_EXECUTABLE, EXECUTABLE_DEVICE_CMD_RESET, EXECUTABLE_DEVICE_RESP_RESET_COMPLETE,
        INIT_ATTEMPTS, PACKET_RETRY_DELAY_MS, RESET_EDGE_SETTLE_MS, SOFT_RESET_CONFIRM_ATTEMPTS,
        SOFT_RESET_SETTLE_MS,
    },
    error::{ImuError, InitializationError, PacketError},
    interface::{
        delay::DelayMs,
        gpio::{OutputPin, PinState},
        PacketChannel, Transport,
    },
};

/// Drives the reset line and the soft reset exchange
pub struct ResetSequencer<R, D> {
    reset_line: Option<R>,
    delay: D,
    control: PacketChannel,
}

impl<R: OutputPin, D: DelayMs> ResetSequencer<R, D> {
    /// `reset_line` may be `None` on boards without a reset line; the
    /// sequencer then relies on the soft reset alone.
    pub fn new(reset_line: Option<R>, delay: D, control_address: u8) -> Self {
        Self {
            reset_line,
            delay,
            control: PacketChannel::new(control_address),
        }
    }

    /// Pulse the reset line high, low, high.
    ///
    /// Without a reset line this does nothing. Pin faults are logged and
    /// otherwise ignored: the soft reset and identity check that follow
    /// decide whether the sensors came back.
    pub fn hard_reset(&mut self) {
        let Some(line) = self.reset_line.as_mut() else {
            trace!("no reset line, skipping hard reset");
            return;
        };
        trace!("hard_reset");
        for state in [PinState::High, PinState::Low, PinState::High] {
            if let Err(e) = line.set_state(state) {
                warn!("could not drive reset line {:?}: {:?}", state, e);
            }
            self.delay.delay_ms(RESET_EDGE_SETTLE_MS);
        }
    }

    /// Ask the control endpoint to reset and wait for its confirmation.
    ///
    /// Returns whether the reset was confirmed. Missing or garbled replies
    /// and NACKs or timeouts while reading are retried. Any other bus fault
    /// ends the exchange unconfirmed; it is logged, never returned.
    pub fn soft_reset<T: Transport>(&mut self, bus: &mut T) -> bool {
        trace!("soft_reset");
        let data: [u8; 1] = [EXECUTABLE_DEVICE_CMD_RESET];
        for _ in 0..2 {
            if let Err(e) = self.control.send_packet(bus, CHANNEL_EXECUTABLE, &data) {
                warn!("could not send soft reset: {}", e);
                return false;
            }
            self.delay.delay_ms(SOFT_RESET_SETTLE_MS);
        }

        for attempt in 1..=SOFT_RESET_CONFIRM_ATTEMPTS {
            match self.control.read_packet(bus) {
                Ok(packet) => {
                    if packet.channel == CHANNEL_EXECUTABLE
                        && packet.body.first() == Some(&EXECUTABLE_DEVICE_RESP_RESET_COMPLETE)
                    {
                        debug!("soft reset confirmed on attempt {}", attempt);
                        return true;
                    }
                    trace!(
                        "ignoring packet on chan {} while waiting for reset: {:?}",
                        packet.channel,
                        packet.body
                    );
                }
                Err(PacketError::Transport(e)) if !e.is_transient() => {
                    warn!("reading soft reset confirmation failed: {}", e);
                    return false;
                }
                Err(e) => {
                    debug!("no reset confirmation ({}), attempt {}", e, attempt);
                    self.delay.delay_ms(PACKET_RETRY_DELAY_MS);
                }
            }
        }
        false
    }

    /// Reset the sensors and confirm their identity.
    ///
    /// Each of the `INIT_ATTEMPTS` attempts pulses the reset line, runs the
    /// soft reset and asks every attached sensor for its identity. An
    /// unconfirmed soft reset does not skip the identity check. Succeeds as
    /// soon as one sensor identifies. Sensors that NACK or time out while
    /// rebooting only cost an attempt; other bus faults on the sensors end
    /// the sequence.
    pub fn initialize_with_retry<T: Transport>(
        &mut self,
        bank: &mut SensorBank<T>,
    ) -> Result<(), ImuError> {
        for attempt in 1..=INIT_ATTEMPTS {
            debug!("initialization attempt {} of {}", attempt, INIT_ATTEMPTS);
            self.hard_reset();

            if !self.soft_reset(bank.bus_mut()) {
                warn!("soft reset was not confirmed");
            }

            let identified = bank.identify()?;
            if identified > 0 {
                debug!("{} sensors identified", identified);
                return Ok(());
            }
            warn!("no sensor identified on attempt {}", attempt);
            self.delay.delay_ms(PACKET_RETRY_DELAY_MS);
        }

        Err(InitializationError {
            attempts: INIT_ATTEMPTS,
        }
        .into())
    }

    pub fn reset_line(&self) -> Option<&R> {
        self.reset_line.as_ref()
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn control(&self) -> &PacketChannel {
        &self.control
    }
}
