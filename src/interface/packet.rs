// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Control packet framing.
//!
//! Packets exchanged with the control endpoint carry a four byte header:
//!
//! | byte | meaning                                     |
//! |------|---------------------------------------------|
//! | 0    | total length, LSB                           |
//! | 1    | total length, MSB (bit 7 = continuation)    |
//! | 2    | channel                                     |
//! | 3    | per-channel sequence number                 |
//!
//! The length includes the header itself. A header announcing zero bytes
//! means the endpoint has nothing queued.

use core::ops::Shr;
use log::trace;

use super::Transport;
use crate::{
    constants::{
        NUM_CHANNELS, PACKET_CONTINUATION_BIT, PACKET_HEADER_LENGTH, PACKET_RECV_BUF_LEN,
        PACKET_SEND_BUF_LEN,
    },
    error::{PacketError, TransportError},
};

/// A decoded control packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub channel: u8,
    pub sequence: u8,
    pub body: Vec<u8>,
}

/// Total packet length announced by a header, continuation flag removed
pub fn parse_packet_header(header: &[u8; PACKET_HEADER_LENGTH]) -> usize {
    let raw = u16::from_le_bytes([header[0], header[1]]);
    (raw & !PACKET_CONTINUATION_BIT) as usize
}

/// Frames and unframes packets for the control endpoint at one address
pub struct PacketChannel {
    address: u8,
    /// Each communication channel with the device has its own sequence number
    sequence_numbers: [u8; NUM_CHANNELS],
    /// Buffer for building packets sent to the endpoint
    packet_send_buf: [u8; PACKET_SEND_BUF_LEN],
    /// Buffer for packets received from the endpoint
    packet_recv_buf: [u8; PACKET_RECV_BUF_LEN],
}

impl PacketChannel {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            sequence_numbers: [0; NUM_CHANNELS],
            packet_send_buf: [0; PACKET_SEND_BUF_LEN],
            packet_recv_buf: [0; PACKET_RECV_BUF_LEN],
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Prepare a packet for sending, in our send buffer
    fn prep_send_packet(&mut self, channel: u8, body_data: &[u8]) -> usize {
        let packet_length = body_data.len() + PACKET_HEADER_LENGTH;
        let packet_header = [
            (packet_length & 0xFF) as u8, // LSB
            packet_length.shr(8) as u8,   // MSB
            channel,
            self.sequence_numbers[channel as usize],
        ];
        self.sequence_numbers[channel as usize] =
            self.sequence_numbers[channel as usize].wrapping_add(1);

        self.packet_send_buf[..PACKET_HEADER_LENGTH].copy_from_slice(packet_header.as_ref());
        self.packet_send_buf[PACKET_HEADER_LENGTH..packet_length].copy_from_slice(body_data);

        packet_length
    }

    /// Send `body_data` on `channel`, returning the sequence number used.
    pub fn send_packet<T: Transport>(
        &mut self,
        bus: &mut T,
        channel: u8,
        body_data: &[u8],
    ) -> Result<u8, TransportError> {
        if (channel as usize) >= NUM_CHANNELS
            || body_data.len() + PACKET_HEADER_LENGTH > PACKET_SEND_BUF_LEN
        {
            return Err(TransportError::Bus {
                address: self.address,
                reason: format!(
                    "cannot frame {} byte packet on channel {}",
                    body_data.len(),
                    channel
                ),
            });
        }

        let sequence = self.sequence_numbers[channel as usize];
        let packet_length = self.prep_send_packet(channel, body_data);
        trace!(
            "send chan {} seq {}: {:?}",
            channel,
            sequence,
            &self.packet_send_buf[..packet_length]
        );
        bus.write(self.address, &self.packet_send_buf[..packet_length])?;
        Ok(sequence)
    }

    /// Read one complete packet from the endpoint
    pub fn read_packet<T: Transport>(&mut self, bus: &mut T) -> Result<Packet, PacketError> {
        // check how long the message to read is
        let mut header = [0u8; PACKET_HEADER_LENGTH];
        bus.read(self.address, &mut header)?;
        let packet_len = parse_packet_header(&header);
        if packet_len == 0 {
            return Err(PacketError::NoData);
        }
        if !(PACKET_HEADER_LENGTH..=PACKET_RECV_BUF_LEN).contains(&packet_len) {
            return Err(PacketError::Malformed { length: packet_len });
        }

        // the full read repeats the header
        self.packet_recv_buf[..packet_len].fill(0);
        bus.read(self.address, &mut self.packet_recv_buf[..packet_len])?;
        let mut echoed = [0u8; PACKET_HEADER_LENGTH];
        echoed.copy_from_slice(&self.packet_recv_buf[..PACKET_HEADER_LENGTH]);
        if parse_packet_header(&echoed) != packet_len {
            return Err(PacketError::Malformed { length: packet_len });
        }

        let packet = Packet {
            channel: self.packet_recv_buf[2],
            sequence: self.packet_recv_buf[3],
            body: self.packet_recv_buf[PACKET_HEADER_LENGTH..packet_len].to_vec(),
        };
        trace!("recv chan {} seq {}: {:?}", packet.channel, packet.sequence, packet.body);
        Ok(packet)
    }
}
