// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Constants for the imu-stamp driver.
//!
//! This module contains the report IDs, reset timing, retry bounds and
//! control packet framing values shared by the reset sequencer, the sensor
//! bank and the reading cache.

/// Buffer sizes
pub const PACKET_SEND_BUF_LEN: usize = 256;
pub const PACKET_RECV_BUF_LEN: usize = 2048;
pub const NUM_CHANNELS: usize = 6;

/// Length of the control packet header
pub const PACKET_HEADER_LENGTH: usize = 4;

/// Bit 15 of the header length field flags a continuation packet
pub const PACKET_CONTINUATION_BIT: u16 = 0x8000;

// =============================================================================
// Control Channels
// =============================================================================

/// Command channel
pub const CHANNEL_COMMAND: u8 = 0;
/// Executable channel, carries reset commands and their responses
pub const CHANNEL_EXECUTABLE: u8 = 1;

/// Default 7-bit address of the control endpoint on the stamp
pub const DEFAULT_CONTROL_ADDRESS: u8 = 0x4A;

// =============================================================================
// Executable/Device Channel Commands
// =============================================================================

/// Reset command
pub const EXECUTABLE_DEVICE_CMD_RESET: u8 = 1;
/// Reset complete response
pub const EXECUTABLE_DEVICE_RESP_RESET_COMPLETE: u8 = 1;

// =============================================================================
// Report IDs
// =============================================================================

/// Calibrated acceleration (m/s^2)
pub const REPORT_ACCELEROMETER: u8 = 0x01;
/// Calibrated gyroscope (rad/s)
pub const REPORT_GYROSCOPE: u8 = 0x02;
/// Calibrated magnetic field (uTesla)
pub const REPORT_MAGNETOMETER: u8 = 0x03;
/// Raw, unscaled accelerometer counts
pub const REPORT_RAW_ACCELEROMETER: u8 = 0x14;
/// Raw, unscaled gyroscope counts
pub const REPORT_RAW_GYROSCOPE: u8 = 0x15;
/// Raw, unscaled magnetometer counts
pub const REPORT_RAW_MAGNETOMETER: u8 = 0x16;

// =============================================================================
// Reset Timing and Retry Bounds
// =============================================================================

/// Settle time after each edge of the hardware reset pulse
pub const RESET_EDGE_SETTLE_MS: u16 = 10;
/// Settle time after each soft reset command
pub const SOFT_RESET_SETTLE_MS: u16 = 500;
/// Wait before retrying a failed packet read or identity check
pub const PACKET_RETRY_DELAY_MS: u16 = 500;

/// Full reset + identity check cycles before giving up
pub const INIT_ATTEMPTS: u8 = 3;
/// Reads attempted while waiting for the soft reset confirmation
pub const SOFT_RESET_CONFIRM_ATTEMPTS: u8 = 3;
