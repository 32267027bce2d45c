// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! IMU stamp driver facade.
//!
//! [`ImuStamp`] ties the reset sequencer, the sensor bank and the reading
//! cache together. Create it, attach the sub-drivers, call
//! [`begin`](ImuStamp::begin), then read measurements through the typed
//! accessors. Every accessor first pulls whatever the sensors have pending.

use std::{fmt, io, path::Path};

use log::{debug, warn};

use crate::{
    bank::{SensorBank, SensorSlot},
    constants::DEFAULT_CONTROL_ADDRESS,
    error::{AttachError, ImuError, Result},
    interface::{
        delay::{DelayMs, TimerMs},
        gpio::{GpiodOut, OutputPin},
        HalBus, Transport,
    },
    reports::{Reading, ReadingCache, ReportKind},
    reset::ResetSequencer,
    sensor::SensorDriver,
};

/// Driver lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed, `begin` not called yet
    Uninitialized,
    /// Reset handshake in progress
    Resetting,
    /// Sensors confirmed, accessors available
    Online,
    /// An accessor is pulling new samples
    Refreshing,
    /// Initialization gave up; only `reset` leaves this state
    Failed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Uninitialized => "uninitialized",
            State::Resetting => "resetting",
            State::Online => "online",
            State::Refreshing => "refreshing",
            State::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Six-sensor IMU stamp
pub struct ImuStamp<T, R, D> {
    sequencer: ResetSequencer<R, D>,
    bank: SensorBank<T>,
    cache: ReadingCache,
    state: State,
}

impl ImuStamp<HalBus<linux_embedded_hal::I2cdev>, GpiodOut, TimerMs> {
    /// Driver on a Linux I2C adapter.
    ///
    /// `reset_pin` is the symbolic GPIO line name of the reset line (e.g.
    /// "IMU_RST"), looked up across all GPIO chips. Pass `None` on boards
    /// without one.
    pub fn new_linux<P: AsRef<Path>>(i2c_device: P, reset_pin: Option<&str>) -> io::Result<Self> {
        let bus = HalBus::open(i2c_device)?;
        let reset_line = reset_pin.map(GpiodOut::from_symbol).transpose()?;
        Ok(Self::new(
            bus,
            reset_line,
            TimerMs::default(),
            DEFAULT_CONTROL_ADDRESS,
        ))
    }
}

impl<T, R, D> ImuStamp<T, R, D>
where
    T: Transport,
    R: OutputPin,
    D: DelayMs,
{
    pub fn new(bus: T, reset_line: Option<R>, delay: D, control_address: u8) -> Self {
        Self {
            sequencer: ResetSequencer::new(reset_line, delay, control_address),
            bank: SensorBank::new(bus),
            cache: ReadingCache::new(),
            state: State::Uninitialized,
        }
    }

    /// Attach a sub-driver before calling [`begin`](Self::begin).
    pub fn attach(
        &mut self,
        slot: SensorSlot,
        driver: Box<dyn SensorDriver<T>>,
    ) -> core::result::Result<(), AttachError> {
        self.bank.attach(slot, driver)
    }

    /// Builder form of [`attach`](Self::attach)
    pub fn with_sensor(
        mut self,
        slot: SensorSlot,
        driver: Box<dyn SensorDriver<T>>,
    ) -> core::result::Result<Self, AttachError> {
        self.attach(slot, driver)?;
        Ok(self)
    }

    /// Reset the sensors, confirm their identity and bring them online.
    ///
    /// Only allowed once, from `Uninitialized`. Use [`reset`](Self::reset)
    /// to start over.
    pub fn begin(&mut self) -> Result<()> {
        if self.state != State::Uninitialized {
            return Err(ImuError::InvalidState(self.state));
        }
        self.start()
    }

    /// Full reset from any state, dropping every cached reading.
    ///
    /// This is the only way out of `Failed`.
    pub fn reset(&mut self) -> Result<()> {
        debug!("reset requested while {}", self.state);
        self.cache.clear();
        self.start()
    }

    fn start(&mut self) -> Result<()> {
        self.state = State::Resetting;
        if let Err(e) = self.sequencer.initialize_with_retry(&mut self.bank) {
            warn!("initialization failed: {}", e);
            self.state = State::Failed;
            return Err(e);
        }

        let failed = self.bank.bring_online();
        if !failed.is_empty() {
            warn!("sensors not online: {:?}", failed);
        }
        self.state = State::Online;
        debug!("online with {:?}", self.bank.enabled_slots());
        Ok(())
    }

    /// Latest reading of `kind`, after pulling pending samples.
    pub fn reading(&mut self, kind: ReportKind) -> Result<Reading> {
        if self.state != State::Online {
            return Err(ImuError::InvalidState(self.state));
        }
        self.state = State::Refreshing;
        let reading = self.cache.get(&mut self.bank, kind);
        self.state = State::Online;
        Ok(reading?)
    }

    fn axes(&mut self, kind: ReportKind) -> Result<[f32; 3]> {
        self.reading(kind).map(|reading| reading.axes)
    }

    /// Acceleration in m/s^2
    pub fn acceleration(&mut self) -> Result<[f32; 3]> {
        self.axes(ReportKind::Accelerometer)
    }

    /// Angular rate in rad/s
    pub fn gyro(&mut self) -> Result<[f32; 3]> {
        self.axes(ReportKind::Gyroscope)
    }

    /// Magnetic field in uTesla
    pub fn magnetic(&mut self) -> Result<[f32; 3]> {
        self.axes(ReportKind::Magnetometer)
    }

    pub fn raw_acceleration(&mut self) -> Result<[f32; 3]> {
        self.axes(ReportKind::RawAccelerometer)
    }

    pub fn raw_gyro(&mut self) -> Result<[f32; 3]> {
        self.axes(ReportKind::RawGyroscope)
    }

    pub fn raw_magnetic(&mut self) -> Result<[f32; 3]> {
        self.axes(ReportKind::RawMagnetometer)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn bank(&self) -> &SensorBank<T> {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut SensorBank<T> {
        &mut self.bank
    }

    pub fn sequencer(&self) -> &ResetSequencer<R, D> {
        &self.sequencer
    }

    pub fn cache(&self) -> &ReadingCache {
        &self.cache
    }

    /// Returns the transport, dropping the sub-drivers.
    pub fn free(self) -> T {
        self.bank.free()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{InitializationError, ReportNotEnabledError, SensorError, TransportError},
        interface::mock::{MockBus, MockDelay, MockPin},
        sensor::{tests::ScriptedSensor, SensorFamily},
    };

    type TestStamp = ImuStamp<MockBus, MockPin, MockDelay>;

    fn stamp(line: Option<MockPin>) -> TestStamp {
        ImuStamp::new(MockBus::new(), line, MockDelay::new(), DEFAULT_CONTROL_ADDRESS)
    }

    fn sensor(slot: SensorSlot, sequences: &[u32]) -> Box<ScriptedSensor> {
        Box::new(ScriptedSensor::new(slot.family(), 0x10 + slot as u8, sequences))
    }

    #[test]
    fn test_state_display() {
        assert_eq!(State::Online.to_string(), "online");
        assert_eq!(
            ImuError::InvalidState(State::Failed).to_string(),
            "operation not allowed while driver is failed"
        );
    }

    #[test]
    fn test_begin_without_reset_line_reaches_online() {
        let mut imu = stamp(None)
            .with_sensor(SensorSlot::Accel0, sensor(SensorSlot::Accel0, &[1]))
            .unwrap();
        assert_eq!(imu.state(), State::Uninitialized);

        imu.begin().unwrap();

        assert_eq!(imu.state(), State::Online);
        assert!(imu.bank().is_enabled(SensorSlot::Accel0));
    }

    #[test]
    fn test_begin_pulses_reset_line() {
        let mut imu = stamp(Some(MockPin::new()))
            .with_sensor(SensorSlot::Gyro0, sensor(SensorSlot::Gyro0, &[]))
            .unwrap();
        imu.begin().unwrap();
        assert_eq!(imu.sequencer().reset_line().unwrap().pulse_count(), 1);
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let mut imu = stamp(None)
            .with_sensor(SensorSlot::Gyro0, sensor(SensorSlot::Gyro0, &[]))
            .unwrap();
        imu.begin().unwrap();
        assert_eq!(imu.begin(), Err(ImuError::InvalidState(State::Online)));
    }

    #[test]
    fn test_accessors_before_begin() {
        let mut imu = stamp(None);
        assert_eq!(
            imu.acceleration(),
            Err(ImuError::InvalidState(State::Uninitialized))
        );
    }

    #[test]
    fn test_accessors_read_latest_sample() {
        let mut imu = stamp(None)
            .with_sensor(SensorSlot::Accel0, sensor(SensorSlot::Accel0, &[4]))
            .unwrap()
            .with_sensor(SensorSlot::Mag0, sensor(SensorSlot::Mag0, &[6]))
            .unwrap();
        imu.begin().unwrap();

        assert_eq!(imu.acceleration(), Ok([2.0, 0.0, 1.0]));
        assert_eq!(imu.raw_acceleration(), Ok([4.0, 0.0, 1.0]));
        assert_eq!(imu.magnetic(), Ok([3.0, 0.0, 1.0]));
        assert_eq!(imu.raw_magnetic(), Ok([6.0, 0.0, 1.0]));
        assert_eq!(imu.state(), State::Online);
    }

    #[test]
    fn test_missing_stream_is_report_not_enabled() {
        let mut imu = stamp(None)
            .with_sensor(SensorSlot::Accel0, sensor(SensorSlot::Accel0, &[4]))
            .unwrap();
        imu.begin().unwrap();

        assert_eq!(
            imu.gyro(),
            Err(ImuError::ReportNotEnabled(ReportNotEnabledError {
                kind: ReportKind::Gyroscope
            }))
        );
        assert_eq!(
            imu.raw_gyro(),
            Err(ImuError::ReportNotEnabled(ReportNotEnabledError {
                kind: ReportKind::RawGyroscope
            }))
        );
        // a missing stream leaves the driver usable
        assert_eq!(imu.state(), State::Online);
        assert!(imu.acceleration().is_ok());
    }

    #[test]
    fn test_cached_reading_survives_idle_sensor() {
        let mut imu = stamp(None)
            .with_sensor(SensorSlot::Gyro1, sensor(SensorSlot::Gyro1, &[3]))
            .unwrap();
        imu.begin().unwrap();

        let first = imu.reading(ReportKind::Gyroscope).unwrap();
        let second = imu.reading(ReportKind::Gyroscope).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.slot, SensorSlot::Gyro1);
    }

    #[test]
    fn test_failed_initialization_then_reset() {
        let mut silent = ScriptedSensor::new(SensorFamily::Magnetometer, 0x30, &[8]);
        silent.identity = Ok(false);
        let mut imu = stamp(Some(MockPin::new()))
            .with_sensor(SensorSlot::Mag0, Box::new(silent))
            .unwrap();

        assert_eq!(
            imu.begin(),
            Err(ImuError::Initialization(InitializationError { attempts: 3 }))
        );
        assert_eq!(imu.state(), State::Failed);
        assert_eq!(imu.magnetic(), Err(ImuError::InvalidState(State::Failed)));
        assert_eq!(imu.begin(), Err(ImuError::InvalidState(State::Failed)));

        // replace the sensor with one that answers, then reset explicitly
        imu.attach(SensorSlot::Mag0, sensor(SensorSlot::Mag0, &[8]))
            .unwrap();
        imu.reset().unwrap();

        assert_eq!(imu.state(), State::Online);
        assert_eq!(imu.magnetic(), Ok([4.0, 0.0, 1.0]));
    }

    #[test]
    fn test_reset_clears_cache() {
        let mut imu = stamp(None)
            .with_sensor(SensorSlot::Accel1, sensor(SensorSlot::Accel1, &[5]))
            .unwrap();
        imu.begin().unwrap();
        imu.acceleration().unwrap();
        assert!(imu.cache().latest(ReportKind::Accelerometer).is_some());

        imu.reset().unwrap();

        assert!(imu.cache().latest(ReportKind::Accelerometer).is_none());
        assert!(imu.acceleration().is_err());
    }

    #[test]
    fn test_bus_fault_during_begin_fails() {
        let fault = TransportError::Bus {
            address: 0x4C,
            reason: "bus stuck".into(),
        };
        let mut faulty = ScriptedSensor::accelerometer(&[]);
        faulty.identity = Err(SensorError::Transport(fault.clone()));
        let mut imu = stamp(None)
            .with_sensor(SensorSlot::Accel0, Box::new(faulty))
            .unwrap();

        assert_eq!(imu.begin(), Err(ImuError::Transport(fault)));
        assert_eq!(imu.state(), State::Failed);
    }

    #[test]
    fn test_begin_without_control_endpoint() {
        let mut imu = stamp(Some(MockPin::new()))
            .with_sensor(SensorSlot::Accel0, sensor(SensorSlot::Accel0, &[2]))
            .unwrap();
        imu.bank_mut().bus_mut().fail_address(
            DEFAULT_CONTROL_ADDRESS,
            TransportError::Nack {
                address: DEFAULT_CONTROL_ADDRESS,
            },
        );

        imu.begin().unwrap();

        assert_eq!(imu.state(), State::Online);
        assert_eq!(imu.acceleration(), Ok([1.0, 0.0, 1.0]));
    }

    #[test]
    fn test_sensor_that_fails_bring_up_is_skipped() {
        let mut broken = ScriptedSensor::new(SensorFamily::Gyroscope, 0x68, &[1]);
        broken.init_error = Some(SensorError::Decode {
            reason: "bad config".into(),
        });
        let mut imu = stamp(None)
            .with_sensor(SensorSlot::Gyro0, Box::new(broken))
            .unwrap()
            .with_sensor(SensorSlot::Accel0, sensor(SensorSlot::Accel0, &[1]))
            .unwrap();

        imu.begin().unwrap();

        assert!(!imu.bank().is_enabled(SensorSlot::Gyro0));
        assert!(imu.gyro().is_err());
        assert_eq!(imu.acceleration(), Ok([0.5, 0.0, 1.0]));
    }

    #[test]
    fn test_free_returns_bus() {
        let imu = stamp(None);
        assert!(imu.free().transactions().is_empty());
    }
}
