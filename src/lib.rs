//! Platform-agnostic driver for the DS1307 real-time clock.
//!
//! The driver speaks to the chip through the `embedded-hal` I2C traits and
//! exposes calendar time read/write, run/halt control, square wave output
//! and oscillator calibration.
//!
//! # Example
//!
//! ```rust,ignore
//! use ds1307::{CalendarTime, DS1307, SquareWaveMode};
//!
//! // The driver only borrows the bus
//! let mut rtc = DS1307::new(&mut i2c);
//! rtc.initialize()?;
//!
//! if !rtc.running()? {
//!     rtc.set_timestamp(1_710_430_200)?;
//! }
//! let now: CalendarTime = rtc.now()?;
//! rtc.set_square_wave(SquareWaveMode::Hz1)?;
//! ```
//!
//! # Session state
//!
//! A fresh driver is uninitialized: reads fail with
//! [`DS1307Error::NotInitialized`] until [`DS1307::initialize`] has seen the
//! chip acknowledge. Writes initialize lazily. A bus failure in the middle of
//! [`DS1307::set`] drops the driver back to uninitialized because the chip is
//! left in an unknown state.
//!
//! # Concurrency
//!
//! The multi-transaction operations are not atomic on the bus. Callers
//! sharing one chip between contexts must serialize all calls to a driver.
//!
//! # Features
//!
//! - `async`: adds [`asynch::DS1307`] on top of `embedded-hal-async`
//! - `log` / `defmt`: route internal diagnostics to the chosen logger
#![no_std]

#[cfg(all(feature = "log", feature = "defmt"))]
compile_error!("features `log` and `defmt` are mutually exclusive");

// Logging shims, forwarding to `log` or `defmt` when one is enabled.
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::trace!($($arg)+);
        #[cfg(feature = "defmt")]
        ::defmt::trace!($($arg)+);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        {
            let _ = ::core::format_args!($($arg)+);
        }
    }};
}

#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::debug!($($arg)+);
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)+);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        {
            let _ = ::core::format_args!($($arg)+);
        }
    }};
}

#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::warn!($($arg)+);
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)+);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        {
            let _ = ::core::format_args!($($arg)+);
        }
    }};
}

#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::error!($($arg)+);
        #[cfg(feature = "defmt")]
        ::defmt::error!($($arg)+);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        {
            let _ = ::core::format_args!($($arg)+);
        }
    }};
}

#[cfg(feature = "async")]
pub mod asynch;
pub mod datetime;
pub mod registers;

use chrono::NaiveDateTime;
use embedded_hal::i2c::I2c;
use paste::paste;

pub use datetime::{
    bcd_to_binary, binary_to_bcd, decode_hours, encode_hours, CalendarTime, DS1307DateTimeError,
    CENTURY_OFFSET, YEAR_EPOCH,
};
pub(crate) use datetime::DS1307DateTime;
pub use registers::*;

/// How many times [`DS1307::now`] re-reads the clock when the seconds
/// register moves under it before giving up.
pub const MAX_READ_ATTEMPTS: usize = 5;

/// Longest run of registers written in one transaction.
const MAX_WRITE_LEN: usize = 8;

/// Errors returned by the DS1307 driver.
#[derive(Debug, PartialEq)]
pub enum DS1307Error<I2CE> {
    /// The bus reported an error (NACK, short read, arbitration loss, ...)
    I2c(I2CE),
    /// The seconds register never settled within [`MAX_READ_ATTEMPTS`] reads
    UnstableRead,
    /// The driver has not seen the chip acknowledge yet
    NotInitialized,
    /// The clock halt flag is set, so the registers don't hold the time
    ClockHalted,
    /// A calendar field is out of range or the chip returned garbage
    DateTime(DS1307DateTimeError),
    /// Calibration trim outside -31..=31
    InvalidCalibration(i8),
}

impl<I2CE> DS1307Error<I2CE> {
    /// True for failures of the bus transport itself.
    pub fn is_bus_error(&self) -> bool {
        matches!(self, DS1307Error::I2c(_) | DS1307Error::UnstableRead)
    }

    /// True when the caller supplied an out-of-range value.
    pub fn is_domain_error(&self) -> bool {
        matches!(
            self,
            DS1307Error::DateTime(_) | DS1307Error::InvalidCalibration(_)
        )
    }
}

impl<I2CE> From<I2CE> for DS1307Error<I2CE> {
    fn from(e: I2CE) -> Self {
        DS1307Error::I2c(e)
    }
}

/// DS1307 Real-Time Clock driver.
///
/// `I2C` may be an owned bus or `&mut` to one; `embedded-hal` implements
/// the trait for mutable references, so the caller can keep the bus.
pub struct DS1307<I2C: I2c> {
    i2c: I2C,
    initialized: bool,
}

impl<I2C: I2c> DS1307<I2C> {
    /// Creates an uninitialized driver. No bus traffic happens here.
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            initialized: false,
        }
    }

    /// Gives back the bus handle.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Whether the chip has acknowledged a probe since the last failure.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Reads `buf.len()` consecutive registers starting at `start`.
    fn read_registers(
        &mut self,
        start: RegAddr,
        buf: &mut [u8],
    ) -> Result<(), DS1307Error<I2C::Error>> {
        self.i2c.write_read(DEVICE_ADDRESS, &[start as u8], buf)?;
        trace!("DS1307: read {:?} {:?}", start, buf);
        Ok(())
    }

    /// Writes `values` to consecutive registers starting at `start` in a
    /// single transaction.
    fn write_registers(
        &mut self,
        start: RegAddr,
        values: &[u8],
    ) -> Result<(), DS1307Error<I2C::Error>> {
        debug_assert!(values.len() <= MAX_WRITE_LEN);
        let mut frame = [0u8; MAX_WRITE_LEN + 1];
        let len = values.len() + 1;
        frame[0] = start as u8;
        frame[1..len].copy_from_slice(values);
        trace!("DS1307: write {:?} {:?}", start, values);
        self.i2c.write(DEVICE_ADDRESS, &frame[..len])?;
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), DS1307Error<I2C::Error>> {
        if self.initialized {
            Ok(())
        } else {
            Err(DS1307Error::NotInitialized)
        }
    }

    /// Probes the chip and marks the driver initialized when it answers.
    ///
    /// Returns immediately if the driver is already initialized.
    pub fn initialize(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        if self.initialized {
            return Ok(());
        }
        debug!("DS1307: probing");
        self.i2c.write(DEVICE_ADDRESS, &[RegAddr::Seconds as u8])?;
        self.initialized = true;
        Ok(())
    }

    /// Reads the current time.
    ///
    /// The seconds register is read again after the full block; if it moved,
    /// the block straddled a rollover and is read again. Fails with
    /// [`DS1307Error::ClockHalted`] when the oscillator is stopped.
    pub fn now(&mut self) -> Result<CalendarTime, DS1307Error<I2C::Error>> {
        self.ensure_initialized()?;
        for attempt in 0..MAX_READ_ATTEMPTS {
            let raw = self.read_raw_datetime()?;
            let seconds = self.second()?;
            if seconds.bcd() != raw.seconds().bcd() {
                warn!("DS1307: seconds changed during read, retry {}", attempt + 1);
                continue;
            }
            if seconds.clock_halt() {
                return Err(DS1307Error::ClockHalted);
            }
            return raw.into_calendar().map_err(DS1307Error::DateTime);
        }
        error!("DS1307: time still moving after {} reads", MAX_READ_ATTEMPTS);
        Err(DS1307Error::UnstableRead)
    }

    /// Whether the oscillator is running, read live from the chip.
    pub fn running(&mut self) -> Result<bool, DS1307Error<I2C::Error>> {
        self.ensure_initialized()?;
        Ok(!self.second()?.clock_halt())
    }

    /// Sets the time and starts the clock.
    ///
    /// The clock is halted while the fields are written and restarted by the
    /// final write of the seconds register. The hours register is always
    /// written in 24-hour mode and the year modulo 100.
    pub fn set(&mut self, time: &CalendarTime) -> Result<(), DS1307Error<I2C::Error>> {
        let raw = DS1307DateTime::from_calendar(time).map_err(DS1307Error::DateTime)?;
        self.initialize()?;
        let result = self.write_raw_datetime(&raw);
        if result.is_err() {
            warn!("DS1307: write failed, device state unknown");
            self.initialized = false;
        }
        result
    }

    /// Clears the clock halt flag if it is set.
    pub fn start(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        self.initialize()?;
        let mut seconds = self.second()?;
        if seconds.clock_halt() {
            seconds.set_clock_halt(false);
            self.set_second(seconds)?;
        }
        Ok(())
    }

    /// Sets the clock halt flag if it is clear.
    pub fn stop(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        self.initialize()?;
        let mut seconds = self.second()?;
        if !seconds.clock_halt() {
            seconds.set_clock_halt(true);
            self.set_second(seconds)?;
        }
        Ok(())
    }

    /// Reads the square wave configuration.
    ///
    /// An uninitialized driver reports [`SquareWaveMode::Low`] without
    /// touching the bus.
    pub fn square_wave(&mut self) -> Result<SquareWaveMode, DS1307Error<I2C::Error>> {
        if !self.initialized {
            return Ok(SquareWaveMode::default());
        }
        Ok(self.control()?.into())
    }

    /// Writes the square wave configuration to the control register.
    pub fn set_square_wave(&mut self, mode: SquareWaveMode) -> Result<(), DS1307Error<I2C::Error>> {
        self.initialize()?;
        debug!("DS1307: square wave {:?}", mode);
        self.write_registers(RegAddr::Control, &[mode.into()])
    }

    /// Reads the calibration trim (-31..=31).
    pub fn calibration(&mut self) -> Result<i8, DS1307Error<I2C::Error>> {
        self.ensure_initialized()?;
        Ok(self.control()?.calibration())
    }

    /// Writes the calibration trim. Positive values speed the clock up.
    ///
    /// Bits 7-6 of the control register are preserved. Out-of-range values
    /// are rejected before any bus traffic.
    pub fn calibrate(&mut self, trim: i8) -> Result<(), DS1307Error<I2C::Error>> {
        if !(-CALIBRATION_LIMIT..=CALIBRATION_LIMIT).contains(&trim) {
            error!("DS1307: calibration {} out of range", trim);
            return Err(DS1307Error::InvalidCalibration(trim));
        }
        self.initialize()?;
        let control = self
            .control()?
            .with_calibration(trim)
            .ok_or(DS1307Error::InvalidCalibration(trim))?;
        self.set_control(control)
    }

    /// Reads the current time as a chrono `NaiveDateTime`.
    pub fn datetime(&mut self) -> Result<NaiveDateTime, DS1307Error<I2C::Error>> {
        self.now()?.to_datetime().map_err(DS1307Error::DateTime)
    }

    /// Sets the time from a chrono `NaiveDateTime` in 2000-2099.
    pub fn set_datetime(
        &mut self,
        datetime: &NaiveDateTime,
    ) -> Result<(), DS1307Error<I2C::Error>> {
        let time = CalendarTime::from_datetime(datetime).map_err(DS1307Error::DateTime)?;
        self.set(&time)
    }

    /// Reads the current time as seconds since the Unix epoch.
    pub fn now_timestamp(&mut self) -> Result<i64, DS1307Error<I2C::Error>> {
        self.now()?.timestamp().map_err(DS1307Error::DateTime)
    }

    /// Sets the time from seconds since the Unix epoch.
    pub fn set_timestamp(&mut self, timestamp: i64) -> Result<(), DS1307Error<I2C::Error>> {
        let time = CalendarTime::from_timestamp(timestamp).map_err(DS1307Error::DateTime)?;
        self.set(&time)
    }

    fn read_raw_datetime(&mut self) -> Result<DS1307DateTime, DS1307Error<I2C::Error>> {
        let mut data = [0; 7];
        self.read_registers(RegAddr::Seconds, &mut data)?;
        Ok(data.into())
    }

    fn write_raw_datetime(
        &mut self,
        datetime: &DS1307DateTime,
    ) -> Result<(), DS1307Error<I2C::Error>> {
        let data: [u8; 7] = datetime.into();
        self.write_registers(RegAddr::Seconds, &[data[0] | CLOCK_HALT])?;
        self.write_registers(RegAddr::Minutes, &data[1..])?;
        self.write_registers(RegAddr::Seconds, &[data[0]])?;
        Ok(())
    }
}

// Raw register access. These bypass the session state.
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ident)),+) => {
        impl<I2C: I2c> DS1307<I2C> {
            $(
                paste! {
                    #[doc = concat!("Gets the value of the ", stringify!($name), " register.")]
                    pub fn $name(&mut self) -> Result<$typ, DS1307Error<I2C::Error>> {
                        let mut data = [0];
                        self.read_registers($regaddr, &mut data)?;
                        Ok($typ(data[0]))
                    }

                    #[doc = concat!("Sets the value of the ", stringify!($name), " register.")]
                    pub fn [<set_ $name>](&mut self, value: $typ) -> Result<(), DS1307Error<I2C::Error>> {
                        self.write_registers($regaddr, &[value.into()])
                    }
                }
            )+
        }
    }
}

impl_register_access!(
    (second, RegAddr::Seconds, Seconds),
    (minute, RegAddr::Minutes, Minutes),
    (hour, RegAddr::Hours, Hours),
    (day, RegAddr::Day, Day),
    (date, RegAddr::Date, Date),
    (month, RegAddr::Month, Month),
    (year, RegAddr::Year, Year),
    (control, RegAddr::Control, Control)
);

#[cfg(test)]
mod tests {
    extern crate alloc;
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use chrono::{Datelike, NaiveDate, Timelike};
    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    const NACK: ErrorKind = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);

    // 2024-03-14 15:30:00, Thursday
    const THURSDAY: [u8; 7] = [0x00, 0x30, 0x15, 0x05, 0x14, 0x03, 0x24];

    fn probe() -> I2cTrans {
        I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Seconds as u8])
    }

    fn read_frame(frame: [u8; 7]) -> I2cTrans {
        I2cTrans::write_read(
            DEVICE_ADDRESS,
            vec![RegAddr::Seconds as u8],
            frame.to_vec(),
        )
    }

    fn read_seconds(value: u8) -> I2cTrans {
        I2cTrans::write_read(DEVICE_ADDRESS, vec![RegAddr::Seconds as u8], vec![value])
    }

    fn read_control(value: u8) -> I2cTrans {
        I2cTrans::write_read(DEVICE_ADDRESS, vec![RegAddr::Control as u8], vec![value])
    }

    fn write_control(value: u8) -> I2cTrans {
        I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Control as u8, value])
    }

    fn set_sequence(frame: [u8; 7]) -> Vec<I2cTrans> {
        let mut fields = vec![RegAddr::Minutes as u8];
        fields.extend_from_slice(&frame[1..]);
        vec![
            I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Seconds as u8, frame[0] | 0x80]),
            I2cTrans::write(DEVICE_ADDRESS, fields),
            I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Seconds as u8, frame[0]]),
        ]
    }

    fn thursday() -> CalendarTime {
        CalendarTime {
            seconds: 0,
            minutes: 30,
            hours: 15,
            weekday: 4,
            day_of_month: 14,
            month: 2,
            year: 124,
        }
    }

    fn initialized(expectations: &[I2cTrans]) -> DS1307<I2cMock> {
        let mut all = vec![probe()];
        all.extend_from_slice(expectations);
        let mut dev = DS1307::new(I2cMock::new(&all));
        dev.initialize().unwrap();
        dev
    }

    #[test]
    fn test_initialize_probes_once() {
        let mut dev = DS1307::new(I2cMock::new(&[probe()]));
        assert!(!dev.is_initialized());
        dev.initialize().unwrap();
        assert!(dev.is_initialized());
        dev.initialize().unwrap();
        assert!(dev.is_initialized());
        dev.i2c.done();
    }

    #[test]
    fn test_initialize_no_ack() {
        let mut dev = DS1307::new(I2cMock::new(&[probe().with_error(NACK)]));
        assert_eq!(dev.initialize(), Err(DS1307Error::I2c(NACK)));
        assert!(!dev.is_initialized());
        dev.i2c.done();
    }

    #[test]
    fn test_reads_require_initialize() {
        let mut dev = DS1307::new(I2cMock::new(&[]));
        assert_eq!(dev.now(), Err(DS1307Error::NotInitialized));
        assert_eq!(dev.running(), Err(DS1307Error::NotInitialized));
        assert_eq!(dev.calibration(), Err(DS1307Error::NotInitialized));
        assert!(matches!(dev.datetime(), Err(DS1307Error::NotInitialized)));
        assert!(!dev.is_initialized());
        dev.i2c.done();
    }

    #[test]
    fn test_now() {
        let mut dev = initialized(&[read_frame(THURSDAY), read_seconds(0x00)]);
        assert_eq!(dev.now().unwrap(), thursday());
        dev.i2c.done();
    }

    #[test]
    fn test_now_twelve_hour_mode() {
        // 3:30:00 PM in 12h mode
        let mut frame = THURSDAY;
        frame[2] = 0x63;
        let mut dev = initialized(&[read_frame(frame), read_seconds(0x00)]);
        assert_eq!(dev.now().unwrap().hours, 15);
        dev.i2c.done();
    }

    #[test]
    fn test_now_clock_halted() {
        let mut frame = THURSDAY;
        frame[0] = 0x80 | 0x12;
        let mut dev = initialized(&[read_frame(frame), read_seconds(0x92)]);
        assert_eq!(dev.now(), Err(DS1307Error::ClockHalted));
        assert!(dev.is_initialized());
        dev.i2c.done();
    }

    #[test]
    fn test_now_retries_across_rollover() {
        // First block: seconds wrapped 59 -> 00 after the minute was read,
        // the follow-up seconds read shows the change.
        let torn = [0x59, 0x31, 0x15, 0x05, 0x14, 0x03, 0x24];
        let settled = [0x00, 0x32, 0x15, 0x05, 0x14, 0x03, 0x24];
        let mut dev = initialized(&[
            read_frame(torn),
            read_seconds(0x00),
            read_frame(settled),
            read_seconds(0x00),
        ]);
        let time = dev.now().unwrap();
        assert_eq!(time.minutes, 32);
        assert_eq!(time.seconds, 0);
        dev.i2c.done();
    }

    #[test]
    fn test_now_gives_up_when_seconds_never_settle() {
        let mut expectations = Vec::new();
        for i in 0..MAX_READ_ATTEMPTS as u8 {
            let mut frame = THURSDAY;
            frame[0] = i;
            expectations.push(read_frame(frame));
            expectations.push(read_seconds(i + 1));
        }
        let mut dev = initialized(&expectations);
        let err = dev.now().unwrap_err();
        assert_eq!(err, DS1307Error::UnstableRead);
        assert!(err.is_bus_error());
        dev.i2c.done();
    }

    #[test]
    fn test_now_bus_error() {
        let mut dev = initialized(&[read_frame(THURSDAY).with_error(NACK)]);
        assert_eq!(dev.now(), Err(DS1307Error::I2c(NACK)));
        dev.i2c.done();
    }

    #[test]
    fn test_now_invalid_registers() {
        let mut frame = THURSDAY;
        frame[5] = 0x13;
        let mut dev = initialized(&[read_frame(frame), read_seconds(0x00)]);
        assert_eq!(
            dev.now(),
            Err(DS1307Error::DateTime(DS1307DateTimeError::InvalidDateTime))
        );
        dev.i2c.done();
    }

    #[test]
    fn test_running() {
        let mut dev = initialized(&[read_seconds(0x45), read_seconds(0xC5)]);
        assert!(dev.running().unwrap());
        assert!(!dev.running().unwrap());
        dev.i2c.done();
    }

    #[test]
    fn test_set_initializes_lazily_and_halts_during_write() {
        let mut expectations = vec![probe()];
        expectations.extend(set_sequence(THURSDAY));
        let mut dev = DS1307::new(I2cMock::new(&expectations));
        dev.set(&thursday()).unwrap();
        assert!(dev.is_initialized());
        dev.i2c.done();
    }

    #[test]
    fn test_set_then_now() {
        let time = CalendarTime {
            seconds: 7,
            minutes: 59,
            hours: 23,
            weekday: 0,
            day_of_month: 1,
            month: 5,
            year: 125,
        };
        let frame = [0x07, 0x59, 0x23, 0x01, 0x01, 0x06, 0x25];
        let mut expectations = set_sequence(frame);
        expectations.push(read_frame(frame));
        expectations.push(read_seconds(0x07));
        let mut dev = initialized(&expectations);
        dev.set(&time).unwrap();
        assert_eq!(dev.now().unwrap(), time);
        dev.i2c.done();
    }

    #[test]
    fn test_set_failure_demotes() {
        let mut expectations = vec![probe()];
        let mut sequence = set_sequence(THURSDAY);
        sequence.truncate(2);
        sequence[1] = sequence[1].clone().with_error(NACK);
        expectations.extend(sequence);
        // The chip stays gone on the next probe
        expectations.push(probe().with_error(NACK));

        let mut dev = DS1307::new(I2cMock::new(&expectations));
        assert_eq!(dev.set(&thursday()), Err(DS1307Error::I2c(NACK)));
        assert!(!dev.is_initialized());
        assert_eq!(dev.now(), Err(DS1307Error::NotInitialized));
        assert_eq!(dev.initialize(), Err(DS1307Error::I2c(NACK)));
        assert!(!dev.is_initialized());
        dev.i2c.done();
    }

    #[test]
    fn test_set_rejects_invalid_time_without_bus_traffic() {
        let mut dev = DS1307::new(I2cMock::new(&[]));
        let bad = CalendarTime {
            hours: 24,
            ..thursday()
        };
        let err = dev.set(&bad).unwrap_err();
        assert_eq!(
            err,
            DS1307Error::DateTime(DS1307DateTimeError::InvalidDateTime)
        );
        assert!(err.is_domain_error());
        assert!(!dev.is_initialized());
        dev.i2c.done();
    }

    #[test]
    fn test_set_year_modulo_century() {
        // 2124 and 2024 land in the same register value
        let time = CalendarTime {
            year: 224,
            ..thursday()
        };
        let mut dev = initialized(&set_sequence(THURSDAY));
        dev.set(&time).unwrap();
        dev.i2c.done();
    }

    #[test]
    fn test_start_and_stop() {
        let mut dev = initialized(&[
            // start while halted
            read_seconds(0x85),
            I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Seconds as u8, 0x05]),
            // start while running
            read_seconds(0x06),
            // stop while running
            read_seconds(0x07),
            I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Seconds as u8, 0x87]),
            // stop while halted
            read_seconds(0x87),
        ]);
        dev.start().unwrap();
        dev.start().unwrap();
        dev.stop().unwrap();
        dev.stop().unwrap();
        dev.i2c.done();
    }

    #[test]
    fn test_square_wave_uninitialized() {
        let mut dev = DS1307::new(I2cMock::new(&[]));
        assert_eq!(dev.square_wave().unwrap(), SquareWaveMode::Low);
        dev.i2c.done();
    }

    #[test]
    fn test_square_wave_roundtrip() {
        let modes = [
            SquareWaveMode::Low,
            SquareWaveMode::High,
            SquareWaveMode::Hz1,
            SquareWaveMode::Hz4096,
            SquareWaveMode::Hz8192,
            SquareWaveMode::Hz32768,
        ];
        let mut expectations = Vec::new();
        for mode in modes {
            expectations.push(write_control(mode.into()));
            expectations.push(read_control(mode.into()));
        }
        let mut dev = initialized(&expectations);
        for mode in modes {
            dev.set_square_wave(mode).unwrap();
            assert_eq!(dev.square_wave().unwrap(), mode);
        }
        dev.i2c.done();
    }

    #[test]
    fn test_set_square_wave_initializes_lazily() {
        let mut dev = DS1307::new(I2cMock::new(&[probe(), write_control(0x10)]));
        dev.set_square_wave(SquareWaveMode::Hz1).unwrap();
        assert!(dev.is_initialized());
        dev.i2c.done();
    }

    #[test]
    fn test_calibration_limits() {
        let mut dev = initialized(&[
            read_control(0x00),
            write_control(0x3F),
            read_control(0x3F),
            read_control(0x3F),
            write_control(0x1F),
            read_control(0x1F),
        ]);
        dev.calibrate(31).unwrap();
        assert_eq!(dev.calibration().unwrap(), 31);
        dev.calibrate(-31).unwrap();
        assert_eq!(dev.calibration().unwrap(), -31);
        dev.i2c.done();
    }

    #[test]
    fn test_calibrate_preserves_output_level() {
        let mut dev = initialized(&[read_control(0x80), write_control(0x83)]);
        dev.calibrate(-3).unwrap();
        dev.i2c.done();
    }

    #[test]
    fn test_calibrate_out_of_range() {
        let mut dev = initialized(&[]);
        assert_eq!(dev.calibrate(32), Err(DS1307Error::InvalidCalibration(32)));
        assert_eq!(
            dev.calibrate(-32),
            Err(DS1307Error::InvalidCalibration(-32))
        );
        assert!(dev.is_initialized());
        dev.i2c.done();
    }

    #[test]
    fn test_datetime_and_timestamps() {
        let mut expectations = vec![
            read_frame(THURSDAY),
            read_seconds(0x00),
            read_frame(THURSDAY),
            read_seconds(0x00),
        ];
        expectations.extend(set_sequence(THURSDAY));
        expectations.extend(set_sequence(THURSDAY));
        let mut dev = initialized(&expectations);

        let dt = dev.datetime().unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 3);
        assert_eq!(dt.day(), 14);
        assert_eq!(dt.hour(), 15);
        assert_eq!(dt.minute(), 30);
        assert_eq!(dev.now_timestamp().unwrap(), 1_710_430_200);

        let dt = NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap();
        dev.set_datetime(&dt).unwrap();
        dev.set_timestamp(1_710_430_200).unwrap();
        dev.i2c.done();
    }

    #[test]
    fn test_set_datetime_outside_century() {
        let mut dev = initialized(&[]);
        let dt = NaiveDate::from_ymd_opt(1999, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        assert_eq!(
            dev.set_datetime(&dt),
            Err(DS1307Error::DateTime(DS1307DateTimeError::YearOutOfRange))
        );
        dev.i2c.done();
    }

    #[test]
    fn test_register_operations() {
        let mut dev = DS1307::new(I2cMock::new(&[
            I2cTrans::write_read(DEVICE_ADDRESS, vec![RegAddr::Minutes as u8], vec![0x30]),
            I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Hours as u8, 0x52]),
            I2cTrans::write_read(DEVICE_ADDRESS, vec![RegAddr::Year as u8], vec![0x24]),
        ]));
        let minutes = dev.minute().unwrap();
        assert_eq!(minutes.ten_minutes(), 3);
        assert_eq!(minutes.minutes(), 0);
        dev.set_hour(Hours(0x52)).unwrap();
        assert_eq!(dev.year().unwrap().bcd(), 0x24);
        dev.i2c.done();
    }

    #[test]
    fn test_borrowed_bus() {
        let mut mock = I2cMock::new(&[probe(), read_seconds(0x10)]);
        {
            let mut dev = DS1307::new(&mut mock);
            dev.initialize().unwrap();
            assert!(dev.running().unwrap());
            let _ = dev.release();
        }
        mock.done();
    }
}
