//! Async implementation of the DS1307 driver.
//!
//! This module provides an async interface to the DS1307 RTC device using
//! `embedded-hal-async` traits. It is only available when the `async` feature
//! is enabled. Behavior matches the blocking [`crate::DS1307`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ds1307::asynch::DS1307;
//!
//! let mut rtc = DS1307::new(&mut i2c);
//! rtc.initialize().await?;
//!
//! // Get current time asynchronously
//! let now = rtc.now().await?;
//! ```

use chrono::NaiveDateTime;
use embedded_hal_async::i2c::I2c;
use paste::paste;

use crate::{
    CalendarTime, Control, DS1307DateTime, DS1307Error, Date, Day, Hours, Minutes, Month, RegAddr,
    Seconds, SquareWaveMode, Year, CALIBRATION_LIMIT, CLOCK_HALT, DEVICE_ADDRESS,
    MAX_READ_ATTEMPTS, MAX_WRITE_LEN,
};

/// DS1307 Real-Time Clock async driver.
///
/// This struct provides the async interface to the DS1307 RTC device.
/// It supports async I2C operations through the `embedded-hal-async` traits.
pub struct DS1307<I2C: I2c> {
    i2c: I2C,
    initialized: bool,
}

impl<I2C: I2c> DS1307<I2C> {
    /// Creates an uninitialized async driver. No bus traffic happens here.
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

    async fn read_registers(
        &mut self,
        start: RegAddr,
        buf: &mut [u8],
    ) -> Result<(), DS1307Error<I2C::Error>> {
        self.i2c
            .write_read(DEVICE_ADDRESS, &[start as u8], buf)
            .await?;
        trace!("DS1307: read {:?} {:?}", start, buf);
        Ok(())
    }

    async fn write_registers(
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
        self.i2c.write(DEVICE_ADDRESS, &frame[..len]).await?;
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
    pub async fn initialize(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        if self.initialized {
            return Ok(());
        }
        debug!("DS1307: probing");
        self.i2c
            .write(DEVICE_ADDRESS, &[RegAddr::Seconds as u8])
            .await?;
        self.initialized = true;
        Ok(())
    }

    /// Reads the current time, re-reading across a seconds rollover.
    ///
    /// # Returns
    /// * `Ok(CalendarTime)` - The current time
    /// * `Err(DS1307Error::ClockHalted)` when the oscillator is stopped
    /// * `Err(DS1307Error)` on other errors
    pub async fn now(&mut self) -> Result<CalendarTime, DS1307Error<I2C::Error>> {
        self.ensure_initialized()?;
        for attempt in 0..MAX_READ_ATTEMPTS {
            let raw = self.read_raw_datetime().await?;
            let seconds = self.second().await?;
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
    pub async fn running(&mut self) -> Result<bool, DS1307Error<I2C::Error>> {
        self.ensure_initialized()?;
        Ok(!self.second().await?.clock_halt())
    }

    /// Sets the time and starts the clock. See [`crate::DS1307::set`].
    pub async fn set(&mut self, time: &CalendarTime) -> Result<(), DS1307Error<I2C::Error>> {
        let raw = DS1307DateTime::from_calendar(time).map_err(DS1307Error::DateTime)?;
        self.initialize().await?;
        let result = self.write_raw_datetime(&raw).await;
        if result.is_err() {
            warn!("DS1307: write failed, device state unknown");
            self.initialized = false;
        }
        result
    }

    /// Clears the clock halt flag if it is set.
    pub async fn start(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        self.initialize().await?;
        let mut seconds = self.second().await?;
        if seconds.clock_halt() {
            seconds.set_clock_halt(false);
            self.set_second(seconds).await?;
        }
        Ok(())
    }

    /// Sets the clock halt flag if it is clear.
    pub async fn stop(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        self.initialize().await?;
        let mut seconds = self.second().await?;
        if !seconds.clock_halt() {
            seconds.set_clock_halt(true);
            self.set_second(seconds).await?;
        }
        Ok(())
    }

    /// Reads the square wave configuration, [`SquareWaveMode::Low`] when
    /// uninitialized.
    pub async fn square_wave(&mut self) -> Result<SquareWaveMode, DS1307Error<I2C::Error>> {
        if !self.initialized {
            return Ok(SquareWaveMode::default());
        }
        Ok(self.control().await?.into())
    }

    /// Writes the square wave configuration.
    pub async fn set_square_wave(
        &mut self,
        mode: SquareWaveMode,
    ) -> Result<(), DS1307Error<I2C::Error>> {
        self.initialize().await?;
        debug!("DS1307: square wave {:?}", mode);
        self.write_registers(RegAddr::Control, &[mode.into()]).await
    }

    /// Reads the calibration trim (-31..=31).
    pub async fn calibration(&mut self) -> Result<i8, DS1307Error<I2C::Error>> {
        self.ensure_initialized()?;
        Ok(self.control().await?.calibration())
    }

    /// Writes the calibration trim. Positive values speed the clock up.
    pub async fn calibrate(&mut self, trim: i8) -> Result<(), DS1307Error<I2C::Error>> {
        if !(-CALIBRATION_LIMIT..=CALIBRATION_LIMIT).contains(&trim) {
            error!("DS1307: calibration {} out of range", trim);
            return Err(DS1307Error::InvalidCalibration(trim));
        }
        self.initialize().await?;
        let control = self
            .control()
            .await?
            .with_calibration(trim)
            .ok_or(DS1307Error::InvalidCalibration(trim))?;
        self.set_control(control).await
    }

    /// Reads the current time as a chrono `NaiveDateTime`.
    pub async fn datetime(&mut self) -> Result<NaiveDateTime, DS1307Error<I2C::Error>> {
        self.now().await?.to_datetime().map_err(DS1307Error::DateTime)
    }

    /// Sets the time from a chrono `NaiveDateTime` in 2000-2099.
    pub async fn set_datetime(
        &mut self,
        datetime: &NaiveDateTime,
    ) -> Result<(), DS1307Error<I2C::Error>> {
        let time = CalendarTime::from_datetime(datetime).map_err(DS1307Error::DateTime)?;
        self.set(&time).await
    }

    /// Reads the current time as seconds since the Unix epoch.
    pub async fn now_timestamp(&mut self) -> Result<i64, DS1307Error<I2C::Error>> {
        self.now().await?.timestamp().map_err(DS1307Error::DateTime)
    }

    /// Sets the time from seconds since the Unix epoch.
    pub async fn set_timestamp(&mut self, timestamp: i64) -> Result<(), DS1307Error<I2C::Error>> {
        let time = CalendarTime::from_timestamp(timestamp).map_err(DS1307Error::DateTime)?;
        self.set(&time).await
    }

    async fn read_raw_datetime(&mut self) -> Result<DS1307DateTime, DS1307Error<I2C::Error>> {
        let mut data = [0; 7];
        self.read_registers(RegAddr::Seconds, &mut data).await?;
        Ok(data.into())
    }

    async fn write_raw_datetime(
        &mut self,
        datetime: &DS1307DateTime,
    ) -> Result<(), DS1307Error<I2C::Error>> {
        let data: [u8; 7] = datetime.into();
        self.write_registers(RegAddr::Seconds, &[data[0] | CLOCK_HALT])
            .await?;
        self.write_registers(RegAddr::Minutes, &data[1..]).await?;
        self.write_registers(RegAddr::Seconds, &[data[0]]).await?;
        Ok(())
    }
}

// Register access implementations
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ident)),+) => {
        impl<I2C: I2c> DS1307<I2C> {
            $(
                paste! {
                    #[doc = concat!("Gets the value of the ", stringify!($name), " register.")]
                    pub async fn $name(&mut self) -> Result<$typ, DS1307Error<I2C::Error>> {
                        let mut data = [0];
                        self.read_registers($regaddr, &mut data).await?;
                        Ok($typ(data[0]))
                    }

                    #[doc = concat!("Sets the value of the ", stringify!($name), " register.")]
                    pub async fn [<set_ $name>](&mut self, value: $typ) -> Result<(), DS1307Error<I2C::Error>> {
                        self.write_registers($regaddr, &[value.into()]).await
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
