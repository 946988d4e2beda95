//! Calendar conversion and register codec for the DS1307 RTC.
//!
//! This module converts between the DS1307's BCD-encoded timekeeping
//! registers and [`CalendarTime`], the broken-out time the driver exchanges
//! with callers. It also bridges [`CalendarTime`] to chrono's
//! `NaiveDateTime` and to Unix timestamps.
//!
//! # Conventions
//!
//! - `hours` is always 0-23. A chip left in 12-hour mode is normalized on
//!   read, and every write puts the chip back into 24-hour mode.
//! - `weekday` is 0-6 with 0 = Sunday. The chip counts 1-7.
//! - `month` is 0-11. The chip counts 1-12.
//! - `year` counts years since [`YEAR_EPOCH`]. The chip only keeps two
//!   digits, which are read as 2000-2099 ([`CENTURY_OFFSET`]) and written
//!   modulo 100. Dates outside that century do not survive a write/read
//!   cycle.
//!
//! # Error Handling
//!
//! Conversion errors are reported via [`DS1307DateTimeError`].

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::{Date, Day, Hours, Minutes, Month, Seconds, TimeRepresentation, Year};

/// Year that [`CalendarTime::year`] counts from.
pub const YEAR_EPOCH: i32 = 1900;

/// Years between [`YEAR_EPOCH`] and the century the two-digit year register
/// is assumed to be in (2000-2099).
pub const CENTURY_OFFSET: u16 = 100;

/// Decodes a packed BCD byte.
///
/// Nibbles above 9 are not rejected; they produce a meaningless value.
pub fn bcd_to_binary(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

/// Encodes a value in the range 0-99 as packed BCD.
pub fn binary_to_bcd(value: u8) -> Result<u8, DS1307DateTimeError> {
    if value > 99 {
        return Err(DS1307DateTimeError::InvalidDateTime);
    }
    Ok(((value / 10) << 4) | (value % 10))
}

/// Decodes an hours register into 0-23, honoring the chip's 12/24h mode bit.
pub fn decode_hours(raw: u8) -> u8 {
    let hours = Hours(raw);
    match hours.time_representation() {
        TimeRepresentation::TwentyFourHour => bcd_to_binary(hours.twenty_four_hour_bcd()),
        TimeRepresentation::TwelveHour => match (bcd_to_binary(hours.twelve_hour_bcd()), hours.pm())
        {
            (12, false) => 0,
            (12, true) => 12,
            (h, false) => h,
            (h, true) => h + 12,
        },
    }
}

/// Encodes 0-23 as an hours register. The result is always in 24-hour mode.
pub fn encode_hours(hour: u8) -> Result<u8, DS1307DateTimeError> {
    if hour > 23 {
        return Err(DS1307DateTimeError::InvalidDateTime);
    }
    let mut value = Hours::default();
    value.set_time_representation(TimeRepresentation::TwentyFourHour);
    value.set_twenty_four_hour_bcd(binary_to_bcd(hour)?);
    Ok(value.into())
}

/// Converts a 0-based weekday (0 = Sunday) into the chip's 1-7 day register.
pub fn weekday_to_register(weekday: u8) -> Result<u8, DS1307DateTimeError> {
    if weekday > 6 {
        return Err(DS1307DateTimeError::InvalidDateTime);
    }
    let mut value = Day::default();
    value.set_day(weekday + 1);
    Ok(value.into())
}

/// Converts the chip's 1-7 day register into a 0-based weekday.
pub fn weekday_from_register(raw: u8) -> Result<u8, DS1307DateTimeError> {
    match Day(raw).day() {
        0 => Err(DS1307DateTimeError::InvalidDateTime),
        day => Ok(day - 1),
    }
}

/// Converts a 0-based month into the chip's BCD 1-12 month register.
pub fn month_to_register(month: u8) -> Result<u8, DS1307DateTimeError> {
    if month > 11 {
        return Err(DS1307DateTimeError::InvalidDateTime);
    }
    let mut value = Month::default();
    value.set_bcd(binary_to_bcd(month + 1)?);
    Ok(value.into())
}

/// Converts the chip's BCD 1-12 month register into a 0-based month.
pub fn month_from_register(raw: u8) -> Result<u8, DS1307DateTimeError> {
    match bcd_to_binary(Month(raw).bcd()) {
        month @ 1..=12 => Ok(month - 1),
        _ => Err(DS1307DateTimeError::InvalidDateTime),
    }
}

/// Converts years since [`YEAR_EPOCH`] into the two-digit year register.
pub fn year_to_register(year: u16) -> Result<u8, DS1307DateTimeError> {
    let two_digits =
        u8::try_from(year % 100).map_err(|_| DS1307DateTimeError::InvalidDateTime)?;
    let mut value = Year::default();
    value.set_bcd(binary_to_bcd(two_digits)?);
    Ok(value.into())
}

/// Converts the two-digit year register into years since [`YEAR_EPOCH`].
pub fn year_from_register(raw: u8) -> Result<u16, DS1307DateTimeError> {
    match bcd_to_binary(Year(raw).bcd()) {
        year @ 0..=99 => Ok(u16::from(year) + CENTURY_OFFSET),
        _ => Err(DS1307DateTimeError::InvalidDateTime),
    }
}

/// Broken-out calendar time as stored by the DS1307.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalendarTime {
    /// Seconds (0-59)
    pub seconds: u8,
    /// Minutes (0-59)
    pub minutes: u8,
    /// Hours (0-23)
    pub hours: u8,
    /// Day of week (0-6, 0 = Sunday)
    pub weekday: u8,
    /// Day of month (1-31)
    pub day_of_month: u8,
    /// Month (0-11)
    pub month: u8,
    /// Years since [`YEAR_EPOCH`]
    pub year: u16,
}

impl CalendarTime {
    /// The four-digit calendar year.
    pub fn full_year(&self) -> i32 {
        YEAR_EPOCH + i32::from(self.year)
    }

    /// Builds a `CalendarTime` from a chrono datetime.
    ///
    /// Only years the chip can hold without loss (2000-2099) are accepted.
    /// Sub-second precision is dropped.
    pub fn from_datetime(datetime: &NaiveDateTime) -> Result<Self, DS1307DateTimeError> {
        let first = YEAR_EPOCH + i32::from(CENTURY_OFFSET);
        if !(first..first + 100).contains(&datetime.year()) {
            error!("Year {} is outside {}-{}", datetime.year(), first, first + 99);
            return Err(DS1307DateTimeError::YearOutOfRange);
        }
        let narrow = |v: u32| u8::try_from(v).map_err(|_| DS1307DateTimeError::InvalidDateTime);
        Ok(CalendarTime {
            seconds: narrow(datetime.second())?,
            minutes: narrow(datetime.minute())?,
            hours: narrow(datetime.hour())?,
            weekday: narrow(datetime.weekday().num_days_from_sunday())?,
            day_of_month: narrow(datetime.day())?,
            month: narrow(datetime.month0())?,
            year: u16::try_from(datetime.year() - YEAR_EPOCH)
                .map_err(|_| DS1307DateTimeError::YearOutOfRange)?,
        })
    }

    /// Converts to a chrono datetime. `weekday` is not consulted.
    pub fn to_datetime(&self) -> Result<NaiveDateTime, DS1307DateTimeError> {
        NaiveDate::from_ymd_opt(
            self.full_year(),
            u32::from(self.month) + 1,
            u32::from(self.day_of_month),
        )
        .and_then(|d| {
            d.and_hms_opt(
                u32::from(self.hours),
                u32::from(self.minutes),
                u32::from(self.seconds),
            )
        })
        .ok_or(DS1307DateTimeError::InvalidDateTime)
    }

    /// Builds a `CalendarTime` from seconds since the Unix epoch (UTC).
    pub fn from_timestamp(timestamp: i64) -> Result<Self, DS1307DateTimeError> {
        let datetime = DateTime::from_timestamp(timestamp, 0)
            .ok_or(DS1307DateTimeError::InvalidDateTime)?
            .naive_utc();
        Self::from_datetime(&datetime)
    }

    /// Seconds since the Unix epoch, treating the calendar time as UTC.
    pub fn timestamp(&self) -> Result<i64, DS1307DateTimeError> {
        Ok(self.to_datetime()?.and_utc().timestamp())
    }
}

/// Internal representation of the DS1307 timekeeping registers 0x00-0x06.
///
/// Used for register-level I/O and conversion to/from [`CalendarTime`].
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct DS1307DateTime {
    seconds: Seconds,
    minutes: Minutes,
    hours: Hours,
    day: Day,
    date: Date,
    month: Month,
    year: Year,
}

impl DS1307DateTime {
    fn convert_sexagesimal(value: u8) -> Result<u8, DS1307DateTimeError> {
        if value > 59 {
            return Err(DS1307DateTimeError::InvalidDateTime);
        }
        binary_to_bcd(value)
    }

    fn convert_date(date: u8) -> Result<Date, DS1307DateTimeError> {
        if !(1..=31).contains(&date) {
            return Err(DS1307DateTimeError::InvalidDateTime);
        }
        let mut value = Date::default();
        value.set_bcd(binary_to_bcd(date)?);
        Ok(value)
    }

    pub(crate) fn seconds(&self) -> Seconds {
        self.seconds
    }

    /// Encodes a calendar time. The clock halt bit is left clear.
    pub(crate) fn from_calendar(time: &CalendarTime) -> Result<Self, DS1307DateTimeError> {
        let mut seconds = Seconds::default();
        seconds.set_bcd(Self::convert_sexagesimal(time.seconds)?);
        let mut minutes = Minutes::default();
        minutes.set_bcd(Self::convert_sexagesimal(time.minutes)?);

        let raw = DS1307DateTime {
            seconds,
            minutes,
            hours: Hours(encode_hours(time.hours)?),
            day: Day(weekday_to_register(time.weekday)?),
            date: Self::convert_date(time.day_of_month)?,
            month: Month(month_to_register(time.month)?),
            year: Year(year_to_register(time.year)?),
        };

        debug!("raw={:?}", raw);

        Ok(raw)
    }

    /// Decodes the registers. The clock halt bit is ignored here.
    pub(crate) fn into_calendar(self) -> Result<CalendarTime, DS1307DateTimeError> {
        let seconds = bcd_to_binary(self.seconds.bcd());
        let minutes = bcd_to_binary(self.minutes.bcd());
        let hours = decode_hours(self.hours.into());
        debug!(
            "raw_hour={:?} h={} m={} s={}",
            self.hours, hours, minutes, seconds
        );
        if seconds > 59 || minutes > 59 || hours > 23 {
            return Err(DS1307DateTimeError::InvalidDateTime);
        }

        let day_of_month = bcd_to_binary(self.date.bcd());
        if !(1..=31).contains(&day_of_month) {
            return Err(DS1307DateTimeError::InvalidDateTime);
        }

        Ok(CalendarTime {
            seconds,
            minutes,
            hours,
            weekday: weekday_from_register(self.day.into())?,
            day_of_month,
            month: month_from_register(self.month.into())?,
            year: year_from_register(self.year.into())?,
        })
    }
}

impl From<[u8; 7]> for DS1307DateTime {
    fn from(data: [u8; 7]) -> Self {
        DS1307DateTime {
            seconds: Seconds(data[0]),
            minutes: Minutes(data[1]),
            hours: Hours(data[2]),
            day: Day(data[3]),
            date: Date(data[4]),
            month: Month(data[5]),
            year: Year(data[6]),
        }
    }
}

impl From<&DS1307DateTime> for [u8; 7] {
    fn from(dt: &DS1307DateTime) -> [u8; 7] {
        [
            dt.seconds.0,
            dt.minutes.0,
            dt.hours.0,
            dt.day.0,
            dt.date.0,
            dt.month.0,
            dt.year.0,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors that can occur during DS1307 date/time conversion or validation.
pub enum DS1307DateTimeError {
    /// A field is out of range or the registers don't hold a valid date/time
    InvalidDateTime,
    /// The year is outside 2000-2099, the only century the chip represents
    YearOutOfRange,
}
