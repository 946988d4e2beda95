//! Register definitions and bitfield structures for the DS1307 RTC.
//!
//! The DS1307 exposes eight timekeeping/control registers at the start of
//! its address space:
//!
//! | Addr | Register | Notes                                           |
//! |------|----------|-------------------------------------------------|
//! | 0x00 | Seconds  | bit 7 is the clock halt (CH) flag               |
//! | 0x01 | Minutes  |                                                 |
//! | 0x02 | Hours    | bit 6 selects 12h mode, bit 5 is AM/PM in 12h   |
//! | 0x03 | Day      | day of week, 1-7                                |
//! | 0x04 | Date     | day of month, 1-31                              |
//! | 0x05 | Month    | 1-12                                            |
//! | 0x06 | Year     | 00-99                                           |
//! | 0x07 | Control  | square wave output and calibration trim         |
//!
//! All time fields are packed BCD.

use bitfield::bitfield;

/// Fixed 7-bit I2C address of the DS1307.
pub const DEVICE_ADDRESS: u8 = 0x68;

/// Clock halt bit in the seconds register.
pub const CLOCK_HALT: u8 = 0b1000_0000;

/// Bits of the control register that carry the square wave configuration.
pub const SQUARE_WAVE_MASK: u8 = 0b1001_0011;

/// Largest calibration trim magnitude the control register can hold.
pub const CALIBRATION_LIMIT: i8 = 31;

/// Register addresses for the DS1307 RTC.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Seconds register (0-59) with clock halt flag
    Seconds = 0x00,
    /// Minutes register (0-59)
    Minutes = 0x01,
    /// Hours register (1-12 + AM/PM or 0-23)
    Hours = 0x02,
    /// Day register (1-7)
    Day = 0x03,
    /// Date register (1-31)
    Date = 0x04,
    /// Month register (1-12)
    Month = 0x05,
    /// Year register (0-99)
    Year = 0x06,
    /// Control register (square wave, calibration)
    Control = 0x07,
}

/// Time representation format stored in the hours register.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeRepresentation {
    /// 24-hour format (0-23)
    TwentyFourHour = 0,
    /// 12-hour format (1-12 + AM/PM)
    TwelveHour = 1,
}
impl From<u8> for TimeRepresentation {
    /// Creates a `TimeRepresentation` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0 or 1.
    fn from(v: u8) -> Self {
        match v {
            0 => TimeRepresentation::TwentyFourHour,
            1 => TimeRepresentation::TwelveHour,
            _ => panic!("Invalid value for TimeRepresentation: {}", v),
        }
    }
}
impl From<TimeRepresentation> for u8 {
    /// Converts a `TimeRepresentation` to its raw register value.
    fn from(v: TimeRepresentation) -> Self {
        v as u8
    }
}

/// Square wave output configuration of the SQW/OUT pin.
///
/// The discriminant is the control register encoding: bit 7 (OUT) is the
/// static output level, bit 4 (SQWE) switches the pin to oscillating output
/// and bits 1-0 (RS) select the rate. While SQWE is set the OUT bit has no
/// effect, so it is never set for the oscillating variants.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SquareWaveMode {
    /// Output disabled, pin driven low
    #[default]
    Low = 0x00,
    /// Output disabled, pin held high
    High = 0x80,
    /// 1 Hz square wave
    Hz1 = 0x10,
    /// 4.096 kHz square wave
    Hz4096 = 0x11,
    /// 8.192 kHz square wave
    Hz8192 = 0x12,
    /// 32.768 kHz square wave
    Hz32768 = 0x13,
}

impl SquareWaveMode {
    /// Output frequency in Hz, or `None` for the static levels.
    pub fn frequency_hz(self) -> Option<u32> {
        match self {
            SquareWaveMode::Low | SquareWaveMode::High => None,
            SquareWaveMode::Hz1 => Some(1),
            SquareWaveMode::Hz4096 => Some(4096),
            SquareWaveMode::Hz8192 => Some(8192),
            SquareWaveMode::Hz32768 => Some(32768),
        }
    }
}

impl From<Control> for SquareWaveMode {
    fn from(control: Control) -> Self {
        if control.square_wave_enable() {
            match control.rate_select() {
                0b00 => SquareWaveMode::Hz1,
                0b01 => SquareWaveMode::Hz4096,
                0b10 => SquareWaveMode::Hz8192,
                _ => SquareWaveMode::Hz32768,
            }
        } else if control.out() {
            SquareWaveMode::High
        } else {
            SquareWaveMode::Low
        }
    }
}

impl From<u8> for SquareWaveMode {
    /// Decodes the square wave bits of a raw control register value.
    fn from(v: u8) -> Self {
        Control(v & SQUARE_WAVE_MASK).into()
    }
}

impl From<SquareWaveMode> for u8 {
    fn from(v: SquareWaveMode) -> Self {
        v as u8
    }
}

// This macro generates the From<u8> and Into<u8> implementations for the
// register type
macro_rules! from_register_u8 {
    ($typ:ty) => {
        impl From<u8> for $typ {
            fn from(v: u8) -> Self {
                paste::paste!([< $typ >](v))
            }
        }
        impl From<$typ> for u8 {
            fn from(v: $typ) -> Self {
                v.0
            }
        }
    };
}

bitfield! {
    /// Seconds register (0-59) with BCD encoding and the clock halt flag.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Seconds(u8);
    impl Debug;
    /// Clock halt: the oscillator is stopped while set
    pub clock_halt, set_clock_halt: 7;
    /// Packed BCD seconds
    pub bcd, set_bcd: 6, 0;
    /// Tens place of seconds (0-5)
    pub ten_seconds, set_ten_seconds: 6, 4;
    /// Ones place of seconds (0-9)
    pub seconds, set_seconds: 3, 0;
}
from_register_u8!(Seconds);

#[cfg(feature = "defmt")]
impl defmt::Format for Seconds {
    fn format(&self, f: defmt::Formatter) {
        let seconds = 10 * self.ten_seconds() + self.seconds();
        defmt::write!(f, "Seconds({}s", seconds);
        if self.clock_halt() {
            defmt::write!(f, ", halted");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Minutes register (0-59) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Minutes(u8);
    impl Debug;
    /// Packed BCD minutes
    pub bcd, set_bcd: 6, 0;
    /// Tens place of minutes (0-5)
    pub ten_minutes, set_ten_minutes: 6, 4;
    /// Ones place of minutes (0-9)
    pub minutes, set_minutes: 3, 0;
}
from_register_u8!(Minutes);

#[cfg(feature = "defmt")]
impl defmt::Format for Minutes {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Minutes({}m)", 10 * self.ten_minutes() + self.minutes());
    }
}

bitfield! {
    /// Hours register with format selection and BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Hours(u8);
    impl Debug;
    /// Time representation format (12/24 hour)
    pub from into TimeRepresentation, time_representation, set_time_representation: 6, 6;
    /// PM flag, only meaningful in 12-hour mode
    pub pm, set_pm: 5;
    /// Packed BCD hour in 12-hour mode (1-12)
    pub twelve_hour_bcd, set_twelve_hour_bcd: 4, 0;
    /// Packed BCD hour in 24-hour mode (0-23)
    pub twenty_four_hour_bcd, set_twenty_four_hour_bcd: 5, 0;
}
from_register_u8!(Hours);

#[cfg(feature = "defmt")]
impl defmt::Format for Hours {
    fn format(&self, f: defmt::Formatter) {
        match self.time_representation() {
            TimeRepresentation::TwentyFourHour => {
                defmt::write!(f, "Hours({=u8:x} 24h)", self.twenty_four_hour_bcd());
            }
            TimeRepresentation::TwelveHour => {
                let half = if self.pm() { "PM" } else { "AM" };
                defmt::write!(f, "Hours({=u8:x} {})", self.twelve_hour_bcd(), half);
            }
        }
    }
}

bitfield! {
    /// Day of week register (1-7).
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Day(u8);
    impl Debug;
    /// Day of week (1-7)
    pub day, set_day: 2, 0;
}
from_register_u8!(Day);

#[cfg(feature = "defmt")]
impl defmt::Format for Day {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Day({})", self.day());
    }
}

bitfield! {
    /// Date register (1-31) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Date(u8);
    impl Debug;
    /// Packed BCD day of month
    pub bcd, set_bcd: 5, 0;
}
from_register_u8!(Date);

#[cfg(feature = "defmt")]
impl defmt::Format for Date {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Date({=u8:x})", self.bcd());
    }
}

bitfield! {
    /// Month register (1-12) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Month(u8);
    impl Debug;
    /// Packed BCD month
    pub bcd, set_bcd: 4, 0;
}
from_register_u8!(Month);

#[cfg(feature = "defmt")]
impl defmt::Format for Month {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Month({=u8:x})", self.bcd());
    }
}

bitfield! {
    /// Year register (0-99) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Year(u8);
    impl Debug;
    /// Packed BCD two-digit year
    pub bcd, set_bcd: 7, 0;
}
from_register_u8!(Year);

#[cfg(feature = "defmt")]
impl defmt::Format for Year {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Year({=u8:x})", self.bcd());
    }
}

bitfield! {
    /// Control register: square wave output and oscillator calibration.
    ///
    /// The calibration trim overlays the square wave bits, so writing one
    /// disturbs the other.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Control(u8);
    impl Debug;
    /// Static output level (OUT) when the square wave is disabled
    pub out, set_out: 7;
    /// Calibration sign, set to speed the oscillator up
    pub calibration_sign, set_calibration_sign: 5;
    /// Square wave enable (SQWE)
    pub square_wave_enable, set_square_wave_enable: 4;
    /// Calibration magnitude (0-31)
    pub calibration_magnitude, set_calibration_magnitude: 4, 0;
    /// Square wave rate select (RS1:RS0)
    pub rate_select, set_rate_select: 1, 0;
}
from_register_u8!(Control);

impl Control {
    /// Signed calibration trim in the range -31..=31.
    pub fn calibration(&self) -> i8 {
        // magnitude is 5 bits wide so the cast can't wrap
        let magnitude = self.calibration_magnitude() as i8;
        if self.calibration_sign() {
            magnitude
        } else {
            -magnitude
        }
    }

    /// Returns a copy with the calibration bits replaced, or `None` when
    /// `trim` is outside -31..=31. Bits 7-6 are preserved.
    pub fn with_calibration(self, trim: i8) -> Option<Control> {
        if !(-CALIBRATION_LIMIT..=CALIBRATION_LIMIT).contains(&trim) {
            return None;
        }
        let mut control = self;
        control.set_calibration_sign(trim >= 0);
        control.set_calibration_magnitude(trim.unsigned_abs());
        Some(control)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Control {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Control({=u8:#x}, trim {})",
            self.0,
            self.calibration()
        );
    }
}
