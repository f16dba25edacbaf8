use std::fmt;

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

/// Wall-clock date and time as the real-time clock reports it.
///
/// `year` is the two-digit offset from 2000 and wraps modulo 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CivilDateTime {
    pub second: u8,
    pub minute: u8,
    pub hour: u8,
    pub day: u8,
    pub month: u8,
    pub year: u8,
}

impl CivilDateTime {
    pub const fn new(year: u8, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            second,
            minute,
            hour,
            day,
            month,
            year,
        }
    }

    /// Midnight of the given calendar day.
    pub const fn date(year: u8, month: u8, day: u8) -> Self {
        Self::new(year, month, day, 0, 0, 0)
    }

    pub fn from_datetime<T: Datelike + Timelike>(dt: &T) -> Self {
        Self {
            second: dt.second().min(59) as u8,
            minute: dt.minute() as u8,
            hour: dt.hour() as u8,
            day: dt.day() as u8,
            month: dt.month() as u8,
            year: (dt.year() - 2000).rem_euclid(100) as u8,
        }
    }

    pub fn at_midnight(self) -> Self {
        Self {
            second: 0,
            minute: 0,
            hour: 0,
            ..self
        }
    }

    pub fn minutes_of_day(&self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }

    pub fn seconds_of_day(&self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32
    }
}

impl fmt::Display for CivilDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "20{:02}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

impl SunEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sunrise => "sunrise",
            Self::Sunset => "sunset",
        }
    }

    /// Hour of day used to seed the day-of-year estimate.
    pub(crate) fn seed_hour(self) -> f32 {
        match self {
            Self::Sunrise => 6.0,
            Self::Sunset => 18.0,
        }
    }
}

/// Pin writes produced by a controller tick, in the order they must be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    SetDuty { pin: u8, duty: u8 },
    SetFan { pin: u8, on: bool },
}

impl PanelAction {
    pub fn apply<P: OutputPort + ?Sized>(self, port: &mut P) {
        match self {
            Self::SetDuty { pin, duty } => port.analog_write(pin, duty),
            Self::SetFan { pin, on } => port.digital_write(pin, on),
        }
    }
}

/// PWM and digital outputs of the board.
pub trait OutputPort {
    fn analog_write(&mut self, pin: u8, duty: u8);

    fn digital_write(&mut self, pin: u8, high: bool);
}

#[derive(Debug, Clone, Serialize)]
pub struct PanelStatus {
    #[serde(rename = "rampTime")]
    pub ramp_time_s: i16,
    #[serde(rename = "tempCutoff")]
    pub temp_cutoff: i16,
    #[serde(rename = "tempMargin")]
    pub temp_margin: i16,
    #[serde(rename = "timeZoneHours")]
    pub time_zone_hours: i16,
    pub latitude: f32,
    pub longitude: f32,
    pub enabled: bool,
    #[serde(rename = "sunriseMinutes")]
    pub sunrise_minutes: u16,
    #[serde(rename = "sunsetMinutes")]
    pub sunset_minutes: u16,
    pub duty: u8,
    #[serde(rename = "fanOn")]
    pub fan_on: bool,
}
