//! Low-precision sunrise/sunset calculator and the calendar arithmetic it needs.
//!
//! The sun position comes from the NOAA general solar position Fourier series
//! evaluated at a fractional year estimated from month and day. Accuracy is
//! about a minute at mid latitudes, which is all a dimmer ramp needs.

use serde::{Deserialize, Serialize};

use crate::{
    error::SolarError,
    types::{CivilDateTime, SunEvent},
};

pub const MAX_UTC_OFFSET_MINUTES: i16 = 720;

const RAD_TO_DEG: f32 = 57.295_78;
/// Mean month length used to turn (month, day) into a day-of-year estimate.
const MEAN_MONTH_DAYS: f32 = 30.4375;
/// Radians of orbit per day of year.
const FRACTIONAL_YEAR_PER_DAY: f32 = 1.718_771_8e-2;
/// 90.833 degrees: geometric horizon plus refraction and the solar radius.
const SUN_ZENITH_RAD: f32 = 1.585_340_7;

/// Daylight-saving rule: nth week of a start and end month, plus the advance.
///
/// Rules are validated and kept for configuration compatibility only. No
/// computation in this crate applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DstRules {
    pub start_month: u8,
    pub start_week: u8,
    pub end_month: u8,
    pub end_week: u8,
    pub advance_minutes: u8,
}

impl DstRules {
    /// Second week of March to first week of November, one hour.
    pub const US: Self = Self {
        start_month: 3,
        start_week: 2,
        end_month: 11,
        end_week: 1,
        advance_minutes: 60,
    };

    pub fn validate(&self) -> bool {
        (1..=12).contains(&self.start_month)
            && (1..=12).contains(&self.end_month)
            && (1..=4).contains(&self.start_week)
            && (1..=4).contains(&self.end_week)
    }
}

#[derive(Debug, Clone)]
pub struct SolarClock {
    latitude: f32,
    longitude: f32,
    utc_offset_minutes: i16,
    dst: DstRules,
}

impl Default for SolarClock {
    fn default() -> Self {
        Self {
            latitude: 27.0,
            longitude: -82.0,
            utc_offset_minutes: -300,
            dst: DstRules::US,
        }
    }
}

impl SolarClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time_zone(&self) -> i16 {
        self.utc_offset_minutes
    }

    /// (latitude, longitude) in degrees.
    pub fn position(&self) -> (f32, f32) {
        (self.latitude, self.longitude)
    }

    pub fn dst_rules(&self) -> DstRules {
        self.dst
    }

    pub fn set_time_zone(&mut self, minutes: i16) -> Result<(), SolarError> {
        if minutes.unsigned_abs() > MAX_UTC_OFFSET_MINUTES as u16 {
            return Err(SolarError::InvalidTimeZone(minutes));
        }
        self.utc_offset_minutes = minutes;
        Ok(())
    }

    pub fn set_position(&mut self, latitude: f32, longitude: f32) -> Result<(), SolarError> {
        // Written as negated range checks so NaN is rejected too.
        if !(longitude.abs() <= 180.0) || !(latitude.abs() <= 90.0) {
            return Err(SolarError::InvalidPosition {
                latitude,
                longitude,
            });
        }
        self.latitude = latitude;
        self.longitude = longitude;
        Ok(())
    }

    pub fn set_dst_rules(&mut self, rules: DstRules) -> Result<(), SolarError> {
        if !rules.validate() {
            return Err(SolarError::InvalidDstRule);
        }
        self.dst = rules;
        Ok(())
    }

    pub fn is_leap_year(year: i32) -> bool {
        (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
    }

    /// Number of days in the month of `date`.
    pub fn month_length(date: &CivilDateTime) -> u8 {
        days_in_month(date.month, i64::from(date.year))
    }

    /// Adds `offset_minutes` to the time of day, carrying into the calendar.
    ///
    /// Seconds are left as they are. The two-digit year wraps 99 -> 0 and
    /// 0 -> 99.
    pub fn apply_minute_offset(date: CivilDateTime, offset_minutes: i32) -> CivilDateTime {
        let total_minutes = i64::from(date.minute) + i64::from(offset_minutes);
        let minute = total_minutes.rem_euclid(60);

        let total_hours = i64::from(date.hour) + total_minutes.div_euclid(60);
        let hour = total_hours.rem_euclid(24);

        let mut day = i64::from(date.day) + total_hours.div_euclid(24);
        let mut month = i64::from(date.month.clamp(1, 12));
        let mut year = i64::from(date.year);

        loop {
            if day < 1 {
                month -= 1;
                if month < 1 {
                    month = 12;
                    year -= 1;
                }
                day += i64::from(days_in_month(month as u8, year));
                continue;
            }

            let length = i64::from(days_in_month(month as u8, year));
            if day <= length {
                break;
            }
            day -= length;
            month += 1;
            if month > 12 {
                month = 1;
                year += 1;
            }
        }

        CivilDateTime {
            second: date.second,
            minute: minute as u8,
            hour: hour as u8,
            day: day as u8,
            month: month as u8,
            year: year.rem_euclid(100) as u8,
        }
    }

    pub fn sunrise(&self, date: CivilDateTime) -> Result<CivilDateTime, SolarError> {
        self.compute_sun_event(date, SunEvent::Sunrise)
    }

    pub fn sunset(&self, date: CivilDateTime) -> Result<CivilDateTime, SolarError> {
        self.compute_sun_event(date, SunEvent::Sunset)
    }

    /// Local time of `event` on the calendar day of `date`.
    ///
    /// The time-of-day fields of `date` are ignored. The result may land on the
    /// neighbouring day when the time zone pushes the event across midnight.
    /// Fails with [`SolarError::NoSunEvent`] during polar day or night.
    pub fn compute_sun_event(
        &self,
        date: CivilDateTime,
        event: SunEvent,
    ) -> Result<CivilDateTime, SolarError> {
        let lon = -self.longitude / RAD_TO_DEG;
        let lat = self.latitude / RAD_TO_DEG;

        let y = fractional_year(date.month, date.day, event.seed_hour());
        let eqt = equation_of_time(y);
        let decl = solar_declination(y);

        let cos_ha = SUN_ZENITH_RAD.cos() / (lat.cos() * decl.cos()) - lat.tan() * decl.tan();
        if !(cos_ha.abs() <= 1.0) {
            return Err(SolarError::NoSunEvent { date });
        }

        let ha = match event {
            SunEvent::Sunrise => cos_ha.acos(),
            SunEvent::Sunset => -cos_ha.acos(),
        };

        let utc_minutes = (720.0 + 4.0 * (lon - ha) * RAD_TO_DEG - eqt) as i32;
        let local_minutes = utc_minutes + i32::from(self.utc_offset_minutes);

        Ok(Self::apply_minute_offset(date.at_midnight(), local_minutes))
    }
}

/// Orbit angle in radians for a 1-based month and day at `hour`.
pub fn fractional_year(month: u8, day: u8, hour: f32) -> f32 {
    let month = f32::from(month.saturating_sub(1));
    let day = f32::from(day.saturating_sub(1));
    (month * MEAN_MONTH_DAYS + day + hour / 24.0) * FRACTIONAL_YEAR_PER_DAY
}

/// Equation of time in minutes.
pub fn equation_of_time(y: f32) -> f32 {
    229.18
        * (0.000075 + 0.001868 * y.cos()
            - 0.032077 * y.sin()
            - 0.014615 * (2.0 * y).cos()
            - 0.040849 * (2.0 * y).sin())
}

/// Solar declination in radians.
pub fn solar_declination(y: f32) -> f32 {
    0.006918 - 0.399912 * y.cos() + 0.070257 * y.sin() - 0.006758 * (2.0 * y).cos()
        + 0.000907 * (2.0 * y).sin()
        - 0.002697 * (3.0 * y).cos()
        + 0.00148 * (3.0 * y).sin()
}

fn days_in_month(month: u8, two_digit_year: i64) -> u8 {
    if month == 2 {
        let year = 2000 + two_digit_year.rem_euclid(100) as i32;
        return if SolarClock::is_leap_year(year) { 29 } else { 28 };
    }
    // Odd months have 31 days up to July, even months from August on.
    let mut long = month & 1 == 1;
    if month > 7 {
        long = !long;
    }
    if long {
        31
    } else {
        30
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn nice_clock() -> SolarClock {
        let mut clock = SolarClock::new();
        clock.set_position(43.70, 7.25).unwrap();
        clock.set_time_zone(60).unwrap();
        clock
    }

    fn minutes(dt: CivilDateTime) -> u16 {
        dt.minutes_of_day()
    }

    #[test]
    fn accepts_positions_on_the_boundary() {
        let mut clock = SolarClock::new();
        for (lat, lon) in [(90.0, 180.0), (-90.0, -180.0), (0.0, 0.0), (45.5, -73.6)] {
            assert!(clock.set_position(lat, lon).is_ok(), "{lat},{lon}");
            assert_eq!(clock.position(), (lat, lon));
        }
    }

    #[test]
    fn rejected_position_leaves_state_unchanged() {
        let mut clock = SolarClock::new();
        clock.set_position(10.0, 20.0).unwrap();

        for (lat, lon) in [(90.5, 0.0), (-91.0, 0.0), (0.0, 180.1), (0.0, -200.0), (f32::NAN, 0.0)] {
            assert!(matches!(
                clock.set_position(lat, lon),
                Err(SolarError::InvalidPosition { .. })
            ));
        }
        assert_eq!(clock.position(), (10.0, 20.0));
    }

    #[test]
    fn time_zone_is_limited_to_twelve_hours() {
        let mut clock = SolarClock::new();
        assert!(clock.set_time_zone(720).is_ok());
        assert!(clock.set_time_zone(-720).is_ok());
        assert_eq!(clock.set_time_zone(721), Err(SolarError::InvalidTimeZone(721)));
        assert_eq!(clock.set_time_zone(-800), Err(SolarError::InvalidTimeZone(-800)));
        assert_eq!(clock.time_zone(), -720);
    }

    #[test]
    fn dst_rules_reject_zero_and_out_of_range_fields() {
        let mut clock = SolarClock::new();
        let europe = DstRules {
            start_month: 3,
            start_week: 4,
            end_month: 10,
            end_week: 4,
            advance_minutes: 60,
        };
        assert!(clock.set_dst_rules(europe).is_ok());

        for bad in [
            DstRules { start_month: 0, ..europe },
            DstRules { start_week: 0, ..europe },
            DstRules { end_month: 13, ..europe },
            DstRules { end_week: 5, ..europe },
        ] {
            assert_eq!(clock.set_dst_rules(bad), Err(SolarError::InvalidDstRule));
        }
        assert_eq!(clock.dst_rules(), europe);
    }

    #[test]
    fn leap_years_follow_gregorian_rule() {
        for (year, leap) in [(2000, true), (1900, false), (2024, true), (2023, false), (2100, false)] {
            assert_eq!(SolarClock::is_leap_year(year), leap, "{year}");
        }
    }

    #[test]
    fn month_lengths_for_common_and_leap_years() {
        let expected = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
        let lengths: Vec<u8> = (1..=12)
            .map(|month| SolarClock::month_length(&CivilDateTime::date(23, month, 1)))
            .collect();
        assert_eq!(lengths, expected);

        assert_eq!(SolarClock::month_length(&CivilDateTime::date(24, 2, 1)), 29);
        assert_eq!(SolarClock::month_length(&CivilDateTime::date(0, 2, 1)), 29);
    }

    #[test]
    fn adding_a_day_of_minutes_keeps_time_of_day() {
        let start = CivilDateTime::new(24, 2, 28, 13, 37, 5);
        let next = SolarClock::apply_minute_offset(start, 1440);
        assert_eq!(next, CivilDateTime::new(24, 2, 29, 13, 37, 5));

        let start = CivilDateTime::new(23, 12, 31, 8, 0, 0);
        let next = SolarClock::apply_minute_offset(start, 1440);
        assert_eq!(next, CivilDateTime::new(24, 1, 1, 8, 0, 0));
    }

    #[test]
    fn one_minute_before_midnight_borrows_previous_month() {
        let back = SolarClock::apply_minute_offset(CivilDateTime::date(24, 3, 1), -1);
        assert_eq!(back, CivilDateTime::new(24, 2, 29, 23, 59, 0));

        let back = SolarClock::apply_minute_offset(CivilDateTime::date(23, 3, 1), -1);
        assert_eq!(back, CivilDateTime::new(23, 2, 28, 23, 59, 0));

        let back = SolarClock::apply_minute_offset(CivilDateTime::date(24, 5, 1), -1);
        assert_eq!(back, CivilDateTime::new(24, 4, 30, 23, 59, 0));
    }

    #[test]
    fn two_digit_year_wraps_both_ways() {
        let back = SolarClock::apply_minute_offset(CivilDateTime::date(0, 1, 1), -1);
        assert_eq!(back, CivilDateTime::new(99, 12, 31, 23, 59, 0));

        let forward = SolarClock::apply_minute_offset(CivilDateTime::new(99, 12, 31, 23, 59, 0), 1);
        assert_eq!(forward, CivilDateTime::date(0, 1, 1));
    }

    #[test]
    fn large_offsets_cross_several_months() {
        let back = SolarClock::apply_minute_offset(CivilDateTime::date(24, 3, 1), -61 * 1440);
        assert_eq!(back, CivilDateTime::date(23, 12, 31));

        let forward = SolarClock::apply_minute_offset(CivilDateTime::date(23, 12, 31), 61 * 1440);
        assert_eq!(forward, CivilDateTime::date(24, 3, 1));
    }

    #[test]
    fn negative_offsets_stay_in_range() {
        let shifted = SolarClock::apply_minute_offset(CivilDateTime::new(24, 7, 10, 2, 15, 0), -200);
        assert_eq!(shifted, CivilDateTime::new(24, 7, 9, 22, 55, 0));
    }

    #[test]
    fn midsummer_in_nice() {
        let clock = nice_clock();
        let date = CivilDateTime::new(24, 6, 21, 12, 0, 0);

        let sunrise = clock.sunrise(date).unwrap();
        let sunset = clock.sunset(date).unwrap();

        assert_eq!((sunrise.day, sunrise.month, sunrise.year), (21, 6, 24));
        assert_eq!((sunset.day, sunset.month, sunset.year), (21, 6, 24));
        assert!((4 * 60..6 * 60).contains(&minutes(sunrise)), "sunrise {sunrise}");
        assert!((19 * 60..21 * 60).contains(&minutes(sunset)), "sunset {sunset}");
        assert!(minutes(sunrise) < minutes(sunset));
        assert_eq!(sunrise.second, 0);
    }

    #[test]
    fn equinox_on_the_equator_is_close_to_six_and_six() {
        let mut clock = SolarClock::new();
        clock.set_position(0.0, 0.0).unwrap();
        clock.set_time_zone(0).unwrap();
        let date = CivilDateTime::date(24, 3, 21);

        let sunrise = minutes(clock.sunrise(date).unwrap());
        let sunset = minutes(clock.sunset(date).unwrap());

        assert!((355..=370).contains(&sunrise), "sunrise {sunrise}");
        assert!((1080..=1100).contains(&sunset), "sunset {sunset}");
    }

    #[test]
    fn event_before_utc_midnight_lands_on_previous_day() {
        let mut clock = SolarClock::new();
        clock.set_position(0.0, 170.0).unwrap();
        clock.set_time_zone(0).unwrap();

        let sunrise = clock.sunrise(CivilDateTime::date(24, 3, 1)).unwrap();

        assert_eq!((sunrise.year, sunrise.month, sunrise.day), (24, 2, 29));
        assert_eq!(sunrise.hour, 18);
    }

    #[test]
    fn polar_night_and_day_report_no_event() {
        let mut clock = SolarClock::new();
        clock.set_position(80.0, 15.0).unwrap();

        let winter = CivilDateTime::new(24, 12, 21, 9, 30, 0);
        assert_eq!(
            clock.sunrise(winter),
            Err(SolarError::NoSunEvent { date: winter })
        );

        let summer = CivilDateTime::date(24, 6, 21);
        assert_eq!(
            clock.sunset(summer),
            Err(SolarError::NoSunEvent { date: summer })
        );
    }

    #[test]
    fn time_zone_shifts_event_by_its_offset() {
        let mut clock = nice_clock();
        let date = CivilDateTime::date(24, 9, 1);
        let base = minutes(clock.sunset(date).unwrap());

        clock.set_time_zone(120).unwrap();
        let shifted = minutes(clock.sunset(date).unwrap());

        assert_eq!(shifted, base + 60);
    }

    #[test]
    fn equation_of_time_matches_known_extremes() {
        // Early November peak, roughly +16 minutes.
        let november = equation_of_time(fractional_year(11, 3, 12.0));
        assert!((15.0..=17.5).contains(&november), "{november}");

        // Mid February trough, roughly -14 minutes.
        let february = equation_of_time(fractional_year(2, 11, 12.0));
        assert!((-15.5..=-13.0).contains(&february), "{february}");
    }

    #[test]
    fn declination_peaks_at_solstices() {
        let june = solar_declination(fractional_year(6, 21, 12.0)) * RAD_TO_DEG;
        let december = solar_declination(fractional_year(12, 21, 12.0)) * RAD_TO_DEG;
        assert!((23.0..=23.6).contains(&june), "{june}");
        assert!((-23.6..=-23.0).contains(&december), "{december}");
    }
}
