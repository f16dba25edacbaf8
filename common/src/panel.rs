use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    config::{FieldKind, PanelField, PanelSettings, SETTINGS_BLOCK_LEN, STORED_LEN},
    error::{PanelError, SolarError, StorageError},
    solar::SolarClock,
    storage::ByteStorage,
    types::{CivilDateTime, PanelAction, PanelStatus, SunEvent},
};

pub const FULL_DUTY: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelPins {
    /// PWM output driving the LED panel.
    pub led: u8,
    /// Digital output switching the cooling fan.
    pub fan: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ramp {
    Rising,
    Falling,
}

/// Sunrise/sunset dimmer for one LED panel with a thermal cutoff and fan.
///
/// Call [`PanelController::run`] once per second with the wall-clock time
/// and the panel temperature, then apply the returned actions to the pins.
#[derive(Debug, Clone)]
pub struct PanelController {
    pins: PanelPins,
    storage_address: usize,
    settings: PanelSettings,
    clock: SolarClock,

    sunrise_minutes: u16,
    sunset_minutes: u16,
    last_day: Option<u8>,

    duty: u8,
    fan_on: bool,
}

impl PanelController {
    pub fn new(pins: PanelPins, storage_address: usize) -> Self {
        Self::with_settings(pins, storage_address, PanelSettings::default())
    }

    pub fn with_settings(pins: PanelPins, storage_address: usize, settings: PanelSettings) -> Self {
        let mut panel = Self {
            pins,
            storage_address,
            settings,
            clock: SolarClock::new(),
            sunrise_minutes: 0,
            sunset_minutes: 0,
            last_day: None,
            duty: 0,
            fan_on: false,
        };
        if let Err(err) = panel.sync_clock() {
            warn!("panel settings rejected by solar clock, keeping clock defaults: {err}");
        }
        panel
    }

    pub fn settings(&self) -> &PanelSettings {
        &self.settings
    }

    pub fn clock(&self) -> &SolarClock {
        &self.clock
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn fan_on(&self) -> bool {
        self.fan_on
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn sunrise_minutes(&self) -> u16 {
        self.sunrise_minutes
    }

    pub fn sunset_minutes(&self) -> u16 {
        self.sunset_minutes
    }

    pub fn enable(&mut self, value: bool) {
        if self.settings.enabled != value {
            info!(enabled = value, "panel enable state changed");
            self.settings.enabled = value;
        }
    }

    /// Output levels to write once at start-up, before the first tick.
    pub fn power_on_actions(&self) -> Vec<PanelAction> {
        vec![
            PanelAction::SetDuty {
                pin: self.pins.led,
                duty: self.duty,
            },
            PanelAction::SetFan {
                pin: self.pins.fan,
                on: self.fan_on,
            },
        ]
    }

    /// Pushes time zone and position into the solar clock and forces the
    /// sun times to be recomputed on the next tick.
    pub fn sync_clock(&mut self) -> Result<(), PanelError> {
        let minutes = time_zone_minutes(self.settings.time_zone_hours)?;
        self.clock.set_time_zone(minutes)?;
        self.clock
            .set_position(self.settings.latitude, self.settings.longitude)?;
        self.last_day = None;
        Ok(())
    }

    pub fn run(&mut self, now: CivilDateTime, temperature: i16) -> Vec<PanelAction> {
        let mut actions = Vec::new();

        let cutoff = i32::from(self.settings.temp_cutoff);
        let temp = i32::from(temperature);
        let over_cutoff = temp >= cutoff;
        let cooled_down = temp + i32::from(self.settings.temp_margin) < cutoff;

        if over_cutoff {
            self.enable(false);
        } else if cooled_down {
            self.enable(true);
        }

        if self.settings.enabled {
            self.refresh_sun_times(now);
            let duty = self.compute_duty(now.seconds_of_day());
            self.write_duty(duty, &mut actions);
        } else if self.duty != 0 {
            self.write_duty(0, &mut actions);
        }

        // Inside the hysteresis band the fan keeps its current state.
        if over_cutoff {
            self.write_fan(true, &mut actions);
        } else if cooled_down {
            self.write_fan(self.duty > 0, &mut actions);
        }

        actions
    }

    /// PWM duty for a time of day given the cached sunrise and sunset.
    pub fn compute_duty(&self, seconds_of_day: u32) -> u8 {
        let now = i64::from(seconds_of_day);
        let ramp = i64::from(self.settings.ramp_time_s.max(0));
        let start_on = i64::from(self.sunrise_minutes) * 60;
        let end_on = start_on + ramp;
        let start_off = i64::from(self.sunset_minutes) * 60;
        let end_off = start_off + ramp;

        if now < start_on {
            0
        } else if now <= end_on {
            ramp_duty(now - start_on, ramp, Ramp::Rising)
        } else if now < start_off {
            FULL_DUTY
        } else if now <= end_off {
            ramp_duty(now - start_off, ramp, Ramp::Falling)
        } else {
            0
        }
    }

    pub fn get_value(&self, field: PanelField) -> f32 {
        match field {
            PanelField::RampTime => f32::from(self.settings.ramp_time_s),
            PanelField::TempCutoff => f32::from(self.settings.temp_cutoff),
            PanelField::TempMargin => f32::from(self.settings.temp_margin),
            PanelField::TimeZoneHours => f32::from(self.settings.time_zone_hours),
            PanelField::Latitude => self.settings.latitude,
            PanelField::Longitude => self.settings.longitude,
            PanelField::Enabled => f32::from(u8::from(self.settings.enabled)),
            PanelField::Sunrise => f32::from(self.sunrise_minutes),
            PanelField::Sunset => f32::from(self.sunset_minutes),
        }
    }

    pub fn set_integer_field(&mut self, field: PanelField, value: i16) -> Result<(), PanelError> {
        self.check_writable(field, FieldKind::Integer)?;

        match field {
            PanelField::RampTime => self.settings.ramp_time_s = value,
            PanelField::TempCutoff => self.settings.temp_cutoff = value,
            PanelField::TempMargin => self.settings.temp_margin = value,
            PanelField::TimeZoneHours => {
                let minutes = time_zone_minutes(value)?;
                self.clock.set_time_zone(minutes)?;
                self.settings.time_zone_hours = value;
                self.last_day = None;
            }
            PanelField::Enabled => self.enable(value != 0),
            _ => return Err(PanelError::FieldKindMismatch(field)),
        }
        Ok(())
    }

    pub fn set_float_field(&mut self, field: PanelField, value: f32) -> Result<(), PanelError> {
        self.check_writable(field, FieldKind::Float)?;

        let (latitude, longitude) = match field {
            PanelField::Latitude => (value, self.settings.longitude),
            PanelField::Longitude => (self.settings.latitude, value),
            _ => return Err(PanelError::FieldKindMismatch(field)),
        };
        self.clock.set_position(latitude, longitude)?;
        self.settings.latitude = latitude;
        self.settings.longitude = longitude;
        self.last_day = None;
        Ok(())
    }

    pub fn storage_address(&self) -> usize {
        self.storage_address
    }

    pub fn set_storage_address(&mut self, address: usize) {
        self.storage_address = address;
    }

    /// First address after this panel's settings block. Saturates at the
    /// top of the address space.
    pub fn next_free_address(&self) -> usize {
        self.storage_address.saturating_add(SETTINGS_BLOCK_LEN)
    }

    pub fn save_value<S: ByteStorage + ?Sized>(
        &self,
        field: PanelField,
        storage: &mut S,
    ) -> Result<(), PanelError> {
        let Some(range) = field.storage_range() else {
            return Err(PanelError::ReadOnlyField(field));
        };
        let address = self
            .storage_address
            .checked_add(range.start)
            .ok_or(StorageError::OutOfRange {
                address: self.storage_address,
                len: range.end,
                capacity: storage.capacity(),
            })?;
        storage.write(address, &self.settings.encode_field(field))?;
        Ok(())
    }

    pub fn save_all<S: ByteStorage + ?Sized>(&self, storage: &mut S) -> Result<(), PanelError> {
        let block = self.settings.encode();
        storage.write(self.storage_address, &block[..STORED_LEN])?;
        Ok(())
    }

    pub fn load_all<S: ByteStorage + ?Sized>(&mut self, storage: &S) -> Result<(), PanelError> {
        let mut block = [0u8; SETTINGS_BLOCK_LEN];
        storage.read(self.storage_address, &mut block)?;

        self.settings = if PanelSettings::is_erased(&block) {
            info!(address = self.storage_address, "no panel settings stored, using defaults");
            PanelSettings::default()
        } else {
            let mut settings = PanelSettings::decode(&block);
            if settings.sanitize() {
                warn!(
                    address = self.storage_address,
                    "stored panel settings out of range, using defaults for invalid fields"
                );
            }
            settings
        };
        self.sync_clock()
    }

    pub fn status(&self) -> PanelStatus {
        PanelStatus {
            ramp_time_s: self.settings.ramp_time_s,
            temp_cutoff: self.settings.temp_cutoff,
            temp_margin: self.settings.temp_margin,
            time_zone_hours: self.settings.time_zone_hours,
            latitude: self.settings.latitude,
            longitude: self.settings.longitude,
            enabled: self.settings.enabled,
            sunrise_minutes: self.sunrise_minutes,
            sunset_minutes: self.sunset_minutes,
            duty: self.duty,
            fan_on: self.fan_on,
        }
    }

    fn check_writable(&self, field: PanelField, kind: FieldKind) -> Result<(), PanelError> {
        if field.is_read_only() {
            return Err(PanelError::ReadOnlyField(field));
        }
        if field.kind() != kind {
            return Err(PanelError::FieldKindMismatch(field));
        }
        Ok(())
    }

    fn refresh_sun_times(&mut self, now: CivilDateTime) {
        if self.last_day == Some(now.day) {
            return;
        }
        self.last_day = Some(now.day);

        // On polar day or night the previous values stay in use.
        let date = now.at_midnight();
        for event in [SunEvent::Sunrise, SunEvent::Sunset] {
            let cached = match event {
                SunEvent::Sunrise => &mut self.sunrise_minutes,
                SunEvent::Sunset => &mut self.sunset_minutes,
            };
            match self.clock.compute_sun_event(date, event) {
                Ok(time) => *cached = time.minutes_of_day(),
                Err(err) => warn!(
                    event = event.as_str(),
                    "sun time not updated, keeping {} min: {err}",
                    *cached
                ),
            }
        }

        debug!(
            sunrise = self.sunrise_minutes,
            sunset = self.sunset_minutes,
            "sun times for {}",
            date
        );
    }

    fn write_duty(&mut self, duty: u8, actions: &mut Vec<PanelAction>) {
        if self.duty == duty {
            return;
        }
        self.duty = duty;
        actions.push(PanelAction::SetDuty {
            pin: self.pins.led,
            duty,
        });
    }

    fn write_fan(&mut self, on: bool, actions: &mut Vec<PanelAction>) {
        if self.fan_on == on {
            return;
        }
        self.fan_on = on;
        actions.push(PanelAction::SetFan {
            pin: self.pins.fan,
            on,
        });
    }
}

fn time_zone_minutes(hours: i16) -> Result<i16, SolarError> {
    hours
        .checked_mul(60)
        .ok_or(SolarError::InvalidTimeZone(hours.saturating_mul(60)))
}

fn ramp_duty(elapsed_s: i64, ramp_s: i64, ramp: Ramp) -> u8 {
    if ramp_s == 0 {
        return match ramp {
            Ramp::Rising => FULL_DUTY,
            Ramp::Falling => 0,
        };
    }

    let per_second = f32::from(FULL_DUTY) / ramp_s as f32;
    let step = per_second * elapsed_s as f32;
    let value = match ramp {
        Ramp::Rising => step,
        Ramp::Falling => f32::from(FULL_DUTY) - step,
    };
    round_duty(value)
}

/// Rounds up only when the first two decimals exceed .50.
fn round_duty(value: f32) -> u8 {
    let whole = value.trunc();
    let hundredths = (100.0 * (value - whole)) as i32;
    let rounded = if hundredths > 50 { whole + 1.0 } else { whole };
    rounded.clamp(0.0, f32::from(FULL_DUTY)) as u8
}
