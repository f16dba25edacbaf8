use serde::{Deserialize, Serialize};

use crate::solar::MAX_UTC_OFFSET_MINUTES;

/// Bytes reserved per panel in non-volatile storage.
pub const SETTINGS_BLOCK_LEN: usize = 18;

const ENABLED_OFFSET: usize = 16;
/// Bytes actually written by a full save; the rest of the block is reserved.
pub(crate) const STORED_LEN: usize = ENABLED_OFFSET + 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSettings {
    /// Length of the sunrise and sunset dimmer ramps, seconds.
    pub ramp_time_s: i16,
    pub temp_cutoff: i16,
    /// Hysteresis below the cutoff before the panel is re-enabled.
    pub temp_margin: i16,
    pub time_zone_hours: i16,
    pub latitude: f32,
    pub longitude: f32,
    pub enabled: bool,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            ramp_time_s: 0,
            temp_cutoff: 60,
            temp_margin: 5,
            time_zone_hours: 2,
            latitude: 43.70,
            longitude: 7.25,
            enabled: false,
        }
    }
}

impl PanelSettings {
    /// Replaces values the controller cannot run with, typically read back
    /// from erased storage. Returns true if anything changed.
    pub fn sanitize(&mut self) -> bool {
        let defaults = Self::default();
        let mut changed = false;

        if self.ramp_time_s < 0 {
            self.ramp_time_s = defaults.ramp_time_s;
            changed = true;
        }
        if self.temp_margin < 0 {
            self.temp_margin = defaults.temp_margin;
            changed = true;
        }
        // A cutoff at or below the margin never lets the panel cool down.
        if self.temp_cutoff <= self.temp_margin {
            self.temp_cutoff = defaults.temp_cutoff;
            self.temp_margin = defaults.temp_margin;
            changed = true;
        }
        if i32::from(self.time_zone_hours).abs() * 60 > i32::from(MAX_UTC_OFFSET_MINUTES) {
            self.time_zone_hours = defaults.time_zone_hours;
            changed = true;
        }
        if !(self.latitude.abs() <= 90.0) || !(self.longitude.abs() <= 180.0) {
            self.latitude = defaults.latitude;
            self.longitude = defaults.longitude;
            changed = true;
        }

        changed
    }

    /// True when no stored byte of the block has been written since erase.
    pub fn is_erased(block: &[u8; SETTINGS_BLOCK_LEN]) -> bool {
        block[..STORED_LEN].iter().all(|byte| *byte == 0xFF)
    }

    pub fn encode(&self) -> [u8; SETTINGS_BLOCK_LEN] {
        // The reserved last byte keeps the erased-storage value.
        let mut block = [0xFF; SETTINGS_BLOCK_LEN];
        for field in PanelField::STORED {
            let range = field.storage_range().unwrap_or(0..0);
            block[range].copy_from_slice(&self.encode_field(field));
        }
        block
    }

    pub fn decode(block: &[u8; SETTINGS_BLOCK_LEN]) -> Self {
        let int = |offset: usize| i16::from_le_bytes([block[offset], block[offset + 1]]);
        let float = |offset: usize| {
            f32::from_le_bytes([
                block[offset],
                block[offset + 1],
                block[offset + 2],
                block[offset + 3],
            ])
        };

        Self {
            ramp_time_s: int(0),
            temp_cutoff: int(2),
            temp_margin: int(4),
            time_zone_hours: int(6),
            latitude: float(8),
            longitude: float(12),
            enabled: block[ENABLED_OFFSET] != 0,
        }
    }

    /// Little-endian bytes of one stored field. Empty for computed fields.
    pub fn encode_field(&self, field: PanelField) -> Vec<u8> {
        match field {
            PanelField::RampTime => self.ramp_time_s.to_le_bytes().to_vec(),
            PanelField::TempCutoff => self.temp_cutoff.to_le_bytes().to_vec(),
            PanelField::TempMargin => self.temp_margin.to_le_bytes().to_vec(),
            PanelField::TimeZoneHours => self.time_zone_hours.to_le_bytes().to_vec(),
            PanelField::Latitude => self.latitude.to_le_bytes().to_vec(),
            PanelField::Longitude => self.longitude.to_le_bytes().to_vec(),
            PanelField::Enabled => vec![u8::from(self.enabled)],
            PanelField::Sunrise | PanelField::Sunset => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
}

/// Addressable panel parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PanelField {
    RampTime,
    TempCutoff,
    TempMargin,
    TimeZoneHours,
    Latitude,
    Longitude,
    Enabled,
    Sunrise,
    Sunset,
}

impl PanelField {
    /// Fields persisted in the settings block, in storage order.
    pub const STORED: [Self; 7] = [
        Self::RampTime,
        Self::TempCutoff,
        Self::TempMargin,
        Self::TimeZoneHours,
        Self::Latitude,
        Self::Longitude,
        Self::Enabled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RampTime => "rampTime",
            Self::TempCutoff => "tempCutoff",
            Self::TempMargin => "tempMargin",
            Self::TimeZoneHours => "timeZoneHours",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Enabled => "enabled",
            Self::Sunrise => "sunrise",
            Self::Sunset => "sunset",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::Latitude | Self::Longitude => FieldKind::Float,
            _ => FieldKind::Integer,
        }
    }

    /// Sunrise and sunset are computed daily and cannot be written.
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Sunrise | Self::Sunset)
    }

    /// Byte range of the field relative to the start of the settings block.
    pub fn storage_range(self) -> Option<std::ops::Range<usize>> {
        let (offset, len) = match self {
            Self::RampTime => (0, 2),
            Self::TempCutoff => (2, 2),
            Self::TempMargin => (4, 2),
            Self::TimeZoneHours => (6, 2),
            Self::Latitude => (8, 4),
            Self::Longitude => (12, 4),
            Self::Enabled => (ENABLED_OFFSET, 1),
            Self::Sunrise | Self::Sunset => return None,
        };
        Some(offset..offset + len)
    }
}
