use thiserror::Error;

use crate::{config::PanelField, types::CivilDateTime};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolarError {
    #[error("time zone offset {0} min is outside +/-720 min")]
    InvalidTimeZone(i16),
    #[error("position {latitude},{longitude} is outside +/-90 lat, +/-180 lon")]
    InvalidPosition { latitude: f32, longitude: f32 },
    #[error("dst rule fields out of range")]
    InvalidDstRule,
    /// Polar day or night. `date` is the caller's value, untouched.
    #[error("no sun event on {date}")]
    NoSunEvent { date: CivilDateTime },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("access of {len} bytes at {address} exceeds storage capacity {capacity}")]
    OutOfRange {
        address: usize,
        len: usize,
        capacity: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PanelError {
    #[error("{} is read-only", .0.as_str())]
    ReadOnlyField(PanelField),
    #[error("{} does not hold that kind of value", .0.as_str())]
    FieldKindMismatch(PanelField),
    #[error(transparent)]
    Solar(#[from] SolarError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
