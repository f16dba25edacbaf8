pub mod config;
pub mod error;
pub mod panel;
pub mod solar;
pub mod storage;
pub mod types;

pub use config::{FieldKind, PanelField, PanelSettings, SETTINGS_BLOCK_LEN};
pub use error::{PanelError, SolarError, StorageError};
pub use panel::{PanelController, PanelPins, FULL_DUTY};
pub use solar::{DstRules, SolarClock};
pub use storage::{ByteStorage, MemoryStorage};
pub use types::{CivilDateTime, OutputPort, PanelAction, PanelStatus, SunEvent};
