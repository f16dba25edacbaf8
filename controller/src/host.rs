use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::Context;
use chrono::{FixedOffset, Offset, Utc};
use tracing::{debug, info, warn};

use ledpanel_common::{
    storage::DEFAULT_CAPACITY, ByteStorage, CivilDateTime, FieldKind, MemoryStorage, OutputPort,
    PanelController, PanelField, PanelPins, StorageError,
};

const SETTING_OVERRIDES: [(&str, PanelField); 6] = [
    ("PANEL_RAMP_TIME", PanelField::RampTime),
    ("PANEL_TEMP_CUTOFF", PanelField::TempCutoff),
    ("PANEL_TEMP_MARGIN", PanelField::TempMargin),
    ("PANEL_TZ_HOURS", PanelField::TimeZoneHours),
    ("PANEL_LATITUDE", PanelField::Latitude),
    ("PANEL_LONGITUDE", PanelField::Longitude),
];

#[derive(Debug, Clone)]
struct HostConfig {
    storage_path: PathBuf,
    storage_address: usize,
    pins: PanelPins,
    tick: Duration,
    status_interval: Duration,
    base_temp: i16,
}

impl HostConfig {
    fn from_env() -> Self {
        Self {
            storage_path: std::env::var("PANEL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("panel-eeprom.bin")),
            storage_address: env_or("PANEL_STORAGE_ADDR", 0),
            pins: PanelPins {
                led: env_or("PANEL_LED_PIN", 9),
                fan: env_or("PANEL_FAN_PIN", 8),
            },
            tick: Duration::from_millis(env_or("PANEL_TICK_MS", 1_000u64).max(10)),
            status_interval: Duration::from_secs(env_or("PANEL_STATUS_INTERVAL_S", 10)),
            base_temp: env_or("PANEL_BASE_TEMP", 30),
        }
    }

    fn ticks_per_status(&self) -> u64 {
        let tick_ms = self.tick.as_millis().max(1);
        (self.status_interval.as_millis() / tick_ms).max(1) as u64
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

/// Storage image kept in RAM and mirrored to a file on flush.
struct FileStorage {
    path: PathBuf,
    image: MemoryStorage,
    dirty: bool,
}

impl FileStorage {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let image = match std::fs::read(path) {
            Ok(mut bytes) => {
                if bytes.len() < DEFAULT_CAPACITY {
                    bytes.resize(DEFAULT_CAPACITY, 0xFF);
                }
                MemoryStorage::from_bytes(bytes)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("no storage image at {}, starting erased", path.display());
                MemoryStorage::default()
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read storage image {}", path.display()))
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            image,
            dirty: false,
        })
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        std::fs::write(&self.path, self.image.as_bytes())
            .with_context(|| format!("failed to write storage image {}", self.path.display()))?;
        self.dirty = false;
        debug!("storage image flushed to {}", self.path.display());
        Ok(())
    }
}

impl ByteStorage for FileStorage {
    fn capacity(&self) -> usize {
        self.image.capacity()
    }

    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.image.read(address, buf)
    }

    fn write(&mut self, address: usize, bytes: &[u8]) -> Result<(), StorageError> {
        self.image.write(address, bytes)?;
        self.dirty = true;
        Ok(())
    }
}

/// Stands in for the board's PWM and GPIO drivers.
struct LoggedPins;

impl OutputPort for LoggedPins {
    fn analog_write(&mut self, pin: u8, duty: u8) {
        info!(pin, duty, "pwm write");
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        info!(pin, high, "digital write");
    }
}

/// Panel temperature simulation until a probe driver is wired in.
struct SimulatedSensor {
    base: i16,
    tick: u64,
}

impl SimulatedSensor {
    fn new(base: i16) -> Self {
        Self { base, tick: 0 }
    }

    fn read(&mut self) -> i16 {
        self.tick = self.tick.wrapping_add(1);
        self.base.saturating_add((self.tick % 8) as i16)
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = HostConfig::from_env();
    let mut storage = FileStorage::open(&config.storage_path)?;

    let mut panel = PanelController::new(config.pins, config.storage_address);
    if let Err(err) = panel.load_all(&storage) {
        warn!("failed to load panel settings, using defaults: {err}");
    }
    apply_setting_overrides(&mut panel, &mut storage, |name| std::env::var(name).ok())?;
    storage.flush()?;

    let mut pins = LoggedPins;
    for action in panel.power_on_actions() {
        action.apply(&mut pins);
    }

    info!(
        address = panel.storage_address(),
        next_free = panel.next_free_address(),
        "panel controller started: {:?}",
        panel.settings()
    );

    let mut sensor = SimulatedSensor::new(config.base_temp);
    let mut interval = tokio::time::interval(config.tick);
    let ticks_per_status = config.ticks_per_status();
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for shutdown signal")?;
                info!("shutting down");
                break;
            }
        }

        let now = local_now(panel.settings().time_zone_hours);
        let temperature = sensor.read();
        for action in panel.run(now, temperature) {
            action.apply(&mut pins);
        }

        ticks = ticks.wrapping_add(1);
        if ticks % ticks_per_status == 0 {
            match serde_json::to_string(&panel.status()) {
                Ok(body) => info!("panel status at {now}: {body}"),
                Err(err) => warn!("panel status serialization failed: {err}"),
            }
        }
    }

    storage.flush()
}

/// Applies `PANEL_*` overrides and persists each one that changed a setting.
fn apply_setting_overrides<S, F>(
    panel: &mut PanelController,
    storage: &mut S,
    lookup: F,
) -> anyhow::Result<()>
where
    S: ByteStorage,
    F: Fn(&str) -> Option<String>,
{
    for (name, field) in SETTING_OVERRIDES {
        let Some(raw) = lookup(name) else {
            continue;
        };

        let result = match field.kind() {
            FieldKind::Integer => raw
                .trim()
                .parse::<i16>()
                .with_context(|| format!("{name} must be an integer, got {raw:?}"))
                .and_then(|value| Ok(panel.set_integer_field(field, value)?)),
            FieldKind::Float => raw
                .trim()
                .parse::<f32>()
                .with_context(|| format!("{name} must be a number, got {raw:?}"))
                .and_then(|value| Ok(panel.set_float_field(field, value)?)),
        };

        match result {
            Ok(()) => {
                panel
                    .save_value(field, storage)
                    .with_context(|| format!("failed to persist {}", field.as_str()))?;
                info!("{} set to {} from {name}", field.as_str(), panel.get_value(field));
            }
            Err(err) => warn!("ignoring {name}: {err:#}"),
        }
    }
    Ok(())
}

fn local_now(time_zone_hours: i16) -> CivilDateTime {
    let offset = FixedOffset::east_opt(i32::from(time_zone_hours) * 3600)
        .unwrap_or_else(|| Utc.fix());
    CivilDateTime::from_datetime(&Utc::now().with_timezone(&offset))
}
