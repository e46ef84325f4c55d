use chrono::format::{Item, StrftimeItems};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Intervals at or below this are rejected and replaced by [`DEFAULT_INTERVAL`]
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Replacement for intervals that are too short to be meaningful
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Name used to derive the board camera's filename prefix
pub const PICAMERA_NAME: &str = "Picam";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EyepiConfig {
    /// strftime layout used in captured filenames
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// IANA timezone for the overlay text (local time when unset)
    #[serde(default)]
    pub timestamp_timezone: Option<String>,

    /// Path to TrueType font file for timestamp overlay
    #[serde(default = "default_timestamp_font_path")]
    pub timestamp_font_path: String,

    /// Font size for timestamp overlay
    #[serde(default = "default_timestamp_font_size")]
    pub timestamp_font_size: f32,

    /// Base path for per-camera output directories
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// How often the USB device tree is polled
    #[serde(default = "default_device_poll_interval")]
    pub device_poll_interval: Interval,

    /// Unix socket of the telegraf listener
    #[serde(default = "default_metrics_socket")]
    pub metrics_socket: String,

    #[serde(default)]
    pub picamera: PiCameraConfig,

    /// gphoto2 cameras keyed by name
    #[serde(default)]
    pub gphoto: BTreeMap<String, GphotoCameraConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PiCameraConfig {
    #[serde(default = "default_enable")]
    pub enable: bool,

    #[serde(default = "default_picamera_interval")]
    pub interval: Interval,

    #[serde(default)]
    pub filename_prefix: String,

    #[serde(default)]
    pub output_dir: String,

    /// Formats written on every capture, in order
    #[serde(default = "default_image_types")]
    pub image_types: Vec<ImageType>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GphotoCameraConfig {
    #[serde(default = "default_enable")]
    pub enable: bool,

    #[serde(default = "default_gphoto_interval")]
    pub interval: Interval,

    #[serde(default)]
    pub filename_prefix: String,

    #[serde(default)]
    pub output_dir: String,

    /// Serial number reported by `gphoto2 --get-config=serialnumber`
    pub serial_number: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    #[serde(alias = "jpeg")]
    Jpg,
    #[serde(alias = "tif")]
    Tiff,
    Bmp,
    Png,
    Gif,
}

impl ImageType {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageType::Jpg => "jpg",
            ImageType::Tiff => "tiff",
            ImageType::Bmp => "bmp",
            ImageType::Png => "png",
            ImageType::Gif => "gif",
        }
    }
}

/// Duration written Go-style in the config file ("10m", "1h30m", "500ms")
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval(pub Duration);

impl Interval {
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for Interval {
    fn from(duration: Duration) -> Self {
        Interval(duration)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_duration(self.0))
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(self.0))
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IntervalVisitor;

        impl<'de> Visitor<'de> for IntervalVisitor {
            type Value = Interval;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a duration such as \"10m\" or a number of seconds")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Interval, E> {
                parse_duration(value).map(Interval).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Interval, E> {
                Ok(Interval(Duration::from_secs(value)))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Interval, E> {
                u64::try_from(value)
                    .map(|secs| Interval(Duration::from_secs(secs)))
                    .map_err(|_| E::custom("duration must not be negative"))
            }
        }

        deserializer.deserialize_any(IntervalVisitor)
    }
}

/// Parse a Go-style duration: a sequence of decimal numbers, each with a unit
/// suffix (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`). A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let text = input.trim();
    if text.is_empty() {
        return Err("empty duration".to_string());
    }
    if text == "0" {
        return Ok(Duration::ZERO);
    }

    let mut nanos = 0f64;
    let mut rest = text;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return Err(format!("invalid duration '{}'", input));
        }
        let value: f64 = rest[..number_end]
            .parse()
            .map_err(|_| format!("invalid number in duration '{}'", input))?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration '{}'", input)),
            unit => return Err(format!("unknown unit '{}' in duration '{}'", unit, input)),
        };
        nanos += value * scale;
        rest = &rest[unit_end..];
    }

    Ok(Duration::from_nanos(nanos.round() as u64))
}

/// Inverse of [`parse_duration`] for whole-millisecond values
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }

    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();
    let (hours, minutes, seconds) = (total_secs / 3600, (total_secs / 60) % 60, total_secs % 60);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    if seconds > 0 {
        out.push_str(&format!("{}s", seconds));
    }
    if millis > 0 {
        out.push_str(&format!("{}ms", millis));
    }
    out
}

impl EyepiConfig {
    /// Load configuration from a specific file path.
    ///
    /// Defaults are applied, the result is validated and every camera's
    /// output directory is created before returning.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("timestamp_format", default_timestamp_format())?
            .set_default("timestamp_font_path", default_timestamp_font_path())?
            .set_default(
                "timestamp_font_size",
                default_timestamp_font_size() as f64,
            )?
            .set_default("base_dir", default_base_dir())?
            .set_default(
                "device_poll_interval",
                default_device_poll_interval().to_string(),
            )?
            .set_default("metrics_socket", default_metrics_socket())?
            .set_default("picamera.enable", default_enable())?
            .set_default("picamera.interval", default_picamera_interval().to_string())?
            .add_source(File::new(&path_str, FileFormat::Toml).required(true))
            .add_source(
                Environment::with_prefix("EYEPI")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: EyepiConfig = settings.try_deserialize()?;
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Foreign(Box::new(e)))?;
        let names = gphoto_camera_names(&contents).map_err(|e| ConfigError::Foreign(Box::new(e)))?;
        config.restore_camera_names(&names);
        config.apply_defaults(&hostname());
        config.validate()?;
        config.create_output_dirs().map_err(|e| {
            ConfigError::Message(format!("Failed to create output directory: {}", e))
        })?;

        info!(
            "Configuration loaded: picamera enabled={}, {} gphoto camera(s)",
            config.picamera.enable,
            config.gphoto.len()
        );
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Re-key `gphoto` with the camera names as written in the file. The
    /// `config` builder lowercases table keys on the way through.
    pub fn restore_camera_names(&mut self, names: &[String]) {
        let mut written: BTreeMap<String, Option<&String>> = BTreeMap::new();
        for name in names {
            written
                .entry(name.to_lowercase())
                .and_modify(|slot| *slot = None)
                .or_insert(Some(name));
        }

        let cameras = std::mem::take(&mut self.gphoto);
        for (key, camera) in cameras {
            let name = match written.get(&key) {
                Some(Some(name)) => (*name).clone(),
                Some(None) => {
                    warn!("Camera names differing only in case collapse to '{}'", key);
                    key
                }
                None => key,
            };
            self.gphoto.insert(name, camera);
        }
    }

    /// Fill in derived prefixes and output directories and clamp intervals
    pub fn apply_defaults(&mut self, hostname: &str) {
        let base_dir = PathBuf::from(&self.base_dir);

        let picamera = &mut self.picamera;
        if picamera.filename_prefix.is_empty() {
            picamera.filename_prefix = format!("{}-{}", hostname, PICAMERA_NAME);
        }
        if picamera.output_dir.is_empty() {
            picamera.output_dir = base_dir
                .join(&picamera.filename_prefix)
                .to_string_lossy()
                .into_owned();
        }
        picamera.interval = clamp_interval(PICAMERA_NAME, picamera.interval);

        for (name, camera) in self.gphoto.iter_mut() {
            if camera.filename_prefix.is_empty() {
                camera.filename_prefix = format!("{}-{}", hostname, name);
            }
            if camera.output_dir.is_empty() {
                camera.output_dir = base_dir
                    .join(&camera.filename_prefix)
                    .to_string_lossy()
                    .into_owned();
            }
            camera.interval = clamp_interval(name, camera.interval);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timestamp_format.is_empty() {
            return Err(ConfigError::Message(
                "timestamp_format must not be empty".to_string(),
            ));
        }

        if StrftimeItems::new(&self.timestamp_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Message(format!(
                "timestamp_format '{}' is not a valid strftime layout",
                self.timestamp_format
            )));
        }

        if let Some(tz) = &self.timestamp_timezone {
            if tz.parse::<chrono_tz::Tz>().is_err() {
                return Err(ConfigError::Message(format!(
                    "timestamp_timezone '{}' is not a known timezone",
                    tz
                )));
            }
        }

        if self.timestamp_font_size <= 0.0 {
            return Err(ConfigError::Message(
                "timestamp_font_size must be greater than 0".to_string(),
            ));
        }

        if self.device_poll_interval.as_duration().is_zero() {
            return Err(ConfigError::Message(
                "device_poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.picamera.image_types.is_empty() {
            return Err(ConfigError::Message(
                "picamera.image_types must list at least one format".to_string(),
            ));
        }

        for (name, camera) in &self.gphoto {
            if camera.serial_number.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "gphoto.{}.serial_number must be set",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Create every camera's output directory (idempotent)
    pub fn create_output_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.picamera.output_dir)?;
        for camera in self.gphoto.values() {
            std::fs::create_dir_all(&camera.output_dir)?;
        }
        Ok(())
    }
}

impl Default for EyepiConfig {
    fn default() -> Self {
        Self {
            timestamp_format: default_timestamp_format(),
            timestamp_timezone: None,
            timestamp_font_path: default_timestamp_font_path(),
            timestamp_font_size: default_timestamp_font_size(),
            base_dir: default_base_dir(),
            device_poll_interval: default_device_poll_interval(),
            metrics_socket: default_metrics_socket(),
            picamera: PiCameraConfig::default(),
            gphoto: BTreeMap::new(),
        }
    }
}

impl Default for PiCameraConfig {
    fn default() -> Self {
        Self {
            enable: default_enable(),
            interval: default_picamera_interval(),
            filename_prefix: String::new(),
            output_dir: String::new(),
            image_types: default_image_types(),
        }
    }
}

fn clamp_interval(name: &str, interval: Interval) -> Interval {
    if interval.as_duration() <= MIN_INTERVAL {
        warn!(
            "Camera {} interval {} is too short, using {}",
            name,
            interval,
            format_duration(DEFAULT_INTERVAL)
        );
        Interval(DEFAULT_INTERVAL)
    } else {
        interval
    }
}

/// Keys of the `[gphoto.*]` tables exactly as written
pub fn gphoto_camera_names(contents: &str) -> Result<Vec<String>, toml::de::Error> {
    let table: toml::Table = toml::from_str(contents)?;
    Ok(match table.get("gphoto") {
        Some(toml::Value::Table(cameras)) => cameras.keys().cloned().collect(),
        _ => Vec::new(),
    })
}

/// Host name used to derive default filename prefixes
#[cfg(unix)]
pub fn hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: the buffer is valid for writes of buf.len() bytes.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        warn!(
            "gethostname failed: {}, using 'localhost'",
            std::io::Error::last_os_error()
        );
        return "localhost".to_string();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(not(unix))]
pub fn hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".to_string())
}

// Default value functions
fn default_timestamp_format() -> String {
    "%Y_%m_%d_%H_%M_%S".to_string()
}
fn default_timestamp_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_timestamp_font_size() -> f32 {
    150.0
}
fn default_base_dir() -> String {
    "/var/lib/eyepi".to_string()
}
fn default_device_poll_interval() -> Interval {
    Interval(Duration::from_secs(5))
}
fn default_metrics_socket() -> String {
    crate::metrics::DEFAULT_TELEGRAF_SOCKET.to_string()
}

fn default_enable() -> bool {
    true
}
fn default_picamera_interval() -> Interval {
    Interval(Duration::from_secs(5 * 60))
}
fn default_gphoto_interval() -> Interval {
    Interval(DEFAULT_INTERVAL)
}
fn default_image_types() -> Vec<ImageType> {
    vec![ImageType::Jpg, ImageType::Tiff]
}
