//! Application configuration.
//!
//! Built once at process start and shared read-only with request handlers.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NevisError, NevisResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener and upload settings.
    pub server: ServerConfig,

    /// External engine invocation settings.
    pub engine: EngineConfig,

    /// Waveform overlay look.
    pub visualizer: VisualizerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: IpAddr,

    /// Port to bind.
    pub port: u16,

    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,

    /// Directory for per-request temp files. `None` uses the system temp dir.
    pub temp_dir: Option<PathBuf>,
}

/// External engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable, resolved through `PATH` when relative.
    pub binary: PathBuf,

    /// Video encoder.
    pub video_codec: String,

    /// Encoder speed preset.
    pub video_preset: String,

    /// Audio encoder.
    pub audio_codec: String,

    /// Kill the engine after this many seconds. Unset means wait forever.
    pub timeout_secs: Option<u64>,
}

/// Waveform drawing mode of the engine's `showwaves` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveMode {
    Point,
    Line,
    P2p,
    Cline,
}

impl WaveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::P2p => "p2p",
            Self::Cline => "cline",
        }
    }
}

/// Waveform overlay drawn along the bottom edge of every render.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Canvas width in pixels.
    pub width: u32,

    /// Canvas height in pixels.
    pub height: u32,

    pub mode: WaveMode,

    /// Engine colour name or `0xRRGGBB[AA]`.
    pub color: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "nevis=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
            max_upload_bytes: 512 * 1024 * 1024,
            temp_dir: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            video_codec: "libx264".to_string(),
            video_preset: "fast".to_string(),
            audio_codec: "aac".to_string(),
            timeout_secs: None,
        }
    }
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 200,
            mode: WaveMode::Cline,
            color: "white".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Resolved temp directory for render jobs.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl VisualizerConfig {
    /// The colour is spliced into the filter graph text, so only plain
    /// colour tokens are allowed.
    pub fn validate(&self) -> NevisResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(NevisError::config(format!(
                "Visualizer size {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        let plain = |c: char| c.is_ascii_alphanumeric() || matches!(c, '#' | '@' | '.' | '_');
        if self.color.is_empty() || !self.color.chars().all(plain) {
            return Err(NevisError::config(format!(
                "Invalid visualizer color {:?}",
                self.color
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load config from an optional JSON file, then apply environment overrides.
    ///
    /// A missing or unreadable file falls back to defaults with a warning.
    /// Malformed environment values are an error.
    pub fn load(path: Option<&Path>) -> NevisResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path),
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.visualizer.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config at {:?}: {}", path, e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, e);
            }
        }
        Self::default()
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> NevisResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_env("PORT", &port)?;
        }
        if let Some(host) = lookup("NEVIS_HOST") {
            self.server.host = parse_env("NEVIS_HOST", &host)?;
        }
        if let Some(dir) = lookup("NEVIS_TEMP_DIR").filter(|v| !v.is_empty()) {
            self.server.temp_dir = Some(PathBuf::from(dir));
        }
        if let Some(binary) = lookup("NEVIS_FFMPEG").filter(|v| !v.is_empty()) {
            self.engine.binary = PathBuf::from(binary);
        }
        if let Some(secs) = lookup("NEVIS_ENGINE_TIMEOUT_SECS") {
            self.engine.timeout_secs = Some(parse_env("NEVIS_ENGINE_TIMEOUT_SECS", &secs)?);
        }
        if let Some(level) = lookup("NEVIS_LOG").filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> NevisResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| NevisError::config(format!("Invalid {key}={value:?}: {e}")))
}
