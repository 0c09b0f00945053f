//! Configuration module
//!
//! Pipeline limits, external tool locations, encoding parameters and blob
//! store settings, loaded from the environment (and `.env` when present).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const MAX_VIDEO_SIZE_MB: u64 = 50;
const MAX_PHOTO_SIZE_MB: u64 = 20;
const MAX_VIDEO_DURATION_SECS: u64 = 360;
const PROBE_WINDOW_KB: u64 = 300;
const PROBE_TIMEOUT_SECS: u64 = 30;
const TRANSCODE_TIMEOUT_SECS: u64 = 600;
const VIDEO_BITRATE_KBPS: u32 = 256;
const VIDEO_SIZE: u32 = 300;
const THUMBNAIL_SIZE: u32 = 200;
const PHOTO_MAX_DIMENSION: u32 = 1000;
const JPEG_QUALITY: u8 = 85;
const WEBP_QUALITY: f32 = 80.0;
const PROGRESS_MIN_STEP: f32 = 1.0;
const PROGRESS_MIN_INTERVAL_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

/// Locations of the external media tools.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaLimits {
    pub max_video_bytes: u64,
    pub max_photo_bytes: u64,
    pub max_duration_secs: u64,
    /// Leading bytes written to disk before the probe runs.
    pub probe_window_bytes: u64,
    pub probe_timeout: Duration,
    /// Deadline for joint completion of all producers.
    pub transcode_timeout: Duration,
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self {
            max_video_bytes: MAX_VIDEO_SIZE_MB * 1024 * 1024,
            max_photo_bytes: MAX_PHOTO_SIZE_MB * 1024 * 1024,
            max_duration_secs: MAX_VIDEO_DURATION_SECS,
            probe_window_bytes: PROBE_WINDOW_KB * 1024,
            probe_timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
            transcode_timeout: Duration::from_secs(TRANSCODE_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncodingConfig {
    pub video_bitrate_kbps: u32,
    /// Edge length of the square video renditions.
    pub video_size: u32,
    pub thumbnail_size: u32,
    pub photo_max_dimension: u32,
    pub jpeg_quality: u8,
    pub webp_quality: f32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            video_bitrate_kbps: VIDEO_BITRATE_KBPS,
            video_size: VIDEO_SIZE,
            thumbnail_size: THUMBNAIL_SIZE,
            photo_max_dimension: PHOTO_MAX_DIMENSION,
            jpeg_quality: JPEG_QUALITY,
            webp_quality: WEBP_QUALITY,
        }
    }
}

/// Throttle applied to outbound progress notifications.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    pub min_step: f32,
    pub min_interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            min_step: PROGRESS_MIN_STEP,
            min_interval: Duration::from_millis(PROGRESS_MIN_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: Option<PathBuf>,
    pub local_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub log_format: LogFormat,
    pub tools: ToolPaths,
    pub limits: MediaLimits,
    pub encoding: EncodingConfig,
    pub progress: ProgressConfig,
    /// Directory holding source files while a pipeline runs.
    pub temp_dir: PathBuf,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_format: LogFormat::default(),
            tools: ToolPaths::default(),
            limits: MediaLimits::default(),
            encoding: EncodingConfig::default(),
            progress: ProgressConfig::default(),
            temp_dir: env::temp_dir(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let log_format = match env::var("LOG_FORMAT") {
            Ok(value) => value.parse()?,
            Err(_) => LogFormat::default(),
        };

        let tools = ToolPaths {
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
        };

        let limits = MediaLimits {
            max_video_bytes: env::var("MAX_VIDEO_SIZE_MB")
                .unwrap_or_else(|_| MAX_VIDEO_SIZE_MB.to_string())
                .parse::<u64>()
                .unwrap_or(MAX_VIDEO_SIZE_MB)
                * 1024
                * 1024,
            max_photo_bytes: env::var("MAX_PHOTO_SIZE_MB")
                .unwrap_or_else(|_| MAX_PHOTO_SIZE_MB.to_string())
                .parse::<u64>()
                .unwrap_or(MAX_PHOTO_SIZE_MB)
                * 1024
                * 1024,
            max_duration_secs: env::var("MAX_VIDEO_DURATION_SECS")
                .unwrap_or_else(|_| MAX_VIDEO_DURATION_SECS.to_string())
                .parse()
                .unwrap_or(MAX_VIDEO_DURATION_SECS),
            probe_window_bytes: env::var("PROBE_WINDOW_KB")
                .unwrap_or_else(|_| PROBE_WINDOW_KB.to_string())
                .parse::<u64>()
                .unwrap_or(PROBE_WINDOW_KB)
                * 1024,
            probe_timeout: Duration::from_secs(
                env::var("PROBE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| PROBE_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(PROBE_TIMEOUT_SECS),
            ),
            transcode_timeout: Duration::from_secs(
                env::var("TRANSCODE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| TRANSCODE_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(TRANSCODE_TIMEOUT_SECS),
            ),
        };

        let encoding = EncodingConfig {
            video_bitrate_kbps: env::var("VIDEO_BITRATE_KBPS")
                .unwrap_or_else(|_| VIDEO_BITRATE_KBPS.to_string())
                .parse()
                .unwrap_or(VIDEO_BITRATE_KBPS),
            video_size: env::var("VIDEO_SIZE")
                .unwrap_or_else(|_| VIDEO_SIZE.to_string())
                .parse()
                .unwrap_or(VIDEO_SIZE),
            thumbnail_size: env::var("THUMBNAIL_SIZE")
                .unwrap_or_else(|_| THUMBNAIL_SIZE.to_string())
                .parse()
                .unwrap_or(THUMBNAIL_SIZE),
            photo_max_dimension: env::var("PHOTO_MAX_DIMENSION")
                .unwrap_or_else(|_| PHOTO_MAX_DIMENSION.to_string())
                .parse()
                .unwrap_or(PHOTO_MAX_DIMENSION),
            jpeg_quality: env::var("JPEG_QUALITY")
                .unwrap_or_else(|_| JPEG_QUALITY.to_string())
                .parse()
                .unwrap_or(JPEG_QUALITY),
            webp_quality: env::var("WEBP_QUALITY")
                .unwrap_or_else(|_| WEBP_QUALITY.to_string())
                .parse()
                .unwrap_or(WEBP_QUALITY),
        };

        let progress = ProgressConfig {
            min_step: env::var("PROGRESS_MIN_STEP")
                .unwrap_or_else(|_| PROGRESS_MIN_STEP.to_string())
                .parse()
                .unwrap_or(PROGRESS_MIN_STEP),
            min_interval: Duration::from_millis(
                env::var("PROGRESS_MIN_INTERVAL_MS")
                    .unwrap_or_else(|_| PROGRESS_MIN_INTERVAL_MS.to_string())
                    .parse()
                    .unwrap_or(PROGRESS_MIN_INTERVAL_MS),
            ),
        };

        let storage = StorageConfig {
            backend: match env::var("STORAGE_BACKEND") {
                Ok(value) => value.parse()?,
                Err(_) => StorageBackend::default(),
            },
            local_path: env::var("LOCAL_STORAGE_PATH").ok().map(PathBuf::from),
            local_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
        };

        let config = Config {
            environment,
            log_format,
            tools,
            limits,
            encoding,
            progress,
            temp_dir: env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
            storage,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.limits.max_video_bytes == 0 || self.limits.max_photo_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_VIDEO_SIZE_MB and MAX_PHOTO_SIZE_MB must be greater than zero"
            ));
        }

        if self.limits.max_duration_secs == 0 {
            return Err(anyhow::anyhow!(
                "MAX_VIDEO_DURATION_SECS must be greater than zero"
            ));
        }

        if self.limits.probe_window_bytes == 0 {
            return Err(anyhow::anyhow!("PROBE_WINDOW_KB must be greater than zero"));
        }

        if self.limits.transcode_timeout.is_zero() || self.limits.probe_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "PROBE_TIMEOUT_SECS and TRANSCODE_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.encoding.video_size == 0 || self.encoding.thumbnail_size == 0 {
            return Err(anyhow::anyhow!(
                "VIDEO_SIZE and THUMBNAIL_SIZE must be greater than zero"
            ));
        }

        if !(1..=100).contains(&self.encoding.jpeg_quality) {
            return Err(anyhow::anyhow!("JPEG_QUALITY must be between 1 and 100"));
        }

        if !(0.0..=100.0).contains(&self.encoding.webp_quality) {
            return Err(anyhow::anyhow!("WEBP_QUALITY must be between 0 and 100"));
        }

        match self.storage.backend {
            StorageBackend::Local => {
                if self.storage.local_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.storage.local_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "Memory storage backend cannot be used in production"
                    ));
                }
            }
        }

        Ok(())
    }
}
