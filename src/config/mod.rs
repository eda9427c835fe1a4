use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the viewer backend
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Directory holding uploaded IFC files (default: "uploads")
    pub upload_dir: PathBuf,

    /// Maximum upload size in bytes (default: 512 MB)
    pub max_file_size: usize,

    /// Timeout for a single proxied fetch in seconds (default: 120)
    pub proxy_timeout_secs: u64,

    /// Maximum number of bytes relayed by the proxy (default: 1 GB)
    pub proxy_max_bytes: u64,

    /// Origins allowed on the upload and health routes
    pub allowed_origins: Vec<String>,

    /// Delete uploads older than this many hours. `None` keeps them forever.
    pub upload_retention_hours: Option<u64>,

    /// Interval between retention sweeps in seconds (default: 3600)
    pub sweep_interval_secs: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_file_size: 512 * 1024 * 1024, // 512 MB
            proxy_timeout_secs: 120,
            proxy_max_bytes: 1024 * 1024 * 1024, // 1 GB
            allowed_origins: vec![
                "http://localhost:4200".to_string(), // Angular dev server
                "http://localhost:3000".to_string(),
            ],
            upload_retention_hours: None,
            sweep_interval_secs: 3600,
        }
    }
}

impl ViewerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            proxy_timeout_secs: env::var("PROXY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.proxy_timeout_secs),

            proxy_max_bytes: env::var("PROXY_MAX_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.proxy_max_bytes),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),

            upload_retention_hours: env::var("UPLOAD_RETENTION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|hours| *hours > 0),

            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.sweep_interval_secs),
        }
    }

    /// Config for local development and tests: small limits, short proxy timeout
    pub fn development(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_file_size: 64 * 1024 * 1024,
            proxy_timeout_secs: 10,
            proxy_max_bytes: 64 * 1024 * 1024,
            ..Self::default()
        }
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }

    pub fn retention(&self) -> Option<Duration> {
        self.upload_retention_hours
            .map(|hours| Duration::from_secs(hours * 3600))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
