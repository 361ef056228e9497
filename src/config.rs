use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::archive::Pacing;

/// Upper bound for a single chunk; larger values only waste memory per request.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub index_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiverConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        // Mirror defaults from config/default.toml
        Self {
            program: "zip".to_string(),
            args: vec!["-r".to_string(), "-".to_string(), ".".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    pub root: String,
    pub chunk_size: usize,
    pub delay_secs: f64,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub archiver: ArchiverConfig,
}

impl ArchiveConfig {
    pub fn root_dir(&self) -> PathBuf {
        PathBuf::from(&self.root)
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            chunk_size: self.chunk_size,
            delay: Duration::from_secs_f64(self.delay_secs),
        }
    }

    /// `None` when no per-request timeout is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub archive: ArchiveConfig,
    pub logging: LoggingConfig,
    pub security: Option<SecurityConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

/// Values given on the command line. They take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub root: Option<String>,
    pub chunk_size: Option<usize>,
    pub delay_secs: Option<f64>,
    pub logging: bool,
}

pub fn load() -> anyhow::Result<AppConfig> {
    load_with(&Overrides::default())
}

pub fn load_with(overrides: &Overrides) -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: zipstream.toml (in CWD)
        .add_source(::config::File::with_name("zipstream").required(false));

    if let Ok(custom_path) = std::env::var("ZIPSTREAM_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    if let Some(path) = overrides.config_file.as_deref() {
        builder = builder.add_source(::config::File::with_name(path).required(true));
    }
    builder = builder.add_source(::config::Environment::with_prefix("ZIPSTREAM").separator("__"));

    builder = builder
        .set_override_option("server.host", overrides.host.clone())?
        .set_override_option("server.port", overrides.port.map(i64::from))?
        .set_override_option("archive.root", overrides.root.clone())?
        .set_override_option("archive.chunk_size", overrides.chunk_size.map(|v| v as i64))?
        .set_override_option("archive.delay_secs", overrides.delay_secs)?;
    // The flag can only switch logging on; leaving it out keeps the configured value.
    if overrides.logging {
        builder = builder.set_override("logging.enabled", true)?;
    }

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Archive
    if cfg.archive.root.trim().is_empty() {
        return Err(anyhow::anyhow!("archive.root must not be empty"));
    }
    if cfg.archive.chunk_size == 0 || cfg.archive.chunk_size > MAX_CHUNK_SIZE {
        return Err(anyhow::anyhow!("archive.chunk_size must be in 1..={}", MAX_CHUNK_SIZE));
    }
    if !cfg.archive.delay_secs.is_finite() || cfg.archive.delay_secs < 0.0 {
        return Err(anyhow::anyhow!("archive.delay_secs must be a non-negative number"));
    }
    if let Err(e) = Duration::try_from_secs_f64(cfg.archive.delay_secs) {
        return Err(anyhow::anyhow!("archive.delay_secs {} is out of range: {}", cfg.archive.delay_secs, e));
    }
    if cfg.archive.archiver.program.trim().is_empty() {
        return Err(anyhow::anyhow!("archive.archiver.program must not be empty"));
    }

    Ok(())
}
