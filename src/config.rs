//! Configuration management for wiwb.
//!
//! This module handles the layered configuration system with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::AUTH_URL;
use crate::crs::Crs;
use crate::error::{Result, WiwbError};
use crate::extent::Bounds;
use crate::reconcile::ReconcilerConfig;
use crate::request::{DataFormat, IntervalType};

/// Command-line arguments for wiwb
#[derive(Parser, Debug)]
#[command(name = "wiwb")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to JSON configuration file
    #[arg(short, long, env = "WIWB_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "WIWB_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Client id for the token endpoint
    #[arg(long, env = "WIWB_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// Client secret for the token endpoint
    #[arg(long, env = "WIWB_CLIENT_SECRET", global = true, hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Base URL of the WIWB API
    #[arg(long, env = "WIWB_BASE_URL", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a grid file
    Download {
        #[command(flatten)]
        grid: GridArgs,

        /// Directory to write the file to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Keep zip payloads packed
        #[arg(long)]
        no_unzip: bool,
    },

    /// Sample a grid with geometries and print or write the table as CSV
    Sample {
        #[command(flatten)]
        grid: GridArgs,

        /// Comma separated statistics (mean, min, max, sum, count, median, std)
        #[arg(long, default_value = "mean")]
        stats: String,

        /// CSV file to write; stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List variable metadata
    Variables {
        /// Data source codes
        #[arg(long = "data-source", required = true)]
        data_sources: Vec<String>,

        /// Variable codes
        #[arg(long = "variable")]
        variables: Vec<String>,
    },

    /// Serve the HTTP API
    Serve {
        /// Host address to bind to
        #[arg(short = 'H', long, env = "WIWB_HOST")]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "WIWB_PORT")]
        port: Option<u16>,
    },
}

/// Parameters of one grid request
#[derive(clap::Args, Debug, Clone)]
pub struct GridArgs {
    /// Data source code, e.g. Knmi.International.Radar.Composite.Final.Reanalysis
    #[arg(long = "data-source")]
    pub data_source_code: String,

    /// Variable code, e.g. P
    #[arg(long = "variable")]
    pub variable_code: String,

    /// Start, as YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS
    #[arg(long, value_parser = parse_datetime)]
    pub start: NaiveDateTime,

    /// End, as YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS
    #[arg(long, value_parser = parse_datetime)]
    pub end: NaiveDateTime,

    /// Bounds as xll,yll,xur,yur
    #[arg(long, value_parser = parse_bounds)]
    pub bounds: Option<Bounds>,

    /// GeoJSON file with points and polygons
    #[arg(long)]
    pub geometries: Option<PathBuf>,

    /// CRS as EPSG code
    #[arg(long, value_parser = parse_crs)]
    pub crs: Option<Crs>,

    /// Output format
    #[arg(long, value_parser = parse_format, default_value = "geotiff")]
    pub format: DataFormat,

    /// Interval unit (Days, Hours, Minutes)
    #[arg(long, value_parser = parse_interval_type, default_value = "Hours")]
    pub interval_type: IntervalType,

    /// Interval length
    #[arg(long, default_value = "1")]
    pub interval_value: u32,
}

/// Parse `2015-01-01` or `2015-01-01T06:00:00`
pub fn parse_datetime(s: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("Invalid date: {}", s))
}

fn parse_bounds(s: &str) -> std::result::Result<Bounds, String> {
    s.parse().map_err(|e: WiwbError| e.to_string())
}

fn parse_crs(s: &str) -> std::result::Result<Crs, String> {
    s.parse().map_err(|e: WiwbError| e.to_string())
}

fn parse_format(s: &str) -> std::result::Result<DataFormat, String> {
    s.parse().map_err(|e: WiwbError| e.to_string())
}

fn parse_interval_type(s: &str) -> std::result::Result<IntervalType, String> {
    s.parse().map_err(|e: WiwbError| e.to_string())
}

/// Credentials and token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,

    #[serde(default = "default_token_url")]
    pub token_url: String,
}

/// Grid service endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Transport timeout per request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Spatial defaults for request reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialConfig {
    /// EPSG code used when neither the request nor its geometries name a CRS
    #[serde(default = "default_crs")]
    pub default_crs: Option<u32>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub spatial: SpatialConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<(Self, Command)> {
        Self::from_args(Args::parse())
    }

    /// Layer parsed arguments (CLI and environment) over the config file and defaults
    pub fn from_args(args: Args) -> Result<(Self, Command)> {
        let mut config = match &args.config {
            Some(path) => Self::load_from_file(path)?,
            None => Config::default(),
        };

        if let Some(level) = args.log_level {
            config.log_level = level;
        }
        if args.client_id.is_some() {
            config.auth.client_id = args.client_id;
        }
        if args.client_secret.is_some() {
            config.auth.client_secret = args.client_secret;
        }
        if let Some(base_url) = args.base_url {
            config.api.base_url = base_url;
        }
        if let Command::Serve { host, port } = &args.command {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }

        Ok((config, args.command))
    }

    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WiwbError::configuration(format!(
                "Cannot read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Reconciler settings derived from the spatial section
    pub fn reconciler(&self) -> Result<ReconcilerConfig> {
        Ok(ReconcilerConfig {
            default_crs: self.spatial.default_crs.map(Crs::from_epsg).transpose()?,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(WiwbError::configuration("Server host cannot be empty"));
        }

        // Validate port (0 is not a valid port for users)
        if self.server.port == 0 {
            return Err(WiwbError::configuration("Server port cannot be 0"));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(WiwbError::configuration(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.log_level
                )));
            }
        }

        if self.api.base_url.is_empty() || self.auth.token_url.is_empty() {
            return Err(WiwbError::configuration(
                "API base URL and token URL cannot be empty",
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(WiwbError::configuration("API timeout cannot be 0"));
        }

        if let Some(code) = self.spatial.default_crs {
            Crs::from_epsg(code).map_err(|_| {
                WiwbError::configuration(format!("Unsupported default CRS: EPSG:{}", code))
            })?;
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            api: ApiConfig::default(),
            spatial: SpatialConfig::default(),
            server: ServerConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: default_token_url(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            default_crs: default_crs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// Default value functions for serde
fn default_token_url() -> String {
    AUTH_URL.to_string()
}

fn default_base_url() -> String {
    "https://wiwb.hydronet.com/api".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_crs() -> Option<u32> {
    Some(Crs::RD_NEW.epsg())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}
