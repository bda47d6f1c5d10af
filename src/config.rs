use clap::{ArgAction, Args, Parser};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

/// Incident report server configuration
#[derive(Parser, Debug, Clone)]
#[command(
    name = "incident-report",
    version,
    about = "HTTP server turning incident photos into PDF safety reports"
)]
pub struct Config {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease verbosity (-q, -qq, -qqq)
    #[arg(short = 'q', action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Interface to listen on
    #[arg(long, env = "INCIDENT_REPORT_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Staging directory for uploaded images (flat, keyed by filename)
    #[arg(long, env = "INCIDENT_REPORT_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Logo placed at the top of every report, skipped when the file is absent
    #[arg(long, env = "INCIDENT_REPORT_LOGO", default_value = "static/logo.jpg")]
    pub logo_path: PathBuf,

    /// Log file path (logs are written to stdout + this file)
    #[arg(long, env = "INCIDENT_REPORT_LOG_FILE", default_value = "incident-report.logs")]
    pub log_file: PathBuf,

    /// API key for the image description service
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Model asked to describe the images
    #[arg(long, env = "INCIDENT_REPORT_MODEL", default_value = "gemini-1.5-flash")]
    pub description_model: String,

    /// Base URL of the description API
    #[arg(
        long,
        env = "INCIDENT_REPORT_API_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub description_api_url: String,

    /// Timeout for a single description call, in seconds
    #[arg(long, env = "INCIDENT_REPORT_TIMEOUT_SECS", default_value_t = 120)]
    pub description_timeout_secs: u64,

    /// Maximum size of an upload request body, in MiB
    #[arg(long, env = "INCIDENT_REPORT_MAX_UPLOAD_MB", default_value_t = 32)]
    pub max_upload_mb: usize,

    #[command(flatten)]
    pub report: ReportDefaults,
}

const DEFAULT_DATE_TIME: &str = "Insert date and time";
const DEFAULT_LOCATION: &str = "Rainy River Underground Mine Level 200 Drift 1";
const DEFAULT_INCIDENT_TYPE: &str = "Vehicle to Vehicle";
const DEFAULT_EQUIPMENT: &str = "AD30 Dump Truck";
const DEFAULT_DRIVE_MODE: &str = "Drive";

/// Static fields printed in every report. They are not derived from the images.
#[derive(Args, Debug, Clone)]
pub struct ReportDefaults {
    /// Value of the "Date/Time" row
    #[arg(long, env = "INCIDENT_REPORT_DATE_TIME", default_value = DEFAULT_DATE_TIME)]
    pub date_time: String,

    /// Value of the "Location" row
    #[arg(
        long,
        env = "INCIDENT_REPORT_LOCATION",
        default_value = DEFAULT_LOCATION
    )]
    pub location: String,

    /// Value of the "Incident Type" row
    #[arg(long, env = "INCIDENT_REPORT_INCIDENT_TYPE", default_value = DEFAULT_INCIDENT_TYPE)]
    pub incident_type: String,

    /// Value of the "List of Equipment" row
    #[arg(long, env = "INCIDENT_REPORT_EQUIPMENT", default_value = DEFAULT_EQUIPMENT)]
    pub equipment: String,

    /// Value of the "Drive Mode" row
    #[arg(long, env = "INCIDENT_REPORT_DRIVE_MODE", default_value = DEFAULT_DRIVE_MODE)]
    pub drive_mode: String,
}

impl Default for ReportDefaults {
    fn default() -> Self {
        Self {
            date_time: DEFAULT_DATE_TIME.into(),
            location: DEFAULT_LOCATION.into(),
            incident_type: DEFAULT_INCIDENT_TYPE.into(),
            equipment: DEFAULT_EQUIPMENT.into(),
            drive_mode: DEFAULT_DRIVE_MODE.into(),
        }
    }
}

impl Config {
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    #[must_use]
    pub const fn description_timeout(&self) -> Duration {
        Duration::from_secs(self.description_timeout_secs)
    }

    #[must_use]
    pub const fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }

    #[must_use]
    pub fn verbosity_delta(&self) -> i16 {
        i16::from(self.verbose) - i16::from(self.quiet)
    }

    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity_delta() {
            d if d <= -2 => "error",
            -1 => "warn",
            0 => "info,incident_report=info,axum=info,tower_http=info",
            1 => "debug,incident_report=debug,axum=info,tower_http=info,reqwest=info",
            2 => "trace,incident_report=trace,axum=debug,tower_http=trace,hyper=info",
            _ => "trace,incident_report=trace,axum=trace,tower_http=trace,hyper=debug",
        }
    }
}
