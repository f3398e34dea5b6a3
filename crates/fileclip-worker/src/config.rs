use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use fileclip_core::ClipConfig;
use fileclip_db::DbConfig;

#[derive(Debug, Parser)]
#[command(name = "fileclip-worker", about = "Processes queued file attachments")]
pub struct WorkerConfig {
    /// SQLite database path (defaults to the XDG data directory)
    #[arg(long, env = "FILECLIP_DB_PATH")]
    pub db_path: Option<String>,

    /// Poll interval in seconds
    #[arg(long, default_value = "5")]
    pub poll_interval: u64,

    /// Requeue a running job nobody has touched for this many seconds
    #[arg(long, env = "FILECLIP_STALE_AFTER", default_value = "900")]
    pub stale_after: u64,

    /// Claims per job before an abandoned job is failed instead of requeued
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(i64).range(1..))]
    pub max_attempts: i64,

    /// Port for the health check endpoint
    #[arg(long, default_value = "3721")]
    pub health_port: u16,

    /// Timeout for metadata and download requests (seconds)
    #[arg(long, env = "FILECLIP_HTTP_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Copy attachment bytes into the object store configured by
    /// FILECLIP_S3_* / FILECLIP_DATA_DIR
    #[arg(long)]
    pub mirror: bool,

    /// Record types to process, as TYPE=ATTACHMENT (repeatable)
    #[arg(
        long = "clip",
        env = "FILECLIP_CLIPS",
        value_delimiter = ',',
        default_value = "Image=attachment"
    )]
    pub clips: Vec<ClipArg>,
}

impl WorkerConfig {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            sqlite_path: self.db_path.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }
}

/// One `TYPE=ATTACHMENT` registration from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipArg {
    pub type_name: String,
    pub attachment_name: String,
}

impl ClipArg {
    pub fn to_config(&self) -> ClipConfig {
        ClipConfig::new(&self.attachment_name)
    }
}

impl FromStr for ClipArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_name, attachment_name) = s
            .split_once('=')
            .ok_or_else(|| format!("expected TYPE=ATTACHMENT, got '{s}'"))?;
        let (type_name, attachment_name) = (type_name.trim(), attachment_name.trim());
        if type_name.is_empty() || attachment_name.is_empty() {
            return Err(format!("expected TYPE=ATTACHMENT, got '{s}'"));
        }
        Ok(Self {
            type_name: type_name.to_string(),
            attachment_name: attachment_name.to_string(),
        })
    }
}
