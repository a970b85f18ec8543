//! `mcphub` binary - parses configuration and runs the web server.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mcphub_axum::{ServerConfig, start_server};
use mcphub_core::paths::data_root;
use mcphub_store::StoreOptions;

/// Manage local MCP tool servers over HTTP.
#[derive(Debug, Parser)]
#[command(name = "mcphub", version, about)]
struct Args {
    /// Port for the HTTP server
    #[arg(long, env = "MCPHUB_PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "MCPHUB_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Directory holding config.json, status.json and backups
    /// [default: platform data directory]
    #[arg(long, env = "MCPHUB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Seconds between backups
    #[arg(
        long,
        env = "MCPHUB_BACKUP_INTERVAL_SECS",
        default_value_t = 3600,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    backup_interval_secs: u64,

    /// Backups kept per document
    #[arg(long, env = "MCPHUB_MAX_BACKUPS", default_value_t = 10)]
    max_backups: usize,

    /// Seconds a tool server may take to spawn and complete its handshake
    #[arg(
        long,
        env = "MCPHUB_HANDSHAKE_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    handshake_timeout_secs: u64,

    /// Origin allowed by CORS (repeatable; all origins when absent)
    #[arg(long = "allowed-origin", env = "MCPHUB_ALLOWED_ORIGINS", value_delimiter = ',')]
    allowed_origins: Vec<String>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let data_dir = match self.data_dir {
            Some(dir) => dir,
            None => data_root()?,
        };

        let store = StoreOptions::new(data_dir)
            .with_backup_interval(Duration::from_secs(self.backup_interval_secs))
            .with_max_backups(self.max_backups);

        Ok(
            ServerConfig::new(SocketAddr::new(self.host, self.port), store)
                .with_handshake_timeout(Duration::from_secs(self.handshake_timeout_secs))
                .with_allowed_origins(self.allowed_origins),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Args::parse().into_config()?;
    start_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use mcphub_axum::CorsConfig;

    #[test]
    fn test_cli_parser_builds() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_explicit_args() {
        let args = Args::parse_from([
            "mcphub",
            "--port",
            "8080",
            "--host",
            "0.0.0.0",
            "--data-dir",
            "/tmp/mcphub",
            "--max-backups",
            "3",
            "--allowed-origin",
            "http://localhost:5173",
        ]);
        let config = args.into_config().unwrap();

        assert_eq!(config.addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.store.data_dir, PathBuf::from("/tmp/mcphub"));
        assert_eq!(config.store.max_backups, 3);
        assert_eq!(
            config.cors,
            CorsConfig::AllowOrigins(vec!["http://localhost:5173".to_string()])
        );
    }

    #[test]
    fn test_zero_backup_interval_rejected() {
        assert!(Args::try_parse_from(["mcphub", "--backup-interval-secs", "0"]).is_err());
    }
}
