//! certdesk: console launcher for the certificate desk
//!
//! Reads configuration from `CERTDESK_*` environment variables (and an
//! optional `.env`), lets flags override the store paths, then runs an
//! interactive console.

mod console;
mod logger;

use std::path::PathBuf;

use certdesk_core::{CertDesk, Config};
use clap::Parser;
use tracing::info;

use console::Console;

#[derive(Parser)]
#[command(name = "certdesk")]
#[command(about = "Install client certificates into employees' crypto stores")]
struct Cli {
    /// Primary client store
    #[arg(long, env = "CERTDESK_PRIMARY_STORE")]
    primary: Option<PathBuf>,

    /// Archive client store
    #[arg(long, env = "CERTDESK_ARCHIVE_STORE")]
    archive: Option<PathBuf>,

    /// Employee spreadsheet
    #[arg(long, env = "CERTDESK_EMPLOYEE_SOURCE")]
    employees: Option<PathBuf>,

    /// Certificates older than this many days are expired
    #[arg(long, env = "CERTDESK_EXPIRY_DAYS")]
    expiry_days: Option<u32>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(primary) = &self.primary {
            config.primary_store = primary.clone();
        }
        if let Some(archive) = &self.archive {
            config.archive_store = archive.clone();
        }
        if let Some(employees) = &self.employees {
            config.employee_source = employees.clone();
        }
        if let Some(days) = self.expiry_days {
            config = config.with_expiry_days(days);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.apply(Config::from_env());

    logger::init_logger(Some(&cli.log_level), config.log_dir.as_deref());

    info!(
        primary = %config.primary_store.display(),
        archive = %config.archive_store.display(),
        employees = %config.employee_source.display(),
        expiry_days = config.expiry_days,
        "Starting certdesk"
    );

    let desk = CertDesk::from_config(&config);
    Console::new(desk).run().await?;

    info!("certdesk stopped");
    Ok(())
}
