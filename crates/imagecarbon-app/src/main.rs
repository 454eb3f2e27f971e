//! Image Carbon - image emissions for a whole site.
//!
//! The `imagecarbon` binary either runs the HTTP API server or works on a
//! single site from the command line:
//! - `serve`: HTTP API over the shared cache
//! - `collect`: collect a site (or reuse its cache) and print a report
//! - `refresh`: drop a site's cached collection

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use imagecarbon_app::{build_collector, render_report, CollectorSettings};
use imagecarbon_collect::{CloudinaryCredentials, PipelineConfig, DEFAULT_CONCURRENCY};
use imagecarbon_core::{MonthlyRequests, ReportConfig, ReportOptions};
use imagecarbon_server::{AppState, Server, ServerConfig, DEFAULT_PORT};
use imagecarbon_storage::{CacheConfig, DEFAULT_TTL_HOURS};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Image Carbon - how much CO2 a site's images cost
#[derive(Parser, Debug)]
#[command(name = "imagecarbon", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", env = "IMAGECARBON_LOG_LEVEL")]
    log_level: String,

    /// SQLite database file
    #[arg(long, global = true, env = "IMAGECARBON_DB")]
    db: Option<PathBuf>,

    /// Hours a collection stays fresh
    #[arg(long, global = true, default_value_t = DEFAULT_TTL_HOURS, env = "IMAGECARBON_CACHE_TTL_HOURS")]
    cache_ttl_hours: i64,

    /// Uploads in flight at once
    #[arg(long, global = true, default_value_t = DEFAULT_CONCURRENCY, env = "IMAGECARBON_CONCURRENCY")]
    concurrency: usize,

    /// Seconds allowed for image discovery
    #[arg(long, global = true, default_value_t = 30, env = "IMAGECARBON_DISCOVERY_TIMEOUT")]
    discovery_timeout: u64,

    #[arg(long, global = true, env = "CLOUDINARY_CLOUD_NAME", hide_env_values = true)]
    cloudinary_cloud_name: Option<String>,

    #[arg(long, global = true, env = "CLOUDINARY_API_KEY", hide_env_values = true)]
    cloudinary_api_key: Option<String>,

    #[arg(long, global = true, env = "CLOUDINARY_API_SECRET", hide_env_values = true)]
    cloudinary_api_secret: Option<String>,

    /// Hosted scraping API key (pages are fetched directly without one)
    #[arg(long, global = true, env = "SCRAPINGBEE_API_KEY", hide_env_values = true)]
    scrapingbee_api_key: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server
    Serve {
        #[arg(long, default_value = "127.0.0.1", env = "IMAGECARBON_HOST")]
        host: String,

        #[arg(long, default_value_t = DEFAULT_PORT, env = "IMAGECARBON_PORT")]
        port: u16,
    },
    /// Collect a site and print its report
    Collect {
        url: String,

        /// Ignore any cached result
        #[arg(long)]
        refresh: bool,

        /// List every image instead of the top few
        #[arg(long)]
        all: bool,

        /// Monthly page views for the yearly estimate
        #[arg(long, default_value_t = MonthlyRequests::INITIAL)]
        monthly_requests: u64,
    },
    /// Drop a site's cached collection
    Refresh { url: String },
}

impl Args {
    fn credentials(&self) -> Option<CloudinaryCredentials> {
        Some(CloudinaryCredentials {
            cloud_name: self.cloudinary_cloud_name.clone()?,
            api_key: self.cloudinary_api_key.clone()?,
            api_secret: self.cloudinary_api_secret.clone()?,
        })
    }

    fn settings(&self) -> CollectorSettings {
        let pipeline = PipelineConfig::default()
            .with_concurrency(self.concurrency)
            .with_discovery_timeout(Duration::from_secs(self.discovery_timeout));
        let cache =
            CacheConfig::default().with_ttl(chrono::Duration::hours(self.cache_ttl_hours));

        CollectorSettings {
            db_path: self.db.clone(),
            cloudinary: self.credentials(),
            scrapingbee_api_key: self.scrapingbee_api_key.clone(),
            pipeline,
            cache,
        }
    }
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "imagecarbon", "imagecarbon").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging with file rotation.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("imagecarbon={},warn", log_level)));

    if let Some(log_dir) = logs_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("imagecarbon")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                // Reports go to stdout, so console logs go to stderr
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::debug!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

async fn serve(settings: &CollectorSettings, host: String, port: u16) -> anyhow::Result<()> {
    let collector = build_collector(settings)?;
    let config = ServerConfig::default().with_host(host).with_port(port);

    tracing::info!("Starting API server on {}:{}", config.host, config.port);
    let server = Server::with_state(config, AppState::new(collector))?;
    server.run().await?;
    Ok(())
}

async fn collect(
    settings: &CollectorSettings,
    url: &str,
    refresh: bool,
    options: ReportOptions,
) -> anyhow::Result<()> {
    let collector = build_collector(settings)?;
    let collection = collector.run(url, refresh).await?;

    if collection.failed > 0 {
        tracing::warn!(
            site_url = %collection.site_url,
            failed = collection.failed,
            "Some images could not be measured"
        );
    }

    let report = collection.report(options, &ReportConfig::default());
    print!("{}", render_report(&report));
    Ok(())
}

fn refresh(settings: &CollectorSettings, url: &str) -> anyhow::Result<()> {
    let db = imagecarbon_app::setup::open_database(settings.db_path.as_ref())?;
    let cache = imagecarbon_storage::SiteCache::new(db, settings.cache);
    cache.invalidate(url)?;

    println!("Cleared cached collection for {}", imagecarbon_core::normalize_site(url));
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the guard alive for the whole run to flush file logs
    let _log_guard = init_logging(&args);

    tracing::debug!("Image Carbon v{}", env!("CARGO_PKG_VERSION"));

    let settings = args.settings();

    match args.command {
        Command::Serve { host, port } => serve(&settings, host, port).await,
        Command::Collect {
            url,
            refresh,
            all,
            monthly_requests,
        } => {
            let options = ReportOptions {
                show_all: all,
                monthly_requests: MonthlyRequests::new(monthly_requests),
            };
            collect(&settings, &url, refresh, options).await
        }
        Command::Refresh { url } => refresh(&settings, &url),
    }
}
