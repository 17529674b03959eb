//! mcpgate server.

use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::net::SocketAddr;
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use mcpgate::{auth, config::Config, create_app_with_config, session::spawn_reaper, state::AppState};

/// mcpgate - MCP gateway for conversational workflow services
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "MCPGATE_PORT")]
    port: Option<u16>,

    /// Base data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Root directory of the filesystem session store
    #[arg(long)]
    session_path: Option<PathBuf>,

    /// PostgreSQL URL; selects the PostgreSQL session store
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a bcrypt hash for `auth.password_hash` (reads stdin if no password is given)
    HashPassword { password: Option<String> },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(Command::HashPassword { password }) = args.command {
        let password = match password {
            Some(p) => p,
            None => read_password_line()?,
        };
        println!("{}", auth::hash_password(&password)?);
        return Ok(());
    }

    let config = Config::from_figment(args.port, args.data_dir, args.session_path, args.database_url)?;

    // Local offset must be read before any threads are spawned
    let _log_guard = init_logging(&config)?;
    info!("Configuration loaded ({} service(s))", config.services.len());
    for service_id in config.locked_services() {
        warn!(
            "Service '{}' requires auth but no credentials are configured; all requests will be rejected",
            service_id
        );
    }

    run(config)
}

fn read_password_line() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Console logging plus an optional daily-rolling log file.
///
/// The returned guard flushes the file writer on drop.
fn init_logging(config: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = || match &config.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let timer = OffsetTime::local_rfc_3339()
        .unwrap_or_else(|_| OffsetTime::new(time::UtcOffset::UTC, Rfc3339));

    let console = fmt::layer()
        .with_target(false)
        .with_timer(timer.clone())
        .compact()
        .with_filter(filter());

    let (file, guard) = match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "mcpgate.log".to_string());
            std::fs::create_dir_all(&dir)?;

            let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(timer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn run(config: Config) -> anyhow::Result<()> {
    info!("Starting mcpgate server...");

    let state = AppState::from_config(&config).await?;

    let _reaper = spawn_reaper(
        state.sessions().clone(),
        config.service_ids(),
        config.idle_timeout,
        config.reap_interval,
    );

    let app = create_app_with_config(state, config.cors_allowed_origins.clone());

    // Bind to 0.0.0.0 to be accessible from all interfaces (Docker, network, etc.)
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down gracefully...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down");
    Ok(())
}
