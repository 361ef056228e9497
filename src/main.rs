use std::net::SocketAddr;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zipstream::{app, config, state::AppState};

/// Streams ZIP archives of photo directories over HTTP.
#[derive(Parser, Debug)]
#[command(name = "zipstream")]
#[command(version, about, long_about = None)]
struct Args {
    /// Turn on debug logging
    #[arg(short, long, env = "ZIPSTREAM_LOGGING")]
    logging: bool,

    /// Delay between archive chunks, in seconds
    #[arg(short, long, env = "ZIPSTREAM_DELAY")]
    delay: Option<f64>,

    /// Directory whose sub-directories can be downloaded
    #[arg(short, long, env = "ZIPSTREAM_PATH")]
    path: Option<String>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Bytes read from the archiver per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Additional configuration file
    #[arg(short, long)]
    config: Option<String>,
}

impl Args {
    fn overrides(&self) -> config::Overrides {
        config::Overrides {
            config_file: self.config.clone(),
            host: self.host.clone(),
            port: self.port,
            root: self.path.clone(),
            chunk_size: self.chunk_size,
            delay_secs: self.delay,
            logging: self.logging,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration (embedded defaults -> zipstream.toml -> env/.env -> flags)
    let app_cfg = config::load_with(&args.overrides())?;

    // Logging (stdout + optional daily file rotation)
    let default_filter = if app_cfg.logging.enabled { "zipstream=debug,tower_http=debug" } else { "warn" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let (file_layer, file_guard) = match app_cfg.logging.directory.as_deref() {
        Some(dir) if app_cfg.logging.enabled => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = tracing_appender::rolling::daily(dir, "zipstream.log");
            let (file_nb, guard) = tracing_appender::non_blocking(file_appender);
            (Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb)), Some(guard))
        }
        _ => (None, None),
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(file_layer)
        .init();
    // Keep guards alive so the non-blocking writers flush on exit
    let _log_guards = (stdout_guard, file_guard);

    let state = AppState::new(app_cfg.clone());
    if !state.root.is_dir() {
        tracing::warn!("Archive root {} is not a directory; every download will fail", state.root.display());
    }
    info!(
        root = %state.root.display(),
        chunk_size = state.pacing.chunk_size,
        delay = ?state.pacing.delay,
        "Archive pacing configured"
    );

    let app = app::build_router(state);
    // CORS: permissive in debug builds for local UI development
    let app = if cfg!(debug_assertions) { app.layer(CorsLayer::permissive()) } else { app };

    let port: u16 = app_cfg.server.port;
    let host: String = app_cfg.server.host.clone();
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", host, port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("zipstream listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
