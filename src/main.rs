use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use ifc_viewer_backend::client::{AcquisitionClient, ProgressState, follow_until_terminal};
use ifc_viewer_backend::config::ViewerConfig;
use ifc_viewer_backend::services::worker::BackgroundWorker;
use ifc_viewer_backend::{AppState, create_app};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SERVER: &str = "http://localhost:3000";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP backend (default)
    Serve {
        /// Port for the API server
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
    },
    /// Download a remote IFC file through a running backend's proxy
    Fetch {
        /// Remote URL of the IFC file
        #[arg(short, long)]
        url: String,

        #[arg(short, long, default_value = DEFAULT_SERVER)]
        server: String,

        /// Where to write the acquired bytes
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Upload a local IFC file to a running backend and read it back
    Upload {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = DEFAULT_SERVER)]
        server: String,

        /// Where to write the acquired bytes
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ifc_viewer_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.command.unwrap_or(Command::Serve {
        port: 3000,
        host: IpAddr::from([127, 0, 0, 1]),
    }) {
        Command::Serve { port, host } => serve(SocketAddr::new(host, port)).await,
        Command::Fetch {
            url,
            server,
            output,
        } => {
            let client = AcquisitionClient::new(&server)?;
            let reporter = spawn_progress_reporter(client.subscribe());
            let result = client.fetch_by_url(&url).await;
            let _ = reporter.await;
            write_output(&output, result?).await
        }
        Command::Upload {
            file,
            server,
            output,
        } => {
            let client = AcquisitionClient::new(&server)?;
            let reporter = spawn_progress_reporter(client.subscribe());
            let result = client.upload_then_fetch(&file).await;
            let _ = reporter.await;
            write_output(&output, result?).await
        }
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    info!("🚀 Starting IFC Viewer backend...");

    let config = ViewerConfig::from_env();
    info!(
        "📁 Upload directory: {} (max {}MB), proxy timeout {}s, proxy cap {}MB",
        config.upload_dir.display(),
        config.max_file_size / 1024 / 1024,
        config.proxy_timeout_secs,
        config.proxy_max_bytes / 1024 / 1024
    );

    let state = AppState::from_config(config.clone())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if let Some(retention) = config.retention() {
        let worker = BackgroundWorker::new(
            state.storage.clone(),
            retention,
            config.sweep_interval(),
            shutdown_rx,
        );
        tokio::spawn(worker.run());
        info!("👷 Retention worker initialized.");
    } else {
        info!("♾️  Upload retention disabled, files are kept until removed manually");
    }

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    let _ = shutdown_tx.send(true);
    info!("🛑 Server shut down gracefully.");
    Ok(())
}

fn spawn_progress_reporter(
    rx: watch::Receiver<ProgressState>,
) -> tokio::task::JoinHandle<Option<ProgressState>> {
    tokio::spawn(follow_until_terminal(rx, |state| {
        info!(
            "⏳ [{:?}] {}% {}",
            state.phase,
            state.percent,
            state.message.as_deref().unwrap_or_default()
        );
    }))
}

async fn write_output(output: &Path, bytes: bytes::Bytes) -> anyhow::Result<()> {
    tokio::fs::write(output, &bytes).await?;
    info!("💾 Wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
