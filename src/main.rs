//! Solana Bridge Saver
//!
//! Watches the bridge program on Solana, turns every deposit instruction into
//! a cross-chain transfer request, and re-verifies submitted operations on
//! demand.
//!
//! # Modes
//!
//! - `service` (default): live listener, catchup and HTTP server
//! - `saver`: live listener and catchup
//! - `saver-catchup`: one catchup pass, then exit
//! - `voter`: HTTP server only (revote, health, metrics)

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use eyre::eyre;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info};

use sol_saver::broadcaster::{Broadcaster, HttpBroadcaster};
use sol_saver::catchup::CatchupScanner;
use sol_saver::chain::{ChainClient, RpcChainClient};
use sol_saver::config::Config;
use sol_saver::listener::Listener;
use sol_saver::metadata::{ContentFetcher, HttpContentFetcher, MetadataFetcher};
use sol_saver::operators::Operators;
use sol_saver::processor::Processor;
use sol_saver::registry::{Registry, RestRegistryClient};
use sol_saver::server::{self, AppState, Metrics, SaverStats};
use sol_saver::verifier::TransferVerifier;
use sol_saver::voter::Voter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Service,
    Saver,
    SaverCatchup,
    Voter,
}

impl Mode {
    fn runs_listener(self) -> bool {
        matches!(self, Mode::Service | Mode::Saver)
    }
}

impl FromStr for Mode {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(Mode::Service),
            "saver" => Ok(Mode::Saver),
            "saver-catchup" => Ok(Mode::SaverCatchup),
            "voter" => Ok(Mode::Voter),
            other => Err(eyre!(
                "Unknown command {}; expected service, saver, saver-catchup or voter",
                other
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Service => "service",
            Mode::Saver => "saver",
            Mode::SaverCatchup => "saver-catchup",
            Mode::Voter => "voter",
        };
        f.write_str(name)
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    let mode = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<Mode>()?,
        None => Mode::Service,
    };
    info!(mode = %mode, "Starting Solana Bridge Saver");

    let config = Config::load()?;
    info!(config = ?config, "Configuration loaded");

    if mode.runs_listener() && config.solana_ws_url.is_empty() {
        return Err(eyre!("SOLANA_WS_URL required for {} mode", mode));
    }

    let timeout = config.request_timeout();
    let chain: Arc<dyn ChainClient> =
        Arc::new(RpcChainClient::new(&config.solana_rpc_url, timeout));
    let registry: Arc<dyn Registry> =
        Arc::new(RestRegistryClient::new(&config.registry_url, timeout)?);
    let content: Arc<dyn ContentFetcher> = Arc::new(HttpContentFetcher::new(timeout)?);
    let broadcaster: Arc<dyn Broadcaster> =
        Arc::new(HttpBroadcaster::new(&config.broadcaster_url, timeout)?);

    let operators = Arc::new(Operators::new(
        &config.chain_name,
        registry.clone(),
        MetadataFetcher::new(chain.clone(), content),
    ));

    let stats = Arc::new(RwLock::new(SaverStats {
        saver_id: config.saver_id.clone(),
        ..Default::default()
    }));
    let metrics = Arc::new(Metrics::new());

    let processor = Arc::new(Processor::new(
        config.program_id,
        chain.clone(),
        operators.clone(),
        broadcaster.clone(),
        stats.clone(),
        metrics.clone(),
    ));
    let verifier = Arc::new(TransferVerifier::new(
        &config.chain_name,
        config.program_id,
        chain.clone(),
        operators,
    ));
    let voter = Arc::new(Voter::new(registry, verifier, broadcaster));

    let catchup = Arc::new(CatchupScanner::new(
        config.program_id,
        config.from_tx.filter(|_| config.catchup_enabled()),
        chain,
        processor.clone(),
        stats.clone(),
        metrics.clone(),
    ));

    // Create shutdown channels
    let (listener_tx, listener_rx) = mpsc::channel::<()>(1);
    let (catchup_tx, catchup_rx) = mpsc::channel::<()>(1);
    let (server_tx, server_rx) = mpsc::channel::<()>(1);

    // Handle signals
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = listener_tx.send(()).await;
        let _ = catchup_tx.send(()).await;
        let _ = server_tx.send(()).await;
    });

    let state = AppState {
        stats: stats.clone(),
        metrics: metrics.clone(),
        voter,
    };
    let backoff = config.reconnect_backoff();

    match mode {
        Mode::SaverCatchup => catchup.run_until_success(backoff, catchup_rx).await?,
        Mode::Voter => run_server(&config, state, server_rx).await?,
        Mode::Service | Mode::Saver => {
            let catchup_task = {
                let catchup = catchup.clone();
                tokio::spawn(async move {
                    if let Err(e) = catchup.run_until_success(backoff, catchup_rx).await {
                        error!(error = %e, "Catchup stopped");
                    }
                })
            };

            let listener = Listener::new(
                &config.solana_ws_url,
                config.program_id,
                processor,
                backoff,
                stats,
                metrics,
            );

            let server = async {
                if mode == Mode::Service {
                    run_server(&config, state, server_rx).await
                } else {
                    std::future::pending::<eyre::Result<()>>().await
                }
            };

            let result = tokio::select! {
                result = listener.run(listener_rx) => result,
                result = server => result,
            };
            catchup_task.abort();

            if let Err(e) = result {
                error!(error = %e, "Saver stopped with error");
                return Err(e);
            }
        }
    }

    info!("Solana Bridge Saver stopped");
    Ok(())
}

async fn run_server(
    config: &Config,
    state: AppState,
    mut shutdown: mpsc::Receiver<()>,
) -> eyre::Result<()> {
    tokio::select! {
        result = server::start_server(&config.bind_address, config.health_port, state) => result,
        _ = shutdown.recv() => {
            info!("HTTP server shutting down");
            Ok(())
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sol_saver=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
