mod cli;
mod error;

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use powerwall_api::GatewayClient;
use powerwall_core::{GatewayConfig, InfluxSink, Poller, Reflector, RuntimeConfig};

use crate::cli::{Cli, Command, FetchArgs, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        tracing::error!(error = %err, "powerwall stopped");
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = powerwall_config::load(cli.global.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => poll(config.resolve()?).await,
        Command::Fetch(args) => fetch(&config.gateway()?, &args).await,
    }
}

async fn login(gateway: &GatewayConfig) -> Result<GatewayClient, CliError> {
    Ok(GatewayClient::connect(
        gateway.url.clone(),
        gateway.credentials(),
        &gateway.transport(),
    )
    .await?)
}

/// Log in, then poll until a signal arrives or a cycle fails fatally.
async fn poll(config: RuntimeConfig) -> Result<(), CliError> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        influx_host = %config.sink.host,
        bucket = %config.sink.bucket,
        interval = ?config.poll.interval,
        "starting powerwall"
    );
    info!(gateway = %config.gateway.url, "connecting to gateway");

    let client = login(&config.gateway).await?;
    let sink = InfluxSink::new(&config.sink)?;
    let mut poller = Poller::new(client, sink, config.poll);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let reflector_task = match config.reflector {
        Some(addr) => {
            let reflector: Arc<Reflector> = Arc::new(Reflector::new());
            poller = poller.with_reflector(Arc::clone(&reflector));
            let listener = TcpListener::bind(addr).await.map_err(CliError::Reflector)?;
            Some(tokio::spawn(reflector.serve(listener, cancel.clone())))
        }
        None => None,
    };

    let polled = poller.run(cancel.clone()).await;
    cancel.cancel();

    let reflected = match reflector_task {
        Some(task) => task.await?.map_err(CliError::from),
        None => Ok(()),
    };

    polled?;
    reflected?;
    info!("shutdown complete");
    Ok(())
}

/// One login and one read of both endpoints, printed as the reflector
/// would serve them.
async fn fetch(gateway: &GatewayConfig, args: &FetchArgs) -> Result<(), CliError> {
    let client = login(gateway).await?;
    let aggregates = client.aggregates().await?;
    let soe = client.state_of_energy().await?;
    debug!(fields = aggregates.len(), "fetched readings");

    let reflector: Reflector = Reflector::new();
    reflector.reflect(&aggregates, soe).await;
    let snapshot: serde_json::Value = serde_json::from_slice(&reflector.snapshot_json().await?)?;

    let out = if args.pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{out}");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
    cancel.cancel();
}
