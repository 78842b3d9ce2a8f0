use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;

use worker_analytics_exporter::{
    analytics::graphql::{GraphqlClient, CLOUDFLARE_ANALYTICS_ENDPOINT},
    exporter::Exporter,
    metrics::Descriptors,
    server,
};

#[derive(Debug, Parser)]
#[command(version, about = "Prometheus exporter for Cloudflare Workers analytics")]
struct Cli {
    /// IP address the HTTP server listens on
    #[arg(long, env = "LISTEN_IP", default_value = "0.0.0.0")]
    listen_ip: std::net::IpAddr,

    /// HTTP server port
    #[arg(short, long, env = "PORT", default_value_t = 9184)]
    port: u16,

    /// Path of the metrics route
    #[arg(long, env = "METRICS_ENDPOINT", default_value = "/metrics")]
    metrics_path: String,

    /// Cloudflare API bearer token with Account Analytics read permission
    #[arg(short, long, env = "CLOUDFLARE_ANALYTICS_TOKEN", hide_env_values = true)]
    token: String,

    /// Cloudflare account id
    #[arg(short, long, env = "CLOUDFLARE_ACCOUNT_ID")]
    account: String,

    /// URL of the Cloudflare GraphQL analytics endpoint
    #[arg(
        short,
        long,
        env = "CLOUDFLARE_ANALYTICS_ENDPOINT",
        default_value = CLOUDFLARE_ANALYTICS_ENDPOINT
    )]
    endpoint: String,

    /// Timeout in seconds of a single request to the analytics endpoint
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 10.0)]
    request_timeout: f64,

    /// Maximum duration in seconds of the collection of a metrics family
    #[arg(long, env = "COLLECT_TIMEOUT", default_value_t = 15.0)]
    collect_timeout: f64,
}

impl Cli {
    /// Check the options that clap cannot validate on its own
    fn validate(&self) -> Result<(), eyre::Report> {
        if !self.metrics_path.starts_with('/') {
            eyre::bail!("metrics path must start with '/': {}", self.metrics_path);
        }
        if self.metrics_path == server::HEALTH_PATH {
            eyre::bail!("metrics path cannot be {}", server::HEALTH_PATH);
        }
        for (name, timeout) in [
            ("request timeout", self.request_timeout),
            ("collect timeout", self.collect_timeout),
        ] {
            if !timeout.is_finite() || timeout <= 0.0 {
                eyre::bail!("{name} must be a positive number of seconds: {timeout}");
            }
        }
        Ok(())
    }
}

/// Load environment variables from a dotenv file
///
/// The file is `DOTENV_FILE` if set, `.env` otherwise.
fn load_dotenv() -> Result<PathBuf, dotenvy::Error> {
    match std::env::var_os("DOTENV_FILE") {
        Some(path) => {
            let path = PathBuf::from(path);
            dotenvy::from_path(&path)?;
            Ok(path)
        }
        None => dotenvy::dotenv(),
    }
}

/// Wait for termination signal (either SIGINT or SIGTERM)
#[cfg(unix)]
async fn wait_terminate() {
    use futures::{stream::FuturesUnordered, StreamExt};
    use tokio::signal::unix::{signal, SignalKind};
    let mut signals = Vec::new();

    // Register signal handlers
    for sig in [SignalKind::terminate(), SignalKind::interrupt()] {
        match signal(sig) {
            Ok(sig) => signals.push(sig),
            Err(err) => log::error!("Could not register signal handler: {err}"),
        }
    }

    // Wait for the first signal to trigger
    let mut signals = signals
        .iter_mut()
        .map(|sig| sig.recv())
        .collect::<FuturesUnordered<_>>();

    loop {
        match signals.next().await {
            // One of the signal triggered -> stop waiting
            Some(Some(())) => break,
            // One of the signal handler has been stopped -> continue waiting for the others
            Some(None) => (),
            // No more signal handlers are available, so wait indefinitely
            None => futures::future::pending::<()>().await,
        }
    }
}

/// Wait for termination signal (Ctrl-C)
#[cfg(windows)]
async fn wait_terminate() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Could not register signal handler: {err}");
        futures::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), eyre::Report> {
    // Before the logger so that RUST_LOG can be set from the dotenv file
    let dotenv = load_dotenv();

    env_logger::builder()
        .filter_module("tracing", log::LevelFilter::Info)
        .parse_default_env()
        .init();

    match dotenv {
        Ok(path) => log::info!("Loaded environment from {}", path.display()),
        Err(err) => log::info!("No dotenv file loaded, using the process environment: {err}"),
    }

    let cli = Cli::parse();
    cli.validate()?;

    let client = GraphqlClient::new(
        &cli.endpoint,
        cli.token,
        cli.account,
        Duration::from_secs_f64(cli.request_timeout),
    )?;
    log::info!("Fetching analytics from {}", client.endpoint());

    let exporter = Exporter::new(
        Arc::new(client),
        Arc::new(Descriptors::default()),
        Duration::from_secs_f64(cli.collect_timeout),
    );
    let router = server::router(Arc::new(exporter), &cli.metrics_path);

    let addr = SocketAddr::new(cli.listen_ip, cli.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Serving metrics on http://{addr}{}", cli.metrics_path);

    axum::serve(listener, router)
        .with_graceful_shutdown(wait_terminate())
        .await?;

    log::info!("Exporter stopped");

    Ok(())
}
