//! LLM Engine Operator
//!
//! Watches InferenceEngine and InferenceModel resources and keeps one
//! Deployment and one Service per model (or per engine serving no model)
//! in line with the resolved configuration.

use clap::Parser;
use hyper::{Body, Response, StatusCode};
use prometheus::Registry;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use llm_engine_operator::controller::{self, Context, Metrics, OperatorConfig};
use llm_engine_operator::{crd_manifests, EngineDefaultsTable, Error, Resolver, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// LLM Engine Operator - layered inference engine configuration for Kubernetes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Namespace to watch (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// YAML file adding or replacing engine-type defaults
    #[arg(long, env = "ENGINE_DEFAULTS_FILE")]
    defaults_file: Option<PathBuf>,

    /// Periodic resync of healthy resources, in seconds
    #[arg(long, env = "REQUEUE_SECS", default_value = "300")]
    requeue_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Print the CRD manifests and exit
    #[arg(long)]
    print_crds: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_crds {
        print!("{}", crd_manifests()?);
        return Ok(());
    }

    init_logging(&args);

    info!("Starting LLM Engine Operator");
    info!("  Version: {}", llm_engine_operator::VERSION);
    info!("  Namespace: {}", args.namespace.as_deref().unwrap_or("<all>"));

    let mut config = OperatorConfig {
        namespace: args.namespace.clone(),
        defaults_file: args.defaults_file.clone(),
        ..Default::default()
    };
    config.requeue.ready = Duration::from_secs(args.requeue_secs);

    let defaults = match &config.defaults_file {
        Some(path) => EngineDefaultsTable::load(path)?,
        None => EngineDefaultsTable::builtin(),
    };
    info!("  Engine types: {}", defaults.engine_types().collect::<Vec<_>>().join(", "));

    let metrics = Metrics::new(Registry::new())?;
    let client = kube::Client::try_default().await?;
    let ctx = Arc::new(Context::new(
        client.clone(),
        Resolver::new(Arc::new(defaults)),
        config,
        metrics.clone(),
    ));

    // Stops the servers once the controllers return
    let shutdown = CancellationToken::new();

    // Start health server
    let health_addr = parse_addr(&args.health_addr, "health")?;
    let health_shutdown = shutdown.clone();
    let health = tokio::spawn(async move {
        if let Err(e) = run_health_server(health_addr, health_shutdown).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = parse_addr(&args.metrics_addr, "metrics")?;
    let metrics_shutdown = shutdown.clone();
    let metrics_server = tokio::spawn(async move {
        if let Err(e) = run_metrics_server(metrics_addr, metrics, metrics_shutdown).await {
            error!("Metrics server error: {}", e);
        }
    });

    let result = controller::run(client, ctx).await;
    shutdown.cancel();
    let _ = tokio::join!(health, metrics_server);
    result?;

    info!("Operator shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

fn parse_addr(addr: &str, server: &str) -> Result<SocketAddr> {
    addr.parse()
        .map_err(|e| Error::Configuration(format!("Invalid {} server address {}: {}", server, addr, e)))
}

fn respond(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Request, Server};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let response = match req.uri().path() {
                "/healthz" | "/livez" | "/readyz" => respond(StatusCode::OK, "ok"),
                _ => respond(StatusCode::NOT_FOUND, "not found"),
            };
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: SocketAddr, metrics: Metrics, shutdown: CancellationToken) -> Result<()> {
    use hyper::header::CONTENT_TYPE;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Request, Server};

    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let metrics = metrics.clone();
                async move {
                    let response = match req.uri().path() {
                        "/metrics" => match metrics.encode() {
                            Ok((content_type, buffer)) => {
                                let mut response = respond(StatusCode::OK, buffer);
                                if let Ok(value) = content_type.parse() {
                                    response.headers_mut().insert(CONTENT_TYPE, value);
                                }
                                response
                            }
                            Err(e) => respond(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
                        },
                        _ => respond(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
