mod cli;
mod config;
mod policies;
mod proxy;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use audit_http::AuditLayer;
use audit_log::{FileSink, ProviderCatalog, Writer, WriterOptions};
use clap::Parser;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::AuditConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref listen) = cli.listen {
        cfg.network.listen_addr = listen.clone();
    }
    if let Some(ref upstream) = cli.upstream {
        cfg.network.upstream_addr = upstream.clone();
    }
    if let Some(ref path) = cli.audit_log {
        cfg.audit.path = path.clone();
    }
    if let Some(level) = cli.audit_level {
        cfg.audit.level = level;
    }
    if let Some(ref dir) = cli.policy_dir {
        cfg.audit.policy_dir = Some(dir.clone());
    }

    // 3. Init tracing-subscriber with JSON format.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!(
        config_file = %cli.config.display(),
        listen = %cfg.network.listen_addr,
        upstream = %cfg.network.upstream_addr,
        audit_enabled = cfg.audit.enabled,
        "audit-gateway starting"
    );

    let listen_addr: SocketAddr = cfg
        .network
        .listen_addr
        .parse()
        .context("invalid listen address")?;
    let upstream_addr: SocketAddr = cfg
        .network
        .upstream_addr
        .parse()
        .context("invalid upstream address")?;

    // 4. Build the proxy, wrapped in the audit layer when enabled.
    let mut app = proxy::router(proxy::Upstream::new(upstream_addr));

    if cfg.audit.enabled {
        let writer = Arc::new(build_writer(&cfg.audit)?);

        if let Some(ref dir) = cfg.audit.policy_dir {
            let reports = policies::load_dir(&writer, dir)?;
            let active = reports
                .iter()
                .filter(|r| r.status == audit_policy::PolicyStatus::active())
                .count();
            info!(
                dir = %dir.display(),
                files = reports.len(),
                active,
                "audit policies loaded"
            );
        }

        info!(
            path = %cfg.audit.path.display(),
            level = %cfg.audit.level,
            default_policies = !cfg.audit.disable_default_policies,
            "audit log writer ready"
        );
        app = app.layer(AuditLayer::new(writer));
    } else {
        warn!("audit logging disabled; requests are proxied without being recorded");
    }

    // 5. Serve until ctrl-c or SIGTERM.
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;

    info!(listen = %listen_addr, upstream = %upstream_addr, "proxy listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("proxy server failed")?;

    info!("audit-gateway shutting down");
    Ok(())
}

/// Open the sink, assemble the provider catalog and create the writer.
fn build_writer(audit: &AuditConfig) -> Result<Writer> {
    let sink = FileSink::open(&audit.path).context("failed to open audit log")?;

    let mut catalog = ProviderCatalog::builtin();
    if let Some(ref path) = audit.catalog_file {
        catalog.merge(ProviderCatalog::from_yaml_file(path)?);
        info!(path = %path.display(), "provider catalog merged");
    }

    Writer::new(
        sink,
        WriterOptions {
            default_policy_level: audit.level,
            disable_default_policies: audit.disable_default_policies,
            catalog,
        },
    )
    .context("failed to create audit log writer")
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received SIGINT (ctrl-c)"),
                    _ = sigterm.recv() => info!("received SIGTERM"),
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler; waiting for ctrl-c only");
                ctrl_c.await.ok();
                info!("received SIGINT (ctrl-c)");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT (ctrl-c)");
    }
}
