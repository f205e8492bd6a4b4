use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use deskbook::config::{EngineConfig, ServerConfig};
use deskbook::engine::Engine;
use deskbook::repository::InMemoryRepository;
use deskbook::wire;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let server = ServerConfig::from_env()?;
    let engine_config = EngineConfig::from_env()?;
    deskbook::observability::init(server.metrics_port)?;

    let repo = match &server.seed_path {
        Some(path) => InMemoryRepository::load_json(path).await?,
        None => InMemoryRepository::new(),
    };
    metrics::gauge!(deskbook::observability::SEEDED_BOOKINGS).set(repo.len() as f64);

    let hours = engine_config.business_hours;
    let engine = Arc::new(Engine::new(Arc::new(repo), engine_config)?);
    let semaphore = Arc::new(Semaphore::new(server.max_connections));

    let addr = server.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("deskbook listening on {addr}");
    info!("  seed: {}", server.seed_path.as_ref().map_or("none".to_string(), |p| p.display().to_string()));
    info!("  business hours: {}:00 - {}:00", hours.start_hour, hours.end_hour);
    info!("  max_connections: {}", server.max_connections);
    info!("  request_timeout: {}ms", server.request_timeout.as_millis());

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(deskbook::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(deskbook::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(deskbook::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let engine = engine.clone();
                let timeout = server.request_timeout;

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, engine, timeout).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(deskbook::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(std::time::Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == server.max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = server.max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
        }
    }

    info!("deskbook stopped");
    Ok(())
}
