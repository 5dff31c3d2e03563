use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use visitbook::config::Config;
use visitbook::engine::{Engine, InMemoryStore, ReservationStore};
use visitbook::identity::{AccountDirectory, IdentityProvider};
use visitbook::service::ReservationService;
use visitbook::wire;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    visitbook::observability::init(config.metrics_port)?;

    let store: Arc<dyn ReservationStore> = match config.wal_path() {
        Some(wal_path) => {
            if let Some(dir) = &config.data_dir {
                std::fs::create_dir_all(dir)?;
            }
            let engine = Engine::new(wal_path.clone())?;
            info!(
                "restored {} reservations from {}",
                engine.reservation_count(),
                wal_path.display()
            );
            Arc::new(engine)
        }
        None => {
            warn!("no data dir configured, reservations are kept in memory only");
            Arc::new(InMemoryStore::new())
        }
    };

    let directory = match &config.accounts_file {
        Some(path) => AccountDirectory::load(path)?,
        None => {
            warn!("VISITBOOK_ACCOUNTS not set, every authenticated request will be refused");
            AccountDirectory::new()
        }
    };
    let directory = Arc::new(directory);
    let identities: Arc<dyn IdentityProvider> = directory.clone();
    let service = Arc::new(ReservationService::new(store, directory, config.calendar));

    let max_connections = config.max_connections;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("visitbook listening on {addr}");
    info!(
        "  data_dir: {}",
        config
            .data_dir
            .as_ref()
            .map_or("(memory)".to_string(), |d| d.display().to_string())
    );
    info!("  max_connections: {max_connections}");
    info!(
        "  schedule: {}..={} every {} min",
        config.calendar.opening(),
        config.calendar.closing(),
        config.calendar.step().num_minutes()
    );

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
                    warn!("cannot register SIGTERM handler: {e}");
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
                        warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(visitbook::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(visitbook::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(visitbook::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let service = service.clone();
                let identities = identities.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, service, identities).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(visitbook::observability::CONNECTIONS_ACTIVE).decrement(1.0);
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
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
        }
    }

    info!("visitbook stopped");
    Ok(())
}
