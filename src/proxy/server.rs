use crate::proxy::handler::{handle_request, AppState};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct ProxyServer {
    listener: TcpListener,
    state: Arc<AppState>,
    sweep_interval: Option<Duration>,
}

impl ProxyServer {
    pub async fn bind(addr: SocketAddr, state: Arc<AppState>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state,
            sweep_interval: None,
        })
    }

    /// Evict expired cache entries on a fixed period; `None` leaves it to lookups.
    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval.filter(|i| !i.is_zero());
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` is cancelled. Each connection is
    /// served on its own task, so a slow resolution never blocks the accept loop.
    pub async fn run(self, shutdown: CancellationToken) -> io::Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, "video resolve proxy listening");
        info!(
            positive_ttl = ?self.state.cache().positive_ttl(),
            negative_ttl = ?self.state.cache().negative_ttl(),
            strategies = self.state.orchestrator.strategies().len(),
            "resolution cache ready"
        );

        if let Some(interval) = self.sweep_interval {
            spawn_sweeper(self.state.clone(), interval, shutdown.clone());
        }

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("failed to accept connection: {e}");
                            continue;
                        }
                    };
                    let _ = stream.set_nodelay(true);
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |req| handle_request(req, state.clone()));
                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            // Clients routinely drop media connections while seeking.
                            debug!(%peer, "connection ended: {e}");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
            }
        }
    }
}

fn spawn_sweeper(state: Arc<AppState>, interval: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = state.cache().sweep_expired();
                    if removed > 0 {
                        debug!(removed, "swept expired cache entries");
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    });
}
