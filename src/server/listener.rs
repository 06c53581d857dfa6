use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::config::Config;
use crate::error::ProxyError;
use crate::http::connection::Connection;
use crate::proxy::upstream::Forwarder;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bind the configured address and serve until the task is dropped.
pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let addr = cfg.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", listener.local_addr()?);

    let cache = Cache::new(&cfg.cache);
    info!(
        capacity = cache.capacity(),
        max_object_size = cache.max_object_size(),
        policy = ?cfg.cache.policy,
        "Cache ready"
    );

    let forwarder = Forwarder::new(cache, &cfg.proxy);
    serve(listener, forwarder, cfg.server.max_connections).await
}

/// Accept connections on `listener`, one worker task per connection.
///
/// At most `max_connections` workers run at once (`0` means no limit); the
/// loop waits for a worker to finish before accepting past the limit.
pub async fn serve(
    listener: TcpListener,
    forwarder: Forwarder,
    max_connections: usize,
) -> anyhow::Result<()> {
    let limiter = (max_connections > 0).then(|| Arc::new(Semaphore::new(max_connections)));

    loop {
        let permit = match &limiter {
            Some(limiter) => Some(limiter.clone().acquire_owned().await?),
            None => None,
        };

        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Failed to accept connection, retrying");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        info!(%peer, "Accepted connection");

        let forwarder = forwarder.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let mut conn = Connection::new(socket, forwarder);

            match conn.run().await {
                Ok(()) => {}
                Err(e @ ProxyError::ClientIo(_)) => {
                    debug!(%peer, error = %e, "Client connection dropped");
                }
                Err(e) => {
                    warn!(%peer, error = %e, "Request failed");
                }
            }
        });
    }
}
