//! Accept loop and worker tasks.

use crate::config::Config;
use crate::echo::echo_async;
use crate::runtime::{Connection, PoolStats};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

type SharedReceiver = Arc<Mutex<mpsc::Receiver<Connection<TcpStream>>>>;

/// Spawn the worker tasks, then accept forever.
pub async fn serve(
    listener: std::net::TcpListener,
    config: Config,
    stats: Arc<PoolStats>,
) -> io::Result<()> {
    listener.set_nonblocking(true)?;
    let listener = TcpListener::from_std(listener)?;

    let (sender, receiver) = mpsc::channel(config.queue_size);
    let receiver: SharedReceiver = Arc::new(Mutex::new(receiver));

    info!(
        queue_size = config.queue_size,
        workers = config.workers,
        "Starting task pool"
    );

    for worker_id in 0..config.workers {
        tokio::spawn(worker_loop(
            worker_id,
            Arc::clone(&receiver),
            Arc::clone(&stats),
            config.io_timeout(),
        ));
        info!(worker = worker_id, "Created connection handler");
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                stats.accept_failed();
                error!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        let conn_id = stats.connection_accepted();
        info!(conn_id, peer = %peer, "Connection opened");

        let mut conn = Connection::new(conn_id, peer, stream);
        conn.enqueue();

        // Suspends while the channel is full.
        sender
            .send(conn)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "dispatch queue closed"))?;

        let depth = sender.max_capacity() - sender.capacity();
        let snap = stats.snapshot();
        debug!(
            conn_id,
            depth,
            capacity = sender.max_capacity(),
            servicing = snap.servicing,
            accepted = snap.accepted,
            "Queue size"
        );
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: SharedReceiver,
    stats: Arc<PoolStats>,
    io_timeout: Option<Duration>,
) {
    loop {
        // The lock is held across `recv`; waiting workers line up on the mutex.
        let next = receiver.lock().await.recv().await;
        let Some(mut conn) = next else {
            warn!(worker = worker_id, "Dispatch queue closed, worker exiting");
            return;
        };

        conn.start_servicing();
        stats.servicing_started();

        let conn_id = conn.id;
        let peer = conn.peer;
        debug!(
            worker = worker_id,
            conn_id,
            servicing = stats.servicing(),
            "Servicing connection"
        );

        let result = echo_async(conn.stream_mut(), io_timeout).await;
        conn.close();

        match result {
            Ok(bytes) => {
                stats.connection_closed(bytes, false);
                info!(worker = worker_id, conn_id, bytes, "Connection closed");
            }
            Err(e) => {
                stats.connection_closed(e.echoed, true);
                warn!(worker = worker_id, conn_id, peer = %peer, error = %e, "Echo failed");
            }
        }
    }
}
