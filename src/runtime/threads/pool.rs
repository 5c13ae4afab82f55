//! Accept loop and worker threads.

use crate::config::Config;
use crate::echo::{echo, EchoError};
use crate::runtime::{Connection, DispatchQueue, PoolStats};
use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

type Queue = DispatchQueue<Connection<TcpStream>>;

/// Spawn the workers, then accept forever on the calling thread.
pub fn run(listener: TcpListener, config: &Config, stats: Arc<PoolStats>) -> io::Result<()> {
    let queue: Arc<Queue> = Arc::new(DispatchQueue::new(config.queue_size));
    let io_timeout = config.io_timeout();

    info!(
        queue_size = queue.capacity(),
        workers = config.workers,
        "Starting thread pool"
    );

    for worker_id in 0..config.workers {
        let queue = Arc::clone(&queue);
        let stats = Arc::clone(&stats);

        thread::Builder::new()
            .name(format!("worker-{worker_id}"))
            .spawn(move || worker_loop(worker_id, &queue, &stats, io_timeout))?;

        info!(worker = worker_id, "Created connection handler");
    }

    accept_loop(&listener, &queue, &stats)
}

fn accept_loop(listener: &TcpListener, queue: &Queue, stats: &PoolStats) -> io::Result<()> {
    loop {
        let (stream, peer) = match listener.accept() {
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

        // Blocks while the queue is full.
        let depth = queue.push(conn);
        let snap = stats.snapshot();
        debug!(
            conn_id,
            depth,
            capacity = queue.capacity(),
            servicing = snap.servicing,
            accepted = snap.accepted,
            "Queue size"
        );
    }
}

fn worker_loop(worker_id: usize, queue: &Queue, stats: &PoolStats, io_timeout: Option<Duration>) {
    loop {
        let mut conn = queue.pop();
        conn.start_servicing();
        stats.servicing_started();

        let conn_id = conn.id;
        let peer = conn.peer;
        debug!(
            worker = worker_id,
            conn_id,
            queued = queue.len(),
            servicing = stats.servicing(),
            "Servicing connection"
        );

        let result = service(&mut conn, io_timeout);
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

fn service(conn: &mut Connection<TcpStream>, io_timeout: Option<Duration>) -> Result<u64, EchoError> {
    let stream = conn.stream_mut();
    if io_timeout.is_some() {
        stream
            .set_read_timeout(io_timeout)
            .and_then(|()| stream.set_write_timeout(io_timeout))
            .map_err(|source| EchoError { echoed: 0, source })?;
    }
    echo(stream)
}
