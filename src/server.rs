//! TCP echo server.
//!
//! Binds the listening socket, then hands it to the configured runtime,
//! which runs the accept loop and the fixed worker pool forever.

use crate::config::{Config, RuntimeType};
use crate::runtime::{self, PoolStats};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tracing::info;

/// Server instance
pub struct Server {
    config: Config,
    listener: TcpListener,
    stats: Arc<PoolStats>,
}

impl Server {
    /// Bind the listening socket. A failure here is fatal to the process.
    pub fn bind(config: Config) -> io::Result<Self> {
        let listener = runtime::bind_listener(&config)?;

        Ok(Server {
            config,
            listener,
            stats: Arc::new(PoolStats::new()),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Counters shared with the listener and the workers.
    #[cfg(test)]
    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    /// Start the worker pool and accept connections until the process is
    /// killed. Only returns on a runtime setup failure.
    pub fn run(self) -> io::Result<()> {
        info!(
            address = %self.local_addr()?,
            queue_size = self.config.queue_size,
            workers = self.config.workers,
            runtime = ?self.config.runtime,
            "Server listening"
        );

        match self.config.runtime {
            RuntimeType::Threads => runtime::threads::run(self.listener, &self.config, self.stats),
            RuntimeType::Tokio => runtime::tasks::run(self.listener, &self.config, self.stats),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{ErrorKind, Read, Write};
    use std::net::{Shutdown, TcpStream};
    use std::thread;
    use std::time::{Duration, Instant};

    fn test_config(runtime: RuntimeType, workers: usize, queue_size: usize) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            queue_size,
            workers,
            backlog: 128,
            io_timeout_secs: 0,
            runtime,
            log_level: "info".to_string(),
        }
    }

    fn start(config: Config) -> (SocketAddr, Arc<PoolStats>) {
        let server = Server::bind(config).unwrap();
        let addr = server.local_addr().unwrap();
        let stats = server.stats();
        thread::spawn(move || server.run());
        (addr, stats)
    }

    /// Send `payload`, close the write side, collect everything echoed.
    fn roundtrip(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).unwrap();
        let mut writer = stream.try_clone().unwrap();
        let payload = payload.to_vec();

        // Write concurrently so large payloads don't fill both socket buffers.
        let sender = thread::spawn(move || {
            writer.write_all(&payload).unwrap();
            writer.shutdown(Shutdown::Write).unwrap();
        });

        let mut echoed = Vec::new();
        stream.read_to_end(&mut echoed).unwrap();
        sender.join().unwrap();
        echoed
    }

    fn finish(mut stream: TcpStream) -> Vec<u8> {
        stream.set_read_timeout(None).unwrap();
        stream.shutdown(Shutdown::Write).unwrap();
        let mut echoed = Vec::new();
        stream.read_to_end(&mut echoed).unwrap();
        echoed
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    fn pseudo_random(len: usize) -> Vec<u8> {
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect()
    }

    fn assert_no_echo(stream: &mut TcpStream) {
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let mut buf = [0u8; 16];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut));
    }

    #[test]
    fn test_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = test_config(RuntimeType::Threads, 1, 1);
        config.port = taken.local_addr().unwrap().port();

        assert!(Server::bind(config).is_err());
    }

    #[test]
    fn test_echo_hello_threads() {
        let (addr, stats) = start(test_config(RuntimeType::Threads, 2, 4));
        assert_eq!(roundtrip(addr, b"hello"), b"hello");
        assert!(wait_until(|| stats.snapshot().closed == 1));
        assert_eq!(stats.snapshot().bytes_echoed, 5);
    }

    #[test]
    fn test_echo_hello_tokio() {
        let (addr, stats) = start(test_config(RuntimeType::Tokio, 2, 4));
        assert_eq!(roundtrip(addr, b"hello"), b"hello");
        assert!(wait_until(|| stats.snapshot().closed == 1));
        assert_eq!(stats.snapshot().bytes_echoed, 5);
    }

    #[test]
    fn test_echo_one_megabyte_threads() {
        let (addr, _) = start(test_config(RuntimeType::Threads, 2, 4));
        let payload = pseudo_random(1024 * 1024);
        assert!(roundtrip(addr, &payload) == payload);
    }

    #[test]
    fn test_echo_one_megabyte_tokio() {
        let (addr, _) = start(test_config(RuntimeType::Tokio, 2, 4));
        let payload = pseudo_random(1024 * 1024);
        assert!(roundtrip(addr, &payload) == payload);
    }

    fn check_reset_isolation(runtime: RuntimeType) {
        let (addr, stats) = start(test_config(runtime, 2, 4));

        let mut steady = TcpStream::connect(addr).unwrap();
        steady.write_all(b"before").unwrap();

        let abrupt = TcpStream::connect(addr).unwrap();
        assert!(wait_until(|| stats.servicing() == 2));
        socket2::SockRef::from(&abrupt)
            .set_linger(Some(Duration::ZERO))
            .unwrap();
        drop(abrupt);

        // The reset is logged as an echo failure and the socket still closes.
        assert!(wait_until(|| {
            let snap = stats.snapshot();
            snap.closed == 1 && snap.echo_errors == 1
        }));
        assert_eq!(roundtrip(addr, b"other"), b"other");

        steady.write_all(b" after").unwrap();
        assert_eq!(finish(steady), b"before after");
        assert!(wait_until(|| stats.snapshot().closed == 3));
        assert_eq!(stats.snapshot().echo_errors, 1);
    }

    #[test]
    fn test_reset_isolation_threads() {
        check_reset_isolation(RuntimeType::Threads);
    }

    #[test]
    fn test_reset_isolation_tokio() {
        check_reset_isolation(RuntimeType::Tokio);
    }

    fn check_bounded_admission(runtime: RuntimeType) {
        let (addr, stats) = start(test_config(runtime, 2, 1));

        let first = TcpStream::connect(addr).unwrap();
        let second = TcpStream::connect(addr).unwrap();
        let mut third = TcpStream::connect(addr).unwrap();
        let mut fourth = TcpStream::connect(addr).unwrap();

        // Two servicing, one queued, one held by the blocked accept loop.
        assert!(wait_until(|| {
            let snap = stats.snapshot();
            snap.servicing == 2 && snap.accepted == 4
        }));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(stats.servicing(), 2);

        third.write_all(b"3").unwrap();
        fourth.write_all(b"4").unwrap();
        assert_no_echo(&mut third);
        assert_no_echo(&mut fourth);

        // Freeing a worker lets the queued connection in.
        assert_eq!(finish(first), b"");
        assert_eq!(finish(third), b"3");
        assert_eq!(finish(second), b"");
        assert_eq!(finish(fourth), b"4");

        assert!(wait_until(|| stats.snapshot().closed == 4));
        assert!(stats.servicing() <= 2);
    }

    #[test]
    fn test_bounded_admission_threads() {
        check_bounded_admission(RuntimeType::Threads);
    }

    #[test]
    fn test_bounded_admission_tokio() {
        check_bounded_admission(RuntimeType::Tokio);
    }

    #[test]
    fn test_every_connection_closed_once() {
        let (addr, stats) = start(test_config(RuntimeType::Threads, 4, 2));

        let clients: Vec<_> = (0..20u8)
            .map(|i| thread::spawn(move || roundtrip(addr, &[i; 100])))
            .collect();
        for (i, client) in clients.into_iter().enumerate() {
            assert_eq!(client.join().unwrap(), vec![i as u8; 100]);
        }

        assert!(wait_until(|| stats.snapshot().closed == 20));
        let snap = stats.snapshot();
        assert_eq!(snap.accepted, 20);
        assert_eq!(snap.servicing, 0);
        assert_eq!(snap.bytes_echoed, 2000);
        assert_eq!(snap.echo_errors, 0);
    }

    #[test]
    fn test_io_timeout_closes_idle_connection() {
        let mut config = test_config(RuntimeType::Threads, 1, 1);
        config.io_timeout_secs = 1;
        let (addr, stats) = start(config);

        let mut idle = TcpStream::connect(addr).unwrap();
        assert!(wait_until(|| stats.snapshot().echo_errors == 1));

        let mut rest = Vec::new();
        let _ = idle.read_to_end(&mut rest);
        assert!(rest.is_empty());
        assert_eq!(roundtrip(addr, b"next"), b"next");
    }
}
