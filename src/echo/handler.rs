//! Echo loops for blocking and tokio streams.

use bytes::BytesMut;
use std::future::Future;
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read buffer size, reused for the life of a connection.
pub const BUFFER_SIZE: usize = 16 * 1024;

/// An I/O failure that ended an echo loop early.
#[derive(Debug)]
pub struct EchoError {
    /// Bytes echoed before the failure.
    pub echoed: u64,
    pub source: io::Error,
}

impl std::fmt::Display for EchoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "echo failed after {} bytes: {}", self.echoed, self.source)
    }
}

impl std::error::Error for EchoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Copy everything read from `stream` back into it until end-of-stream.
///
/// Returns the number of bytes echoed. Any read or write error aborts the
/// loop; interrupted reads are retried. Deadlines, if any, are configured on
/// the stream by the caller.
pub fn echo<S: Read + Write>(stream: &mut S) -> Result<u64, EchoError> {
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut echoed = 0u64;

    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => return Ok(echoed),
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(EchoError { echoed, source }),
        };

        stream
            .write_all(&buf[..n])
            .map_err(|source| EchoError { echoed, source })?;
        echoed += n as u64;
    }
}

/// Async counterpart of [`echo`].
///
/// When `timeout` is set, each read and each write must finish within it or
/// the loop fails with [`io::ErrorKind::TimedOut`].
pub async fn echo_async<S>(stream: &mut S, timeout: Option<Duration>) -> Result<u64, EchoError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(BUFFER_SIZE);
    let mut echoed = 0u64;

    loop {
        buf.clear();

        let n = with_deadline(timeout, stream.read_buf(&mut buf))
            .await
            .map_err(|source| EchoError { echoed, source })?;
        if n == 0 {
            return Ok(echoed);
        }

        with_deadline(timeout, stream.write_all(&buf))
            .await
            .map_err(|source| EchoError { echoed, source })?;
        echoed += n as u64;
    }
}

async fn with_deadline<F, T>(timeout: Option<Duration>, op: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, op)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "echo i/o timed out"))?,
        None => op.await,
    }
}
