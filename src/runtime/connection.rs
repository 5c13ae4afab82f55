//! Connection handle passed from the listener to a worker.
//!
//! Each connection tracks its lifecycle state and owns its socket. The
//! handle moves by value: listener, then dispatch queue, then exactly one
//! worker, which consumes it with [`Connection::close`].

use std::net::SocketAddr;

/// Lifecycle of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Returned by `accept`, still owned by the listener.
    Accepted,
    /// Buffered in the dispatch queue.
    Queued,
    /// Owned by a worker running the echo loop.
    Servicing,
    /// Socket released. Terminal.
    Closed,
}

/// A single accepted client connection over stream type `S`.
#[derive(Debug)]
pub struct Connection<S> {
    /// Server-assigned identifier, unique per process.
    pub id: u64,
    /// Remote endpoint, used for logging only.
    pub peer: SocketAddr,
    stream: S,
    state: ConnState,
}

impl<S> Connection<S> {
    /// Wrap a freshly accepted socket.
    pub fn new(id: u64, peer: SocketAddr, stream: S) -> Self {
        Self {
            id,
            peer,
            stream,
            state: ConnState::Accepted,
        }
    }

    /// Current lifecycle state.
    #[cfg(test)]
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Transition to queued, right before the handle enters the queue.
    pub fn enqueue(&mut self) {
        debug_assert_eq!(self.state, ConnState::Accepted);
        self.state = ConnState::Queued;
    }

    /// Transition to servicing, once a worker has dequeued the handle.
    pub fn start_servicing(&mut self) {
        debug_assert_eq!(self.state, ConnState::Queued);
        self.state = ConnState::Servicing;
    }

    /// Socket for the echo loop.
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Release the socket. Consumes the handle, so this runs once per
    /// connection.
    pub fn close(mut self) -> ConnState {
        self.state = ConnState::Closed;
        drop(self.stream);
        self.state
    }
}
