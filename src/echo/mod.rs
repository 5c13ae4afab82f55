//! Raw byte echo.
//!
//! Whatever the client sends is written back verbatim, in order, until the
//! client closes its write side. There is no framing and no error signalling
//! on the wire: a failed connection is simply dropped.
//!
//! ```text
//! Client:  hello<FIN>
//! Server:  hello<FIN>
//! ```
//!
//! Both execution backends share the same loop shape: read up to
//! [`handler::BUFFER_SIZE`] bytes, write them all back, repeat.

pub mod handler;

pub use handler::{echo, echo_async, EchoError};
