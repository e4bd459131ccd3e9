//! Phoenix channel transport layer.
//!
//! [`frame`] holds the wire codec; [`phoenix`] holds the socket that
//! multiplexes channels over a single WebSocket.

pub mod frame;
pub mod phoenix;
