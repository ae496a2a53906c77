//! Length-prefixed bincode transport.
//!
//! One framing scheme for every hop: a little-endian `u32` payload length
//! followed by the bincode-encoded message. Inbound requests, coordinator
//! submissions, and peer attestation calls all speak it.
//!
//! Clients are connection-per-request: dial, send one frame, read one frame,
//! drop. The server side accepts pipelined requests on a connection but
//! answers them in order.

pub mod client;
pub mod codec;
pub mod server;

pub use client::{SentinelClient, TcpCoordinatorClient, TcpPeerClient};
pub use codec::{
    CoordinatorRequest, CoordinatorResponse, SentinelRequest, SentinelResponse, WireError,
};
