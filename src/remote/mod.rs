//! Remote catalog access.

pub mod client;
pub mod transport;
pub mod wire;

pub use client::{RemoteClient, RemoteError};
pub use transport::{ProxyRequest, ProxyResponse, ProxyTransport, ReqwestProxy, TransportError};
