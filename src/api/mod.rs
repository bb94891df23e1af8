//! HTTP access to the WINIX backend.
//!
//! `RequestLayer` wraps a `Transport` with timeouts, retries, identity
//! headers and GET read-through caching. `WinixClient` builds the typed
//! endpoints on top of it.

pub mod client;
pub mod error;
pub mod identity;
#[cfg(test)]
pub mod mock;
pub mod request;
pub mod transport;
pub mod types;

pub use client::WinixClient;
pub use error::{ApiError, ErrorCode};
pub use identity::Identity;
pub use request::{RequestConfig, RequestLayer, RequestOptions};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError};
