//! HTTP client and the transports it runs on

pub mod fetch_client;
pub mod transport;

pub use fetch_client::FetchClient;
pub use transport::{PreparedRequest, ReqwestTransport, Transport, TransportError};
