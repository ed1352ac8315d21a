//! # Bolt Core
//!
//! Connection transport core for the Bolt graph database protocol, with
//! lock-free pool and connection metrics.
//!
//! ## Features
//!
//! - **Version negotiation** - 20-byte handshake proposing up to four versions
//! - **Chunked framing** - Message reader/writer per protocol version
//! - **Blocking and async** - Every socket operation in both forms, sharing one state machine
//! - **Idempotent shutdown** - Concurrent `stop` calls close the socket exactly once
//! - **Metrics** - Atomic counters for pool and connection lifecycles, keyed per pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bolt_core::bolt::{Request, ResponsePipeline};
//! use bolt_core::driver::{ConnectionConfig, SocketClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::new("bolt://localhost:7687")?;
//!     let mut client = SocketClient::new(&config)?;
//!
//!     let protocol = client.connect_async().await?;
//!     println!("Bolt {}", bolt_core::bolt::handshake::format_version(protocol.version()));
//!
//!     client.send_async(&[&Request::Reset]).await?;
//!     let mut pipeline = ResponsePipeline::new();
//!     pipeline.expect(1);
//!     client.receive_async(&mut pipeline).await?;
//!
//!     client.close_async().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Metrics
//!
//! ```rust
//! use bolt_core::driver::metrics::{ConnectionListener, MetricsRegistry};
//!
//! let registry = MetricsRegistry::default();
//! let listener = registry.create_connection_listener("bolt://localhost:7687");
//!
//! let event = registry.clock().event();
//! listener.before_connecting(&event);
//! listener.after_connected(&event);
//! assert_eq!(listener.connected(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`bolt`] - Handshake, chunking, message envelopes and versioned readers/writers
//! - [`driver`] - Socket client, transport, configuration and metrics
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bolt;
pub mod driver;

// Re-exports for convenience
pub use driver::{
    ConnectionConfig, ConnectionState, DriverError, DriverResult, ServerAddress, SocketClient,
};

pub use bolt::{BoltError, BoltProtocol, BoltProtocolFactory, BoltVersion};
