//! Driver Module
//!
//! Bolt 연결 수명주기와 풀/연결 메트릭
//!
//! # Components
//!
//! - [`SocketClient`]: 연결 하나 (상태 머신, 핸드셰이크, 송수신)
//! - [`SocketTransport`], [`TcpSocketClient`]: 바이트 전송
//! - [`ConnectionConfig`]: 주소/소켓/버퍼/버전 설정
//! - [`metrics`]: 풀/연결 수명주기 계측
//!
//! # Example
//!
//! ```ignore
//! use bolt_core::bolt::{Request, ResponsePipeline};
//! use bolt_core::driver::{ConnectionConfig, SocketClient};
//!
//! let config = ConnectionConfig::new("bolt://localhost:7687")?;
//! let mut client = SocketClient::new(&config)?;
//!
//! // 핸드셰이크 후 합의된 프로토콜로 바인딩
//! let protocol = client.connect_async().await?;
//!
//! client.send_async(&[&Request::Reset]).await?;
//! let mut pipeline = ResponsePipeline::new();
//! pipeline.expect(1);
//! client.receive_async(&mut pipeline).await?;
//!
//! client.close_async().await;
//! ```

pub mod metrics;

mod config;
mod connection;
mod error;
mod transport;

// Re-exports
pub use config::{
    ConnectionConfig, ConnectionConfigBuilder, MetricsConfig, ServerAddress, SocketSettings,
    DEFAULT_BOLT_PORT, DEFAULT_CONNECTION_TIMEOUT,
};
pub use connection::{ConnectionState, SocketClient};
pub use error::{DriverError, DriverResult};
pub use transport::{SocketTransport, TcpSocketClient};
