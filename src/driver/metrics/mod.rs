//! Metrics Module
//!
//! 연결 풀/연결 수명주기 계측
//!
//! # Components
//!
//! - [`MetricsClock`], [`TimerEvent`]: 작업 하나의 경과 시간 측정
//! - [`ConnectionPoolMetrics`]: 풀 하나의 원자 카운터 집계기
//! - [`ConnectionMetrics`]: 소켓 연결 시도 집계기
//! - [`MetricsRegistry`]: 식별자별 집계기 레지스트리
//!
//! # Example
//!
//! ```ignore
//! use bolt_core::driver::metrics::{MetricsRegistry, ConnectionPoolListener};
//!
//! let registry = MetricsRegistry::default();
//! let listener = registry.create_pool_listener("bolt://localhost:7687", &pool);
//!
//! let event = registry.clock().event();
//! listener.before_acquiring(&event);
//! let conn = pool.acquire().await?;
//! listener.after_acquired(&event);
//!
//! for (id, snapshot) in registry.snapshot() {
//!     println!("{}: {}", id, snapshot);
//! }
//! ```

mod connection;
mod event;
mod listener;
mod pool;
mod registry;

pub use connection::{ConnectionMetrics, ConnectionMetricsSnapshot};
pub use event::{ListenerEvent, MetricsClock, TimerEvent};
pub use listener::{
    ConnectionListener, ConnectionPoolListener, ConnectionPoolStatus, NoopConnectionListener,
    NoopPoolListener, PoolStatus,
};
pub use pool::{ConnectionPoolMetrics, PoolMetricsSnapshot};
pub use registry::MetricsRegistry;
