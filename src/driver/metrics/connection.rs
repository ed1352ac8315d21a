//! Connection Metrics
//!
//! 서버 하나에 대한 소켓 연결 시도 집계

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use super::event::ListenerEvent;
use super::listener::ConnectionListener;
use super::pool::millis;

/// 연결 메트릭
///
/// `"<uri>:<timeout ms>"` 형식의 고유 이름으로 식별한다. 설정된 타임아웃
/// 이상 걸린 뒤 실패한 연결은 타임아웃으로도 집계한다.
pub struct ConnectionMetrics {
    unique_name: String,
    timeout: Duration,

    connecting: AtomicI64,
    connected: AtomicU64,
    failed_to_connect: AtomicU64,
    timed_out_to_connect: AtomicU64,
    total_connection_time: AtomicU64,
}

impl ConnectionMetrics {
    /// 새 메트릭 생성
    pub fn new(uri: &str, timeout: Duration) -> Self {
        Self {
            unique_name: Self::unique_name_for(uri, timeout),
            timeout,
            connecting: AtomicI64::new(0),
            connected: AtomicU64::new(0),
            failed_to_connect: AtomicU64::new(0),
            timed_out_to_connect: AtomicU64::new(0),
            total_connection_time: AtomicU64::new(0),
        }
    }

    /// 레지스트리 키
    pub fn unique_name_for(uri: &str, timeout: Duration) -> String {
        format!("{}:{}", uri, millis(timeout))
    }

    /// 고유 이름
    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    /// 타임아웃 기준
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 연결 중
    pub fn connecting(&self) -> i64 {
        self.connecting.load(Ordering::Relaxed)
    }

    /// 연결 성공 수
    pub fn connected(&self) -> u64 {
        self.connected.load(Ordering::Relaxed)
    }

    /// 연결 실패 수
    pub fn failed_to_connect(&self) -> u64 {
        self.failed_to_connect.load(Ordering::Relaxed)
    }

    /// 타임아웃으로 실패한 수
    pub fn timed_out_to_connect(&self) -> u64 {
        self.timed_out_to_connect.load(Ordering::Relaxed)
    }

    /// 총 연결 시간 (ms)
    pub fn total_connection_time(&self) -> u64 {
        self.total_connection_time.load(Ordering::Relaxed)
    }

    /// 현재 값 스냅샷
    pub fn snapshot(&self) -> ConnectionMetricsSnapshot {
        ConnectionMetricsSnapshot {
            unique_name: self.unique_name.clone(),
            connecting: self.connecting(),
            connected: self.connected(),
            failed_to_connect: self.failed_to_connect(),
            timed_out_to_connect: self.timed_out_to_connect(),
            total_connection_time: self.total_connection_time(),
        }
    }
}

impl ConnectionListener for ConnectionMetrics {
    fn before_connecting(&self, event: &dyn ListenerEvent) {
        self.connecting.fetch_add(1, Ordering::Relaxed);
        event.start();
    }

    fn after_connected(&self, event: &dyn ListenerEvent) {
        self.connecting.fetch_sub(1, Ordering::Relaxed);
        self.connected.fetch_add(1, Ordering::Relaxed);
        self.total_connection_time
            .fetch_add(millis(event.elapsed()), Ordering::Relaxed);
    }

    fn after_failed_to_connect(&self, event: &dyn ListenerEvent) {
        self.connecting.fetch_sub(1, Ordering::Relaxed);
        self.failed_to_connect.fetch_add(1, Ordering::Relaxed);
        if event.elapsed() >= self.timeout {
            self.timed_out_to_connect.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl fmt::Debug for ConnectionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMetrics")
            .field("unique_name", &self.unique_name)
            .field("connected", &self.connected())
            .field("failed_to_connect", &self.failed_to_connect())
            .finish_non_exhaustive()
    }
}

/// 연결 메트릭 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionMetricsSnapshot {
    /// 고유 이름
    pub unique_name: String,
    /// 연결 중
    pub connecting: i64,
    /// 연결 성공
    pub connected: u64,
    /// 연결 실패
    pub failed_to_connect: u64,
    /// 타임아웃
    pub timed_out_to_connect: u64,
    /// 총 연결 시간 (ms)
    pub total_connection_time: u64,
}
