//! Connection Pool Metrics
//!
//! 풀 하나의 수명주기 이벤트를 원자 카운터로 집계

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;

use super::event::ListenerEvent;
use super::listener::{ConnectionPoolListener, ConnectionPoolStatus, PoolStatus};

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// ConnectionPoolMetrics - 풀 메트릭 집계기
// ============================================================================

/// 연결 풀 메트릭
///
/// 모든 카운터는 독립적인 원자 변수이며 락을 쓰지 않는다. 카운터 사이의
/// 일관성은 보장하지 않는다 (`created`와 `total_connection_time`이 잠깐
/// 어긋나 보일 수 있다). 시간 값은 밀리초 단위.
pub struct ConnectionPoolMetrics {
    /// 풀 식별자 (풀 URI)
    id: String,

    creating: AtomicI64,
    created: AtomicU64,
    failed_to_create: AtomicU64,

    closing: AtomicI64,
    closed: AtomicU64,

    acquiring: AtomicI64,
    acquired: AtomicU64,
    timed_out_to_acquire: AtomicU64,

    total_acquisition_time: AtomicU64,
    total_connection_time: AtomicU64,
    total_in_use_time: AtomicU64,
    total_in_use_count: AtomicU64,

    /// 풀 참조 (dispose 후 None)
    pool: RwLock<Option<Weak<dyn ConnectionPoolStatus>>>,
}

impl ConnectionPoolMetrics {
    /// 새 메트릭 생성
    ///
    /// 공유 상태를 건드리지 않으므로 경쟁에서 진 인스턴스는 그냥 버려진다.
    pub fn new(id: impl Into<String>, pool: Option<Weak<dyn ConnectionPoolStatus>>) -> Self {
        Self {
            id: id.into(),
            creating: AtomicI64::new(0),
            created: AtomicU64::new(0),
            failed_to_create: AtomicU64::new(0),
            closing: AtomicI64::new(0),
            closed: AtomicU64::new(0),
            acquiring: AtomicI64::new(0),
            acquired: AtomicU64::new(0),
            timed_out_to_acquire: AtomicU64::new(0),
            total_acquisition_time: AtomicU64::new(0),
            total_connection_time: AtomicU64::new(0),
            total_in_use_time: AtomicU64::new(0),
            total_in_use_count: AtomicU64::new(0),
            pool: RwLock::new(pool),
        }
    }

    /// 풀 식별자
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 생성 중인 연결 수
    pub fn creating(&self) -> i64 {
        self.creating.load(Ordering::Relaxed)
    }

    /// 생성된 연결 수
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// 생성 실패 수
    pub fn failed_to_create(&self) -> u64 {
        self.failed_to_create.load(Ordering::Relaxed)
    }

    /// 닫는 중인 연결 수
    pub fn closing(&self) -> i64 {
        self.closing.load(Ordering::Relaxed)
    }

    /// 닫힌 연결 수
    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    /// 획득 대기 중인 요청 수
    pub fn acquiring(&self) -> i64 {
        self.acquiring.load(Ordering::Relaxed)
    }

    /// 획득된 연결 수
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    /// 획득 타임아웃 수
    pub fn timed_out_to_acquire(&self) -> u64 {
        self.timed_out_to_acquire.load(Ordering::Relaxed)
    }

    /// 총 획득 시간 (ms)
    pub fn total_acquisition_time(&self) -> u64 {
        self.total_acquisition_time.load(Ordering::Relaxed)
    }

    /// 총 연결 수립 시간 (ms)
    pub fn total_connection_time(&self) -> u64 {
        self.total_connection_time.load(Ordering::Relaxed)
    }

    /// 총 대여 시간 (ms)
    pub fn total_in_use_time(&self) -> u64 {
        self.total_in_use_time.load(Ordering::Relaxed)
    }

    /// 총 대여 횟수
    pub fn total_in_use_count(&self) -> u64 {
        self.total_in_use_count.load(Ordering::Relaxed)
    }

    fn live_pool(&self) -> Option<Arc<dyn ConnectionPoolStatus>> {
        self.pool.read().as_ref().and_then(Weak::upgrade)
    }

    /// 사용 중인 연결 수 (풀에서 읽음, 풀이 없으면 0)
    pub fn in_use(&self) -> usize {
        self.live_pool().map_or(0, |p| p.number_of_in_use_connections())
    }

    /// 유휴 연결 수 (풀에서 읽음, 풀이 없으면 0)
    pub fn idle(&self) -> usize {
        self.live_pool().map_or(0, |p| p.number_of_idle_connections())
    }

    /// 풀 상태 (풀이 없으면 Closed)
    pub fn pool_status(&self) -> PoolStatus {
        self.live_pool().map_or(PoolStatus::Closed, |p| p.status())
    }

    /// 현재 값 스냅샷
    pub fn snapshot(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            id: self.id.clone(),
            pool_status: self.pool_status(),
            in_use: self.in_use(),
            idle: self.idle(),
            creating: self.creating(),
            created: self.created(),
            failed_to_create: self.failed_to_create(),
            closing: self.closing(),
            closed: self.closed(),
            acquiring: self.acquiring(),
            acquired: self.acquired(),
            timed_out_to_acquire: self.timed_out_to_acquire(),
            total_acquisition_time: self.total_acquisition_time(),
            total_connection_time: self.total_connection_time(),
            total_in_use_time: self.total_in_use_time(),
            total_in_use_count: self.total_in_use_count(),
        }
    }
}

impl ConnectionPoolListener for ConnectionPoolMetrics {
    fn before_creating(&self, event: &dyn ListenerEvent) {
        self.creating.fetch_add(1, Ordering::Relaxed);
        event.start();
    }

    fn after_created(&self, event: &dyn ListenerEvent) {
        self.creating.fetch_sub(1, Ordering::Relaxed);
        self.created.fetch_add(1, Ordering::Relaxed);
        self.total_connection_time
            .fetch_add(millis(event.elapsed()), Ordering::Relaxed);
    }

    fn after_failed_to_create(&self) {
        self.failed_to_create.fetch_add(1, Ordering::Relaxed);
        self.creating.fetch_sub(1, Ordering::Relaxed);
    }

    fn before_closing(&self) {
        self.closing.fetch_add(1, Ordering::Relaxed);
    }

    fn after_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
        self.closing.fetch_sub(1, Ordering::Relaxed);
    }

    fn before_acquiring(&self, event: &dyn ListenerEvent) {
        self.acquiring.fetch_add(1, Ordering::Relaxed);
        event.start();
    }

    fn after_acquired(&self, event: &dyn ListenerEvent) {
        self.acquiring.fetch_sub(1, Ordering::Relaxed);
        self.acquired.fetch_add(1, Ordering::Relaxed);
        self.total_acquisition_time
            .fetch_add(millis(event.elapsed()), Ordering::Relaxed);
    }

    fn after_failed_to_acquire(&self) {
        self.acquiring.fetch_sub(1, Ordering::Relaxed);
    }

    fn after_timed_out_to_acquire(&self) {
        self.timed_out_to_acquire.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_acquired(&self, event: &dyn ListenerEvent) {
        event.start();
    }

    fn connection_released(&self, event: &dyn ListenerEvent) {
        self.total_in_use_count.fetch_add(1, Ordering::Relaxed);
        self.total_in_use_time
            .fetch_add(millis(event.elapsed()), Ordering::Relaxed);
    }

    fn dispose(&self) {
        *self.pool.write() = None;
    }
}

impl fmt::Debug for ConnectionPoolMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPoolMetrics")
            .field("id", &self.id)
            .field("created", &self.created())
            .field("closed", &self.closed())
            .field("acquired", &self.acquired())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ConnectionPoolMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.snapshot(), f)
    }
}

// ============================================================================
// PoolMetricsSnapshot - 스냅샷
// ============================================================================

/// 풀 메트릭의 시점 값 (텔레메트리 내보내기용)
///
/// 각 값은 따로 읽힌 것이므로 값들 사이의 일관성은 보장하지 않는다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolMetricsSnapshot {
    /// 풀 식별자
    pub id: String,
    /// 풀 상태
    pub pool_status: PoolStatus,
    /// 사용 중
    pub in_use: usize,
    /// 유휴
    pub idle: usize,
    /// 생성 중
    pub creating: i64,
    /// 생성됨
    pub created: u64,
    /// 생성 실패
    pub failed_to_create: u64,
    /// 닫는 중
    pub closing: i64,
    /// 닫힘
    pub closed: u64,
    /// 획득 대기
    pub acquiring: i64,
    /// 획득됨
    pub acquired: u64,
    /// 획득 타임아웃
    pub timed_out_to_acquire: u64,
    /// 총 획득 시간 (ms)
    pub total_acquisition_time: u64,
    /// 총 연결 시간 (ms)
    pub total_connection_time: u64,
    /// 총 대여 시간 (ms)
    pub total_in_use_time: u64,
    /// 총 대여 횟수
    pub total_in_use_count: u64,
}

impl fmt::Display for PoolMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{id={}, poolStatus={:?}, inUse={}, idle={}, creating={}, created={}, failedToCreate={}, \
             closing={}, closed={}, acquiring={}, acquired={}, timedOutToAcquire={}, \
             totalAcquisitionTime={}, totalConnectionTime={}, totalInUseTime={}, totalInUseCount={}}}",
            self.id,
            self.pool_status,
            self.in_use,
            self.idle,
            self.creating,
            self.created,
            self.failed_to_create,
            self.closing,
            self.closed,
            self.acquiring,
            self.acquired,
            self.timed_out_to_acquire,
            self.total_acquisition_time,
            self.total_connection_time,
            self.total_in_use_time,
            self.total_in_use_count,
        )
    }
}
