//! Lifecycle Events
//!
//! 리스너에 전달되는 경과 시간 타이머

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// ============================================================================
// MetricsClock - 공유 단조 시계
// ============================================================================

/// 메트릭 인스턴스가 공유하는 단조 시계
///
/// 동시에 시작된 이벤트들이 같은 기준 시각을 쓰도록 레지스트리 하나당
/// 시계 하나를 만들어 복사해 쓴다.
#[derive(Debug, Clone, Copy)]
pub struct MetricsClock {
    origin: Instant,
}

impl MetricsClock {
    /// 새 시계 생성
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// 시계 생성 이후 경과 시간
    pub fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    /// 이 시계를 쓰는 새 이벤트
    pub fn event(&self) -> TimerEvent {
        TimerEvent::new(*self)
    }
}

impl Default for MetricsClock {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ListenerEvent - 이벤트 트레이트
// ============================================================================

/// 관찰 대상 작업 하나의 타이머
///
/// `start()`는 작업 직전에 한 번, `elapsed()`는 작업 직후에 한 번 호출된다.
/// 이벤트는 작업 사이에 재사용하지 않는다.
pub trait ListenerEvent: Send + Sync {
    /// 기준 시각 기록
    fn start(&self);

    /// `start()` 이후 경과 시간
    fn elapsed(&self) -> Duration;
}

// ============================================================================
// TimerEvent - 기본 구현
// ============================================================================

/// 공유 시계 기반 이벤트
#[derive(Debug)]
pub struct TimerEvent {
    clock: MetricsClock,
    /// 시계 기준 시작 시각 (나노초)
    started_at: AtomicU64,
}

impl TimerEvent {
    /// 새 이벤트 생성 (시작 전)
    pub fn new(clock: MetricsClock) -> Self {
        Self {
            clock,
            started_at: AtomicU64::new(0),
        }
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.clock.now().as_nanos()).unwrap_or(u64::MAX)
    }
}

impl ListenerEvent for TimerEvent {
    fn start(&self) {
        self.started_at.store(self.now_nanos(), Ordering::Relaxed);
    }

    fn elapsed(&self) -> Duration {
        let started = self.started_at.load(Ordering::Relaxed);
        Duration::from_nanos(self.now_nanos().saturating_sub(started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_after_start() {
        let clock = MetricsClock::new();
        let event = clock.event();

        event.start();
        std::thread::sleep(Duration::from_millis(5));
        assert!(event.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_events_are_independent() {
        let clock = MetricsClock::new();
        let first = clock.event();
        first.start();
        std::thread::sleep(Duration::from_millis(10));

        let second = clock.event();
        second.start();

        assert!(first.elapsed() > second.elapsed());
    }

    #[test]
    fn test_clock_is_shared_by_copies() {
        let clock = MetricsClock::new();
        let copy = clock;
        std::thread::sleep(Duration::from_millis(1));

        let (a, b) = (clock.now(), copy.now());
        assert!(a >= Duration::from_millis(1));
        assert!(b >= a);
    }
}
