//! Listener Contracts
//!
//! 풀/연결 수명주기 리스너와 풀 상태 조회 인터페이스

use serde::{Deserialize, Serialize};

use super::event::ListenerEvent;

// ============================================================================
// ConnectionPoolListener - 풀 리스너
// ============================================================================

/// 연결 풀 수명주기 리스너
///
/// 풀은 before/after 호출을 항상 짝지어 호출해야 한다. 구현체는 짝이
/// 맞는지 검증하지 않는다. 측정 전용이며 풀의 결정에 관여하지 않는다.
pub trait ConnectionPoolListener: Send + Sync {
    /// 연결 생성 시작
    fn before_creating(&self, event: &dyn ListenerEvent);
    /// 연결 생성 완료
    fn after_created(&self, event: &dyn ListenerEvent);
    /// 연결 생성 실패
    fn after_failed_to_create(&self);

    /// 연결 닫기 시작
    fn before_closing(&self);
    /// 연결 닫기 완료
    fn after_closed(&self);

    /// 연결 획득 시작
    fn before_acquiring(&self, event: &dyn ListenerEvent);
    /// 연결 획득 완료
    fn after_acquired(&self, event: &dyn ListenerEvent);
    /// 연결 획득 실패
    fn after_failed_to_acquire(&self);
    /// 연결 획득 타임아웃
    fn after_timed_out_to_acquire(&self);

    /// 연결이 풀 밖으로 대여됨
    fn connection_acquired(&self, event: &dyn ListenerEvent);
    /// 대여된 연결이 반납됨
    fn connection_released(&self, event: &dyn ListenerEvent);

    /// 풀 참조 해제
    fn dispose(&self) {}
}

/// 아무 것도 기록하지 않는 풀 리스너
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPoolListener;

impl ConnectionPoolListener for NoopPoolListener {
    fn before_creating(&self, _event: &dyn ListenerEvent) {}
    fn after_created(&self, _event: &dyn ListenerEvent) {}
    fn after_failed_to_create(&self) {}
    fn before_closing(&self) {}
    fn after_closed(&self) {}
    fn before_acquiring(&self, _event: &dyn ListenerEvent) {}
    fn after_acquired(&self, _event: &dyn ListenerEvent) {}
    fn after_failed_to_acquire(&self) {}
    fn after_timed_out_to_acquire(&self) {}
    fn connection_acquired(&self, _event: &dyn ListenerEvent) {}
    fn connection_released(&self, _event: &dyn ListenerEvent) {}
}

// ============================================================================
// ConnectionListener - 연결 리스너
// ============================================================================

/// 소켓 연결 수명주기 리스너
pub trait ConnectionListener: Send + Sync {
    /// 소켓 연결 시작
    fn before_connecting(&self, event: &dyn ListenerEvent);
    /// 소켓 연결 완료
    fn after_connected(&self, event: &dyn ListenerEvent);
    /// 소켓 연결 실패
    fn after_failed_to_connect(&self, event: &dyn ListenerEvent);
}

/// 아무 것도 기록하지 않는 연결 리스너
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConnectionListener;

impl ConnectionListener for NoopConnectionListener {
    fn before_connecting(&self, _event: &dyn ListenerEvent) {}
    fn after_connected(&self, _event: &dyn ListenerEvent) {}
    fn after_failed_to_connect(&self, _event: &dyn ListenerEvent) {}
}

// ============================================================================
// ConnectionPoolStatus - 풀 조회 인터페이스
// ============================================================================

/// 풀 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolStatus {
    /// 열림
    Open,
    /// 닫힘
    Closed,
    /// 비활성 (라우팅 테이블에서 빠진 서버)
    Inactive,
}

/// 메트릭이 읽어가는 풀 상태
///
/// 동기화 없이 읽히므로 풀은 내부 장부와 항상 일치하는 값을 돌려줘야 한다.
pub trait ConnectionPoolStatus: Send + Sync {
    /// 사용 중인 연결 수
    fn number_of_in_use_connections(&self) -> usize;
    /// 유휴 연결 수
    fn number_of_idle_connections(&self) -> usize;
    /// 풀 상태
    fn status(&self) -> PoolStatus;
}
