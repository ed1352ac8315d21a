//! Driver Error Types
//!
//! 드라이버 에러 정의

use thiserror::Error;

use crate::bolt::{BoltError, ErrorKind};

// ============================================================================
// DriverError - 드라이버 에러
// ============================================================================

/// 드라이버 에러
#[derive(Error, Debug)]
pub enum DriverError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bolt 연결/프로토콜 에러
    #[error(transparent)]
    Bolt(#[from] BoltError),
}

impl DriverError {
    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 에러 분류 (설정 에러는 사용 오류로 분류)
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Usage,
            Self::Bolt(e) => e.kind(),
        }
    }

    /// 재시도 가능 여부
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Configuration(_) => false,
            Self::Bolt(e) => e.is_retryable(),
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 드라이버 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let err = DriverError::configuration("Invalid port");
        assert_eq!(err.to_string(), "Configuration error: Invalid port");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_bolt_error_is_transparent() {
        let err: DriverError = BoltError::ConnectionClosed.into();
        assert_eq!(err.to_string(), "Connection closed");
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.is_retryable());
    }
}
