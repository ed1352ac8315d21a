//! Connection Configuration
//!
//! 서버 주소, 소켓/버퍼 설정, 메트릭 설정

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{DriverError, DriverResult};
use crate::bolt::{BoltProtocol, BoltProtocolFactory, BufferSettings};

/// Bolt 기본 포트
pub const DEFAULT_BOLT_PORT: u16 = 7687;

/// 기본 연결 타임아웃
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ServerAddress - 서버 주소
// ============================================================================

/// 서버 주소
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerAddress {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
}

impl ServerAddress {
    /// 새 서버 주소 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// URI에서 파싱
    ///
    /// `bolt://host:port`, `bolt://host` 또는 `host:port` 형식을 받는다.
    pub fn from_uri(uri: &str) -> DriverResult<Self> {
        let rest = match uri.split_once("://") {
            Some(("bolt", rest)) => rest,
            Some((scheme, _)) => {
                return Err(DriverError::configuration(format!(
                    "Unsupported URI scheme '{}'",
                    scheme
                )))
            }
            None => uri,
        };
        let rest = rest.trim_end_matches('/');

        let parts: Vec<&str> = rest.split(':').collect();
        match parts.as_slice() {
            [host] if !host.is_empty() => Ok(Self::new(*host, DEFAULT_BOLT_PORT)),
            [host, port] if !host.is_empty() => {
                let port = port
                    .parse()
                    .map_err(|_| DriverError::configuration(format!("Invalid port '{}'", port)))?;
                Ok(Self::new(*host, port))
            }
            _ => Err(DriverError::configuration(format!(
                "Invalid server address '{}'",
                uri
            ))),
        }
    }

    /// 소켓 주소로 변환
    pub fn to_socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `bolt://host:port` 형식 URI
    pub fn to_uri(&self) -> String {
        format!("bolt://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_BOLT_PORT)
    }
}

// ============================================================================
// SocketSettings - 소켓 설정
// ============================================================================

/// 소켓 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketSettings {
    /// 연결 타임아웃
    pub connection_timeout: Duration,
    /// TCP_NODELAY
    pub tcp_nodelay: bool,
    /// 읽기 타임아웃 (None이면 무기한 대기)
    pub read_timeout: Option<Duration>,
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            tcp_nodelay: true,
            read_timeout: None,
        }
    }
}

// ============================================================================
// ConnectionConfig - 연결 설정
// ============================================================================

/// 연결 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// 서버 주소
    pub address: ServerAddress,
    /// 소켓 설정
    #[serde(default)]
    pub socket: SocketSettings,
    /// 버퍼 설정
    #[serde(default)]
    pub buffer: BufferSettings,
    /// 제안할 프로토콜 버전 (선호 순)
    #[serde(default = "default_protocol_versions")]
    pub protocol_versions: Vec<u32>,
}

fn default_protocol_versions() -> Vec<u32> {
    BoltProtocolFactory::default().supported_versions()
}

impl ConnectionConfig {
    /// 새 설정 생성
    pub fn new(uri: &str) -> DriverResult<Self> {
        Ok(Self::with_address(ServerAddress::from_uri(uri)?))
    }

    /// 주소로 설정 생성
    pub fn with_address(address: ServerAddress) -> Self {
        Self {
            address,
            socket: SocketSettings::default(),
            buffer: BufferSettings::default(),
            protocol_versions: default_protocol_versions(),
        }
    }

    /// 빌더 시작
    pub fn builder(uri: &str) -> DriverResult<ConnectionConfigBuilder> {
        let config = Self::new(uri)?;
        Ok(ConnectionConfigBuilder { config })
    }

    /// 설정된 버전으로 프로토콜 팩토리 생성
    pub fn protocol_factory(&self) -> DriverResult<BoltProtocolFactory> {
        if self.protocol_versions.is_empty() {
            return Err(DriverError::configuration("No protocol versions configured"));
        }

        let defaults = BoltProtocolFactory::default();
        let protocols = self
            .protocol_versions
            .iter()
            .map(|&version| {
                defaults.for_version(version).map_err(|_| {
                    DriverError::configuration(format!("Unknown protocol version {}", version))
                })
            })
            .collect::<DriverResult<Vec<Arc<dyn BoltProtocol>>>>()?;

        Ok(BoltProtocolFactory::new(protocols))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::with_address(ServerAddress::default())
    }
}

// ============================================================================
// ConnectionConfigBuilder - 설정 빌더
// ============================================================================

/// 연결 설정 빌더
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// 연결 타임아웃 설정
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.socket.connection_timeout = timeout;
        self
    }

    /// TCP_NODELAY 설정
    pub fn with_tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.config.socket.tcp_nodelay = nodelay;
        self
    }

    /// 읽기 타임아웃 설정
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.socket.read_timeout = Some(timeout);
        self
    }

    /// 버퍼 설정
    pub fn with_buffer_settings(mut self, buffer: BufferSettings) -> Self {
        self.config.buffer = buffer;
        self
    }

    /// 최대 메시지 크기 설정
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.config.buffer.max_message_size = size;
        self
    }

    /// 제안할 프로토콜 버전 설정
    pub fn with_protocol_versions(mut self, versions: impl Into<Vec<u32>>) -> Self {
        self.config.protocol_versions = versions.into();
        self
    }

    /// 빌드
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

// ============================================================================
// MetricsConfig - 메트릭 설정
// ============================================================================

/// 메트릭 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 연결 메트릭의 타임아웃 기준
    pub connection_timeout: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

impl From<&ConnectionConfig> for MetricsConfig {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            connection_timeout: config.socket.connection_timeout,
        }
    }
}
