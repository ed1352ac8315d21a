//! Metrics Registry
//!
//! 드라이버 인스턴스 범위의 메트릭 레지스트리

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use super::connection::ConnectionMetrics;
use super::event::MetricsClock;
use super::listener::{ConnectionPoolListener, ConnectionPoolStatus};
use super::pool::{ConnectionPoolMetrics, PoolMetricsSnapshot};
use crate::driver::config::MetricsConfig;

/// 메트릭 레지스트리
///
/// 드라이버 생성 시 만들어 풀/연결을 만드는 쪽에 참조로 넘긴다. 항목은 식별자마다
/// 한 번만 만들어지고 레지스트리가 살아있는 동안 제거되지 않는다.
#[derive(Debug)]
pub struct MetricsRegistry {
    config: MetricsConfig,
    clock: MetricsClock,
    pool_metrics: DashMap<String, Arc<ConnectionPoolMetrics>>,
    connection_metrics: DashMap<String, Arc<ConnectionMetrics>>,
}

impl MetricsRegistry {
    /// 새 레지스트리 생성
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            clock: MetricsClock::new(),
            pool_metrics: DashMap::new(),
            connection_metrics: DashMap::new(),
        }
    }

    /// 이벤트가 공유하는 시계
    pub fn clock(&self) -> MetricsClock {
        self.clock
    }

    /// 설정
    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// 풀 리스너 조회 또는 생성
    ///
    /// 같은 식별자로 동시에 호출되면 여러 인스턴스가 만들어질 수 있지만 하나만
    /// 남고 모든 호출자가 그 인스턴스를 받는다.
    pub fn create_pool_listener<P>(&self, pool_uri: &str, pool: &Arc<P>) -> Arc<ConnectionPoolMetrics>
    where
        P: ConnectionPoolStatus + 'static,
    {
        if let Some(existing) = self.pool_metrics.get(pool_uri) {
            return Arc::clone(existing.value());
        }

        // 락 밖에서 생성
        let pool = Arc::downgrade(pool) as Weak<dyn ConnectionPoolStatus>;
        let metrics = Arc::new(ConnectionPoolMetrics::new(pool_uri, Some(pool)));

        let entry = self
            .pool_metrics
            .entry(pool_uri.to_string())
            .or_insert(metrics);
        tracing::debug!(pool = pool_uri, "pool metrics registered");
        Arc::clone(entry.value())
    }

    /// 연결 리스너 조회 또는 생성
    pub fn create_connection_listener(&self, pool_uri: &str) -> Arc<ConnectionMetrics> {
        let key = ConnectionMetrics::unique_name_for(pool_uri, self.config.connection_timeout);
        if let Some(existing) = self.connection_metrics.get(&key) {
            return Arc::clone(existing.value());
        }

        let metrics = Arc::new(ConnectionMetrics::new(pool_uri, self.config.connection_timeout));
        let entry = self.connection_metrics.entry(key).or_insert(metrics);
        Arc::clone(entry.value())
    }

    /// 풀 메트릭 (읽기 전용 사본)
    ///
    /// 이미 반영된 삽입만 보이며 항목들 사이의 시점 일관성은 없다.
    pub fn pool_metrics(&self) -> HashMap<String, Arc<ConnectionPoolMetrics>> {
        self.pool_metrics
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// 연결 메트릭 (읽기 전용 사본)
    pub fn connection_metrics(&self) -> HashMap<String, Arc<ConnectionMetrics>> {
        self.connection_metrics
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// 풀 메트릭 스냅샷 (식별자 순)
    pub fn snapshot(&self) -> BTreeMap<String, PoolMetricsSnapshot> {
        self.pool_metrics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// 레지스트리 종료
    ///
    /// 모든 풀 메트릭의 풀 참조를 해제한다. 항목은 남아 마지막 값을 보여준다.
    pub fn close(&self) {
        for entry in self.pool_metrics.iter() {
            entry.value().dispose();
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::metrics::listener::PoolStatus;
    use std::time::Duration;

    struct StaticPool;

    impl ConnectionPoolStatus for StaticPool {
        fn number_of_in_use_connections(&self) -> usize {
            1
        }

        fn number_of_idle_connections(&self) -> usize {
            4
        }

        fn status(&self) -> PoolStatus {
            PoolStatus::Open
        }
    }

    #[test]
    fn test_same_identity_shares_instance() {
        let registry = MetricsRegistry::default();
        let pool = Arc::new(StaticPool);
        const THREADS: usize = 16;

        let listeners: Vec<Arc<ConnectionPoolMetrics>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| s.spawn(|| registry.create_pool_listener("bolt://localhost:7687", &pool)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for listener in &listeners {
            assert!(Arc::ptr_eq(listener, &listeners[0]));
        }
        assert_eq!(registry.pool_metrics().len(), 1);
    }

    #[test]
    fn test_distinct_identities() {
        let registry = MetricsRegistry::default();
        let pool = Arc::new(StaticPool);

        let a = registry.create_pool_listener("bolt://a:7687", &pool);
        let b = registry.create_pool_listener("bolt://b:7687", &pool);

        assert!(!Arc::ptr_eq(&a, &b));
        let keys: Vec<String> = registry.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["bolt://a:7687", "bolt://b:7687"]);
    }

    #[test]
    fn test_connection_listener_identity_space() {
        let registry = MetricsRegistry::new(MetricsConfig {
            connection_timeout: Duration::from_secs(5),
        });

        let first = registry.create_connection_listener("bolt://a:7687");
        let second = registry.create_connection_listener("bolt://a:7687");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.unique_name(), "bolt://a:7687:5000");

        assert!(registry.pool_metrics().is_empty());
        assert_eq!(registry.connection_metrics().len(), 1);
    }

    #[test]
    fn test_close_disposes_but_keeps_entries() {
        let registry = MetricsRegistry::default();
        let pool = Arc::new(StaticPool);
        let metrics = registry.create_pool_listener("bolt://a:7687", &pool);
        assert_eq!(metrics.idle(), 4);

        registry.close();

        let snapshot = registry.snapshot();
        let entry = &snapshot["bolt://a:7687"];
        assert_eq!(entry.idle, 0);
        assert_eq!(entry.pool_status, PoolStatus::Closed);
    }
}
