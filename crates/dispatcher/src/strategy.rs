//! Worker selection strategies
//!
//! A strategy sees only the idle workers of its own pool, in registration order, and
//! returns the position of the one to hand out. It runs inside the registry lock.

use crate::record::ServerRecord;
use rendezvous_proto::StrategyTag;
use std::sync::atomic::{AtomicUsize, Ordering};

pub trait SelectionStrategy: Send + Sync {
    /// Pool this strategy serves
    fn tag(&self) -> StrategyTag;

    /// Position in `candidates` of the worker to hand out
    fn pick(&self, candidates: &[&ServerRecord]) -> Option<usize>;

    /// Mark the chosen record as taken
    fn claim(&self, record: &mut ServerRecord) {
        record.busy = true;
    }
}

/// Round-robin over idle `static` workers.
///
/// The cursor is shared by every request of the pool and wraps over the current
/// number of candidates.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for RoundRobin {
    fn tag(&self) -> StrategyTag {
        StrategyTag::Static
    }

    fn pick(&self, candidates: &[&ServerRecord]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let count = candidates.len();
        let index = self.cursor.load(Ordering::Relaxed) % count;
        self.cursor.store((index + 1) % count, Ordering::Relaxed);
        Some(index)
    }
}

/// Least-loaded idle `dynamic` worker.
///
/// Fewest active connections first; ties go to the worker that has been free the
/// longest, then to the earliest registered.
#[derive(Debug, Default)]
pub struct LeastLoaded;

impl LeastLoaded {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for LeastLoaded {
    fn tag(&self) -> StrategyTag {
        StrategyTag::Dynamic
    }

    fn pick(&self, candidates: &[&ServerRecord]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, r)| (r.active_connections, r.last_free))
            .map(|(index, _)| index)
    }

    fn claim(&self, record: &mut ServerRecord) {
        record.busy = true;
        record.active_connections += 1;
    }
}

/// The strategy for each tag
#[derive(Debug, Default)]
pub struct Strategies {
    round_robin: RoundRobin,
    least_loaded: LeastLoaded,
}

impl Strategies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_tag(&self, tag: StrategyTag) -> &dyn SelectionStrategy {
        match tag {
            StrategyTag::Static => &self.round_robin,
            StrategyTag::Dynamic => &self.least_loaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use std::net::SocketAddr;
    use std::time::{Duration, Instant};

    fn record(port: u16, tag: StrategyTag) -> ServerRecord {
        ServerRecord::new(
            SocketAddr::from(([127, 0, 0, 1], port)),
            tag,
            SocketAddr::from(([127, 0, 0, 1], 40000 + port)),
        )
    }

    #[test]
    fn test_round_robin_visits_each_worker_once() {
        let registry = Registry::new();
        let strategy = RoundRobin::new();
        for port in [7000, 7001, 7002] {
            registry.add(record(port, StrategyTag::Static));
        }

        let mut visited = Vec::new();
        for _ in 0..3 {
            let chosen = registry.select(&strategy).unwrap();
            visited.push(chosen.endpoint().port());
            registry.mark_free(chosen.id());
        }

        assert_eq!(visited, vec![7000, 7001, 7002]);
        assert_eq!(registry.select(&strategy).unwrap().endpoint().port(), 7000);
    }

    #[test]
    fn test_round_robin_skips_busy_workers() {
        let registry = Registry::new();
        let strategy = RoundRobin::new();
        let a = registry.add(record(7000, StrategyTag::Static));
        registry.add(record(7001, StrategyTag::Static));
        registry.update(a, |r| r.busy = true);

        assert_eq!(registry.select(&strategy).unwrap().endpoint().port(), 7001);
        assert!(registry.select(&strategy).is_none());
    }

    #[test]
    fn test_round_robin_empty_pool() {
        let strategy = RoundRobin::new();
        assert_eq!(strategy.pick(&[]), None);
    }

    #[test]
    fn test_least_loaded_prefers_fewer_connections() {
        let registry = Registry::new();
        let strategy = LeastLoaded::new();
        let a = registry.add(record(7000, StrategyTag::Dynamic));
        let b = registry.add(record(7001, StrategyTag::Dynamic));
        registry.update(b, |r| r.active_connections = 2);

        let chosen = registry.select(&strategy).unwrap();
        assert_eq!(chosen.id(), a);
        assert!(chosen.busy);
        assert_eq!(chosen.active_connections, 1);
    }

    #[test]
    fn test_least_loaded_breaks_ties_on_longest_idle() {
        let registry = Registry::new();
        let strategy = LeastLoaded::new();
        let now = Instant::now();

        let a = registry.add(record(7000, StrategyTag::Dynamic));
        registry.add(record(7001, StrategyTag::Dynamic));
        registry.update(registry.snapshot()[1].id(), |r| r.active_connections = 2);

        assert_eq!(registry.select(&strategy).unwrap().id(), a);

        let c = registry.add(record(7002, StrategyTag::Dynamic));
        registry.update(c, |r| r.last_free = now - Duration::from_secs(5));
        registry.update(a, |r| r.release(now));

        assert_eq!(registry.select(&strategy).unwrap().id(), c);
        assert_eq!(registry.select(&strategy).unwrap().id(), a);
    }

    #[test]
    fn test_strategies_by_tag() {
        let strategies = Strategies::new();
        assert_eq!(strategies.for_tag(StrategyTag::Static).tag(), StrategyTag::Static);
        assert_eq!(strategies.for_tag(StrategyTag::Dynamic).tag(), StrategyTag::Dynamic);
    }
}
