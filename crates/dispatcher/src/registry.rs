//! Worker registry
//!
//! The registry is the only shared mutable state in the dispatcher. Every operation,
//! including the scan-and-claim performed for a client request, runs under one lock so
//! two requests can never claim the same idle worker and a FREE is never observed half
//! applied.

use crate::record::{RecordId, ServerRecord};
use crate::strategy::SelectionStrategy;
use parking_lot::Mutex;
use std::time::Instant;
use tracing::{debug, warn};

/// Registered workers in registration order
#[derive(Debug, Default)]
pub struct Registry {
    records: Mutex<Vec<ServerRecord>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Duplicate endpoints are kept as separate records.
    pub fn add(&self, record: ServerRecord) -> RecordId {
        let id = record.id();
        let mut records = self.records.lock();

        if let Some(existing) = records.iter().find(|r| r.endpoint() == record.endpoint()) {
            warn!(
                "Endpoint {} registered again as {} from {} (already held by {} from {}); both records stay in the pool",
                record.endpoint(),
                id,
                record.control_peer(),
                existing.id(),
                existing.control_peer()
            );
        }

        records.push(record);
        id
    }

    /// Remove a record, returning it if it was still present
    pub fn remove(&self, id: RecordId) -> Option<ServerRecord> {
        let mut records = self.records.lock();
        let position = records.iter().position(|r| r.id() == id)?;
        Some(records.remove(position))
    }

    /// Read-consistent copy of all records
    pub fn snapshot(&self) -> Vec<ServerRecord> {
        self.records.lock().clone()
    }

    /// Copy of a single record
    pub fn get(&self, id: RecordId) -> Option<ServerRecord> {
        self.records.lock().iter().find(|r| r.id() == id).cloned()
    }

    /// Mutate one record in place under the registry lock
    pub fn update<R>(&self, id: RecordId, f: impl FnOnce(&mut ServerRecord) -> R) -> Option<R> {
        let mut records = self.records.lock();
        records.iter_mut().find(|r| r.id() == id).map(f)
    }

    /// Pick an idle worker from the strategy's pool and claim it.
    ///
    /// The candidate scan and the busy mark happen in one critical section.
    pub fn select(&self, strategy: &dyn SelectionStrategy) -> Option<ServerRecord> {
        let tag = strategy.tag();
        let mut records = self.records.lock();

        let positions: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_candidate(tag))
            .map(|(position, _)| position)
            .collect();

        let chosen = {
            let candidates: Vec<&ServerRecord> = positions.iter().map(|&p| &records[p]).collect();
            strategy.pick(&candidates)?
        };

        let record = &mut records[*positions.get(chosen)?];
        strategy.claim(record);
        debug!(
            "Selected {} ({}) from {} idle {} workers",
            record.endpoint(),
            record.id(),
            positions.len(),
            tag
        );
        Some(record.clone())
    }

    /// Apply a FREE for `id`. Returns false if the record is gone.
    pub fn mark_free(&self, id: RecordId) -> bool {
        self.update(id, |record| record.release(Instant::now())).is_some()
    }

    /// Number of registered workers
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
