use super::{AuditEntry, AuditStats, AuditStore, stats_over};
use crate::error::AuditError;
use std::sync::Mutex;

/// Entries retained before the oldest are dropped.
const DEFAULT_RETENTION: usize = 1000;

/// Process-local audit store. Keeps the most recent entries up to a retention
/// cap; also serves as the fallback buffer when a persistent store rejects a
/// write.
#[derive(Debug)]
pub struct MemoryAuditStore {
    entries: Mutex<Vec<AuditEntry>>,
    retention: usize,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            retention,
        }
    }
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditStore for MemoryAuditStore {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.push(entry.clone());
        if entries.len() > self.retention {
            let overflow = entries.len() - self.retention;
            *entries = entries.split_off(overflow);
        }
        Ok(())
    }

    fn list(&self, limit: usize, service: Option<&str>) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries
            .iter()
            .rev()
            .filter(|entry| service.is_none_or(|svc| entry.service == svc))
            .take(limit)
            .cloned()
            .collect())
    }

    fn stats(&self) -> Result<AuditStats, AuditError> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(stats_over(entries.iter()))
    }

    fn clear(&self) -> Result<(), AuditError> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        Ok(())
    }
}
