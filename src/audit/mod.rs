pub mod memory;
pub mod sqlite;

pub use memory::MemoryAuditStore;
pub use sqlite::SqliteAuditStore;

use crate::error::AuditError;
use crate::guardrail::access::AccessLevel;
use crate::guardrail::risk::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Final disposition of a gated action as recorded in the audit log.
///
/// The `pending` row written before the human wait and the final row written
/// after it are two distinct entries: the log is an append-only ledger of
/// state transitions, never reconciled in place.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ActionResult {
    Pending,
    Success,
    Denied,
    Failed,
    TimedOut,
}

/// One row of the audit ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: String,
    pub agent: String,
    pub service: String,
    pub service_name: String,
    pub action: String,
    pub access_level: AccessLevel,
    pub risk: RiskLevel,
    pub approved: bool,
    pub result: ActionResult,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl AuditEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent: impl Into<String>,
        service: impl Into<String>,
        service_name: impl Into<String>,
        action: impl Into<String>,
        access_level: AccessLevel,
        risk: RiskLevel,
        approved: bool,
        result: ActionResult,
    ) -> Self {
        let service = service.into();
        let action = action.into();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!(
                "act_{}_{}_{}",
                service,
                action.replace(' ', "_"),
                &suffix[..8]
            ),
            timestamp: chrono::Utc::now().to_rfc3339(),
            agent: agent.into(),
            service,
            service_name: service_name.into(),
            action,
            access_level,
            risk,
            approved,
            result,
            duration_ms: None,
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Aggregate stats over today's entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub denied: u64,
    pub by_service: HashMap<String, ServiceStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub count: u64,
    pub failed: u64,
    pub label: String,
}

/// Append-only audit store. No entry is ever mutated once written; the only
/// destructive operation is an explicit user-initiated `clear`.
pub trait AuditStore: Send + Sync {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError>;

    /// Most-recent-first listing, optionally filtered by service.
    fn list(&self, limit: usize, service: Option<&str>) -> Result<Vec<AuditEntry>, AuditError>;

    /// Today's totals and per-service breakdown.
    fn stats(&self) -> Result<AuditStats, AuditError>;

    fn clear(&self) -> Result<(), AuditError>;
}

/// Shared stats fold used by both store implementations.
pub(crate) fn stats_over<'a>(entries: impl Iterator<Item = &'a AuditEntry>) -> AuditStats {
    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let mut stats = AuditStats::default();

    for entry in entries.filter(|entry| entry.timestamp.starts_with(&today)) {
        stats.total += 1;
        match entry.result {
            ActionResult::Success => stats.success += 1,
            ActionResult::Failed => stats.failed += 1,
            ActionResult::Denied | ActionResult::TimedOut => stats.denied += 1,
            ActionResult::Pending => {}
        }

        let per_service = stats
            .by_service
            .entry(entry.service.clone())
            .or_insert_with(|| ServiceStats {
                count: 0,
                failed: 0,
                label: entry.service_name.clone(),
            });
        per_service.count += 1;
        if entry.result == ActionResult::Failed {
            per_service.failed += 1;
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::{ActionResult, AuditEntry, stats_over};
    use crate::guardrail::access::AccessLevel;
    use crate::guardrail::risk::RiskLevel;

    fn sample_entry(service: &str, action: &str, result: ActionResult) -> AuditEntry {
        AuditEntry::new(
            "scout",
            service,
            service,
            action,
            AccessLevel::Write,
            RiskLevel::Soft,
            result == ActionResult::Success,
            result,
        )
    }

    #[test]
    fn entry_ids_embed_service_and_action() {
        let entry = sample_entry("crm", "create deal", ActionResult::Pending);
        assert!(entry.id.starts_with("act_crm_create_deal_"));
    }

    #[test]
    fn entry_ids_are_unique() {
        let a = sample_entry("crm", "create_deal", ActionResult::Pending);
        let b = sample_entry("crm", "create_deal", ActionResult::Pending);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn stats_count_todays_entries_by_result() {
        let entries = vec![
            sample_entry("crm", "create_deal", ActionResult::Success),
            sample_entry("crm", "delete_deal", ActionResult::Denied),
            sample_entry("chat", "send_message", ActionResult::Failed),
            sample_entry("chat", "send_message", ActionResult::Pending),
        ];
        let stats = stats_over(entries.iter());

        assert_eq!(stats.total, 4);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.denied, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.by_service["crm"].count, 2);
        assert_eq!(stats.by_service["chat"].failed, 1);
    }

    #[test]
    fn stats_skip_entries_from_other_days() {
        let mut old = sample_entry("crm", "create_deal", ActionResult::Success);
        old.timestamp = "2001-01-01T00:00:00Z".to_string();
        let stats = stats_over([old].iter());
        assert_eq!(stats.total, 0);
    }

    #[test]
    fn action_result_round_trips_through_strings() {
        assert_eq!(
            "timed_out".parse::<ActionResult>().unwrap(),
            ActionResult::TimedOut
        );
        assert_eq!(ActionResult::Denied.to_string(), "denied");
    }
}
