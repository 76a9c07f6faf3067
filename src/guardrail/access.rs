use crate::guardrail::risk::RiskLevel;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Access tier granted to an agent for one service, independent of rate
/// limiting. Both gates must pass for an action to proceed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AccessLevel {
    None,
    Read,
    Write,
    Full,
}

/// Maps an access tier and a risk tier to an allow/deny decision.
///
/// By default a `write` grant still gates `hard`-risk (destructive) actions
/// behind `full`; set `write_allows_hard` to let `write` cover them too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default)]
    pub write_allows_hard: bool,
}

impl AccessPolicy {
    #[must_use]
    pub fn is_allowed(&self, level: AccessLevel, risk: RiskLevel) -> bool {
        match level {
            AccessLevel::None => false,
            AccessLevel::Full => true,
            AccessLevel::Read => risk == RiskLevel::Auto,
            AccessLevel::Write => self.write_allows_hard || risk != RiskLevel::Hard,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct AccessFile {
    #[serde(default)]
    grants: Vec<StoredAccess>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAccess {
    agent: String,
    service: String,
    level: AccessLevel,
    granted_at: String,
}

/// Per-(agent, service) access assignments, persisted to `access.toml` in the
/// workspace directory. Unknown pairs fall back to the configured default
/// level.
#[derive(Debug)]
pub struct AccessStore {
    levels: Mutex<HashMap<(String, String), AccessLevel>>,
    records: Mutex<Vec<StoredAccess>>,
    default_level: AccessLevel,
    store_path: PathBuf,
}

impl AccessStore {
    pub fn load(workspace_dir: &Path, default_level: AccessLevel) -> Self {
        let store_path = workspace_dir.join("access.toml");
        let access_file = match fs::read_to_string(&store_path) {
            Ok(content) => {
                if content.trim().is_empty() {
                    AccessFile::default()
                } else {
                    toml::from_str(&content).unwrap_or_else(|error| {
                        tracing::warn!(
                            path = %store_path.display(),
                            %error,
                            "failed to parse access.toml; starting with empty grants"
                        );
                        AccessFile::default()
                    })
                }
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => AccessFile::default(),
            Err(error) => {
                tracing::warn!(
                    path = %store_path.display(),
                    %error,
                    "failed to read access.toml; starting with empty grants"
                );
                AccessFile::default()
            }
        };

        let levels = access_file
            .grants
            .iter()
            .map(|grant| {
                (
                    (grant.agent.clone(), grant.service.clone()),
                    grant.level,
                )
            })
            .collect();

        Self {
            levels: Mutex::new(levels),
            records: Mutex::new(access_file.grants),
            default_level,
            store_path,
        }
    }

    /// Effective access level for an agent on a service.
    #[must_use]
    pub fn level_for(&self, agent: &str, service: &str) -> AccessLevel {
        self.levels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(agent.to_string(), service.to_string()))
            .copied()
            .unwrap_or(self.default_level)
    }

    /// Assign an access level and persist the assignment.
    pub fn set_level(&self, agent: &str, service: &str, level: AccessLevel) -> Result<()> {
        anyhow::ensure!(!agent.trim().is_empty(), "agent must not be empty");
        anyhow::ensure!(!service.trim().is_empty(), "service must not be empty");

        let mut records = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut next_records: Vec<StoredAccess> = records
            .iter()
            .filter(|record| !(record.agent == agent && record.service == service))
            .cloned()
            .collect();
        next_records.push(StoredAccess {
            agent: agent.to_string(),
            service: service.to_string(),
            level,
            granted_at: Utc::now().to_rfc3339(),
        });
        persist_access_file(
            &self.store_path,
            &AccessFile {
                grants: next_records.clone(),
            },
        )?;
        *records = next_records;

        self.levels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((agent.to_string(), service.to_string()), level);
        Ok(())
    }

    /// All explicit assignments as (agent, service, level) tuples.
    #[must_use]
    pub fn assignments(&self) -> Vec<(String, String, AccessLevel)> {
        let mut assignments: Vec<(String, String, AccessLevel)> = self
            .levels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|((agent, service), level)| (agent.clone(), service.clone(), *level))
            .collect();
        assignments.sort();
        assignments
    }

    #[must_use]
    pub fn default_level(&self) -> AccessLevel {
        self.default_level
    }
}

fn persist_access_file(path: &Path, data: &AccessFile) -> Result<()> {
    let content = toml::to_string(data).context("failed to serialize access grants")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create access store parent directory '{}'",
                parent.display()
            )
        })?;
    }

    fs::write(path, content)
        .with_context(|| format!("failed to write access file '{}'", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to set permissions on '{}'", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AccessLevel, AccessPolicy, AccessStore};
    use crate::guardrail::risk::{RiskLevel, RiskMatcher};
    use tempfile::TempDir;

    #[test]
    fn none_denies_every_risk_tier() {
        let policy = AccessPolicy::default();
        for risk in [RiskLevel::Auto, RiskLevel::Soft, RiskLevel::Hard] {
            assert!(!policy.is_allowed(AccessLevel::None, risk));
        }
    }

    #[test]
    fn full_allows_every_risk_tier() {
        let policy = AccessPolicy::default();
        for risk in [RiskLevel::Auto, RiskLevel::Soft, RiskLevel::Hard] {
            assert!(policy.is_allowed(AccessLevel::Full, risk));
        }
    }

    #[test]
    fn read_allows_only_auto_actions() {
        let policy = AccessPolicy::default();
        let matcher = RiskMatcher::default();

        assert!(policy.is_allowed(AccessLevel::Read, matcher.classify("list_deals")));
        assert!(!policy.is_allowed(AccessLevel::Read, matcher.classify("create_deal")));
    }

    #[test]
    fn write_gates_hard_actions_by_default() {
        let policy = AccessPolicy::default();
        assert!(policy.is_allowed(AccessLevel::Write, RiskLevel::Auto));
        assert!(policy.is_allowed(AccessLevel::Write, RiskLevel::Soft));
        assert!(!policy.is_allowed(AccessLevel::Write, RiskLevel::Hard));
    }

    #[test]
    fn write_allows_hard_with_legacy_knob() {
        let policy = AccessPolicy {
            write_allows_hard: true,
        };
        assert!(policy.is_allowed(AccessLevel::Write, RiskLevel::Hard));
    }

    #[test]
    fn unknown_pair_falls_back_to_default_level() {
        let tmp = TempDir::new().expect("tempdir");
        let store = AccessStore::load(tmp.path(), AccessLevel::Read);
        assert_eq!(store.level_for("scout", "crm"), AccessLevel::Read);
    }

    #[test]
    fn set_level_persists_across_reload() {
        let tmp = TempDir::new().expect("tempdir");
        let store = AccessStore::load(tmp.path(), AccessLevel::None);
        store
            .set_level("scout", "crm", AccessLevel::Write)
            .expect("set level");

        let reloaded = AccessStore::load(tmp.path(), AccessLevel::None);
        assert_eq!(reloaded.level_for("scout", "crm"), AccessLevel::Write);
        assert_eq!(reloaded.level_for("scout", "chat"), AccessLevel::None);
    }

    #[test]
    fn set_level_replaces_previous_assignment() {
        let tmp = TempDir::new().expect("tempdir");
        let store = AccessStore::load(tmp.path(), AccessLevel::None);
        store
            .set_level("scout", "crm", AccessLevel::Full)
            .expect("set level");
        store
            .set_level("scout", "crm", AccessLevel::Read)
            .expect("replace level");

        assert_eq!(store.level_for("scout", "crm"), AccessLevel::Read);
        assert_eq!(store.assignments().len(), 1);
    }

    #[test]
    fn empty_agent_is_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let store = AccessStore::load(tmp.path(), AccessLevel::None);
        assert!(store.set_level("  ", "crm", AccessLevel::Read).is_err());
    }

    #[test]
    fn access_level_round_trips_through_strings() {
        assert_eq!("write".parse::<AccessLevel>().unwrap(), AccessLevel::Write);
        assert_eq!(AccessLevel::Full.to_string(), "full");
    }
}
