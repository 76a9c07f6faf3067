use crate::guardrail::{
    AccessLevel, AccessPolicy, RateLimitConfig, RiskRule, default_risk_rules,
};
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration, persisted as `~/.actiongate/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Set from the load path, never serialized.
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Holds the access store and audit database.
    #[serde(skip)]
    pub workspace_dir: PathBuf,

    #[serde(default)]
    pub guardrail: GuardrailConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Access level assumed for (agent, service) pairs with no explicit
    /// assignment.
    #[serde(default = "default_access_level")]
    pub default_access_level: AccessLevel,

    /// Deadline the CLI front-end applies to interactive confirmations. The
    /// library itself waits indefinitely unless the caller passes a timeout.
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,

    // tables last so toml serialization never emits a value after a table
    #[serde(default)]
    pub policy: AccessPolicy,

    /// Per-service rate windows; the `*` entry is the fallback.
    #[serde(default = "default_service_limits")]
    pub limits: Vec<RateLimitConfig>,

    /// Ordered substring classification table, strictest tier first.
    #[serde(default = "default_risk_rules")]
    pub risk_rules: Vec<RiskRule>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            default_access_level: default_access_level(),
            policy: AccessPolicy::default(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
            limits: default_service_limits(),
            risk_rules: default_risk_rules(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditBackend {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub backend: AuditBackend,

    /// Sqlite file, relative to the workspace directory.
    #[serde(default = "default_audit_db_file")]
    pub db_file: String,

    #[serde(default = "default_list_limit")]
    pub default_list_limit: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            backend: AuditBackend::default(),
            db_file: default_audit_db_file(),
            default_list_limit: default_list_limit(),
        }
    }
}

fn default_access_level() -> AccessLevel {
    AccessLevel::Write
}

fn default_confirm_timeout_secs() -> u64 {
    120
}

fn default_audit_db_file() -> String {
    "audit.db".to_string()
}

fn default_list_limit() -> usize {
    50
}

/// Seeded windows for the services the assistant ships integrations for; the
/// wildcard covers everything else.
fn default_service_limits() -> Vec<RateLimitConfig> {
    vec![
        RateLimitConfig::new("*", 50, 15),
        RateLimitConfig::new("email", 10, 15),
        RateLimitConfig::new("slack", 30, 15),
        RateLimitConfig::new("discord", 30, 15),
        RateLimitConfig::new("github", 40, 15),
        RateLimitConfig::new("n8n", 20, 15),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            workspace_dir: PathBuf::new(),
            guardrail: GuardrailConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .context("could not find home directory")?;
        Self::load_or_init_at(&home.join(".actiongate"))
    }

    /// Load from (or initialize) an explicit base directory. Split out so
    /// tests can run against a tempdir.
    pub fn load_or_init_at(base_dir: &Path) -> Result<Self> {
        let config_path = base_dir.join("config.toml");
        let workspace_dir = base_dir.join("workspace");

        if !workspace_dir.exists() {
            fs::create_dir_all(&workspace_dir)
                .context("failed to create workspace directory")?;
        }

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("failed to parse config file")?;
            config.config_path = config_path;
            config.workspace_dir = workspace_dir;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                workspace_dir,
                ..Self::default()
            };
            config.validate()?;
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("failed to serialize config")?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        fs::write(&self.config_path, toml_str).context("failed to write config file")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.guardrail.confirm_timeout_secs == 0 {
            anyhow::bail!("guardrail.confirm_timeout_secs must be >= 1");
        }
        for limit in &self.guardrail.limits {
            if limit.service.trim().is_empty() {
                anyhow::bail!("guardrail.limits entries must name a service");
            }
            if limit.max_actions == 0 {
                anyhow::bail!(
                    "guardrail.limits['{}'].max_actions must be >= 1",
                    limit.service
                );
            }
            if limit.window_minutes == 0 {
                anyhow::bail!(
                    "guardrail.limits['{}'].window_minutes must be >= 1",
                    limit.service
                );
            }
        }
        for rule in &self.guardrail.risk_rules {
            if rule.pattern.trim().is_empty() {
                anyhow::bail!("guardrail.risk_rules patterns must not be empty");
            }
        }
        if self.audit.db_file.trim().is_empty() {
            anyhow::bail!("audit.db_file must not be empty");
        }
        Ok(())
    }

    /// Absolute path of the audit database.
    #[must_use]
    pub fn audit_db_path(&self) -> PathBuf {
        self.workspace_dir.join(&self.audit.db_file)
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditBackend, Config};
    use crate::guardrail::{AccessLevel, RiskLevel};
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_defaults_to_disk() {
        let tmp = TempDir::new().expect("tempdir");
        let config = Config::load_or_init_at(tmp.path()).expect("init");

        assert!(tmp.path().join("config.toml").exists());
        assert!(tmp.path().join("workspace").exists());
        assert_eq!(config.guardrail.default_access_level, AccessLevel::Write);
        assert_eq!(config.audit.backend, AuditBackend::Sqlite);
    }

    #[test]
    fn defaults_include_wildcard_limit_entry() {
        let config = Config::default();
        assert!(
            config
                .guardrail
                .limits
                .iter()
                .any(|limit| limit.service == "*" && limit.max_actions == 50
                    && limit.window_minutes == 15)
        );
    }

    #[test]
    fn second_load_round_trips_the_saved_file() {
        let tmp = TempDir::new().expect("tempdir");
        let mut config = Config::load_or_init_at(tmp.path()).expect("init");
        config.guardrail.confirm_timeout_secs = 45;
        config.save().expect("save");

        let reloaded = Config::load_or_init_at(tmp.path()).expect("reload");
        assert_eq!(reloaded.guardrail.confirm_timeout_secs, 45);
    }

    #[test]
    fn zero_window_fails_validation() {
        let mut config = Config::default();
        config.guardrail.limits[0].window_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_actions_fails_validation() {
        let mut config = Config::default();
        config.guardrail.limits[0].max_actions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_risk_pattern_fails_validation() {
        let mut config = Config::default();
        config.guardrail.risk_rules[0].pattern = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_risk_rules_parse_from_toml_round_trip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).expect("serialize");
        let parsed: Config = toml::from_str(&serialized).expect("parse");
        assert_eq!(parsed.guardrail.risk_rules, config.guardrail.risk_rules);
        assert_eq!(
            parsed
                .guardrail
                .risk_rules
                .iter()
                .find(|rule| rule.pattern == "delete")
                .map(|rule| rule.level),
            Some(RiskLevel::Hard)
        );
    }

    #[test]
    fn audit_db_path_is_inside_the_workspace() {
        let tmp = TempDir::new().expect("tempdir");
        let config = Config::load_or_init_at(tmp.path()).expect("init");
        assert!(config.audit_db_path().starts_with(tmp.path()));
    }
}
