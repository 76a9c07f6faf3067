use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Service name used as the fallback for services without their own entry.
pub const WILDCARD_SERVICE: &str = "*";

const DEFAULT_MAX_ACTIONS: u32 = 50;
const DEFAULT_WINDOW_MINUTES: u32 = 15;

/// Per-service rate window configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub service: String,
    pub max_actions: u32,
    pub window_minutes: u32,
}

impl RateLimitConfig {
    pub fn new(service: impl Into<String>, max_actions: u32, window_minutes: u32) -> Self {
        Self {
            service: service.into(),
            max_actions,
            window_minutes,
        }
    }

    /// The wildcard fallback applied to services with no config entry.
    #[must_use]
    pub fn wildcard_default() -> Self {
        Self::new(WILDCARD_SERVICE, DEFAULT_MAX_ACTIONS, DEFAULT_WINDOW_MINUTES)
    }

    fn window_length(&self) -> Duration {
        Duration::from_millis(u64::from(self.window_minutes) * 60_000)
    }
}

/// Outcome of a rate check. `remaining` is quota left after this attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

/// Snapshot of a live window, for status displays.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    pub service: String,
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    pub window_age: Duration,
}

/// Fixed-window rate limiter keyed by service.
///
/// Every call to [`check_and_record`](Self::check_and_record) consumes one
/// unit of quota, including calls whose action is later denied downstream.
/// There is deliberately no peek operation; callers rely on the
/// at-least-once-consumed semantic to throttle repeated attempts.
#[derive(Debug)]
pub struct ServiceRateLimiter {
    configs: HashMap<String, RateLimitConfig>,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl ServiceRateLimiter {
    pub fn new(configs: Vec<RateLimitConfig>) -> Self {
        Self {
            configs: configs
                .into_iter()
                .map(|config| (config.service.clone(), config))
                .collect(),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one attempt against `service` and report whether it is allowed.
    pub fn check_and_record(
        &self,
        service: &str,
        config_override: Option<&RateLimitConfig>,
    ) -> RateDecision {
        self.check_and_record_at(service, config_override, Instant::now())
    }

    pub(crate) fn check_and_record_at(
        &self,
        service: &str,
        config_override: Option<&RateLimitConfig>,
        now: Instant,
    ) -> RateDecision {
        let config = self.resolve_config(service, config_override);
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let window = windows
            .entry(service.to_string())
            .or_insert(RateWindow {
                count: 0,
                window_start: now,
            });

        if now.duration_since(window.window_start) > config.window_length() {
            window.count = 0;
            window.window_start = now;
        }

        window.count += 1;

        RateDecision {
            allowed: window.count <= config.max_actions,
            remaining: config.max_actions.saturating_sub(window.count),
            limit: config.max_actions,
        }
    }

    /// Clear the live window for `service`, fully restoring its quota.
    pub fn reset(&self, service: &str) {
        self.windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(service);
    }

    /// Hand back `extra` units of quota without touching the window start.
    /// A one-time manual override, not a permanent limit increase.
    pub fn bump(&self, service: &str, extra: u32) {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(window) = windows.get_mut(service) {
            window.count = window.count.saturating_sub(extra);
        }
    }

    /// Snapshot of all live windows, for status displays.
    #[must_use]
    pub fn windows(&self) -> Vec<WindowSnapshot> {
        self.windows_at(Instant::now())
    }

    pub(crate) fn windows_at(&self, now: Instant) -> Vec<WindowSnapshot> {
        let windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut snapshots: Vec<WindowSnapshot> = windows
            .iter()
            .map(|(service, window)| {
                let config = self.resolve_config(service, None);
                WindowSnapshot {
                    service: service.clone(),
                    count: window.count,
                    limit: config.max_actions,
                    remaining: config.max_actions.saturating_sub(window.count),
                    window_age: now.duration_since(window.window_start),
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.service.cmp(&b.service));
        snapshots
    }

    /// Effective config for `service`: explicit override, then the per-service
    /// table entry, then the wildcard entry, then the built-in default.
    #[must_use]
    pub fn resolve_config(
        &self,
        service: &str,
        config_override: Option<&RateLimitConfig>,
    ) -> RateLimitConfig {
        if let Some(config) = config_override {
            return config.clone();
        }
        self.configs
            .get(service)
            .or_else(|| self.configs.get(WILDCARD_SERVICE))
            .cloned()
            .unwrap_or_else(RateLimitConfig::wildcard_default)
    }

    #[cfg(test)]
    fn window_start(&self, service: &str) -> Option<Instant> {
        self.windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(service)
            .map(|window| window.window_start)
    }
}
