pub mod access;
pub mod gate;
pub mod limiter;
pub mod plan;
pub mod risk;

pub use access::{AccessLevel, AccessPolicy, AccessStore};
pub use gate::{HumanDecision, PendingConfirmations, WaitOutcome};
pub use limiter::{RateDecision, RateLimitConfig, ServiceRateLimiter, WILDCARD_SERVICE};
pub use plan::{DryRunPlan, PLAN_STEP_THRESHOLD, PlanStep};
pub use risk::{RiskLevel, RiskMatcher, RiskRule, default_risk_rules};

use crate::audit::{ActionResult, AuditEntry, AuditStore, MemoryAuditStore};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Caller-supplied description of a proposed integration action. Ephemeral,
/// constructed per call; only its audit trail outlives the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Unique per outstanding request; keys the pending confirmation.
    pub id: String,
    pub agent: String,
    pub service: String,
    #[serde(rename = "serviceName")]
    pub service_name: String,
    pub action: String,
    /// Precomputed risk tier; classified from the verb when absent.
    #[serde(default)]
    pub risk: Option<RiskLevel>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

/// Per-call knobs for [`Guardrail::confirm_action`].
#[derive(Debug, Clone, Default)]
pub struct ConfirmOptions {
    /// Deadline for the human wait. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// One-off rate config, bypassing the configured table.
    pub rate_override: Option<RateLimitConfig>,
}

/// Terminal disposition of a gated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    /// `Auto` risk and both checks passed; no human was consulted.
    AutoApproved,
    Approved,
    /// Human cancelled or edited the request.
    Denied,
    /// The agent's access level does not cover the action's risk tier.
    PolicyDenied { access: AccessLevel },
    /// Window quota exhausted; the attempt itself still consumed one unit.
    RateLimited { remaining: u32, limit: u32 },
    TimedOut,
}

impl GateVerdict {
    /// The boolean the caller ultimately acts on: execute iff true.
    #[must_use]
    pub fn allowed(&self) -> bool {
        matches!(self, Self::AutoApproved | Self::Approved)
    }
}

/// The integration action guardrail: classifies risk, enforces per-service
/// rate windows, evaluates access policy, gates execution behind human
/// confirmation, and records every disposition in the audit log.
///
/// All state is owned by the instance; construct one per session and call
/// [`cancel_all`](Self::cancel_all) on teardown so no confirmation future is
/// left pending.
pub struct Guardrail {
    matcher: RiskMatcher,
    policy: AccessPolicy,
    limiter: ServiceRateLimiter,
    access: AccessStore,
    pending: PendingConfirmations,
    audit: Arc<dyn AuditStore>,
    fallback: MemoryAuditStore,
}

impl Guardrail {
    pub fn new(
        matcher: RiskMatcher,
        policy: AccessPolicy,
        limiter: ServiceRateLimiter,
        access: AccessStore,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            matcher,
            policy,
            limiter,
            access,
            pending: PendingConfirmations::new(),
            audit,
            fallback: MemoryAuditStore::new(),
        }
    }

    /// Effective risk tier for a request: a caller-supplied tier wins over
    /// classification.
    #[must_use]
    pub fn effective_risk(&self, request: &ActionRequest) -> RiskLevel {
        request
            .risk
            .unwrap_or_else(|| self.matcher.classify(&request.action))
    }

    /// Drive one action through the gate:
    /// rate check, access check, then (for non-`Auto` risk) an asynchronous
    /// wait for the human decision keyed by `request.id`.
    ///
    /// Rate-denied attempts return synchronously without creating a pending
    /// confirmation or an audit row; the consumed quota is the record.
    pub async fn confirm_action(
        &self,
        request: &ActionRequest,
        options: &ConfirmOptions,
    ) -> Result<GateVerdict> {
        let risk = self.effective_risk(request);

        let rate = self
            .limiter
            .check_and_record(&request.service, options.rate_override.as_ref());
        if !rate.allowed {
            tracing::warn!(
                service = %request.service,
                action = %request.action,
                limit = rate.limit,
                "action rate-limited"
            );
            return Ok(GateVerdict::RateLimited {
                remaining: rate.remaining,
                limit: rate.limit,
            });
        }

        let access = self.access.level_for(&request.agent, &request.service);
        if !self.policy.is_allowed(access, risk) {
            tracing::info!(
                agent = %request.agent,
                service = %request.service,
                action = %request.action,
                %access,
                %risk,
                "action denied by access policy"
            );
            self.record(self.entry(request, access, risk, false, ActionResult::Denied));
            return Ok(GateVerdict::PolicyDenied { access });
        }

        if risk == RiskLevel::Auto {
            self.record(self.entry(request, access, risk, true, ActionResult::Success));
            return Ok(GateVerdict::AutoApproved);
        }

        let receiver = self.pending.register(&request.id)?;
        self.record(self.entry(request, access, risk, false, ActionResult::Pending));
        tracing::debug!(
            id = %request.id,
            service = %request.service,
            action = %request.action,
            %risk,
            "awaiting human confirmation"
        );

        let verdict = match gate::await_decision(receiver, options.timeout).await {
            WaitOutcome::Decided(HumanDecision::Approve) => {
                self.record(self.entry(request, access, risk, true, ActionResult::Success));
                GateVerdict::Approved
            }
            WaitOutcome::Decided(HumanDecision::Edit | HumanDecision::Cancel)
            | WaitOutcome::Abandoned => {
                self.record(self.entry(request, access, risk, false, ActionResult::Denied));
                GateVerdict::Denied
            }
            WaitOutcome::TimedOut => {
                self.pending.remove(&request.id);
                self.record(self.entry(request, access, risk, false, ActionResult::TimedOut));
                GateVerdict::TimedOut
            }
        };
        Ok(verdict)
    }

    /// Resolve a pending confirmation by id. Returns false when nothing with
    /// that id is waiting.
    pub fn resolve(&self, id: &str, decision: HumanDecision) -> bool {
        self.pending.resolve(id, decision)
    }

    /// Resolve every outstanding confirmation to `Cancel`; call on session
    /// teardown.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.pending.cancel_all();
        if cancelled > 0 {
            tracing::info!(cancelled, "cancelled pending confirmations on teardown");
        }
        cancelled
    }

    #[must_use]
    pub fn pending_ids(&self) -> Vec<String> {
        self.pending.pending_ids()
    }

    /// Record the downstream execution outcome of an approved action.
    pub fn log_execution(&self, request: &ActionRequest, success: bool, duration_ms: u64) {
        let risk = self.effective_risk(request);
        let access = self.access.level_for(&request.agent, &request.service);
        let result = if success {
            ActionResult::Success
        } else {
            ActionResult::Failed
        };
        self.record(
            self.entry(request, access, risk, true, result)
                .with_duration(duration_ms),
        );
    }

    #[must_use]
    pub fn limiter(&self) -> &ServiceRateLimiter {
        &self.limiter
    }

    #[must_use]
    pub fn access(&self) -> &AccessStore {
        &self.access
    }

    #[must_use]
    pub fn matcher(&self) -> &RiskMatcher {
        &self.matcher
    }

    #[must_use]
    pub fn audit(&self) -> &dyn AuditStore {
        self.audit.as_ref()
    }

    /// Entries the audit store rejected, held in memory so nothing is
    /// silently lost.
    #[must_use]
    pub fn unflushed(&self) -> Vec<AuditEntry> {
        self.fallback.list(usize::MAX, None).unwrap_or_default()
    }

    fn entry(
        &self,
        request: &ActionRequest,
        access: AccessLevel,
        risk: RiskLevel,
        approved: bool,
        result: ActionResult,
    ) -> AuditEntry {
        AuditEntry::new(
            request.agent.clone(),
            request.service.clone(),
            request.service_name.clone(),
            request.action.clone(),
            access,
            risk,
            approved,
            result,
        )
    }

    fn record(&self, entry: AuditEntry) {
        if let Err(error) = self.audit.append(&entry) {
            tracing::warn!(
                %error,
                entry_id = %entry.id,
                "audit store rejected entry; holding in memory"
            );
            let _ = self.fallback.append(&entry);
        }
    }
}
