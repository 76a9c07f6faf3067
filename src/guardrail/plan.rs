use crate::guardrail::risk::{RiskLevel, RiskMatcher};
use serde::{Deserialize, Serialize};

/// Plans longer than this require confirmation regardless of per-step risk.
pub const PLAN_STEP_THRESHOLD: usize = 3;

/// One proposed action inside a dry-run plan. `risk` may be precomputed by
/// the caller; otherwise it is classified from the action verb at review
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub service: String,
    pub action: String,
    #[serde(default)]
    pub risk: Option<RiskLevel>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// An ordered batch of proposed actions, reviewable before bulk execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunPlan {
    pub id: String,
    pub agent: String,
    pub steps: Vec<PlanStep>,
}

impl DryRunPlan {
    /// Risk tier of one step: the precomputed tier wins, otherwise the verb
    /// is classified.
    #[must_use]
    pub fn step_risk(step: &PlanStep, matcher: &RiskMatcher) -> RiskLevel {
        step.risk.unwrap_or_else(|| matcher.classify(&step.action))
    }

    /// Per-step risk tiers in plan order, for review rendering.
    #[must_use]
    pub fn annotated_risks(&self, matcher: &RiskMatcher) -> Vec<RiskLevel> {
        self.steps
            .iter()
            .map(|step| Self::step_risk(step, matcher))
            .collect()
    }

    /// A plan requires hard confirmation when any step is `Hard` risk or the
    /// plan exceeds [`PLAN_STEP_THRESHOLD`] steps.
    #[must_use]
    pub fn requires_confirmation(&self, matcher: &RiskMatcher) -> bool {
        self.steps.len() > PLAN_STEP_THRESHOLD
            || self
                .steps
                .iter()
                .any(|step| Self::step_risk(step, matcher) == RiskLevel::Hard)
    }
}

#[cfg(test)]
mod tests {
    use super::{DryRunPlan, PlanStep};
    use crate::guardrail::risk::{RiskLevel, RiskMatcher};

    fn step(action: &str) -> PlanStep {
        PlanStep {
            service: "crm".to_string(),
            action: action.to_string(),
            risk: None,
            summary: None,
        }
    }

    fn plan(steps: Vec<PlanStep>) -> DryRunPlan {
        DryRunPlan {
            id: "plan-1".to_string(),
            agent: "scout".to_string(),
            steps,
        }
    }

    #[test]
    fn four_auto_steps_exceed_the_threshold() {
        let matcher = RiskMatcher::default();
        let plan = plan(vec![
            step("list_deals"),
            step("get_contact"),
            step("list_notes"),
            step("fetch_owner"),
        ]);
        assert!(plan.requires_confirmation(&matcher));
    }

    #[test]
    fn single_hard_step_requires_confirmation() {
        let matcher = RiskMatcher::default();
        let plan = plan(vec![step("delete_record")]);
        assert!(plan.requires_confirmation(&matcher));
    }

    #[test]
    fn two_auto_steps_do_not_require_confirmation() {
        let matcher = RiskMatcher::default();
        let plan = plan(vec![step("list_deals"), step("get_contact")]);
        assert!(!plan.requires_confirmation(&matcher));
    }

    #[test]
    fn precomputed_risk_wins_over_classification() {
        let matcher = RiskMatcher::default();
        let mut hard_listed = step("list_deals");
        hard_listed.risk = Some(RiskLevel::Hard);
        let plan = plan(vec![hard_listed]);
        assert!(plan.requires_confirmation(&matcher));
    }

    #[test]
    fn annotated_risks_follow_plan_order() {
        let matcher = RiskMatcher::default();
        let plan = plan(vec![step("list_deals"), step("create_deal"), step("delete_deal")]);
        assert_eq!(
            plan.annotated_risks(&matcher),
            vec![RiskLevel::Auto, RiskLevel::Soft, RiskLevel::Hard]
        );
    }

    #[test]
    fn plan_round_trips_through_json() {
        let plan = plan(vec![step("send_message")]);
        let json = serde_json::to_string(&plan).expect("serialize plan");
        let decoded: DryRunPlan = serde_json::from_str(&json).expect("deserialize plan");
        assert_eq!(decoded.steps.len(), 1);
        assert_eq!(decoded.steps[0].action, "send_message");
    }
}
