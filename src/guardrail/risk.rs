use serde::{Deserialize, Serialize};

/// Risk tier of an integration action.
///
/// `Auto` actions run without a human gate, `Soft` actions show a lightweight
/// preview confirmation, `Hard` actions require explicit confirmation and can
/// never be skipped.
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
pub enum RiskLevel {
    Auto,
    Soft,
    Hard,
}

/// One substring rule of the classification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRule {
    pub pattern: String,
    pub level: RiskLevel,
}

impl RiskRule {
    pub fn new(pattern: impl Into<String>, level: RiskLevel) -> Self {
        Self {
            pattern: pattern.into(),
            level,
        }
    }
}

/// Ordered substring classifier for action verbs.
///
/// Rules are scanned in order and the first match wins, so the table must be
/// ordered strictest tier first (hard, then soft, then auto) with longer
/// patterns ahead of their substrings within a tier. A verb matching no rule
/// classifies as `Soft`: unknown actions always require confirmation, never
/// fail open to `Auto`.
#[derive(Debug, Clone)]
pub struct RiskMatcher {
    rules: Vec<RiskRule>,
}

impl RiskMatcher {
    pub fn new(rules: Vec<RiskRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn classify(&self, action_verb: &str) -> RiskLevel {
        let verb = action_verb.to_lowercase();
        self.rules
            .iter()
            .find(|rule| verb.contains(&rule.pattern))
            .map_or(RiskLevel::Soft, |rule| rule.level)
    }

    #[must_use]
    pub fn rules(&self) -> &[RiskRule] {
        &self.rules
    }
}

impl Default for RiskMatcher {
    fn default() -> Self {
        Self::new(default_risk_rules())
    }
}

/// Built-in classification table. Hard rules first so verbs like
/// "bulk_send" resolve to the stricter tier before the "send" rule is
/// reached.
#[must_use]
pub fn default_risk_rules() -> Vec<RiskRule> {
    use RiskLevel::{Auto, Hard, Soft};
    [
        // destructive or irreversible
        ("bulk_delete", Hard),
        ("bulk_send", Hard),
        ("delete", Hard),
        ("destroy", Hard),
        ("remove", Hard),
        ("revoke", Hard),
        ("transfer", Hard),
        ("purge", Hard),
        ("wipe", Hard),
        ("drop", Hard),
        ("pay", Hard),
        // mutating, previewable
        ("publish", Soft),
        ("archive", Soft),
        ("create", Soft),
        ("update", Soft),
        ("upload", Soft),
        ("invite", Soft),
        ("write", Soft),
        ("reply", Soft),
        ("send", Soft),
        ("post", Soft),
        ("move", Soft),
        ("add", Soft),
        // read-only
        ("download", Auto),
        ("preview", Auto),
        ("search", Auto),
        ("count", Auto),
        ("fetch", Auto),
        ("list", Auto),
        ("read", Auto),
        ("view", Auto),
        ("get", Auto),
    ]
    .into_iter()
    .map(|(pattern, level)| RiskRule::new(pattern, level))
    .collect()
}
