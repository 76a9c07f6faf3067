use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `actiongate`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum GateError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Guardrail / Gate ────────────────────────────────────────────────
    #[error("guardrail: {0}")]
    Guardrail(#[from] GuardrailError),

    // ── Audit log ───────────────────────────────────────────────────────
    #[error("audit: {0}")]
    Audit(#[from] AuditError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Guardrail errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GuardrailError {
    #[error("confirmation '{0}' is already pending")]
    DuplicatePending(String),

    #[error("no pending confirmation with id '{0}'")]
    UnknownPending(String),

    #[error("action '{action}' on {service} denied: {reason}")]
    Denied {
        service: String,
        action: String,
        reason: String,
    },
}

// ─── Audit errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("store: {0}")]
    Store(String),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, GateError>;
