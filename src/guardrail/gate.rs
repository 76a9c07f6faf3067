use crate::error::{GateError, GuardrailError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

/// A human's response to a confirmation card. Anything other than `Approve`
/// resolves the gated action to denied; `Edit` is an implicit cancel of the
/// current request (the caller re-requests with modified parameters).
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
pub enum HumanDecision {
    Approve,
    Edit,
    Cancel,
}

/// How a wait for a human decision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Decided(HumanDecision),
    TimedOut,
    /// The resolver was dropped without a decision (session teardown).
    Abandoned,
}

/// Outstanding confirmation requests, keyed by caller-supplied id.
///
/// N requests can be pending simultaneously; each is resolved independently
/// by its own id. Resolving one never disturbs another.
#[derive(Debug, Default)]
pub struct PendingConfirmations {
    resolvers: Mutex<HashMap<String, oneshot::Sender<HumanDecision>>>,
}

impl PendingConfirmations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending confirmation and hand back the receiver to await.
    /// A duplicate id is a caller bug and is rejected rather than silently
    /// replacing the earlier resolver.
    pub fn register(&self, id: &str) -> Result<oneshot::Receiver<HumanDecision>, GateError> {
        let mut resolvers = self
            .resolvers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if resolvers.contains_key(id) {
            return Err(GuardrailError::DuplicatePending(id.to_string()).into());
        }
        let (tx, rx) = oneshot::channel();
        resolvers.insert(id.to_string(), tx);
        Ok(rx)
    }

    /// Resolve one pending confirmation. Returns false when no request with
    /// that id is waiting (already resolved, timed out, or never existed).
    pub fn resolve(&self, id: &str, decision: HumanDecision) -> bool {
        let sender = self
            .resolvers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(id);
        match sender {
            Some(tx) => tx.send(decision).is_ok(),
            None => false,
        }
    }

    /// Drop a resolver without deciding (timeout cleanup).
    pub fn remove(&self, id: &str) {
        self.resolvers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(id);
    }

    /// Resolve every outstanding confirmation to `Cancel`. Call on view or
    /// session teardown so no awaiting future is left pending forever.
    pub fn cancel_all(&self) -> usize {
        let resolvers: Vec<(String, oneshot::Sender<HumanDecision>)> = self
            .resolvers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain()
            .collect();
        let cancelled = resolvers.len();
        for (id, tx) in resolvers {
            if tx.send(HumanDecision::Cancel).is_err() {
                tracing::debug!(%id, "pending confirmation already dropped its receiver");
            }
        }
        cancelled
    }

    /// Ids of all outstanding confirmations, for UI listings.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .resolvers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Await a registered decision, with an optional deadline. Without a deadline
/// the wait is unbounded, matching the behavior of the UI confirmation card.
pub async fn await_decision(
    receiver: oneshot::Receiver<HumanDecision>,
    deadline: Option<Duration>,
) -> WaitOutcome {
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, receiver).await {
            Ok(Ok(decision)) => WaitOutcome::Decided(decision),
            Ok(Err(_)) => WaitOutcome::Abandoned,
            Err(_) => WaitOutcome::TimedOut,
        },
        None => match receiver.await {
            Ok(decision) => WaitOutcome::Decided(decision),
            Err(_) => WaitOutcome::Abandoned,
        },
    }
}
