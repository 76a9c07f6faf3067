#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod guardrail;

pub use config::Config;
pub use error::{GateError, Result};
pub use guardrail::{
    AccessLevel, AccessPolicy, ActionRequest, ConfirmOptions, DryRunPlan, GateVerdict, Guardrail,
    HumanDecision, RiskLevel, RiskMatcher,
};
