pub mod schema;

pub use schema::{AuditBackend, AuditConfig, Config, GuardrailConfig};
