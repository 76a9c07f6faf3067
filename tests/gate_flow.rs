//! Cross-layer flows: config -> guardrail -> audit, through the public API.

use actiongate::app::dispatch::build_guardrail;
use actiongate::audit::ActionResult;
use actiongate::guardrail::RateLimitConfig;
use actiongate::{
    AccessLevel, ActionRequest, ConfirmOptions, Config, GateVerdict, Guardrail, HumanDecision,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn request(id: &str, agent: &str, service: &str, action: &str) -> ActionRequest {
    ActionRequest {
        id: id.to_string(),
        agent: agent.to_string(),
        service: service.to_string(),
        service_name: service.to_string(),
        action: action.to_string(),
        risk: None,
        target: None,
        preview: None,
    }
}

async fn wait_for_pending(guardrail: &Guardrail, id: &str) {
    for _ in 0..200 {
        if guardrail.pending_ids().iter().any(|pending| pending == id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("confirmation '{id}' never became pending");
}

#[tokio::test]
async fn approved_action_is_ledgered_in_the_sqlite_store() {
    let tmp = TempDir::new().expect("tempdir");
    let config = Config::load_or_init_at(tmp.path()).expect("init config");
    let guardrail = Arc::new(build_guardrail(&config).expect("build guardrail"));

    let pending_request = request("req-1", "scout", "crm", "create_deal");
    let gate = tokio::spawn({
        let guardrail = Arc::clone(&guardrail);
        let pending_request = pending_request.clone();
        async move {
            guardrail
                .confirm_action(&pending_request, &ConfirmOptions::default())
                .await
        }
    });

    wait_for_pending(&guardrail, "req-1").await;
    assert!(guardrail.resolve("req-1", HumanDecision::Approve));
    let verdict = gate.await.expect("join").expect("gate");
    assert!(verdict.allowed());

    // a second guardrail over the same workspace sees the persisted ledger
    let reopened = build_guardrail(&config).expect("rebuild guardrail");
    let entries = reopened.audit().list(10, None).expect("list");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].result, ActionResult::Success);
    assert_eq!(entries[1].result, ActionResult::Pending);
    assert_eq!(entries[0].service, "crm");
}

#[tokio::test]
async fn read_only_agent_can_list_but_not_create() {
    let tmp = TempDir::new().expect("tempdir");
    let config = Config::load_or_init_at(tmp.path()).expect("init config");
    let guardrail = build_guardrail(&config).expect("build guardrail");

    guardrail
        .access()
        .set_level("scout", "crm", AccessLevel::Read)
        .expect("assign read access");

    let denied = guardrail
        .confirm_action(
            &request("req-1", "scout", "crm", "create_deal"),
            &ConfirmOptions::default(),
        )
        .await
        .expect("gate");
    assert_eq!(
        denied,
        GateVerdict::PolicyDenied {
            access: AccessLevel::Read
        }
    );

    let allowed = guardrail
        .confirm_action(
            &request("req-2", "scout", "crm", "list_deals"),
            &ConfirmOptions::default(),
        )
        .await
        .expect("gate");
    assert_eq!(allowed, GateVerdict::AutoApproved);
}

#[tokio::test]
async fn access_assignments_survive_a_guardrail_rebuild() {
    let tmp = TempDir::new().expect("tempdir");
    let config = Config::load_or_init_at(tmp.path()).expect("init config");

    build_guardrail(&config)
        .expect("build guardrail")
        .access()
        .set_level("scout", "crm", AccessLevel::None)
        .expect("assign none access");

    let reopened = build_guardrail(&config).expect("rebuild guardrail");
    let verdict = reopened
        .confirm_action(
            &request("req-1", "scout", "crm", "list_deals"),
            &ConfirmOptions::default(),
        )
        .await
        .expect("gate");
    assert_eq!(
        verdict,
        GateVerdict::PolicyDenied {
            access: AccessLevel::None
        }
    );
}

#[tokio::test]
async fn configured_window_denies_after_quota_is_spent() {
    let tmp = TempDir::new().expect("tempdir");
    let mut config = Config::load_or_init_at(tmp.path()).expect("init config");
    config.guardrail.limits = vec![RateLimitConfig::new("crm", 2, 15)];
    let guardrail = build_guardrail(&config).expect("build guardrail");

    for id in ["req-1", "req-2"] {
        let verdict = guardrail
            .confirm_action(
                &request(id, "scout", "crm", "list_deals"),
                &ConfirmOptions::default(),
            )
            .await
            .expect("gate");
        assert_eq!(verdict, GateVerdict::AutoApproved);
    }

    let verdict = guardrail
        .confirm_action(
            &request("req-3", "scout", "crm", "list_deals"),
            &ConfirmOptions::default(),
        )
        .await
        .expect("gate");
    assert_eq!(
        verdict,
        GateVerdict::RateLimited {
            remaining: 0,
            limit: 2
        }
    );

    // other services are unaffected by crm's exhausted window
    let verdict = guardrail
        .confirm_action(
            &request("req-4", "scout", "chat", "list_messages"),
            &ConfirmOptions::default(),
        )
        .await
        .expect("gate");
    assert_eq!(verdict, GateVerdict::AutoApproved);
}

#[tokio::test]
async fn audit_clear_empties_the_persisted_ledger() {
    let tmp = TempDir::new().expect("tempdir");
    let config = Config::load_or_init_at(tmp.path()).expect("init config");
    let guardrail = build_guardrail(&config).expect("build guardrail");

    for id in ["req-1", "req-2", "req-3"] {
        guardrail
            .confirm_action(
                &request(id, "scout", "crm", "list_deals"),
                &ConfirmOptions::default(),
            )
            .await
            .expect("gate");
    }
    assert_eq!(guardrail.audit().list(10, None).expect("list").len(), 3);

    guardrail.audit().clear().expect("clear");
    assert!(guardrail.audit().list(10, None).expect("list").is_empty());
}
