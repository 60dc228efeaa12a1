//! Orchestrator behaviour against scripted completion clients.

use std::sync::Arc;

use mealplan_core::llm::UpstreamError;
use mealplan_core::orchestrator::{PlanError, PlanRequestOrchestrator, RequestSettings};
use mealplan_core::prompt::{SYSTEM_INSTRUCTION, build_prompt};
use mealplan_test_utils::{GatedClient, ScriptedClient, canned_reply, fenced, sample_profile};

fn orchestrator(client: Arc<ScriptedClient>) -> PlanRequestOrchestrator {
    PlanRequestOrchestrator::new(client, RequestSettings::default())
}

#[tokio::test]
async fn submit_installs_normalized_plan() {
    let profile = sample_profile();
    let client = Arc::new(ScriptedClient::replying(fenced(&canned_reply(&profile))));
    let orchestrator = orchestrator(client.clone());

    let installed = orchestrator.submit(&profile).await.unwrap();
    assert_eq!(installed.plan.days.len(), 2);
    assert!(installed.report.is_clean());
    assert_eq!(installed.plan.summary.display_name.as_deref(), Some("Asha"));

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].system, SYSTEM_INSTRUCTION);
    assert_eq!(requests[0].user, build_prompt(&profile));
    assert_eq!(requests[0].model, "gpt-4o-mini");

    let current = orchestrator.current().await.unwrap();
    assert!(Arc::ptr_eq(&current.plan, &installed.plan));
}

#[tokio::test]
async fn upstream_error_is_not_retried() {
    let client = Arc::new(ScriptedClient::new([
        Err(UpstreamError::Status {
            status: 429,
            detail: "rate limited".into(),
        }),
        Ok(canned_reply(&sample_profile())),
    ]));
    let orchestrator = orchestrator(client.clone());

    let err = orchestrator.submit(&sample_profile()).await.unwrap_err();
    assert!(matches!(err, PlanError::Upstream(_)));
    assert_eq!(client.call_count(), 1);
    assert!(orchestrator.current().await.is_none());
}

#[tokio::test]
async fn failed_resubmission_clears_previous_plan() {
    let profile = sample_profile();
    let client = Arc::new(ScriptedClient::new([
        Ok(canned_reply(&profile)),
        Ok("I'm sorry, I cannot help with that.".to_string()),
    ]));
    let orchestrator = orchestrator(client);

    orchestrator.submit(&profile).await.unwrap();
    assert!(orchestrator.current().await.is_some());

    let err = orchestrator.submit(&profile).await.unwrap_err();
    assert!(matches!(err, PlanError::Malformed(_)));
    assert!(orchestrator.current().await.is_none());
}

#[tokio::test]
async fn late_older_result_does_not_overwrite_newer() {
    let profile = sample_profile();
    let mut older_profile = profile.clone();
    older_profile.days = 1;

    let client = Arc::new(GatedClient::new([
        canned_reply(&older_profile),
        canned_reply(&profile),
    ]));
    let orchestrator = Arc::new(PlanRequestOrchestrator::new(
        client.clone(),
        RequestSettings::default(),
    ));

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let older_profile = older_profile.clone();
        async move { orchestrator.submit(&older_profile).await }
    });
    client.wait_for_calls(1).await;

    let second = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let profile = profile.clone();
        async move { orchestrator.submit(&profile).await }
    });
    client.wait_for_calls(2).await;

    // Newer request finishes first, then the older one arrives late.
    client.release(1);
    let newer = second.await.unwrap().unwrap();
    client.release(0);
    let older = first.await.unwrap();

    assert!(matches!(
        older,
        Err(PlanError::Superseded {
            ticket: 1,
            latest: 2
        })
    ));
    let current = orchestrator.current().await.unwrap();
    assert_eq!(current.id, newer.id);
    assert_eq!(current.plan.days.len(), 2);
}

#[tokio::test]
async fn older_result_is_discarded_even_when_it_finishes_first() {
    let profile = sample_profile();
    let client = Arc::new(GatedClient::new([
        canned_reply(&profile),
        canned_reply(&profile),
    ]));
    let orchestrator = Arc::new(PlanRequestOrchestrator::new(
        client.clone(),
        RequestSettings::default(),
    ));

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let profile = profile.clone();
        async move { orchestrator.submit(&profile).await }
    });
    client.wait_for_calls(1).await;
    let second = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let profile = profile.clone();
        async move { orchestrator.submit(&profile).await }
    });
    client.wait_for_calls(2).await;

    client.release(0);
    let older = first.await.unwrap();
    assert!(matches!(older, Err(PlanError::Superseded { .. })));
    assert!(orchestrator.current().await.is_none());

    client.release(1);
    let newer = second.await.unwrap().unwrap();
    assert_eq!(newer.ticket, 2);
    assert_eq!(orchestrator.current().await.unwrap().ticket, 2);
}

#[tokio::test]
async fn superseded_error_has_user_message() {
    let err = PlanError::Superseded {
        ticket: 1,
        latest: 3,
    };
    assert_eq!(err.user_message(), "A newer request replaced this one.");
    assert_eq!(err.to_string(), "request 1 was superseded by request 3");
}
