// ABOUTME: End-to-end scheduler scenarios covering the dialing lifecycle
// ABOUTME: Happy path, budget fairness, no-answer, duplicates, window wind-down, stale reaping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

mod common;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use common::{
    create_test_harness, create_test_harness_with_config, seed_user, CampaignBuilder,
};
use herald_voice_server::{
    config::SchedulerConfig,
    engine::EngineWebhookEvent,
    models::{CallStatus, CampaignStatus},
    scheduler::reducer::TelephonyStatusEvent,
};

/// Interpret a wall-clock string in New York and return the UTC instant
fn ny(datetime: &str) -> DateTime<Utc> {
    let naive = NaiveDateTime::parse_from_str(datetime, "%Y-%m-%d %H:%M:%S").unwrap();
    chrono_tz::America::New_York
        .from_local_datetime(&naive)
        .unwrap()
        .with_timezone(&Utc)
}

fn ended_event(
    call_id: &str,
    end_reason: &str,
    joined_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
) -> EngineWebhookEvent {
    EngineWebhookEvent {
        event: "call.ended".into(),
        call_id: call_id.into(),
        end_reason: Some(end_reason.into()),
        joined_at,
        ended_at,
        duration_seconds: None,
        summary: None,
        short_summary: None,
        recording_url: None,
    }
}

#[tokio::test]
async fn test_single_contact_happy_path() {
    let harness = create_test_harness().await.unwrap();
    let user_id = seed_user(&harness.database, 1).await.unwrap();
    let campaign = CampaignBuilder::new(user_id)
        .contacts(1)
        .build(&harness.database)
        .await
        .unwrap();

    harness.scheduler.process_user_calls(user_id).await.unwrap();

    assert_eq!(harness.engine.created_count(), 1);
    assert_eq!(harness.telephony.bridge_count(), 1);
    let bridge = harness.telephony.bridges.lock().unwrap()[0].clone();
    assert_eq!(bridge.provider, "twilio");
    assert_eq!(bridge.from, "+15550001111");
    assert_eq!(bridge.to, "+15551000000");
    assert_eq!(bridge.join_url, "wss://engine.test/join/EC1");

    let contacts = harness.database.campaigns().list_contacts(campaign.id).await.unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::InProgress);
    assert_eq!(contacts[0].engine_call_id.as_deref(), Some("EC1"));

    // Engine reports the call ended: joined 10:00:05, ended 10:02:55
    let event = ended_event(
        "EC1",
        "hangup",
        Some(ny("2026-06-15 10:00:05")),
        Some(ny("2026-06-15 10:02:55")),
    );
    harness
        .scheduler
        .handle_call_terminated(&event.normalize().unwrap())
        .await
        .unwrap();

    let contacts = harness.database.campaigns().list_contacts(campaign.id).await.unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::Completed);
    assert_eq!(contacts[0].call_duration, Some(170));

    let history = harness
        .database
        .call_history()
        .get("EC1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.status, CallStatus::Completed);
    assert_eq!(history.duration_seconds, Some(170));
    // 170 seconds bills as three whole minutes
    assert_eq!(history.billed_duration_seconds, Some(180));
    assert_eq!(history.end_reason.as_deref(), Some("hangup"));

    let campaign = harness
        .database
        .campaigns()
        .get(campaign.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert_eq!(campaign.completed_calls, 1);
    assert_eq!(campaign.successful_calls, 1);
    assert_eq!(campaign.failed_calls, 0);

    let snapshot = harness.scheduler.call_state().await;
    assert!(snapshot.active_calls.is_empty());
    assert!(snapshot
        .budgets
        .iter()
        .all(|budget| budget.active_calls == 0));
}

#[tokio::test]
async fn test_budget_cap_and_round_robin_fairness() {
    let harness = create_test_harness().await.unwrap();
    let user_id = seed_user(&harness.database, 2).await.unwrap();
    let first = CampaignBuilder::new(user_id)
        .name("first")
        .contacts(5)
        .build(&harness.database)
        .await
        .unwrap();
    let second = CampaignBuilder::new(user_id)
        .name("second")
        .contacts(5)
        .build(&harness.database)
        .await
        .unwrap();

    harness.scheduler.process_user_calls(user_id).await.unwrap();

    // Exactly two slots in use, one claim per campaign
    let snapshot = harness.scheduler.call_state().await;
    assert_eq!(snapshot.active_calls.len(), 2);
    assert_eq!(
        harness.telephony.bridged_campaigns(),
        vec![first.id, second.id]
    );

    // Terminate both calls and dial again
    for call_id in ["EC1", "EC2"] {
        let event = ended_event(call_id, "hangup", None, None);
        harness
            .scheduler
            .handle_call_terminated(&event.normalize().unwrap())
            .await
            .unwrap();
    }
    harness.scheduler.process_user_calls(user_id).await.unwrap();

    // First four dials alternate between the two campaigns
    assert_eq!(
        harness.telephony.bridged_campaigns(),
        vec![first.id, second.id, first.id, second.id]
    );
    let snapshot = harness.scheduler.call_state().await;
    assert_eq!(snapshot.active_calls.len(), 2);
}

#[tokio::test]
async fn test_telephony_no_answer_before_engine_webhook() {
    let harness = create_test_harness().await.unwrap();
    let user_id = seed_user(&harness.database, 1).await.unwrap();
    let campaign = CampaignBuilder::new(user_id)
        .contacts(2)
        .build(&harness.database)
        .await
        .unwrap();

    harness.scheduler.process_user_calls(user_id).await.unwrap();

    // The provider reports no-answer before the engine says anything
    let status = TelephonyStatusEvent {
        provider: "twilio".into(),
        engine_call_id: "EC1".into(),
        status: "no-answer".into(),
        duration_seconds: None,
    };
    harness.scheduler.handle_telephony_status(&status).await.unwrap();

    let contacts = harness.database.campaigns().list_contacts(campaign.id).await.unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::NoAnswer);

    let history = harness
        .database
        .call_history()
        .get("EC1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.status, CallStatus::NoAnswer);

    // The engine's own terminal report arrives later and changes nothing
    let event = ended_event("EC1", "timeout", None, None);
    harness
        .scheduler
        .handle_call_terminated(&event.normalize().unwrap())
        .await
        .unwrap();
    let contacts = harness.database.campaigns().list_contacts(campaign.id).await.unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::NoAnswer);

    // The released slot lets the next contact go out
    harness.scheduler.process_user_calls(user_id).await.unwrap();
    assert_eq!(harness.telephony.bridge_count(), 2);
    assert_eq!(harness.telephony.bridged_numbers()[1], "+15551000001");
}

#[tokio::test]
async fn test_duplicate_terminal_webhook_is_noop() {
    let harness = create_test_harness().await.unwrap();
    let user_id = seed_user(&harness.database, 1).await.unwrap();
    let campaign = CampaignBuilder::new(user_id)
        .contacts(1)
        .build(&harness.database)
        .await
        .unwrap();

    harness.scheduler.process_user_calls(user_id).await.unwrap();

    let event = ended_event("EC1", "hangup", None, None);
    let terminated = event.normalize().unwrap();
    harness.scheduler.handle_call_terminated(&terminated).await.unwrap();
    harness.scheduler.handle_call_terminated(&terminated).await.unwrap();

    let campaign = harness
        .database
        .campaigns()
        .get(campaign.id)
        .await
        .unwrap()
        .unwrap();
    // Exactly one transition despite two posts
    assert_eq!(campaign.completed_calls, 1);
    assert_eq!(campaign.successful_calls, 1);
    assert_eq!(campaign.status, CampaignStatus::Completed);

    // The counter stays floored, never negative
    let snapshot = harness.scheduler.call_state().await;
    assert!(snapshot
        .budgets
        .iter()
        .all(|budget| budget.active_calls == 0));
}

#[tokio::test]
async fn test_end_of_window_parks_and_resumes_next_day() {
    let harness = create_test_harness().await.unwrap();
    let user_id = seed_user(&harness.database, 1).await.unwrap();
    let campaign = CampaignBuilder::new(user_id)
        .status(CampaignStatus::Scheduled)
        .window("2026-06-15", "10:00", "10:05", "America/New_York")
        .contacts(5)
        .build(&harness.database)
        .await
        .unwrap();

    // Window opens: the tick activates the campaign and dials contact 1
    harness.scheduler.tick_at(ny("2026-06-15 10:00:10")).await.unwrap();
    assert_eq!(harness.telephony.bridge_count(), 1);

    // Three contacts terminate inside the window
    for (n, call_id) in ["EC1", "EC2", "EC3"].iter().enumerate() {
        let event = ended_event(call_id, "hangup", None, None);
        harness
            .scheduler
            .handle_call_terminated(&event.normalize().unwrap())
            .await
            .unwrap();
        if n < 2 {
            harness.scheduler.process_user_calls(user_id).await.unwrap();
        }
    }
    assert_eq!(harness.telephony.bridge_count(), 3);

    // Window closes with two contacts still pending
    harness.scheduler.tick_at(ny("2026-06-15 10:05:01")).await.unwrap();
    let parked = harness
        .database
        .campaigns()
        .get(campaign.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(parked.status, CampaignStatus::PausedTimeWindow);
    assert_eq!(parked.paused_reason.as_deref(), Some("end-time-reached"));

    // Overnight nothing happens
    harness.scheduler.tick_at(ny("2026-06-16 09:00:00")).await.unwrap();
    let still_parked = harness
        .database
        .campaigns()
        .get(campaign.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still_parked.status, CampaignStatus::PausedTimeWindow);

    // Next day the same daily window reopens and dialing continues in order
    harness.scheduler.tick_at(ny("2026-06-16 10:00:10")).await.unwrap();
    let resumed = harness
        .database
        .campaigns()
        .get(campaign.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resumed.status, CampaignStatus::Active);
    assert!(resumed.paused_reason.is_none());
    assert_eq!(harness.telephony.bridge_count(), 4);
    assert_eq!(harness.telephony.bridged_numbers()[3], "+15551000003");
}

#[tokio::test]
async fn test_stale_call_reaped_and_late_webhook_ignored() {
    let harness = create_test_harness().await.unwrap();
    let user_id = seed_user(&harness.database, 1).await.unwrap();
    let campaign = CampaignBuilder::new(user_id)
        .contacts(2)
        .build(&harness.database)
        .await
        .unwrap();

    harness.scheduler.process_user_calls(user_id).await.unwrap();
    assert_eq!(harness.telephony.bridge_count(), 1);

    // No webhook ever arrives; sixteen minutes later the reaper fires
    let later = Utc::now() + chrono::Duration::minutes(16);
    harness.scheduler.tick_at(later).await.unwrap();

    let contacts = harness.database.campaigns().list_contacts(campaign.id).await.unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::Failed);
    assert_eq!(contacts[0].call_notes.as_deref(), Some("call timed out"));

    let snapshot = harness.scheduler.call_state().await;
    assert!(snapshot.active_calls.is_empty());
    assert!(snapshot
        .budgets
        .iter()
        .all(|budget| budget.active_calls == 0));

    // The tick that reaped also dialed the next contact with the freed slot
    assert_eq!(harness.telephony.bridge_count(), 2);

    // The webhook finally limps in; the reap already settled the call
    let event = ended_event("EC1", "hangup", None, None);
    harness
        .scheduler
        .handle_call_terminated(&event.normalize().unwrap())
        .await
        .unwrap();
    let contacts = harness.database.campaigns().list_contacts(campaign.id).await.unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::Failed);
}

#[tokio::test]
async fn test_budget_rebuilt_from_store_after_restart() {
    let harness = create_test_harness().await.unwrap();
    let user_id = seed_user(&harness.database, 1).await.unwrap();
    CampaignBuilder::new(user_id)
        .contacts(2)
        .build(&harness.database)
        .await
        .unwrap();

    harness.scheduler.process_user_calls(user_id).await.unwrap();
    assert_eq!(harness.engine.created_count(), 1);

    // A fresh scheduler over the same store must rebuild the budget from
    // the in-progress contact and refuse to over-dial
    let restarted = create_test_harness().await.unwrap();
    let scheduler = herald_voice_server::scheduler::CampaignScheduler::new(
        harness.database.clone(),
        restarted.engine.clone(),
        restarted.telephony.clone(),
        SchedulerConfig::default(),
    );
    scheduler.process_user_calls(user_id).await.unwrap();

    assert_eq!(restarted.engine.created_count(), 0);
    let snapshot = scheduler.call_state().await;
    assert_eq!(snapshot.budgets.len(), 1);
    assert_eq!(snapshot.budgets[0].active_calls, 1);
}

#[tokio::test]
async fn test_window_confinement_no_dial_before_start() {
    let harness = create_test_harness().await.unwrap();
    let user_id = seed_user(&harness.database, 1).await.unwrap();
    CampaignBuilder::new(user_id)
        .status(CampaignStatus::Scheduled)
        .window("2026-06-15", "10:00", "18:00", "America/New_York")
        .contacts(1)
        .build(&harness.database)
        .await
        .unwrap();

    harness.scheduler.tick_at(ny("2026-06-15 09:30:00")).await.unwrap();
    assert_eq!(harness.engine.created_count(), 0);

    // A window missed by more than the grace is not retroactively dialed
    harness.scheduler.tick_at(ny("2026-06-15 11:30:00")).await.unwrap();
    assert_eq!(harness.engine.created_count(), 0);
}

#[tokio::test]
async fn test_engine_failure_fails_contact_and_moves_on() {
    let harness = create_test_harness().await.unwrap();
    let user_id = seed_user(&harness.database, 1).await.unwrap();
    let campaign = CampaignBuilder::new(user_id)
        .contacts(2)
        .build(&harness.database)
        .await
        .unwrap();

    harness
        .engine
        .fail_create
        .store(true, std::sync::atomic::Ordering::SeqCst);
    harness.scheduler.process_user_calls(user_id).await.unwrap();

    // Both contacts fail in one pass: each claim's engine call errors, the
    // slot is released, and the loop proceeds to the next contact
    let contacts = harness.database.campaigns().list_contacts(campaign.id).await.unwrap();
    assert!(contacts
        .iter()
        .all(|c| c.call_status == CallStatus::Failed));
    assert!(contacts[0]
        .call_notes
        .as_deref()
        .unwrap()
        .contains("engine unavailable"));

    let campaign = harness
        .database
        .campaigns()
        .get(campaign.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert_eq!(campaign.failed_calls, 2);

    let snapshot = harness.scheduler.call_state().await;
    assert!(snapshot
        .budgets
        .iter()
        .all(|budget| budget.active_calls == 0));
}

#[tokio::test]
async fn test_busy_is_terminal_by_default() {
    let harness = create_test_harness().await.unwrap();
    let user_id = seed_user(&harness.database, 1).await.unwrap();
    let campaign = CampaignBuilder::new(user_id)
        .contacts(1)
        .build(&harness.database)
        .await
        .unwrap();

    harness.scheduler.process_user_calls(user_id).await.unwrap();

    let status = TelephonyStatusEvent {
        provider: "twilio".into(),
        engine_call_id: "EC1".into(),
        status: "busy".into(),
        duration_seconds: None,
    };
    harness.scheduler.handle_telephony_status(&status).await.unwrap();

    let contacts = harness.database.campaigns().list_contacts(campaign.id).await.unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::Failed);

    // A busy contact is never retried by the core
    harness.scheduler.process_user_calls(user_id).await.unwrap();
    assert_eq!(harness.engine.created_count(), 1);
}

#[tokio::test]
async fn test_retry_busy_knob_requeues_contact() {
    let config = SchedulerConfig {
        retry_busy: true,
        ..SchedulerConfig::default()
    };
    let harness = create_test_harness_with_config(config).await.unwrap();
    let user_id = seed_user(&harness.database, 1).await.unwrap();
    let campaign = CampaignBuilder::new(user_id)
        .contacts(1)
        .build(&harness.database)
        .await
        .unwrap();

    harness.scheduler.process_user_calls(user_id).await.unwrap();

    let status = TelephonyStatusEvent {
        provider: "twilio".into(),
        engine_call_id: "EC1".into(),
        status: "busy".into(),
        duration_seconds: None,
    };
    harness.scheduler.handle_telephony_status(&status).await.unwrap();

    let contacts = harness.database.campaigns().list_contacts(campaign.id).await.unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::Pending);

    // The freed slot redials the same contact
    harness.scheduler.process_user_calls(user_id).await.unwrap();
    assert_eq!(harness.engine.created_count(), 2);
    assert_eq!(harness.telephony.bridged_numbers(), vec![
        "+15551000000".to_owned(),
        "+15551000000".to_owned(),
    ]);
}

#[tokio::test]
async fn test_missing_credentials_fail_contact_without_slot() {
    let harness = create_test_harness().await.unwrap();
    // Settings exist but carry no credentials for the campaign's provider
    let user_id = uuid::Uuid::new_v4();
    let campaign = CampaignBuilder::new(user_id)
        .contacts(1)
        .build(&harness.database)
        .await
        .unwrap();

    harness.scheduler.process_user_calls(user_id).await.unwrap();

    assert_eq!(harness.engine.created_count(), 0);
    let contacts = harness.database.campaigns().list_contacts(campaign.id).await.unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::Failed);
    assert!(contacts[0]
        .call_notes
        .as_deref()
        .unwrap()
        .contains("no credentials"));

    let snapshot = harness.scheduler.call_state().await;
    assert!(snapshot.active_calls.is_empty());
}
