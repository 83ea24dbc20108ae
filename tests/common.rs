// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory database, mock engine/telephony, and seed helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence
#![allow(dead_code)]

//! Shared test utilities for `herald_voice_server`
//!
//! Common setup to reduce duplication across integration tests: an
//! in-memory SQLite database, recording fakes for the voice engine and the
//! telephony gateway, and seed builders for users, campaigns, and contacts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use herald_voice_server::{
    config::SchedulerConfig,
    database::Database,
    engine::{
        CreateCallRequest, CreateWebhookRequest, EngineCall, EngineCallDetails, EngineWebhook,
        VoiceEngine,
    },
    errors::{AppError, AppResult},
    models::{
        CallStatus, Campaign, CampaignStatus, CampaignType, Contact, OutboundMedium, Schedule,
        TelephonyCredentials, UserSettings,
    },
    providers::{BridgeTags, TelephonyGateway},
    scheduler::CampaignScheduler,
};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

/// Standard in-memory test database
pub async fn create_test_database() -> AppResult<Arc<Database>> {
    init_test_logging();
    let database = Arc::new(Database::new("sqlite::memory:").await?);
    Ok(database)
}

/// Recording fake for the voice engine
///
/// Returns sequential call ids `EC1`, `EC2`, ... unless told to fail.
pub struct MockVoiceEngine {
    pub created: Mutex<Vec<CreateCallRequest>>,
    pub fail_create: AtomicBool,
    counter: AtomicU64,
}

impl MockVoiceEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            created: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
            counter: AtomicU64::new(0),
        })
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// Call id handed out for the nth created call (zero-based)
    pub fn call_id(&self, n: usize) -> String {
        format!("EC{}", n + 1)
    }
}

#[async_trait]
impl VoiceEngine for MockVoiceEngine {
    async fn create_call(&self, request: &CreateCallRequest) -> AppResult<EngineCall> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::external("engine unavailable"));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.created.lock().unwrap().push(request.clone());
        Ok(EngineCall {
            call_id: format!("EC{n}"),
            join_url: format!("wss://engine.test/join/EC{n}"),
        })
    }

    async fn get_call_details(&self, _call_id: &str) -> AppResult<EngineCallDetails> {
        Ok(EngineCallDetails::default())
    }

    async fn create_webhook(&self, _request: &CreateWebhookRequest) -> AppResult<EngineWebhook> {
        Ok(EngineWebhook {
            webhook_id: "WH1".into(),
        })
    }

    async fn delete_webhook(&self, _webhook_id: &str) -> AppResult<()> {
        Ok(())
    }
}

/// One recorded bridge request
#[derive(Debug, Clone)]
pub struct BridgeRecord {
    pub provider: String,
    pub from: String,
    pub to: String,
    pub join_url: String,
    pub call_history_id: String,
    pub campaign_id: Uuid,
}

/// Recording fake for the telephony gateway
pub struct MockTelephonyGateway {
    pub bridges: Mutex<Vec<BridgeRecord>>,
    pub fail_bridge: AtomicBool,
}

impl MockTelephonyGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            bridges: Mutex::new(Vec::new()),
            fail_bridge: AtomicBool::new(false),
        })
    }

    pub fn bridge_count(&self) -> usize {
        self.bridges.lock().unwrap().len()
    }

    pub fn bridged_numbers(&self) -> Vec<String> {
        self.bridges.lock().unwrap().iter().map(|b| b.to.clone()).collect()
    }

    pub fn bridged_campaigns(&self) -> Vec<Uuid> {
        self.bridges
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.campaign_id)
            .collect()
    }
}

#[async_trait]
impl TelephonyGateway for MockTelephonyGateway {
    async fn bridge(
        &self,
        provider_tag: &str,
        _credentials: &TelephonyCredentials,
        from: &str,
        to: &str,
        join_url: &str,
        tags: &BridgeTags,
    ) -> AppResult<String> {
        if self.fail_bridge.load(Ordering::SeqCst) {
            return Err(AppError::external("provider unavailable"));
        }
        self.bridges.lock().unwrap().push(BridgeRecord {
            provider: provider_tag.to_owned(),
            from: from.to_owned(),
            to: to.to_owned(),
            join_url: join_url.to_owned(),
            call_history_id: tags.call_history_id.clone(),
            campaign_id: tags.campaign_id,
        });
        Ok(format!("PC-{}", tags.call_history_id))
    }
}

/// Full test harness: database, mocks, and a scheduler wired over them
pub struct TestHarness {
    pub database: Arc<Database>,
    pub engine: Arc<MockVoiceEngine>,
    pub telephony: Arc<MockTelephonyGateway>,
    pub scheduler: Arc<CampaignScheduler>,
}

pub async fn create_test_harness() -> AppResult<TestHarness> {
    create_test_harness_with_config(SchedulerConfig::default()).await
}

pub async fn create_test_harness_with_config(
    config: SchedulerConfig,
) -> AppResult<TestHarness> {
    let database = create_test_database().await?;
    let engine = MockVoiceEngine::new();
    let telephony = MockTelephonyGateway::new();
    let scheduler = CampaignScheduler::new(
        database.clone(),
        engine.clone(),
        telephony.clone(),
        config,
    );
    Ok(TestHarness {
        database,
        engine,
        telephony,
        scheduler,
    })
}

/// Seed a user with twilio credentials and the given budget cap
pub async fn seed_user(database: &Database, max_concurrent_calls: u32) -> AppResult<Uuid> {
    let user_id = Uuid::new_v4();
    let settings = UserSettings {
        user_id,
        max_concurrent_calls,
        telephony: HashMap::from([(
            "twilio".to_owned(),
            TelephonyCredentials {
                account_id: "AC-test".into(),
                auth_token: "token-test".into(),
                api_base: None,
            },
        )]),
    };
    database.user_settings().upsert(&settings).await?;
    Ok(user_id)
}

/// Builder for seeded campaigns
pub struct CampaignBuilder {
    user_id: Uuid,
    status: CampaignStatus,
    schedule: Option<Schedule>,
    contact_count: usize,
    name: String,
}

impl CampaignBuilder {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            status: CampaignStatus::Active,
            schedule: None,
            contact_count: 1,
            name: "test campaign".into(),
        }
    }

    pub fn status(mut self, status: CampaignStatus) -> Self {
        self.status = status;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    pub fn contacts(mut self, count: usize) -> Self {
        self.contact_count = count;
        self
    }

    pub fn window(mut self, date: &str, start: &str, end: &str, timezone: &str) -> Self {
        self.schedule = Some(Schedule {
            scheduled_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            scheduled_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            end_time: Some(NaiveTime::parse_from_str(end, "%H:%M").unwrap()),
            timezone: timezone.to_owned(),
        });
        self
    }

    pub async fn build(self, database: &Database) -> AppResult<Campaign> {
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            name: self.name,
            campaign_type: CampaignType::Outbound,
            agent_id: "agent-1".into(),
            status: self.status,
            schedule: self.schedule,
            outbound_medium: Some(OutboundMedium {
                provider: "twilio".into(),
                from_phone: "+15550001111".into(),
            }),
            completed_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            started_at: None,
            completed_at: None,
            last_processed_at: None,
            paused_reason: None,
            created_at: now,
            updated_at: now,
        };
        database.campaigns().create(&campaign).await?;

        let contacts: Vec<Contact> = (0..self.contact_count)
            .map(|i| Contact {
                id: Uuid::new_v4(),
                campaign_id: campaign.id,
                position: i64::try_from(i).unwrap(),
                name: format!("Contact {}", i + 1),
                phone_number: format!("+1555100{:04}", i),
                call_status: CallStatus::Pending,
                engine_call_id: None,
                call_history_id: None,
                called_at: None,
                call_duration: None,
                call_notes: None,
            })
            .collect();
        database.campaigns().add_contacts(campaign.id, &contacts).await?;

        Ok(campaign)
    }
}
