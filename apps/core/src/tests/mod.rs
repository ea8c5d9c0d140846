//! Test Module
//!
//! Cross-module test suite for the router.
//!
//! ## Test Categories
//! - `brain_tests`: language and tone detection over realistic conversations
//! - `database_tests`: persistence of personalities, conversations, profiles, switches
//! - `policy_tests`: switch proposals, cooldown, idempotent commits
//! - `chaos_test`: failure injection on the switch transaction
//! - `integration_tests`: end-to-end routing flows

pub mod database_tests;

use crate::config::RouterConfig;
use crate::database;
use crate::models::{Conversation, ConversationMessage, NewPersonality, Personality};
use crate::router::{Clock, PersonalityRouter};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::sqlite::SqlitePool;
use std::sync::{Arc, Mutex};

// ============================================================================
// Test Fixtures
// ============================================================================

/// In-memory database with migrations applied.
pub async fn create_test_pool() -> SqlitePool {
    database::connect_in_memory()
        .await
        .expect("Failed to create test pool")
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid start time");
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock poisoned");
        *now += by;
    }

    pub fn now_ts(&self) -> i64 {
        self.now().timestamp()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock poisoned")
    }
}

pub fn test_router(pool: &SqlitePool, clock: Arc<ManualClock>) -> PersonalityRouter {
    PersonalityRouter::with_clock(pool.clone(), &RouterConfig::default(), clock)
}

/// Creation time stamped on fixture records.
pub const FIXTURE_CREATED_AT: i64 = 1_767_225_600;

pub async fn add_personality(pool: &SqlitePool, personality: NewPersonality) -> Personality {
    database::create_personality(pool, personality, FIXTURE_CREATED_AT)
        .await
        .expect("Failed to create personality")
}

pub async fn add_conversation(pool: &SqlitePool, creator_slug: &str, auto_tone: bool) -> Conversation {
    database::create_conversation(pool, creator_slug, auto_tone, FIXTURE_CREATED_AT)
        .await
        .expect("Failed to create conversation")
}

pub async fn fetch_conversation(pool: &SqlitePool, id: &str) -> Conversation {
    database::get_conversation(pool, id)
        .await
        .expect("Failed to get conversation")
        .expect("Conversation should exist")
}

/// Overwrites the stored `tone_keywords` column, bypassing serialization.
pub async fn set_raw_tone_keywords(pool: &SqlitePool, id: &str, raw: Option<&str>) {
    sqlx::query("UPDATE personalities SET tone_keywords = ? WHERE id = ?")
        .bind(raw)
        .bind(id)
        .execute(pool)
        .await
        .expect("Failed to write raw tone keywords");
}

pub fn fan_messages(fan: &str, texts: &[&str]) -> Vec<ConversationMessage> {
    texts.iter().map(|t| ConversationMessage::new(fan, t)).collect()
}
