use crate::config::RouterConfig;
use crate::error::AppError;
use crate::models::{
    Conversation, FanProfile, NewPersonality, Personality, PersonalitySwitch, SwitchOptions,
    SwitchReason, Tone,
};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const PERSONALITY_COLUMNS: &str = "id, creator_slug, name, is_active, traffic_share, language, \
     primary_tone, tone_keywords, created_at";

const CONVERSATION_COLUMNS: &str = "id, creator_slug, ai_personality_id, detected_tone, \
     tone_confidence, last_tone_check, auto_tone_switch, created_at";

const SWITCH_COLUMNS: &str = "id, conversation_id, from_personality_id, to_personality_id, \
     reason, detected_tone, detected_language, triggered_by, created_at";

/// Opens the configured database, creating it if missing, and applies migrations.
pub async fn init_db(config: &RouterConfig) -> Result<SqlitePool, AppError> {
    info!("Initializing database at: {}", config.database_url);

    let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    info!("Database initialized and migrations applied.");

    Ok(pool)
}

/// Single-connection in-memory database with migrations applied.
///
/// The connection is never recycled, since dropping it would drop the data.
pub async fn connect_in_memory() -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// --- Personalities ---

/// Inserts a validated personality stamped with `created_at` (unix seconds).
pub async fn create_personality(
    pool: &SqlitePool,
    personality: NewPersonality,
    created_at: i64,
) -> Result<Personality, AppError> {
    personality.validate()?;

    let id = Uuid::new_v4().to_string();
    let tone_keywords = if personality.tone_keywords.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&personality.tone_keywords)?)
    };

    let created = sqlx::query_as::<_, Personality>(&format!(
        r#"
        INSERT INTO personalities
            (id, creator_slug, name, is_active, traffic_share, language, primary_tone, tone_keywords, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {PERSONALITY_COLUMNS}
        "#
    ))
    .bind(&id)
    .bind(&personality.creator_slug)
    .bind(&personality.name)
    .bind(personality.is_active)
    .bind(personality.traffic_share)
    .bind(&personality.language)
    .bind(personality.primary_tone)
    .bind(tone_keywords)
    .bind(created_at)
    .fetch_one(pool)
    .await?;

    Ok(created)
}

pub async fn get_personality(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<Personality>, sqlx::Error> {
    sqlx::query_as::<_, Personality>(&format!(
        "SELECT {PERSONALITY_COLUMNS} FROM personalities WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Active personalities of a creator, in creation order.
pub async fn list_active_personalities(
    pool: &SqlitePool,
    creator_slug: &str,
) -> Result<Vec<Personality>, sqlx::Error> {
    sqlx::query_as::<_, Personality>(&format!(
        r#"
        SELECT {PERSONALITY_COLUMNS}
        FROM personalities
        WHERE creator_slug = ? AND is_active = 1
        ORDER BY created_at ASC, rowid ASC
        "#
    ))
    .bind(creator_slug)
    .fetch_all(pool)
    .await
}

pub async fn set_personality_active(
    pool: &SqlitePool,
    id: &str,
    is_active: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE personalities SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// --- Conversations ---

pub async fn create_conversation(
    pool: &SqlitePool,
    creator_slug: &str,
    auto_tone_switch: bool,
    created_at: i64,
) -> Result<Conversation, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query_as::<_, Conversation>(&format!(
        r#"
        INSERT INTO conversations (id, creator_slug, auto_tone_switch, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING {CONVERSATION_COLUMNS}
        "#
    ))
    .bind(&id)
    .bind(creator_slug)
    .bind(auto_tone_switch)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

pub async fn get_conversation(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<Conversation>, sqlx::Error> {
    sqlx::query_as::<_, Conversation>(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn set_auto_tone_switch(
    pool: &SqlitePool,
    id: &str,
    enabled: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE conversations SET auto_tone_switch = ? WHERE id = ?")
        .bind(enabled)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Marks a tone evaluation as done without changing the stored tone.
pub async fn record_tone_check(
    pool: &SqlitePool,
    id: &str,
    confidence: f64,
    checked_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE conversations SET tone_confidence = ?, last_tone_check = ? WHERE id = ?")
        .bind(confidence)
        .bind(checked_at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Stores a newly detected tone together with the evaluation time.
pub async fn record_tone_detection(
    pool: &SqlitePool,
    id: &str,
    tone: Tone,
    confidence: f64,
    checked_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE conversations
        SET detected_tone = ?, tone_confidence = ?, last_tone_check = ?
        WHERE id = ?
        "#,
    )
    .bind(tone)
    .bind(confidence)
    .bind(checked_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

// --- Fan profiles ---

pub async fn upsert_fan_language(
    pool: &SqlitePool,
    fan_user_id: &str,
    creator_slug: &str,
    language: &str,
    updated_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO fan_profiles (fan_user_id, creator_slug, language, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(fan_user_id, creator_slug)
        DO UPDATE SET language = excluded.language, updated_at = excluded.updated_at
        "#,
    )
    .bind(fan_user_id)
    .bind(creator_slug)
    .bind(language)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_fan_profile(
    pool: &SqlitePool,
    fan_user_id: &str,
    creator_slug: &str,
) -> Result<Option<FanProfile>, sqlx::Error> {
    sqlx::query_as::<_, FanProfile>(
        r#"
        SELECT fan_user_id, creator_slug, language, updated_at
        FROM fan_profiles
        WHERE fan_user_id = ? AND creator_slug = ?
        "#,
    )
    .bind(fan_user_id)
    .bind(creator_slug)
    .fetch_optional(pool)
    .await
}

// --- Personality switches ---

/// Points a conversation at a new personality and appends the audit row.
///
/// Both writes happen in one transaction: if either fails, neither is visible.
/// The audit row takes `from_personality_id` from the conversation as read inside
/// the transaction, and nothing is written (`Ok(None)`) when the conversation
/// already uses `to_personality_id`, unless `reason` is an initial assignment.
/// `detected_tone` is only overwritten when the options carry one.
pub async fn commit_switch(
    pool: &SqlitePool,
    conversation_id: &str,
    to_personality_id: &str,
    reason: SwitchReason,
    options: &SwitchOptions,
    now: i64,
) -> Result<Option<PersonalitySwitch>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    // Writing first takes the write lock, so the guard and the previous
    // personality are read under it.
    let switch = sqlx::query_as::<_, PersonalitySwitch>(&format!(
        r#"
        INSERT INTO personality_switches
            (id, conversation_id, from_personality_id, to_personality_id, reason,
             detected_tone, detected_language, triggered_by, created_at)
        SELECT ?, c.id, c.ai_personality_id, ?, ?, ?, ?, ?, ?
        FROM conversations c
        WHERE c.id = ? AND (c.ai_personality_id IS NOT ? OR ?)
        RETURNING {SWITCH_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(to_personality_id)
    .bind(reason)
    .bind(options.detected_tone)
    .bind(&options.detected_language)
    .bind(&options.triggered_by)
    .bind(now)
    .bind(conversation_id)
    .bind(to_personality_id)
    .bind(reason == SwitchReason::InitialAssignment)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(switch) = switch else {
        tx.rollback().await?;
        return Ok(None);
    };

    sqlx::query(
        r#"
        UPDATE conversations
        SET ai_personality_id = ?, detected_tone = COALESCE(?, detected_tone), last_tone_check = ?
        WHERE id = ?
        "#,
    )
    .bind(to_personality_id)
    .bind(options.detected_tone)
    .bind(now)
    .bind(conversation_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(switch))
}

/// Audit rows of a conversation, oldest first.
pub async fn list_switches(
    pool: &SqlitePool,
    conversation_id: &str,
) -> Result<Vec<PersonalitySwitch>, sqlx::Error> {
    sqlx::query_as::<_, PersonalitySwitch>(&format!(
        r#"
        SELECT {SWITCH_COLUMNS}
        FROM personality_switches
        WHERE conversation_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#
    ))
    .bind(conversation_id)
    .fetch_all(pool)
    .await
}

/// One audit row joined to the name of the personality switched to.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SwitchStatRow {
    pub personality_name: String,
    pub reason: SwitchReason,
    pub detected_tone: Option<Tone>,
}

/// Switches into a creator's personalities, optionally bounded by an inclusive
/// `created_at` window.
pub async fn switch_stat_rows(
    pool: &SqlitePool,
    creator_slug: &str,
    start: Option<i64>,
    end: Option<i64>,
) -> Result<Vec<SwitchStatRow>, sqlx::Error> {
    sqlx::query_as::<_, SwitchStatRow>(
        r#"
        SELECT p.name AS personality_name, s.reason, s.detected_tone
        FROM personality_switches s
        JOIN personalities p ON p.id = s.to_personality_id
        WHERE p.creator_slug = ?
          AND (? IS NULL OR s.created_at >= ?)
          AND (? IS NULL OR s.created_at <= ?)
        ORDER BY s.created_at ASC
        "#,
    )
    .bind(creator_slug)
    .bind(start)
    .bind(start)
    .bind(end)
    .bind(end)
    .fetch_all(pool)
    .await
}
