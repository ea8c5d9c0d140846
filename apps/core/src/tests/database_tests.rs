//! Database Module Tests
//!
//! Persistence of personalities, conversations, fan profiles and switch rows.

use super::{
    add_conversation, add_personality, create_test_pool, fetch_conversation, set_raw_tone_keywords,
    FIXTURE_CREATED_AT,
};
use crate::config::RouterConfig;
use crate::database;
use crate::error::AppError;
use crate::models::{NewPersonality, SwitchOptions, SwitchReason, Tone};
use tempfile::tempdir;

#[cfg(test)]
mod personality_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_personality() {
        let pool = create_test_pool().await;

        let created = add_personality(
            &pool,
            NewPersonality::new("mia", "Claire", 2.5)
                .language("fr")
                .primary_tone(Tone::Romantic)
                .tone_keywords(&[Tone::Playful, Tone::Casual]),
        )
        .await;

        assert!(!created.id.is_empty());
        assert_eq!(created.creator_slug, "mia");
        assert_eq!(created.traffic_share, 2.5);
        assert_eq!(created.language.as_deref(), Some("fr"));
        assert_eq!(created.primary_tone, Some(Tone::Romantic));
        assert_eq!(created.tone_keywords(), Some(vec![Tone::Playful, Tone::Casual]));
        assert!(created.is_active);
        assert_eq!(created.created_at, FIXTURE_CREATED_AT);
    }

    #[tokio::test]
    async fn test_negative_share_rejected() {
        let pool = create_test_pool().await;

        let result =
            database::create_personality(&pool, NewPersonality::new("mia", "Bad", -1.0), 0).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_active_in_creation_order() {
        let pool = create_test_pool().await;

        let first = add_personality(&pool, NewPersonality::new("mia", "First", 1.0)).await;
        add_personality(&pool, NewPersonality::new("mia", "Hidden", 1.0).inactive()).await;
        let third = add_personality(&pool, NewPersonality::new("mia", "Third", 1.0)).await;
        add_personality(&pool, NewPersonality::new("zoe", "Other", 1.0)).await;

        let active = database::list_active_personalities(&pool, "mia")
            .await
            .expect("Failed to list personalities");

        let ids: Vec<&str> = active.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), third.id.as_str()]);
    }

    #[tokio::test]
    async fn test_deactivate_personality() {
        let pool = create_test_pool().await;

        let p = add_personality(&pool, NewPersonality::new("mia", "Claire", 1.0)).await;
        database::set_personality_active(&pool, &p.id, false)
            .await
            .expect("Failed to deactivate");

        let active = database::list_active_personalities(&pool, "mia").await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_tone_keywords_read_as_none() {
        let pool = create_test_pool().await;

        let p = add_personality(&pool, NewPersonality::new("mia", "Legacy", 1.0)).await;
        set_raw_tone_keywords(&pool, &p.id, Some("{oops")).await;

        let stored = database::get_personality(&pool, &p.id).await.unwrap().unwrap();
        assert_eq!(stored.tone_keywords(), None);
        assert!(!stored.matches_tone_keyword(Tone::Playful));

        set_raw_tone_keywords(&pool, &p.id, Some(r#"["playful","sleepy"]"#)).await;
        let stored = database::get_personality(&pool, &p.id).await.unwrap().unwrap();
        assert_eq!(stored.tone_keywords(), Some(vec![Tone::Playful]));
    }
}

#[cfg(test)]
mod conversation_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_conversation_defaults() {
        let pool = create_test_pool().await;

        let conversation = add_conversation(&pool, "mia", false).await;

        assert_eq!(conversation.creator_slug, "mia");
        assert!(conversation.ai_personality_id.is_none());
        assert!(conversation.detected_tone.is_none());
        assert_eq!(conversation.tone_confidence, 0.0);
        assert!(conversation.last_tone_check.is_none());
        assert!(!conversation.auto_tone_switch);
        assert_eq!(conversation.created_at, FIXTURE_CREATED_AT);
    }

    #[tokio::test]
    async fn test_missing_conversation() {
        let pool = create_test_pool().await;

        let missing = database::get_conversation(&pool, "nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_toggle_auto_tone_switch() {
        let pool = create_test_pool().await;

        let conversation = add_conversation(&pool, "mia", false).await;
        database::set_auto_tone_switch(&pool, &conversation.id, true)
            .await
            .unwrap();

        assert!(fetch_conversation(&pool, &conversation.id).await.auto_tone_switch);
    }

    #[tokio::test]
    async fn test_tone_tracking_updates() {
        let pool = create_test_pool().await;

        let conversation = add_conversation(&pool, "mia", true).await;

        database::record_tone_check(&pool, &conversation.id, 0.25, 1_000)
            .await
            .unwrap();
        let checked = fetch_conversation(&pool, &conversation.id).await;
        assert_eq!(checked.last_tone_check, Some(1_000));
        assert_eq!(checked.tone_confidence, 0.25);
        assert!(checked.detected_tone.is_none());

        database::record_tone_detection(&pool, &conversation.id, Tone::Casual, 0.8, 2_000)
            .await
            .unwrap();
        let detected = fetch_conversation(&pool, &conversation.id).await;
        assert_eq!(detected.detected_tone, Some(Tone::Casual));
        assert_eq!(detected.tone_confidence, 0.8);
        assert_eq!(detected.last_tone_check, Some(2_000));
    }
}

#[cfg(test)]
mod fan_profile_tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_fan_language() {
        let pool = create_test_pool().await;

        database::upsert_fan_language(&pool, "fan-1", "mia", "fr", 10)
            .await
            .unwrap();
        database::upsert_fan_language(&pool, "fan-1", "mia", "es", 20)
            .await
            .unwrap();
        database::upsert_fan_language(&pool, "fan-1", "zoe", "de", 30)
            .await
            .unwrap();

        let profile = database::get_fan_profile(&pool, "fan-1", "mia")
            .await
            .unwrap()
            .expect("Profile should exist");
        assert_eq!(profile.language.as_deref(), Some("es"));
        assert_eq!(profile.updated_at, 20);

        let other = database::get_fan_profile(&pool, "fan-1", "zoe").await.unwrap().unwrap();
        assert_eq!(other.language.as_deref(), Some("de"));
    }
}

#[cfg(test)]
mod switch_tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_switch_updates_and_logs() {
        let pool = create_test_pool().await;

        let p1 = add_personality(&pool, NewPersonality::new("mia", "One", 1.0)).await;
        let p2 = add_personality(&pool, NewPersonality::new("mia", "Two", 1.0)).await;
        let conversation = add_conversation(&pool, "mia", true).await;
        database::record_tone_detection(&pool, &conversation.id, Tone::Casual, 0.9, 50)
            .await
            .unwrap();

        database::commit_switch(
            &pool,
            &conversation.id,
            &p1.id,
            SwitchReason::InitialAssignment,
            &SwitchOptions::default(),
            100,
        )
        .await
        .expect("Failed to commit first switch")
        .expect("First switch should be written");

        let options = SwitchOptions {
            detected_tone: Some(Tone::Playful),
            detected_language: None,
            triggered_by: Some("system".to_string()),
        };
        let second = database::commit_switch(
            &pool,
            &conversation.id,
            &p2.id,
            SwitchReason::AutoTone,
            &options,
            200,
        )
        .await
        .expect("Failed to commit second switch")
        .expect("Second switch should be written");

        assert_eq!(second.from_personality_id.as_deref(), Some(p1.id.as_str()));
        assert_eq!(second.triggered_by.as_deref(), Some("system"));

        let updated = fetch_conversation(&pool, &conversation.id).await;
        assert_eq!(updated.ai_personality_id.as_deref(), Some(p2.id.as_str()));
        assert_eq!(updated.detected_tone, Some(Tone::Playful));
        assert_eq!(updated.last_tone_check, Some(200));

        let history = database::list_switches(&pool, &conversation.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].reason, SwitchReason::InitialAssignment);
        assert!(history[0].from_personality_id.is_none());
        assert_eq!(history[1].reason, SwitchReason::AutoTone);
    }

    #[tokio::test]
    async fn test_switch_without_tone_keeps_stored_tone() {
        let pool = create_test_pool().await;

        let p1 = add_personality(&pool, NewPersonality::new("mia", "One", 1.0)).await;
        let conversation = add_conversation(&pool, "mia", true).await;
        database::record_tone_detection(&pool, &conversation.id, Tone::Romantic, 0.9, 50)
            .await
            .unwrap();

        database::commit_switch(
            &pool,
            &conversation.id,
            &p1.id,
            SwitchReason::Manual,
            &SwitchOptions::default(),
            60,
        )
        .await
        .unwrap()
        .expect("Switch should be written");

        let updated = fetch_conversation(&pool, &conversation.id).await;
        assert_eq!(updated.detected_tone, Some(Tone::Romantic));
    }

    #[tokio::test]
    async fn test_commit_to_current_personality_writes_nothing() {
        let pool = create_test_pool().await;

        let p1 = add_personality(&pool, NewPersonality::new("mia", "One", 1.0)).await;
        let conversation = add_conversation(&pool, "mia", true).await;
        database::commit_switch(
            &pool,
            &conversation.id,
            &p1.id,
            SwitchReason::InitialAssignment,
            &SwitchOptions::default(),
            100,
        )
        .await
        .unwrap();

        let repeated = database::commit_switch(
            &pool,
            &conversation.id,
            &p1.id,
            SwitchReason::AutoTone,
            &SwitchOptions {
                detected_tone: Some(Tone::Playful),
                ..SwitchOptions::default()
            },
            200,
        )
        .await
        .unwrap();
        assert!(repeated.is_none());

        let unchanged = fetch_conversation(&pool, &conversation.id).await;
        assert_eq!(unchanged.last_tone_check, Some(100));
        assert!(unchanged.detected_tone.is_none());
        assert_eq!(database::list_switches(&pool, &conversation.id).await.unwrap().len(), 1);

        let missing = database::commit_switch(
            &pool,
            "nope",
            &p1.id,
            SwitchReason::InitialAssignment,
            &SwitchOptions::default(),
            300,
        )
        .await
        .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_stat_rows_window() {
        let pool = create_test_pool().await;

        let p1 = add_personality(&pool, NewPersonality::new("mia", "One", 1.0)).await;
        let conversation = add_conversation(&pool, "mia", false).await;
        for ts in [100, 200, 300] {
            database::commit_switch(
                &pool,
                &conversation.id,
                &p1.id,
                SwitchReason::InitialAssignment,
                &SwitchOptions::default(),
                ts,
            )
            .await
            .unwrap();
        }

        let all = database::switch_stat_rows(&pool, "mia", None, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let window = database::switch_stat_rows(&pool, "mia", Some(200), Some(300)).await.unwrap();
        assert_eq!(window.len(), 2);

        let other = database::switch_stat_rows(&pool, "zoe", None, None).await.unwrap();
        assert!(other.is_empty());
    }
}

#[cfg(test)]
mod init_tests {
    use super::*;

    #[tokio::test]
    async fn test_init_db_creates_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let db_path = dir.path().join("router.sqlite");
        let config = RouterConfig {
            database_url: format!("sqlite://{}", db_path.display()),
            ..RouterConfig::default()
        };

        let pool = database::init_db(&config).await.expect("Failed to init db");
        assert!(db_path.exists());

        let personalities = database::list_active_personalities(&pool, "mia").await.unwrap();
        assert!(personalities.is_empty());
        pool.close().await;
    }
}
