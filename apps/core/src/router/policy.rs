//! Switch policy engine.
//!
//! Decides, per conversation, whether the answering personality should change
//! after new fan messages, and commits changes together with their audit row.
//!
//! `check_*` methods only propose a target; [`PersonalityRouter::switch_personality`]
//! commits it. [`PersonalityRouter::process_fan_message`] chains both for callers
//! that want the default behaviour.

use crate::brain::{detect_language_from_messages, ToneClassifier};
use crate::config::RouterConfig;
use crate::database;
use crate::error::AppError;
use crate::models::{
    recent_fan_texts, Conversation, ConversationMessage, NewPersonality, Personality,
    PersonalitySwitch, SwitchOptions, SwitchReason, Tone,
};
use crate::router::cooldown::ToneCheckCooldown;
use crate::router::selector::{
    best_for_language, best_for_tone, candidates_for_language, select_from_personalities,
};
use crate::router::stats::PersonalityStats;
use crate::router::traits::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A language-driven switch proposal.
#[derive(Debug, Clone, PartialEq)]
struct LanguageProposal {
    personality_id: String,
    language: &'static str,
}

/// A tone-driven switch proposal.
#[derive(Debug, Clone, PartialEq)]
struct ToneProposal {
    personality_id: String,
    tone: Tone,
}

/// Entry point for personality routing decisions.
///
/// Cheap to clone; clones share the pool and clock.
#[derive(Clone)]
pub struct PersonalityRouter {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    tone_classifier: ToneClassifier,
    cooldown: ToneCheckCooldown,
    language_window: usize,
    min_language_messages: usize,
}

impl PersonalityRouter {
    pub fn new(pool: SqlitePool, config: &RouterConfig) -> Self {
        Self::with_clock(pool, config, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, config: &RouterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            tone_classifier: ToneClassifier::with_config(
                config.tone_confidence_threshold,
                config.tone_window,
                config.min_tone_messages,
            ),
            cooldown: ToneCheckCooldown::from_secs(config.tone_check_cooldown_secs),
            language_window: config.language_window,
            min_language_messages: config.min_language_messages,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn now_ts(&self) -> i64 {
        self.clock.now().timestamp()
    }

    // --- Records ---

    /// Stores a new personality, stamped with the router's clock.
    pub async fn create_personality(
        &self,
        personality: NewPersonality,
    ) -> Result<Personality, AppError> {
        database::create_personality(&self.pool, personality, self.now_ts()).await
    }

    /// Opens a conversation with no personality assigned yet.
    pub async fn create_conversation(
        &self,
        creator_slug: &str,
        auto_tone_switch: bool,
    ) -> Result<Conversation, AppError> {
        Ok(database::create_conversation(&self.pool, creator_slug, auto_tone_switch, self.now_ts())
            .await?)
    }

    // --- Selection ---

    /// Weighted random choice of a personality for a new conversation.
    ///
    /// Returns `None` when the creator has no active personality.
    #[instrument(skip(self))]
    pub async fn select_personality_for_conversation(
        &self,
        creator_slug: &str,
        language: Option<&str>,
    ) -> Result<Option<String>, AppError> {
        let personalities = database::list_active_personalities(&self.pool, creator_slug).await?;
        if personalities.is_empty() {
            debug!("No active personality, AI replies disabled for creator");
            return Ok(None);
        }

        let candidates = candidates_for_language(&personalities, language);
        let picked = select_from_personalities(&candidates, &mut rand::thread_rng());
        Ok(picked.map(|p| p.id.clone()))
    }

    /// Highest-share personality speaking `language`, else the highest-share
    /// universal one.
    pub async fn find_personality_for_language(
        &self,
        creator_slug: &str,
        language: &str,
    ) -> Result<Option<String>, AppError> {
        let personalities = database::list_active_personalities(&self.pool, creator_slug).await?;
        Ok(best_for_language(&personalities, language).map(|p| p.id.clone()))
    }

    /// Highest-share personality built for `tone`, else the highest-share one
    /// listing `tone` among its tone keywords.
    pub async fn find_personality_for_tone(
        &self,
        creator_slug: &str,
        tone: Tone,
    ) -> Result<Option<String>, AppError> {
        let personalities = database::list_active_personalities(&self.pool, creator_slug).await?;
        Ok(best_for_tone(&personalities, tone).map(|p| p.id.clone()))
    }

    // --- Language ---

    /// Detects the fan's language from their recent messages and remembers it on
    /// their profile for this creator.
    #[instrument(skip(self, messages))]
    pub async fn detect_and_store_fan_language(
        &self,
        fan_user_id: &str,
        creator_slug: &str,
        messages: &[ConversationMessage],
    ) -> Result<Option<&'static str>, AppError> {
        let texts = recent_fan_texts(messages, fan_user_id, self.language_window);
        let Some(language) = detect_language_from_messages(&texts) else {
            return Ok(None);
        };

        database::upsert_fan_language(
            &self.pool,
            fan_user_id,
            creator_slug,
            language,
            self.now_ts(),
        )
        .await?;
        debug!(language, "Fan language stored");
        Ok(Some(language))
    }

    async fn propose_language_switch(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
        fan_user_id: &str,
    ) -> Result<Option<LanguageProposal>, AppError> {
        let Some(conversation) = database::get_conversation(&self.pool, conversation_id).await?
        else {
            return Ok(None);
        };
        let Some(current_id) = conversation.ai_personality_id.as_deref() else {
            return Ok(None);
        };

        let texts = recent_fan_texts(messages, fan_user_id, self.language_window);
        if texts.len() < self.min_language_messages {
            return Ok(None);
        }

        let Some(language) = self
            .detect_and_store_fan_language(fan_user_id, &conversation.creator_slug, messages)
            .await?
        else {
            return Ok(None);
        };

        let Some(current) = database::get_personality(&self.pool, current_id).await? else {
            return Ok(None);
        };
        match current.language.as_deref() {
            None => {
                debug!("Current personality is universal, keeping it");
                return Ok(None);
            }
            Some(current_language) if current_language == language => return Ok(None),
            Some(_) => {}
        }

        let target = self
            .find_personality_for_language(&conversation.creator_slug, language)
            .await?;
        Ok(target
            .filter(|id| id.as_str() != current_id)
            .map(|personality_id| LanguageProposal {
                personality_id,
                language,
            }))
    }

    /// Proposes a personality matching the language the fan writes in, when it
    /// differs from the current personality's declared language.
    ///
    /// Stores the detected language on the fan's profile whenever detection
    /// succeeds. Nothing is switched; commit with [`Self::switch_personality`].
    #[instrument(skip(self, messages))]
    pub async fn check_for_language_switch(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
        fan_user_id: &str,
    ) -> Result<Option<String>, AppError> {
        Ok(self
            .propose_language_switch(conversation_id, messages, fan_user_id)
            .await?
            .map(|p| p.personality_id))
    }

    // --- Tone ---

    async fn propose_tone_switch(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
        fan_user_id: &str,
    ) -> Result<Option<ToneProposal>, AppError> {
        let Some(conversation) = database::get_conversation(&self.pool, conversation_id).await?
        else {
            return Ok(None);
        };
        if !conversation.auto_tone_switch {
            return Ok(None);
        }
        let Some(current_id) = conversation.ai_personality_id.as_deref() else {
            return Ok(None);
        };

        let now = self.clock.now();
        if let Some(remaining) = self.cooldown.remaining(conversation.last_tone_check, now) {
            debug!(remaining_secs = remaining.num_seconds(), "Tone check cooling down");
            return Ok(None);
        }

        let result = self.tone_classifier.classify(messages, fan_user_id);
        let checked_at = now.timestamp();
        let tone = match result.tone {
            Some(tone) if conversation.detected_tone != Some(tone) => tone,
            _ => {
                database::record_tone_check(&self.pool, conversation_id, result.confidence, checked_at)
                    .await?;
                return Ok(None);
            }
        };

        let target = self
            .find_personality_for_tone(&conversation.creator_slug, tone)
            .await?;
        match target {
            Some(personality_id) if personality_id != current_id => Ok(Some(ToneProposal {
                personality_id,
                tone,
            })),
            _ => {
                database::record_tone_detection(
                    &self.pool,
                    conversation_id,
                    tone,
                    result.confidence,
                    checked_at,
                )
                .await?;
                Ok(None)
            }
        }
    }

    /// Proposes a personality matching the fan's current tone.
    ///
    /// Only runs for conversations that opted into tone switching, at most once per
    /// cooldown window. Calls inside the window do no work and no writes.
    #[instrument(skip(self, messages))]
    pub async fn check_for_tone_switch(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
        fan_user_id: &str,
    ) -> Result<Option<String>, AppError> {
        Ok(self
            .propose_tone_switch(conversation_id, messages, fan_user_id)
            .await?
            .map(|p| p.personality_id))
    }

    // --- Commit ---

    /// Points the conversation at `to_personality_id` and appends an audit row.
    ///
    /// Returns `Ok(None)` without writing when the conversation already uses that
    /// personality, unless `reason` is [`SwitchReason::InitialAssignment`].
    #[instrument(skip(self, options))]
    pub async fn switch_personality(
        &self,
        conversation_id: &str,
        to_personality_id: &str,
        reason: SwitchReason,
        options: SwitchOptions,
    ) -> Result<Option<PersonalitySwitch>, AppError> {
        let conversation = database::get_conversation(&self.pool, conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("conversation {}", conversation_id)))?;

        if conversation.ai_personality_id.as_deref() == Some(to_personality_id)
            && reason != SwitchReason::InitialAssignment
        {
            debug!("Personality already active, nothing to switch");
            return Ok(None);
        }

        let target = database::get_personality(&self.pool, to_personality_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("personality {}", to_personality_id)))?;
        if target.creator_slug != conversation.creator_slug {
            return Err(AppError::Validation(format!(
                "personality {} does not belong to creator {}",
                to_personality_id, conversation.creator_slug
            )));
        }

        // The guard above is re-checked inside the transaction, where a concurrent
        // switch to the same personality is visible.
        let Some(switch) = database::commit_switch(
            &self.pool,
            conversation_id,
            to_personality_id,
            reason,
            &options,
            self.now_ts(),
        )
        .await?
        else {
            debug!("Personality switched concurrently, nothing to switch");
            return Ok(None);
        };

        info!(
            from = ?switch.from_personality_id,
            to = %switch.to_personality_id,
            %reason,
            "Personality switched"
        );
        Ok(Some(switch))
    }

    /// Picks and commits the first personality of a conversation.
    ///
    /// Always writes an audit row, even if the conversation already had the
    /// selected personality.
    #[instrument(skip(self))]
    pub async fn assign_initial_personality(
        &self,
        conversation_id: &str,
        language: Option<&str>,
    ) -> Result<Option<String>, AppError> {
        let conversation = database::get_conversation(&self.pool, conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("conversation {}", conversation_id)))?;

        let Some(personality_id) = self
            .select_personality_for_conversation(&conversation.creator_slug, language)
            .await?
        else {
            return Ok(None);
        };

        let options = SwitchOptions {
            detected_language: language.map(str::to_string),
            ..SwitchOptions::default()
        };
        self.switch_personality(
            conversation_id,
            &personality_id,
            SwitchReason::InitialAssignment,
            options,
        )
        .await?;
        Ok(Some(personality_id))
    }

    /// Runs the language check, then the tone check, for a new fan message and
    /// commits the first proposal found. Returns the personality switched to.
    #[instrument(skip(self, messages))]
    pub async fn process_fan_message(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
        fan_user_id: &str,
    ) -> Result<Option<String>, AppError> {
        if let Some(proposal) = self
            .propose_language_switch(conversation_id, messages, fan_user_id)
            .await?
        {
            let options = SwitchOptions {
                detected_language: Some(proposal.language.to_string()),
                ..SwitchOptions::default()
            };
            self.switch_personality(
                conversation_id,
                &proposal.personality_id,
                SwitchReason::AutoLanguage,
                options,
            )
            .await?;
            return Ok(Some(proposal.personality_id));
        }

        if let Some(proposal) = self
            .propose_tone_switch(conversation_id, messages, fan_user_id)
            .await?
        {
            let options = SwitchOptions {
                detected_tone: Some(proposal.tone),
                ..SwitchOptions::default()
            };
            self.switch_personality(
                conversation_id,
                &proposal.personality_id,
                SwitchReason::AutoTone,
                options,
            )
            .await?;
            return Ok(Some(proposal.personality_id));
        }

        Ok(None)
    }

    // --- Reporting ---

    pub async fn switch_history(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<PersonalitySwitch>, AppError> {
        Ok(database::list_switches(&self.pool, conversation_id).await?)
    }

    /// Switch counts for a creator, optionally limited to `[start, end]`.
    pub async fn get_personality_stats(
        &self,
        creator_slug: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<PersonalityStats, AppError> {
        let rows = database::switch_stat_rows(
            &self.pool,
            creator_slug,
            start.map(|d| d.timestamp()),
            end.map(|d| d.timestamp()),
        )
        .await?;
        Ok(PersonalityStats::from_rows(&rows))
    }
}
