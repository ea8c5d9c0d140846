use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use validator::Validate;

/// Coarse classification of a fan's conversational mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Tone {
    Romantic,
    Playful,
    Explicit,
    Casual,
    Demanding,
}

impl Tone {
    /// All tones, in tie-breaking order.
    pub const ALL: [Tone; 5] = [
        Tone::Romantic,
        Tone::Playful,
        Tone::Explicit,
        Tone::Casual,
        Tone::Demanding,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Tone::Romantic => "romantic",
            Tone::Playful => "playful",
            Tone::Explicit => "explicit",
            Tone::Casual => "casual",
            Tone::Demanding => "demanding",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tone::ALL
            .into_iter()
            .find(|tone| tone.label() == s)
            .ok_or_else(|| format!("unknown tone: {}", s))
    }
}

/// Why a conversation's personality changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SwitchReason {
    AutoTone,
    AutoLanguage,
    Manual,
    InitialAssignment,
}

impl SwitchReason {
    pub fn label(&self) -> &'static str {
        match self {
            SwitchReason::AutoTone => "auto_tone",
            SwitchReason::AutoLanguage => "auto_language",
            SwitchReason::Manual => "manual",
            SwitchReason::InitialAssignment => "initial_assignment",
        }
    }
}

impl fmt::Display for SwitchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A configured AI persona owned by a creator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Personality {
    /// The unique identifier for the personality (UUID).
    pub id: String,
    /// Slug of the owning creator.
    pub creator_slug: String,
    /// Display name, used when reporting switch statistics.
    pub name: String,
    /// Inactive personalities are never selected.
    pub is_active: bool,
    /// Relative weight for random selection. Values need not sum to one.
    pub traffic_share: f64,
    /// ISO language code. `None` marks a universal personality.
    pub language: Option<String>,
    /// Tone this personality is primarily built for.
    pub primary_tone: Option<Tone>,
    /// JSON-encoded array of additional tones, as stored.
    pub tone_keywords: Option<String>,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

impl Personality {
    /// Whether this personality declares no language.
    pub fn is_universal(&self) -> bool {
        self.language.is_none()
    }

    /// Parses the stored `tone_keywords` column.
    ///
    /// Returns `None` when the column is empty or holds malformed JSON, so that a
    /// single corrupt record never aborts a lookup. Unrecognised tone names inside a
    /// well-formed array are ignored.
    pub fn tone_keywords(&self) -> Option<Vec<Tone>> {
        let raw = self.tone_keywords.as_deref()?;
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(names) => Some(names.iter().filter_map(|n| n.parse().ok()).collect()),
            Err(e) => {
                warn!(personality_id = %self.id, error = %e, "Skipping malformed tone_keywords");
                None
            }
        }
    }

    /// Whether the personality matches `tone` through its tone keyword list.
    pub fn matches_tone_keyword(&self, tone: Tone) -> bool {
        self.tone_keywords()
            .map(|tones| tones.contains(&tone))
            .unwrap_or(false)
    }
}

/// Input for creating a personality.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPersonality {
    #[validate(length(min = 1))]
    pub creator_slug: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 0.0))]
    pub traffic_share: f64,
    #[validate(length(min = 2, max = 8))]
    pub language: Option<String>,
    pub primary_tone: Option<Tone>,
    #[serde(default)]
    pub tone_keywords: Vec<Tone>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewPersonality {
    pub fn new(creator_slug: &str, name: &str, traffic_share: f64) -> Self {
        Self {
            creator_slug: creator_slug.to_string(),
            name: name.to_string(),
            traffic_share,
            language: None,
            primary_tone: None,
            tone_keywords: Vec::new(),
            is_active: true,
        }
    }

    pub fn language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn primary_tone(mut self, tone: Tone) -> Self {
        self.primary_tone = Some(tone);
        self
    }

    pub fn tone_keywords(mut self, tones: &[Tone]) -> Self {
        self.tone_keywords = tones.to_vec();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A fan/creator conversation and its AI routing state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    /// The unique identifier for the conversation (UUID).
    pub id: String,
    pub creator_slug: String,
    /// Personality currently answering, if any.
    pub ai_personality_id: Option<String>,
    /// Last confidently classified tone.
    pub detected_tone: Option<Tone>,
    /// Confidence of the last tone check.
    pub tone_confidence: f64,
    /// Unix timestamp of the last tone evaluation.
    pub last_tone_check: Option<i64>,
    /// Opt-in flag for tone-driven switching.
    pub auto_tone_switch: bool,
    pub created_at: i64,
}

/// A row of the append-only switch audit log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PersonalitySwitch {
    pub id: String,
    pub conversation_id: String,
    /// `None` on the first assignment.
    pub from_personality_id: Option<String>,
    pub to_personality_id: String,
    pub reason: SwitchReason,
    pub detected_tone: Option<Tone>,
    pub detected_language: Option<String>,
    /// Actor that requested the switch, for manual changes.
    pub triggered_by: Option<String>,
    pub created_at: i64,
}

/// Per-creator view of a fan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FanProfile {
    pub fan_user_id: String,
    pub creator_slug: String,
    /// Last confidently detected language.
    pub language: Option<String>,
    pub updated_at: i64,
}

/// A conversation message as handed to the router, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub text: Option<String>,
    pub sender_id: String,
}

impl ConversationMessage {
    pub fn new(sender_id: &str, text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            sender_id: sender_id.to_string(),
        }
    }

    /// A message without text (media, tips, ...).
    pub fn without_text(sender_id: &str) -> Self {
        Self {
            text: None,
            sender_id: sender_id.to_string(),
        }
    }
}

/// Returns the texts of the last `limit` messages sent by `fan_user_id` that carry text.
pub fn recent_fan_texts<'a>(
    messages: &'a [ConversationMessage],
    fan_user_id: &str,
    limit: usize,
) -> Vec<&'a str> {
    let texts: Vec<&str> = messages
        .iter()
        .filter(|m| m.sender_id == fan_user_id)
        .filter_map(|m| m.text.as_deref())
        .collect();
    let skip = texts.len().saturating_sub(limit);
    texts.into_iter().skip(skip).collect()
}

/// Optional context recorded alongside a switch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchOptions {
    pub detected_tone: Option<Tone>,
    pub detected_language: Option<String>,
    pub triggered_by: Option<String>,
}
