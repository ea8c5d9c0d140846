//! Conversational tone classification.
//!
//! Counts multilingual keyword and emoji occurrences per tone over a fan's recent
//! messages. Confidence is the winning tone's share of all matches, so tones with
//! longer keyword lists are not favoured.

use crate::models::{recent_fan_texts, ConversationMessage, Tone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// Share of all keyword matches the dominant tone must reach.
pub const TONE_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Number of recent fan messages considered.
pub const TONE_WINDOW: usize = 10;

/// Minimum number of fan messages with text before a tone is reported.
pub const MIN_TONE_MESSAGES: usize = 3;

const ROMANTIC_KEYWORDS: &[&str] = &[
    // English
    "love", "miss you", "heart", "darling", "sweetheart", "beautiful", "romantic", "kiss",
    "cuddle", "forever",
    // French
    "mon amour", "je t'aime", "chéri", "mon cœur",
    // Spanish
    "te quiero", "te amo", "mi amor", "corazón",
    // German
    "ich liebe dich", "schatz", "liebling",
    // Italian
    "ti amo", "amore mio", "tesoro",
    // Portuguese
    "meu amor", "saudade",
    // Emoji. The bare heart also matches its emoji-presentation form.
    "\u{2764}", "😍", "🥰", "💕", "😘",
];

const PLAYFUL_KEYWORDS: &[&str] = &[
    // English
    "haha", "lol", "lmao", "hehe", "tease", "joke", "funny", "silly", "game", "play",
    // French
    "mdr", "ptdr", "blague",
    // Spanish
    "jaja", "jeje", "broma",
    // German
    "witzig", "spiel",
    // Italian
    "scherzo", "giochiamo",
    // Portuguese
    "kkkk", "brincadeira",
    // Emoji
    "😂", "🤣", "😜", "😉", "😋",
];

const EXPLICIT_KEYWORDS: &[&str] = &[
    // English
    "naked", "nude", "sex", "horny", "strip", "your body", "so wet",
    // French
    "toute nue", "excité", "chaud",
    // Spanish
    "caliente", "cachondo",
    // German
    "nackt", "geil",
    // Italian
    "nuda", "eccitat",
    // Portuguese
    "pelada", "tesão", "gostosa",
    // Emoji
    "🍆", "🍑", "💦", "🔥",
];

const CASUAL_KEYWORDS: &[&str] = &[
    // English
    "how are you", "what's up", "wyd", "today", "work", "weekend", "weather", "dinner", "lunch",
    "tired",
    // French
    "ça va", "quoi de neuf", "boulot",
    // Spanish
    "qué tal", "trabajo",
    // German
    "wie geht", "arbeit",
    // Italian
    "come stai", "lavoro",
    // Portuguese
    "tudo bem", "trabalho",
    // Emoji
    "👋", "🙂", "☕",
];

const DEMANDING_KEYWORDS: &[&str] = &[
    // English
    "right now", "hurry", "immediately", "send me", "show me", "i want", "i need", "give me",
    "answer me",
    // French
    "maintenant", "tout de suite", "envoie",
    // Spanish
    "ahora", "rápido", "envíame",
    // German
    "sofort", "schick",
    // Italian
    "subito", "manda",
    // Portuguese
    "agora", "depressa",
    // Emoji
    "😤", "😡",
];

fn keywords_for(tone: Tone) -> &'static [&'static str] {
    match tone {
        Tone::Romantic => ROMANTIC_KEYWORDS,
        Tone::Playful => PLAYFUL_KEYWORDS,
        Tone::Explicit => EXPLICIT_KEYWORDS,
        Tone::Casual => CASUAL_KEYWORDS,
        Tone::Demanding => DEMANDING_KEYWORDS,
    }
}

// Compile patterns once at startup
static TONE_PATTERNS: LazyLock<Vec<(Tone, Vec<Regex>)>> = LazyLock::new(|| {
    Tone::ALL
        .into_iter()
        .map(|tone| {
            let patterns = keywords_for(tone)
                .iter()
                .map(|kw| {
                    Regex::new(&format!("(?i){}", regex::escape(kw)))
                        .expect("Invalid regex: escaped tone keyword")
                })
                .collect();
            (tone, patterns)
        })
        .collect()
});

/// Outcome of a tone classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneResult {
    /// Dominant tone, or `None` when no tone is clearly dominant.
    pub tone: Option<Tone>,
    /// Share of all keyword matches held by `tone` (0.0 - 1.0).
    pub confidence: f64,
}

impl ToneResult {
    pub fn none() -> Self {
        Self {
            tone: None,
            confidence: 0.0,
        }
    }
}

/// Keyword-based tone classifier.
#[derive(Debug, Clone)]
pub struct ToneClassifier {
    threshold: f64,
    window: usize,
    min_messages: usize,
}

impl Default for ToneClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneClassifier {
    pub fn new() -> Self {
        Self::with_config(TONE_CONFIDENCE_THRESHOLD, TONE_WINDOW, MIN_TONE_MESSAGES)
    }

    pub fn with_config(threshold: f64, window: usize, min_messages: usize) -> Self {
        Self {
            threshold,
            window,
            min_messages,
        }
    }

    /// Match counts per tone over `buffer`, in [`Tone::ALL`] order.
    fn count_matches(buffer: &str) -> Vec<(Tone, usize)> {
        TONE_PATTERNS
            .iter()
            .map(|(tone, patterns)| {
                let count = patterns.iter().map(|re| re.find_iter(buffer).count()).sum();
                (*tone, count)
            })
            .collect()
    }

    /// Classifies the tone of the last messages `fan_user_id` sent.
    pub fn classify(&self, messages: &[ConversationMessage], fan_user_id: &str) -> ToneResult {
        let texts = recent_fan_texts(messages, fan_user_id, self.window);
        if texts.len() < self.min_messages {
            return ToneResult::none();
        }

        let buffer = texts.join(" ").to_lowercase();
        let counts = Self::count_matches(&buffer);
        let total: usize = counts.iter().map(|(_, c)| c).sum();
        if total == 0 {
            return ToneResult::none();
        }

        let mut dominant = counts[0];
        for &(tone, count) in &counts[1..] {
            if count > dominant.1 {
                dominant = (tone, count);
            }
        }

        let confidence = dominant.1 as f64 / total as f64;
        debug!(
            tone = %dominant.0,
            matches = dominant.1,
            total,
            confidence,
            "Tone candidate"
        );

        if confidence >= self.threshold {
            ToneResult {
                tone: Some(dominant.0),
                confidence,
            }
        } else {
            ToneResult::none()
        }
    }
}

/// Classifies with the default threshold and window.
pub fn detect_conversation_tone(messages: &[ConversationMessage], fan_user_id: &str) -> ToneResult {
    ToneClassifier::new().classify(messages, fan_user_id)
}
