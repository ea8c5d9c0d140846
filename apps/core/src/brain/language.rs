//! Language detection from short chat messages.
//!
//! Scores text against per-language lexicons of high-frequency words and, for
//! non-Latin scripts, against a Unicode script pattern. Script hits weigh ten times
//! a lexicon hit since they are close to unambiguous.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::trace;

/// Texts shorter than this (in characters, trimmed) are never classified.
pub const MIN_TEXT_CHARS: usize = 3;

/// Minimum absolute score a language needs to be accepted.
pub const MIN_LANGUAGE_SCORE: usize = 2;

const SCRIPT_WEIGHT: usize = 10;

const LEXICON_EN: &[&str] = &[
    "the", "and", "you", "are", "is", "was", "what", "how", "why", "when", "where", "this", "that",
    "with", "have", "for", "not", "but", "your", "my", "me", "love", "hello", "hey", "thanks",
    "please", "want", "like", "good", "today", "going", "can", "will", "just", "know", "think",
    "really", "baby", "doing", "would", "could", "yes", "from", "about", "tonight", "it's", "i'm",
];

const LEXICON_FR: &[&str] = &[
    "je", "tu", "il", "elle", "nous", "vous", "le", "la", "les", "un", "une", "des", "est", "et",
    "pas", "que", "qui", "mon", "ma", "mes", "ton", "ta", "tes", "bonjour", "salut", "merci",
    "comment", "pourquoi", "avec", "pour", "dans", "aujourd'hui", "amour", "oui", "non", "très",
    "bien", "suis", "c'est", "vas-tu", "ça", "ce", "cette", "chérie", "bisous", "beaucoup",
    "aime", "toi", "moi",
];

const LEXICON_ES: &[&str] = &[
    "el", "la", "los", "las", "un", "una", "es", "que", "de", "no", "por", "para", "con", "hola",
    "gracias", "cómo", "como", "qué", "estás", "estoy", "muy", "bien", "amor", "mi", "tu", "te",
    "quiero", "hoy", "buenos", "días", "sí", "pero", "también", "eres", "besos", "cariño",
];

const LEXICON_DE: &[&str] = &[
    "der", "die", "das", "und", "ist", "ich", "du", "nicht", "ein", "eine", "mit", "wie", "was",
    "hallo", "danke", "bitte", "geht", "gut", "heute", "liebe", "mein", "meine", "dich", "dir",
    "sehr", "ja", "nein", "schatz", "auch", "bist", "habe",
];

const LEXICON_IT: &[&str] = &[
    "il", "lo", "la", "gli", "le", "un", "una", "che", "di", "non", "per", "con", "ciao",
    "grazie", "come", "stai", "sto", "bene", "amore", "mio", "mia", "ti", "voglio", "oggi",
    "molto", "sono", "sei", "anche", "tesoro", "buongiorno",
];

const LEXICON_PT: &[&str] = &[
    "os", "as", "um", "uma", "que", "de", "não", "por", "para", "com", "olá", "oi", "obrigado",
    "obrigada", "como", "está", "estou", "muito", "bem", "amor", "meu", "minha", "te", "quero",
    "hoje", "você", "tudo", "também", "beijos", "querida",
];

/// Lexicon and/or script pattern for one language.
struct LanguageProfile {
    code: &'static str,
    lexicon: HashSet<&'static str>,
    script: Option<Regex>,
}

impl LanguageProfile {
    fn lexical(code: &'static str, words: &[&'static str]) -> Self {
        Self {
            code,
            lexicon: words.iter().copied().collect(),
            script: None,
        }
    }

    fn scripted(code: &'static str, pattern: &str) -> Self {
        Self {
            code,
            lexicon: HashSet::new(),
            // NOTE: patterns are compile-time constants, a failure here is a programming error
            script: Some(Regex::new(pattern).expect("Invalid regex: script pattern")),
        }
    }

    /// Weighted score and raw number of matches.
    fn score(&self, text: &str, words: &[String]) -> (usize, usize) {
        let script_hits = self
            .script
            .as_ref()
            .map(|re| re.find_iter(text).count())
            .unwrap_or(0);
        let lexicon_hits = words
            .iter()
            .filter(|w| self.lexicon.contains(w.as_str()))
            .count();
        (script_hits * SCRIPT_WEIGHT + lexicon_hits, script_hits + lexicon_hits)
    }
}

// Declaration order breaks ties between equal scores.
static PROFILES: LazyLock<Vec<LanguageProfile>> = LazyLock::new(|| {
    vec![
        LanguageProfile::lexical("en", LEXICON_EN),
        LanguageProfile::lexical("fr", LEXICON_FR),
        LanguageProfile::lexical("es", LEXICON_ES),
        LanguageProfile::lexical("de", LEXICON_DE),
        LanguageProfile::lexical("it", LEXICON_IT),
        LanguageProfile::lexical("pt", LEXICON_PT),
        LanguageProfile::scripted("zh", r"\p{Han}"),
        LanguageProfile::scripted("ja", r"[\p{Hiragana}\p{Katakana}]"),
        LanguageProfile::scripted("ko", r"\p{Hangul}"),
        LanguageProfile::scripted("ar", r"\p{Arabic}"),
        LanguageProfile::scripted("ru", r"\p{Cyrillic}"),
        LanguageProfile::scripted("hi", r"\p{Devanagari}"),
    ]
});

/// Result of a single-text detection with its confidence (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LanguageDetection {
    pub language: Option<&'static str>,
    pub confidence: u8,
}

impl LanguageDetection {
    fn none() -> Self {
        Self {
            language: None,
            confidence: 0,
        }
    }
}

struct BestMatch {
    language: &'static str,
    score: usize,
    matches: usize,
    word_count: usize,
}

/// Lowercased whitespace tokens with surrounding punctuation stripped.
/// Single-character tokens are dropped.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 1)
        .map(|w| w.to_string())
        .collect()
}

fn best_match(text: &str) -> Option<BestMatch> {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_TEXT_CHARS {
        return None;
    }

    let words = tokenize(trimmed);
    let mut best: Option<BestMatch> = None;
    for profile in PROFILES.iter() {
        let (score, matches) = profile.score(trimmed, &words);
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(BestMatch {
                language: profile.code,
                score,
                matches,
                word_count: words.len(),
            });
        }
    }

    best.filter(|b| b.score >= MIN_LANGUAGE_SCORE)
}

fn ratio_percent(matches: usize, word_count: usize) -> u8 {
    let ratio = matches as f64 / word_count.max(1) as f64 * 100.0;
    ratio.round().min(100.0) as u8
}

/// Guesses the ISO code of the language `text` is written in.
///
/// Returns `None` for blank or very short text, and whenever no language reaches
/// [`MIN_LANGUAGE_SCORE`].
pub fn detect_language(text: &str) -> Option<&'static str> {
    let best = best_match(text)?;
    trace!(
        language = best.language,
        score = best.score,
        confidence = ratio_percent(best.score, best.word_count),
        "Language detected"
    );
    Some(best.language)
}

/// Like [`detect_language`] but also reports how much of the text supports the guess.
///
/// Confidence is the winning language's unweighted match count over the token
/// count, as a rounded percentage capped at 100.
pub fn detect_language_with_confidence(text: &str) -> LanguageDetection {
    match best_match(text) {
        Some(best) => LanguageDetection {
            language: Some(best.language),
            confidence: ratio_percent(best.matches, best.word_count),
        },
        None => LanguageDetection::none(),
    }
}

/// Most frequent language across `texts`.
///
/// Messages without a confident detection are ignored. Ties go to the language
/// that was seen first.
pub fn detect_language_from_messages<I, S>(texts: I) -> Option<&'static str>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for text in texts {
        if let Some(language) = detect_language(text.as_ref()) {
            match counts.iter_mut().find(|(code, _)| *code == language) {
                Some((_, count)) => *count += 1,
                None => counts.push((language, 1)),
            }
        }
    }

    let mut winner: Option<(&'static str, usize)> = None;
    for (language, count) in counts {
        if winner.map_or(true, |(_, best)| count > best) {
            winner = Some((language, count));
        }
    }
    winner.map(|(language, _)| language)
}
