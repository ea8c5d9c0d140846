//! # Brain Module
//!
//! Fast, pure signal extraction from fan messages. No I/O, no shared state:
//! every function here is safe to call concurrently.
//!
//! ## Components
//! - `language`: lexicon and script based language detection
//! - `tone`: multilingual keyword based tone classification

pub mod language;
pub mod tone;

pub use language::{
    detect_language, detect_language_from_messages, detect_language_with_confidence,
    LanguageDetection,
};
pub use tone::{detect_conversation_tone, ToneClassifier, ToneResult, TONE_CONFIDENCE_THRESHOLD};
