//! Persona Router
//!
//! Per-conversation routing of AI personalities: detects the language and tone a
//! fan writes in, picks personalities by weighted traffic share, and switches the
//! answering personality under a rate-limited, audited policy.
//!
//! ## Modules
//! - `brain`: pure language and tone detectors
//! - `router`: selection, switch policy, statistics
//! - `database`: SQLite persistence
//! - `models`: persisted records and input types
//! - `config`, `error`, `telemetry`: configuration, error type, tracing setup

pub mod brain;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod router;
pub mod telemetry;

pub use config::{LogFormat, RouterConfig};
pub use error::AppError;
pub use models::{
    Conversation, ConversationMessage, FanProfile, NewPersonality, Personality,
    PersonalitySwitch, SwitchOptions, SwitchReason, Tone,
};
pub use router::{Clock, PersonalityRouter, PersonalityStats, SystemClock};

#[cfg(test)]
mod tests;
