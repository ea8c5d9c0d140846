//! # Router Module
//!
//! Decides which personality answers a conversation.
//!
//! ## Components
//! - `selector`: weighted random and deterministic personality lookups
//! - `policy`: language/tone switch proposals, audited commits (`PersonalityRouter`)
//! - `cooldown`: tone re-evaluation rate limit
//! - `stats`: switch statistics
//! - `traits`: time source seam

pub mod cooldown;
pub mod policy;
pub mod selector;
pub mod stats;
pub mod traits;

pub use cooldown::ToneCheckCooldown;
pub use policy::PersonalityRouter;
pub use selector::{best_for_language, best_for_tone, candidates_for_language, select_from_personalities};
pub use stats::PersonalityStats;
pub use traits::{Clock, SystemClock};
