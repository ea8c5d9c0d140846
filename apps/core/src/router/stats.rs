use crate::database::SwitchStatRow;
use crate::models::{SwitchReason, Tone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Switch counts for a creator over a time window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityStats {
    pub total_switches: usize,
    /// Keyed by the name of the personality switched to.
    pub by_personality: BTreeMap<String, usize>,
    pub by_reason: BTreeMap<SwitchReason, usize>,
    /// Only switches that recorded a tone.
    pub by_tone: BTreeMap<Tone, usize>,
}

impl PersonalityStats {
    pub fn from_rows(rows: &[SwitchStatRow]) -> Self {
        let mut stats = Self {
            total_switches: rows.len(),
            ..Self::default()
        };

        for row in rows {
            *stats
                .by_personality
                .entry(row.personality_name.clone())
                .or_insert(0) += 1;
            *stats.by_reason.entry(row.reason).or_insert(0) += 1;
            if let Some(tone) = row.detected_tone {
                *stats.by_tone.entry(tone).or_insert(0) += 1;
            }
        }

        stats
    }
}
