use chrono::{DateTime, Duration, Utc};

/// Rate limit on tone re-evaluation of a single conversation.
///
/// Unlike an in-memory sliding window, the last check time lives on the
/// conversation record, so the limit holds across processes.
#[derive(Debug, Clone, Copy)]
pub struct ToneCheckCooldown {
    /// Minimum time between two evaluations.
    window: Duration,
}

impl Default for ToneCheckCooldown {
    fn default() -> Self {
        Self::from_secs(300)
    }
}

impl ToneCheckCooldown {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_secs(secs: u64) -> Self {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        Self::new(Duration::seconds(secs))
    }

    /// Time left before the next check is allowed, if any.
    ///
    /// # Arguments
    ///
    /// * `last_check` - Unix timestamp of the previous check, `None` if never checked.
    /// * `now` - Current time.
    pub fn remaining(&self, last_check: Option<i64>, now: DateTime<Utc>) -> Option<Duration> {
        let last_check = last_check?;
        let elapsed = Duration::seconds(now.timestamp() - last_check);
        if elapsed < self.window {
            Some(self.window - elapsed)
        } else {
            None
        }
    }
}
