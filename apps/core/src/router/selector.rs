//! Personality selection.
//!
//! Random selection is weighted by `traffic_share`; the deterministic lookups
//! used by the switch policy always take the highest share.

use crate::models::{Personality, Tone};
use rand::Rng;
use std::borrow::Borrow;

/// Weighted random pick among `candidates`.
///
/// Shares are relative weights. When they sum to zero the first candidate wins.
/// Bucket boundaries are inclusive on the upper end: a draw equal to a cumulative
/// share selects that candidate.
pub fn select_from_personalities<'a, P, R>(candidates: &'a [P], rng: &mut R) -> Option<&'a P>
where
    P: Borrow<Personality>,
    R: Rng + ?Sized,
{
    let share = |p: &P| Borrow::<Personality>::borrow(p).traffic_share.max(0.0);

    let first = candidates.first()?;
    let total: f64 = candidates.iter().map(share).sum();
    if total <= 0.0 {
        return Some(first);
    }

    let draw = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for candidate in candidates {
        cumulative += share(candidate);
        if cumulative >= draw {
            return Some(candidate);
        }
    }

    // Floating point rounding can leave the draw just above the final sum.
    candidates.last()
}

/// Narrows `personalities` to the pool a new conversation should draw from.
///
/// With a language hint: exact-language personalities, else universal ones.
/// Without a hint, or when neither exists, every personality.
pub fn candidates_for_language<'a>(
    personalities: &'a [Personality],
    language: Option<&str>,
) -> Vec<&'a Personality> {
    if let Some(language) = language {
        let exact: Vec<&Personality> = personalities
            .iter()
            .filter(|p| p.language.as_deref() == Some(language))
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        let universal: Vec<&Personality> =
            personalities.iter().filter(|p| p.is_universal()).collect();
        if !universal.is_empty() {
            return universal;
        }
    }

    personalities.iter().collect()
}

/// First personality with the highest share among those matching `predicate`.
fn highest_share<'a, F>(personalities: &'a [Personality], predicate: F) -> Option<&'a Personality>
where
    F: Fn(&Personality) -> bool,
{
    personalities
        .iter()
        .filter(|&p| predicate(p))
        .fold(None, |best: Option<&Personality>, p| match best {
            Some(b) if b.traffic_share >= p.traffic_share => Some(b),
            _ => Some(p),
        })
}

/// Deterministic language lookup: best exact match, else best universal personality.
pub fn best_for_language<'a>(
    personalities: &'a [Personality],
    language: &str,
) -> Option<&'a Personality> {
    highest_share(personalities, |p| p.language.as_deref() == Some(language))
        .or_else(|| highest_share(personalities, Personality::is_universal))
}

/// Deterministic tone lookup: best `primary_tone` match, else best personality
/// listing the tone in its tone keywords. Records with malformed keywords are skipped.
pub fn best_for_tone(personalities: &[Personality], tone: Tone) -> Option<&Personality> {
    highest_share(personalities, |p| p.primary_tone == Some(tone))
        .or_else(|| highest_share(personalities, |p| p.matches_tone_keyword(tone)))
}
