//! Natural-language briefings for the external decision engine.
//!
//! A briefing is a deterministic rendering of an agent's personality and
//! most recent memories followed by the current situation. Sections always
//! appear in the same order:
//!
//! ```text
//! Backstory: <backstory>
//! Quirks: <quirk>; <quirk>
//! Traits: <trait> (strong), <trait> (moderate)
//! Recent memories:
//! [+] <content>
//! [-] <content>
//! Situation: <situation>
//! ```

use std::fmt::Write as _;

use crate::memory::MemoryRecord;
use crate::personality::PersonalityProfile;

/// Returned verbatim for agents without a personality profile.
pub const NEUTRAL_BRIEFING: &str = "You are an ordinary, even-tempered character with no notable \
history. Respond plainly and courteously, without strong opinions.";

/// Memories included in a briefing.
pub const BRIEFING_MEMORIES: usize = 5;

/// How prominently a trait shows up in a briefing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitStrength {
    /// Value above 60.
    Strong,
    /// Value in `(30, 60]`.
    Moderate,
}

impl TraitStrength {
    /// Classify a trait value; `None` for values of 30 or below.
    #[must_use]
    pub fn classify(value: u8) -> Option<Self> {
        match value {
            61.. => Some(Self::Strong),
            31..=60 => Some(Self::Moderate),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
        }
    }
}

/// Render a briefing.
///
/// `recent` is expected newest first; only the first
/// [`BRIEFING_MEMORIES`] are used. Without a profile the result is
/// [`NEUTRAL_BRIEFING`] regardless of the other arguments.
#[must_use]
pub fn build_briefing(
    profile: Option<&PersonalityProfile>,
    recent: &[MemoryRecord],
    situation: &str,
) -> String {
    let Some(profile) = profile else {
        return NEUTRAL_BRIEFING.to_string();
    };

    let mut out = String::with_capacity(256);
    let _ = writeln!(out, "Backstory: {}", profile.backstory);

    if profile.quirks.is_empty() {
        out.push_str("Quirks: none\n");
    } else {
        let _ = writeln!(out, "Quirks: {}", profile.quirks.join("; "));
    }

    // Strong traits first, then moderate, each in canonical trait order.
    let traits: Vec<String> = [TraitStrength::Strong, TraitStrength::Moderate]
        .into_iter()
        .flat_map(|strength| {
            profile
                .traits
                .iter()
                .filter(move |(_, v)| TraitStrength::classify(*v) == Some(strength))
                .map(move |(kind, _)| format!("{kind} ({})", strength.as_str()))
        })
        .collect();
    if traits.is_empty() {
        out.push_str("Traits: none notable\n");
    } else {
        let _ = writeln!(out, "Traits: {}", traits.join(", "));
    }

    if recent.is_empty() {
        out.push_str("Recent memories: none\n");
    } else {
        out.push_str("Recent memories:\n");
        for record in recent.iter().take(BRIEFING_MEMORIES) {
            let _ = writeln!(out, "[{}] {}", record.polarity.marker(), record.content);
        }
    }

    let _ = write!(out, "Situation: {situation}");
    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::memory::MemoryDraft;
    use crate::types::{AgentId, MemoryKind, Polarity, TraitVector};

    fn profile(values: [u8; 8], quirks: &[&str]) -> PersonalityProfile {
        PersonalityProfile::new(
            AgentId(1),
            TraitVector::saturating(values),
            "Raised by wolves.",
            quirks.iter().map(|q| (*q).to_string()).collect(),
        )
        .expect("valid")
    }

    fn memory(id: u64, content: &str, polarity: Polarity) -> MemoryRecord {
        MemoryDraft::new(MemoryKind::Interaction, content)
            .with_polarity(polarity)
            .into_record(id, Utc::now())
            .expect("valid")
    }

    #[test]
    fn no_profile_gives_fallback_verbatim() {
        let recent = vec![memory(0, "ignored", Polarity::Positive)];
        assert_eq!(build_briefing(None, &recent, "at the gate"), NEUTRAL_BRIEFING);
    }

    #[test]
    fn strength_boundaries() {
        assert_eq!(TraitStrength::classify(100), Some(TraitStrength::Strong));
        assert_eq!(TraitStrength::classify(61), Some(TraitStrength::Strong));
        assert_eq!(TraitStrength::classify(60), Some(TraitStrength::Moderate));
        assert_eq!(TraitStrength::classify(31), Some(TraitStrength::Moderate));
        assert_eq!(TraitStrength::classify(30), None);
        assert_eq!(TraitStrength::classify(0), None);
    }

    #[test]
    fn full_briefing_layout() {
        let p = profile([90, 31, 30, 0, 0, 0, 0, 61], &["whistles", "counts coins"]);
        let recent = vec![
            memory(2, "was thanked", Polarity::Positive),
            memory(1, "was insulted", Polarity::Negative),
        ];
        let text = build_briefing(Some(&p), &recent, "A stranger approaches.");
        assert_eq!(
            text,
            "Backstory: Raised by wolves.\n\
             Quirks: whistles; counts coins\n\
             Traits: aggression (strong), ambition (strong), curiosity (moderate)\n\
             Recent memories:\n\
             [+] was thanked\n\
             [-] was insulted\n\
             Situation: A stranger approaches."
        );
    }

    #[test]
    fn only_five_memories_and_empty_sections() {
        let p = profile([10; 8], &[]);
        let recent: Vec<_> = (0..8)
            .rev()
            .map(|i| memory(i, &format!("m{i}"), Polarity::Positive))
            .collect();
        let text = build_briefing(Some(&p), &recent, "");
        assert!(text.contains("Quirks: none\n"));
        assert!(text.contains("Traits: none notable\n"));
        assert_eq!(text.matches("[+]").count(), BRIEFING_MEMORIES);
        assert!(text.contains("[+] m7") && !text.contains("[+] m2"));

        let bare = build_briefing(Some(&p), &[], "idle");
        assert!(bare.contains("Recent memories: none\n"));
        assert!(bare.ends_with("Situation: idle"));
    }
}
