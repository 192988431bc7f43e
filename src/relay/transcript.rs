// transcript.rs: Rejection filter applied to audio transcripts before a
// classification call is spent on them.

use serde::{Deserialize, Serialize};

/// Reply sent instead of a classification when a transcript is rejected.
pub const UNCLEAR_AUDIO_MESSAGE: &str = "The audio was too short, unclear, or not recognized as an animal sound. Please upload a different recording.";

/// Thresholds of the rejection filter. Defaults reproduce the deployed behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptPolicy {
    /// Transcripts with fewer characters are rejected.
    pub min_chars: usize,
    /// Transcripts with this many whitespace-delimited tokens or fewer are rejected.
    pub max_rejected_tokens: usize,
    /// Exact (lowercased, trimmed) utterances that are always rejected.
    pub filler_phrases: Vec<String>,
    /// Reject transcripts made only of digits, whitespace, `.`, `c` and `m`.
    pub reject_measurements: bool,
}

impl Default for TranscriptPolicy {
    fn default() -> Self {
        Self {
            min_chars: 8,
            max_rejected_tokens: 2,
            filler_phrases: ["you", "uh", "uh uh", "hello", "hi", "hey, oh, oh oh you"]
                .into_iter()
                .map(String::from)
                .collect(),
            reject_measurements: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooShort,
    Measurement,
    Filler,
    TooFewWords,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

impl TranscriptPolicy {
    pub fn evaluate(&self, transcript: &str) -> Verdict {
        let cleaned = transcript.trim().to_lowercase();

        if cleaned.chars().count() < self.min_chars {
            return Verdict::Rejected(RejectReason::TooShort);
        }
        if self.reject_measurements && is_measurement(&cleaned) {
            return Verdict::Rejected(RejectReason::Measurement);
        }
        if self.filler_phrases.iter().any(|f| f == &cleaned) {
            return Verdict::Rejected(RejectReason::Filler);
        }
        if cleaned.split_whitespace().count() <= self.max_rejected_tokens {
            return Verdict::Rejected(RejectReason::TooFewWords);
        }
        Verdict::Accepted
    }
}

/// Whisper tends to hallucinate ruler readings ("42.0 cm") on noise.
fn is_measurement(cleaned: &str) -> bool {
    !cleaned.is_empty()
        && cleaned
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '.' | 'c' | 'm'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(t: &str) -> Verdict {
        TranscriptPolicy::default().evaluate(t)
    }

    #[test]
    fn measurement_noise_is_rejected() {
        assert_eq!(verdict("42.0 cm"), Verdict::Rejected(RejectReason::TooShort));
        assert_eq!(
            verdict("  12 34 56 78 cm  "),
            Verdict::Rejected(RejectReason::Measurement)
        );
    }

    #[test]
    fn short_transcripts_are_rejected() {
        assert_eq!(verdict("roar"), Verdict::Rejected(RejectReason::TooShort));
        assert_eq!(verdict("   "), Verdict::Rejected(RejectReason::TooShort));
    }

    #[test]
    fn filler_is_rejected() {
        assert_eq!(
            verdict("Hey, oh, oh oh you"),
            Verdict::Rejected(RejectReason::Filler)
        );
    }

    #[test]
    fn two_words_are_rejected() {
        assert_eq!(
            verdict("loud growling"),
            Verdict::Rejected(RejectReason::TooFewWords)
        );
    }

    #[test]
    fn any_whitespace_separates_words() {
        assert_eq!(verdict("roar\ngrowl\nhiss"), Verdict::Accepted);
        assert_eq!(verdict("roar\tgrowl\thiss"), Verdict::Accepted);
        assert_eq!(
            verdict("roaring\n\n  growling"),
            Verdict::Rejected(RejectReason::TooFewWords)
        );
    }

    #[test]
    fn descriptive_transcript_passes() {
        assert_eq!(verdict("the lion is roaring loudly and pacing"), Verdict::Accepted);
        assert_eq!(verdict("Elephant trumpeting in panic"), Verdict::Accepted);
    }

    #[test]
    fn thresholds_are_configurable() {
        let policy = TranscriptPolicy {
            min_chars: 2,
            max_rejected_tokens: 0,
            filler_phrases: Vec::new(),
            reject_measurements: false,
        };
        assert_eq!(policy.evaluate("42.0 cm"), Verdict::Accepted);
        assert_eq!(policy.evaluate("roar"), Verdict::Accepted);
    }
}
