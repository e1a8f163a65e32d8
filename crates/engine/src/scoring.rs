//! Turns a free-text LLM evaluation into a deterministic 0-100 score.

use std::sync::OnceLock;

use regex::Regex;

const DEFAULT_SCORE: u32 = 50;

const EXCELLENT_KEYWORDS: &[&str] = &[
    "excellent",
    "outstanding",
    "strong",
    "comprehensive",
    "impressive",
    "detailed",
    "insightful",
    "thoughtful",
    "well-articulated",
    "thorough",
];

const GOOD_KEYWORDS: &[&str] = &[
    "good",
    "solid",
    "clear",
    "appropriate",
    "demonstrates",
    "correct",
    "shows understanding",
    "adequate",
];

const ADEQUATE_KEYWORDS: &[&str] = &[
    "partially",
    "somewhat",
    "could improve",
    "missing details",
    "brief",
    "lacks depth",
    "incomplete",
];

const POOR_KEYWORDS: &[&str] = &[
    "incorrect",
    "vague",
    "unclear",
    "off-topic",
    "failed",
    "poor",
    "confused",
    "contradicts",
];

fn rating_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)rating:\s*(\d+)\s*/\s*10").expect("valid regex"))
}

fn fraction_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*/\s*(\d+)").expect("valid regex"))
}

/// Extracts a 0-100 score from an evaluation narrative. Total: always
/// returns a usable score, 50 for empty input.
///
/// Priority order: an explicit `Rating: n/10` is trusted first, then any
/// `a/b` fraction over 10 or 100, then keyword heuristics as the last
/// resort against prompt drift.
pub fn extract_score(evaluation_text: &str) -> u32 {
    if evaluation_text.trim().is_empty() {
        return DEFAULT_SCORE;
    }

    if let Some(caps) = rating_pattern().captures(evaluation_text) {
        let rating: u32 = caps[1].parse().unwrap_or(0);
        return rating.min(10) * 10;
    }

    if let Some(caps) = fraction_pattern().captures(evaluation_text) {
        let score: u32 = caps[1].parse().unwrap_or(0);
        let max: u32 = caps[2].parse().unwrap_or(0);
        match max {
            10 => return (score * 10).min(100),
            100 => return score.min(100),
            _ => {}
        }
    }

    keyword_score(evaluation_text)
}

fn keyword_score(text: &str) -> u32 {
    let lower = text.to_lowercase();
    let hits = |keywords: &[&str]| keywords.iter().filter(|k| lower.contains(*k)).count() as u32;

    let excellent = hits(EXCELLENT_KEYWORDS);
    let good = hits(GOOD_KEYWORDS);
    let adequate = hits(ADEQUATE_KEYWORDS);
    let poor = hits(POOR_KEYWORDS);

    let base = if excellent >= 2 {
        85 + excellent * 2
    } else if excellent >= 1 {
        80
    } else if good >= 2 {
        70 + good * 2
    } else if good >= 1 {
        65
    } else if adequate >= 2 {
        50 + adequate * 2
    } else {
        55
    };

    let scored = if poor > 0 {
        base.saturating_sub(poor * 15).max(20)
    } else {
        base
    };

    scored.min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_returns_default() {
        assert_eq!(extract_score(""), 50);
        assert_eq!(extract_score("   "), 50);
    }

    #[test]
    fn explicit_rating_is_scaled() {
        assert_eq!(
            extract_score("Great work. Rating: 9/10 - excellent edge case handling."),
            90
        );
    }

    #[test]
    fn rating_beats_keyword_content() {
        // The explicit rating wins even when the surrounding text is
        // full of negative keywords.
        assert_eq!(
            extract_score("Vague and unclear in places, but Rating: 7/10 overall."),
            70
        );
    }

    #[test]
    fn rating_is_case_insensitive_and_clamped() {
        assert_eq!(extract_score("rating: 7 / 10"), 70);
        assert_eq!(extract_score("Rating: 15/10, incredible"), 100);
    }

    #[test]
    fn bare_fraction_over_ten_is_normalized() {
        assert_eq!(extract_score("I'd give this an 8/10."), 80);
    }

    #[test]
    fn bare_fraction_over_hundred_passes_through() {
        assert_eq!(extract_score("Score: 73/100"), 73);
    }

    #[test]
    fn fraction_with_other_denominator_falls_through_to_keywords() {
        assert_eq!(extract_score("Answered 3/5 parts, a good solid answer"), 74);
    }

    #[test]
    fn excellent_keywords_score_high() {
        let score = extract_score("An excellent, thorough and insightful answer.");
        assert!((85..=100).contains(&score), "got {score}");
    }

    #[test]
    fn single_good_keyword_scores_65() {
        assert_eq!(extract_score("A good attempt overall, nothing more"), 65);
    }

    #[test]
    fn poor_keywords_penalize_but_floor_at_20() {
        let score =
            extract_score("incorrect, vague, unclear, off-topic, failed, poor, confused");
        assert_eq!(score, 20);
    }

    #[test]
    fn no_keywords_yields_middle_default() {
        assert_eq!(extract_score("The candidate answered the prompt."), 55);
    }

    #[test]
    fn bounds_hold_for_arbitrary_text() {
        // Always within [0, 100].
        for text in [
            "",
            "Rating: 0/10",
            "Rating: 10/10",
            "999/100",
            "excellent excellent excellent outstanding strong thorough",
            "incorrect poor failed vague unclear confused contradicts off-topic",
        ] {
            let score = extract_score(text);
            assert!(score <= 100, "{text:?} -> {score}");
        }
    }
}
