//! Classifies each candidate entity span as a new_event, reference, or
//! continuation mention, assigns a temporal category, and resolves POD
//! references against the surgery anchor table (spec §4.3).

use std::sync::LazyLock;

use chrono::{Days, NaiveDate};
use regex::Regex;

use crate::model::{AnchorDates, CategoryVote, MentionKind, TemporalCategory, TemporalContext};

const REFERENCE_PHRASES: &[&str] = &["s/p", "status post", "h/o", "history of"];
const NEW_EVENT_PHRASES: &[&str] = &["underwent", "performed", "developed", "noted today"];
const CONTINUATION_PHRASES: &[&str] = &["continues to", "ongoing", "persists"];
/// Current-day markers that override reference phrasing per the
/// `s/p coiling today` edge case (spec §4.3).
const CURRENT_DAY_MARKERS: &[&str] = &["today", "this morning", "this afternoon", "this evening", "currently"];

const CATEGORY_KEYWORDS: &[(&str, TemporalCategory)] = &[
    ("on admission", TemporalCategory::Admission),
    ("on presentation", TemporalCategory::Admission),
    ("chronic", TemporalCategory::Chronic),
    ("acute", TemporalCategory::Acute),
    ("prior to surgery", TemporalCategory::Preop),
    ("preoperative", TemporalCategory::Preop),
    ("pre-op", TemporalCategory::Preop),
    ("postoperative", TemporalCategory::Postop),
    ("post-op", TemporalCategory::Postop),
    ("after surgery", TemporalCategory::Postop),
    ("on discharge", TemporalCategory::Discharge),
    ("at discharge", TemporalCategory::Discharge),
    ("history of", TemporalCategory::Past),
    ("previously", TemporalCategory::Past),
    ("today", TemporalCategory::Present),
    ("currently", TemporalCategory::Present),
];

static POD_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)POD#(\d{1,3})").unwrap());

fn window_around<'a>(text: &'a str, start: usize, end: usize, radius: usize) -> &'a str {
    let window_start = text
        .char_indices()
        .rev()
        .find(|(i, _)| *i <= start.saturating_sub(radius))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let window_end = (end + radius).min(text.len());
    let window_end = text
        .char_indices()
        .find(|(i, _)| *i >= window_end)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[window_start..window_end]
}

fn contains_any(haystack: &str, phrases: &[&str]) -> bool {
    let lowered = haystack.to_lowercase();
    phrases.iter().any(|p| lowered.contains(p))
}

/// Classifies one candidate span and resolves its temporal context.
/// `occurrence_date` is the best-known date context for the mention (e.g.
/// the note's own authored/anchor date) and is used to pick the closest
/// preceding surgery when resolving a POD reference; pass `None` when
/// unknown, in which case the earliest known surgery is used (consistent
/// with the tie-break rule of preferring the earliest surgery).
pub fn analyze_span(
    full_text: &str,
    span_start: usize,
    span_end: usize,
    window_chars: usize,
    anchors: &AnchorDates,
    occurrence_date: Option<NaiveDate>,
) -> TemporalContext {
    let window = window_around(full_text, span_start, span_end, window_chars);

    let current_day_override = contains_any(window, CURRENT_DAY_MARKERS);

    let pod = POD_NUMBER
        .captures(window)
        .and_then(|c| c[1].parse::<i64>().ok());

    let kind = if current_day_override {
        MentionKind::NewEvent
    } else if contains_any(window, REFERENCE_PHRASES) || pod.is_some() {
        MentionKind::Reference
    } else if contains_any(window, NEW_EVENT_PHRASES) {
        MentionKind::NewEvent
    } else if contains_any(window, CONTINUATION_PHRASES) {
        MentionKind::Continuation
    } else {
        MentionKind::NewEvent
    };

    let lowered_window = window.to_lowercase();
    let mut votes: Vec<CategoryVote> = CATEGORY_KEYWORDS
        .iter()
        .filter(|(kw, _)| lowered_window.contains(kw))
        .map(|(_, category)| *category)
        .collect::<Vec<_>>()
        .into_iter()
        .map(|category| CategoryVote { category, confidence: 0.0 })
        .collect();
    // dedupe identical category votes (e.g. both "today" and "currently" present)
    votes.dedup_by_key(|v| v.category);

    let split_confidence = if votes.is_empty() {
        0.0
    } else {
        0.9 / votes.len() as f32
    };
    for vote in &mut votes {
        vote.confidence = split_confidence;
    }
    if votes.is_empty() {
        votes.push(CategoryVote {
            category: TemporalCategory::Unknown,
            confidence: 0.5,
        });
    }

    let primary = votes
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .copied()
        .unwrap_or(CategoryVote {
            category: TemporalCategory::Unknown,
            confidence: 0.5,
        });

    let mut context = TemporalContext {
        category: primary.category,
        votes,
        kind,
        pod: None,
        resolved_date: None,
        confidence: primary.confidence.max(0.5),
    };

    if let Some(n) = pod {
        context = context.with_pod(n);
        let anchor = occurrence_date
            .and_then(|d| anchors.closest_preceding_surgery(d))
            .or_else(|| anchors.surgery.iter().min().copied());
        if let Some(surgery_date) = anchor {
            if let Some(resolved) = surgery_date.checked_add_days(Days::new(n.unsigned_abs())) {
                context = context.with_resolved_date(resolved);
            }
        }
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn today_overrides_reference_phrasing() {
        let text = "Patient s/p coiling today without complication.";
        let ctx = analyze_span(text, 10, 22, 30, &AnchorDates::default(), None);
        assert_eq!(ctx.kind, MentionKind::NewEvent);
    }

    #[test]
    fn reference_phrase_without_today_is_reference() {
        let text = "Patient s/p coiling, tolerating diet well.";
        let ctx = analyze_span(text, 8, 20, 30, &AnchorDates::default(), None);
        assert_eq!(ctx.kind, MentionKind::Reference);
    }

    #[test]
    fn pod_without_surgery_anchor_resolves_to_none() {
        let text = "Developed fever on POD#5 without clear source.";
        let ctx = analyze_span(text, 0, 47, 50, &AnchorDates::default(), None);
        assert_eq!(ctx.pod, Some(5));
        assert_eq!(ctx.resolved_date, None);
        assert_eq!(ctx.kind, MentionKind::Reference);
    }

    #[test]
    fn pod_with_surgery_anchor_resolves_date() {
        let surgery = NaiveDate::from_ymd_opt(2025, 10, 16).unwrap();
        let anchors = AnchorDates {
            surgery: vec![surgery],
            ..Default::default()
        };
        let text = "Developed vasospasm on POD#3.";
        let ctx = analyze_span(text, 0, 30, 50, &anchors, Some(surgery));
        assert_eq!(ctx.pod, Some(3));
        assert_eq!(ctx.resolved_date, Some(NaiveDate::from_ymd_opt(2025, 10, 19).unwrap()));
    }

    #[test]
    fn conflicting_categories_both_recorded_with_lower_confidence() {
        let text = "Chronic condition with acute exacerbation noted.";
        let ctx = analyze_span(text, 0, 49, 50, &AnchorDates::default(), None);
        assert!(ctx.votes.len() >= 2);
        assert!(ctx.votes.iter().all(|v| v.confidence < 0.9));
    }

    #[test]
    fn new_event_phrase_classified() {
        let text = "Patient underwent craniotomy for tumor resection.";
        let ctx = analyze_span(text, 8, 18, 30, &AnchorDates::default(), None);
        assert_eq!(ctx.kind, MentionKind::NewEvent);
    }
}
