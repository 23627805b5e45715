use crate::model::{
    Entity, FunctionalScoreDetail, MentionKind, ScoreScale, SourceSpan, TemporalCategory,
    TemporalContext,
};

use super::scores::computed_functional_score;

/// Heuristic bands mapping documented mobility/independence phrasing to a
/// KPS value. This is the single judgement exception the spec permits
/// (§1, §4.10): a functional-status score computed from PT/OT or exam
/// text when no explicit score is documented, never any other clinical
/// inference.
const KPS_BANDS: &[(&str, f32)] = &[
    ("ambulatory without assistance", 90.0),
    ("independent with all activities", 90.0),
    ("ambulatory with assistance", 70.0),
    ("requires moderate assistance", 60.0),
    ("requires maximal assistance", 40.0),
    ("bedbound", 30.0),
    ("non-ambulatory", 30.0),
];

fn presence_confidence() -> f32 {
    // Lower than a pattern-matched explicit score (CONFIDENCE_HIGH) since
    // this value is inferred, not verbatim.
    0.60
}

/// Computes a KPS score from PT/OT or clinical-exam phrasing when no
/// explicit KPS/ECOG/mRS value is present in `explicit_scales`. Returns
/// `None` when no recognized phrasing is present — the function never
/// fabricates a value absent supporting text.
pub fn compute_kps_from_text(
    text: &str,
    explicit_scales: &[ScoreScale],
    note_index: usize,
) -> Option<Entity<FunctionalScoreDetail>> {
    if explicit_scales.iter().any(|s| s.is_functional_status()) {
        return None;
    }
    let lowered = text.to_lowercase();
    let (phrase, value) = KPS_BANDS.iter().find(|(phrase, _)| lowered.contains(phrase))?;
    let start = lowered.find(phrase)?;
    let end = start + phrase.len();
    let temporal = TemporalContext::new(TemporalCategory::Present, MentionKind::NewEvent, presence_confidence());
    Some(computed_functional_score(
        ScoreScale::Kps,
        *value,
        SourceSpan::new(note_index, start, end),
        presence_confidence(),
        temporal,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_kps_from_ambulatory_phrase() {
        let score = compute_kps_from_text("PT notes patient is ambulatory without assistance.", &[], 0).unwrap();
        assert_eq!(score.value.value, 90.0);
        assert!(score.value.computed);
    }

    #[test]
    fn skips_when_explicit_score_present() {
        let score = compute_kps_from_text("Ambulatory without assistance.", &[ScoreScale::Kps], 0);
        assert!(score.is_none());
    }

    #[test]
    fn no_recognized_phrasing_returns_none() {
        assert!(compute_kps_from_text("Patient tolerating diet well.", &[], 0).is_none());
    }
}
