use std::sync::LazyLock;

use regex::Regex;

use crate::config::PipelineConfig;
use crate::model::{
    AnchorDates, Entity, EntityFamily, EntityValue, ExtractionSource, FunctionalScoreDetail,
    RawEntity, ScoreScale, SourceSpan,
};
use crate::temporal;

/// One clinical-score family: its own regex (never shared with another
/// scale, per the Hunt-Hess/modified-Fisher open question in spec §9),
/// the scale it populates, and whether the captured group is a roman
/// numeral or a plain integer.
struct ScorePattern {
    regex: &'static LazyLock<Regex>,
    scale: ScoreScale,
    roman: bool,
    confidence: f32,
}

// Matched before plain Fisher so "modified Fisher" never falls through to
// the disjoint Fisher-only pattern.
static MODIFIED_FISHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bmodified\s+fisher\s*(?:grade|score)?\s*:?\s*(I{1,3}V?|IV|[0-4])\b").unwrap()
});
static HUNT_HESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bhunt\s*(?:[-&]|and)\s*hess\s*(?:grade|score)?\s*:?\s*(I{1,3}V?|IV|V|[1-5])\b").unwrap()
});
static GCS_TOTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bGCS\s*(?:total|score)?\s*:?\s*(\d{1,2})\b").unwrap());
static GCS_COMPONENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bGCS\s*:?\s*E(\d)\s*M(\d{1,2})\s*V(\d)\b").unwrap()
});
static MRS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bmRS\s*(?:score)?\s*:?\s*([0-6])\b").unwrap());
static KPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bKPS\s*(?:score)?\s*:?\s*(\d{1,3})\b").unwrap());
static ECOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bECOG\s*(?:status|score)?\s*:?\s*([0-5])\b").unwrap());
static NIHSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bNIHSS\s*(?:score)?\s*:?\s*(\d{1,2})\b").unwrap());

fn patterns() -> Vec<ScorePattern> {
    vec![
        ScorePattern { regex: &MODIFIED_FISHER, scale: ScoreScale::ModifiedFisher, roman: true, confidence: PipelineConfig::CONFIDENCE_CRITICAL },
        ScorePattern { regex: &HUNT_HESS, scale: ScoreScale::HuntHess, roman: true, confidence: PipelineConfig::CONFIDENCE_CRITICAL },
        ScorePattern { regex: &GCS_TOTAL, scale: ScoreScale::GcsTotal, roman: false, confidence: PipelineConfig::CONFIDENCE_HIGH },
        ScorePattern { regex: &MRS, scale: ScoreScale::Mrs, roman: false, confidence: PipelineConfig::CONFIDENCE_HIGH },
        ScorePattern { regex: &KPS, scale: ScoreScale::Kps, roman: false, confidence: PipelineConfig::CONFIDENCE_HIGH },
        ScorePattern { regex: &ECOG, scale: ScoreScale::Ecog, roman: false, confidence: PipelineConfig::CONFIDENCE_HIGH },
        ScorePattern { regex: &NIHSS, scale: ScoreScale::Nihss, roman: false, confidence: PipelineConfig::CONFIDENCE_HIGH },
    ]
}

fn roman_to_value(token: &str) -> Option<f32> {
    match token.to_uppercase().as_str() {
        "I" => Some(1.0),
        "II" => Some(2.0),
        "III" => Some(3.0),
        "IV" => Some(4.0),
        "V" => Some(5.0),
        _ => token.parse::<f32>().ok(),
    }
}

fn emit(
    note_index: usize,
    scale: ScoreScale,
    value: f32,
    confidence: f32,
    span: (usize, usize),
    full_text: &str,
    window_chars: usize,
    anchors: &AnchorDates,
) -> RawEntity {
    let temporal = temporal::analyze_span(full_text, span.0, span.1, window_chars, anchors, None);
    RawEntity {
        value: EntityValue::FunctionalScore(FunctionalScoreDetail {
            scale,
            value,
            computed: false,
        }),
        source: ExtractionSource::Pattern,
        source_span: SourceSpan::new(note_index, span.0, span.1),
        confidence,
        temporal,
    }
}

/// Extracts every documented clinical/functional score from normalized
/// note text. GCS components (E/M/V), when present, are emitted as three
/// separate entities alongside (or instead of) a GCS total — both forms
/// appear across real documentation styles.
pub fn extract_scores(
    text: &str,
    note_index: usize,
    window_chars: usize,
    anchors: &AnchorDates,
) -> Vec<RawEntity> {
    let mut out = Vec::new();

    for pattern in patterns() {
        if let Some(m) = pattern.regex.captures(text) {
            let whole = m.get(0).unwrap();
            let raw = &m[1];
            let value = if pattern.roman {
                roman_to_value(raw)
            } else {
                raw.parse::<f32>().ok()
            };
            if let Some(value) = value {
                out.push(emit(
                    note_index,
                    pattern.scale,
                    value,
                    pattern.confidence,
                    (whole.start(), whole.end()),
                    text,
                    window_chars,
                    anchors,
                ));
            }
        }
    }

    for m in GCS_COMPONENTS.captures_iter(text) {
        let whole = m.get(0).unwrap();
        let span = (whole.start(), whole.end());
        if let Ok(eye) = m[1].parse::<f32>() {
            out.push(emit(note_index, ScoreScale::GcsEye, eye, PipelineConfig::CONFIDENCE_HIGH, span, text, window_chars, anchors));
        }
        if let Ok(motor) = m[2].parse::<f32>() {
            out.push(emit(note_index, ScoreScale::GcsMotor, motor, PipelineConfig::CONFIDENCE_HIGH, span, text, window_chars, anchors));
        }
        if let Ok(verbal) = m[3].parse::<f32>() {
            out.push(emit(note_index, ScoreScale::GcsVerbal, verbal, PipelineConfig::CONFIDENCE_HIGH, span, text, window_chars, anchors));
        }
    }

    out
}

/// Entity family every emission here belongs to — used by callers that
/// group raw entities by family before merging.
pub const FAMILY: EntityFamily = EntityFamily::FunctionalScore;

/// Reduces a KPS/ECOG/mRS score text entity into the typed `Entity<..>`
/// shape the spec's Non-goals exception permits computing — used when no
/// explicit score is documented but PT/OT or exam text implies one
/// (spec §1, §4.10 open exception). Kept separate from pattern extraction
/// proper: this is a derived/computed value, never a verbatim match.
pub fn computed_functional_score(
    scale: ScoreScale,
    value: f32,
    source_span: SourceSpan,
    confidence: f32,
    temporal: crate::model::TemporalContext,
) -> Entity<FunctionalScoreDetail> {
    Entity::new(
        FunctionalScoreDetail {
            scale,
            value,
            computed: true,
        },
        source_span,
        confidence,
        temporal,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchors() -> AnchorDates {
        AnchorDates::default()
    }

    #[test]
    fn hunt_hess_roman_numeral_parsed() {
        let out = extract_scores("Hunt-Hess grade III on admission.", 0, 200, &anchors());
        let score = out.iter().find(|e| matches!(&e.value, EntityValue::FunctionalScore(f) if f.scale == ScoreScale::HuntHess));
        assert!(score.is_some());
        if let EntityValue::FunctionalScore(f) = &score.unwrap().value {
            assert_eq!(f.value, 3.0);
        }
    }

    #[test]
    fn modified_fisher_disjoint_from_hunt_hess() {
        let out = extract_scores("modified Fisher grade 3, Hunt-Hess II.", 0, 200, &anchors());
        let fisher = out.iter().filter(|e| matches!(&e.value, EntityValue::FunctionalScore(f) if f.scale == ScoreScale::ModifiedFisher)).count();
        let hh = out.iter().filter(|e| matches!(&e.value, EntityValue::FunctionalScore(f) if f.scale == ScoreScale::HuntHess)).count();
        assert_eq!(fisher, 1);
        assert_eq!(hh, 1);
    }

    #[test]
    fn gcs_components_all_three_emitted() {
        let out = extract_scores("Exam notable for GCS: E4M6V5.", 0, 200, &anchors());
        let count = out.iter().filter(|e| matches!(&e.value, EntityValue::FunctionalScore(f) if matches!(f.scale, ScoreScale::GcsEye | ScoreScale::GcsMotor | ScoreScale::GcsVerbal))).count();
        assert_eq!(count, 3);
    }

    #[test]
    fn mrs_kps_ecog_nihss_each_extracted() {
        let out = extract_scores("mRS 2, KPS 80, ECOG 1, NIHSS 5 documented.", 0, 200, &anchors());
        assert!(out.iter().any(|e| matches!(&e.value, EntityValue::FunctionalScore(f) if f.scale == ScoreScale::Mrs && f.value == 2.0)));
        assert!(out.iter().any(|e| matches!(&e.value, EntityValue::FunctionalScore(f) if f.scale == ScoreScale::Kps && f.value == 80.0)));
        assert!(out.iter().any(|e| matches!(&e.value, EntityValue::FunctionalScore(f) if f.scale == ScoreScale::Ecog && f.value == 1.0)));
        assert!(out.iter().any(|e| matches!(&e.value, EntityValue::FunctionalScore(f) if f.scale == ScoreScale::Nihss && f.value == 5.0)));
    }
}
