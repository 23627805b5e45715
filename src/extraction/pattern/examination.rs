use std::sync::LazyLock;

use regex::Regex;

use crate::config::PipelineConfig;
use crate::model::{AnchorDates, EntityValue, ExaminationFindingDetail, ExtractionSource, RawEntity, SourceSpan};
use crate::temporal;

/// Stock neuro-exam phrasing. Matched as whole clauses rather than single
/// keywords since an exam finding's value *is* the phrase — there is no
/// further structural decomposition the spec asks for.
const EXAM_PHRASES: &[&str] = &[
    "pupils equal and reactive",
    "moving all extremities",
    "moves all extremities spontaneously",
    "alert and oriented",
    "follows commands",
    "no focal deficit",
    "no focal neurologic deficit",
    "strength 5/5",
    "strength intact",
    "sensation intact",
    "ambulatory without assistance",
    "ambulatory with assistance",
    "requires maximal assistance",
    "bedbound",
    "non-ambulatory",
];

static EXAM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let joined = EXAM_PHRASES.iter().map(|p| regex::escape(p)).collect::<Vec<_>>().join("|");
    Regex::new(&format!(r"(?i)\b(?:{joined})\b")).unwrap()
});

/// Extracts documented exam-finding phrases verbatim.
pub fn extract_examination_findings(
    text: &str,
    note_index: usize,
    window_chars: usize,
    anchors: &AnchorDates,
) -> Vec<RawEntity> {
    EXAM_PATTERN
        .find_iter(text)
        .map(|m| {
            let temporal = temporal::analyze_span(text, m.start(), m.end(), window_chars, anchors, None);
            RawEntity {
                value: EntityValue::ExaminationFinding(ExaminationFindingDetail {
                    text: m.as_str().to_lowercase(),
                }),
                source: ExtractionSource::Pattern,
                source_span: SourceSpan::new(note_index, m.start(), m.end()),
                confidence: PipelineConfig::CONFIDENCE_MEDIUM,
                temporal,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_exam_phrase_extracted() {
        let out = extract_examination_findings("Pupils equal and reactive, moving all extremities.", 0, 200, &AnchorDates::default());
        assert_eq!(out.len(), 2);
    }
}
