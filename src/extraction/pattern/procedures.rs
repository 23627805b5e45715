use std::sync::LazyLock;

use regex::Regex;

use crate::config::PipelineConfig;
use crate::model::{AnchorDates, EntityValue, ExtractionSource, ProcedureDetail, RawEntity, SourceSpan};
use crate::temporal;

/// One named procedure keyword and the confidence its bare mention carries
/// before temporal/negation qualification. Neurosurgical procedure names
/// are specific enough that a bare keyword match is itself high-confidence
/// — the surrounding phrase (s/p, underwent, performed) is what the
/// Temporal Analyzer uses to decide new_event vs reference, not whether
/// the procedure is real.
const PROCEDURE_KEYWORDS: &[&str] = &[
    "craniotomy",
    "craniectomy",
    "EVD placement",
    "external ventricular drain",
    "coiling",
    "clipping",
    "embolization",
    "spinal fusion",
    "laminectomy",
    "washout",
    "VP shunt",
    "ventriculoperitoneal shunt",
    "decompressive craniectomy",
    "tumor resection",
    "burr hole",
];

static PROCEDURE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let joined = PROCEDURE_KEYWORDS
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{joined})\b")).unwrap()
});

/// Extracts procedure mentions. Detail (e.g. laterality, target vessel)
/// is left in the surrounding sentence rather than captured structurally
/// — the spec only requires the procedure name plus its temporal
/// qualification, not free-text anatomic detail parsing.
pub fn extract_procedures(
    text: &str,
    note_index: usize,
    window_chars: usize,
    anchors: &AnchorDates,
) -> Vec<RawEntity> {
    PROCEDURE_PATTERN
        .find_iter(text)
        .map(|m| {
            let temporal = temporal::analyze_span(text, m.start(), m.end(), window_chars, anchors, None);
            RawEntity {
                value: EntityValue::Procedure(ProcedureDetail {
                    name: m.as_str().to_lowercase(),
                    detail: None,
                }),
                source: ExtractionSource::Pattern,
                source_span: SourceSpan::new(note_index, m.start(), m.end()),
                confidence: PipelineConfig::CONFIDENCE_HIGH,
                temporal,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coiling_today_is_new_event() {
        let out = extract_procedures("Patient underwent coiling of the aneurysm today.", 0, 200, &AnchorDates::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].temporal.kind, crate::model::MentionKind::NewEvent);
    }

    #[test]
    fn sp_coiling_is_reference() {
        let out = extract_procedures("Patient is s/p coiling, tolerating diet.", 0, 200, &AnchorDates::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].temporal.kind, crate::model::MentionKind::Reference);
    }

    #[test]
    fn multiple_distinct_procedures_all_extracted() {
        let out = extract_procedures("Underwent craniotomy and EVD placement on hospital day one.", 0, 200, &AnchorDates::default());
        assert_eq!(out.len(), 2);
    }
}
