use std::sync::LazyLock;

use regex::Regex;

use crate::config::PipelineConfig;
use crate::model::{AnchorDates, ConsultationDetail, EntityValue, ExtractionSource, RawEntity, SourceSpan};
use crate::temporal;

const SERVICES: &[&str] = &[
    "neurosurgery",
    "neurology",
    "physical therapy",
    "occupational therapy",
    "speech therapy",
    "infectious disease",
    "cardiology",
    "pulmonology",
    "nephrology",
    "psychiatry",
    "social work",
    "palliative care",
];

static CONSULT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    let joined = SERVICES.iter().map(|s| regex::escape(s)).collect::<Vec<_>>().join("|");
    Regex::new(&format!(
        r"(?i)\b(?:{joined})\s*(?:consult(?:ed|ation)?)\b(?:\s*(?:for|re:?)\s*([A-Za-z][A-Za-z ,\-]{{2,60}}))?"
    ))
    .unwrap()
});

/// Extracts consultation mentions: the consulting service plus an
/// optional reason phrase when documented inline ("Cardiology consulted
/// for arrhythmia").
pub fn extract_consultations(
    text: &str,
    note_index: usize,
    window_chars: usize,
    anchors: &AnchorDates,
) -> Vec<RawEntity> {
    CONSULT_LINE
        .captures_iter(text)
        .map(|m| {
            let whole = m.get(0).unwrap();
            let service = SERVICES
                .iter()
                .find(|s| whole.as_str().to_lowercase().contains(&s.to_lowercase()))
                .copied()
                .unwrap_or("unknown")
                .to_string();
            let reason = m.get(1).map(|g| g.as_str().trim().to_string());
            let temporal = temporal::analyze_span(text, whole.start(), whole.end(), window_chars, anchors, None);
            RawEntity {
                value: EntityValue::Consultation(ConsultationDetail { service, reason }),
                source: ExtractionSource::Pattern,
                source_span: SourceSpan::new(note_index, whole.start(), whole.end()),
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
    fn consultation_with_reason_extracted() {
        let out = extract_consultations("Cardiology consulted for new-onset atrial fibrillation.", 0, 200, &AnchorDates::default());
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0].value, EntityValue::Consultation(c) if c.service == "cardiology" && c.reason.as_deref() == Some("new-onset atrial fibrillation")));
    }

    #[test]
    fn consultation_without_reason_still_extracted() {
        let out = extract_consultations("Physical therapy consulted.", 0, 200, &AnchorDates::default());
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0].value, EntityValue::Consultation(c) if c.reason.is_none()));
    }
}
