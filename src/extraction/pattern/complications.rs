use std::sync::LazyLock;

use regex::Regex;

use crate::config::PipelineConfig;
use crate::model::{AnchorDates, ComplicationDetail, EntityValue, ExtractionSource, RawEntity, SourceSpan};
use crate::temporal;

const COMPLICATION_KEYWORDS: &[&str] = &[
    "vasospasm",
    "hydrocephalus",
    "seizure",
    "infection",
    "wound infection",
    "meningitis",
    "pulmonary embolism",
    "PE",
    "deep vein thrombosis",
    "DVT",
    "neurogenic shock",
    "CSF leak",
    "rebleed",
    "hemorrhage",
    "fever",
];

const NEGATION_PHRASES: &[&str] = &["no evidence of", "denies", "negative for", "ruled out", "r/o", "without", "no signs of"];

static COMPLICATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let joined = COMPLICATION_KEYWORDS
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{joined})\b")).unwrap()
});

static SEVERITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(mild|moderate|severe|symptomatic|asymptomatic)\b").unwrap());

fn is_negated(text: &str, start: usize) -> bool {
    let mut prefix_start = start.saturating_sub(40);
    while prefix_start > 0 && !text.is_char_boundary(prefix_start) {
        prefix_start -= 1;
    }
    let lowered = text[prefix_start..start].to_lowercase();
    NEGATION_PHRASES.iter().any(|p| lowered.contains(p))
}

fn nearby_severity(text: &str, start: usize, end: usize, window_chars: usize) -> Option<String> {
    let mut window_start = start.saturating_sub(window_chars);
    while window_start > 0 && !text.is_char_boundary(window_start) {
        window_start -= 1;
    }
    let mut window_end = (end + window_chars).min(text.len());
    while window_end < text.len() && !text.is_char_boundary(window_end) {
        window_end += 1;
    }
    SEVERITY
        .find(&text[window_start..window_end])
        .map(|m| m.as_str().to_lowercase())
}

/// Extracts complication mentions, dropping negated findings (spec seed
/// case 3: "no evidence of vasospasm" must not surface as an active
/// complication) and attaching a severity qualifier when one appears
/// nearby.
pub fn extract_complications(
    text: &str,
    note_index: usize,
    window_chars: usize,
    anchors: &AnchorDates,
) -> Vec<RawEntity> {
    COMPLICATION_PATTERN
        .find_iter(text)
        .filter(|m| !is_negated(text, m.start()))
        .map(|m| {
            let temporal = temporal::analyze_span(text, m.start(), m.end(), window_chars, anchors, None);
            RawEntity {
                value: EntityValue::Complication(ComplicationDetail {
                    name: m.as_str().to_lowercase(),
                    severity: nearby_severity(text, m.start(), m.end(), window_chars),
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
    fn negated_complication_dropped() {
        let out = extract_complications("Denies headache, no evidence of vasospasm on TCDs.", 0, 200, &AnchorDates::default());
        assert!(out.is_empty());
    }

    #[test]
    fn active_complication_extracted_with_pod() {
        let out = extract_complications("Developed vasospasm on POD#3, started on nimodipine.", 0, 200, &AnchorDates::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].temporal.pod, Some(3));
    }

    #[test]
    fn severity_qualifier_attached_when_present() {
        let out = extract_complications("Patient developed moderate vasospasm requiring intervention.", 0, 200, &AnchorDates::default());
        assert_eq!(out[0].value, EntityValue::Complication(ComplicationDetail {
            name: "vasospasm".into(),
            severity: Some("moderate".into()),
        }));
    }
}
