use std::sync::LazyLock;

use regex::Regex;

use crate::config::PipelineConfig;
use crate::model::{AnchorDates, EntityValue, ExtractionSource, ImagingFindingDetail, RawEntity, SourceSpan};
use crate::temporal;

const MODALITIES: &[&str] = &["CT", "CTA", "MRI", "MRA", "angiography", "angiogram", "TCD", "x-ray"];
const FINDING_PHRASES: &[&str] = &[
    "no acute findings",
    "stable",
    "interval improvement",
    "interval worsening",
    "new hemorrhage",
    "hydrocephalus",
    "midline shift",
    "vasospasm",
    "no evidence of",
];

static MODALITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let joined = MODALITIES.iter().map(|m| regex::escape(m)).collect::<Vec<_>>().join("|");
    Regex::new(&format!(r"(?i)\b(?:{joined})\b")).unwrap()
});

fn finding_in_window(text: &str, start: usize, end: usize, window_chars: usize) -> Option<String> {
    let mut window_end = (end + window_chars).min(text.len());
    while window_end < text.len() && !text.is_char_boundary(window_end) {
        window_end += 1;
    }
    let window = &text[start..window_end];
    let lowered = window.to_lowercase();
    FINDING_PHRASES
        .iter()
        .find(|phrase| lowered.contains(*phrase))
        .map(|phrase| phrase.to_string())
}

/// Extracts imaging-study mentions (modality) paired with the nearest
/// finding phrase in the trailing window, when one is documented.
pub fn extract_imaging_findings(
    text: &str,
    note_index: usize,
    window_chars: usize,
    anchors: &AnchorDates,
) -> Vec<RawEntity> {
    MODALITY_PATTERN
        .find_iter(text)
        .filter_map(|m| {
            let finding = finding_in_window(text, m.start(), m.end(), window_chars)?;
            let temporal = temporal::analyze_span(text, m.start(), m.end(), window_chars, anchors, None);
            Some(RawEntity {
                value: EntityValue::ImagingFinding(ImagingFindingDetail {
                    modality: m.as_str().to_uppercase(),
                    finding,
                }),
                source: ExtractionSource::Pattern,
                source_span: SourceSpan::new(note_index, m.start(), m.end()),
                confidence: PipelineConfig::CONFIDENCE_MEDIUM,
                temporal,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modality_with_finding_extracted() {
        let out = extract_imaging_findings("Repeat CT head shows stable postoperative changes.", 0, 200, &AnchorDates::default());
        assert!(out.iter().any(|e| matches!(&e.value, EntityValue::ImagingFinding(f) if f.modality == "CT" && f.finding == "stable")));
    }

    #[test]
    fn modality_without_finding_phrase_dropped() {
        let out = extract_imaging_findings("MRI ordered for tomorrow.", 0, 5, &AnchorDates::default());
        assert!(out.is_empty());
    }
}
