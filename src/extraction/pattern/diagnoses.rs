use std::sync::LazyLock;

use regex::Regex;

use crate::config::PipelineConfig;
use crate::model::{AnchorDates, DiagnosisDetail, EntityValue, ExtractionSource, RawEntity, SourceSpan};
use crate::temporal;

/// Pathology-specific diagnosis phrasing: aneurysm location/size, tumor
/// grade, SCI level, plus a general "diagnosed with <x>" catch-all. Each
/// emits a `DiagnosisDetail` so the merger treats them uniformly; the
/// family-specific detail (location, grade, level) is folded into
/// `icd_hint`-adjacent free text on `name` since the entity model gives
/// diagnoses one payload shape (spec §9: single canonical collection
/// shape, not a per-pathology struct).
static ANEURYSM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?\s*mm)?\s*(anterior communicating|posterior communicating|PCOM|ACOM|middle cerebral|MCA|basilar|internal carotid|ICA)\s*(?:artery)?\s*aneurysm\b").unwrap()
});
static TUMOR_GRADE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(WHO\s*)?grade\s*(I{1,3}V?|IV|[1-4])\s*(glioma|astrocytoma|meningioma|glioblastoma|oligodendroglioma)\b").unwrap()
});
static SCI_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([CTL]\d{1,2}(?:-[CTL]?\d{1,2})?)\s*(?:level\s*)?spinal cord injury\b").unwrap()
});
static GENERAL_DX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdiagnos(?:is|ed with|ed as)\s*:?\s*([A-Za-z][A-Za-z ,\-]{2,60})(?:[.\n]|$)").unwrap()
});
const NEGATION_PHRASES: &[&str] = &["no evidence of", "denies", "negative for", "ruled out", "r/o", "no signs of"];

fn is_negated(text: &str, start: usize) -> bool {
    let mut prefix_start = start.saturating_sub(40);
    while prefix_start > 0 && !text.is_char_boundary(prefix_start) {
        prefix_start -= 1;
    }
    let prefix = &text[prefix_start..start];
    let lowered = prefix.to_lowercase();
    NEGATION_PHRASES.iter().any(|p| lowered.contains(p))
}

fn emit(
    name: String,
    icd_hint: Option<String>,
    span: (usize, usize),
    confidence: f32,
    note_index: usize,
    text: &str,
    window_chars: usize,
    anchors: &AnchorDates,
) -> RawEntity {
    let temporal = temporal::analyze_span(text, span.0, span.1, window_chars, anchors, None);
    RawEntity {
        value: EntityValue::Diagnosis(DiagnosisDetail { name, icd_hint }),
        source: ExtractionSource::Pattern,
        source_span: SourceSpan::new(note_index, span.0, span.1),
        confidence,
        temporal,
    }
}

/// Extracts diagnosis entities: pathology-specific families (aneurysm,
/// tumor grade, SCI level) plus a general "diagnosed with" catch-all.
/// Negated mentions ("denies", "no evidence of", "r/o") are dropped — the
/// spec's seed case 3 requires "no evidence of vasospasm" to not surface
/// as an active finding.
pub fn extract_diagnoses(
    text: &str,
    note_index: usize,
    window_chars: usize,
    anchors: &AnchorDates,
) -> Vec<RawEntity> {
    let mut out = Vec::new();

    for m in ANEURYSM.captures_iter(text) {
        let whole = m.get(0).unwrap();
        if is_negated(text, whole.start()) {
            continue;
        }
        out.push(emit(
            whole.as_str().trim().to_string(),
            None,
            (whole.start(), whole.end()),
            PipelineConfig::CONFIDENCE_CRITICAL,
            note_index,
            text,
            window_chars,
            anchors,
        ));
    }

    for m in TUMOR_GRADE.captures_iter(text) {
        let whole = m.get(0).unwrap();
        if is_negated(text, whole.start()) {
            continue;
        }
        out.push(emit(
            whole.as_str().trim().to_string(),
            None,
            (whole.start(), whole.end()),
            PipelineConfig::CONFIDENCE_HIGH,
            note_index,
            text,
            window_chars,
            anchors,
        ));
    }

    for m in SCI_LEVEL.captures_iter(text) {
        let whole = m.get(0).unwrap();
        if is_negated(text, whole.start()) {
            continue;
        }
        out.push(emit(
            whole.as_str().trim().to_string(),
            None,
            (whole.start(), whole.end()),
            PipelineConfig::CONFIDENCE_HIGH,
            note_index,
            text,
            window_chars,
            anchors,
        ));
    }

    for m in GENERAL_DX.captures_iter(text) {
        let whole = m.get(0).unwrap();
        if is_negated(text, whole.start()) {
            continue;
        }
        out.push(emit(
            m[1].trim().to_string(),
            None,
            (whole.start(), whole.end()),
            PipelineConfig::CONFIDENCE_MEDIUM,
            note_index,
            text,
            window_chars,
            anchors,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchors() -> AnchorDates {
        AnchorDates::default()
    }

    #[test]
    fn aneurysm_with_location_and_size_extracted() {
        let out = extract_diagnoses("7mm right PCOM aneurysm identified on angiography.", 0, 200, &anchors());
        assert!(out.iter().any(|e| matches!(&e.value, EntityValue::Diagnosis(d) if d.name.to_lowercase().contains("pcom") && d.name.contains("7mm"))));
    }

    #[test]
    fn tumor_grade_extracted() {
        let out = extract_diagnoses("Pathology consistent with WHO grade IV glioblastoma.", 0, 200, &anchors());
        assert!(out.iter().any(|e| matches!(&e.value, EntityValue::Diagnosis(d) if d.name.to_lowercase().contains("glioblastoma"))));
    }

    #[test]
    fn sci_level_extracted() {
        let out = extract_diagnoses("Patient sustained a C5-C6 spinal cord injury.", 0, 200, &anchors());
        assert!(out.iter().any(|e| matches!(&e.value, EntityValue::Diagnosis(d) if d.name.to_lowercase().contains("spinal cord injury"))));
    }

    #[test]
    fn negated_finding_not_extracted() {
        let out = extract_diagnoses("No evidence of vasospasm aneurysm on repeat imaging.", 0, 200, &anchors());
        assert!(out.is_empty());
    }

    #[test]
    fn general_diagnosis_phrase_extracted() {
        let out = extract_diagnoses("Patient was diagnosed with hypertension on admission.", 0, 200, &anchors());
        assert!(out.iter().any(|e| matches!(&e.value, EntityValue::Diagnosis(d) if d.name.to_lowercase().contains("hypertension"))));
    }
}
