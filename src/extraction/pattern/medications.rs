use std::sync::LazyLock;

use regex::Regex;

use crate::config::PipelineConfig;
use crate::model::{
    AnchorDates, EntityValue, ExtractionSource, MedicationCategory, MedicationDetail, RawEntity,
    SourceSpan,
};
use crate::temporal;

/// One medication name and the category it falls into. Checked in order
/// so a drug present in more than one family's keyword list (none
/// currently are) would take the first match.
const MEDICATIONS: &[(&str, MedicationCategory)] = &[
    ("heparin", MedicationCategory::Anticoagulation),
    ("enoxaparin", MedicationCategory::Anticoagulation),
    ("lovenox", MedicationCategory::Anticoagulation),
    ("warfarin", MedicationCategory::Anticoagulation),
    ("apixaban", MedicationCategory::Anticoagulation),
    ("eliquis", MedicationCategory::Anticoagulation),
    ("aspirin", MedicationCategory::Anticoagulation),
    ("levetiracetam", MedicationCategory::Aed),
    ("keppra", MedicationCategory::Aed),
    ("phenytoin", MedicationCategory::Aed),
    ("dilantin", MedicationCategory::Aed),
    ("valproic acid", MedicationCategory::Aed),
    ("lacosamide", MedicationCategory::Aed),
    ("ceftriaxone", MedicationCategory::Antibiotic),
    ("vancomycin", MedicationCategory::Antibiotic),
    ("cefazolin", MedicationCategory::Antibiotic),
    ("piperacillin", MedicationCategory::Antibiotic),
    ("zosyn", MedicationCategory::Antibiotic),
    ("nimodipine", MedicationCategory::Other),
    ("dexamethasone", MedicationCategory::Other),
    ("mannitol", MedicationCategory::Other),
    ("acetaminophen", MedicationCategory::Other),
];

static DOSE_FREQ: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?\s*(?:mg|mcg|g|units?))\b.{0,20}?\b(q\.?\d{1,2}h|b\.i\.d\.|t\.i\.d\.|q\.i\.d\.|daily|once daily|twice daily|prn)\b").unwrap()
});

fn medication_pattern(name: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name))).unwrap()
}

fn nearby_dose_frequency(text: &str, start: usize, end: usize, window_chars: usize) -> (Option<String>, Option<String>) {
    let mut window_end = (end + window_chars).min(text.len());
    while window_end < text.len() && !text.is_char_boundary(window_end) {
        window_end += 1;
    }
    match DOSE_FREQ.captures(&text[start..window_end]) {
        Some(m) => (Some(m[1].to_string()), Some(m[2].to_string())),
        None => (None, None),
    }
}

/// Extracts medication mentions, categorized into
/// {anticoagulation, AED, antibiotic, other} per spec §4.4, with dose and
/// frequency captured from a short trailing window when present.
pub fn extract_medications(
    text: &str,
    note_index: usize,
    window_chars: usize,
    anchors: &AnchorDates,
) -> Vec<RawEntity> {
    let mut out = Vec::new();
    for (name, category) in MEDICATIONS {
        let pattern = medication_pattern(name);
        for m in pattern.find_iter(text) {
            let (dose, frequency) = nearby_dose_frequency(text, m.start(), m.end(), window_chars);
            let temporal = temporal::analyze_span(text, m.start(), m.end(), window_chars, anchors, None);
            out.push(RawEntity {
                value: EntityValue::Medication(MedicationDetail {
                    name: name.to_string(),
                    category: *category,
                    dose,
                    frequency,
                }),
                source: ExtractionSource::Pattern,
                source_span: SourceSpan::new(note_index, m.start(), m.end()),
                confidence: PipelineConfig::CONFIDENCE_HIGH,
                temporal,
            });
        }
    }
    out
}
