//! Regex/dictionary entity extraction with per-field confidence weights
//! (spec §4.4). Every emission is run through the Temporal Analyzer before
//! being handed to the merger — this module never decides new_event vs
//! reference itself.

mod complications;
mod consultations;
mod dates;
mod demographics;
mod diagnoses;
mod disposition;
mod examination;
mod functional_status;
mod imaging;
mod medications;
mod procedures;
mod scores;
mod validators;

pub use functional_status::compute_kps_from_text;

use crate::config::PipelineConfig;
use crate::model::{AnchorDates, ExtractionDraft, NormalizedNote, ScoreScale};

/// Runs the full pattern catalogue over one normalized note and appends
/// its emissions to `draft`. Called once per note so every `SourceSpan`
/// carries the correct `note_index`.
fn extract_note(draft: &mut ExtractionDraft, note: &NormalizedNote, config: &PipelineConfig, anchors: &AnchorDates) {
    let window = config.temporal_window_chars;
    let text = &note.text;
    let idx = note.index;

    draft.scalars.extend(demographics::extract_demographics(text));
    draft.scalars.extend(dates::extract_scalar_dates(text));
    draft.surgery_dates.extend(dates::extract_surgery_dates(text));

    draft.entities.extend(scores::extract_scores(text, idx, window, anchors));
    draft.entities.extend(diagnoses::extract_diagnoses(text, idx, window, anchors));
    draft.entities.extend(procedures::extract_procedures(text, idx, window, anchors));
    draft.entities.extend(complications::extract_complications(text, idx, window, anchors));
    draft.entities.extend(medications::extract_medications(text, idx, window, anchors));
    draft.entities.extend(imaging::extract_imaging_findings(text, idx, window, anchors));
    draft.entities.extend(consultations::extract_consultations(text, idx, window, anchors));
    draft.entities.extend(examination::extract_examination_findings(text, idx, window, anchors));
    if let Some(disposition) = disposition::extract_disposition(text, idx, window, anchors) {
        draft.entities.push(disposition);
    }
    draft.entities.extend(disposition::extract_follow_up(text, idx, window, anchors));

    let explicit_scales: Vec<ScoreScale> = draft
        .entities
        .iter()
        .filter_map(|e| match &e.value {
            crate::model::RawEntityValue::FunctionalScore(f) => Some(f.scale),
            _ => None,
        })
        .collect();
    if let Some(computed) = functional_status::compute_kps_from_text(text, &explicit_scales, idx) {
        draft.entities.push(crate::model::RawEntity {
            value: crate::model::RawEntityValue::FunctionalScore(computed.value),
            source: crate::model::ExtractionSource::Pattern,
            source_span: computed.source_span,
            confidence: computed.confidence,
            temporal: computed.temporal,
        });
    }
}

/// Runs the Pattern Extractor over every normalized note, producing one
/// combined `ExtractionDraft`.
pub fn extract(notes: &[NormalizedNote], anchors: &AnchorDates, config: &PipelineConfig) -> ExtractionDraft {
    let mut draft = ExtractionDraft::default();
    for note in notes {
        extract_note(&mut draft, note, config, anchors);
    }
    tracing::info!(
        entity_count = draft.entities.len(),
        scalar_count = draft.scalars.len(),
        "pattern extraction complete"
    );
    draft
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClinicalNote;
    use crate::normalize::normalize_notes;

    #[test]
    fn extracts_across_multiple_notes_with_correct_indices() {
        let notes = vec![
            ClinicalNote::new("Admission Date: 2025-10-15. 64-year-old female with SAH."),
            ClinicalNote::new("Underwent coiling of right PCOM aneurysm on 2025-10-16."),
        ];
        let (normalized, anchors) = normalize_notes(&notes);
        let config = PipelineConfig::default();
        let draft = extract(&normalized, &anchors, &config);
        assert!(draft.scalars.iter().any(|c| c.source_span.note_index == 0));
        assert!(draft.entities.iter().any(|e| e.source_span.note_index == 1));
    }
}
