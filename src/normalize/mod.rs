//! Canonicalizes raw clinical notes: dates to ISO-8601, section headers to
//! a fixed vocabulary, abbreviation spacing, and POD/HD notation — never
//! deleting text, only rewriting it in place (spec §4.1).

mod abbreviations;
mod anchors;
mod dates;
mod headers;
mod pod;

pub use anchors::{extract_anchor_dates, merge_anchor_dates};

use crate::model::{AnchorDates, ClinicalNote, NormalizedNote};

/// Runs the full normalization pipeline over one note's text. Order
/// matters: dates first (so header/abbreviation rewrites never see
/// un-canonicalized date punctuation), then headers, then abbreviations,
/// then POD notation (which depends on neither).
pub fn normalize_text(text: &str) -> String {
    let text = dates::canonicalize_dates(text);
    let text = headers::canonicalize_headers(&text);
    let text = abbreviations::standardize_abbreviations(&text);
    pod::canonicalize_pod(&text)
}

/// Normalizes one clinical note, producing a `NormalizedNote` that retains
/// the original text for the information-preservation checks exercised in
/// `tests/invariants.rs`.
pub fn normalize_note(note: &ClinicalNote, index: usize) -> NormalizedNote {
    NormalizedNote {
        text: normalize_text(&note.text),
        original: note.text.clone(),
        index,
    }
}

/// Normalizes an ordered batch of notes and extracts the combined anchor
/// date table used by the Temporal Analyzer for POD resolution.
pub fn normalize_notes(notes: &[ClinicalNote]) -> (Vec<NormalizedNote>, AnchorDates) {
    let normalized: Vec<NormalizedNote> = notes
        .iter()
        .enumerate()
        .map(|(index, note)| normalize_note(note, index))
        .collect();
    let anchors = merge_anchor_dates(
        normalized
            .iter()
            .map(|n| extract_anchor_dates(&n.text)),
    );
    (normalized, anchors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let text = "* HPI: Admission 10/15/2025. s / p coiling on POD 0. Discharged 10/22/2025.";
        let once = normalize_text(text);
        let twice = normalize_text(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalization_preserves_every_alphanumeric_token() {
        let text = "Patient admitted 10/15/2025 s / p coiling, continues ASA 81mg p . o . b.i.d.";
        let normalized = normalize_text(text);
        let original_tokens: std::collections::HashSet<&str> =
            text.split_whitespace().collect();
        // Every word-character run present in the source (ignoring pure
        // punctuation tokens that normalization legitimately collapses,
        // like the spaced-out "/" and ".") must still be findable.
        for token in original_tokens {
            let core: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
            if core.is_empty() {
                continue;
            }
            assert!(
                normalized.contains(&core),
                "token {core:?} from original text missing after normalization"
            );
        }
    }

    #[test]
    fn normalize_notes_builds_combined_anchor_table() {
        let notes = vec![
            ClinicalNote::new("Admission 10/15/2025."),
            ClinicalNote::new("Underwent coiling on 10/16/2025."),
            ClinicalNote::new("Discharged home on 10/22/2025."),
        ];
        let (normalized, anchors) = normalize_notes(&notes);
        assert_eq!(normalized.len(), 3);
        assert!(anchors.admission.is_some());
        assert_eq!(anchors.surgery.len(), 1);
        assert!(anchors.discharge.is_some());
    }
}
