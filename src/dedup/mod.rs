//! Four-phase semantic deduplication over normalized notes: exact-hash,
//! near-duplicate (Jaccard), sentence-level, and complementary merge
//! (spec §4.2). Every phase is bound by the information-preservation
//! invariant — a sentence is never dropped if it is the sole carrier of a
//! token not present anywhere else in the retained corpus.

mod tokens;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::model::NormalizedNote;
use tokens::{information_density, jaccard, split_sentences, token_set};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupMetrics {
    pub original_count: usize,
    pub final_count: usize,
    pub reduction_percent: f64,
}

impl DedupMetrics {
    fn compute(original_count: usize, final_count: usize) -> Self {
        let reduction_percent = if original_count == 0 {
            0.0
        } else {
            (original_count - final_count) as f64 / original_count as f64 * 100.0
        };
        Self {
            original_count,
            final_count,
            reduction_percent,
        }
    }
}

pub struct DedupResult {
    pub notes: Vec<NormalizedNote>,
    pub metrics: DedupMetrics,
}

/// Runs all four phases in spec order and returns the retained notes plus
/// reduction metrics.
pub fn deduplicate(notes: Vec<NormalizedNote>, config: &PipelineConfig) -> DedupResult {
    let original_count = notes.len();

    let notes = exact_hash_dedup(notes);
    let notes = near_duplicate_dedup(notes, config.jaccard_near_duplicate_threshold);
    let notes = sentence_level_dedup(notes, config.sentence_duplicate_threshold);
    let notes = complementary_merge(notes, config.complementary_merge_range);

    let final_count = notes.len();
    DedupResult {
        notes,
        metrics: DedupMetrics::compute(original_count, final_count),
    }
}

/// Phase 1: drop whole notes whose content hash was already seen,
/// preserving the first occurrence in input order.
fn exact_hash_dedup(notes: Vec<NormalizedNote>) -> Vec<NormalizedNote> {
    let mut seen = std::collections::HashSet::new();
    notes
        .into_iter()
        .filter(|note| seen.insert(blake3::hash(note.text.as_bytes())))
        .collect()
}

/// Phase 2: for pairs of notes whose whole-text Jaccard similarity exceeds
/// `threshold`, keep only the one with higher information density.
fn near_duplicate_dedup(notes: Vec<NormalizedNote>, threshold: f64) -> Vec<NormalizedNote> {
    let sets: Vec<_> = notes.iter().map(|n| token_set(&n.text)).collect();
    let densities: Vec<_> = notes.iter().map(|n| information_density(&n.text)).collect();
    let mut dropped = vec![false; notes.len()];

    for i in 0..notes.len() {
        if dropped[i] {
            continue;
        }
        for j in (i + 1)..notes.len() {
            if dropped[j] {
                continue;
            }
            if jaccard(&sets[i], &sets[j]) >= threshold {
                if densities[i] >= densities[j] {
                    dropped[j] = true;
                } else {
                    dropped[i] = true;
                    break;
                }
            }
        }
    }

    notes
        .into_iter()
        .zip(dropped)
        .filter(|(_, drop)| !drop)
        .map(|(note, _)| note)
        .collect()
}

/// Phase 3: dedup at sentence granularity across the whole remaining
/// corpus. A later sentence is dropped only when it is both near-identical
/// (Jaccard ≥ threshold) to an earlier one AND contributes no token absent
/// from every sentence already retained — this second check is what keeps
/// the phase honest under the information-preservation invariant even
/// when two sentences are lexically very close but not token-identical.
fn sentence_level_dedup(notes: Vec<NormalizedNote>, threshold: f64) -> Vec<NormalizedNote> {
    let mut retained_sentence_sets: Vec<std::collections::HashSet<String>> = Vec::new();
    let mut retained_tokens: std::collections::HashSet<String> = std::collections::HashSet::new();

    notes
        .into_iter()
        .map(|note| {
            let sentences = split_sentences(&note.text);
            let mut kept_sentences = Vec::with_capacity(sentences.len());
            for sentence in sentences {
                let sentence_tokens = token_set(&sentence);
                let is_duplicate = retained_sentence_sets
                    .iter()
                    .any(|seen| jaccard(seen, &sentence_tokens) >= threshold);

                let introduces_unique_token = sentence_tokens.difference(&retained_tokens).next().is_some();

                if is_duplicate && !introduces_unique_token {
                    continue;
                }

                retained_tokens.extend(sentence_tokens.iter().cloned());
                retained_sentence_sets.push(sentence_tokens);
                kept_sentences.push(sentence);
            }
            NormalizedNote {
                text: kept_sentences.join(" "),
                original: note.original,
                index: note.index,
            }
        })
        .collect()
}

/// Phase 4: notes in the 0.30–0.60 similarity band are believed to
/// describe the same encounter but are not near-duplicates — concatenate
/// them in input (chronological-proxy) order rather than dropping either.
/// Conflicting facts are never resolved here; they simply sit as separate
/// sentences for the merger/narrative stages to reconcile later.
fn complementary_merge(notes: Vec<NormalizedNote>, range: (f64, f64)) -> Vec<NormalizedNote> {
    let (low, high) = range;
    let sets: Vec<_> = notes.iter().map(|n| token_set(&n.text)).collect();
    let mut merged_into: Vec<Option<usize>> = vec![None; notes.len()];

    for i in 0..notes.len() {
        if merged_into[i].is_some() {
            continue;
        }
        for j in (i + 1)..notes.len() {
            if merged_into[j].is_some() {
                continue;
            }
            let similarity = jaccard(&sets[i], &sets[j]);
            if similarity >= low && similarity <= high {
                merged_into[j] = Some(i);
            }
        }
    }

    let mut result: Vec<Option<NormalizedNote>> = notes.into_iter().map(Some).collect();
    for j in 0..merged_into.len() {
        if let Some(target) = merged_into[j] {
            let appended = result[j].take().expect("each index consumed once");
            if let Some(base) = result[target].as_mut() {
                base.text.push(' ');
                base.text.push_str(&appended.text);
            }
        }
    }
    result.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(text: &str, index: usize) -> NormalizedNote {
        NormalizedNote {
            text: text.to_string(),
            original: text.to_string(),
            index,
        }
    }

    #[test]
    fn exact_duplicates_collapse_to_one() {
        let notes = vec![note("identical text here", 0), note("identical text here", 1)];
        let result = exact_hash_dedup(notes);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].index, 0);
    }

    #[test]
    fn near_duplicate_keeps_higher_density_note() {
        let notes = vec![
            note("patient stable overnight vitals normal ambulating well", 0),
            note("patient stable overnight", 1),
        ];
        let result = near_duplicate_dedup(notes, 0.5);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].index, 0);
    }

    #[test]
    fn sentence_level_dedup_preserves_unique_sentence() {
        let notes = vec![
            note("Patient stable. Continue ASA 81mg.", 0),
            note("Patient stable. New finding of vasospasm noted.", 1),
        ];
        let result = sentence_level_dedup(notes, 0.90);
        let combined: String = result.iter().map(|n| n.text.clone()).collect::<Vec<_>>().join(" ");
        assert!(combined.contains("vasospasm"));
        assert!(combined.contains("ASA 81mg"));
    }

    #[test]
    fn complementary_merge_concatenates_partial_overlap() {
        // crafted so whole-note similarity lands in the 0.30-0.60 band
        let notes = vec![
            note("patient reports headache nausea vomiting dizziness confusion", 0),
            note("patient reports headache photophobia neck stiffness diplopia", 1),
        ];
        let sim = jaccard(&token_set(&notes[0].text), &token_set(&notes[1].text));
        assert!(sim >= 0.30 && sim <= 0.60, "fixture similarity {sim} not in band");
        let result = complementary_merge(notes, (0.30, 0.60));
        assert_eq!(result.len(), 1);
        assert!(result[0].text.contains("nausea"));
        assert!(result[0].text.contains("photophobia"));
    }

    #[test]
    fn full_pipeline_reports_metrics() {
        let notes = vec![
            note("patient admitted with headache", 0),
            note("patient admitted with headache", 1),
        ];
        let config = PipelineConfig::default();
        let result = deduplicate(notes, &config);
        assert_eq!(result.metrics.original_count, 2);
        assert_eq!(result.metrics.final_count, 1);
        assert_eq!(result.metrics.reduction_percent, 50.0);
    }
}
