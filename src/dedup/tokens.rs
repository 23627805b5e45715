use std::collections::HashSet;

/// Whitespace tokenization, lowercased, for Jaccard comparisons. Kept
/// separate from the Pattern Extractor's tokenization — this one only
/// needs to support similarity scoring, not entity matching.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|t| t.to_lowercase()).collect()
}

pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Jaccard similarity between two token sets: |intersection| / |union|.
/// Two empty sets are defined as identical (similarity 1.0).
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Token count times lexical diversity (unique tokens / total tokens) —
/// the information-density score used to pick a survivor among
/// near-duplicate notes (spec §4.2 phase 2).
pub fn information_density(text: &str) -> f64 {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&String> = tokens.iter().collect();
    let diversity = unique.len() as f64 / tokens.len() as f64;
    tokens.len() as f64 * diversity
}

/// Splits text into sentences on `.`, `!`, `?` followed by whitespace or
/// end-of-string, keeping the terminator attached so no punctuation is
/// lost. Abbreviations like `p.o.` are already tight-spaced by
/// normalization, and their internal dots don't follow an uppercase-start
/// word boundary pattern that would otherwise end a sentence early in the
/// vast majority of clinical note text — acceptable for a dedup heuristic
/// operating on already-normalized input.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let next_is_boundary = chars.get(i + 1).map(|n| n.is_whitespace()).unwrap_or(true);
            if next_is_boundary {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
        i += 1;
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}
