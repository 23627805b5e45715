//! Section Parser (spec §4.9): pulls the ten fixed `NarrativeSection` keys
//! out of LLM-produced narrative text under four possible formatting
//! styles. Structured styles (`SECTION:`, numbered, markdown-bold) are
//! tried first; if fewer than half the expected sections turn up, the
//! whole document is re-scanned in lenient mode.

use regex::Regex;
use tracing::warn;

use crate::model::NarrativeSection;

const SECTION_KEYS: &[&str] = &[
    "chief_complaint",
    "history_of_present_illness",
    "hospital_course",
    "procedures",
    "complications",
    "consultations",
    "discharge_status",
    "discharge_medications",
    "discharge_disposition",
    "follow_up_plan",
];

/// Result of one parse attempt: the filled section structure plus which
/// keys were actually located in the text (vs. left empty for lack of a
/// match).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNarrative {
    pub section: NarrativeSection,
    pub found: Vec<&'static str>,
    pub missing: Vec<&'static str>,
}

fn canonical_label(key: &str) -> String {
    key.to_uppercase()
}

/// `chief_complaint` -> a pattern matching "chief complaint", "Chief
/// Complaint", or the canonical "CHIEF_COMPLAINT" alike — lenient mode is
/// deliberately a superset of the structured styles, not a disjoint one,
/// since a document can legitimately mix formatting across sections.
fn lenient_pattern(key: &str) -> String {
    key.split('_').map(regex::escape).collect::<Vec<_>>().join(r"[ _]+")
}

/// `SECTION:` / numbered / markdown-bold styles, tried for one key in that
/// order. Returns the byte range of the *label*, not its content.
fn find_structured(text: &str, key: &str) -> Option<(usize, usize)> {
    let canon = regex::escape(&canonical_label(key));
    let plain = Regex::new(&format!(r"(?m)^\s*{canon}:[ \t]*")).unwrap();
    if let Some(m) = plain.find(text) {
        return Some((m.start(), m.end()));
    }
    let numbered = Regex::new(&format!(r"(?m)^\s*\d+\.\s*{canon}:[ \t]*")).unwrap();
    if let Some(m) = numbered.find(text) {
        return Some((m.start(), m.end()));
    }
    let bold = Regex::new(&format!(r"(?m)^\s*\*\*{canon}\*\*:?[ \t]*")).unwrap();
    if let Some(m) = bold.find(text) {
        return Some((m.start(), m.end()));
    }
    None
}

/// Style 4: the section name in any case, possibly spaced instead of
/// underscored, followed by a colon or newline — anywhere in the text.
fn find_lenient(text: &str, key: &str) -> Option<(usize, usize)> {
    let pattern = lenient_pattern(key);
    let re = Regex::new(&format!(r"(?im){pattern}\s*[:\n]")).unwrap();
    re.find(text).map(|m| (m.start(), m.end()))
}

fn assemble(text: &str, mut matches: Vec<(&'static str, usize, usize)>) -> ParsedNarrative {
    matches.sort_by_key(|(_, start, _)| *start);

    let mut section = NarrativeSection::default();
    let mut found = Vec::new();

    for (i, (key, _label_start, label_end)) in matches.iter().enumerate() {
        let content_end = matches.get(i + 1).map(|(_, s, _)| *s).unwrap_or(text.len());
        let content = text[*label_end..content_end].trim();
        if !content.is_empty() {
            section.set(key, content.to_string());
            found.push(*key);
        }
    }

    let missing: Vec<&'static str> = SECTION_KEYS.iter().copied().filter(|k| !found.contains(k)).collect();
    for key in &missing {
        warn!(section = key, "section parser found no content for this key");
    }

    ParsedNarrative { section, found, missing }
}

/// Parses `text` into a `NarrativeSection`. Falls back to lenient mode for
/// the whole document when structured styles locate fewer than half the
/// expected sections (spec §4.9).
pub fn parse(text: &str) -> ParsedNarrative {
    let structured: Vec<(&'static str, usize, usize)> = SECTION_KEYS
        .iter()
        .filter_map(|key| find_structured(text, key).map(|(s, e)| (*key, s, e)))
        .collect();

    if structured.len() * 2 >= SECTION_KEYS.len() {
        return assemble(text, structured);
    }

    let lenient: Vec<(&'static str, usize, usize)> = SECTION_KEYS
        .iter()
        .filter_map(|key| find_lenient(text, key).map(|(s, e)| (*key, s, e)))
        .collect();
    assemble(text, lenient)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_section_colon_style() {
        let text = "CHIEF_COMPLAINT:\nSubarachnoid hemorrhage.\n\nHOSPITAL_COURSE:\nStable course.\n";
        let parsed = parse(text);
        assert_eq!(parsed.section.chief_complaint, "Subarachnoid hemorrhage.");
        assert_eq!(parsed.section.hospital_course, "Stable course.");
    }

    #[test]
    fn parses_numbered_style() {
        let text = "1. CHIEF_COMPLAINT:\nSAH.\n2. HOSPITAL_COURSE:\nUneventful.\n3. DISCHARGE_DISPOSITION:\nHome.\n4. PROCEDURES:\nCoiling.\n5. COMPLICATIONS:\nNone.\n";
        let parsed = parse(text);
        assert_eq!(parsed.section.chief_complaint, "SAH.");
        assert_eq!(parsed.section.discharge_disposition, "Home.");
    }

    #[test]
    fn parses_markdown_bold_style() {
        let text = "**CHIEF_COMPLAINT**\nSAH.\n**HOSPITAL_COURSE**\nUneventful.\n**DISCHARGE_DISPOSITION**\nHome.\n**PROCEDURES**\nCoiling.\n**COMPLICATIONS**\nNone.\n";
        let parsed = parse(text);
        assert_eq!(parsed.section.chief_complaint, "SAH.");
    }

    #[test]
    fn falls_back_to_lenient_when_few_structured_sections_found() {
        let text = "Chief Complaint:\nSAH with headache.\n\nThe patient's hospital course:\nwas uneventful overall.\n";
        let parsed = parse(text);
        assert!(parsed.section.chief_complaint.contains("SAH"));
    }

    #[test]
    fn missing_sections_are_reported_not_fabricated() {
        let text = "CHIEF_COMPLAINT:\nSAH.\n";
        let parsed = parse(text);
        assert!(parsed.missing.contains(&"follow_up_plan"));
        assert_eq!(parsed.section.follow_up_plan, "");
    }

    #[test]
    fn content_between_labels_does_not_bleed_into_neighbor() {
        let text = "CHIEF_COMPLAINT:\nSAH.\nHOSPITAL_COURSE:\nUneventful course.\n";
        let parsed = parse(text);
        assert!(!parsed.section.chief_complaint.contains("Uneventful"));
    }
}
