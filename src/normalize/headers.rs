use std::sync::LazyLock;

use regex::Regex;

/// Canonical section header names a note can carry. Matching is
/// case-insensitive against a synonym table; unrecognized headers are left
/// untouched (never deleted — only recognized headers are rewritten).
const CANONICAL_HEADERS: &[(&str, &[&str])] = &[
    ("HISTORY OF PRESENT ILLNESS", &["hpi", "history of present illness", "h.p.i."]),
    ("HOSPITAL COURSE", &["hospital course", "course", "clinical course"]),
    ("PHYSICAL EXAM", &["pe", "physical exam", "physical examination", "exam"]),
    ("ASSESSMENT AND PLAN", &["a/p", "a&p", "assessment and plan", "assessment/plan"]),
    ("MEDICATIONS", &["meds", "medications", "medication list"]),
    ("ALLERGIES", &["allergies", "nkda"]),
    ("CONSULTATIONS", &["consults", "consultations", "consult"]),
    ("DISCHARGE DISPOSITION", &["disposition", "discharge disposition", "dispo"]),
    ("FOLLOW UP", &["follow up", "follow-up", "f/u"]),
];

/// A recognized header line, with an optional bullet/marker prefix
/// (`*`, `-`, `=`, a leading digit+period) that is stripped along with the
/// synonym text, then replaced by the canonical spelling plus a single
/// trailing colon.
static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*[*=\-]{0,3}[ \t]*(?:\d+[.)])?[ \t]*([A-Za-z][A-Za-z /&.\-]{1,40}?)[ \t]*:[ \t]*$").unwrap()
});

fn canonical_for(candidate: &str) -> Option<&'static str> {
    let lowered = candidate.trim().to_lowercase();
    CANONICAL_HEADERS
        .iter()
        .find(|(_, synonyms)| synonyms.contains(&lowered.as_str()))
        .map(|(canonical, _)| *canonical)
}

/// Rewrites recognized section header lines to a single canonical form,
/// e.g. `* H.P.I.:`, `- hpi:`, and `=HPI=` all become `HISTORY OF PRESENT
/// ILLNESS:`. Unrecognized headers (free-text section names not in the
/// synonym table) are passed through unchanged — never deleted.
pub fn canonicalize_headers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for caps in HEADER_LINE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let candidate = caps.get(1).unwrap().as_str();
        if let Some(canonical) = canonical_for(candidate) {
            out.push_str(&text[cursor..whole.start()]);
            out.push_str(canonical);
            out.push(':');
            cursor = whole.end();
        }
    }
    out.push_str(&text[cursor..]);
    out
}
