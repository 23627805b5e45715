use std::sync::LazyLock;

use regex::Regex;

/// Loosely-spaced abbreviation pattern and its tight canonical spelling.
/// Route markers (IV/IM/PO) are "marker keywords" per spec §4.1 — their
/// case is forced to uppercase regardless of source casing. All other
/// abbreviations keep lowercase, which is how clinical shorthand is
/// conventionally written.
struct AbbreviationRule {
    pattern: &'static LazyLock<Regex>,
    canonical: &'static str,
}

static S_P: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bs\s*/\s*p\b").unwrap());
static H_O: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bh\s*/\s*o\b").unwrap());
static R_O: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\br\s*/\s*o\b").unwrap());
static F_U: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bf\s*/\s*u\b").unwrap());
static D_C: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bd\s*/\s*c\b").unwrap());
static W_U: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bw\s*/\s*u\b").unwrap());
static QD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bq\s*\.?\s*d\s*\.?\b").unwrap());
static BID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bb\s*\.?\s*i\s*\.?\s*d\s*\.?\b").unwrap());
static TID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bt\s*\.?\s*i\s*\.?\s*d\s*\.?\b").unwrap());
static QID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bq\s*\.?\s*i\s*\.?\s*d\s*\.?\b").unwrap());
static PRN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bp\s*\.?\s*r\s*\.?\s*n\s*\.?\b").unwrap());
static PO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bp\s*\.?\s*o\s*\.?\b").unwrap());
static IV: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bi\s*\.?\s*v\s*\.?\b").unwrap());
static IM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bi\s*\.?\s*m\s*\.?\b").unwrap());

fn rules() -> Vec<AbbreviationRule> {
    vec![
        AbbreviationRule { pattern: &S_P, canonical: "s/p" },
        AbbreviationRule { pattern: &H_O, canonical: "h/o" },
        AbbreviationRule { pattern: &R_O, canonical: "r/o" },
        AbbreviationRule { pattern: &F_U, canonical: "f/u" },
        AbbreviationRule { pattern: &D_C, canonical: "d/c" },
        AbbreviationRule { pattern: &W_U, canonical: "w/u" },
        AbbreviationRule { pattern: &BID, canonical: "b.i.d." },
        AbbreviationRule { pattern: &TID, canonical: "t.i.d." },
        AbbreviationRule { pattern: &QID, canonical: "q.i.d." },
        AbbreviationRule { pattern: &PRN, canonical: "p.r.n." },
        AbbreviationRule { pattern: &QD, canonical: "q.d." },
        AbbreviationRule { pattern: &PO, canonical: "p.o." },
        AbbreviationRule { pattern: &IV, canonical: "IV" },
        AbbreviationRule { pattern: &IM, canonical: "IM" },
    ]
}

/// Collapses interior whitespace inside known clinical abbreviations
/// (`s / p` -> `s/p`, `b . i . d` -> `b.i.d.`) without altering anything
/// else in the note. Longer/more specific patterns (`b.i.d.`) are applied
/// before shorter ones that could otherwise partially match inside them
/// (`q.d.` never matches inside `q.i.d.` because `i` sits between `q` and
/// `d`, but the ordering is kept defensive regardless).
pub fn standardize_abbreviations(text: &str) -> String {
    let mut result = text.to_string();
    for rule in rules() {
        result = rule
            .pattern
            .replace_all(&result, rule.canonical)
            .into_owned();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_spaced_slash_abbreviation() {
        assert_eq!(standardize_abbreviations("s / p coiling"), "s/p coiling");
    }

    #[test]
    fn collapses_dotted_frequency_abbreviation() {
        assert_eq!(standardize_abbreviations("ASA 81mg b . i . d"), "ASA 81mg b.i.d.");
    }

    #[test]
    fn route_markers_forced_uppercase() {
        assert_eq!(standardize_abbreviations("vancomycin i.v."), "vancomycin IV");
    }

    #[test]
    fn idempotent() {
        let text = "h / o hypertension, s/p coiling, ASA 81mg p.o. b.i.d.";
        let once = standardize_abbreviations(text);
        let twice = standardize_abbreviations(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn unrelated_text_untouched() {
        let text = "Patient reports headache and nausea.";
        assert_eq!(standardize_abbreviations(text), text);
    }
}
