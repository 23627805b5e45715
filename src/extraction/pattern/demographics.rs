use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::config::PipelineConfig;
use crate::model::{ExtractionSource, ScalarCandidate, ScalarField, ScalarValue, SourceSpan};

use super::validators::{is_dob_not_future, is_plausible_age, is_plausible_mrn};

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?im)^(?:patient|name)\s*:\s*([A-Za-z][A-Za-z .'\-]{1,60})$").unwrap());
static MRN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bMRN\s*[:#]?\s*(\d{6,10})\b").unwrap());
static DOB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bDOB\s*:?\s*(\d{4}-\d{2}-\d{2})\b").unwrap());
static AGE_YO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,3})[\s-]?(?:y/?o|year[\s-]old|years?\s+old)\b").unwrap());
static AGE_FIELD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bAge\s*:?\s*(\d{1,3})\b").unwrap());
static GENDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(male|female|man|woman)\b").unwrap());
static ATTENDING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?im)^Attending\s*:\s*([A-Za-z][A-Za-z .'\-]{1,60})$").unwrap());

fn candidate(field: ScalarField, value: ScalarValue, confidence: f32, span: (usize, usize)) -> ScalarCandidate {
    ScalarCandidate {
        field,
        value,
        confidence,
        source: ExtractionSource::Pattern,
        source_span: SourceSpan::new(0, span.0, span.1),
    }
}

/// Extracts demographic scalar candidates (name, MRN, DOB, age, gender,
/// attending) from normalized note text.
pub fn extract_demographics(text: &str) -> Vec<ScalarCandidate> {
    let mut out = Vec::new();

    if let Some(m) = NAME.captures(text) {
        let whole = m.get(0).unwrap();
        out.push(candidate(
            ScalarField::Name,
            ScalarValue::Text(m[1].trim().to_string()),
            PipelineConfig::CONFIDENCE_HIGH,
            (whole.start(), whole.end()),
        ));
    }

    if let Some(m) = MRN.captures(text) {
        let whole = m.get(0).unwrap();
        if is_plausible_mrn(&m[1]) {
            out.push(candidate(
                ScalarField::Mrn,
                ScalarValue::Text(m[1].to_string()),
                PipelineConfig::CONFIDENCE_CRITICAL,
                (whole.start(), whole.end()),
            ));
        }
    }

    if let Some(m) = DOB.captures(text) {
        let whole = m.get(0).unwrap();
        if let Ok(dob) = NaiveDate::parse_from_str(&m[1], "%Y-%m-%d") {
            if is_dob_not_future(dob) {
                out.push(candidate(
                    ScalarField::Dob,
                    ScalarValue::Date(dob),
                    PipelineConfig::CONFIDENCE_CRITICAL,
                    (whole.start(), whole.end()),
                ));
            }
        }
    }

    let age_match = AGE_YO.captures(text).or_else(|| AGE_FIELD.captures(text));
    if let Some(m) = age_match {
        let whole = m.get(0).unwrap();
        if let Ok(age) = m[1].parse::<u8>() {
            if is_plausible_age(age) {
                out.push(candidate(
                    ScalarField::Age,
                    ScalarValue::Number(age),
                    PipelineConfig::CONFIDENCE_HIGH,
                    (whole.start(), whole.end()),
                ));
            }
        }
    }

    if let Some(m) = GENDER.captures(text) {
        let whole = m.get(0).unwrap();
        let gender = match m[1].to_lowercase().as_str() {
            "male" | "man" => "male",
            _ => "female",
        };
        out.push(candidate(
            ScalarField::Gender,
            ScalarValue::Text(gender.to_string()),
            PipelineConfig::CONFIDENCE_MEDIUM,
            (whole.start(), whole.end()),
        ));
    }

    if let Some(m) = ATTENDING.captures(text) {
        let whole = m.get(0).unwrap();
        out.push(candidate(
            ScalarField::Attending,
            ScalarValue::Text(m[1].trim().to_string()),
            PipelineConfig::CONFIDENCE_MEDIUM,
            (whole.start(), whole.end()),
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_mrn_when_plausible() {
        let candidates = extract_demographics("Patient: John Smith\nMRN: 1234567\nAge: 64");
        assert!(candidates.iter().any(|c| c.field == ScalarField::Mrn));
    }

    #[test]
    fn rejects_implausible_mrn_length() {
        let candidates = extract_demographics("MRN: 123");
        assert!(!candidates.iter().any(|c| c.field == ScalarField::Mrn));
    }

    #[test]
    fn extracts_age_from_year_old_phrase() {
        let candidates = extract_demographics("64-year-old male presents with headache.");
        let age = candidates.iter().find(|c| c.field == ScalarField::Age);
        assert!(matches!(age.map(|c| &c.value), Some(ScalarValue::Number(64))));
    }

    #[test]
    fn rejects_implausible_age() {
        let candidates = extract_demographics("Age: 200");
        assert!(!candidates.iter().any(|c| c.field == ScalarField::Age));
    }

    #[test]
    fn extracts_gender_keyword() {
        let candidates = extract_demographics("64-year-old female with SAH.");
        let gender = candidates.iter().find(|c| c.field == ScalarField::Gender);
        assert!(matches!(&gender.unwrap().value, ScalarValue::Text(g) if g == "female"));
    }
}
