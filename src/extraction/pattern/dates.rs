use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::config::PipelineConfig;
use crate::model::{ExtractionSource, ScalarCandidate, ScalarField, ScalarValue, SourceSpan};

// Normalized text has already had `normalize::dates::canonicalize_dates` run
// over it, so every date in scope is ISO-8601 by the time this module sees
// it; these patterns only need to recognize the surrounding label.
const ISO: &str = r"\d{4}-\d{2}-\d{2}";

static ADMISSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:admission|admitted)\s*(?:date)?\s*:?\s*({ISO})\b")).unwrap()
});
static DISCHARGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bdischarge\s*date\s*:?\s*({ISO})\b")).unwrap()
});
static ICTUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:ictus|onset)\s*(?:date)?\s*:?\s*({ISO})\b")).unwrap()
});
static SURGERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:date of surgery|surgery date|underwent .{{0,60}}? on)\s*:?\s*({ISO})\b"
    ))
    .unwrap()
});

fn parse(m: &regex::Captures) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&m[1], "%Y-%m-%d").ok()
}

fn scalar(field: ScalarField, date: NaiveDate, confidence: f32, span: (usize, usize)) -> ScalarCandidate {
    ScalarCandidate {
        field,
        value: ScalarValue::Date(date),
        confidence,
        source: ExtractionSource::Pattern,
        source_span: SourceSpan::new(0, span.0, span.1),
    }
}

/// Extracts admission, discharge, and ictus scalar date candidates from
/// normalized note text.
pub fn extract_scalar_dates(text: &str) -> Vec<ScalarCandidate> {
    let mut out = Vec::new();

    if let Some(m) = ADMISSION.captures(text) {
        if let Some(date) = parse(&m) {
            let whole = m.get(0).unwrap();
            out.push(scalar(ScalarField::AdmissionDate, date, PipelineConfig::CONFIDENCE_CRITICAL, (whole.start(), whole.end())));
        }
    }
    if let Some(m) = DISCHARGE.captures(text) {
        if let Some(date) = parse(&m) {
            let whole = m.get(0).unwrap();
            out.push(scalar(ScalarField::DischargeDate, date, PipelineConfig::CONFIDENCE_CRITICAL, (whole.start(), whole.end())));
        }
    }
    if let Some(m) = ICTUS.captures(text) {
        if let Some(date) = parse(&m) {
            let whole = m.get(0).unwrap();
            out.push(scalar(ScalarField::IctusDate, date, PipelineConfig::CONFIDENCE_HIGH, (whole.start(), whole.end())));
        }
    }

    out
}

/// Extracts every distinct surgery date mentioned in the text. Unlike the
/// other scalar dates, multiple surgeries are legitimate and non-conflicting
/// (spec §4.6), so this returns a plain union rather than a tie-broken
/// scalar candidate.
pub fn extract_surgery_dates(text: &str) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = SURGERY
        .captures_iter(text)
        .filter_map(|m| parse(&m))
        .collect();
    dates.sort();
    dates.dedup();
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_admission_and_discharge_dates() {
        let text = "Admission Date: 2025-10-15\nDischarge Date: 2025-10-22";
        let candidates = extract_scalar_dates(text);
        assert!(candidates.iter().any(|c| c.field == ScalarField::AdmissionDate
            && c.value == ScalarValue::Date(NaiveDate::from_ymd_opt(2025, 10, 15).unwrap())));
        assert!(candidates.iter().any(|c| c.field == ScalarField::DischargeDate
            && c.value == ScalarValue::Date(NaiveDate::from_ymd_opt(2025, 10, 22).unwrap())));
    }

    #[test]
    fn extracts_ictus_date() {
        let text = "Onset: 2025-10-14, patient found down.";
        let candidates = extract_scalar_dates(text);
        assert!(candidates.iter().any(|c| c.field == ScalarField::IctusDate));
    }

    #[test]
    fn extracts_multiple_distinct_surgery_dates() {
        let text = "Underwent coiling on 2025-10-16. Date of surgery: 2025-10-20 for shunt placement.";
        let dates = extract_surgery_dates(text);
        assert_eq!(dates, vec![
            NaiveDate::from_ymd_opt(2025, 10, 16).unwrap(),
            NaiveDate::from_ymd_opt(2025, 10, 20).unwrap(),
        ]);
    }

    #[test]
    fn no_dates_returns_empty() {
        assert!(extract_scalar_dates("No dates mentioned here.").is_empty());
        assert!(extract_surgery_dates("No dates mentioned here.").is_empty());
    }
}
