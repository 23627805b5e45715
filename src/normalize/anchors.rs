use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::model::AnchorDates;

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());

const ADMISSION_KEYWORDS: &[&str] = &["admission", "admitted", "doa", "date of admission"];
const SURGERY_KEYWORDS: &[&str] = &[
    "underwent",
    "surgery",
    "operative date",
    "or date",
    "procedure date",
    "craniotomy",
    "coiling",
    "clipping",
];
const ICTUS_KEYWORDS: &[&str] = &["ictus", "onset", "symptom onset"];
const DISCHARGE_KEYWORDS: &[&str] = &["discharged", "discharge date", "date of discharge"];

fn window_contains_any(window: &str, keywords: &[&str]) -> bool {
    let lowered = window.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k))
}

/// Scans normalized (date-canonicalized) text for admission/surgery/ictus/
/// discharge anchor dates, classifying each by a keyword search in the
/// preceding 60 characters. Produces a side table the Temporal Analyzer
/// uses to resolve POD references — normalization never deletes the
/// matched text, it only additionally records it here.
pub fn extract_anchor_dates(text: &str) -> AnchorDates {
    let mut anchors = AnchorDates::default();
    for caps in ISO_DATE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let Ok(date) = NaiveDate::parse_from_str(whole.as_str(), "%Y-%m-%d") else {
            continue;
        };
        let window_start = whole.start().saturating_sub(60);
        let window = &text[window_start..whole.start()];

        if window_contains_any(window, SURGERY_KEYWORDS) {
            if !anchors.surgery.contains(&date) {
                anchors.surgery.push(date);
            }
        } else if window_contains_any(window, ADMISSION_KEYWORDS) && anchors.admission.is_none() {
            anchors.admission = Some(date);
        } else if window_contains_any(window, ICTUS_KEYWORDS) && anchors.ictus.is_none() {
            anchors.ictus = Some(date);
        } else if window_contains_any(window, DISCHARGE_KEYWORDS) {
            anchors.discharge = Some(date);
        }
    }
    anchors.surgery.sort();
    anchors
}

/// Merges per-note anchor tables into one set covering the whole encounter.
/// Later notes' discharge dates win (a discharge date is only meaningful
/// once actually reached); admission/ictus keep the first value seen;
/// surgeries accumulate and de-duplicate across all notes.
pub fn merge_anchor_dates(tables: impl IntoIterator<Item = AnchorDates>) -> AnchorDates {
    let mut merged = AnchorDates::default();
    for table in tables {
        if merged.admission.is_none() {
            merged.admission = table.admission;
        }
        if merged.ictus.is_none() {
            merged.ictus = table.ictus;
        }
        if table.discharge.is_some() {
            merged.discharge = table.discharge;
        }
        for date in table.surgery {
            if !merged.surgery.contains(&date) {
                merged.surgery.push(date);
            }
        }
    }
    merged.surgery.sort();
    merged
}
