use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single raw clinical note as provided by the caller.
///
/// Input ordering is caller-provided and preserved throughout the pipeline —
/// the core never reorders notes by inferred date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub text: String,
    /// Optional authored-date hint supplied by the caller (e.g. from document
    /// metadata). Does not override dates recovered from the note body.
    pub authored_date_hint: Option<NaiveDate>,
}

impl ClinicalNote {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            authored_date_hint: None,
        }
    }

    pub fn with_date_hint(mut self, date: NaiveDate) -> Self {
        self.authored_date_hint = Some(date);
        self
    }
}

/// Reference dates recovered by the normalizer and used as anchors for
/// relative-expression resolution downstream (POD, "today", etc).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorDates {
    pub admission: Option<NaiveDate>,
    pub surgery: Vec<NaiveDate>,
    pub ictus: Option<NaiveDate>,
    pub discharge: Option<NaiveDate>,
}

impl AnchorDates {
    /// Closest surgery date at or before `on_or_before`, tie-broken to the
    /// earliest surgery per spec.
    pub fn closest_preceding_surgery(&self, on_or_before: NaiveDate) -> Option<NaiveDate> {
        self.surgery
            .iter()
            .copied()
            .filter(|d| *d <= on_or_before)
            .min_by_key(|d| (on_or_before - *d).num_days())
    }
}

/// A clinical note after normalization — timestamps canonicalized to ISO
/// form, section headers canonicalized, abbreviation spacing standardized.
///
/// Invariant: normalization is information-preserving. No token present in
/// `original` may be absent from `text` (it may only be rewritten in place).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedNote {
    pub text: String,
    pub original: String,
    pub index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_preceding_surgery_picks_nearest() {
        let anchors = AnchorDates {
            surgery: vec![
                NaiveDate::from_ymd_opt(2025, 10, 10).unwrap(),
                NaiveDate::from_ymd_opt(2025, 10, 16).unwrap(),
            ],
            ..Default::default()
        };
        let on = NaiveDate::from_ymd_opt(2025, 10, 19).unwrap();
        assert_eq!(
            anchors.closest_preceding_surgery(on),
            Some(NaiveDate::from_ymd_opt(2025, 10, 16).unwrap())
        );
    }

    #[test]
    fn closest_preceding_surgery_ties_prefer_earliest() {
        let d1 = NaiveDate::from_ymd_opt(2025, 10, 10).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 10, 14).unwrap();
        let anchors = AnchorDates {
            surgery: vec![d2, d1],
            ..Default::default()
        };
        // both are 4 days before `on` is false; construct an actual tie by using
        // the same day-distance from two different anchors on either side is
        // impossible pre-filter (only <=), so ties only occur with duplicate dates.
        let anchors_tied = AnchorDates {
            surgery: vec![d1, d1],
            ..anchors
        };
        let on = NaiveDate::from_ymd_opt(2025, 10, 17).unwrap();
        assert_eq!(anchors_tied.closest_preceding_surgery(on), Some(d1));
    }

    #[test]
    fn no_preceding_surgery_returns_none() {
        let anchors = AnchorDates {
            surgery: vec![NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()],
            ..Default::default()
        };
        let on = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert_eq!(anchors.closest_preceding_surgery(on), None);
    }
}
