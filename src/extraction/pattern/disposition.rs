use std::sync::LazyLock;

use regex::Regex;

use crate::config::PipelineConfig;
use crate::model::{
    AnchorDates, DispositionDetail, EntityValue, ExtractionSource, FollowUpDetail, RawEntity,
    SourceSpan,
};
use crate::temporal;

const DISPOSITIONS: &[&str] = &[
    "home",
    "home with services",
    "home health",
    "acute rehabilitation",
    "acute rehab",
    "skilled nursing facility",
    "SNF",
    "long-term acute care",
    "LTAC",
    "hospice",
    "expired",
];

static DISCHARGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    let joined = DISPOSITIONS.iter().map(|d| regex::escape(d)).collect::<Vec<_>>().join("|");
    Regex::new(&format!(r"(?i)\bdischarge(?:d)?\s*(?:to|home)?\s*:?\s*({joined})\b")).unwrap()
});

static FOLLOW_UP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bf(?:/u|ollow[\s-]?up)\s*(?:with|in)?\s*:?\s*([A-Za-z][A-Za-z0-9 ,.\-]{2,80})(?:[.\n]|$)").unwrap()
});
static TIMEFRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+\s*(?:day|week|month)s?)\b").unwrap());

/// Extracts the discharge disposition, if documented. At most one is
/// returned — the spec models disposition as a singular scalar entity,
/// not a collection.
pub fn extract_disposition(
    text: &str,
    note_index: usize,
    window_chars: usize,
    anchors: &AnchorDates,
) -> Option<RawEntity> {
    let m = DISCHARGE_LINE.captures(text)?;
    let whole = m.get(0).unwrap();
    let temporal = temporal::analyze_span(text, whole.start(), whole.end(), window_chars, anchors, None);
    Some(RawEntity {
        value: EntityValue::DischargeDisposition(DispositionDetail {
            disposition: m[1].to_lowercase(),
        }),
        source: ExtractionSource::Pattern,
        source_span: SourceSpan::new(note_index, whole.start(), whole.end()),
        confidence: PipelineConfig::CONFIDENCE_CRITICAL,
        temporal,
    })
}

/// Extracts follow-up plan mentions ("f/u with neurosurgery in 2 weeks"),
/// with an optional timeframe pulled from the same phrase.
pub fn extract_follow_up(
    text: &str,
    note_index: usize,
    window_chars: usize,
    anchors: &AnchorDates,
) -> Vec<RawEntity> {
    FOLLOW_UP_LINE
        .captures_iter(text)
        .map(|m| {
            let whole = m.get(0).unwrap();
            let body = m[1].trim().to_string();
            let timeframe = TIMEFRAME.find(&body).map(|t| t.as_str().to_string());
            let temporal = temporal::analyze_span(text, whole.start(), whole.end(), window_chars, anchors, None);
            RawEntity {
                value: EntityValue::FollowUp(FollowUpDetail { text: body, timeframe }),
                source: ExtractionSource::Pattern,
                source_span: SourceSpan::new(note_index, whole.start(), whole.end()),
                confidence: PipelineConfig::CONFIDENCE_HIGH,
                temporal,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discharged_home_extracted() {
        let entity = extract_disposition("Discharged home on 2025-10-22 in stable condition.", 0, 200, &AnchorDates::default());
        assert!(matches!(entity.unwrap().value, EntityValue::DischargeDisposition(d) if d.disposition == "home"));
    }

    #[test]
    fn no_disposition_documented_returns_none() {
        assert!(extract_disposition("Patient remains hospitalized.", 0, 200, &AnchorDates::default()).is_none());
    }

    #[test]
    fn follow_up_with_timeframe_extracted() {
        let out = extract_follow_up("F/U with neurosurgery in 2 weeks for staple removal.", 0, 200, &AnchorDates::default());
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0].value, EntityValue::FollowUp(f) if f.timeframe.as_deref() == Some("2 weeks")));
    }
}
