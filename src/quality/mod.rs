//! Quality Scorer (spec §4.10): six weighted dimensions, each scored in
//! [0,1] with its own issue list. `model::quality::QualityReport::compose`
//! does the weighted rollup; this module is only responsible for
//! producing the six `DimensionScore`s that feed it.

use std::collections::HashSet;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::model::{
    DimensionScore, ExtractionRecord, IssueSeverity, NarrativeSection, QualityDimension,
    QualityIssue, QualityReport,
};
use crate::timeline::Timeline;

const VAGUE_QUANTIFIERS: &[&str] = &["multiple", "several", "some", "a few", "numerous"];
const TRANSITION_WORDS: &[&str] = &[
    "subsequently",
    "following",
    "on hospital day",
    "thereafter",
    "after",
    "during",
];

fn issue(severity: IssueSeverity, dimension: &str, message: impl Into<String>) -> QualityIssue {
    QualityIssue::new(severity, dimension, message)
}

fn completeness(narrative: &NarrativeSection, record: &ExtractionRecord) -> DimensionScore {
    let mut issues = Vec::new();
    let missing_critical = narrative.missing_critical_keys();
    let missing_noncritical: Vec<&str> = narrative
        .missing_keys()
        .into_iter()
        .filter(|k| !NarrativeSection::CRITICAL_KEYS.contains(k))
        .collect();

    for key in &missing_critical {
        issues.push(issue(IssueSeverity::Critical, "completeness", format!("critical section '{key}' is empty")));
    }
    for key in &missing_noncritical {
        issues.push(issue(IssueSeverity::Minor, "completeness", format!("section '{key}' is empty")));
    }
    if record.demographics.name.is_none() {
        issues.push(issue(IssueSeverity::Major, "completeness", "patient name not extracted"));
    }
    if record.dates.admission.is_none() {
        issues.push(issue(IssueSeverity::Major, "completeness", "admission date not resolved"));
    }

    let critical_penalty = missing_critical.len() as f32 / NarrativeSection::CRITICAL_KEYS.len() as f32;
    let minor_penalty = missing_noncritical.len() as f32 / 7.0;
    let field_penalty =
        (record.demographics.name.is_none() as u8 + record.dates.admission.is_none() as u8) as f32 * 0.1;
    let score = (1.0 - 0.6 * critical_penalty - 0.25 * minor_penalty - field_penalty).max(0.0);

    DimensionScore {
        dimension: QualityDimension::Completeness,
        score,
        issues,
        details: format!("{} of {} sections present", 10 - narrative.missing_keys().len(), 10),
    }
}

/// Every `EntityReference` must resolve to an id that exists among the
/// record's own new_event entities — otherwise it is effectively a
/// fabricated timeline link (spec §3 ExtractionRecord invariant).
fn known_entity_ids(record: &ExtractionRecord) -> HashSet<uuid::Uuid> {
    let mut ids = HashSet::new();
    ids.extend(record.diagnoses.iter().map(|e| e.id));
    ids.extend(record.procedures.iter().map(|e| e.id));
    ids.extend(record.medications.iter().map(|e| e.id));
    ids.extend(record.complications.iter().map(|e| e.id));
    ids.extend(record.examination_findings.iter().map(|e| e.id));
    ids.extend(record.functional_scores.iter().map(|e| e.id));
    ids.extend(record.consultations.iter().map(|e| e.id));
    ids.extend(record.imaging_findings.iter().map(|e| e.id));
    ids.extend(record.discharge_disposition.iter().map(|e| e.id));
    ids.extend(record.follow_up.iter().map(|e| e.id));
    ids
}

/// Counts entities whose mention carries a POD number that never resolved
/// to a calendar date — the surgery anchor it would resolve against was
/// never found (spec seed case 4: `MISSING_POD_ANCHOR`).
fn unresolved_pod_count(record: &ExtractionRecord) -> usize {
    let unresolved = |t: &crate::model::TemporalContext| t.pod.is_some() && t.resolved_date.is_none();
    record.diagnoses.iter().filter(|e| unresolved(&e.temporal)).count()
        + record.procedures.iter().filter(|e| unresolved(&e.temporal)).count()
        + record.medications.iter().filter(|e| unresolved(&e.temporal)).count()
        + record.complications.iter().filter(|e| unresolved(&e.temporal)).count()
        + record.examination_findings.iter().filter(|e| unresolved(&e.temporal)).count()
        + record.functional_scores.iter().filter(|e| unresolved(&e.temporal)).count()
        + record.consultations.iter().filter(|e| unresolved(&e.temporal)).count()
        + record.imaging_findings.iter().filter(|e| unresolved(&e.temporal)).count()
        + record.discharge_disposition.iter().filter(|e| unresolved(&e.temporal)).count()
        + record.follow_up.iter().filter(|e| unresolved(&e.temporal)).count()
}

fn accuracy(record: &ExtractionRecord) -> DimensionScore {
    let mut issues = Vec::new();
    let known_ids = known_entity_ids(record);
    let dangling = record.references.iter().filter(|r| !known_ids.contains(&r.linked_event_id)).count();
    if dangling > 0 {
        issues.push(issue(
            IssueSeverity::Critical,
            "accuracy",
            format!("{dangling} reference(s) link to an entity absent from the extraction record"),
        ));
    }

    let unresolved_pods = unresolved_pod_count(record);
    if unresolved_pods > 0 {
        issues.push(issue(
            IssueSeverity::Warning,
            "accuracy",
            format!("MISSING_POD_ANCHOR: {unresolved_pods} postoperative-day reference(s) could not resolve to a calendar date (no surgery anchor found)"),
        ));
    }

    let confidences: Vec<f32> = record
        .diagnoses
        .iter()
        .map(|e| e.confidence)
        .chain(record.procedures.iter().map(|e| e.confidence))
        .chain(record.medications.iter().map(|e| e.confidence))
        .chain(record.complications.iter().map(|e| e.confidence))
        .collect();
    let avg_confidence = if confidences.is_empty() {
        1.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };
    if avg_confidence < 0.6 {
        issues.push(issue(
            IssueSeverity::Minor,
            "accuracy",
            format!("average extraction confidence {avg_confidence:.2} is low"),
        ));
    }

    let dangling_penalty = if record.references.is_empty() {
        0.0
    } else {
        dangling as f32 / record.references.len() as f32
    };
    let score = (avg_confidence * (1.0 - dangling_penalty)).clamp(0.0, 1.0);

    DimensionScore {
        dimension: QualityDimension::Accuracy,
        score,
        issues,
        details: format!("avg confidence {avg_confidence:.2}, {dangling} dangling reference(s)"),
    }
}

fn consistency(record: &ExtractionRecord, narrative: &NarrativeSection) -> DimensionScore {
    let mut issues = Vec::new();
    let mut violations = 0;

    if let (Some(admission), Some(discharge)) = (record.dates.admission, record.dates.discharge) {
        if discharge < admission {
            issues.push(issue(IssueSeverity::Critical, "consistency", "discharge date precedes admission date"));
            violations += 1;
        }
    }
    if let (Some(ictus), Some(admission)) = (record.dates.ictus, record.dates.admission) {
        if ictus > admission {
            issues.push(issue(IssueSeverity::Major, "consistency", "ictus date follows admission date"));
            violations += 1;
        }
    }
    if !record.procedures.is_empty() && record.diagnoses.is_empty() {
        issues.push(issue(IssueSeverity::Major, "consistency", "procedures recorded without a supporting diagnosis"));
        violations += 1;
    }

    let narrative_meds = narrative.discharge_medications.to_lowercase();
    let mut unreflected = 0;
    if !narrative_meds.trim().is_empty() {
        for med in &record.medications {
            if !narrative_meds.contains(&med.value.name.to_lowercase()) {
                unreflected += 1;
            }
        }
        if unreflected > 0 {
            issues.push(issue(
                IssueSeverity::Minor,
                "consistency",
                format!("{unreflected} medication(s) in the structured list are not reflected in the narrative"),
            ));
        }
    }

    let total_checks = 3 + record.medications.len().max(1);
    let failures = violations + unreflected;
    let score = (1.0 - failures as f32 / total_checks as f32).clamp(0.0, 1.0);

    DimensionScore {
        dimension: QualityDimension::Consistency,
        score,
        issues,
        details: format!("{violations} date/field violation(s), {unreflected} unreflected medication(s)"),
    }
}

fn narrative_quality(narrative: &NarrativeSection) -> DimensionScore {
    let mut issues = Vec::new();
    let mut penalty = 0.0f32;

    let course = narrative.hospital_course.to_lowercase();
    if !course.is_empty() && !TRANSITION_WORDS.iter().any(|w| course.contains(w)) {
        issues.push(issue(IssueSeverity::Minor, "narrative_quality", "hospital course lacks chronological transitions"));
        penalty += 0.2;
    }

    let sections = [
        &narrative.chief_complaint,
        &narrative.history_of_present_illness,
        &narrative.hospital_course,
        &narrative.procedures,
        &narrative.complications,
        &narrative.consultations,
        &narrative.discharge_status,
        &narrative.discharge_medications,
        &narrative.discharge_disposition,
        &narrative.follow_up_plan,
    ];
    for text in sections {
        if text.contains("  ") {
            issues.push(issue(IssueSeverity::Warning, "narrative_quality", "doubled whitespace suggests unstandardized terminology spacing"));
            penalty += 0.05;
            break;
        }
    }

    let sentence_lens: Vec<usize> = course
        .split('.')
        .map(|s| s.split_whitespace().count())
        .filter(|&n| n > 0)
        .collect();
    if sentence_lens.len() >= 3 {
        let mean = sentence_lens.iter().sum::<usize>() as f32 / sentence_lens.len() as f32;
        let variance = sentence_lens.iter().map(|&n| (n as f32 - mean).powi(2)).sum::<f32>() / sentence_lens.len() as f32;
        if variance < 1.0 {
            issues.push(issue(IssueSeverity::Warning, "narrative_quality", "sentence lengths show little variation"));
            penalty += 0.05;
        }
    }

    let mut seen_phrases: HashSet<String> = HashSet::new();
    let mut repeated = false;
    for text in sections {
        let words: Vec<&str> = text.split_whitespace().collect();
        for window in words.windows(4) {
            let phrase = window.join(" ").to_lowercase();
            if phrase.len() > 10 && !seen_phrases.insert(phrase) {
                repeated = true;
            }
        }
    }
    if repeated {
        issues.push(issue(IssueSeverity::Minor, "narrative_quality", "a four-word phrase repeats verbatim across sections"));
        penalty += 0.1;
    }

    let issue_count = issues.len();
    DimensionScore {
        dimension: QualityDimension::NarrativeQuality,
        score: (1.0 - penalty).max(0.0),
        issues,
        details: format!("{issue_count} issue(s) found"),
    }
}

fn specificity(narrative: &NarrativeSection, record: &ExtractionRecord) -> DimensionScore {
    let mut issues = Vec::new();
    let precise_complication_count = record.complications.len();
    let text = format!(
        "{} {} {}",
        narrative.hospital_course, narrative.complications, narrative.discharge_status
    )
    .to_lowercase();

    let mut vague_hits = 0;
    for word in VAGUE_QUANTIFIERS {
        if text.contains(word) {
            vague_hits += 1;
        }
    }
    if vague_hits > 0 && precise_complication_count > 0 {
        issues.push(issue(
            IssueSeverity::Minor,
            "specificity",
            format!("vague quantifier used where a precise count ({precise_complication_count}) is known"),
        ));
    }

    let penalty = if precise_complication_count > 0 { vague_hits as f32 * 0.2 } else { 0.0 };
    DimensionScore {
        dimension: QualityDimension::Specificity,
        score: (1.0 - penalty).max(0.0),
        issues,
        details: format!("{vague_hits} vague quantifier(s) found"),
    }
}

fn timeliness(processing_time: Duration, config: &PipelineConfig) -> DimensionScore {
    let mut issues = Vec::new();
    let target = config.stage_timeout;
    let score = if processing_time <= target {
        1.0
    } else {
        let overage = processing_time.as_secs_f32() / target.as_secs_f32().max(1.0);
        issues.push(issue(IssueSeverity::Warning, "timeliness", format!("processing took {overage:.1}x the per-stage target")));
        (1.0 / overage).clamp(0.0, 1.0)
    };

    DimensionScore {
        dimension: QualityDimension::Timeliness,
        score,
        issues,
        details: format!("{}ms against a {}ms target", processing_time.as_millis(), target.as_millis()),
    }
}

fn recommend(dimensions: &[DimensionScore]) -> Vec<String> {
    dimensions
        .iter()
        .filter(|d| d.score < 0.85)
        .map(|d| format!("improve {:?}: {}", d.dimension, d.details))
        .collect()
}

/// Scores one completed generation across all six dimensions and composes
/// the final `QualityReport`. `_timeline` is accepted for symmetry with
/// the other stage signatures and future dimension work even though no
/// current dimension inspects it directly (hospital-course ordering is
/// already baked into `narrative.hospital_course` by the time this runs).
pub fn score(
    record: &ExtractionRecord,
    narrative: &NarrativeSection,
    _timeline: &Timeline,
    processing_time: Duration,
    config: &PipelineConfig,
) -> QualityReport {
    let dimensions = vec![
        completeness(narrative, record),
        accuracy(record),
        consistency(record, narrative),
        narrative_quality(narrative),
        specificity(narrative, record),
        timeliness(processing_time, config),
    ];
    let recommendations = recommend(&dimensions);
    let report = QualityReport::compose(dimensions, recommendations);
    tracing::info!(overall = report.overall, rating = ?report.rating, "quality scored");
    report
}
