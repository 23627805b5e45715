//! Timeline Builder (spec §4.7): orders every merged new_event entity
//! chronologically, infers missing admission/discharge anchors, and
//! annotates each event with its position relative to admission and
//! surgery. Pure — no I/O, no error enum; malformed input from the merger
//! would be a programmer error, not a runtime condition to report.

mod types;

pub use types::{EventRelation, Timeline, TimelineEvent};

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::model::{
    AnchorDates, ComplicationDetail, ConsultationDetail, DiagnosisDetail, DispositionDetail,
    Entity, EntityFamily, EntityReference, ExaminationFindingDetail, ExtractionRecord,
    FollowUpDetail, FunctionalScoreDetail, ImagingFindingDetail, MedicationDetail,
    ProcedureDetail,
};

fn describe_diagnosis(d: &DiagnosisDetail) -> String {
    d.name.clone()
}
fn describe_procedure(p: &ProcedureDetail) -> String {
    match &p.detail {
        Some(detail) => format!("{} ({detail})", p.name),
        None => p.name.clone(),
    }
}
fn describe_medication(m: &MedicationDetail) -> String {
    match (&m.dose, &m.frequency) {
        (Some(dose), Some(freq)) => format!("{} {dose} {freq}", m.name),
        (Some(dose), None) => format!("{} {dose}", m.name),
        _ => m.name.clone(),
    }
}
fn describe_complication(c: &ComplicationDetail) -> String {
    match &c.severity {
        Some(sev) => format!("{sev} {}", c.name),
        None => c.name.clone(),
    }
}
fn describe_exam(e: &ExaminationFindingDetail) -> String {
    e.text.clone()
}
fn describe_score(f: &FunctionalScoreDetail) -> String {
    format!("{:?} {}", f.scale, f.value)
}
fn describe_consultation(c: &ConsultationDetail) -> String {
    match &c.reason {
        Some(reason) => format!("{} consult for {reason}", c.service),
        None => format!("{} consult", c.service),
    }
}
fn describe_imaging(i: &ImagingFindingDetail) -> String {
    format!("{}: {}", i.modality, i.finding)
}
fn describe_disposition(d: &DispositionDetail) -> String {
    format!("discharged to {}", d.disposition)
}
fn describe_follow_up(f: &FollowUpDetail) -> String {
    match &f.timeframe {
        Some(tf) => format!("{} ({tf})", f.text),
        None => f.text.clone(),
    }
}

struct RawEvent {
    entity_id: Uuid,
    family: EntityFamily,
    date: Option<NaiveDate>,
    description: String,
    pod: Option<i64>,
}

fn collect_events(record: &ExtractionRecord) -> Vec<RawEvent> {
    fn push<T>(out: &mut Vec<RawEvent>, family: EntityFamily, items: &[Entity<T>], describe: impl Fn(&T) -> String) {
        for e in items {
            out.push(RawEvent {
                entity_id: e.id,
                family,
                date: e.temporal.resolved_date,
                description: describe(&e.value),
                pod: e.temporal.pod,
            });
        }
    }

    let mut events = Vec::new();
    push(&mut events, EntityFamily::Diagnosis, &record.diagnoses, describe_diagnosis);
    push(&mut events, EntityFamily::Procedure, &record.procedures, describe_procedure);
    push(&mut events, EntityFamily::Medication, &record.medications, describe_medication);
    push(&mut events, EntityFamily::Complication, &record.complications, describe_complication);
    push(&mut events, EntityFamily::ExaminationFinding, &record.examination_findings, describe_exam);
    push(&mut events, EntityFamily::FunctionalScore, &record.functional_scores, describe_score);
    push(&mut events, EntityFamily::Consultation, &record.consultations, describe_consultation);
    push(&mut events, EntityFamily::ImagingFinding, &record.imaging_findings, describe_imaging);
    push(
        &mut events,
        EntityFamily::DischargeDisposition,
        option_as_slice(&record.discharge_disposition),
        describe_disposition,
    );
    push(&mut events, EntityFamily::FollowUp, &record.follow_up, describe_follow_up);
    events
}

/// Lets `collect_events` treat the single-valued `discharge_disposition`
/// the same as every other (vec-valued) entity collection.
fn option_as_slice<T>(value: &Option<T>) -> &[T] {
    value.as_ref().map(std::slice::from_ref).unwrap_or(&[])
}

fn relation_for(date: Option<NaiveDate>, admission: Option<NaiveDate>, surgeries: &[NaiveDate]) -> EventRelation {
    let (Some(date), Some(admission)) = (date, admission) else {
        return EventRelation::Unknown;
    };
    if date < admission {
        return EventRelation::PreAdmission;
    }
    if surgeries.contains(&date) {
        return EventRelation::IntraOp;
    }
    let has_preceding_surgery = surgeries.iter().any(|s| *s <= date);
    if has_preceding_surgery {
        EventRelation::PostOp
    } else if surgeries.is_empty() {
        EventRelation::Unknown
    } else {
        EventRelation::PreOp
    }
}

/// Builds the chronological timeline from a merged `ExtractionRecord`.
/// `anchors` supplies the admission/surgery/discharge dates recovered by
/// the normalizer; `record.dates` (possibly LLM/pattern-corrected) takes
/// precedence when both disagree, per the merger's scalar tie-break.
pub fn build(record: &ExtractionRecord, anchors: &AnchorDates) -> Timeline {
    let raw_events = collect_events(record);

    let admission_date = record.dates.admission.or(anchors.admission);
    let discharge_date = record.dates.discharge.or(anchors.discharge);

    let earliest = raw_events.iter().filter_map(|e| e.date).min();
    let latest = raw_events.iter().filter_map(|e| e.date).max();
    let admission_date = admission_date.or(earliest);
    let discharge_date = discharge_date.or(latest);

    if raw_events.iter().any(|e| e.pod.is_some()) && anchors.surgery.is_empty() {
        tracing::warn!("timeline has POD-qualified events but no surgery anchor was recovered");
    }

    // `relationships` on an event names the `EntityReference`s that resolved
    // back to it; references carry no id of their own, so one is derived
    // from position (see `reference_uuid`).
    let mut relationships: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (i, reference) in record.references.iter().enumerate() {
        relationships
            .entry(reference.linked_event_id)
            .or_default()
            .push(reference_uuid(reference, i));
    }

    let mut events: Vec<TimelineEvent> = raw_events
        .into_iter()
        .map(|e| TimelineEvent {
            entity_id: e.entity_id,
            event_type: e.family,
            date: e.date,
            description: e.description,
            relationships: relationships.remove(&e.entity_id).unwrap_or_default(),
            pod: e.pod,
            days_since_admission: match (e.date, admission_date) {
                (Some(d), Some(a)) => Some((d - a).num_days()),
                _ => None,
            },
            relation: relation_for(e.date, admission_date, &anchors.surgery),
        })
        .collect();

    events.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    tracing::info!(event_count = events.len(), "timeline built");

    Timeline {
        events,
        admission_date,
        discharge_date,
    }
}

/// `EntityReference` has no id of its own (spec models it as a lookup
/// handle, not an owned entity) — derive a stable one from its position so
/// the timeline can still report which references attach to an event.
fn reference_uuid(_reference: &EntityReference, index: usize) -> Uuid {
    Uuid::from_u128(index as u128)
}
