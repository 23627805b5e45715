//! Entity Merger (spec §4.6): reconciles the Pattern Extractor's and LLM
//! Adapter's independent `ExtractionDraft`s into one `ExtractionRecord`.
//! Pure — no I/O, no stage timing, so it carries no error enum of its own.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::model::{
    content_id, ComplicationDetail, ConsultationDetail, DatesRecord, Demographics,
    DiagnosisDetail, DispositionDetail, Entity, EntityFamily, EntityReference, EntityValue,
    ExaminationFindingDetail, ExtractionDraft, ExtractionRecord, ExtractionSource, FollowUpDetail,
    FunctionalScoreDetail, ImagingFindingDetail, MedicationDetail, MentionKind, ProcedureDetail,
    RawEntity, ScalarCandidate, ScalarField, ScalarValue, SourceSpan, TemporalContext,
};

/// A scalar field where pattern and LLM disagreed on the value, kept for
/// audit even though only one value wins (spec §4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct MergeDisagreement {
    pub field: ScalarField,
    pub pattern_value: Option<String>,
    pub llm_value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub record: ExtractionRecord,
    pub disagreements: Vec<MergeDisagreement>,
}

fn scalar_display(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Text(s) => s.clone(),
        ScalarValue::Date(d) => d.to_string(),
        ScalarValue::Number(n) => n.to_string(),
    }
}

/// Picks the winning scalar candidate for one field: highest confidence,
/// ties broken toward the pattern extractor (deterministic per spec §4.6).
fn pick_scalar<'a>(candidates: &'a [&'a ScalarCandidate]) -> Option<&'a ScalarCandidate> {
    candidates.iter().copied().max_by(|a, b| {
        a.confidence
            .total_cmp(&b.confidence)
            .then_with(|| match (a.source, b.source) {
                (ExtractionSource::Pattern, ExtractionSource::Llm) => std::cmp::Ordering::Greater,
                (ExtractionSource::Llm, ExtractionSource::Pattern) => std::cmp::Ordering::Less,
                _ => std::cmp::Ordering::Equal,
            })
    })
}

fn merge_scalars(
    pattern: &[ScalarCandidate],
    llm: &[ScalarCandidate],
) -> (Demographics, DatesRecord, Vec<MergeDisagreement>) {
    let mut demographics = Demographics::default();
    let mut dates = DatesRecord::default();
    let mut disagreements = Vec::new();

    let fields = [
        ScalarField::Name,
        ScalarField::Mrn,
        ScalarField::Dob,
        ScalarField::Age,
        ScalarField::Gender,
        ScalarField::Attending,
        ScalarField::AdmissionDate,
        ScalarField::DischargeDate,
        ScalarField::IctusDate,
    ];

    for field in fields {
        let candidates: Vec<&ScalarCandidate> = pattern
            .iter()
            .chain(llm.iter())
            .filter(|c| c.field == field)
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let pattern_values: Vec<&ScalarCandidate> =
            candidates.iter().copied().filter(|c| c.source == ExtractionSource::Pattern).collect();
        let llm_values: Vec<&ScalarCandidate> =
            candidates.iter().copied().filter(|c| c.source == ExtractionSource::Llm).collect();
        if let (Some(p), Some(l)) = (pick_scalar(&pattern_values), pick_scalar(&llm_values)) {
            if scalar_display(&p.value) != scalar_display(&l.value) {
                disagreements.push(MergeDisagreement {
                    field,
                    pattern_value: Some(scalar_display(&p.value)),
                    llm_value: Some(scalar_display(&l.value)),
                });
            }
        }

        let winner = match pick_scalar(&candidates) {
            Some(w) => w,
            None => continue,
        };

        match (field, &winner.value) {
            (ScalarField::Name, ScalarValue::Text(v)) => demographics.name = Some(v.clone()),
            (ScalarField::Mrn, ScalarValue::Text(v)) => demographics.mrn = Some(v.clone()),
            (ScalarField::Dob, ScalarValue::Date(v)) => demographics.dob = Some(*v),
            (ScalarField::Age, ScalarValue::Number(v)) => demographics.age = Some(*v),
            (ScalarField::Gender, ScalarValue::Text(v)) => demographics.gender = Some(v.clone()),
            (ScalarField::Attending, ScalarValue::Text(v)) => demographics.attending = Some(v.clone()),
            (ScalarField::AdmissionDate, ScalarValue::Date(v)) => dates.admission = Some(*v),
            (ScalarField::DischargeDate, ScalarValue::Date(v)) => dates.discharge = Some(*v),
            (ScalarField::IctusDate, ScalarValue::Date(v)) => dates.ictus = Some(*v),
            _ => {}
        }
    }

    (demographics, dates, disagreements)
}

fn merge_surgery_dates(pattern: &[NaiveDate], llm: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut all: Vec<NaiveDate> = pattern.iter().chain(llm.iter()).copied().collect();
    all.sort();
    all.dedup();
    all
}

/// True when the group's raw mentions resolve to a new_event rather than a
/// reference: the highest-confidence new_event vote in the group must beat
/// the highest-confidence reference/continuation vote, per spec §4.6's
/// propagation rule ("remains a reference unless the other source has a
/// new_event mark with higher confidence").
fn group_is_new_event(items: &[&RawEntity]) -> bool {
    let new_event_conf = items
        .iter()
        .filter(|e| e.temporal.kind == MentionKind::NewEvent)
        .map(|e| e.confidence)
        .fold(None, |acc: Option<f32>, c| Some(acc.map_or(c, |a| a.max(c))));
    let reference_conf = items
        .iter()
        .filter(|e| e.temporal.kind != MentionKind::NewEvent)
        .map(|e| e.confidence)
        .fold(None, |acc: Option<f32>, c| Some(acc.map_or(c, |a| a.max(c))));
    match (new_event_conf, reference_conf) {
        (Some(n), Some(r)) => n > r,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => true,
    }
}

/// Picks the representative raw item for a new_event group's temporal
/// context/span: the highest-confidence item actually marked `new_event`,
/// falling back to the highest-confidence item overall if none is (the
/// `(None, None) => true` default case in `group_is_new_event`).
fn representative<'a>(items: &[&'a RawEntity]) -> &'a RawEntity {
    items
        .iter()
        .copied()
        .filter(|e| e.temporal.kind == MentionKind::NewEvent)
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .unwrap_or_else(|| {
            items
                .iter()
                .copied()
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                .expect("group is never empty")
        })
}

struct LinkCandidate {
    normalized_name: String,
    date: Option<NaiveDate>,
    id: Uuid,
}

/// Finds the nearest-preceding-date new_event for a reference mention. When
/// the reference carries no date, any same-named candidate is accepted
/// (there is nothing to compare against); when several tie on date, the
/// first one registered wins.
fn find_link<'a>(candidates: &'a [LinkCandidate], name: &str, date: Option<NaiveDate>) -> Option<&'a LinkCandidate> {
    let matching: Vec<&LinkCandidate> = candidates.iter().filter(|c| c.normalized_name == name).collect();
    match date {
        Some(d) => matching
            .iter()
            .copied()
            .filter(|c| c.date.map_or(true, |cd| cd <= d))
            .max_by_key(|c| c.date),
        None => matching.into_iter().next(),
    }
}

/// Generic family merge: groups raw entities by (normalized-name, resolved
/// date), resolves each group to a new_event or a set of standalone
/// reference mentions, and links references back to the nearest preceding
/// new_event (spec §4.6/§4.7).
fn merge_family<T: Clone>(
    family: EntityFamily,
    raws: Vec<&RawEntity>,
    extract: impl Fn(&EntityValue) -> Option<&T>,
    merge_details: impl Fn(&T, &T) -> T,
) -> (Vec<Entity<T>>, Vec<EntityReference>) {
    let mut groups: BTreeMap<(String, Option<NaiveDate>), Vec<&RawEntity>> = BTreeMap::new();
    for raw in &raws {
        let Some(_) = extract(&raw.value) else { continue };
        let key = (raw.normalized_name(), raw.temporal.resolved_date);
        groups.entry(key).or_default().push(raw);
    }

    let mut entities = Vec::new();
    let mut link_candidates = Vec::new();
    let mut pending_references = Vec::new();

    for ((name, date), items) in &groups {
        if group_is_new_event(items) {
            let rep = representative(items);
            let rep_detail = extract(&rep.value).expect("filtered above");
            let merged_detail = items
                .iter()
                .filter_map(|e| extract(&e.value))
                .fold(rep_detail.clone(), |acc, d| merge_details(&acc, d));
            let confidence = items.iter().map(|e| e.confidence).fold(0.0_f32, f32::max);
            let family_key = format!("{family:?}");
            let date_key = format!("{date:?}");
            let span_key = format!("{:?}", rep.source_span);
            let id = content_id(&[family_key.as_str(), name.as_str(), date_key.as_str(), span_key.as_str()]);
            entities.push(Entity {
                id,
                value: merged_detail,
                source_span: rep.source_span,
                confidence,
                temporal: rep.temporal.clone(),
            });
            link_candidates.push(LinkCandidate {
                normalized_name: name.clone(),
                date: *date,
                id,
            });
        } else {
            for item in items {
                pending_references.push(*item);
            }
        }
    }

    let mut references = Vec::new();
    for item in pending_references {
        let name = item.normalized_name();
        let date = item.temporal.resolved_date;
        if let Some(link) = find_link(&link_candidates, &name, date) {
            references.push(EntityReference {
                family,
                normalized_name: name,
                linked_event_id: link.id,
                source_span: item.source_span,
                temporal: item.temporal.clone(),
            });
        } else {
            // No preceding new_event to link to. Rather than drop the
            // mention (violating "every reference links to a new_event")
            // or silently pick an unrelated target, promote it to its own
            // new_event — documented in DESIGN.md as the merger's answer
            // to an orphan reference, an edge case the spec leaves open.
            tracing::warn!(family = ?family, name = %name, "orphan reference promoted to new_event");
            let detail = extract(&item.value).expect("filtered above").clone();
            let family_key = format!("{family:?}");
            let date_key = format!("{date:?}");
            let span_key = format!("{:?}", item.source_span);
            let id = content_id(&[family_key.as_str(), name.as_str(), date_key.as_str(), span_key.as_str()]);
            entities.push(Entity {
                id,
                value: detail,
                source_span: item.source_span,
                confidence: item.confidence,
                temporal: item.temporal.clone(),
            });
            link_candidates.push(LinkCandidate {
                normalized_name: name,
                date,
                id,
            });
        }
    }

    (entities, references)
}

fn merge_diagnosis(a: &DiagnosisDetail, b: &DiagnosisDetail) -> DiagnosisDetail {
    DiagnosisDetail {
        name: a.name.clone(),
        icd_hint: a.icd_hint.clone().or_else(|| b.icd_hint.clone()),
    }
}

fn merge_procedure(a: &ProcedureDetail, b: &ProcedureDetail) -> ProcedureDetail {
    ProcedureDetail {
        name: a.name.clone(),
        detail: a.detail.clone().or_else(|| b.detail.clone()),
    }
}

fn merge_medication(a: &MedicationDetail, b: &MedicationDetail) -> MedicationDetail {
    MedicationDetail {
        name: a.name.clone(),
        category: a.category,
        dose: a.dose.clone().or_else(|| b.dose.clone()),
        frequency: a.frequency.clone().or_else(|| b.frequency.clone()),
    }
}

fn merge_complication(a: &ComplicationDetail, b: &ComplicationDetail) -> ComplicationDetail {
    ComplicationDetail {
        name: a.name.clone(),
        severity: a.severity.clone().or_else(|| b.severity.clone()),
    }
}

fn merge_exam_finding(a: &ExaminationFindingDetail, _b: &ExaminationFindingDetail) -> ExaminationFindingDetail {
    a.clone()
}

fn merge_functional_score(a: &FunctionalScoreDetail, _b: &FunctionalScoreDetail) -> FunctionalScoreDetail {
    *a
}

fn merge_consultation(a: &ConsultationDetail, b: &ConsultationDetail) -> ConsultationDetail {
    ConsultationDetail {
        service: a.service.clone(),
        reason: a.reason.clone().or_else(|| b.reason.clone()),
    }
}

fn merge_imaging(a: &ImagingFindingDetail, _b: &ImagingFindingDetail) -> ImagingFindingDetail {
    a.clone()
}

fn merge_disposition(a: &DispositionDetail, _b: &DispositionDetail) -> DispositionDetail {
    a.clone()
}

fn merge_follow_up(a: &FollowUpDetail, b: &FollowUpDetail) -> FollowUpDetail {
    FollowUpDetail {
        text: a.text.clone(),
        timeframe: a.timeframe.clone().or_else(|| b.timeframe.clone()),
    }
}

/// Merges the Pattern Extractor's and LLM Adapter's drafts into the
/// canonical `ExtractionRecord`, returning the scalar-disagreement audit
/// alongside it.
pub fn merge(pattern: ExtractionDraft, llm: ExtractionDraft) -> MergeOutcome {
    let (demographics, dates_from_scalars, disagreements) = merge_scalars(&pattern.scalars, &llm.scalars);
    let surgery = merge_surgery_dates(&pattern.surgery_dates, &llm.surgery_dates);
    let dates = DatesRecord {
        surgery,
        ..dates_from_scalars
    };

    let all_raw: Vec<&RawEntity> = pattern.entities.iter().chain(llm.entities.iter()).collect();
    let mut references = Vec::new();

    macro_rules! family {
        ($variant:ident, $family:expr, $merge_fn:expr) => {{
            let raws: Vec<&RawEntity> = all_raw
                .iter()
                .copied()
                .filter(|e| matches!(e.value, EntityValue::$variant(_)))
                .collect();
            let (entities, refs) = merge_family(
                $family,
                raws,
                |v: &EntityValue| match v {
                    EntityValue::$variant(d) => Some(d),
                    _ => None,
                },
                $merge_fn,
            );
            references.extend(refs);
            entities
        }};
    }

    let diagnoses = family!(Diagnosis, EntityFamily::Diagnosis, merge_diagnosis);
    let procedures = family!(Procedure, EntityFamily::Procedure, merge_procedure);
    let medications = family!(Medication, EntityFamily::Medication, merge_medication);
    let complications = family!(Complication, EntityFamily::Complication, merge_complication);
    let examination_findings = family!(ExaminationFinding, EntityFamily::ExaminationFinding, merge_exam_finding);
    let functional_scores = family!(FunctionalScore, EntityFamily::FunctionalScore, merge_functional_score);
    let consultations = family!(Consultation, EntityFamily::Consultation, merge_consultation);
    let imaging_findings = family!(ImagingFinding, EntityFamily::ImagingFinding, merge_imaging);
    let dispositions = family!(DischargeDisposition, EntityFamily::DischargeDisposition, merge_disposition);
    let follow_up = family!(FollowUp, EntityFamily::FollowUp, merge_follow_up);

    let discharge_disposition = dispositions
        .into_iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

    tracing::info!(
        diagnoses = diagnoses.len(),
        procedures = procedures.len(),
        medications = medications.len(),
        complications = complications.len(),
        references = references.len(),
        disagreements = disagreements.len(),
        "entity merge complete"
    );

    MergeOutcome {
        record: ExtractionRecord {
            demographics,
            dates,
            diagnoses,
            procedures,
            medications,
            complications,
            examination_findings,
            functional_scores,
            consultations,
            imaging_findings,
            discharge_disposition,
            follow_up,
            references,
        },
        disagreements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryVote, TemporalCategory};

    fn temporal(kind: MentionKind, confidence: f32, date: Option<NaiveDate>) -> TemporalContext {
        TemporalContext {
            category: TemporalCategory::Postop,
            votes: vec![CategoryVote {
                category: TemporalCategory::Postop,
                confidence,
            }],
            kind,
            pod: None,
            resolved_date: date,
            confidence,
        }
    }

    fn span() -> SourceSpan {
        SourceSpan::new(0, 0, 10)
    }

    #[test]
    fn scalar_tie_prefers_pattern() {
        let pattern = vec![ScalarCandidate {
            field: ScalarField::Mrn,
            value: ScalarValue::Text("A123".into()),
            confidence: 0.9,
            source: ExtractionSource::Pattern,
            source_span: span(),
        }];
        let llm = vec![ScalarCandidate {
            field: ScalarField::Mrn,
            value: ScalarValue::Text("A999".into()),
            confidence: 0.9,
            source: ExtractionSource::Llm,
            source_span: span(),
        }];
        let (demo, _, disagreements) = merge_scalars(&pattern, &llm);
        assert_eq!(demo.mrn.as_deref(), Some("A123"));
        assert_eq!(disagreements.len(), 1);
    }

    #[test]
    fn collection_union_merges_fields_across_sources() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 16);
        let pattern_draft = ExtractionDraft {
            entities: vec![RawEntity {
                value: EntityValue::Complication(ComplicationDetail {
                    name: "vasospasm".into(),
                    severity: None,
                }),
                source: ExtractionSource::Pattern,
                source_span: span(),
                confidence: 0.8,
                temporal: temporal(MentionKind::NewEvent, 0.8, date),
            }],
            ..Default::default()
        };
        let llm_draft = ExtractionDraft {
            entities: vec![RawEntity {
                value: EntityValue::Complication(ComplicationDetail {
                    name: "vasospasm".into(),
                    severity: Some("moderate".into()),
                }),
                source: ExtractionSource::Llm,
                source_span: span(),
                confidence: 0.7,
                temporal: temporal(MentionKind::NewEvent, 0.7, date),
            }],
            ..Default::default()
        };
        let outcome = merge(pattern_draft, llm_draft);
        assert_eq!(outcome.record.complications.len(), 1);
        assert_eq!(outcome.record.complications[0].value.severity.as_deref(), Some("moderate"));
    }

    #[test]
    fn reference_links_to_nearest_preceding_new_event() {
        let early = NaiveDate::from_ymd_opt(2025, 10, 16);
        let late = NaiveDate::from_ymd_opt(2025, 10, 18);
        let draft = ExtractionDraft {
            entities: vec![
                RawEntity {
                    value: EntityValue::Procedure(ProcedureDetail {
                        name: "coiling".into(),
                        detail: None,
                    }),
                    source: ExtractionSource::Pattern,
                    source_span: span(),
                    confidence: 0.9,
                    temporal: temporal(MentionKind::NewEvent, 0.9, early),
                },
                RawEntity {
                    value: EntityValue::Procedure(ProcedureDetail {
                        name: "coiling".into(),
                        detail: None,
                    }),
                    source: ExtractionSource::Pattern,
                    source_span: span(),
                    confidence: 0.6,
                    temporal: temporal(MentionKind::Reference, 0.6, late),
                },
            ],
            ..Default::default()
        };
        let outcome = merge(draft, ExtractionDraft::default());
        assert_eq!(outcome.record.procedures.len(), 1);
        assert_eq!(outcome.record.references.len(), 1);
        assert_eq!(outcome.record.references[0].linked_event_id, outcome.record.procedures[0].id);
    }

    #[test]
    fn orphan_reference_is_promoted_to_new_event() {
        let draft = ExtractionDraft {
            entities: vec![RawEntity {
                value: EntityValue::Diagnosis(DiagnosisDetail {
                    name: "SAH".into(),
                    icd_hint: None,
                }),
                source: ExtractionSource::Pattern,
                source_span: span(),
                confidence: 0.6,
                temporal: temporal(MentionKind::Reference, 0.6, None),
            }],
            ..Default::default()
        };
        let outcome = merge(draft, ExtractionDraft::default());
        assert_eq!(outcome.record.diagnoses.len(), 1);
        assert!(outcome.record.references.is_empty());
    }

    #[test]
    fn new_event_with_higher_confidence_overrides_reference() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 16);
        let pattern_draft = ExtractionDraft {
            entities: vec![RawEntity {
                value: EntityValue::Diagnosis(DiagnosisDetail {
                    name: "hydrocephalus".into(),
                    icd_hint: None,
                }),
                source: ExtractionSource::Pattern,
                source_span: span(),
                confidence: 0.5,
                temporal: temporal(MentionKind::Reference, 0.5, date),
            }],
            ..Default::default()
        };
        let llm_draft = ExtractionDraft {
            entities: vec![RawEntity {
                value: EntityValue::Diagnosis(DiagnosisDetail {
                    name: "hydrocephalus".into(),
                    icd_hint: None,
                }),
                source: ExtractionSource::Llm,
                source_span: span(),
                confidence: 0.9,
                temporal: temporal(MentionKind::NewEvent, 0.9, date),
            }],
            ..Default::default()
        };
        let outcome = merge(pattern_draft, llm_draft);
        assert_eq!(outcome.record.diagnoses.len(), 1);
        assert!(outcome.record.references.is_empty());
    }
}
