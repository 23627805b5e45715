//! Template-mode fallback (spec §4.8): fills per-section templates
//! directly from the merged entities when the LLM is unavailable or the
//! orchestrator requests deterministic output. No prose generation beyond
//! simple joins — this mode trades fluency for determinism.

use crate::model::{ExtractionRecord, MedicationCategory};
use crate::timeline::{EventRelation, Timeline};

fn join_with_and(items: &[String]) -> String {
    match items.len() {
        0 => String::new(),
        1 => items[0].clone(),
        2 => format!("{} and {}", items[0], items[1]),
        _ => {
            let (last, rest) = items.split_last().unwrap();
            format!("{}, and {last}", rest.join(", "))
        }
    }
}

pub fn chief_complaint(record: &ExtractionRecord) -> String {
    let names: Vec<String> = record.diagnoses.iter().map(|d| d.value.name.clone()).collect();
    if names.is_empty() {
        return String::new();
    }
    format!("Patient presented with {}.", join_with_and(&names))
}

pub fn history_of_present_illness(record: &ExtractionRecord) -> String {
    let names: Vec<String> = record.diagnoses.iter().map(|d| d.value.name.clone()).collect();
    if names.is_empty() {
        return String::new();
    }
    let ictus = record
        .dates
        .ictus
        .map(|d| format!(" with onset on {}", d.format("%Y-%m-%d")))
        .unwrap_or_default();
    format!("History notable for {}{ictus}.", join_with_and(&names))
}

/// Hospital-course narration, in Timeline order, per spec §4.8: "proceeds
/// in chronological order; complications are introduced where they
/// occurred in time; procedures are described at their occurrence then
/// referenced thereafter."
pub fn hospital_course(timeline: &Timeline) -> String {
    let mut sentences = Vec::new();
    let mut first_mention: std::collections::HashSet<uuid::Uuid> = std::collections::HashSet::new();

    for event in &timeline.events {
        let day = match event.days_since_admission {
            Some(0) => "On admission".to_string(),
            Some(n) if n > 0 => format!("On hospital day {}", n + 1),
            _ => "Subsequently".to_string(),
        };
        let pod_note = event.pod.map(|p| format!(" (POD#{p})")).unwrap_or_default();
        let already_mentioned = !first_mention.insert(event.entity_id);
        let sentence = if already_mentioned {
            format!("{day}, {} continued to be followed{pod_note}.", event.description)
        } else {
            match event.relation {
                EventRelation::PreAdmission => format!("Prior to admission, {}.", event.description),
                _ => format!("{day}, {}{pod_note}.", event.description),
            }
        };
        sentences.push(sentence);
    }
    sentences.join(" ")
}

pub fn procedures(record: &ExtractionRecord) -> String {
    record
        .procedures
        .iter()
        .map(|p| match &p.value.detail {
            Some(detail) => format!("{} ({detail})", p.value.name),
            None => p.value.name.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn complications(record: &ExtractionRecord) -> String {
    record
        .complications
        .iter()
        .map(|c| match &c.value.severity {
            Some(sev) => format!("{sev} {}", c.value.name),
            None => c.value.name.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn consultations(record: &ExtractionRecord) -> String {
    record
        .consultations
        .iter()
        .map(|c| match &c.value.reason {
            Some(reason) => format!("{} ({reason})", c.value.service),
            None => c.value.service.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn discharge_status(record: &ExtractionRecord) -> String {
    let scores: Vec<String> = record
        .functional_scores
        .iter()
        .map(|f| format!("{:?} {}", f.value.scale, f.value.value))
        .collect();
    if scores.is_empty() {
        return "Patient is stable for discharge.".to_string();
    }
    format!("Patient is stable for discharge with {}.", join_with_and(&scores))
}

pub fn discharge_medications(record: &ExtractionRecord) -> String {
    let mut by_category: Vec<(MedicationCategory, Vec<String>)> = Vec::new();
    for m in &record.medications {
        let label = match (&m.value.dose, &m.value.frequency) {
            (Some(d), Some(f)) => format!("{} {d} {f}", m.value.name),
            (Some(d), None) => format!("{} {d}", m.value.name),
            _ => m.value.name.clone(),
        };
        match by_category.iter_mut().find(|(cat, _)| *cat == m.value.category) {
            Some((_, names)) => names.push(label),
            None => by_category.push((m.value.category, vec![label])),
        }
    }
    by_category
        .into_iter()
        .map(|(_, names)| names.join(", "))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn discharge_disposition(record: &ExtractionRecord) -> String {
    record
        .discharge_disposition
        .as_ref()
        .map(|d| format!("Discharged to {}.", d.value.disposition))
        .unwrap_or_default()
}

pub fn follow_up_plan(record: &ExtractionRecord) -> String {
    record
        .follow_up
        .iter()
        .map(|f| match &f.value.timeframe {
            Some(tf) => format!("{} ({tf})", f.value.text),
            None => f.value.text.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiagnosisDetail, Entity, MentionKind, SourceSpan, TemporalCategory, TemporalContext};

    fn diag(name: &str) -> Entity<DiagnosisDetail> {
        Entity::new(
            DiagnosisDetail { name: name.into(), icd_hint: None },
            SourceSpan::new(0, 0, 1),
            0.9,
            TemporalContext::new(TemporalCategory::Admission, MentionKind::NewEvent, 0.9),
        )
    }

    #[test]
    fn chief_complaint_lists_diagnoses_with_and() {
        let mut record = ExtractionRecord::default();
        record.diagnoses.push(diag("SAH"));
        record.diagnoses.push(diag("hydrocephalus"));
        let text = chief_complaint(&record);
        assert_eq!(text, "Patient presented with SAH and hydrocephalus.");
    }

    #[test]
    fn chief_complaint_empty_when_no_diagnoses() {
        let record = ExtractionRecord::default();
        assert_eq!(chief_complaint(&record), "");
    }

    #[test]
    fn discharge_medications_groups_by_category() {
        use crate::model::MedicationDetail;
        let mut record = ExtractionRecord::default();
        record.medications.push(Entity::new(
            MedicationDetail {
                name: "levetiracetam".into(),
                category: MedicationCategory::Aed,
                dose: Some("500mg".into()),
                frequency: Some("BID".into()),
            },
            SourceSpan::new(0, 0, 1),
            0.9,
            TemporalContext::new(TemporalCategory::Discharge, MentionKind::NewEvent, 0.9),
        ));
        let text = discharge_medications(&record);
        assert!(text.contains("levetiracetam 500mg BID"));
    }

    #[test]
    fn join_with_and_handles_all_lengths() {
        assert_eq!(join_with_and(&[]), "");
        assert_eq!(join_with_and(&["a".into()]), "a");
        assert_eq!(join_with_and(&["a".into(), "b".into()]), "a and b");
        assert_eq!(join_with_and(&["a".into(), "b".into(), "c".into()]), "a, b, and c");
    }
}
