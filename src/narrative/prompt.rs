//! LLM-mode prompt for the Narrative Generator (spec §4.8): one prompt
//! requests every section in a single labeled reply, grounded strictly in
//! the structured entities and timeline already computed upstream.

use crate::model::{EntityFamily, ExtractionRecord, NarrativeSection};
use crate::timeline::Timeline;

pub const NARRATIVE_SYSTEM_PROMPT: &str = "\
You are a clinical documentation assistant drafting a hospital discharge \
summary. Write ONLY from the structured data and timeline provided below. \
NEVER introduce a diagnosis, medication, date, or finding that is not in \
that data. Use past tense for events that already happened and present \
tense for the patient's discharge state. Do not repeat the same phrase \
across sections.";

const SECTION_KEYS: &[&str] = &[
    "chief_complaint",
    "history_of_present_illness",
    "hospital_course",
    "procedures",
    "complications",
    "consultations",
    "discharge_status",
    "discharge_medications",
    "discharge_disposition",
    "follow_up_plan",
];

/// Section labels as they must appear in the reply, `SECTION:` style
/// (spec §4.9 style 1 — the Section Parser's primary format).
fn section_label(key: &str) -> &'static str {
    match key {
        "chief_complaint" => "CHIEF_COMPLAINT",
        "history_of_present_illness" => "HISTORY_OF_PRESENT_ILLNESS",
        "hospital_course" => "HOSPITAL_COURSE",
        "procedures" => "PROCEDURES",
        "complications" => "COMPLICATIONS",
        "consultations" => "CONSULTATIONS",
        "discharge_status" => "DISCHARGE_STATUS",
        "discharge_medications" => "DISCHARGE_MEDICATIONS",
        "discharge_disposition" => "DISCHARGE_DISPOSITION",
        "follow_up_plan" => "FOLLOW_UP_PLAN",
        _ => unreachable!("section key set is fixed"),
    }
}

fn describe_event(event: &crate::timeline::TimelineEvent) -> String {
    let when = event
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "date unknown".to_string());
    format!("- [{when}] {} ({:?}): {}", event.event_type_label(), event.relation, event.description)
}

/// Builds the single LLM-mode prompt. `timeline` drives chronological
/// ordering; `record` supplies the entity facts the model must not exceed.
pub fn build_narrative_prompt(record: &ExtractionRecord, timeline: &Timeline) -> String {
    let mut prompt = String::new();

    prompt.push_str("<TIMELINE>\n");
    for event in &timeline.events {
        prompt.push_str(&describe_event(event));
        prompt.push('\n');
    }
    prompt.push_str("</TIMELINE>\n\n");

    prompt.push_str("<STRUCTURED_DATA>\n");
    prompt.push_str(&structured_data_block(record));
    prompt.push_str("</STRUCTURED_DATA>\n\n");

    prompt.push_str("Produce exactly these sections, in this order, each starting with its label followed by a colon:\n");
    for key in SECTION_KEYS {
        prompt.push_str(&format!("{}:\n", section_label(key)));
    }
    prompt.push_str(
        "\nLeave a section's body empty only if the structured data truly has nothing for it. \
         Do not invent content to fill a section.",
    );

    prompt
}

/// Appends a refinement-focus block naming the dimension that scored low
/// and its issues, asked to be addressed without redoing sections that
/// were already fine (spec §4.11: "targeted re-generation on the
/// lowest-scoring dimension with its issues as prompt context").
pub fn build_refinement_prompt(record: &ExtractionRecord, timeline: &Timeline, dimension: &str, issues: &[String]) -> String {
    let mut prompt = build_narrative_prompt(record, timeline);
    prompt.push_str("\n\n<REFINEMENT_FOCUS>\n");
    prompt.push_str(&format!(
        "The previous draft scored low on {dimension}. Revise to address the following without regressing other sections:\n"
    ));
    for issue in issues {
        prompt.push_str(&format!("- {issue}\n"));
    }
    prompt.push_str("</REFINEMENT_FOCUS>");
    prompt
}

/// Focused completer prompt (spec §4.9): asks for exactly one section's
/// prose, with no label and no other sections, so the reply can be used
/// as the section's content verbatim.
pub fn build_section_prompt(record: &ExtractionRecord, timeline: &Timeline, key: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("<TIMELINE>\n");
    for event in &timeline.events {
        prompt.push_str(&describe_event(event));
        prompt.push('\n');
    }
    prompt.push_str("</TIMELINE>\n\n");

    prompt.push_str("<STRUCTURED_DATA>\n");
    prompt.push_str(&structured_data_block(record));
    prompt.push_str("</STRUCTURED_DATA>\n\n");

    prompt.push_str(&format!(
        "Write only the {} section of the discharge summary. Return the prose \
         content alone — no label, no other sections, no preamble. \
         Leave the reply empty if the structured data truly has nothing for it.",
        section_label(key)
    ));

    prompt
}

fn structured_data_block(record: &ExtractionRecord) -> String {
    let mut out = String::new();
    if let Some(name) = &record.demographics.name {
        out.push_str(&format!("patient: {name}\n"));
    }
    if !record.diagnoses.is_empty() {
        out.push_str("diagnoses:\n");
        for d in &record.diagnoses {
            out.push_str(&format!("  - {}\n", d.value.name));
        }
    }
    if !record.procedures.is_empty() {
        out.push_str("procedures:\n");
        for p in &record.procedures {
            out.push_str(&format!("  - {}\n", p.value.name));
        }
    }
    if !record.medications.is_empty() {
        out.push_str("discharge medications:\n");
        for m in &record.medications {
            out.push_str(&format!("  - {} {}\n", m.value.name, m.value.dose.as_deref().unwrap_or("")));
        }
    }
    if !record.complications.is_empty() {
        out.push_str("complications:\n");
        for c in &record.complications {
            out.push_str(&format!("  - {}\n", c.value.name));
        }
    }
    if !record.consultations.is_empty() {
        out.push_str("consultations:\n");
        for c in &record.consultations {
            out.push_str(&format!("  - {}\n", c.value.service));
        }
    }
    if let Some(disposition) = &record.discharge_disposition {
        out.push_str(&format!("disposition: {}\n", disposition.value.disposition));
    }
    if !record.follow_up.is_empty() {
        out.push_str("follow-up:\n");
        for f in &record.follow_up {
            out.push_str(&format!("  - {}\n", f.value.text));
        }
    }
    out
}

impl crate::timeline::TimelineEvent {
    fn event_type_label(&self) -> &'static str {
        match self.event_type {
            EntityFamily::Demographic => "demographic",
            EntityFamily::Date => "date",
            EntityFamily::Diagnosis => "diagnosis",
            EntityFamily::Procedure => "procedure",
            EntityFamily::Medication => "medication",
            EntityFamily::Complication => "complication",
            EntityFamily::ExaminationFinding => "exam finding",
            EntityFamily::FunctionalScore => "functional score",
            EntityFamily::Consultation => "consultation",
            EntityFamily::ImagingFinding => "imaging finding",
            EntityFamily::DischargeDisposition => "disposition",
            EntityFamily::FollowUp => "follow-up",
        }
    }
}
