//! Narrative Generator (spec §4.8). LLM mode asks one prompt for every
//! section and hands the raw labeled reply to the Section Parser; template
//! mode fills `NarrativeSection` directly and needs no parsing step.

mod prompt;
mod templates;

pub use prompt::{build_narrative_prompt, build_refinement_prompt, build_section_prompt, NARRATIVE_SYSTEM_PROMPT};

use crate::error::CoreError;
use crate::extraction::llm::{LlmCallOptions, LlmClient, ResponseFormat};
use crate::model::{ExtractionRecord, NarrativeSection};
use crate::timeline::Timeline;

/// Calls the LLM once with the full-document prompt and returns its raw
/// labeled reply. The caller (orchestrator) runs this through
/// `section_parser::parse` — this function does not parse its own output,
/// so a malformed reply surfaces downstream rather than being swallowed
/// here.
pub fn generate_with_llm(
    client: &dyn LlmClient,
    record: &ExtractionRecord,
    timeline: &Timeline,
) -> Result<String, CoreError> {
    let user_prompt = build_narrative_prompt(record, timeline);
    let options = LlmCallOptions {
        max_tokens: 4096,
        temperature: 0.3,
        response_format: ResponseFormat::Text,
    };
    client
        .generate(&user_prompt, NARRATIVE_SYSTEM_PROMPT, &options)
        .map_err(|e| match e {
            CoreError::LlmProvider { stage: _, provider, message, fallback_attempted } => {
                CoreError::LlmProvider { stage: "narrative_generator", provider, message, fallback_attempted }
            }
            other => other,
        })
}

/// Targeted re-generation for the refinement loop (spec §4.11): same
/// prompt as `generate_with_llm` plus a block naming the dimension that
/// scored low and its issues, so the model revises rather than starting
/// over blind.
pub fn generate_refinement(
    client: &dyn LlmClient,
    record: &ExtractionRecord,
    timeline: &Timeline,
    dimension: &str,
    issues: &[String],
) -> Result<String, CoreError> {
    let user_prompt = build_refinement_prompt(record, timeline, dimension, issues);
    let options = LlmCallOptions {
        max_tokens: 4096,
        temperature: 0.3,
        response_format: ResponseFormat::Text,
    };
    client
        .generate(&user_prompt, NARRATIVE_SYSTEM_PROMPT, &options)
        .map_err(|e| match e {
            CoreError::LlmProvider { stage: _, provider, message, fallback_attempted } => {
                CoreError::LlmProvider { stage: "narrative_generator", provider, message, fallback_attempted }
            }
            other => other,
        })
}

/// Section completer (spec §4.9): a narrow LLM call naming only the one
/// missing section, used by the orchestrator after parsing still leaves a
/// key empty. The reply is the section's prose directly, not a labeled
/// document, so no further parsing step is needed.
pub fn generate_section_with_llm(
    client: &dyn LlmClient,
    record: &ExtractionRecord,
    timeline: &Timeline,
    key: &str,
) -> Result<String, CoreError> {
    let user_prompt = build_section_prompt(record, timeline, key);
    let options = LlmCallOptions {
        max_tokens: 1024,
        temperature: 0.3,
        response_format: ResponseFormat::Text,
    };
    client
        .generate(&user_prompt, NARRATIVE_SYSTEM_PROMPT, &options)
        .map_err(|e| match e {
            CoreError::LlmProvider { stage: _, provider, message, fallback_attempted } => {
                CoreError::LlmProvider { stage: "section_completer", provider, message, fallback_attempted }
            }
            other => other,
        })
}

/// Template-mode completer: the single-section counterpart of
/// `generate_with_templates`, used when the LLM completer has no provider
/// to call or every provider failed. Returns `None` for a key outside the
/// fixed section set.
pub fn template_section(record: &ExtractionRecord, timeline: &Timeline, key: &str) -> Option<String> {
    let value = match key {
        "chief_complaint" => templates::chief_complaint(record),
        "history_of_present_illness" => templates::history_of_present_illness(record),
        "hospital_course" => templates::hospital_course(timeline),
        "procedures" => templates::procedures(record),
        "complications" => templates::complications(record),
        "consultations" => templates::consultations(record),
        "discharge_status" => templates::discharge_status(record),
        "discharge_medications" => templates::discharge_medications(record),
        "discharge_disposition" => templates::discharge_disposition(record),
        "follow_up_plan" => templates::follow_up_plan(record),
        _ => return None,
    };
    Some(value)
}

/// Deterministic fallback: fills every section directly from the merged
/// entities and the Timeline, with no LLM call (spec §4.8 template mode).
pub fn generate_with_templates(record: &ExtractionRecord, timeline: &Timeline) -> NarrativeSection {
    NarrativeSection {
        chief_complaint: templates::chief_complaint(record),
        history_of_present_illness: templates::history_of_present_illness(record),
        hospital_course: templates::hospital_course(timeline),
        procedures: templates::procedures(record),
        complications: templates::complications(record),
        consultations: templates::consultations(record),
        discharge_status: templates::discharge_status(record),
        discharge_medications: templates::discharge_medications(record),
        discharge_disposition: templates::discharge_disposition(record),
        follow_up_plan: templates::follow_up_plan(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::llm::MockLlmClient;
    use crate::model::{DiagnosisDetail, Entity, MentionKind, SourceSpan, TemporalCategory, TemporalContext};

    fn record_with_one_diagnosis() -> ExtractionRecord {
        let mut record = ExtractionRecord::default();
        record.diagnoses.push(Entity::new(
            DiagnosisDetail { name: "SAH".into(), icd_hint: None },
            SourceSpan::new(0, 0, 1),
            0.9,
            TemporalContext::new(TemporalCategory::Admission, MentionKind::NewEvent, 0.9),
        ));
        record
    }

    #[test]
    fn llm_mode_returns_raw_reply_unparsed() {
        let client = MockLlmClient::ok("CHIEF_COMPLAINT:\nSAH.\n");
        let record = record_with_one_diagnosis();
        let timeline = Timeline::default();
        let reply = generate_with_llm(&client, &record, &timeline).unwrap();
        assert!(reply.contains("CHIEF_COMPLAINT"));
    }

    #[test]
    fn llm_mode_propagates_provider_failure_tagged_with_this_stage() {
        let client = MockLlmClient::failing("timeout");
        let record = record_with_one_diagnosis();
        let timeline = Timeline::default();
        let err = generate_with_llm(&client, &record, &timeline).unwrap_err();
        assert_eq!(err.stage(), "narrative_generator");
    }

    #[test]
    fn refinement_mode_tags_errors_with_narrative_stage() {
        let client = MockLlmClient::failing("timeout");
        let record = record_with_one_diagnosis();
        let timeline = Timeline::default();
        let err = generate_refinement(&client, &record, &timeline, "completeness", &["missing chief complaint".into()]).unwrap_err();
        assert_eq!(err.stage(), "narrative_generator");
    }

    #[test]
    fn template_mode_fills_chief_complaint_without_llm() {
        let record = record_with_one_diagnosis();
        let timeline = Timeline::default();
        let section = generate_with_templates(&record, &timeline);
        assert!(section.chief_complaint.contains("SAH"));
    }

    #[test]
    fn section_completer_llm_call_propagates_failure_tagged_with_this_stage() {
        let client = MockLlmClient::failing("timeout");
        let record = record_with_one_diagnosis();
        let timeline = Timeline::default();
        let err = generate_section_with_llm(&client, &record, &timeline, "chief_complaint").unwrap_err();
        assert_eq!(err.stage(), "section_completer");
    }

    #[test]
    fn section_completer_llm_call_returns_raw_reply_unparsed() {
        let client = MockLlmClient::ok("SAH with headache.");
        let record = record_with_one_diagnosis();
        let timeline = Timeline::default();
        let reply = generate_section_with_llm(&client, &record, &timeline, "chief_complaint").unwrap();
        assert_eq!(reply, "SAH with headache.");
    }

    #[test]
    fn template_section_matches_full_template_mode_per_key() {
        let record = record_with_one_diagnosis();
        let timeline = Timeline::default();
        let full = generate_with_templates(&record, &timeline);
        assert_eq!(template_section(&record, &timeline, "chief_complaint").as_deref(), Some(full.chief_complaint.as_str()));
        assert_eq!(template_section(&record, &timeline, "discharge_disposition").as_deref(), Some(full.discharge_disposition.as_str()));
    }

    #[test]
    fn template_section_unknown_key_returns_none() {
        let record = record_with_one_diagnosis();
        let timeline = Timeline::default();
        assert_eq!(template_section(&record, &timeline, "not_a_real_key"), None);
    }
}
