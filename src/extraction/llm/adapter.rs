use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::model::{
    AnchorDates, ComplicationDetail, ConsultationDetail, DiagnosisDetail, DispositionDetail,
    EntityValue, ExaminationFindingDetail, ExtractionDraft, ExtractionSource, FollowUpDetail,
    FunctionalScoreDetail, ImagingFindingDetail, MedicationCategory, MedicationDetail,
    NormalizedNote, ProcedureDetail, RawEntity, ScalarCandidate, ScalarField, ScalarValue,
    ScoreScale, SourceSpan,
};
use crate::temporal;

use super::client::{LlmCallOptions, LlmClient, ResponseFormat};
use super::prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};

const STAGE: &str = "llm_adapter";

/// One provider attempt in the fallback ladder (spec §4.5: primary model,
/// then a secondary model, then a tertiary model, before the orchestrator
/// gives up on the LLM path entirely and falls back to pattern-only).
pub struct ProviderAttempt<'a> {
    pub name: &'a str,
    pub client: &'a dyn LlmClient,
}

/// Joins normalized notes into one document while remembering each note's
/// byte range, so a quote the LLM returns can be re-anchored to the
/// originating note's `SourceSpan` (mirrors how the pattern extractor keeps
/// per-note indices, but the LLM reasons over the whole document at once).
struct JoinedDocument {
    text: String,
    ranges: Vec<(usize, usize, usize)>, // (note_index, start, end) in `text`
}

fn join_notes(notes: &[NormalizedNote]) -> JoinedDocument {
    let mut text = String::new();
    let mut ranges = Vec::with_capacity(notes.len());
    for note in notes {
        let start = text.len();
        text.push_str(&note.text);
        let end = text.len();
        ranges.push((note.index, start, end));
        text.push('\n');
    }
    JoinedDocument { text, ranges }
}

/// Locates `quote` in the joined document and returns a `SourceSpan`
/// relative to the note it falls within. Falls back to note 0, offset 0
/// when the quote cannot be found verbatim — the LLM is not always exact
/// about whitespace, and a missing span must never panic the adapter.
fn resolve_span(doc: &JoinedDocument, quote: &str) -> SourceSpan {
    if !quote.is_empty() {
        if let Some(pos) = doc.text.find(quote) {
            let end = pos + quote.len();
            for (note_index, start, note_end) in &doc.ranges {
                if pos >= *start && end <= *note_end {
                    return SourceSpan::new(*note_index, pos - start, end - start);
                }
            }
        }
    }
    SourceSpan::new(doc.ranges.first().map(|r| r.0).unwrap_or(0), 0, 0)
}

#[derive(Debug, Default, Deserialize)]
struct LlmDemographics {
    name: Option<String>,
    mrn: Option<String>,
    dob: Option<NaiveDate>,
    age: Option<u8>,
    gender: Option<String>,
    attending: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmDates {
    admission: Option<NaiveDate>,
    #[serde(default)]
    surgery: Vec<NaiveDate>,
    discharge: Option<NaiveDate>,
    ictus: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct LlmDiagnosis {
    name: String,
    icd_hint: Option<String>,
    #[serde(default)]
    quote: String,
}

#[derive(Debug, Deserialize)]
struct LlmProcedure {
    name: String,
    detail: Option<String>,
    #[serde(default)]
    quote: String,
}

#[derive(Debug, Deserialize)]
struct LlmMedication {
    name: String,
    #[serde(default = "default_med_category")]
    category: MedicationCategory,
    dose: Option<String>,
    frequency: Option<String>,
    #[serde(default)]
    quote: String,
}

fn default_med_category() -> MedicationCategory {
    MedicationCategory::Other
}

#[derive(Debug, Deserialize)]
struct LlmComplication {
    name: String,
    severity: Option<String>,
    #[serde(default)]
    quote: String,
}

#[derive(Debug, Deserialize)]
struct LlmExamFinding {
    text: String,
    #[serde(default)]
    quote: String,
}

#[derive(Debug, Deserialize)]
struct LlmFunctionalScore {
    scale: ScoreScale,
    value: f32,
    #[serde(default)]
    quote: String,
}

#[derive(Debug, Deserialize)]
struct LlmConsultation {
    service: String,
    reason: Option<String>,
    #[serde(default)]
    quote: String,
}

#[derive(Debug, Deserialize)]
struct LlmImagingFinding {
    modality: String,
    finding: String,
    #[serde(default)]
    quote: String,
}

#[derive(Debug, Deserialize)]
struct LlmDisposition {
    disposition: String,
    #[serde(default)]
    quote: String,
}

#[derive(Debug, Deserialize)]
struct LlmFollowUp {
    text: String,
    timeframe: Option<String>,
    #[serde(default)]
    quote: String,
}

#[derive(Debug, Default, Deserialize)]
struct LlmExtraction {
    #[serde(default)]
    demographics: LlmDemographics,
    #[serde(default)]
    dates: LlmDates,
    #[serde(default)]
    diagnoses: Vec<LlmDiagnosis>,
    #[serde(default)]
    procedures: Vec<LlmProcedure>,
    #[serde(default)]
    medications: Vec<LlmMedication>,
    #[serde(default)]
    complications: Vec<LlmComplication>,
    #[serde(default)]
    examination_findings: Vec<LlmExamFinding>,
    #[serde(default)]
    functional_scores: Vec<LlmFunctionalScore>,
    #[serde(default)]
    consultations: Vec<LlmConsultation>,
    #[serde(default)]
    imaging_findings: Vec<LlmImagingFinding>,
    discharge_disposition: Option<LlmDisposition>,
    #[serde(default)]
    follow_up: Vec<LlmFollowUp>,
    #[serde(default)]
    _suggestions: Vec<String>,
    #[serde(default, rename = "_validationWarnings")]
    _validation_warnings: Vec<String>,
}

/// Parses one provider reply into a draft. Enforces the spec's central
/// invariant for this stage: the top-level value must be a JSON object,
/// never a bare string or array — a provider that wraps its answer in a
/// string (`"{\"diagnoses\": ...}"`) is schema-invalid, not "slightly
/// malformed", and is rejected rather than double-parsed.
fn parse_reply(raw: &str, provider: &str) -> Result<LlmExtraction, crate::error::CoreError> {
    let trimmed = strip_code_fence(raw);
    let value: Value = serde_json::from_str(trimmed).map_err(|e| crate::error::CoreError::LlmSchema {
        stage: STAGE,
        provider: Some(provider.to_string()),
        message: format!("reply was not valid JSON: {e}"),
    })?;

    if !value.is_object() {
        return Err(crate::error::CoreError::LlmSchema {
            stage: STAGE,
            provider: Some(provider.to_string()),
            message: format!("reply parsed to a {}, not an object", value_kind(&value)),
        });
    }

    serde_json::from_value(value).map_err(|e| crate::error::CoreError::LlmSchema {
        stage: STAGE,
        provider: Some(provider.to_string()),
        message: format!("reply did not match the extraction schema: {e}"),
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

fn into_draft(parsed: LlmExtraction, doc: &JoinedDocument, config: &PipelineConfig, anchors: &AnchorDates) -> ExtractionDraft {
    let mut draft = ExtractionDraft::default();
    let window = config.temporal_window_chars;

    if let Some(name) = parsed.demographics.name {
        draft.scalars.push(scalar(ScalarField::Name, ScalarValue::Text(name), PipelineConfig::CONFIDENCE_MEDIUM));
    }
    if let Some(mrn) = parsed.demographics.mrn {
        draft.scalars.push(scalar(ScalarField::Mrn, ScalarValue::Text(mrn), PipelineConfig::CONFIDENCE_HIGH));
    }
    if let Some(dob) = parsed.demographics.dob {
        draft.scalars.push(scalar(ScalarField::Dob, ScalarValue::Date(dob), PipelineConfig::CONFIDENCE_HIGH));
    }
    if let Some(age) = parsed.demographics.age {
        draft.scalars.push(scalar(ScalarField::Age, ScalarValue::Number(age), PipelineConfig::CONFIDENCE_MEDIUM));
    }
    if let Some(gender) = parsed.demographics.gender {
        draft.scalars.push(scalar(ScalarField::Gender, ScalarValue::Text(gender), PipelineConfig::CONFIDENCE_MEDIUM));
    }
    if let Some(attending) = parsed.demographics.attending {
        draft.scalars.push(scalar(ScalarField::Attending, ScalarValue::Text(attending), PipelineConfig::CONFIDENCE_MEDIUM));
    }
    if let Some(admission) = parsed.dates.admission {
        draft.scalars.push(scalar(ScalarField::AdmissionDate, ScalarValue::Date(admission), PipelineConfig::CONFIDENCE_CRITICAL));
    }
    if let Some(discharge) = parsed.dates.discharge {
        draft.scalars.push(scalar(ScalarField::DischargeDate, ScalarValue::Date(discharge), PipelineConfig::CONFIDENCE_CRITICAL));
    }
    if let Some(ictus) = parsed.dates.ictus {
        draft.scalars.push(scalar(ScalarField::IctusDate, ScalarValue::Date(ictus), PipelineConfig::CONFIDENCE_HIGH));
    }
    draft.surgery_dates.extend(parsed.dates.surgery);

    for d in parsed.diagnoses {
        let span = resolve_span(doc, &d.quote);
        push(&mut draft, EntityValue::Diagnosis(DiagnosisDetail { name: d.name, icd_hint: d.icd_hint }), span, PipelineConfig::CONFIDENCE_HIGH, doc, window, anchors);
    }
    for p in parsed.procedures {
        let span = resolve_span(doc, &p.quote);
        push(&mut draft, EntityValue::Procedure(ProcedureDetail { name: p.name, detail: p.detail }), span, PipelineConfig::CONFIDENCE_HIGH, doc, window, anchors);
    }
    for m in parsed.medications {
        let span = resolve_span(doc, &m.quote);
        push(&mut draft, EntityValue::Medication(MedicationDetail { name: m.name, category: m.category, dose: m.dose, frequency: m.frequency }), span, PipelineConfig::CONFIDENCE_MEDIUM, doc, window, anchors);
    }
    for c in parsed.complications {
        let span = resolve_span(doc, &c.quote);
        push(&mut draft, EntityValue::Complication(ComplicationDetail { name: c.name, severity: c.severity }), span, PipelineConfig::CONFIDENCE_HIGH, doc, window, anchors);
    }
    for e in parsed.examination_findings {
        let span = resolve_span(doc, &e.quote);
        push(&mut draft, EntityValue::ExaminationFinding(ExaminationFindingDetail { text: e.text }), span, PipelineConfig::CONFIDENCE_MEDIUM, doc, window, anchors);
    }
    for f in parsed.functional_scores {
        let span = resolve_span(doc, &f.quote);
        push(&mut draft, EntityValue::FunctionalScore(FunctionalScoreDetail { scale: f.scale, value: f.value, computed: false }), span, PipelineConfig::CONFIDENCE_HIGH, doc, window, anchors);
    }
    for c in parsed.consultations {
        let span = resolve_span(doc, &c.quote);
        push(&mut draft, EntityValue::Consultation(ConsultationDetail { service: c.service, reason: c.reason }), span, PipelineConfig::CONFIDENCE_MEDIUM, doc, window, anchors);
    }
    for i in parsed.imaging_findings {
        let span = resolve_span(doc, &i.quote);
        push(&mut draft, EntityValue::ImagingFinding(ImagingFindingDetail { modality: i.modality, finding: i.finding }), span, PipelineConfig::CONFIDENCE_MEDIUM, doc, window, anchors);
    }
    if let Some(d) = parsed.discharge_disposition {
        let span = resolve_span(doc, &d.quote);
        push(&mut draft, EntityValue::DischargeDisposition(DispositionDetail { disposition: d.disposition }), span, PipelineConfig::CONFIDENCE_CRITICAL, doc, window, anchors);
    }
    for f in parsed.follow_up {
        let span = resolve_span(doc, &f.quote);
        push(&mut draft, EntityValue::FollowUp(FollowUpDetail { text: f.text, timeframe: f.timeframe }), span, PipelineConfig::CONFIDENCE_MEDIUM, doc, window, anchors);
    }

    draft.suggestions = parsed._suggestions;
    draft.validation_warnings = parsed._validation_warnings;
    draft
}

fn scalar(field: ScalarField, value: ScalarValue, confidence: f32) -> ScalarCandidate {
    ScalarCandidate {
        field,
        value,
        confidence,
        source: ExtractionSource::Llm,
        // Scalars are document-level facts, not spans within one note; the
        // merger only uses a scalar's source and confidence, never its span.
        source_span: SourceSpan::new(0, 0, 0),
    }
}

fn push(
    draft: &mut ExtractionDraft,
    value: EntityValue,
    span: SourceSpan,
    confidence: f32,
    doc: &JoinedDocument,
    window: usize,
    anchors: &AnchorDates,
) {
    let note_start = doc.ranges.iter().find(|r| r.0 == span.note_index).map(|r| r.1).unwrap_or(0);
    let full_start = note_start + span.start;
    let full_end = note_start + span.end;
    let temporal = temporal::analyze_span(&doc.text, full_start, full_end, window, anchors, None);
    draft.entities.push(RawEntity {
        value,
        source: ExtractionSource::Llm,
        source_span: span,
        confidence,
        temporal,
    });
}

/// Runs the LLM Extraction Adapter over the normalized note set, walking
/// the primary -> secondary -> tertiary fallback ladder (spec §4.5). Each
/// attempt's failure is logged with its reason before falling through to
/// the next provider; if every provider fails, the orchestrator is expected
/// to continue with the pattern-only draft rather than abort the request.
pub fn extract(
    notes: &[NormalizedNote],
    anchors: &AnchorDates,
    config: &PipelineConfig,
    providers: &[ProviderAttempt<'_>],
) -> Result<ExtractionDraft, crate::error::CoreError> {
    let doc = join_notes(notes);
    let prompt = build_extraction_prompt(&doc.text);
    let options = LlmCallOptions {
        max_tokens: 4096,
        temperature: 0.1,
        response_format: ResponseFormat::Json,
    };

    let mut last_err = None;
    for provider in providers {
        match provider.client.generate(&prompt, EXTRACTION_SYSTEM_PROMPT, &options) {
            Ok(raw) => match parse_reply(&raw, provider.name) {
                Ok(parsed) => {
                    tracing::info!(provider = provider.name, "llm extraction succeeded");
                    return Ok(into_draft(parsed, &doc, config, anchors));
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name, error = %e, "llm reply failed schema validation, trying next provider");
                    last_err = Some(e);
                }
            },
            Err(e) => {
                tracing::warn!(provider = provider.name, error = %e, "llm provider call failed, trying next provider");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or(crate::error::CoreError::LlmProvider {
        stage: STAGE,
        provider: None,
        message: "no providers configured".to_string(),
        fallback_attempted: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::llm::client::MockLlmClient;
    use crate::normalize::normalize_notes;
    use crate::model::ClinicalNote;

    fn notes() -> (Vec<NormalizedNote>, AnchorDates) {
        let raw = vec![ClinicalNote::new(
            "Admission Date: 2025-10-15. 64-year-old female with SAH. Underwent coiling on 2025-10-16.",
        )];
        normalize_notes(&raw)
    }

    #[test]
    fn rejects_reply_that_is_a_raw_string_not_an_object() {
        let client = MockLlmClient::ok("\"just a string\"");
        let providers = vec![ProviderAttempt { name: "primary", client: &client }];
        let (normalized, anchors) = notes();
        let config = PipelineConfig::default();
        let err = extract(&normalized, &anchors, &config, &providers).unwrap_err();
        assert!(matches!(err, crate::error::CoreError::LlmSchema { .. }));
    }

    #[test]
    fn falls_through_ladder_to_second_provider_on_failure() {
        let primary = MockLlmClient::failing("timeout");
        let secondary = MockLlmClient::ok(r#"{"diagnoses":[{"name":"SAH","quote":"SAH"}]}"#);
        let providers = vec![
            ProviderAttempt { name: "primary", client: &primary },
            ProviderAttempt { name: "secondary", client: &secondary },
        ];
        let (normalized, anchors) = notes();
        let config = PipelineConfig::default();
        let draft = extract(&normalized, &anchors, &config, &providers).unwrap();
        assert_eq!(draft.entities.len(), 1);
    }

    #[test]
    fn quote_resolved_to_originating_note_span() {
        let client = MockLlmClient::ok(r#"{"procedures":[{"name":"coiling","quote":"coiling"}]}"#);
        let providers = vec![ProviderAttempt { name: "primary", client: &client }];
        let (normalized, anchors) = notes();
        let config = PipelineConfig::default();
        let draft = extract(&normalized, &anchors, &config, &providers).unwrap();
        let entity = &draft.entities[0];
        assert_eq!(entity.source_span.note_index, 0);
        assert_eq!(&normalized[0].text[entity.source_span.start..entity.source_span.end], "coiling");
    }

    #[test]
    fn strips_markdown_code_fence_before_parsing() {
        let client = MockLlmClient::ok("```json\n{\"diagnoses\":[]}\n```");
        let providers = vec![ProviderAttempt { name: "primary", client: &client }];
        let (normalized, anchors) = notes();
        let config = PipelineConfig::default();
        assert!(extract(&normalized, &anchors, &config, &providers).is_ok());
    }

    #[test]
    fn advisory_fields_carried_without_affecting_entities() {
        let client = MockLlmClient::ok(r#"{"_suggestions":["consider discharge weight"],"_validationWarnings":["age seems high"]}"#);
        let providers = vec![ProviderAttempt { name: "primary", client: &client }];
        let (normalized, anchors) = notes();
        let config = PipelineConfig::default();
        let draft = extract(&normalized, &anchors, &config, &providers).unwrap();
        assert_eq!(draft.suggestions, vec!["consider discharge weight".to_string()]);
        assert_eq!(draft.validation_warnings, vec!["age seems high".to_string()]);
        assert!(draft.entities.is_empty());
    }
}
