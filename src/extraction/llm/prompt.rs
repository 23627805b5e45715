/// System prompt enforced on every extraction call — the no-extrapolation
/// constraint is mirrored here exactly as the pattern extractor enforces
/// it structurally (spec §4.5).
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a clinical note extraction assistant. Your ONLY role is to extract
entities explicitly documented in the provided neurosurgical hospitalization
notes.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Extract ONLY information explicitly stated in the notes.
2. NEVER infer a diagnosis, treatment recommendation, or clinical judgement
   beyond what is written, with the single exception of computing a KPS,
   ECOG, or mRS functional-status score from PT/OT or exam text when no
   explicit score is documented.
3. If a field is not documented, omit it rather than guessing.
4. Preserve exact values (dates, doses, lab values) verbatim.
5. Output a single JSON object only — no prose, no markdown fences.
"#;

/// Builds the extraction prompt for one batch of normalized note text,
/// specifying the complete field schema and marking critical vs optional
/// fields, per spec §4.5.
pub fn build_extraction_prompt(normalized_text: &str) -> String {
    format!(
        r#"Extract all documented entities from the following clinical notes into
this JSON schema. Fields marked CRITICAL should always be populated when the
information is present in the text; OPTIONAL fields may be omitted.

<notes>
{normalized_text}
</notes>

{{
  "demographics": {{
    "name": "string or null",
    "mrn": "string or null (CRITICAL if present)",
    "dob": "YYYY-MM-DD or null",
    "age": "integer or null",
    "gender": "string or null",
    "attending": "string or null"
  }},
  "dates": {{
    "admission": "YYYY-MM-DD or null (CRITICAL)",
    "surgery": ["YYYY-MM-DD", "..."],
    "discharge": "YYYY-MM-DD or null (CRITICAL)",
    "ictus": "YYYY-MM-DD or null"
  }},
  "diagnoses": [{{"name": "string (CRITICAL)", "icd_hint": "string or null"}}],
  "procedures": [{{"name": "string (CRITICAL)", "detail": "string or null"}}],
  "medications": [{{"name": "string", "category": "anticoagulation|aed|antibiotic|other", "dose": "string or null", "frequency": "string or null"}}],
  "complications": [{{"name": "string (CRITICAL)", "severity": "string or null"}}],
  "examination_findings": [{{"text": "string"}}],
  "functional_scores": [{{"scale": "hunt_hess|modified_fisher|gcs_total|gcs_eye|gcs_motor|gcs_verbal|mrs|kps|ecog|nihss", "value": "number"}}],
  "consultations": [{{"service": "string", "reason": "string or null"}}],
  "imaging_findings": [{{"modality": "string", "finding": "string"}}],
  "discharge_disposition": {{"disposition": "string (CRITICAL)"}} ,
  "follow_up": [{{"text": "string", "timeframe": "string or null"}}],
  "_suggestions": ["fields you believe are missing from the source text"],
  "_validationWarnings": ["documented values that look implausible"]
}}

Every entity must also report where in the text it was found by including a
"quote" field with the exact matched substring, so the orchestrator can
re-anchor it. Return the JSON object now.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_note_text_and_schema() {
        let prompt = build_extraction_prompt("Admission 2025-10-15.");
        assert!(prompt.contains("Admission 2025-10-15."));
        assert!(prompt.contains("\"demographics\""));
        assert!(prompt.contains("CRITICAL"));
    }

    #[test]
    fn system_prompt_forbids_extrapolation() {
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("NEVER infer"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("KPS"));
    }
}
