use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::entity::{
    ComplicationDetail, ConsultationDetail, DiagnosisDetail, DispositionDetail,
    ExaminationFindingDetail, FollowUpDetail, FunctionalScoreDetail, ImagingFindingDetail,
    MedicationDetail, ProcedureDetail, SourceSpan,
};
use super::temporal::TemporalContext;

/// Which stage produced a candidate value — needed by the merger's
/// scalar tie-break rule ("prefer pattern on confidence ties").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    Pattern,
    Llm,
}

/// The discriminated-union entity value every collection-type extraction
/// produces, whether from the Pattern Extractor or the LLM Adapter. This
/// is the shape both extractors normalize into at their boundary with the
/// merger — the duck-typed "sometimes object, sometimes array" shape the
/// original system used is rejected in favor of one canonical variant set
/// (spec §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityValue {
    Diagnosis(DiagnosisDetail),
    Procedure(ProcedureDetail),
    Medication(MedicationDetail),
    Complication(ComplicationDetail),
    ExaminationFinding(ExaminationFindingDetail),
    FunctionalScore(FunctionalScoreDetail),
    Consultation(ConsultationDetail),
    ImagingFinding(ImagingFindingDetail),
    DischargeDisposition(DispositionDetail),
    FollowUp(FollowUpDetail),
}

impl EntityValue {
    /// The name used to build the (normalized-name, date) merge key —
    /// every variant carries some kind of a name/label field.
    pub fn name(&self) -> &str {
        match self {
            Self::Diagnosis(d) => &d.name,
            Self::Procedure(p) => &p.name,
            Self::Medication(m) => &m.name,
            Self::Complication(c) => &c.name,
            Self::ExaminationFinding(e) => &e.text,
            Self::FunctionalScore(_) => "functional_score",
            Self::Consultation(c) => &c.service,
            Self::ImagingFinding(i) => &i.modality,
            Self::DischargeDisposition(d) => &d.disposition,
            Self::FollowUp(f) => &f.text,
        }
    }
}

/// One pre-merge extraction emitted by either the Pattern Extractor or the
/// LLM Adapter. The merger consumes these from both sources and produces
/// the canonical `ExtractionRecord` collections plus `EntityReference`
/// links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    pub value: EntityValue,
    pub source: ExtractionSource,
    pub source_span: SourceSpan,
    pub confidence: f32,
    pub temporal: TemporalContext,
}

impl RawEntity {
    /// Normalized lowercase name used as the merge key's name component.
    pub fn normalized_name(&self) -> String {
        self.value.name().trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarField {
    Name,
    Mrn,
    Dob,
    Age,
    Gender,
    Attending,
    AdmissionDate,
    DischargeDate,
    IctusDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Text(String),
    Date(NaiveDate),
    Number(u8),
}

/// A candidate value for a scalar demographic/date field, before the
/// merger picks a winner by confidence (spec §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarCandidate {
    pub field: ScalarField,
    pub value: ScalarValue,
    pub confidence: f32,
    pub source: ExtractionSource,
    pub source_span: SourceSpan,
}

/// Everything one extractor (pattern or LLM) produced for a single
/// generation request, prior to merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDraft {
    pub scalars: Vec<ScalarCandidate>,
    pub surgery_dates: Vec<NaiveDate>,
    pub entities: Vec<RawEntity>,
    /// LLM-only advisory fields (spec §4.5); empty for pattern drafts.
    pub suggestions: Vec<String>,
    pub validation_warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::ProcedureDetail;
    use crate::model::temporal::{MentionKind, TemporalCategory};

    #[test]
    fn normalized_name_lowercases_and_trims() {
        let entity = RawEntity {
            value: EntityValue::Procedure(ProcedureDetail {
                name: "  Coiling ".into(),
                detail: None,
            }),
            source: ExtractionSource::Pattern,
            source_span: SourceSpan::new(0, 0, 1),
            confidence: 0.9,
            temporal: TemporalContext::new(TemporalCategory::Postop, MentionKind::NewEvent, 0.9),
        };
        assert_eq!(entity.normalized_name(), "coiling");
    }
}
