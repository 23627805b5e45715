use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::temporal::TemporalContext;

/// Location of a match within the normalized note set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub note_index: usize,
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(note_index: usize, start: usize, end: usize) -> Self {
        Self {
            note_index,
            start,
            end,
        }
    }
}

/// Which top-level family an entity belongs to. Mirrors the kinds enumerated
/// in the external entity schema — stable, not to be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityFamily {
    Demographic,
    Date,
    Diagnosis,
    Procedure,
    Medication,
    Complication,
    ExaminationFinding,
    FunctionalScore,
    Consultation,
    ImagingFinding,
    DischargeDisposition,
    FollowUp,
}

/// Namespace for every content-derived id this crate assigns. Arbitrary but
/// fixed — only its stability across runs matters, not its value.
const ENTITY_ID_NAMESPACE: Uuid = Uuid::from_u128(0x8f14_e45f_ceea_167a_5a36_dedd_4bea_2543);

/// Derives a stable id from content that identifies an entity within one
/// generation run, instead of `Uuid::new_v4`'s process-random value.
/// `ExtractionRecord` is serialized as the external response contract, and
/// spec §8 requires two runs over identical input (and identical LLM
/// replies) to produce byte-identical output — a random id would fail that
/// on every run.
pub fn content_id(parts: &[&str]) -> Uuid {
    Uuid::new_v5(&ENTITY_ID_NAMESPACE, parts.join("\u{1f}").as_bytes())
}

/// One extracted, temporally-qualified entity. Generic over the
/// family-specific payload so each collection in `ExtractionRecord` carries
/// its own strongly-typed detail instead of a loosely-typed map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity<T> {
    pub id: Uuid,
    pub value: T,
    pub source_span: SourceSpan,
    pub confidence: f32,
    pub temporal: TemporalContext,
}

impl<T: std::fmt::Debug> Entity<T> {
    /// Assigns a `content_id` derived from the value's own `Debug` form
    /// plus its source span and temporal context, so the same mention
    /// extracted twice gets the same id both times.
    pub fn new(value: T, source_span: SourceSpan, confidence: f32, temporal: TemporalContext) -> Self {
        let value_key = format!("{value:?}");
        let span_key = format!("{source_span:?}");
        let category_key = format!("{:?}", temporal.category);
        let kind_key = format!("{:?}", temporal.kind);
        let pod_key = format!("{:?}", temporal.pod);
        let resolved_key = format!("{:?}", temporal.resolved_date);
        let id = content_id(&[
            value_key.as_str(),
            span_key.as_str(),
            category_key.as_str(),
            kind_key.as_str(),
            pod_key.as_str(),
            resolved_key.as_str(),
        ]);
        Self {
            id,
            value,
            source_span,
            confidence,
            temporal,
        }
    }
}

/// A `reference`/`continuation` mention that does not create a new entity —
/// it links back to an existing new_event entity by (normalized-name,
/// nearest-preceding-date), represented as a lookup handle rather than an
/// owned pointer to avoid cyclic object graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReference {
    pub family: EntityFamily,
    pub normalized_name: String,
    pub linked_event_id: Uuid,
    pub source_span: SourceSpan,
    pub temporal: TemporalContext,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub name: Option<String>,
    pub mrn: Option<String>,
    pub dob: Option<NaiveDate>,
    pub age: Option<u8>,
    pub gender: Option<String>,
    pub attending: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatesRecord {
    pub admission: Option<NaiveDate>,
    pub surgery: Vec<NaiveDate>,
    pub discharge: Option<NaiveDate>,
    pub ictus: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisDetail {
    pub name: String,
    pub icd_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDetail {
    pub name: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationCategory {
    Anticoagulation,
    Aed,
    Antibiotic,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationDetail {
    pub name: String,
    pub category: MedicationCategory,
    pub dose: Option<String>,
    pub frequency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplicationDetail {
    pub name: String,
    pub severity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExaminationFindingDetail {
    pub text: String,
}

/// Which clinical/functional scale a score value belongs to. Hunt-Hess and
/// modified Fisher are modeled as disjoint variants — never covered by one
/// shared pattern (spec open question 9.i).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    HuntHess,
    ModifiedFisher,
    GcsTotal,
    GcsEye,
    GcsMotor,
    GcsVerbal,
    Mrs,
    Kps,
    Ecog,
    Nihss,
}

impl ScoreScale {
    /// KPS/ECOG/mRS are the functional-status scales the Non-goals clause
    /// permits computing from PT/OT or exam text when undocumented.
    pub fn is_functional_status(&self) -> bool {
        matches!(self, Self::Mrs | Self::Kps | Self::Ecog)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FunctionalScoreDetail {
    pub scale: ScoreScale,
    pub value: f32,
    /// True when computed from exam/PT-OT text rather than found verbatim —
    /// the sole judgement exception the spec allows.
    pub computed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationDetail {
    pub service: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagingFindingDetail {
    pub modality: String,
    pub finding: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispositionDetail {
    pub disposition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpDetail {
    pub text: String,
    pub timeframe: Option<String>,
}

/// Top-level extraction output. Field names and nesting are a stable
/// external contract (spec §6) — do not reorder or rename without a
/// version bump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub demographics: Demographics,
    pub dates: DatesRecord,
    pub diagnoses: Vec<Entity<DiagnosisDetail>>,
    pub procedures: Vec<Entity<ProcedureDetail>>,
    pub medications: Vec<Entity<MedicationDetail>>,
    pub complications: Vec<Entity<ComplicationDetail>>,
    pub examination_findings: Vec<Entity<ExaminationFindingDetail>>,
    pub functional_scores: Vec<Entity<FunctionalScoreDetail>>,
    pub consultations: Vec<Entity<ConsultationDetail>>,
    pub imaging_findings: Vec<Entity<ImagingFindingDetail>>,
    pub discharge_disposition: Option<Entity<DispositionDetail>>,
    pub follow_up: Vec<Entity<FollowUpDetail>>,
    pub references: Vec<EntityReference>,
}

impl ExtractionRecord {
    /// Total count of new_event entities across every collection —
    /// used by the timeline-builder invariant check (spec §4.7/§8).
    pub fn new_event_count(&self) -> usize {
        self.diagnoses.len()
            + self.procedures.len()
            + self.medications.len()
            + self.complications.len()
            + self.examination_findings.len()
            + self.functional_scores.len()
            + self.consultations.len()
            + self.imaging_findings.len()
            + self.discharge_disposition.iter().len()
            + self.follow_up.len()
    }
}
