//! Shared data types passed between pipeline stages. Every other module
//! depends on this one; it depends on none of them (except `timeline`,
//! whose `Timeline` type appears in the external response contract).

pub mod entity;
pub mod narrative;
pub mod note;
pub mod quality;
pub mod raw;
pub mod request;
pub mod temporal;

pub use entity::{
    content_id, ComplicationDetail, ConsultationDetail, Demographics, DatesRecord, DiagnosisDetail,
    DispositionDetail, Entity, EntityFamily, EntityReference, ExaminationFindingDetail,
    ExtractionRecord, FollowUpDetail, FunctionalScoreDetail, ImagingFindingDetail,
    MedicationCategory, MedicationDetail, ProcedureDetail, ScoreScale, SourceSpan,
};
pub use narrative::NarrativeSection;
pub use note::{AnchorDates, ClinicalNote, NormalizedNote};
pub use quality::{
    DimensionScore, IssueSeverity, QualityDimension, QualityIssue, QualityRating, QualityReport,
};
pub use raw::{
    EntityValue, EntityValue as RawEntityValue, ExtractionDraft, ExtractionSource, RawEntity,
    ScalarCandidate, ScalarField, ScalarValue,
};
pub use request::{
    GenerationMetadata, GenerationMode, GenerationOptions, GenerationRequest, GenerationResponse,
    LlmProvider, NotesInput, ResponseFormat,
};
pub use temporal::{CategoryVote, MentionKind, TemporalCategory, TemporalContext};
