use serde::{Deserialize, Serialize};

use crate::model::entity::ExtractionRecord;
use crate::model::narrative::NarrativeSection;
use crate::model::quality::QualityReport;
use crate::timeline::Timeline;

/// Generation mode: `preserve-all-info` keeps complementary-merge
/// candidates that `fast` would drop rather than union (spec §4.2/§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    Fast,
    PreserveAllInfo,
}

impl Default for GenerationMode {
    fn default() -> Self {
        Self::PreserveAllInfo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Primary,
    Secondary,
    Tertiary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Structured,
    Narrative,
    Both,
}

impl Default for ResponseFormat {
    fn default() -> Self {
        Self::Both
    }
}

/// Caller-tunable knobs for one generation call. Unset fields fall back to
/// `PipelineConfig`'s defaults (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub mode: GenerationMode,
    pub quality_threshold: Option<f32>,
    pub max_refinement_iterations: Option<u32>,
    pub enable_llm: bool,
    pub llm_provider: Option<LlmProvider>,
    pub response_format: ResponseFormat,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            mode: GenerationMode::default(),
            quality_threshold: None,
            max_refinement_iterations: None,
            enable_llm: true,
            llm_provider: None,
            response_format: ResponseFormat::default(),
        }
    }
}

/// Either a single blob of notes or a caller-pre-split ordered list — both
/// forms are normalized to `Vec<ClinicalNote>` before the pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotesInput {
    Many(Vec<String>),
    Single(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub notes: NotesInput,
    #[serde(default)]
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub processing_time_ms: u64,
    pub provider_used: String,
    pub fallbacks_fired: Vec<String>,
    pub cache_hits: u64,
    pub iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub extracted: ExtractionRecord,
    pub narrative: NarrativeSection,
    pub timeline: Timeline,
    pub quality: QualityReport,
    pub metadata: GenerationMetadata,
}
