use std::time::Duration;

pub const APP_NAME: &str = "discharge-synth";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tunables for one generation pipeline run. Defaults match spec §4/§6;
/// `GenerationOptions` overrides individual fields per request.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Refinement-loop trigger. Below this, the orchestrator re-generates
    /// the lowest-scoring dimension.
    pub quality_threshold: f32,
    /// "Excellent" rating band floor.
    pub excellent_threshold: f32,
    pub max_refinement_iterations: u32,
    /// Near-duplicate note threshold (Jaccard on whitespace tokens).
    pub jaccard_near_duplicate_threshold: f64,
    /// Sentence-level dedup threshold.
    pub sentence_duplicate_threshold: f64,
    /// Complementary-merge similarity band, inclusive.
    pub complementary_merge_range: (f64, f64),
    pub llm_timeout: Duration,
    pub stage_timeout: Duration,
    /// Cache entry ceiling (LRU eviction beyond this).
    pub cache_capacity: u64,
    /// ±N characters inspected around a candidate span by the temporal
    /// analyzer.
    pub temporal_window_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 0.85,
            excellent_threshold: 0.95,
            max_refinement_iterations: 2,
            jaccard_near_duplicate_threshold: 0.85,
            sentence_duplicate_threshold: 0.90,
            complementary_merge_range: (0.30, 0.60),
            llm_timeout: Duration::from_secs(30),
            stage_timeout: Duration::from_secs(60),
            cache_capacity: 10_000,
            temporal_window_chars: 200,
        }
    }
}

impl PipelineConfig {
    /// Confidence weights a pattern declares itself at (spec §4.4).
    pub const CONFIDENCE_CRITICAL: f32 = 0.95;
    pub const CONFIDENCE_HIGH: f32 = 0.85;
    pub const CONFIDENCE_MEDIUM: f32 = 0.70;
    pub const CONFIDENCE_LOW: f32 = 0.55;
}
