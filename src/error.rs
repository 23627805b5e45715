use thiserror::Error;

/// Stable error surface for the generation pipeline (spec §6/§7). Every
/// variant carries the stage it failed in and whether a fallback was
/// attempted, so callers can log/alert without inspecting the message.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("LLM returned a value that could not be interpreted as an object in stage {stage}: {message}")]
    LlmSchema {
        stage: &'static str,
        provider: Option<String>,
        message: String,
    },

    #[error("LLM provider failure in stage {stage}: {message}")]
    LlmProvider {
        stage: &'static str,
        provider: Option<String>,
        message: String,
        fallback_attempted: bool,
    },

    #[error("extraction failed in stage {stage}: {message}")]
    Extraction {
        stage: &'static str,
        message: String,
    },

    #[error("narrative parsing failed in stage {stage}: {message}")]
    NarrativeParse {
        stage: &'static str,
        message: String,
    },

    #[error("quality threshold not met after refinement in stage {stage}: {message}")]
    QualityThreshold {
        stage: &'static str,
        message: String,
    },

    #[error("request cancelled during stage {stage}")]
    Cancelled { stage: &'static str },

    #[error("invariant violated in stage {stage}: {message}")]
    InvariantViolation {
        stage: &'static str,
        message: String,
    },
}

impl CoreError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::LlmSchema { stage, .. }
            | Self::LlmProvider { stage, .. }
            | Self::Extraction { stage, .. }
            | Self::NarrativeParse { stage, .. }
            | Self::QualityThreshold { stage, .. }
            | Self::Cancelled { stage }
            | Self::InvariantViolation { stage, .. } => stage,
        }
    }

    pub fn fallback_attempted(&self) -> bool {
        matches!(self, Self::LlmProvider { fallback_attempted: true, .. })
    }

    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::LlmSchema { provider, .. } | Self::LlmProvider { provider, .. } => {
                provider.as_deref()
            }
            _ => None,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_accessor_reads_every_variant() {
        let err = CoreError::Extraction {
            stage: "pattern_extractor",
            message: "bad match".into(),
        };
        assert_eq!(err.stage(), "pattern_extractor");
        assert!(!err.fallback_attempted());
    }

    #[test]
    fn fallback_attempted_only_true_for_llm_provider_with_flag() {
        let err = CoreError::LlmProvider {
            stage: "llm_adapter",
            provider: Some("primary".into()),
            message: "timeout".into(),
            fallback_attempted: true,
        };
        assert!(err.fallback_attempted());
        assert_eq!(err.provider(), Some("primary"));
    }
}
