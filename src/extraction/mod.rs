//! The two independent extraction stages the orchestrator runs concurrently
//! (spec §4.4/§4.5): a deterministic Pattern Extractor and a pluggable LLM
//! Extraction Adapter. Their `ExtractionDraft` outputs are reconciled by
//! `merge`, never here.

pub mod llm;
pub mod pattern;
