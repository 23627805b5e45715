//! Synthesizes neurosurgical hospitalization notes into a structured,
//! chronologically coherent discharge summary.
//!
//! The public surface is [`generate`], which runs the full pipeline —
//! normalization, deduplication, concurrent pattern + LLM extraction,
//! entity merging, timeline construction, narrative generation, section
//! parsing, and quality scoring with bounded refinement — over one
//! [`model::GenerationRequest`] and returns a [`model::GenerationResponse`].

pub mod config;
pub mod dedup;
pub mod error;
pub mod extraction;
pub mod merge;
pub mod model;
pub mod narrative;
pub mod normalize;
pub mod orchestrator;
pub mod quality;
pub mod section_parser;
pub mod temporal;
pub mod timeline;

pub use error::{CoreError, CoreResult};
pub use orchestrator::{generate, OrchestratorDeps, StageCache};

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber reading `RUST_LOG`, falling back to
/// info-level for this crate. Callers embedding this library in a larger
/// binary may already have a subscriber installed; this is only for
/// standalone use (CLIs, the benches, the integration tests).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("discharge_synth=info")))
        .try_init();
}
