//! LLM Extraction Adapter: wraps a pluggable `LlmClient` with schema
//! enforcement and the primary/secondary/tertiary fallback ladder (spec
//! §4.5). The pattern extractor and this module run concurrently from the
//! orchestrator and are merged by `merge::merge`.

mod adapter;
mod client;
mod prompt;

pub use adapter::{extract, ProviderAttempt};
pub use client::{HttpLlmClient, LlmCallOptions, LlmClient, MockLlmClient, ResponseFormat};
