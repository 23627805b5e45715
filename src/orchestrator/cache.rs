//! Process-wide LLM-response cache (spec §4.11/§5): keyed by content hash
//! + stage name + model name, immutable once written, LRU eviction beyond
//! a configurable ceiling. Grounded on the Moka cache wrapper pattern used
//! elsewhere in this codebase's corpus for content-addressed parse
//! results.

use std::cell::Cell;

use moka::sync::Cache;

use crate::error::CoreError;
use crate::extraction::llm::{LlmCallOptions, LlmClient};

/// `(content_hash, stage, model)`. Two requests with identical note content
/// hitting the same stage against the same model share a cache entry —
/// concurrent writers racing on the same key write identical content, so
/// last-writer-wins is safe by construction.
type CacheKey = (String, &'static str, String);

pub struct StageCache {
    inner: Cache<CacheKey, String>,
}

impl StageCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::new(capacity),
        }
    }

    pub fn get(&self, content_hash: &str, stage: &'static str, model: &str) -> Option<String> {
        self.inner.get(&(content_hash.to_string(), stage, model.to_string()))
    }

    pub fn insert(&self, content_hash: &str, stage: &'static str, model: &str, value: String) {
        self.inner.insert((content_hash.to_string(), stage, model.to_string()), value);
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

/// Content hash used as the cache key's first component (spec: "keyed by
/// content hash + stage + model").
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Wraps one provider's client with the stage cache. The wrapped prompt
/// (system + user, joined with a NUL the two never otherwise contain) is
/// the hash input, so a cache hit is exact on both halves of the call.
/// `hits` accumulates a per-request counter for `GenerationMetadata`;
/// there's no per-request cache instance, so the hit count can't be read
/// back off `StageCache` itself.
pub struct CachingClient<'a> {
    pub inner: &'a dyn LlmClient,
    pub cache: &'a StageCache,
    pub stage: &'static str,
    pub model: &'a str,
    pub hits: &'a Cell<u64>,
}

impl LlmClient for CachingClient<'_> {
    fn generate(&self, prompt: &str, system_prompt: &str, options: &LlmCallOptions) -> Result<String, CoreError> {
        let hash = content_hash(&format!("{system_prompt}\u{0}{prompt}"));
        if let Some(cached) = self.cache.get(&hash, self.stage, self.model) {
            self.hits.set(self.hits.get() + 1);
            return Ok(cached);
        }
        let reply = self.inner.generate(prompt, system_prompt, options)?;
        self.cache.insert(&hash, self.stage, self.model, reply.clone());
        Ok(reply)
    }
}
