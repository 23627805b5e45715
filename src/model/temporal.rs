use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Coarse temporal category attached to every extracted mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalCategory {
    Past,
    Present,
    Future,
    Admission,
    Discharge,
    Preop,
    Postop,
    Acute,
    Chronic,
    Unknown,
}

impl Default for TemporalCategory {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Whether a mention is the first occurrence of an event, a back-reference
/// to one, or notice that a prior state continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionKind {
    NewEvent,
    Reference,
    Continuation,
}

/// One category assignment with its own confidence — used when a span
/// matches more than one category keyword (e.g. "chronic" and "acute" in
/// the same window) so both are retained rather than one silently winning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryVote {
    pub category: TemporalCategory,
    pub confidence: f32,
}

/// Temporal qualification attached to every extracted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalContext {
    pub category: TemporalCategory,
    /// All category votes found in the window, highest confidence first.
    /// `category` always equals `votes[0].category`.
    pub votes: Vec<CategoryVote>,
    pub kind: MentionKind,
    pub pod: Option<i64>,
    pub resolved_date: Option<NaiveDate>,
    pub confidence: f32,
}

impl TemporalContext {
    pub fn new(category: TemporalCategory, kind: MentionKind, confidence: f32) -> Self {
        Self {
            category,
            votes: vec![CategoryVote {
                category,
                confidence,
            }],
            kind,
            pod: None,
            resolved_date: None,
            confidence,
        }
    }

    pub fn with_pod(mut self, pod: i64) -> Self {
        self.pod = Some(pod);
        self
    }

    pub fn with_resolved_date(mut self, date: NaiveDate) -> Self {
        self.resolved_date = Some(date);
        self
    }

    /// Add a secondary category vote (e.g. both "chronic" and "acute" matched
    /// the same window) without displacing the primary category.
    pub fn add_vote(&mut self, category: TemporalCategory, confidence: f32) {
        self.votes.push(CategoryVote {
            category,
            confidence,
        });
    }

    /// The highest-weighted category among all votes, used downstream when a
    /// conflict between categories must be resolved to a single value.
    pub fn dominant_category(&self) -> TemporalCategory {
        self.votes
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|v| v.category)
            .unwrap_or(self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_category_picks_highest_confidence_vote() {
        let mut ctx = TemporalContext::new(TemporalCategory::Chronic, MentionKind::Reference, 0.6);
        ctx.add_vote(TemporalCategory::Acute, 0.8);
        assert_eq!(ctx.dominant_category(), TemporalCategory::Acute);
    }

    #[test]
    fn single_vote_dominant_is_primary() {
        let ctx = TemporalContext::new(TemporalCategory::Admission, MentionKind::NewEvent, 0.9);
        assert_eq!(ctx.dominant_category(), TemporalCategory::Admission);
    }
}
