use serde::{Deserialize, Serialize};

/// Severity ordering of a quality issue. `Ord` derive gives critical-first
/// sort for free (variant declaration order is the sort order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Critical,
    Major,
    Minor,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: IssueSeverity,
    pub message: String,
    /// Dimension this issue was raised under, e.g. "completeness".
    pub dimension: String,
}

impl QualityIssue {
    pub fn new(severity: IssueSeverity, dimension: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            dimension: dimension.into(),
            message: message.into(),
        }
    }
}

/// The six weighted dimensions, in the fixed order spec §4.10 scores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDimension {
    Completeness,
    Accuracy,
    Consistency,
    NarrativeQuality,
    Specificity,
    Timeliness,
}

impl QualityDimension {
    /// Fixed weights per spec §4.10. Sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Completeness => 0.30,
            Self::Accuracy => 0.25,
            Self::Consistency => 0.20,
            Self::NarrativeQuality => 0.15,
            Self::Specificity => 0.05,
            Self::Timeliness => 0.05,
        }
    }

    pub const ALL: [QualityDimension; 6] = [
        Self::Completeness,
        Self::Accuracy,
        Self::Consistency,
        Self::NarrativeQuality,
        Self::Specificity,
        Self::Timeliness,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: QualityDimension,
    pub score: f32,
    pub issues: Vec<QualityIssue>,
    pub details: String,
}

/// Rating band derived from the overall weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityRating {
    Excellent,
    Good,
    Acceptable,
    NeedsReview,
}

impl QualityRating {
    pub fn from_overall(overall: f32) -> Self {
        if overall >= 0.95 {
            Self::Excellent
        } else if overall >= 0.85 {
            Self::Good
        } else if overall >= 0.70 {
            Self::Acceptable
        } else {
            Self::NeedsReview
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub overall: f32,
    pub rating: QualityRating,
    pub dimensions: Vec<DimensionScore>,
    pub recommendations: Vec<String>,
}

impl QualityReport {
    /// Composes dimension scores into an overall weighted score and rating.
    /// Panics-free: a dimension missing from `dimensions` contributes 0 to
    /// both the weighted sum and weight total (should not happen in
    /// practice since the scorer always evaluates all six).
    pub fn compose(dimensions: Vec<DimensionScore>, recommendations: Vec<String>) -> Self {
        let weighted: f32 = dimensions
            .iter()
            .map(|d| d.score * d.dimension.weight())
            .sum();
        let total_weight: f32 = dimensions.iter().map(|d| d.dimension.weight()).sum();
        let overall = if total_weight > 0.0 {
            weighted / total_weight
        } else {
            0.0
        };
        Self {
            overall,
            rating: QualityRating::from_overall(overall),
            dimensions,
            recommendations,
        }
    }

    /// All issues across dimensions, most severe first.
    pub fn all_issues(&self) -> Vec<&QualityIssue> {
        let mut issues: Vec<&QualityIssue> = self.dimensions.iter().flat_map(|d| &d.issues).collect();
        issues.sort_by_key(|i| i.severity);
        issues
    }

    /// The dimension with the lowest score — the refinement loop's target.
    pub fn lowest_scoring(&self) -> Option<&DimensionScore> {
        self.dimensions
            .iter()
            .min_by(|a, b| a.score.total_cmp(&b.score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(dimension: QualityDimension, score: f32) -> DimensionScore {
        DimensionScore {
            dimension,
            score,
            issues: vec![],
            details: String::new(),
        }
    }

    #[test]
    fn compose_weights_match_spec() {
        let dims = QualityDimension::ALL
            .iter()
            .map(|d| dim(*d, 1.0))
            .collect::<Vec<_>>();
        let report = QualityReport::compose(dims, vec![]);
        assert!((report.overall - 1.0).abs() < 1e-6);
        assert_eq!(report.rating, QualityRating::Excellent);
    }

    #[test]
    fn rating_bands_match_spec_thresholds() {
        assert_eq!(QualityRating::from_overall(0.96), QualityRating::Excellent);
        assert_eq!(QualityRating::from_overall(0.85), QualityRating::Good);
        assert_eq!(QualityRating::from_overall(0.70), QualityRating::Acceptable);
        assert_eq!(QualityRating::from_overall(0.69), QualityRating::NeedsReview);
    }

    #[test]
    fn all_issues_sorted_critical_first() {
        let mut d1 = dim(QualityDimension::Completeness, 0.5);
        d1.issues.push(QualityIssue::new(IssueSeverity::Minor, "completeness", "a"));
        let mut d2 = dim(QualityDimension::Accuracy, 0.6);
        d2.issues.push(QualityIssue::new(IssueSeverity::Critical, "accuracy", "b"));
        let report = QualityReport::compose(vec![d1, d2], vec![]);
        let issues = report.all_issues();
        assert_eq!(issues[0].severity, IssueSeverity::Critical);
    }

    #[test]
    fn lowest_scoring_picks_minimum() {
        let dims = vec![
            dim(QualityDimension::Completeness, 0.9),
            dim(QualityDimension::Accuracy, 0.4),
            dim(QualityDimension::Consistency, 0.8),
        ];
        let report = QualityReport::compose(dims, vec![]);
        assert_eq!(report.lowest_scoring().unwrap().dimension, QualityDimension::Accuracy);
    }
}
