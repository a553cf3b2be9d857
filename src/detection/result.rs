use super::trigger::TriggerSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a detection result came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Parsed from the webhook response
    Remote,
    /// Produced locally by the random generator
    Simulated { reason: String },
}

impl Provenance {
    pub fn is_simulated(&self) -> bool {
        matches!(self, Provenance::Simulated { .. })
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Remote => write!(f, "remote"),
            Provenance::Simulated { reason } => write!(f, "simulated: {}", reason),
        }
    }
}

/// Raw verdict before it is turned into a user-facing result
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub has_injury: bool,
    pub confidence: f64,
    pub injury_type: String,
}

impl Assessment {
    pub fn new(has_injury: bool, confidence: f64, injury_type: impl Into<String>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            has_injury,
            confidence,
            injury_type: injury_type.into(),
        }
    }
}

/// Outcome of one capture-and-analyze cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub has_injury: bool,
    pub confidence: f64,
    pub injury_type: String,
    pub message: String,
    pub provenance: Provenance,
    pub source: TriggerSource,
    pub completed_at: DateTime<Utc>,
}

impl DetectionResult {
    pub fn remote(assessment: Assessment, source: TriggerSource) -> Self {
        Self::build(assessment, Provenance::Remote, source)
    }

    pub fn simulated(
        assessment: Assessment,
        source: TriggerSource,
        reason: impl Into<String>,
    ) -> Self {
        Self::build(
            assessment,
            Provenance::Simulated {
                reason: reason.into(),
            },
            source,
        )
    }

    fn build(assessment: Assessment, provenance: Provenance, source: TriggerSource) -> Self {
        let message = describe(&assessment, &provenance);
        Self {
            has_injury: assessment.has_injury,
            confidence: assessment.confidence,
            injury_type: assessment.injury_type,
            message,
            provenance,
            source,
            completed_at: Utc::now(),
        }
    }
}

fn percent(fraction: f64) -> i64 {
    (fraction * 100.0).trunc() as i64
}

fn describe(assessment: &Assessment, provenance: &Provenance) -> String {
    if assessment.has_injury {
        return format!(
            "Injury detected: {} (Confidence: {}%)",
            assessment.injury_type,
            percent(assessment.confidence)
        );
    }

    match provenance {
        Provenance::Remote => "No injury detected".to_string(),
        Provenance::Simulated { .. } => format!(
            "No injury detected (Confidence: {}%)",
            percent(1.0 - assessment.confidence)
        ),
    }
}
