use serde::{Deserialize, Serialize};
use std::fmt;

/// What started a detection cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// A trigger phrase was heard
    Voice,
    /// Shutter press in injury mode
    Manual,
    /// Analysis of the last frame the pose pipeline processed, no still capture
    LatestFrame,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Voice => write!(f, "voice"),
            TriggerSource::Manual => write!(f, "manual"),
            TriggerSource::LatestFrame => write!(f, "latest frame"),
        }
    }
}

/// Answer to a trigger request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new cycle was started
    Started,
    /// A cycle is already running; the trigger was dropped
    Busy,
}
