pub mod mock;
mod reporter;
mod result;
mod temp;
mod trigger;
mod webhook;
#[cfg(test)]
mod tests;

pub use reporter::{DetectionReporter, ReporterParts, ReporterState};
pub use result::{Assessment, DetectionResult, Provenance};
pub use temp::TempJpeg;
pub use trigger::{TriggerOutcome, TriggerSource};
pub use webhook::{parse_response, AnalysisRequest, InjuryAnalyzer, ProbeReport, WebhookClient};
