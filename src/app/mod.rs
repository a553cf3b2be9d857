mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::PosecamOrchestrator;
pub use runtime::dispatch_event;
pub use types::{ComponentState, ShutdownReason};
