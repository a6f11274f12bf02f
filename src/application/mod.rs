//! Application layer: the orchestrator and its supervision loops.

mod orchestrator;
mod supervision;

pub use orchestrator::Orchestrator;
