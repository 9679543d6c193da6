/// Probing engine - decides what to check, checks it, and records the result
///
/// This module is responsible for:
/// - Classifying endpoint health from the latest measurement
/// - Executing HTTP probes with a hard timeout
/// - Running check cycles with a single retry and persisting them
/// - Selecting due endpoints and fanning out each tick
pub mod executor;
pub mod health;
pub mod runner;
pub mod scheduler;
pub mod tick;
pub mod types;

pub use executor::{HttpProber, Prober};
pub use health::{HealthStatus, classify};
pub use runner::{CheckRunner, CompletedCheck};
pub use tick::{TickOrchestrator, TickSummary};
pub use types::{FailureReason, ProbeOutcome};
