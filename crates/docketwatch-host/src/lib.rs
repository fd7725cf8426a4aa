//! Processing runtime: in-flight guard, side-effect pipeline, run orchestrator, scheduler.

pub mod guard;
pub mod orchestrator;
pub mod pipeline;
pub mod runtime;
pub mod scheduler;

#[cfg(any(test, feature = "test-util"))]
pub mod fakes;

pub use guard::{InFlightGuard, InFlightPermit};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorParts, Sources};
pub use pipeline::{Collaborators, PipelineReport, SideEffectPipeline, Step, StepStatus};
pub use runtime::RuntimeState;
pub use scheduler::{Cadence, Scheduler};
