//! Curtain host drivers.
//!
//! This crate supplies everything a non-browser host needs to run a
//! [`sequencer::Sequencer`]: a virtual-clock [`TimerQueue`] implementing
//! [`sequencer::Scheduler`], a headless [`MemorySurface`], counting
//! [`RecordingHooks`], the deterministic [`Simulation`] runner, and the tokio
//! [`RealtimeDriver`].
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Drivers sequence events into the state machine
//! defined in the [`sequencer`] crate. They contain no domain rules of their
//! own: every decision about what a click or a timer means lives in
//! [`sequencer::Sequencer::advance`].

pub mod hooks;
pub mod queue;
pub mod realtime;
pub mod simulation;
pub mod surface;

pub use hooks::RecordingHooks;
pub use queue::{FiredTimer, TimerQueue};
pub use realtime::{HostInput, RealtimeDriver, StopCondition, StopReason};
pub use simulation::{Scenario, Simulation, SimulationReport};
pub use surface::{MemoryElement, MemorySurface};
