//! Reveal domain for Curtain.
//!
//! This crate contains the loading-overlay state machine, its identifiers and
//! value types, the error types, and the port traits hosts implement. Adapter
//! crates implement the ports; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; adapter crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ElementId`, `StorageKey`, `TimerHandle`, etc.) |
//! | [`types`] | Value types (`OverlayState`, `Route`, `Timings`, `Transition`, etc.) |
//! | [`errors`] | `StorageError` and `CurtainError` |
//! | [`ports`] | `VisitStore`, `Surface`, `Scheduler`, `AnimationHooks` |
//! | [`machine`] | The `Sequencer` state machine |

pub mod errors;
pub mod identifiers;
pub mod machine;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{CurtainError, StorageError};
pub use identifiers::{ClassName, ElementId, SessionId, StorageKey, TimerHandle};
pub use machine::{read_visit_flag, reset_visit_flag, Sequencer, SequencerSettings};
pub use ports::{AnimationHooks, NoHooks, Scheduler, Surface, VisitStore};
pub use types::{
    default_visit_key, is_visited_value, DomContract, InitOutcome, OverlayState, Route,
    SequencerEvent, StyleClasses, TimerKind, Timings, Timestamp, Transition, Trigger,
    VISITED_VALUE, VISIT_FLAG_KEY,
};
