//! Curtain storage adapters.
//!
//! Implements the [`sequencer::VisitStore`] trait twice:
//!
//! - [`MemoryStore`]: process-local map, used by tests and one-off simulations.
//! - [`FileStore`]: JSON file on disk, so the visit flag survives between runs
//!   of the terminal host the way `localStorage` survives page loads.
//!
//! The browser's `localStorage` adapter lives in the `web` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** File layout, atomic writes, and I/O error mapping all
//! live here. The [`sequencer`] crate sees only [`sequencer::VisitStore`] and
//! [`sequencer::StorageError`].

pub mod file;
pub mod memory;

pub use file::{FileStore, StoredEntry};
pub use memory::MemoryStore;
