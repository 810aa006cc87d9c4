//! Port traits implemented by host adapters.
//!
//! The sequencer needs four things from its host: a persistent key-value
//! store, a document whose elements it can restyle, a way to schedule
//! callbacks, and optional animation hooks. Each is a trait here; the
//! `storage`, `timers` and `web` crates supply implementations.
//!
//! All ports are synchronous and take `&mut self`: the host runs a single
//! cooperative event loop and delivers timer callbacks one at a time.

use std::time::Duration;

use crate::{ClassName, ElementId, StorageError, StorageKey, TimerHandle, TimerKind};

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Persistent string key-value store (browser `localStorage` or equivalent).
pub trait VisitStore {
    /// Returns the stored value for `key`, or `None` when unset.
    fn get(&self, key: &StorageKey) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &StorageKey, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&mut self, key: &StorageKey) -> Result<(), StorageError>;
}

impl<T: VisitStore + ?Sized> VisitStore for &mut T {
    fn get(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &StorageKey, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &StorageKey) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// The rendered document, addressed by element id.
///
/// Operations on an absent element are silent no-ops; callers check
/// [`Surface::contains`] when presence matters.
pub trait Surface {
    /// Returns `true` if an element with `id` exists.
    fn contains(&self, id: &ElementId) -> bool;

    /// Adds `class` to the element's class list.
    fn add_class(&mut self, id: &ElementId, class: &ClassName);

    /// Removes `class` from the element's class list.
    fn remove_class(&mut self, id: &ElementId, class: &ClassName);

    /// Shows or removes the element from the rendered surface
    /// (`display: none` in a browser).
    fn set_visible(&mut self, id: &ElementId, visible: bool);

    /// Returns `true` if the element exists and is rendered.
    fn is_visible(&self, id: &ElementId) -> bool;
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// Cooperative timer scheduler.
///
/// The scheduler only records requests. The host delivers each elapsed timer
/// back to the sequencer as [`crate::SequencerEvent::TimerFired`].
pub trait Scheduler {
    /// Current time on the scheduler's clock, measured from its origin.
    fn now(&self) -> Duration;

    /// Arranges for `kind` to fire `delay` after [`Scheduler::now`].
    fn schedule(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle;

    /// Cancels a pending timer. Cancelling an elapsed or unknown handle is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

// ---------------------------------------------------------------------------
// Animation hooks
// ---------------------------------------------------------------------------

/// Optional external animation collaborator.
///
/// Both methods return `true` if the hook existed and was invoked. Absent
/// hooks never block the sequencer.
pub trait AnimationHooks {
    /// Starts the loader's background animation.
    fn init_loader(&mut self) -> bool {
        false
    }

    /// Tears the loader animation down once the overlay is gone.
    fn cleanup(&mut self) -> bool {
        false
    }
}

/// Host without any animation hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl AnimationHooks for NoHooks {}
