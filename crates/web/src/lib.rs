#![forbid(unsafe_code)]

//! Browser host for the curtain reveal sequencer.
//!
//! On `wasm32` this crate supplies the four sequencer ports on top of the
//! page it is loaded into:
//!
//! - `LocalStore`: `window.localStorage`;
//! - `DomSurface`: elements looked up by id, classes via `classList`,
//!   visibility via inline `display: none`;
//! - `WindowScheduler`: `setTimeout` / `clearTimeout`;
//! - `GlobalHooks`: the page's optional `initMatrixLoader()` and
//!   `cleanupMatrix()` globals.
//!
//! The page calls the exported `startRevealSequencer()` once the document
//! has loaded. It returns a handle that keeps the click listener and the
//! sequencer alive.

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::{
    start_reveal_sequencer, DomSurface, GlobalHooks, LocalStore, RevealHandle, WindowScheduler,
};

use std::cell::RefCell;
use std::time::Duration;

/// Name of the global the page may define to start the loader animation.
pub const INIT_HOOK: &str = "initMatrixLoader";

/// Name of the global the page may define to tear the loader animation down.
pub const CLEANUP_HOOK: &str = "cleanupMatrix";

/// Converts a delay into the millisecond argument `setTimeout` accepts,
/// saturating at `i32::MAX`.
pub fn timeout_millis(delay: Duration) -> i32 {
    i32::try_from(delay.as_millis()).unwrap_or(i32::MAX)
}

/// Time elapsed between two `Date.now()` readings. A clock that stepped
/// backwards reads as zero.
pub fn elapsed_between(origin_ms: f64, now_ms: f64) -> Duration {
    let delta = now_ms - origin_ms;
    if delta.is_finite() && delta > 0.0 {
        Duration::from_secs_f64(delta / 1000.0)
    } else {
        Duration::ZERO
    }
}

/// Runs `f` on the value unless it is already borrowed.
///
/// Page hooks run while the sequencer is mutably borrowed; a hook that
/// calls back into the handle gets `None` instead of a panic.
pub fn with_idle<T, R>(cell: &RefCell<T>, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    cell.try_borrow_mut().ok().map(|mut value| f(&mut value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_whole_milliseconds() {
        assert_eq!(timeout_millis(Duration::from_millis(600)), 600);
        assert_eq!(timeout_millis(Duration::from_micros(1_999)), 1);
        assert_eq!(timeout_millis(Duration::from_secs(u64::MAX)), i32::MAX);
    }

    #[test]
    fn elapsed_never_goes_negative() {
        assert_eq!(elapsed_between(1_000.0, 1_250.0), Duration::from_millis(250));
        assert_eq!(elapsed_between(1_000.0, 900.0), Duration::ZERO);
        assert_eq!(elapsed_between(1_000.0, f64::NAN), Duration::ZERO);
    }

    #[test]
    fn busy_cell_is_skipped_instead_of_panicking() {
        let cell = RefCell::new(1);

        {
            let _held = cell.borrow_mut();
            assert_eq!(with_idle(&cell, |v| *v += 1), None);
        }
        let after = with_idle(&cell, |v| {
            *v += 1;
            *v
        });
        assert_eq!(after, Some(2));
    }
}
