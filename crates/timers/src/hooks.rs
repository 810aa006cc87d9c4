//! Animation hooks for headless hosts.

use serde::Serialize;
use sequencer::AnimationHooks;
use tracing::info;

/// Hooks that log and count their invocations.
///
/// With `present == false` the host behaves as if the page defined neither
/// hook, which is how a missing animation script is simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordingHooks {
    /// Whether the hooks exist on the host.
    pub present: bool,
    /// Number of `init_loader` invocations.
    pub init_calls: u32,
    /// Number of `cleanup` invocations.
    pub cleanup_calls: u32,
}

impl RecordingHooks {
    /// Hooks that exist on the host.
    pub fn present() -> Self {
        Self {
            present: true,
            init_calls: 0,
            cleanup_calls: 0,
        }
    }

    /// Hooks that are missing from the host.
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::present()
        }
    }
}

impl Default for RecordingHooks {
    fn default() -> Self {
        Self::present()
    }
}

impl AnimationHooks for RecordingHooks {
    fn init_loader(&mut self) -> bool {
        if !self.present {
            return false;
        }
        self.init_calls += 1;
        info!("loader animation started");
        true
    }

    fn cleanup(&mut self) -> bool {
        if !self.present {
            return false;
        }
        self.cleanup_calls += 1;
        info!("loader animation cleaned up");
        true
    }
}
