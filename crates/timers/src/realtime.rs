//! Wall-clock driver on the tokio runtime.
//!
//! [`RealtimeDriver`] maps the [`TimerQueue`]'s virtual clock onto
//! [`tokio::time::Instant`]: the queue's origin is the instant the driver
//! starts. Elapsed timers and host input are delivered from a single task,
//! so the sequencer is never touched concurrently.

use std::time::Duration;

use sequencer::{AnimationHooks, Route, Sequencer, SequencerEvent, Surface, VisitStore};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::TimerQueue;

/// Input the host forwards to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostInput {
    /// The user clicked the overlay.
    Click,
    /// Stop driving immediately.
    Shutdown,
}

/// When [`RealtimeDriver::run`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopCondition {
    /// As soon as the overlay reaches its terminal state.
    #[default]
    OverlayHidden,
    /// Only once no timers remain (the fallback included).
    TimersDrained,
}

/// Why the driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The overlay reached its terminal state.
    OverlayHidden,
    /// Nothing was left to wait for.
    TimersDrained,
    /// The host asked to stop.
    Shutdown,
}

/// Drives a [`Sequencer`] in real time.
pub struct RealtimeDriver<S, D, H> {
    sequencer: Sequencer<S, D, TimerQueue, H>,
    stop: StopCondition,
}

impl<S, D, H> RealtimeDriver<S, D, H>
where
    S: VisitStore,
    D: Surface,
    H: AnimationHooks,
{
    /// Wraps a sequencer that has not been initialised yet.
    pub fn new(sequencer: Sequencer<S, D, TimerQueue, H>) -> Self {
        Self {
            sequencer,
            stop: StopCondition::default(),
        }
    }

    /// Chooses when [`RealtimeDriver::run`] returns.
    pub fn stop_when(mut self, stop: StopCondition) -> Self {
        self.stop = stop;
        self
    }

    /// Initialises the sequencer for `route` and delivers timers and input
    /// until the stop condition is met.
    ///
    /// A closed input channel is not a shutdown request; the driver keeps
    /// delivering timers.
    pub async fn run(
        &mut self,
        route: &Route,
        mut inputs: mpsc::Receiver<HostInput>,
    ) -> StopReason {
        let origin = Instant::now();
        let outcome = self.sequencer.initialize(route);
        info!(?outcome, route = %route, "sequencer initialised");

        let mut inputs_open = true;
        loop {
            if let Some(reason) = self.should_stop() {
                return reason;
            }
            let Some(due) = self.sequencer.scheduler().next_due() else {
                return StopReason::TimersDrained;
            };

            tokio::select! {
                _ = sleep_until(origin + due) => {
                    self.deliver_due(due);
                }
                input = inputs.recv(), if inputs_open => match input {
                    Some(HostInput::Click) => {
                        self.sequencer.scheduler_mut().advance_to(origin.elapsed());
                        self.sequencer.advance(SequencerEvent::Click);
                    }
                    Some(HostInput::Shutdown) => {
                        info!("shutdown requested");
                        return StopReason::Shutdown;
                    }
                    None => {
                        debug!("input channel closed; timers only");
                        inputs_open = false;
                    }
                },
            }
        }
    }

    /// The driven sequencer.
    pub fn sequencer(&self) -> &Sequencer<S, D, TimerQueue, H> {
        &self.sequencer
    }

    /// Consumes the driver, returning the sequencer.
    pub fn into_sequencer(self) -> Sequencer<S, D, TimerQueue, H> {
        self.sequencer
    }

    fn deliver_due(&mut self, deadline: Duration) {
        while let Some(fired) = self.sequencer.scheduler_mut().pop_due(deadline) {
            self.sequencer
                .advance(SequencerEvent::TimerFired(fired.kind));
        }
    }

    fn should_stop(&self) -> Option<StopReason> {
        match self.stop {
            StopCondition::OverlayHidden => self
                .sequencer
                .state()
                .filter(|s| s.is_terminal())
                .map(|_| StopReason::OverlayHidden),
            StopCondition::TimersDrained => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySurface;
    use pretty_assertions::assert_eq;
    use sequencer::{OverlayState, Scheduler, SequencerSettings};
    use storage::MemoryStore;

    fn driver() -> RealtimeDriver<MemoryStore, MemorySurface, sequencer::NoHooks> {
        let settings = SequencerSettings::default();
        let surface = MemorySurface::with_contract(&settings.dom);
        RealtimeDriver::new(Sequencer::new(MemoryStore::new(), surface, TimerQueue::new()))
    }

    fn times(d: &RealtimeDriver<MemoryStore, MemorySurface, sequencer::NoHooks>) -> Vec<(OverlayState, u128)> {
        d.sequencer()
            .journal()
            .iter()
            .map(|t| (t.to, t.at.as_millis()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn auto_start_completes_without_input() {
        let (_tx, rx) = mpsc::channel(4);
        let mut d = driver();

        let reason = d.run(&Route::new("/"), rx).await;

        assert_eq!(reason, StopReason::OverlayHidden);
        assert_eq!(
            times(&d),
            vec![
                (OverlayState::Shown, 0),
                (OverlayState::Exploding, 20_000),
                (OverlayState::Revealed, 20_800),
                (OverlayState::Hidden, 21_900),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn click_starts_transition_at_click_time() {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            tx.send(HostInput::Click).await.ok();
        });
        let mut d = driver();

        d.run(&Route::new("/"), rx).await;

        assert_eq!(
            times(&d),
            vec![
                (OverlayState::Shown, 0),
                (OverlayState::Exploding, 5_000),
                (OverlayState::Revealed, 5_800),
                (OverlayState::Hidden, 6_900),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn draining_waits_for_the_fallback() {
        let (tx, rx) = mpsc::channel(4);
        drop(tx);
        let mut d = driver().stop_when(StopCondition::TimersDrained);

        let reason = d.run(&Route::new("/"), rx).await;

        assert_eq!(reason, StopReason::TimersDrained);
        assert_eq!(d.sequencer().scheduler().now(), Duration::from_secs(25));
        assert_eq!(d.sequencer().state(), Some(OverlayState::Hidden));
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_route_returns_immediately() {
        let (_tx, rx) = mpsc::channel(1);
        let mut d = driver();

        let reason = d.run(&Route::new("/about.html"), rx).await;

        assert_eq!(reason, StopReason::OverlayHidden);
        assert_eq!(d.sequencer().journal().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_driver() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(HostInput::Shutdown).await.unwrap();
        let mut d = driver();

        let reason = d.run(&Route::new("/"), rx).await;

        assert_eq!(reason, StopReason::Shutdown);
        assert_eq!(d.sequencer().state(), Some(OverlayState::Shown));
    }
}
