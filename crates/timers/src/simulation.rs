//! Deterministic replay of a page load on the virtual clock.
//!
//! A [`Scenario`] names the route, when the user clicks, and how long to
//! watch. [`Simulation`] wires a [`Sequencer`] to a [`MemorySurface`] and a
//! [`TimerQueue`], delivers the clicks and timers in time order, and reports
//! the resulting journal.

use std::time::Duration;

use serde::Serialize;
use sequencer::{
    AnimationHooks, InitOutcome, OverlayState, Route, Sequencer, SequencerEvent,
    SequencerSettings, Transition, VisitStore,
};
use tracing::debug;

use crate::{MemorySurface, TimerQueue};

/// Input script for one simulated page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Route being loaded.
    pub route: Route,
    /// Times, from `initialize`, at which the user clicks the overlay.
    pub clicks: Vec<Duration>,
    /// How long to keep the clock running.
    pub horizon: Duration,
}

impl Scenario {
    /// A page load on `route` with no clicks, watched for 30 seconds.
    pub fn new(route: Route) -> Self {
        Self {
            route,
            clicks: Vec::new(),
            horizon: Duration::from_secs(30),
        }
    }

    /// Adds a click at `at`.
    pub fn click_at(mut self, at: Duration) -> Self {
        self.clicks.push(at);
        self
    }

    /// Sets how long to run.
    pub fn horizon(mut self, horizon: Duration) -> Self {
        self.horizon = horizon;
        self
    }
}

/// What a simulation observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    /// Result of `initialize`.
    pub outcome: InitOutcome,
    /// Overlay state when the horizon was reached.
    pub final_state: Option<OverlayState>,
    /// Whether the content element was revealed.
    pub content_revealed: bool,
    /// Every state change, oldest first.
    pub journal: Vec<Transition>,
    /// Timers still pending at the horizon.
    pub pending_timers: usize,
}

/// Headless host running a [`Sequencer`] on a virtual clock.
pub struct Simulation<S, H> {
    sequencer: Sequencer<S, MemorySurface, TimerQueue, H>,
}

impl<S, H> Simulation<S, H>
where
    S: VisitStore,
    H: AnimationHooks,
{
    /// Builds a simulation whose document contains every element of
    /// `settings.dom`.
    pub fn new(store: S, settings: SequencerSettings, hooks: H) -> Self {
        let surface = MemorySurface::with_contract(&settings.dom);
        Self::with_surface(store, surface, settings, hooks)
    }

    /// Builds a simulation on a caller-supplied document.
    pub fn with_surface(
        store: S,
        surface: MemorySurface,
        settings: SequencerSettings,
        hooks: H,
    ) -> Self {
        let sequencer = Sequencer::new(store, surface, TimerQueue::new())
            .with_hooks(hooks)
            .with_settings(settings);
        Self { sequencer }
    }

    /// Plays `scenario` from `initialize` to its horizon.
    pub fn run(&mut self, scenario: &Scenario) -> SimulationReport {
        let outcome = self.sequencer.initialize(&scenario.route);

        let mut clicks = scenario.clicks.clone();
        clicks.sort();
        for at in clicks.into_iter().filter(|at| *at <= scenario.horizon) {
            self.run_until(at);
            debug!(at_ms = at.as_millis() as u64, "simulated click");
            self.sequencer.advance(SequencerEvent::Click);
        }
        self.run_until(scenario.horizon);

        SimulationReport {
            outcome,
            final_state: self.sequencer.state(),
            content_revealed: self.sequencer.is_content_revealed(),
            journal: self.sequencer.journal().to_vec(),
            pending_timers: self.sequencer.scheduler().len(),
        }
    }

    /// Delivers every timer due up to `deadline` and parks the clock there.
    pub fn run_until(&mut self, deadline: Duration) {
        while let Some(fired) = self.sequencer.scheduler_mut().pop_due(deadline) {
            self.sequencer
                .advance(SequencerEvent::TimerFired(fired.kind));
        }
        self.sequencer.scheduler_mut().advance_to(deadline);
    }

    /// The sequencer under simulation.
    pub fn sequencer(&self) -> &Sequencer<S, MemorySurface, TimerQueue, H> {
        &self.sequencer
    }

    /// Consumes the simulation, returning the sequencer.
    pub fn into_sequencer(self) -> Sequencer<S, MemorySurface, TimerQueue, H> {
        self.sequencer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingHooks;
    use pretty_assertions::assert_eq;
    use sequencer::{Trigger, TimerKind};
    use storage::MemoryStore;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn clicks_after_horizon_are_dropped() {
        let mut sim = Simulation::new(
            MemoryStore::new(),
            SequencerSettings::default(),
            RecordingHooks::present(),
        );
        let scenario = Scenario::new(Route::new("/"))
            .click_at(ms(15_000))
            .horizon(ms(10_000));

        let report = sim.run(&scenario);

        assert_eq!(report.final_state, Some(OverlayState::Shown));
        assert_eq!(report.pending_timers, 2);
    }

    #[test]
    fn click_drives_cascade_from_click_time() {
        let mut sim = Simulation::new(
            MemoryStore::new(),
            SequencerSettings::default(),
            RecordingHooks::present(),
        );
        let report = sim.run(&Scenario::new(Route::new("/index.html")).click_at(ms(3_000)));

        let summary: Vec<_> = report
            .journal
            .iter()
            .map(|t| (t.to, t.at, t.trigger))
            .collect();
        assert_eq!(
            summary,
            vec![
                (OverlayState::Shown, ms(0), Trigger::Initialize),
                (OverlayState::Exploding, ms(3_000), Trigger::Click),
                (
                    OverlayState::Revealed,
                    ms(3_800),
                    Trigger::Timer(TimerKind::ContentReveal)
                ),
                (
                    OverlayState::Hidden,
                    ms(4_900),
                    Trigger::Timer(TimerKind::OverlayRemoval)
                ),
            ]
        );
        assert_eq!(report.pending_timers, 0, "fallback fired as a no-op by 30s");
        assert_eq!(sim.sequencer().hooks().cleanup_calls, 1);
    }

    #[test]
    fn missing_hooks_do_not_block_the_reveal() {
        let mut sim = Simulation::new(
            MemoryStore::new(),
            SequencerSettings::default(),
            RecordingHooks::absent(),
        );

        let report = sim.run(&Scenario::new(Route::new("/")));

        assert_eq!(report.final_state, Some(OverlayState::Hidden));
        assert!(report.content_revealed);
        assert_eq!(sim.sequencer().hooks().init_calls, 0);
    }
}
