//! The reveal state machine.
//!
//! [`Sequencer`] owns its ports and exposes a single event entry point,
//! [`Sequencer::advance`]. Every state change schedules the timer for the
//! next step through the injected [`Scheduler`]; the host feeds elapsed
//! timers back in as [`SequencerEvent::TimerFired`].
//!
//! ```text
//!            click / auto-start            +emphasis         +content_reveal
//!   Shown ─────────────────────▶ Exploding ─────────▶ (fade) ───────────────▶ Revealed
//!     │                              │                  │  +overlay_removal      │
//!     │                              │                  └──────────────────────▶ Hidden
//!     └──────────── fallback ────────┴────────────────────────────────────────▶ Hidden
//! ```
//!
//! Guarantees:
//!
//! - the transition body runs at most once per `initialize`, no matter how
//!   many clicks or auto-start timers arrive;
//! - the overlay reaches `Hidden` at the latest when the fallback fires;
//! - the cleanup hook runs at most once.

use tracing::{debug, info, warn, Span};

use crate::{
    is_visited_value, AnimationHooks, DomContract, ElementId, InitOutcome, NoHooks, OverlayState,
    Route, Scheduler, SessionId, StorageError, StorageKey, StyleClasses, Surface, TimerHandle,
    TimerKind, Timings, Transition, Trigger, VisitStore, VISITED_VALUE,
};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything about a sequencer that is not a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerSettings {
    /// Delays for the timers.
    pub timings: Timings,
    /// Element ids on the host document.
    pub dom: DomContract,
    /// CSS classes toggled during the transition.
    pub classes: StyleClasses,
    /// Storage key of the visit flag.
    pub visit_key: StorageKey,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            timings: Timings::default(),
            dom: DomContract::default(),
            classes: StyleClasses::default(),
            visit_key: crate::default_visit_key(),
        }
    }
}

// ---------------------------------------------------------------------------
// Visit flag helpers
// ---------------------------------------------------------------------------

/// Clears the persisted visit flag so the next `initialize` on the entry
/// route is treated as a first visit.
pub fn reset_visit_flag<S: VisitStore + ?Sized>(
    store: &mut S,
    key: &StorageKey,
) -> Result<(), StorageError> {
    store.remove(key)?;
    info!(key = %key, "visit flag cleared");
    Ok(())
}

/// Reads the persisted visit flag, propagating storage failures.
pub fn read_visit_flag<S: VisitStore + ?Sized>(
    store: &S,
    key: &StorageKey,
) -> Result<bool, StorageError> {
    let raw = store.get(key)?;
    Ok(is_visited_value(raw.as_deref()))
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Loading-overlay reveal sequencer.
///
/// Generic over its ports: `S` persists the visit flag, `D` is the document,
/// `T` schedules timers and `H` provides the optional animation hooks.
pub struct Sequencer<S, D, T, H = NoHooks> {
    session: SessionId,
    span: Span,
    settings: SequencerSettings,

    store: S,
    surface: D,
    scheduler: T,
    hooks: H,

    outcome: Option<InitOutcome>,
    state: Option<OverlayState>,
    started: bool,
    content_revealed: bool,
    cleaned_up: bool,

    auto_start: Option<TimerHandle>,
    fallback: Option<TimerHandle>,
    cascade: Vec<(TimerKind, TimerHandle)>,

    journal: Vec<Transition>,
}

impl<S, D, T> Sequencer<S, D, T, NoHooks>
where
    S: VisitStore,
    D: Surface,
    T: Scheduler,
{
    /// Creates a sequencer with default settings and no animation hooks.
    pub fn new(store: S, surface: D, scheduler: T) -> Self {
        let session = SessionId::new_random();
        Self {
            session,
            span: tracing::info_span!("sequencer", session = %session),
            settings: SequencerSettings::default(),
            store,
            surface,
            scheduler,
            hooks: NoHooks,
            outcome: None,
            state: None,
            started: false,
            content_revealed: false,
            cleaned_up: false,
            auto_start: None,
            fallback: None,
            cascade: Vec::new(),
            journal: Vec::new(),
        }
    }
}

impl<S, D, T, H> Sequencer<S, D, T, H>
where
    S: VisitStore,
    D: Surface,
    T: Scheduler,
    H: AnimationHooks,
{
    /// Replaces the animation hooks.
    pub fn with_hooks<H2: AnimationHooks>(self, hooks: H2) -> Sequencer<S, D, T, H2> {
        Sequencer {
            session: self.session,
            span: self.span,
            settings: self.settings,
            store: self.store,
            surface: self.surface,
            scheduler: self.scheduler,
            hooks,
            outcome: self.outcome,
            state: self.state,
            started: self.started,
            content_revealed: self.content_revealed,
            cleaned_up: self.cleaned_up,
            auto_start: self.auto_start,
            fallback: self.fallback,
            cascade: self.cascade,
            journal: self.journal,
        }
    }

    /// Replaces the settings. Takes effect at the next `initialize`.
    pub fn with_settings(mut self, settings: SequencerSettings) -> Self {
        self.settings = settings;
        self
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Decides whether to show the overlay for `route`.
    ///
    /// - Overlay element missing: nothing happens ([`InitOutcome::Inactive`]).
    /// - Not the entry route, or already visited: the overlay is hidden and the
    ///   content revealed synchronously, no timers ([`InitOutcome::Skipped`]).
    /// - Otherwise the visit flag is written, the overlay shown, the loader
    ///   hook invoked, and the auto-start and fallback timers armed
    ///   ([`InitOutcome::Shown`]).
    ///
    /// Calling it again starts a fresh cycle: pending timers are cancelled
    /// and the once-only guards reset.
    pub fn initialize(&mut self, route: &Route) -> InitOutcome {
        let span = self.span.clone();
        let _enter = span.enter();

        if self.outcome.is_some() {
            debug!("re-initialising; pending timers cancelled");
            self.cancel_all();
            self.started = false;
            self.content_revealed = false;
            self.cleaned_up = false;
            self.state = None;
            self.clear_classes();
        }

        let loader = self.settings.dom.loader.clone();
        if !self.surface.contains(&loader) {
            debug!(element = %loader, "overlay element absent; sequencer inactive");
            self.state = None;
            return self.finish_init(InitOutcome::Inactive);
        }

        let visited = match read_visit_flag(&self.store, &self.settings.visit_key) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "could not read visit flag; treating as first visit");
                false
            }
        };

        if !route.is_entry() || visited {
            info!(route = %route, visited, "overlay skipped");
            self.surface.set_visible(&loader, false);
            self.reveal_content();
            self.enter(OverlayState::Hidden, Trigger::Initialize);
            return self.finish_init(InitOutcome::Skipped);
        }

        if let Err(e) = self.store.set(&self.settings.visit_key, VISITED_VALUE) {
            warn!(error = %e, "could not persist visit flag");
        }

        self.surface.set_visible(&loader, true);
        let content = self.settings.dom.content.clone();
        self.surface.set_visible(&content, false);
        self.enter(OverlayState::Shown, Trigger::Initialize);

        if self.hooks.init_loader() {
            debug!("loader animation hook invoked");
        }

        let timings = self.settings.timings;
        self.auto_start = Some(self.schedule(timings.auto_start, TimerKind::AutoStart));
        self.fallback = Some(self.schedule(timings.fallback, TimerKind::Fallback));

        self.finish_init(InitOutcome::Shown)
    }

    /// Single entry point for everything that happens after `initialize`.
    ///
    /// Events that do not apply to the current state are ignored.
    pub fn advance(&mut self, event: crate::SequencerEvent) {
        let span = self.span.clone();
        let _enter = span.enter();

        if self.state.is_none() {
            debug!(?event, "sequencer inactive; event ignored");
            return;
        }

        match event {
            crate::SequencerEvent::Click => {
                self.begin(Trigger::Click);
            }
            crate::SequencerEvent::TimerFired(TimerKind::AutoStart) => {
                self.auto_start = None;
                self.begin(Trigger::Timer(TimerKind::AutoStart));
            }
            crate::SequencerEvent::TimerFired(TimerKind::Fallback) => {
                self.fallback = None;
                self.force_hidden();
            }
            crate::SequencerEvent::TimerFired(kind) => {
                if !self.take_cascade(kind) {
                    debug!(?kind, "stale cascade timer ignored");
                    return;
                }
                match kind {
                    TimerKind::Emphasis => self.on_emphasis_done(),
                    TimerKind::ContentReveal => self.on_content_reveal(),
                    TimerKind::OverlayRemoval => self.on_overlay_removal(),
                    TimerKind::AutoStart | TimerKind::Fallback => {}
                }
            }
        }
    }

    /// Starts the transition on behalf of the host.
    ///
    /// Returns `true` if this call started it; later calls are no-ops.
    pub fn start_transition(&mut self) -> bool {
        let span = self.span.clone();
        let _enter = span.enter();
        self.begin(Trigger::Host)
    }

    /// Clears the persisted visit flag. The current overlay state is untouched.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        reset_visit_flag(&mut self.store, &self.settings.visit_key)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Current overlay state; `None` before `initialize` or when inactive.
    pub fn state(&self) -> Option<OverlayState> {
        self.state
    }

    /// Outcome of the most recent `initialize`.
    pub fn outcome(&self) -> Option<InitOutcome> {
        self.outcome
    }

    /// Returns `true` once the transition body has run.
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Returns `true` once the content element has been revealed.
    pub fn is_content_revealed(&self) -> bool {
        self.content_revealed
    }

    /// Every state change so far, oldest first.
    pub fn journal(&self) -> &[Transition] {
        &self.journal
    }

    /// Identifier of this sequencer's session.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// The settings in force.
    pub fn settings(&self) -> &SequencerSettings {
        &self.settings
    }

    /// The storage port.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The document port.
    pub fn surface(&self) -> &D {
        &self.surface
    }

    /// The scheduler port.
    pub fn scheduler(&self) -> &T {
        &self.scheduler
    }

    /// Mutable access to the scheduler, used by drivers to pop elapsed timers.
    pub fn scheduler_mut(&mut self) -> &mut T {
        &mut self.scheduler
    }

    /// The animation hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Consumes the sequencer, returning its ports.
    pub fn into_parts(self) -> (S, D, T, H) {
        (self.store, self.surface, self.scheduler, self.hooks)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn begin(&mut self, trigger: Trigger) -> bool {
        if self.started || self.state != Some(OverlayState::Shown) {
            debug!(?trigger, "transition already triggered; ignored");
            return false;
        }
        self.started = true;

        if let Some(handle) = self.auto_start.take() {
            self.scheduler.cancel(handle);
        }

        let dom = self.settings.dom.clone();
        self.surface
            .add_class(&dom.loader, &self.settings.classes.emphasis);
        self.surface.set_visible(&dom.typing_text, false);
        self.surface.set_visible(&dom.pulsing_light, false);
        self.enter(OverlayState::Exploding, trigger);

        let handle = self.schedule(self.settings.timings.emphasis, TimerKind::Emphasis);
        self.cascade.push((TimerKind::Emphasis, handle));
        true
    }

    fn on_emphasis_done(&mut self) {
        if self.state != Some(OverlayState::Exploding) {
            return;
        }
        let loader = self.settings.dom.loader.clone();
        self.surface
            .add_class(&loader, &self.settings.classes.revealing);
        debug!("overlay fading out");

        let timings = self.settings.timings;
        let reveal = self.schedule(timings.content_reveal, TimerKind::ContentReveal);
        self.cascade.push((TimerKind::ContentReveal, reveal));
        let removal = self.schedule(timings.overlay_removal, TimerKind::OverlayRemoval);
        self.cascade.push((TimerKind::OverlayRemoval, removal));
    }

    fn on_content_reveal(&mut self) {
        if self.state != Some(OverlayState::Exploding) {
            return;
        }
        self.reveal_content();
        self.enter(
            OverlayState::Revealed,
            Trigger::Timer(TimerKind::ContentReveal),
        );
    }

    fn on_overlay_removal(&mut self) {
        if !matches!(
            self.state,
            Some(OverlayState::Exploding | OverlayState::Revealed)
        ) {
            return;
        }
        self.hide_overlay();
        self.enter(
            OverlayState::Hidden,
            Trigger::Timer(TimerKind::OverlayRemoval),
        );
    }

    fn force_hidden(&mut self) {
        let loader = self.settings.dom.loader.clone();
        let terminal = self.state.is_some_and(OverlayState::is_terminal);
        if terminal && !self.surface.is_visible(&loader) {
            debug!("fallback: overlay already hidden");
            return;
        }

        warn!(state = ?self.state, "fallback forcing overlay hidden");
        self.started = true;
        self.cancel_all();
        self.hide_overlay();
        if !terminal {
            self.enter(OverlayState::Hidden, Trigger::Timer(TimerKind::Fallback));
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn hide_overlay(&mut self) {
        let loader = self.settings.dom.loader.clone();
        self.surface.set_visible(&loader, false);
        if !self.content_revealed {
            self.reveal_content();
        }
        if !self.cleaned_up {
            self.cleaned_up = true;
            if self.hooks.cleanup() {
                debug!("cleanup hook invoked");
            }
        }
    }

    fn clear_classes(&mut self) {
        let dom = &self.settings.dom;
        let classes = &self.settings.classes;
        self.surface.remove_class(&dom.loader, &classes.emphasis);
        self.surface.remove_class(&dom.loader, &classes.revealing);
        self.surface.remove_class(&dom.content, &classes.revealed);
        self.surface.set_visible(&dom.typing_text, true);
        self.surface.set_visible(&dom.pulsing_light, true);
    }

    fn reveal_content(&mut self) {
        let content: ElementId = self.settings.dom.content.clone();
        self.surface.set_visible(&content, true);
        self.surface
            .add_class(&content, &self.settings.classes.revealed);
        self.content_revealed = true;
    }

    fn enter(&mut self, to: OverlayState, trigger: Trigger) {
        let from = self.state;
        let at = self.scheduler.now();
        info!(?from, %to, ?trigger, at_ms = at.as_millis() as u64, "overlay state changed");
        self.state = Some(to);
        self.journal.push(Transition {
            from,
            to,
            at,
            trigger,
        });
    }

    fn schedule(&mut self, delay: std::time::Duration, kind: TimerKind) -> TimerHandle {
        let handle = self.scheduler.schedule(delay, kind);
        debug!(?kind, delay_ms = delay.as_millis() as u64, %handle, "timer scheduled");
        handle
    }

    fn take_cascade(&mut self, kind: TimerKind) -> bool {
        match self.cascade.iter().position(|(k, _)| *k == kind) {
            Some(index) => {
                self.cascade.remove(index);
                true
            }
            None => false,
        }
    }

    fn cancel_all(&mut self) {
        let handles = self
            .auto_start
            .take()
            .into_iter()
            .chain(self.fallback.take())
            .chain(self.cascade.drain(..).map(|(_, h)| h))
            .collect::<Vec<_>>();
        for handle in handles {
            self.scheduler.cancel(handle);
        }
    }

    fn finish_init(&mut self, outcome: InitOutcome) -> InitOutcome {
        self.outcome = Some(outcome);
        outcome
    }
}

impl<S, D, T, H> std::fmt::Debug for Sequencer<S, D, T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("session", &self.session)
            .field("outcome", &self.outcome)
            .field("state", &self.state)
            .field("started", &self.started)
            .field("content_revealed", &self.content_revealed)
            .field("pending_cascade", &self.cascade.len())
            .finish_non_exhaustive()
    }
}
