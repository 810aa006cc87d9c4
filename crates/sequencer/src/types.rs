//! Shared value types for the reveal domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (timings are non-zero and ordered, routes
//! classify themselves) and participate in the state machine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ClassName, CurtainError, ElementId, StorageKey};

// ---------------------------------------------------------------------------
// Overlay state
// ---------------------------------------------------------------------------

/// Visual state of the full-screen overlay.
///
/// `Hidden` is terminal. A sequencer only ever moves forward through
/// `Shown → Exploding → Revealed → Hidden`; the fallback may jump from any
/// earlier state straight to `Hidden`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayState {
    /// The overlay covers the page, waiting for a click or the auto-start timer.
    Shown,
    /// The transition has begun: emphasis applied, dismissal under way.
    Exploding,
    /// The underlying content is visible while the overlay finishes fading.
    Revealed,
    /// The overlay is gone from the rendered surface.
    Hidden,
}

impl OverlayState {
    /// Returns `true` for the terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Hidden)
    }
}

impl std::fmt::Display for OverlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Shown => "shown",
            Self::Exploding => "exploding",
            Self::Revealed => "revealed",
            Self::Hidden => "hidden",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// The path component of the page being loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route(String);

impl Route {
    /// Wraps a path such as `"/"`, `"/index.html"` or `"/about.html"`.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Extracts the route from a location string, either a bare path or an
    /// absolute URL. Query strings and fragments are dropped.
    pub fn parse(input: &str) -> Result<Self, CurtainError> {
        let trimmed = input.trim();
        let invalid = |reason: &str| CurtainError::InvalidRoute {
            route: input.to_string(),
            reason: reason.to_string(),
        };
        if trimmed.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }

        let path = match trimmed.split_once("://") {
            Some((scheme, rest)) => {
                let scheme_ok = !scheme.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
                if !scheme_ok {
                    return Err(invalid("malformed URL scheme"));
                }
                match rest.find(|c: char| c == '/' || c == '?' || c == '#') {
                    Some(i) if rest[i..].starts_with('/') => &rest[i..],
                    _ => "/",
                }
            }
            None => trimmed,
        };

        let path = path.split(|c: char| c == '?' || c == '#').next().unwrap_or_default();
        Ok(Self::new(path))
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the site's home page: the path ends with
    /// `index.html`, is `/`, or is empty.
    pub fn is_entry(&self) -> bool {
        self.0.is_empty() || self.0 == "/" || self.0.ends_with("index.html")
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("<empty>")
        } else {
            f.write_str(&self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Timers and events
// ---------------------------------------------------------------------------

/// The timers a sequencer may schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Starts the transition if nobody clicked first.
    AutoStart,
    /// Forces the terminal state if the transition never finished.
    Fallback,
    /// End of the emphasis phase; the overlay starts to fade.
    Emphasis,
    /// The underlying content becomes visible.
    ContentReveal,
    /// The overlay is removed from the rendered surface.
    OverlayRemoval,
}

/// Input to [`crate::Sequencer::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "event", content = "timer", rename_all = "snake_case")]
pub enum SequencerEvent {
    /// The user clicked the overlay.
    Click,
    /// A previously scheduled timer elapsed.
    TimerFired(TimerKind),
}

/// What caused a state change, recorded in the [`Transition`] journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// `initialize` decided the starting state.
    Initialize,
    /// User click.
    Click,
    /// A timer fired.
    Timer(TimerKind),
    /// Direct call to `start_transition` by the host.
    Host,
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// State before the change; `None` for the initial decision.
    pub from: Option<OverlayState>,
    /// State after the change.
    pub to: OverlayState,
    /// Scheduler time at which the change happened.
    #[serde(with = "duration_millis")]
    pub at: Duration,
    /// What caused it.
    pub trigger: Trigger,
}

/// Result of [`crate::Sequencer::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitOutcome {
    /// The overlay element is missing; nothing was touched.
    Inactive,
    /// Not a first visit to the entry route: overlay hidden, content revealed.
    Skipped,
    /// First visit: overlay shown and timers armed.
    Shown,
}

// ---------------------------------------------------------------------------
// Timings
// ---------------------------------------------------------------------------

/// Delays driving the sequencer.
///
/// `content_reveal` and `overlay_removal` are measured from the end of the
/// emphasis phase, not from the click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    /// Delay from `initialize` to the automatic transition start.
    #[serde(with = "duration_millis")]
    pub auto_start: Duration,
    /// Delay from `initialize` to the safety-net fallback.
    #[serde(with = "duration_millis")]
    pub fallback: Duration,
    /// Length of the emphasis phase after the transition starts.
    #[serde(with = "duration_millis")]
    pub emphasis: Duration,
    /// Delay from the end of emphasis to the content becoming visible.
    #[serde(with = "duration_millis")]
    pub content_reveal: Duration,
    /// Delay from the end of emphasis to the overlay being removed.
    #[serde(with = "duration_millis")]
    pub overlay_removal: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            auto_start: Duration::from_secs(20),
            fallback: Duration::from_secs(25),
            emphasis: Duration::from_millis(600),
            content_reveal: Duration::from_millis(200),
            overlay_removal: Duration::from_millis(1300),
        }
    }
}

impl Timings {
    /// Checks the ordering constraints between the delays.
    ///
    /// - every delay is non-zero;
    /// - the fallback fires after auto-start;
    /// - content is revealed no later than the overlay is removed, so the two
    ///   animations overlap rather than leaving a blank frame.
    pub fn validate(&self) -> Result<(), CurtainError> {
        let named = [
            ("auto_start", self.auto_start),
            ("fallback", self.fallback),
            ("emphasis", self.emphasis),
            ("content_reveal", self.content_reveal),
            ("overlay_removal", self.overlay_removal),
        ];
        if let Some((name, _)) = named.iter().find(|(_, d)| d.is_zero()) {
            return Err(CurtainError::ConfigurationError {
                message: format!("timing '{name}' must be greater than zero"),
            });
        }
        if self.fallback <= self.auto_start {
            return Err(CurtainError::ConfigurationError {
                message: format!(
                    "fallback ({} ms) must be later than auto_start ({} ms)",
                    self.fallback.as_millis(),
                    self.auto_start.as_millis()
                ),
            });
        }
        if self.content_reveal > self.overlay_removal {
            return Err(CurtainError::ConfigurationError {
                message: format!(
                    "content_reveal ({} ms) must not exceed overlay_removal ({} ms)",
                    self.content_reveal.as_millis(),
                    self.overlay_removal.as_millis()
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Document contract
// ---------------------------------------------------------------------------

/// Element ids the sequencer looks up on the host document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomContract {
    /// The full-screen overlay. When absent the sequencer does nothing.
    pub loader: ElementId,
    /// Typed greeting inside the overlay, hidden once the transition starts.
    pub typing_text: ElementId,
    /// Pulsing click target inside the overlay, hidden once the transition starts.
    pub pulsing_light: ElementId,
    /// The page content revealed underneath.
    pub content: ElementId,
}

impl Default for DomContract {
    fn default() -> Self {
        Self {
            loader: element("loader"),
            typing_text: element("typing-text"),
            pulsing_light: element("pulsing-light"),
            content: element("website-content"),
        }
    }
}

/// CSS classes the sequencer toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleClasses {
    /// Scale/brightness emphasis applied when the transition starts.
    pub emphasis: ClassName,
    /// Applied to the overlay at the end of emphasis to start its fade.
    pub revealing: ClassName,
    /// Applied to the content element when it becomes visible.
    pub revealed: ClassName,
}

impl Default for StyleClasses {
    fn default() -> Self {
        Self {
            emphasis: class("exploding"),
            revealing: class("revealing"),
            revealed: class("revealed"),
        }
    }
}

fn element(id: &'static str) -> ElementId {
    ElementId::new(id).unwrap_or_else(|| unreachable!("static element id is non-empty"))
}

fn class(name: &'static str) -> ClassName {
    ClassName::new(name).unwrap_or_else(|| unreachable!("static class name is non-empty"))
}

// ---------------------------------------------------------------------------
// Visit flag
// ---------------------------------------------------------------------------

/// Storage key under which the visit flag lives by default.
pub const VISIT_FLAG_KEY: &str = "hasVisitedHome";

/// The only stored value that counts as "visited".
pub const VISITED_VALUE: &str = "true";

/// Returns the default visit-flag key.
pub fn default_visit_key() -> StorageKey {
    StorageKey::new(VISIT_FLAG_KEY).unwrap_or_else(|| unreachable!("static key is non-empty"))
}

/// Interprets a raw stored value: only the exact string `"true"` means visited.
pub fn is_visited_value(raw: Option<&str>) -> bool {
    raw == Some(VISITED_VALUE)
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so adapters never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Serialises a [`Duration`] as whole milliseconds.
pub mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        s.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_route_detection() {
        for path in ["", "/", "/index.html", "/site/index.html", "index.html"] {
            assert!(Route::new(path).is_entry(), "{path:?} should be the entry route");
        }
        for path in ["/about.html", "/index.htm", "/index.html/extra", "/blog/"] {
            assert!(!Route::new(path).is_entry(), "{path:?} should not be the entry route");
        }
    }

    #[test]
    fn parses_paths_and_urls() {
        let cases = [
            ("/", "/"),
            ("/about.html?ref=nav", "/about.html"),
            ("https://example.org", "/"),
            ("https://example.org/", "/"),
            ("https://example.org?x=1", "/"),
            ("https://example.org/site/index.html#top", "/site/index.html"),
            ("file:///srv/www/index.html", "/srv/www/index.html"),
            ("", ""),
        ];
        for (input, expected) in cases {
            assert_eq!(Route::parse(input).unwrap().as_str(), expected, "input {input:?}");
        }
    }

    #[test]
    fn rejects_malformed_locations() {
        assert!(matches!(
            Route::parse("/has space.html"),
            Err(CurtainError::InvalidRoute { .. })
        ));
        assert!(Route::parse("ht tp://x").is_err());
        assert!(Route::parse("://host/path").is_err());
    }

    #[test]
    fn only_exact_true_counts_as_visited() {
        assert!(is_visited_value(Some("true")));
        assert!(!is_visited_value(Some("TRUE")));
        assert!(!is_visited_value(Some("1")));
        assert!(!is_visited_value(Some("")));
        assert!(!is_visited_value(None));
    }

    #[test]
    fn default_timings_are_valid() {
        Timings::default().validate().expect("defaults validate");
    }

    #[test]
    fn zero_timing_is_rejected() {
        let timings = Timings {
            emphasis: Duration::ZERO,
            ..Timings::default()
        };
        let err = timings.validate().unwrap_err();
        assert!(err.to_string().contains("emphasis"));
    }

    #[test]
    fn fallback_must_follow_auto_start() {
        let timings = Timings {
            fallback: Duration::from_secs(20),
            ..Timings::default()
        };
        assert!(timings.validate().is_err());
    }

    #[test]
    fn content_reveal_must_not_outlast_removal() {
        let timings = Timings {
            content_reveal: Duration::from_millis(1500),
            ..Timings::default()
        };
        assert!(timings.validate().is_err());
    }

    #[test]
    fn transition_serialises_time_as_millis() {
        let t = Transition {
            from: Some(OverlayState::Shown),
            to: OverlayState::Exploding,
            at: Duration::from_millis(20_000),
            trigger: Trigger::Timer(TimerKind::AutoStart),
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["at"], 20_000);
        assert_eq!(json["to"], "exploding");
        assert_eq!(json["trigger"]["timer"], "auto_start");
    }
}
