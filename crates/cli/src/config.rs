//! `curtain.toml` loading and validation.
//!
//! Every section and key is optional; anything left out takes the value the
//! browser build ships with. The file is validated as a whole before any
//! command runs, so a bad delay aborts start-up instead of producing a
//! half-working overlay.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sequencer::{
    CurtainError, DomContract, ElementId, SequencerSettings, StorageKey, Timings,
    VISIT_FLAG_KEY,
};
use tracing::debug;

use crate::observability::LogFormat;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "curtain.toml";

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CurtainConfig {
    pub timings: TimingsSection,
    pub storage: StorageSection,
    pub elements: ElementsSection,
    pub logging: LoggingSection,
    pub telemetry: TelemetrySection,
}

/// `[timings]`, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingsSection {
    pub auto_start_ms: u64,
    pub fallback_ms: u64,
    pub emphasis_ms: u64,
    pub content_reveal_ms: u64,
    pub overlay_removal_ms: u64,
}

impl Default for TimingsSection {
    fn default() -> Self {
        let t = Timings::default();
        let ms = |d: Duration| d.as_millis() as u64;
        Self {
            auto_start_ms: ms(t.auto_start),
            fallback_ms: ms(t.fallback),
            emphasis_ms: ms(t.emphasis),
            content_reveal_ms: ms(t.content_reveal),
            overlay_removal_ms: ms(t.overlay_removal),
        }
    }
}

impl TimingsSection {
    fn to_timings(&self) -> Timings {
        Timings {
            auto_start: Duration::from_millis(self.auto_start_ms),
            fallback: Duration::from_millis(self.fallback_ms),
            emphasis: Duration::from_millis(self.emphasis_ms),
            content_reveal: Duration::from_millis(self.content_reveal_ms),
            overlay_removal: Duration::from_millis(self.overlay_removal_ms),
        }
    }
}

/// `[storage]`: where the visit flag lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    /// JSON store file.
    pub path: PathBuf,
    /// Key of the visit flag inside the store.
    pub key: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("curtain-store.json"),
            key: VISIT_FLAG_KEY.to_string(),
        }
    }
}

/// `[elements]`: ids of the document elements.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElementsSection {
    pub loader: String,
    pub typing_text: String,
    pub pulsing_light: String,
    pub content: String,
}

impl Default for ElementsSection {
    fn default() -> Self {
        let dom = DomContract::default();
        Self {
            loader: dom.loader.as_str().to_string(),
            typing_text: dom.typing_text.as_str().to_string(),
            pulsing_light: dom.pulsing_light.as_str().to_string(),
            content: dom.content.as_str().to_string(),
        }
    }
}

/// `[logging]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// `[telemetry]`. Export is off unless an endpoint is given.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySection {
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: "curtain".to_string(),
        }
    }
}

impl CurtainConfig {
    /// Reads and validates the file at `path`. A missing file yields the
    /// defaults.
    pub fn load(path: &Path) -> Result<Self, CurtainError> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text).map_err(|e| match e {
                CurtainError::ConfigurationError { message } => CurtainError::ConfigurationError {
                    message: format!("{}: {message}", path.display()),
                },
                other => other,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file; using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(CurtainError::ConfigurationError {
                    message: format!("{}: {e}", path.display()),
                })
            }
        };
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, CurtainError> {
        let config: Self = toml::from_str(text).map_err(|e| CurtainError::ConfigurationError {
            message: e.to_string(),
        })?;
        config.settings()?;
        Ok(config)
    }

    /// Builds the sequencer settings this file describes.
    pub fn settings(&self) -> Result<SequencerSettings, CurtainError> {
        let timings = self.timings.to_timings();
        timings.validate()?;

        let dom = DomContract {
            loader: element_id("loader", &self.elements.loader)?,
            typing_text: element_id("typing_text", &self.elements.typing_text)?,
            pulsing_light: element_id("pulsing_light", &self.elements.pulsing_light)?,
            content: element_id("content", &self.elements.content)?,
        };
        let visit_key =
            StorageKey::new(self.storage.key.clone()).ok_or_else(|| CurtainError::ConfigurationError {
                message: "storage.key must not be empty".to_string(),
            })?;

        Ok(SequencerSettings {
            timings,
            dom,
            visit_key,
            ..SequencerSettings::default()
        })
    }
}

fn element_id(field: &str, value: &str) -> Result<ElementId, CurtainError> {
    ElementId::new(value).ok_or_else(|| CurtainError::ConfigurationError {
        message: format!("elements.{field} must not be empty"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_the_default() {
        let config = CurtainConfig::from_toml_str("").unwrap();

        assert_eq!(config, CurtainConfig::default());
        assert_eq!(config.settings().unwrap(), SequencerSettings::default());
    }

    #[test]
    fn missing_file_is_the_default() {
        let dir = tempfile::tempdir().unwrap();

        let config = CurtainConfig::load(&dir.path().join("curtain.toml")).unwrap();

        assert_eq!(config, CurtainConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = CurtainConfig::from_toml_str(
            r#"
            [timings]
            auto_start_ms = 5000
            fallback_ms = 8000

            [storage]
            path = "/tmp/visits.json"
            key = "seenIntro"

            [elements]
            content = "main"

            [logging]
            filter = "curtain=debug"
            format = "json"

            [telemetry]
            otlp_endpoint = "http://localhost:4317"
            "#,
        )
        .unwrap();

        let settings = config.settings().unwrap();
        assert_eq!(settings.timings.auto_start, Duration::from_secs(5));
        assert_eq!(settings.timings.fallback, Duration::from_secs(8));
        assert_eq!(settings.timings.emphasis, Duration::from_millis(600));
        assert_eq!(settings.visit_key.as_str(), "seenIntro");
        assert_eq!(settings.dom.content.as_str(), "main");
        assert_eq!(settings.dom.loader.as_str(), "loader");
        assert_eq!(config.storage.path, PathBuf::from("/tmp/visits.json"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.telemetry.otlp_endpoint.as_deref(),
            Some("http://localhost:4317")
        );
        assert_eq!(config.telemetry.service_name, "curtain");
    }

    #[test]
    fn reveal_after_removal_is_rejected() {
        let err = CurtainConfig::from_toml_str(
            "[timings]\ncontent_reveal_ms = 2000\noverlay_removal_ms = 1300\n",
        )
        .unwrap_err();

        assert!(matches!(err, CurtainError::ConfigurationError { .. }), "got {err:?}");
    }

    #[test]
    fn fallback_before_auto_start_is_rejected() {
        let err =
            CurtainConfig::from_toml_str("[timings]\nauto_start_ms = 30000\n").unwrap_err();

        assert!(matches!(err, CurtainError::ConfigurationError { .. }));
    }

    #[test]
    fn empty_element_id_is_rejected() {
        let err = CurtainConfig::from_toml_str("[elements]\nloader = \"\"\n").unwrap_err();

        assert!(err.to_string().contains("elements.loader"), "got {err}");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(CurtainConfig::from_toml_str("[timings]\nauto_start = 5\n").is_err());
    }

    #[test]
    fn load_reports_the_path_of_a_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curtain.toml");
        std::fs::write(&path, "[timings\n").unwrap();

        let err = CurtainConfig::load(&path).unwrap_err();

        assert!(err.to_string().contains("curtain.toml"), "got {err}");
    }
}
