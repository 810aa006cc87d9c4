//! Tracing subscriber and optional OpenTelemetry export.
//!
//! Events go to stderr so that stdout stays clean for reports. When an OTLP
//! endpoint is configured, spans are also batched to it over gRPC; call
//! [`Telemetry::shutdown`] before exiting so the last batch is flushed.

use anyhow::Context;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LoggingSection, TelemetrySection};

/// Output encoding for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Keeps the exporter alive for the lifetime of the process.
#[derive(Debug)]
pub struct Telemetry {
    provider: Option<TracerProvider>,
}

impl Telemetry {
    /// Flushes and stops the OTLP exporter, if one was installed.
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                eprintln!("telemetry shutdown failed: {e}");
            }
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured
/// filter.
///
/// Must be called from inside the tokio runtime when telemetry is enabled.
pub fn init(logging: &LoggingSection, telemetry: &TelemetrySection) -> anyhow::Result<Telemetry> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .with_context(|| format!("invalid log filter '{}'", logging.filter))?;

    let provider = match &telemetry.otlp_endpoint {
        Some(endpoint) => Some(otlp_provider(endpoint, &telemetry.service_name)?),
        None => None,
    };
    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer(telemetry.service_name.clone()))
    });

    let text_layer = (logging.format == LogFormat::Text)
        .then(|| fmt::layer().with_writer(std::io::stderr));
    let json_layer = (logging.format == LogFormat::Json)
        .then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    Ok(Telemetry { provider })
}

fn otlp_provider(endpoint: &str, service_name: &str) -> anyhow::Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .with_context(|| format!("failed to build OTLP exporter for {endpoint}"))?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.to_string(),
        )]))
        .build())
}
