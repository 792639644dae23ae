//! Logging and OpenTelemetry setup.
//!
//! Without an OTLP endpoint this is plain `fmt` logging behind an
//! `EnvFilter`. With one, traces, logs and metrics are also exported over
//! gRPC, and incoming `traceparent` headers join the caller's trace.

use std::time::Duration;

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};
use opentelemetry_sdk::Resource;
use shutterconf::TelemetryConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Timeout for OTLP exports - prevents blocking on unavailable endpoints
const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

const SERVICE_NAME: &str = "shutterbox";
const FALLBACK_FILTER: &str = "info,shutterbox=debug";

/// Install the global subscriber described by `config`.
pub fn init(config: &TelemetryConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|e| {
        eprintln!(
            "Invalid log filter {:?} ({e}), using {FALLBACK_FILTER}",
            config.log_level
        );
        EnvFilter::new(FALLBACK_FILTER)
    });

    match config.otlp_endpoint.as_deref() {
        Some(endpoint) => init_otlp(endpoint, env_filter),
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            Ok(())
        }
    }
}

fn init_otlp(otlp_endpoint: &str, env_filter: EnvFilter) -> Result<()> {
    let resource = Resource::builder_empty()
        .with_service_name(SERVICE_NAME)
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let endpoint = if otlp_endpoint.contains("://") {
        otlp_endpoint.to_string()
    } else {
        format!("http://{}", otlp_endpoint)
    };

    let trace_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .context("Failed to create OTLP span exporter")?;

    let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_span_processor(
            opentelemetry_sdk::trace::BatchSpanProcessor::builder(trace_exporter).build(),
        )
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource.clone())
        .build();

    let tracer = tracer_provider.tracer(SERVICE_NAME);
    global::set_tracer_provider(tracer_provider);

    let log_exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .context("Failed to create OTLP log exporter")?;

    let logger_provider = opentelemetry_sdk::logs::SdkLoggerProvider::builder()
        .with_log_processor(
            opentelemetry_sdk::logs::BatchLogProcessor::builder(log_exporter).build(),
        )
        .with_resource(resource.clone())
        .build();

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .context("Failed to create OTLP metric exporter")?;

    let meter_provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
        .with_reader(opentelemetry_sdk::metrics::PeriodicReader::builder(metric_exporter).build())
        .with_resource(resource)
        .build();
    global::set_meter_provider(meter_provider);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(
            &logger_provider,
        ))
        .init();

    tracing::info!(endpoint = otlp_endpoint, "OpenTelemetry export enabled");
    Ok(())
}

/// Parse a W3C `traceparent` header into a remote parent context.
///
/// Format: `00-{32 hex trace id}-{16 hex span id}-{2 hex flags}`.
pub fn parse_traceparent(traceparent: Option<&str>) -> Option<opentelemetry::Context> {
    use opentelemetry::trace::{
        SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
    };

    let tp = traceparent?;
    let mut parts = tp.split('-');
    let (Some(version), Some(trace_id), Some(span_id), Some(flags), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        tracing::debug!(traceparent = tp, "Ignoring malformed traceparent");
        return None;
    };

    if version != "00" {
        tracing::debug!(traceparent = tp, "Unsupported traceparent version");
        return None;
    }

    let mut trace_bytes = [0u8; 16];
    let mut span_bytes = [0u8; 8];
    let mut flag_bytes = [0u8; 1];
    if hex::decode_to_slice(trace_id, &mut trace_bytes).is_err()
        || hex::decode_to_slice(span_id, &mut span_bytes).is_err()
        || hex::decode_to_slice(flags, &mut flag_bytes).is_err()
    {
        tracing::debug!(traceparent = tp, "Ignoring traceparent with bad hex");
        return None;
    }

    let span_context = SpanContext::new(
        TraceId::from_bytes(trace_bytes),
        SpanId::from_bytes(span_bytes),
        TraceFlags::new(flag_bytes[0]),
        true,
        TraceState::default(),
    );

    Some(opentelemetry::Context::current().with_remote_span_context(span_context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_traceparent_valid() {
        let tp = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";
        assert!(parse_traceparent(Some(tp)).is_some());
    }

    #[test]
    fn test_parse_traceparent_none() {
        assert!(parse_traceparent(None).is_none());
    }

    #[test]
    fn test_parse_traceparent_invalid_format() {
        assert!(parse_traceparent(Some("not-a-valid-traceparent")).is_none());
        assert!(parse_traceparent(Some("00-0af7-b7ad-01-extra")).is_none());
    }

    #[test]
    fn test_parse_traceparent_wrong_version() {
        let tp = "01-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";
        assert!(parse_traceparent(Some(tp)).is_none());
    }

    #[test]
    fn test_parse_traceparent_bad_hex() {
        let tp = "00-zzf7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";
        assert!(parse_traceparent(Some(tp)).is_none());
    }
}
