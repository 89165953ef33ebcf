//! Logging and tracing setup
//!
//! Always installs an `EnvFilter` + fmt layer. When enabled in config, spans
//! are also exported over OTLP and log lines are mirrored to a daily file.

use anyhow::Result;
use opentelemetry::trace::TracerProvider;
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::{propagation::TraceContextPropagator, runtime, trace as sdktrace, Resource};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::CmsConfig;

const DEFAULT_FILTER: &str = "page_ledger=info,tower_http=info";

/// Keeps exporters and background log writers alive; flushes on drop.
pub struct TelemetryGuard {
    otlp: bool,
    _file_guard: Option<WorkerGuard>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.otlp {
            global::shutdown_tracer_provider();
        }
    }
}

pub fn init_telemetry(service_name: &str, config: &CmsConfig) -> Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(tracing_subscriber::fmt::layer().with_target(false).boxed());

    let file_guard = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, format!("{service_name}.log"));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    if config.otlp_enabled {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .build_span_exporter()?;

        let trace_config = sdktrace::Config::default().with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
        ]));

        let provider = sdktrace::TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_config(trace_config)
            .build();

        global::set_tracer_provider(provider.clone());
        let tracer = provider.tracer(service_name.to_string());
        layers.push(tracing_opentelemetry::layer().with_tracer(tracer).boxed());
    }

    Registry::default().with(layers).with(filter).try_init()?;

    Ok(TelemetryGuard {
        otlp: config.otlp_enabled,
        _file_guard: file_guard,
    })
}
