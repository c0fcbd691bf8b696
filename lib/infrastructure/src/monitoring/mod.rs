use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{ExporterBuildError, WithExportConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::filter::{LevelFilter, ParseError};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

//The log filter is installed as the first layer so it can be swapped at runtime
//without rebuilding the subscriber. Spans are only exported when an OTLP endpoint is set.

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitoringConfig {
    pub service_name: String,
    pub logs: EnvFilterConfig,
    pub otlp: Option<OtlpConfig>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EnvFilterConfig {
    pub default_level: String,
    #[serde(default)]
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct OtlpConfig {
    pub url: String,
}

impl TryInto<EnvFilter> for EnvFilterConfig {
    type Error = ParseError;

    fn try_into(self) -> Result<EnvFilter, Self::Error> {
        EnvFilter::builder()
            .with_default_directive(self.default_level.parse()?)
            .parse(self.filters.join(","))
    }
}

/// Handle to change the global log level after the subscriber has been installed.
/// Per-module directives from the configuration are kept, only the default level changes.
#[derive(Clone)]
pub struct LogLevelControl {
    handle: reload::Handle<EnvFilter, Registry>,
    filters: Vec<String>,
}

impl LogLevelControl {
    pub fn set_level(&self, level: LevelFilter) -> anyhow::Result<()> {
        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .parse(self.filters.join(","))?;

        self.handle.reload(filter)?;
        tracing::info!("Log level changed to {}", level);

        Ok(())
    }
}

impl MonitoringConfig {
    pub fn init(&self) -> anyhow::Result<LogLevelControl> {
        let filter: EnvFilter = self.logs.clone().try_into()?;
        let (filter_layer, handle) = reload::Layer::new(filter);

        let tracing_layer = match &self.otlp {
            Some(otlp_config) => {
                opentelemetry::global::set_text_map_propagator(TraceContextPropagator::default());

                let resource = Resource::builder()
                    .with_attribute(KeyValue::new("service.name", self.service_name.clone()))
                    .build();
                let tracer_provider = init_traces(resource, &otlp_config.url)?;
                let tracer = tracer_provider.tracer(self.service_name.clone());
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(OpenTelemetryLayer::new(tracer))
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(tracing_subscriber::fmt::layer())
            .with(tracing_layer)
            .try_init()?;

        Ok(LogLevelControl {
            handle,
            filters: self.logs.filters.clone(),
        })
    }
}

fn init_traces(resource: Resource, url: &str) -> Result<SdkTracerProvider, ExporterBuildError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(url)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}
