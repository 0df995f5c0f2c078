//! OpenTelemetry-backed observability sink

use dashmap::DashMap;
use keel_core::{Observability, Phase};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};

/// Histogram of bind and handler phase durations, in milliseconds
pub const DISPATCH_PHASE_DURATION: &str = "keel.dispatch.phase.duration";

/// Prefix of per-event counters (`keel.rate_limit.hit`, ...)
pub const EVENT_PREFIX: &str = "keel.";

/// Records dispatch timings and pipeline events as OTLP metrics
///
/// Works without an exporter too; the global meter is then a no-op and only
/// the `debug` events are visible.
pub struct OtelObservability {
    meter: Meter,
    phase_duration: Histogram<f64>,
    counters: DashMap<String, Counter<u64>>,
}

impl OtelObservability {
    pub fn new() -> Self {
        Self::with_meter(global::meter("keel"))
    }

    pub fn with_meter(meter: Meter) -> Self {
        let phase_duration = meter
            .f64_histogram(DISPATCH_PHASE_DURATION)
            .with_unit("ms")
            .with_description("Duration of typed dispatch phases")
            .build();

        Self {
            meter,
            phase_duration,
            counters: DashMap::new(),
        }
    }

    fn counter(&self, name: &str) -> Counter<u64> {
        if let Some(counter) = self.counters.get(name) {
            return counter.clone();
        }

        self.counters
            .entry(name.to_owned())
            .or_insert_with(|| self.meter.u64_counter(format!("{EVENT_PREFIX}{name}")).build())
            .clone()
    }
}

impl Default for OtelObservability {
    fn default() -> Self {
        Self::new()
    }
}

impl Observability for OtelObservability {
    fn record_event(&self, name: &str, attributes: &[(&str, String)]) {
        tracing::debug!(event = name, ?attributes, "pipeline event");

        let attributes: Vec<KeyValue> = attributes
            .iter()
            .map(|(key, value)| KeyValue::new((*key).to_owned(), value.clone()))
            .collect();

        self.counter(name).add(1, &attributes);
    }

    fn record_duration(&self, operation: &str, phase: Phase, duration_ms: f64, status: u16) {
        tracing::debug!(operation, %phase, duration_ms, status, "dispatch phase finished");

        let phase: &'static str = phase.into();
        self.phase_duration.record(
            duration_ms,
            &[
                KeyValue::new("operation", operation.to_owned()),
                KeyValue::new("phase", phase),
                KeyValue::new("status", i64::from(status)),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_created_once_per_event() {
        let sink = OtelObservability::new();

        sink.record_event("rate_limit.hit", &[("endpoint", "/status".to_owned())]);
        sink.record_event("rate_limit.hit", &[("endpoint", "/users".to_owned())]);
        sink.record_event("job.dropped", &[]);

        assert_eq!(sink.counters.len(), 2);
        assert!(sink.counters.contains_key("rate_limit.hit"));
    }

    #[test]
    fn durations_record_without_exporter() {
        let sink = OtelObservability::new();
        sink.record_duration("users.create", Phase::Bind, 0.42, 400);
        sink.record_duration("users.create", Phase::Handler, 12.5, 201);
    }
}
