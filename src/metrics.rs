//! Prometheus instrumentation for conversions.

use std::time::Duration;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

const NAMESPACE: &str = "libreoffice_mcp";

/// Counters and timings for external conversions.
///
/// Cloning shares the underlying collectors.
#[derive(Clone)]
pub struct ConversionMetrics {
    conversions: IntCounterVec,
    duration: Histogram,
}

impl ConversionMetrics {
    pub fn new() -> Self {
        let conversions = IntCounterVec::new(
            Opts::new("conversions_total", "External conversions by outcome").namespace(NAMESPACE),
            &["outcome"],
        )
        .expect("static metric definition is valid");

        let duration = Histogram::with_opts(
            HistogramOpts::new(
                "conversion_duration_seconds",
                "Wall time spent in the external converter",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )
        .expect("static metric definition is valid");

        Self {
            conversions,
            duration,
        }
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.conversions.clone()))?;
        registry.register(Box::new(self.duration.clone()))?;
        Ok(())
    }

    pub fn observe(&self, outcome: &str, elapsed: Duration) {
        self.conversions.with_label_values(&[outcome]).inc();
        self.duration.observe(elapsed.as_secs_f64());
    }

    pub fn count(&self, outcome: &str) -> u64 {
        self.conversions.with_label_values(&[outcome]).get()
    }
}

impl Default for ConversionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a registry in the Prometheus text exposition format.
pub fn encode(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_is_exported() {
        let registry = Registry::new();
        let metrics = ConversionMetrics::new();
        metrics.register(&registry).unwrap();

        metrics.observe("success", Duration::from_millis(300));
        metrics.observe("timeout", Duration::from_secs(5));

        assert_eq!(metrics.count("success"), 1);
        let text = encode(&registry).unwrap();
        assert!(text.contains("libreoffice_mcp_conversions_total"));
        assert!(text.contains("outcome=\"timeout\""));
    }
}
