//! Shared application state.

use std::sync::Arc;

use prometheus::Registry;

use crate::config::AppConfig;
use crate::converter::Converter;
use crate::letters::FormLetterGenerator;
use crate::metrics::ConversionMetrics;

/// Everything a request handler or MCP tool needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub converter: Converter,
    pub generator: FormLetterGenerator,
    pub registry: Registry,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let metrics = ConversionMetrics::new();
        metrics.register(&registry)?;

        let converter = Converter::with_metrics(config.converter.clone(), metrics);
        let generator = FormLetterGenerator::new(converter.clone(), config.letters.clone());

        Ok(Self {
            config: Arc::new(config),
            converter,
            generator,
            registry,
        })
    }
}
