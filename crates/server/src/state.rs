use av1batch_core::{Config, ConversionOptions, ConversionPipeline, EncoderRunner};

/// Shared application state
pub struct AppState<R: EncoderRunner> {
    config: Config,
    pipeline: ConversionPipeline<R>,
}

impl<R: EncoderRunner + 'static> AppState<R> {
    pub fn new(config: Config, pipeline: ConversionPipeline<R>) -> Self {
        Self { config, pipeline }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &ConversionPipeline<R> {
        &self.pipeline
    }

    /// Conversion options used when a batch request carries no overrides.
    pub fn default_options(&self) -> ConversionOptions {
        self.config.defaults.to_options()
    }
}
