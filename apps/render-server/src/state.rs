//! Shared, read-only request state.

use std::sync::Arc;

use nevis_common::config::AppConfig;
use nevis_render_engine::{FfmpegInvoker, RenderInvoker, RenderPipeline, VisualizerStyle};

/// Cheap to clone; every clone points at the same immutable config and pipeline.
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    pipeline: Arc<RenderPipeline>,
}

impl AppState {
    /// State backed by the ffmpeg binary named in the config.
    pub fn new(config: AppConfig) -> Self {
        let invoker = Arc::new(FfmpegInvoker::new(&config.engine));
        Self::with_invoker(config, invoker)
    }

    pub fn with_invoker(config: AppConfig, invoker: Arc<dyn RenderInvoker>) -> Self {
        let pipeline = RenderPipeline::new(invoker, config.server.temp_dir())
            .with_style(VisualizerStyle::from(&config.visualizer));
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<RenderPipeline> {
        &self.pipeline
    }
}
