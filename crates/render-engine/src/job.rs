//! Render job orchestration.
//!
//! ```text
//! settings ─► parse/validate ─► acquire temps ─► translate ─► graph ─► engine ─► open output
//!                                     │                                              │
//!                                     └──────────── release (every exit path) ◄──────┘
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nevis_common::error::{NevisError, NevisResult};

use crate::graph::{FilterGraph, VisualizerStyle};
use crate::invoker::RenderInvoker;
use crate::settings::{parse_settings, translate, RenderSettings};
use crate::temp::TempFilePair;

/// Raw inputs of one render request.
///
/// `video` is any byte container, so an upload buffer can be handed over
/// without copying it.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest<V = Vec<u8>> {
    /// Uploaded video bytes.
    pub video: V,

    /// Raw `settings` JSON, if the caller sent one.
    pub settings: Option<String>,
}

/// A finished render.
///
/// The output file is already unlinked; `file` is the only remaining handle.
#[derive(Debug)]
pub struct RenderedVideo {
    pub file: File,
    pub len: u64,
    pub elapsed: Duration,
}

/// One request's worth of state: temp files, settings, and the derived graph.
#[derive(Debug)]
pub struct RenderJob {
    temp: TempFilePair,
    settings: RenderSettings,
    graph: FilterGraph,
}

impl RenderJob {
    /// Acquire temp files, store the upload, and derive the filter graph.
    pub fn prepare(
        settings: RenderSettings,
        video: &[u8],
        temp_dir: &Path,
        style: &VisualizerStyle,
    ) -> NevisResult<Self> {
        let temp = TempFilePair::acquire(temp_dir)?;
        temp.write_input(video)?;

        let stages = translate(&settings.video);
        let graph = FilterGraph::for_stages(&stages, style)?;

        tracing::debug!(
            input = %temp.input_path().display(),
            bytes = video.len(),
            stages = stages.len(),
            filter_graph = %graph,
            "Render job prepared"
        );

        Ok(Self {
            temp,
            settings,
            graph,
        })
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn graph(&self) -> &FilterGraph {
        &self.graph
    }

    pub fn input_path(&self) -> &Path {
        self.temp.input_path()
    }

    pub fn output_path(&self) -> &Path {
        self.temp.output_path()
    }

    /// Run the engine and hand back the output. Temp files are gone on return.
    pub fn execute(self, invoker: &dyn RenderInvoker) -> NevisResult<RenderedVideo> {
        let report = invoker.invoke(self.temp.input_path(), self.temp.output_path(), &self.graph)?;
        let (file, len) = open_output(self.temp.output_path())?;
        self.temp.release();

        Ok(RenderedVideo {
            file,
            len,
            elapsed: report.elapsed,
        })
    }
}

/// Open the engine output and make sure it actually holds data.
fn open_output(path: &Path) -> NevisResult<(File, u64)> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(NevisError::processing(
                "Engine reported success but wrote no output",
                String::new(),
            ))
        }
        Err(e) => {
            return Err(NevisError::internal(format!(
                "Failed to open render output {}: {e}",
                path.display()
            )))
        }
    };

    let len = file.metadata()?.len();
    if len == 0 {
        return Err(NevisError::processing(
            "Engine reported success but the output is empty",
            String::new(),
        ));
    }
    Ok((file, len))
}

/// Shared, immutable entry point used by the HTTP layer.
pub struct RenderPipeline {
    invoker: Arc<dyn RenderInvoker>,
    temp_dir: PathBuf,
    style: VisualizerStyle,
}

impl RenderPipeline {
    pub fn new(invoker: Arc<dyn RenderInvoker>, temp_dir: PathBuf) -> Self {
        Self {
            invoker,
            temp_dir,
            style: VisualizerStyle::default(),
        }
    }

    pub fn with_style(mut self, style: VisualizerStyle) -> Self {
        self.style = style;
        self
    }

    pub fn invoker(&self) -> &dyn RenderInvoker {
        self.invoker.as_ref()
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Render one request. Blocks until the engine exits.
    ///
    /// Settings are parsed and validated before any temp file exists.
    pub fn render<V>(&self, request: RenderRequest<V>) -> NevisResult<RenderedVideo>
    where
        V: AsRef<[u8]>,
    {
        let settings = parse_settings(request.settings.as_deref())?;
        settings.validate()?;

        let job = RenderJob::prepare(settings, request.video.as_ref(), &self.temp_dir, &self.style)?;
        let rendered = job.execute(self.invoker.as_ref())?;

        tracing::info!(
            engine = self.invoker.name(),
            output_bytes = rendered.len,
            elapsed_ms = rendered.elapsed.as_millis(),
            "Render finished"
        );
        Ok(rendered)
    }
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("engine", &self.invoker.name())
            .field("temp_dir", &self.temp_dir)
            .field("style", &self.style)
            .finish()
    }
}
