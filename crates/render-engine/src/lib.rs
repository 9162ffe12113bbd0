//! NE Visualizer Render Engine
//!
//! Turns an uploaded video and a declarative settings document into an
//! ffmpeg invocation that applies color/flip adjustments and overlays an
//! audio waveform.
//!
//! # Pipeline Architecture
//!
//! ```text
//! settings.json ──► RenderSettings ──► [FilterStage] ──┐
//!                                                      ├── FilterGraph
//! showwaves + overlay (fixed topology) ────────────────┘        │
//!                                                               ▼
//! upload ──► TempFilePair (input) ──► ffmpeg ──► TempFilePair (output)
//!                                                               │
//!                                                               ▼
//!                                                        RenderedVideo
//! ```

pub mod graph;
pub mod invoker;
pub mod job;
pub mod settings;
pub mod stage;
pub mod temp;

pub use graph::{FilterGraph, FilterGraphBuilder, GraphError, VisualizerStyle, WaveMode};
pub use invoker::{FfmpegInvoker, InvocationReport, InvocationState, RenderInvoker};
pub use job::{RenderJob, RenderPipeline, RenderRequest, RenderedVideo};
pub use settings::{parse_settings, translate, RenderSettings, VideoSettings};
pub use stage::FilterStage;
