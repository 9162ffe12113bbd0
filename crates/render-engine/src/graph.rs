//! Typed filter graph for the engine's `-filter_complex` argument.
//!
//! ```text
//! [0:v] ── stages ──► [vid] ──┐
//!                             ├── overlay (bottom, full width) ──► [out]
//! [0:a] ── showwaves ─► [vis] ┘
//! [0:a] ─────────────────────────────────────────────────────────► audio out
//! ```
//!
//! The graph is assembled from chains with labelled pads, checked for wiring
//! consistency, and only rendered to text when handed to the engine.

use std::collections::BTreeMap;
use std::fmt;

use nevis_common::config::VisualizerConfig;
pub use nevis_common::config::WaveMode;
use nevis_common::error::NevisError;

use crate::stage::{Filter, FilterStage};

/// Intermediate label for the processed video chain.
pub const VIDEO_LABEL: &str = "vid";
/// Intermediate label for the waveform visualization.
pub const VISUALIZER_LABEL: &str = "vis";
/// Final composited video label.
pub const OUTPUT_LABEL: &str = "out";

/// Kind of an engine input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn specifier(self) -> char {
        match self {
            Self::Video => 'v',
            Self::Audio => 'a',
        }
    }
}

/// A connection point in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pad {
    /// A stream of one of the engine's inputs, e.g. `0:v`.
    Stream { input: usize, kind: StreamKind },
    /// A named intermediate node, e.g. `vid`.
    Label(String),
}

impl Pad {
    pub fn video(input: usize) -> Self {
        Self::Stream {
            input,
            kind: StreamKind::Video,
        }
    }

    pub fn audio(input: usize) -> Self {
        Self::Stream {
            input,
            kind: StreamKind::Audio,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Self::Label(name.into())
    }

    /// Form used by the engine's `-map` option.
    pub fn map_spec(&self) -> String {
        match self {
            Self::Stream { .. } => self.to_string(),
            Self::Label(name) => format!("[{name}]"),
        }
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream { input, kind } => write!(f, "{input}:{}", kind.specifier()),
            Self::Label(name) => f.write_str(name),
        }
    }
}

/// A linear chain of filters between labelled pads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    pub inputs: Vec<Pad>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<Pad>,
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pad in &self.inputs {
            write!(f, "[{pad}]")?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{filter}")?;
        }
        for pad in &self.outputs {
            write!(f, "[{pad}]")?;
        }
        Ok(())
    }
}

/// Canvas and look of the waveform overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualizerStyle {
    pub width: u32,
    pub height: u32,
    pub mode: WaveMode,
    pub color: String,
}

impl Default for VisualizerStyle {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 200,
            mode: WaveMode::Cline,
            color: "white".to_string(),
        }
    }
}

impl From<&VisualizerConfig> for VisualizerStyle {
    fn from(config: &VisualizerConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            mode: config.mode,
            color: config.color.clone(),
        }
    }
}

impl VisualizerStyle {
    fn to_filter(&self) -> Filter {
        Filter::new("showwaves")
            .with_named("s", format!("{}x{}", self.width, self.height))
            .with_named("mode", self.mode.as_str())
            .with_named("colors", self.color.clone())
    }
}

/// Wiring defects detected before the graph reaches the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("chain {index} has no filters")]
    EmptyChain { index: usize },

    #[error("chain {index} writes to input stream {pad}")]
    StreamAsOutput { index: usize, pad: String },

    #[error("label [{label}] is produced {count} times")]
    DuplicateProducer { label: String, count: usize },

    #[error("label [{label}] is consumed {count} times")]
    DuplicateConsumer { label: String, count: usize },

    #[error("label [{label}] is consumed but never produced")]
    Unproduced { label: String },

    #[error("label [{label}] is produced but never consumed")]
    Unconsumed { label: String },
}

impl From<GraphError> for NevisError {
    fn from(err: GraphError) -> Self {
        NevisError::internal(format!("Invalid filter graph: {err}"))
    }
}

/// Incremental graph construction.
#[derive(Debug, Default)]
pub struct FilterGraphBuilder {
    chains: Vec<FilterChain>,
}

impl FilterGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(
        mut self,
        inputs: impl IntoIterator<Item = Pad>,
        filters: impl IntoIterator<Item = Filter>,
        outputs: impl IntoIterator<Item = Pad>,
    ) -> Self {
        self.chains.push(FilterChain {
            inputs: inputs.into_iter().collect(),
            filters: filters.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
        });
        self
    }

    /// Finish the graph and check its wiring.
    pub fn build(self, video_output: Pad, audio_output: Pad) -> Result<FilterGraph, GraphError> {
        let graph = FilterGraph {
            chains: self.chains,
            video_output,
            audio_output,
        };
        graph.validate()?;
        Ok(graph)
    }
}

/// The complete graph handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
    video_output: Pad,
    audio_output: Pad,
}

impl FilterGraph {
    /// Compose the video stages with the waveform overlay.
    ///
    /// An empty stage list degenerates to a single passthrough stage.
    pub fn for_stages(
        stages: &[FilterStage],
        style: &VisualizerStyle,
    ) -> Result<Self, GraphError> {
        let video_filters: Vec<Filter> = if stages.is_empty() {
            vec![FilterStage::Passthrough.to_filter()]
        } else {
            stages.iter().map(FilterStage::to_filter).collect()
        };

        FilterGraphBuilder::new()
            .chain([Pad::video(0)], video_filters, [Pad::label(VIDEO_LABEL)])
            .chain(
                [Pad::audio(0)],
                [style.to_filter()],
                [Pad::label(VISUALIZER_LABEL)],
            )
            .chain(
                [Pad::label(VIDEO_LABEL), Pad::label(VISUALIZER_LABEL)],
                [Filter::new("overlay").with_arg("0").with_arg("H-h")],
                [Pad::label(OUTPUT_LABEL)],
            )
            .build(Pad::label(OUTPUT_LABEL), Pad::audio(0))
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    pub fn video_output(&self) -> &Pad {
        &self.video_output
    }

    pub fn audio_output(&self) -> &Pad {
        &self.audio_output
    }

    /// Every named label must be produced exactly once and consumed exactly
    /// once, counting the output mappings as consumers.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut producers: BTreeMap<&str, usize> = BTreeMap::new();
        let mut consumers: BTreeMap<&str, usize> = BTreeMap::new();

        for (index, chain) in self.chains.iter().enumerate() {
            if chain.filters.is_empty() {
                return Err(GraphError::EmptyChain { index });
            }
            for pad in &chain.inputs {
                if let Pad::Label(name) = pad {
                    *consumers.entry(name.as_str()).or_default() += 1;
                }
            }
            for pad in &chain.outputs {
                match pad {
                    Pad::Label(name) => *producers.entry(name.as_str()).or_default() += 1,
                    Pad::Stream { .. } => {
                        return Err(GraphError::StreamAsOutput {
                            index,
                            pad: pad.to_string(),
                        })
                    }
                }
            }
        }
        for pad in [&self.video_output, &self.audio_output] {
            if let Pad::Label(name) = pad {
                *consumers.entry(name.as_str()).or_default() += 1;
            }
        }

        for (&label, &count) in &producers {
            if count > 1 {
                return Err(GraphError::DuplicateProducer {
                    label: label.to_string(),
                    count,
                });
            }
            match consumers.get(label) {
                None => {
                    return Err(GraphError::Unconsumed {
                        label: label.to_string(),
                    })
                }
                Some(&used) if used > 1 => {
                    return Err(GraphError::DuplicateConsumer {
                        label: label.to_string(),
                        count: used,
                    })
                }
                Some(_) => {}
            }
        }
        if let Some(&label) = consumers.keys().find(|l| !producers.contains_key(*l)) {
            return Err(GraphError::Unproduced {
                label: label.to_string(),
            });
        }

        Ok(())
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{chain}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_graph_text() {
        let graph = FilterGraph::for_stages(
            &[
                FilterStage::Passthrough,
                FilterStage::Brightness { level: 0.0 },
            ],
            &VisualizerStyle::default(),
        )
        .unwrap();

        assert_eq!(
            graph.to_string(),
            "[0:v]null,eq=brightness=0.0[vid];\
             [0:a]showwaves=s=1280x200:mode=cline:colors=white[vis];\
             [vid][vis]overlay=0:H-h[out]"
        );
        assert_eq!(graph.video_output().map_spec(), "[out]");
        assert_eq!(graph.audio_output().map_spec(), "0:a");
    }

    #[test]
    fn test_stage_order_is_preserved() {
        let graph = FilterGraph::for_stages(
            &[
                FilterStage::HorizontalFlip,
                FilterStage::Brightness { level: 0.5 },
                FilterStage::Desaturate,
            ],
            &VisualizerStyle::default(),
        )
        .unwrap();

        assert_eq!(
            graph.chains()[0].to_string(),
            "[0:v]hflip,eq=brightness=0.5,hue=s=0[vid]"
        );
    }

    #[test]
    fn test_empty_stages_degenerate_to_passthrough() {
        let graph = FilterGraph::for_stages(&[], &VisualizerStyle::default()).unwrap();
        assert_eq!(graph.chains()[0].to_string(), "[0:v]null[vid]");
    }

    #[test]
    fn test_custom_style() {
        let style = VisualizerStyle {
            width: 640,
            height: 120,
            mode: WaveMode::P2p,
            color: "0x00ff88".to_string(),
        };
        let graph = FilterGraph::for_stages(&[FilterStage::HorizontalFlip], &style).unwrap();
        assert_eq!(
            graph.chains()[1].to_string(),
            "[0:a]showwaves=s=640x120:mode=p2p:colors=0x00ff88[vis]"
        );
    }

    #[test]
    fn test_style_from_config() {
        assert_eq!(
            VisualizerStyle::from(&VisualizerConfig::default()),
            VisualizerStyle::default()
        );

        let config = VisualizerConfig {
            width: 1920,
            mode: WaveMode::Line,
            ..VisualizerConfig::default()
        };
        let graph = FilterGraph::for_stages(&[], &VisualizerStyle::from(&config)).unwrap();
        assert_eq!(
            graph.chains()[1].to_string(),
            "[0:a]showwaves=s=1920x200:mode=line:colors=white[vis]"
        );
    }

    #[test]
    fn test_duplicate_producer_rejected() {
        let err = FilterGraphBuilder::new()
            .chain([Pad::video(0)], [Filter::new("null")], [Pad::label("a")])
            .chain([Pad::video(0)], [Filter::new("hflip")], [Pad::label("a")])
            .build(Pad::label("a"), Pad::audio(0))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::DuplicateProducer {
                label: "a".to_string(),
                count: 2
            }
        );
    }

    #[test]
    fn test_unconsumed_label_rejected() {
        let err = FilterGraphBuilder::new()
            .chain([Pad::video(0)], [Filter::new("null")], [Pad::label("vid")])
            .chain([Pad::audio(0)], [Filter::new("anull")], [Pad::label("vis")])
            .build(Pad::label("vid"), Pad::audio(0))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::Unconsumed {
                label: "vis".to_string()
            }
        );
    }

    #[test]
    fn test_dangling_consumer_rejected() {
        let err = FilterGraphBuilder::new()
            .chain(
                [Pad::label("vid"), Pad::label("ghost")],
                [Filter::new("overlay")],
                [Pad::label("out")],
            )
            .chain([Pad::video(0)], [Filter::new("null")], [Pad::label("vid")])
            .build(Pad::label("out"), Pad::audio(0))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::Unproduced {
                label: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_double_consumption_rejected() {
        let err = FilterGraphBuilder::new()
            .chain([Pad::video(0)], [Filter::new("null")], [Pad::label("vid")])
            .chain(
                [Pad::label("vid"), Pad::label("vid")],
                [Filter::new("overlay")],
                [Pad::label("out")],
            )
            .build(Pad::label("out"), Pad::audio(0))
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateConsumer { count: 2, .. }));
    }

    #[test]
    fn test_empty_chain_and_stream_output_rejected() {
        let err = FilterGraphBuilder::new()
            .chain([Pad::video(0)], Vec::<Filter>::new(), [Pad::label("out")])
            .build(Pad::label("out"), Pad::audio(0))
            .unwrap_err();
        assert_eq!(err, GraphError::EmptyChain { index: 0 });

        let err = FilterGraphBuilder::new()
            .chain([Pad::video(0)], [Filter::new("null")], [Pad::video(0)])
            .build(Pad::video(0), Pad::audio(0))
            .unwrap_err();
        assert!(matches!(err, GraphError::StreamAsOutput { index: 0, .. }));
    }
}
