//! External engine invocation.
//!
//! The engine is run once per job, synchronously, with stdout and stderr
//! captured separately. Exit status decides the outcome; there are no retries.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use nevis_common::config::EngineConfig;
use nevis_common::error::{NevisError, NevisResult};

use crate::graph::FilterGraph;

const TIMEOUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lifecycle of a single engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Idle,
    Invoked,
    Succeeded,
    Failed,
}

/// What a finished invocation left behind.
#[derive(Debug, Clone)]
pub struct InvocationReport {
    pub state: InvocationState,
    pub elapsed: Duration,
    pub stdout: String,
    pub stderr: String,
}

/// Trait for render engines (ffmpeg, or a stand-in in tests).
pub trait RenderInvoker: Send + Sync {
    /// Run the engine over `input`, writing `output`.
    fn invoke(&self, input: &Path, output: &Path, graph: &FilterGraph)
        -> NevisResult<InvocationReport>;

    /// Check if the engine can be launched on this system.
    fn is_available(&self) -> bool;

    /// Engine name.
    fn name(&self) -> &str;
}

/// Encoder choices passed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingPreset {
    pub video_codec: String,
    pub video_preset: String,
    pub audio_codec: String,
}

impl Default for EncodingPreset {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for EncodingPreset {
    fn from(config: &EngineConfig) -> Self {
        Self {
            video_codec: config.video_codec.clone(),
            video_preset: config.video_preset.clone(),
            audio_codec: config.audio_codec.clone(),
        }
    }
}

/// Build the engine argument list for one job.
pub fn build_args(
    input: &Path,
    output: &Path,
    graph: &FilterGraph,
    preset: &EncodingPreset,
) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.display().to_string(),
        "-filter_complex".to_string(),
        graph.to_string(),
        "-map".to_string(),
        graph.video_output().map_spec(),
        "-map".to_string(),
        graph.audio_output().map_spec(),
        "-c:v".to_string(),
        preset.video_codec.clone(),
        "-preset".to_string(),
        preset.video_preset.clone(),
        "-c:a".to_string(),
        preset.audio_codec.clone(),
        output.display().to_string(),
    ]
}

/// Runs the ffmpeg binary as a child process.
#[derive(Debug, Clone)]
pub struct FfmpegInvoker {
    binary: PathBuf,
    preset: EncodingPreset,
    timeout: Option<Duration>,
}

impl FfmpegInvoker {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            preset: EncodingPreset::from(config),
            timeout: config.timeout(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Wait for the child, killing it once the configured timeout elapses.
    fn wait(&self, child: &mut Child, started: Instant) -> NevisResult<WaitOutcome> {
        let Some(timeout) = self.timeout else {
            return child
                .wait()
                .map(WaitOutcome::Exited)
                .map_err(|e| NevisError::internal(format!("Failed to wait on ffmpeg: {e}")));
        };

        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(WaitOutcome::Exited(status)),
                Ok(None) if started.elapsed() >= timeout => {
                    if let Err(e) = child.kill() {
                        tracing::warn!(error = %e, "Failed to kill timed-out ffmpeg");
                    }
                    // Reap so the pipes close and the drain threads finish.
                    let _ = child.wait();
                    return Ok(WaitOutcome::TimedOut(timeout));
                }
                Ok(None) => std::thread::sleep(TIMEOUT_POLL_INTERVAL),
                Err(e) => {
                    return Err(NevisError::internal(format!(
                        "Failed to poll ffmpeg status: {e}"
                    )))
                }
            }
        }
    }
}

enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut(Duration),
}

impl RenderInvoker for FfmpegInvoker {
    fn invoke(
        &self,
        input: &Path,
        output: &Path,
        graph: &FilterGraph,
    ) -> NevisResult<InvocationReport> {
        let args = build_args(input, output, graph, &self.preset);
        let mut state = InvocationState::Idle;
        tracing::debug!(binary = %self.binary.display(), ?args, ?state, "Running ffmpeg");

        let started = Instant::now();
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                NevisError::internal(format!(
                    "Failed to start {}: {e}",
                    self.binary.display()
                ))
            })?;
        state = InvocationState::Invoked;

        tracing::info!(pid = child.id(), ?state, "ffmpeg process started");

        // Drain both pipes concurrently so the engine never blocks on a full pipe.
        let stdout_task = drain(child.stdout.take(), "stdout");
        let stderr_task = drain(child.stderr.take(), "stderr");

        let outcome = self.wait(&mut child, started);
        let stdout = join_drain(stdout_task, "stdout");
        let stderr = join_drain(stderr_task, "stderr");
        let elapsed = started.elapsed();

        let status = match outcome? {
            WaitOutcome::Exited(status) => status,
            WaitOutcome::TimedOut(limit) => {
                state = InvocationState::Failed;
                tracing::warn!(?state, timeout_secs = limit.as_secs(), "ffmpeg timed out");
                return Err(NevisError::processing(
                    format!("ffmpeg did not finish within {}s", limit.as_secs()),
                    stderr,
                ));
            }
        };

        if !status.success() {
            state = InvocationState::Failed;
            tracing::debug!(?state, %status, "ffmpeg exited unsuccessfully");
            return Err(NevisError::processing(
                format!("ffmpeg exited with {status}"),
                stderr,
            ));
        }

        state = InvocationState::Succeeded;
        tracing::info!(
            ?state,
            elapsed_ms = elapsed.as_millis(),
            "ffmpeg finished"
        );
        if !stdout.trim().is_empty() {
            tracing::debug!(stdout = %stdout.trim(), "ffmpeg stdout");
        }

        Ok(InvocationReport {
            state,
            elapsed,
            stdout,
            stderr,
        })
    }

    fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn drain<R>(pipe: Option<R>, stream: &'static str) -> Option<JoinHandle<String>>
where
    R: Read + Send + 'static,
{
    let mut pipe = pipe?;
    Some(std::thread::spawn(move || {
        let mut raw = Vec::new();
        match pipe.read_to_end(&mut raw) {
            Ok(_) => String::from_utf8_lossy(&raw).into_owned(),
            Err(err) => format!("<failed to read ffmpeg {stream}: {err}>"),
        }
    }))
}

fn join_drain(task: Option<JoinHandle<String>>, stream: &'static str) -> String {
    match task {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| format!("<failed to join ffmpeg {stream} reader>")),
        None => String::new(),
    }
}
