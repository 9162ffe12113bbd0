//! Scoped ownership of the per-request temp files.
//!
//! A [`TempFilePair`] is created before the engine runs and removes both
//! files when it goes out of scope, whichever way the request ends.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};

use nevis_common::error::{NevisError, NevisResult};

const INPUT_PREFIX: &str = "nevis-in-";
const OUTPUT_PREFIX: &str = "nevis-out-";
const SUFFIX: &str = ".mp4";

/// Input and output file for one render job.
#[derive(Debug)]
pub struct TempFilePair {
    input_path: PathBuf,
    output_path: PathBuf,
    input: Option<TempPath>,
    output: Option<TempPath>,
}

impl TempFilePair {
    /// Create two uniquely named files in `dir`.
    pub fn acquire(dir: &Path) -> NevisResult<Self> {
        let input = create(dir, INPUT_PREFIX)?;
        let output = create(dir, OUTPUT_PREFIX)?;

        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            "Acquired temp files"
        );

        Ok(Self {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            input: Some(input),
            output: Some(output),
        })
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Persist the uploaded video into the input file.
    pub fn write_input(&self, bytes: &[u8]) -> NevisResult<()> {
        let path = self.input_path();
        let mut file = std::fs::File::create(path).map_err(|e| {
            NevisError::internal(format!("Failed to open {}: {e}", path.display()))
        })?;
        file.write_all(bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| {
                NevisError::internal(format!("Failed to write {}: {e}", path.display()))
            })
    }

    /// Remove both files now.
    pub fn release(mut self) {
        self.remove_all();
    }

    fn remove_all(&mut self) {
        for (role, slot) in [("input", &mut self.input), ("output", &mut self.output)] {
            let Some(temp) = slot.take() else {
                continue;
            };
            let path = temp.to_path_buf();
            match temp.close() {
                Ok(()) => tracing::debug!(role, path = %path.display(), "Removed temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    role,
                    path = %path.display(),
                    error = %e,
                    "Failed to remove temp file"
                ),
            }
        }
    }
}

impl Drop for TempFilePair {
    fn drop(&mut self) {
        self.remove_all();
    }
}

fn create(dir: &Path, prefix: &str) -> NevisResult<TempPath> {
    Builder::new()
        .prefix(prefix)
        .suffix(SUFFIX)
        .tempfile_in(dir)
        .map(|file| file.into_temp_path())
        .map_err(|e| {
            NevisError::internal(format!(
                "Failed to create temp file in {}: {e}",
                dir.display()
            ))
        })
}
