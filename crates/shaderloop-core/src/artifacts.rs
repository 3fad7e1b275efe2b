//! Persisted run artifacts: the input image, per-iteration frames and a
//! JSON summary of the run.
//!
//! Frame references are deterministic: `iter_{NN}.png` for single-frame
//! iterations, `iter_{NN}_f{MM}.png` otherwise (1-based, 2-digit).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{BestRecord, Frame, IterationRecord, RunOutcome};

/// File name of the stored target image.
pub const INPUT_FILE_NAME: &str = "input.png";

/// File name of the run summary.
pub const SUMMARY_FILE_NAME: &str = "run.json";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to serialize run summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reference for frame `frame` (0-based) of iteration `iteration` (0-based).
pub fn frame_file_name(iteration: u32, frame: usize, frame_count: u32) -> String {
    if frame_count > 1 {
        format!("iter_{:02}_f{:02}.png", iteration + 1, frame + 1)
    } else {
        format!("iter_{:02}.png", iteration + 1)
    }
}

/// References for every frame of one iteration.
pub fn frame_references(iteration: u32, frames: usize, frame_count: u32) -> Vec<String> {
    (0..frames)
        .map(|f| frame_file_name(iteration, f, frame_count))
        .collect()
}

/// Directory-backed store for run artifacts.
#[derive(Debug, Clone)]
pub struct FrameStore {
    root: PathBuf,
}

impl FrameStore {
    /// Open (creating if needed) an artifact directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| ArtifactError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, reference: &str) -> PathBuf {
        self.root.join(reference)
    }

    pub fn save_input(&self, image: &RgbImage) -> Result<PathBuf, ArtifactError> {
        self.save_image(INPUT_FILE_NAME, image)
    }

    /// Write every frame of an iteration under its reference.
    pub fn save_frames(
        &self,
        references: &[String],
        frames: &[Frame],
    ) -> Result<Vec<PathBuf>, ArtifactError> {
        references
            .iter()
            .zip(frames)
            .map(|(reference, frame)| self.save_image(reference, frame.image()))
            .collect()
    }

    /// Write `run.json` describing the whole run.
    pub fn write_summary(&self, outcome: &RunOutcome) -> Result<PathBuf, ArtifactError> {
        let summary = RunSummaryArtifact::from_outcome(outcome);
        let content = serde_json::to_string_pretty(&summary)?;
        let path = self.path_for(SUMMARY_FILE_NAME);
        std::fs::write(&path, content).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    fn save_image(&self, reference: &str, image: &RgbImage) -> Result<PathBuf, ArtifactError> {
        let path = self.path_for(reference);
        image.save(&path).map_err(|source| ArtifactError::Encode {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Persisted `run.json` layout.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummaryArtifact<'a> {
    pub schema_version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub run_id: Uuid,
    pub cancelled: bool,
    pub best: &'a BestRecord,
    pub records: &'a [IterationRecord],
}

impl<'a> RunSummaryArtifact<'a> {
    pub fn from_outcome(outcome: &'a RunOutcome) -> Self {
        Self {
            schema_version: "1.0",
            generated_at: Utc::now(),
            run_id: outcome.run_id,
            cancelled: outcome.cancelled,
            best: &outcome.best,
            records: &outcome.records,
        }
    }
}
