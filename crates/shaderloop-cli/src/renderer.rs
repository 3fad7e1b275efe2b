//! Process-backed renderer.
//!
//! Each attempt runs the configured program in a fresh temporary directory.
//! The program receives its inputs through environment variables:
//!
//! - `SHADERLOOP_SOURCE`: path of the fragment shader source
//! - `SHADERLOOP_INPUT`: path of the target image (bound to `u_input`)
//! - `SHADERLOOP_OUTPUT_DIR`: where `frame_00.png`, `frame_01.png`, ... go
//! - `SHADERLOOP_FRAMES`, `SHADERLOOP_TIMES`: frame count and comma-separated `u_time` values
//! - `SHADERLOOP_WIDTH`, `SHADERLOOP_HEIGHT`: output size
//!
//! A non-zero exit is a compile failure whose stderr becomes the diagnostic,
//! except [`CONTEXT_EXIT_CODE`], which reports an unavailable graphics context.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use shaderloop_core::{Frame, RenderError, RenderRequest, Renderer};
use tokio::process::Command;
use tracing::debug;

/// `EX_TEMPFAIL`: the program could not acquire a rendering context.
pub const CONTEXT_EXIT_CODE: i32 = 75;

pub const SOURCE_FILE_NAME: &str = "shader.frag";
pub const INPUT_FILE_NAME: &str = "input.png";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Output file name of frame `index`.
pub fn output_frame_name(index: usize) -> String {
    format!("frame_{index:02}.png")
}

#[derive(Debug, Clone)]
pub struct CommandRenderer {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn context_err(msg: impl std::fmt::Display) -> RenderError {
        RenderError::Context(msg.to_string())
    }

    fn read_frames(dir: &Path, request: &RenderRequest<'_>) -> Result<Vec<Frame>, RenderError> {
        let times = request.frame_times();
        let mut frames = Vec::with_capacity(times.len());
        for (index, time) in times.into_iter().enumerate() {
            let path = dir.join(output_frame_name(index));
            if !path.exists() {
                break;
            }
            let image = image::open(&path)
                .map_err(|e| RenderError::Output(format!("{}: {e}", path.display())))?
                .to_rgb8();
            frames.push(Frame::new(image, time));
        }
        if frames.is_empty() {
            return Err(RenderError::NoFrames);
        }
        Ok(frames)
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<Frame>, RenderError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| Self::context_err("renderer command is empty"))?;

        // Removed on every exit path when `workdir` drops.
        let workdir = tempfile::tempdir().map_err(Self::context_err)?;
        let source_path = workdir.path().join(SOURCE_FILE_NAME);
        let input_path = workdir.path().join(INPUT_FILE_NAME);
        let output_dir: PathBuf = workdir.path().join("out");

        std::fs::write(&source_path, request.source).map_err(Self::context_err)?;
        request
            .target
            .save(&input_path)
            .map_err(Self::context_err)?;
        std::fs::create_dir_all(&output_dir).map_err(Self::context_err)?;

        let times = request
            .frame_times()
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let (width, height) = request.resolution;

        let start = Instant::now();
        let child = Command::new(program)
            .args(args)
            .current_dir(workdir.path())
            .env("SHADERLOOP_SOURCE", &source_path)
            .env("SHADERLOOP_INPUT", &input_path)
            .env("SHADERLOOP_OUTPUT_DIR", &output_dir)
            .env("SHADERLOOP_FRAMES", request.frame_count.max(1).to_string())
            .env("SHADERLOOP_TIMES", times)
            .env("SHADERLOOP_WIDTH", width.to_string())
            .env("SHADERLOOP_HEIGHT", height.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::context_err(format!("failed to spawn {program}: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Self::context_err(format!(
                    "renderer timed out after {} seconds",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(Self::context_err)?;

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(
            exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "renderer finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(if exit_code == CONTEXT_EXIT_CODE {
                RenderError::Context(stderr)
            } else {
                RenderError::Compile(stderr)
            });
        }

        Self::read_frames(&output_dir, request)
    }
}
