//! Process-backed external rank metric.
//!
//! The program is invoked as `<command...> <target.png> <frame.png>` and must
//! print a single number on stdout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use shaderloop_core::{Frame, MetricError, PerceptualMetric, RankDirection};
use tokio::process::Command;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CommandMetric {
    command: Vec<String>,
    name: String,
    direction: RankDirection,
    timeout: Duration,
}

impl CommandMetric {
    pub fn new(command: Vec<String>, name: impl Into<String>, direction: RankDirection) -> Self {
        Self {
            command,
            name: name.into(),
            direction,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn parse_value(stdout: &str) -> Result<f64, MetricError> {
    let text = stdout.trim();
    let value: f64 = text
        .parse()
        .map_err(|_| MetricError::Failed(format!("metric printed {text:?}, expected a number")))?;
    if !value.is_finite() {
        return Err(MetricError::Failed(format!("metric value {value} is not finite")));
    }
    Ok(value)
}

#[async_trait]
impl PerceptualMetric for CommandMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn direction(&self) -> RankDirection {
        self.direction
    }

    async fn measure(&self, target: &RgbImage, frame: &Frame) -> Result<f64, MetricError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| MetricError::Unavailable("metric command is empty".to_string()))?;

        let workdir = tempfile::tempdir().map_err(|e| MetricError::Unavailable(e.to_string()))?;
        let target_path = workdir.path().join("target.png");
        let frame_path = workdir.path().join("frame.png");
        target
            .save(&target_path)
            .map_err(|e| MetricError::Failed(e.to_string()))?;
        frame
            .image()
            .save(&frame_path)
            .map_err(|e| MetricError::Failed(e.to_string()))?;

        let child = Command::new(program)
            .args(args)
            .arg(&target_path)
            .arg(&frame_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MetricError::Unavailable(format!("failed to spawn {program}: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| MetricError::Failed("metric timed out".to_string()))?
            .map_err(|e| MetricError::Failed(e.to_string()))?;

        if !output.status.success() {
            return Err(MetricError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        parse_value(&String::from_utf8_lossy(&output.stdout))
    }
}
