// ============================================================================
// AI SERVICES: asset hosting and generation pipeline collaborators
// ============================================================================
//
// The orchestrator talks to two external services through the traits below.
// Two concrete backends ship with the crate:
//   * `DirectoryAssetHost` "uploads" inline images into a local directory
//     and hands back `file://` URLs.
//   * `CommandPipeline` runs a configured bridge command, sending the
//     request as JSON on stdin and reading the generated image reference(s)
//     from stdout.

#![allow(async_fn_in_trait)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::io::{ImageAsset, strip_data_uri_prefix};
use crate::ops::dispatch::{PipelineId, PipelineParameters};

// -- Errors -------------------------------------------------------------

/// Errors raised by an asset host.
#[derive(Debug)]
pub enum HostingError {
    /// The service refused the payload.
    Rejected(String),
    InvalidPayload(String),
    Io(std::io::Error),
}

impl std::fmt::Display for HostingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostingError::Rejected(e) => write!(f, "Asset upload rejected: {}", e),
            HostingError::InvalidPayload(e) => write!(f, "Invalid asset payload: {}", e),
            HostingError::Io(e) => write!(f, "Asset upload I/O error: {}", e),
        }
    }
}

impl std::error::Error for HostingError {}

impl From<std::io::Error> for HostingError {
    fn from(e: std::io::Error) -> Self {
        HostingError::Io(e)
    }
}

/// Errors raised by a generation pipeline. Distinct from hosting errors.
#[derive(Debug)]
pub enum PipelineError {
    InvalidParameters(String),
    Upstream(String),
    /// The pipeline succeeded but produced no image.
    EmptyResult,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::InvalidParameters(e) => write!(f, "Pipeline rejected parameters: {}", e),
            PipelineError::Upstream(e) => write!(f, "Pipeline failed: {}", e),
            PipelineError::EmptyResult => write!(f, "Pipeline returned no image"),
        }
    }
}

impl std::error::Error for PipelineError {}

// -- Collaborator traits --------------------------------------------------

/// Turns an image asset into a stable, network-addressable reference.
pub trait AssetHost {
    async fn store(&mut self, asset: &ImageAsset) -> Result<String, HostingError>;
}

/// What a pipeline hands back: one reference or a collection of them.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PipelineOutput {
    Single(String),
    Many(Vec<String>),
}

impl PipelineOutput {
    /// The image to use: the reference itself, or the first of a collection.
    /// Blank references count as missing.
    pub fn into_first(self) -> Option<String> {
        let first = match self {
            PipelineOutput::Single(s) => Some(s),
            PipelineOutput::Many(v) => v.into_iter().next(),
        };
        first.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }
}

/// Executes one generation call.
pub trait GenerationPipeline {
    async fn invoke(
        &mut self,
        pipeline: PipelineId,
        model: &str,
        parameters: &PipelineParameters,
    ) -> Result<PipelineOutput, PipelineError>;
}

// -- Directory asset host ---------------------------------------------------

/// Stores uploads as files under `dir`, one fresh name per upload.
#[derive(Clone, Debug)]
pub struct DirectoryAssetHost {
    dir: PathBuf,
}

impl DirectoryAssetHost {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn extension_for(bytes: &[u8]) -> Result<&'static str, HostingError> {
        match image::guess_format(bytes) {
            Ok(image::ImageFormat::Png) => Ok("png"),
            Ok(image::ImageFormat::Jpeg) => Ok("jpg"),
            Ok(image::ImageFormat::WebP) => Ok("webp"),
            Ok(image::ImageFormat::Bmp) => Ok("bmp"),
            Ok(other) => Err(HostingError::Rejected(format!("unsupported image format {:?}", other))),
            Err(e) => Err(HostingError::Rejected(format!("payload is not an image: {}", e))),
        }
    }
}

impl AssetHost for DirectoryAssetHost {
    async fn store(&mut self, asset: &ImageAsset) -> Result<String, HostingError> {
        let uri = match asset {
            ImageAsset::Hosted(url) => return Ok(url.clone()),
            ImageAsset::Inline(uri) => uri,
        };
        let payload = strip_data_uri_prefix(uri);
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| HostingError::InvalidPayload(e.to_string()))?;
        let ext = Self::extension_for(&bytes)?;

        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.{}", Uuid::new_v4(), ext));
        std::fs::write(&path, &bytes)?;
        let path = path.canonicalize().unwrap_or(path);
        log_info!("Stored asset {} ({} bytes)", path.display(), bytes.len());
        Ok(format!("file://{}", path.display()))
    }
}

// -- Command pipeline -------------------------------------------------------

/// Runs `program args...` once per generation.
///
/// stdin receives `{"pipeline": ..., "model": ..., "input": {...}}`. stdout must
/// hold either a JSON string, a JSON array of strings, an object with an
/// `output` field of either shape, or a bare URL on the first line.
///
/// `invoke` waits for the child process synchronously, blocking the calling
/// thread until the command exits.
#[derive(Clone, Debug)]
pub struct CommandPipeline {
    program: String,
    args: Vec<String>,
}

impl CommandPipeline {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits a whitespace-separated command line. `None` when blank.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[derive(Deserialize)]
struct OutputEnvelope {
    output: Option<PipelineOutput>,
    error: Option<String>,
}

/// Interprets the bridge command's stdout.
pub fn parse_pipeline_reply(stdout: &str) -> Result<PipelineOutput, PipelineError> {
    let text = stdout.trim();
    if text.is_empty() {
        return Err(PipelineError::EmptyResult);
    }
    if let Ok(output) = serde_json::from_str::<PipelineOutput>(text) {
        return Ok(output);
    }
    if let Ok(envelope) = serde_json::from_str::<OutputEnvelope>(text) {
        if let Some(error) = envelope.error {
            return Err(PipelineError::Upstream(error));
        }
        return envelope.output.ok_or(PipelineError::EmptyResult);
    }
    match text.lines().next().map(str::trim) {
        Some(line) if !line.starts_with('{') && !line.starts_with('[') => {
            Ok(PipelineOutput::Single(line.to_string()))
        }
        _ => Err(PipelineError::Upstream(format!("unreadable pipeline reply: {}", text))),
    }
}

impl GenerationPipeline for CommandPipeline {
    async fn invoke(
        &mut self,
        pipeline: PipelineId,
        model: &str,
        parameters: &PipelineParameters,
    ) -> Result<PipelineOutput, PipelineError> {
        let payload = json!({
            "pipeline": pipeline,
            "model": model,
            "input": parameters,
        });
        let body = serde_json::to_vec(&payload).map_err(|e| PipelineError::InvalidParameters(e.to_string()))?;

        log_info!("Running pipeline command '{}' for {}", self.program, model);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::Upstream(format!("could not start '{}': {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&body)
                .map_err(|e| PipelineError::Upstream(format!("could not send request: {}", e)))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| PipelineError::Upstream(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Upstream(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        parse_pipeline_reply(&String::from_utf8_lossy(&output.stdout))
    }
}
