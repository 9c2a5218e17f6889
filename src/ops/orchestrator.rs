// ============================================================================
// EDIT ORCHESTRATION: host assets, dispatch, generate, record
// ============================================================================
//
// One submission runs strictly in order:
//   1. validate prompt and input shape (no I/O yet)
//   2. host the base image if it is inline
//   3. host the mask if one is drawn
//   4. dispatch + invoke the pipeline
//   5. commit: new current image, one history entry, editor reset
// Any failure returns before step 5, so the session is left untouched.
// `submit` borrows the session mutably for its whole run, which rules out two
// submissions interleaving on the same session.

use crate::components::history::HistoryEntry;
use crate::io::{AssetError, ImageAsset};
use crate::ops::ai::{AssetHost, GenerationPipeline, HostingError, PipelineError};
use crate::ops::dispatch::{DispatchError, DispatchPlan, GenerationRequest, ModeFlags, dispatch, select_pipeline};
use crate::project::DesignSession;
use crate::settings::GenerationSettings;

/// The single error a failed submission reports.
#[derive(Debug)]
pub enum EditError {
    Dispatch(DispatchError),
    /// The drawn mask could not be encoded for upload.
    Mask(AssetError),
    Hosting(HostingError),
    Pipeline(PipelineError),
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::Dispatch(e) => write!(f, "{}", e),
            EditError::Mask(e) => write!(f, "Failed to prepare mask: {}", e),
            EditError::Hosting(e) => write!(f, "Failed to upload image: {}", e),
            EditError::Pipeline(e) => write!(f, "Failed to generate image: {}", e),
        }
    }
}

impl std::error::Error for EditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EditError::Dispatch(e) => Some(e),
            EditError::Mask(e) => Some(e),
            EditError::Hosting(e) => Some(e),
            EditError::Pipeline(e) => Some(e),
        }
    }
}

impl From<DispatchError> for EditError {
    fn from(e: DispatchError) -> Self {
        EditError::Dispatch(e)
    }
}

impl From<AssetError> for EditError {
    fn from(e: AssetError) -> Self {
        EditError::Mask(e)
    }
}

impl From<HostingError> for EditError {
    fn from(e: HostingError) -> Self {
        EditError::Hosting(e)
    }
}

impl From<PipelineError> for EditError {
    fn from(e: PipelineError) -> Self {
        EditError::Pipeline(e)
    }
}

/// Dispatches the session's current state without any I/O. Inline assets
/// appear in the plan as-is.
pub fn plan_edit(session: &DesignSession, prompt: &str, settings: &GenerationSettings) -> Result<DispatchPlan, EditError> {
    let base = session.current_image().map(|i| i.as_str().to_string());
    let mask = session.editor.mask_asset()?.map(|m| m.as_str().to_string());
    Ok(dispatch(&GenerationRequest::new(prompt.trim(), base, mask), settings)?)
}

/// Drives asset hosting and generation for a design session.
pub struct EditOrchestrator<H, P> {
    host: H,
    pipeline: P,
    settings: GenerationSettings,
}

impl<H: AssetHost, P: GenerationPipeline> EditOrchestrator<H, P> {
    pub fn new(host: H, pipeline: P, settings: GenerationSettings) -> Self {
        Self { host, pipeline, settings }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut P {
        &mut self.pipeline
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Builds the plan a submission would execute, without hosting anything.
    pub fn preview(&self, session: &DesignSession, prompt: &str) -> Result<DispatchPlan, EditError> {
        plan_edit(session, prompt, &self.settings)
    }

    /// Runs one edit end to end and returns the history entry it appended.
    pub async fn submit(&mut self, session: &mut DesignSession, prompt: &str) -> Result<HistoryEntry, EditError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(DispatchError::EmptyPrompt.into());
        }

        let output = match self.generate(session, prompt).await {
            Ok(output) => output,
            Err(e) => {
                log_err!("Edit '{}' failed: {}", prompt, e);
                return Err(e);
            }
        };

        let entry = session.record_generation(prompt, output);
        log_info!("Edit '{}' produced {}", prompt, entry.output);
        Ok(entry)
    }

    async fn generate(&mut self, session: &DesignSession, prompt: &str) -> Result<String, EditError> {
        let base = session.current_image();
        let mask = session.editor.mask_asset()?;

        // Reject impossible shapes before touching the network.
        let flags = ModeFlags::new(base.is_some(), mask.is_some());
        let pipeline = select_pipeline(flags)?;
        log_info!("Submitting '{}' via {}", prompt, pipeline.label());

        let base_ref = match base {
            Some(image) => Some(self.ensure_hosted(image).await?),
            None => None,
        };
        let mask_ref = match &mask {
            Some(mask) => Some(self.ensure_hosted(mask).await?),
            None => None,
        };

        let request = GenerationRequest::new(prompt, base_ref, mask_ref);
        let plan = dispatch(&request, &self.settings)?;
        let output = self
            .pipeline
            .invoke(plan.pipeline, &plan.model, &plan.parameters)
            .await?;
        Ok(output.into_first().ok_or(PipelineError::EmptyResult)?)
    }

    async fn ensure_hosted(&mut self, asset: &ImageAsset) -> Result<String, EditError> {
        if let Some(url) = asset.hosted_url() {
            return Ok(url.to_string());
        }
        let url = self.host.store(asset).await?;
        log_info!("Uploaded {} -> {}", asset.summary(), url);
        Ok(url)
    }
}
