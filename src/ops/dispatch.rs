// ============================================================================
// GENERATION DISPATCH: editing state to pipeline + parameters
// ============================================================================
//
// Decision table:
//
//   base image | mask  | pipeline
//   -----------+-------+-----------------
//   no         | no    | TextToImage
//   yes        | yes   | Inpaint
//   yes        | no    | StructuralEdit
//   no         | yes   | InvalidCombination
//
// "Structural edit" is not an input of its own: it is the name of the
// base-image-without-mask row.

use serde::{Deserialize, Serialize};

use crate::settings::GenerationSettings;

/// The three generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineId {
    TextToImage,
    Inpaint,
    StructuralEdit,
}

impl PipelineId {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineId::TextToImage => "Text to image",
            PipelineId::Inpaint => "Inpaint",
            PipelineId::StructuralEdit => "Structural edit",
        }
    }

    /// Upstream model identifier configured for this pipeline.
    pub fn model<'a>(&self, settings: &'a GenerationSettings) -> &'a str {
        match self {
            PipelineId::TextToImage => &settings.text_to_image_model,
            PipelineId::Inpaint => &settings.inpaint_model,
            PipelineId::StructuralEdit => &settings.structural_model,
        }
    }
}

/// Errors raised before any request leaves the process.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The input shape has no pipeline (e.g. a mask without a base image).
    InvalidCombination(String),
    /// Prompt was empty or whitespace.
    EmptyPrompt,
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::InvalidCombination(e) => write!(f, "Invalid request: {}", e),
            DispatchError::EmptyPrompt => write!(f, "Invalid request: the prompt is empty"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// The shape of the editing state the decision depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeFlags {
    pub has_base_image: bool,
    pub has_mask: bool,
}

impl ModeFlags {
    pub fn new(has_base_image: bool, has_mask: bool) -> Self {
        Self { has_base_image, has_mask }
    }

    /// True when a whole image is being restyled without a mask.
    pub fn structural_edit(&self) -> bool {
        self.has_base_image && !self.has_mask
    }
}

/// Picks the pipeline for a set of flags.
pub fn select_pipeline(flags: ModeFlags) -> Result<PipelineId, DispatchError> {
    match (flags.has_base_image, flags.has_mask) {
        (false, false) => Ok(PipelineId::TextToImage),
        (false, true) => Err(DispatchError::InvalidCombination(
            "a mask was provided without a base image".into(),
        )),
        (true, true) => Ok(PipelineId::Inpaint),
        (true, false) => Ok(PipelineId::StructuralEdit),
    }
}

/// What the orchestrator asks for, with every asset already addressable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub base_image_ref: Option<String>,
    pub mask_ref: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, base_image_ref: Option<String>, mask_ref: Option<String>) -> Self {
        Self {
            prompt: prompt.into(),
            base_image_ref,
            mask_ref,
        }
    }

    pub fn flags(&self) -> ModeFlags {
        ModeFlags::new(self.base_image_ref.is_some(), self.mask_ref.is_some())
    }

    pub fn structural_edit(&self) -> bool {
        self.flags().structural_edit()
    }
}

/// Input payload sent to a pipeline. Field names follow the upstream API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineParameters {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_image: Option<String>,
    pub num_inference_steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f32>,
    pub num_samples: u32,
    pub scheduler: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
}

/// A fully-formed call for the orchestrator to execute.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DispatchPlan {
    pub pipeline: PipelineId,
    pub model: String,
    pub parameters: PipelineParameters,
}

/// Validates `request` and builds the pipeline call. No I/O.
pub fn dispatch(request: &GenerationRequest, settings: &GenerationSettings) -> Result<DispatchPlan, DispatchError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(DispatchError::EmptyPrompt);
    }
    let pipeline = select_pipeline(request.flags())?;
    let full_prompt = format!("{}{}", prompt, settings.prompt_suffix);

    let parameters = match pipeline {
        PipelineId::TextToImage => PipelineParameters {
            prompt: full_prompt,
            image: None,
            mask: None,
            control_image: None,
            num_inference_steps: settings.num_inference_steps,
            guidance_scale: Some(settings.guidance_scale),
            num_samples: settings.num_samples,
            scheduler: settings.scheduler.clone(),
            strength: None,
        },
        PipelineId::Inpaint => PipelineParameters {
            prompt: full_prompt,
            image: request.base_image_ref.clone(),
            mask: request.mask_ref.clone(),
            control_image: None,
            num_inference_steps: settings.num_inference_steps,
            guidance_scale: None,
            num_samples: settings.num_samples,
            scheduler: settings.scheduler.clone(),
            strength: Some(settings.inpaint_strength),
        },
        PipelineId::StructuralEdit => PipelineParameters {
            prompt: full_prompt,
            image: None,
            mask: None,
            control_image: request.base_image_ref.clone(),
            num_inference_steps: settings.num_inference_steps,
            guidance_scale: Some(settings.guidance_scale),
            num_samples: settings.num_samples,
            scheduler: settings.scheduler.clone(),
            strength: None,
        },
    };

    Ok(DispatchPlan {
        pipeline,
        model: pipeline.model(settings).to_string(),
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_follows_base_and_mask() {
        assert_eq!(select_pipeline(ModeFlags::new(false, false)), Ok(PipelineId::TextToImage));
        assert_eq!(select_pipeline(ModeFlags::new(true, true)), Ok(PipelineId::Inpaint));
        assert_eq!(select_pipeline(ModeFlags::new(true, false)), Ok(PipelineId::StructuralEdit));
        assert!(ModeFlags::new(true, false).structural_edit());
        assert!(!ModeFlags::new(true, true).structural_edit());
        assert!(!ModeFlags::new(false, false).structural_edit());
    }

    #[test]
    fn test_mask_without_base_image_is_invalid() {
        let err = select_pipeline(ModeFlags::new(false, true)).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidCombination(_)));
        assert!(err.to_string().contains("without a base image"));
    }

    #[test]
    fn test_every_image_edit_gets_a_pipeline() {
        let settings = GenerationSettings::default();
        let masked = GenerationRequest::new("add a lamp", Some("https://img/a.png".into()), Some("https://img/m.png".into()));
        assert_eq!(dispatch(&masked, &settings).map(|p| p.pipeline), Ok(PipelineId::Inpaint));
        let whole = GenerationRequest::new("make it boho", Some("https://img/a.png".into()), None);
        assert_eq!(dispatch(&whole, &settings).map(|p| p.pipeline), Ok(PipelineId::StructuralEdit));
    }

    #[test]
    fn test_text_to_image_parameters() {
        let settings = GenerationSettings::default();
        let plan = dispatch(&GenerationRequest::new("a cozy loft", None, None), &settings).unwrap();
        assert_eq!(plan.pipeline, PipelineId::TextToImage);
        assert_eq!(plan.model, "black-forest-labs/flux-1.1-pro");
        assert_eq!(plan.parameters.prompt, "a cozy loft, super detailed, realistic, 8k");
        assert_eq!(plan.parameters.num_inference_steps, 30);
        assert_eq!(plan.parameters.guidance_scale, Some(7.5));
        assert_eq!(plan.parameters.num_samples, 1);
        assert_eq!(plan.parameters.scheduler, "DPM++ 2M Karras");
        assert_eq!(plan.parameters.image, None);
    }

    #[test]
    fn test_inpaint_parameters() {
        let settings = GenerationSettings::default();
        let request = GenerationRequest::new(
            "add a lamp",
            Some("https://img/room.png".into()),
            Some("https://img/mask.png".into()),
        );
        assert!(!request.structural_edit());
        let plan = dispatch(&request, &settings).unwrap();
        assert_eq!(plan.pipeline, PipelineId::Inpaint);
        assert_eq!(plan.model, "black-forest-labs/flux-fill-pro");
        assert_eq!(plan.parameters.image.as_deref(), Some("https://img/room.png"));
        assert_eq!(plan.parameters.mask.as_deref(), Some("https://img/mask.png"));
        assert_eq!(plan.parameters.strength, Some(0.99));
        assert_eq!(plan.parameters.control_image, None);
    }

    #[test]
    fn test_structural_edit_parameters() {
        let settings = GenerationSettings::default();
        let request = GenerationRequest::new("industrial style", Some("https://img/room.png".into()), None);
        assert!(request.structural_edit());
        let plan = dispatch(&request, &settings).unwrap();
        assert_eq!(plan.pipeline, PipelineId::StructuralEdit);
        assert_eq!(plan.parameters.control_image.as_deref(), Some("https://img/room.png"));
        assert_eq!(plan.parameters.image, None);

        let json = serde_json::to_value(&plan.parameters).unwrap();
        assert!(json.get("mask").is_none());
        assert_eq!(json["control_image"], "https://img/room.png");
    }

    #[test]
    fn test_blank_prompt_rejected() {
        let settings = GenerationSettings::default();
        let err = dispatch(&GenerationRequest::new("   ", None, None), &settings).unwrap_err();
        assert_eq!(err, DispatchError::EmptyPrompt);
    }
}
