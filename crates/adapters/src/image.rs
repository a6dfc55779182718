use log::warn;
use serde::{Deserialize, Serialize};

use curriculum_core::{BackendConfig, ImageModel, ImageRequest, LanguageModelError};

use crate::error::AdapterError;
use crate::sdk::ModelRuntime;

/// Stable Diffusion text-to-image through Bedrock `InvokeModel`.
pub struct StabilityImageModel {
    runtime: ModelRuntime,
}

impl StabilityImageModel {
    pub fn new(config: &BackendConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            runtime: ModelRuntime::new(config, &config.image_model_id)?,
        })
    }

    fn generate_once(&self, request: &ImageRequest) -> Result<String, AdapterError> {
        let body = encode_image_request(request);
        let parsed: ImageResponse = self.runtime.invoke(&body)?;
        decode_image_response(parsed)
    }
}

impl ImageModel for StabilityImageModel {
    fn generate(&self, request: &ImageRequest) -> Result<String, LanguageModelError> {
        Ok(self.generate_once(request)?)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TextToImageRequest<'a> {
    text_prompts: [TextPrompt<'a>; 1],
    cfg_scale: f32,
    seed: u32,
    steps: u32,
}

#[derive(Debug, Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
}

pub(crate) fn encode_image_request(request: &ImageRequest) -> TextToImageRequest<'_> {
    TextToImageRequest {
        text_prompts: [TextPrompt {
            text: &request.prompt,
        }],
        cfg_scale: request.cfg_scale,
        seed: request.seed,
        steps: request.steps,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    #[serde(default)]
    base64: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Returns the first artifact's base64 payload.
pub(crate) fn decode_image_response(response: ImageResponse) -> Result<String, AdapterError> {
    let artifact = response
        .artifacts
        .into_iter()
        .next()
        .ok_or(AdapterError::EmptyResponse)?;

    if artifact.finish_reason.as_deref() == Some("CONTENT_FILTERED") {
        warn!("image artifact was altered by the content filter");
    }

    match artifact.base64 {
        Some(payload) if !payload.trim().is_empty() => Ok(payload),
        _ => Err(AdapterError::EmptyResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_carries_fixed_diffusion_parameters() {
        let request = ImageRequest {
            prompt: "laboratorio".into(),
            cfg_scale: 10.0,
            seed: 0,
            steps: 50,
        };
        let body = serde_json::to_value(encode_image_request(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "text_prompts": [{ "text": "laboratorio" }],
                "cfg_scale": 10.0,
                "seed": 0,
                "steps": 50
            })
        );
    }

    #[test]
    fn first_artifact_is_returned() {
        let parsed: ImageResponse = serde_json::from_value(json!({
            "result": "success",
            "artifacts": [
                { "base64": "AAAA", "finishReason": "SUCCESS" },
                { "base64": "BBBB", "finishReason": "SUCCESS" }
            ]
        }))
        .unwrap();
        assert_eq!(decode_image_response(parsed).unwrap(), "AAAA");
    }

    #[test]
    fn no_artifacts_is_empty_response() {
        let parsed: ImageResponse = serde_json::from_value(json!({ "artifacts": [] })).unwrap();
        assert!(matches!(
            decode_image_response(parsed),
            Err(AdapterError::EmptyResponse)
        ));
    }
}
