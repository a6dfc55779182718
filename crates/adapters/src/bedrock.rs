use log::warn;
use serde::{Deserialize, Serialize};

use curriculum_core::{BackendConfig, LanguageModel, LanguageModelError, SamplingConfig};

use crate::error::AdapterError;
use crate::sdk::ModelRuntime;

const HUMAN_TURN: &str = "\n\nHuman: ";
const ASSISTANT_TURN: &str = "\n\nAssistant:";

/// Text completion through Bedrock `InvokeModel`.
pub struct BedrockTextModel {
    runtime: ModelRuntime,
}

impl BedrockTextModel {
    pub fn new(config: &BackendConfig, model_id: &str) -> Result<Self, AdapterError> {
        Ok(Self {
            runtime: ModelRuntime::new(config, model_id)?,
        })
    }

    pub fn model_id(&self) -> &str {
        self.runtime.model_id()
    }

    fn invoke_once(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, AdapterError> {
        let body = encode_completion_request(prompt, sampling);
        let parsed: CompletionResponse = self.runtime.invoke(&body)?;
        decode_completion(parsed)
    }
}

impl LanguageModel for BedrockTextModel {
    fn invoke(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, LanguageModelError> {
        Ok(self.invoke_once(prompt, sampling)?)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CompletionRequest<'a> {
    prompt: String,
    max_tokens_to_sample: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop_sequences: &'a [String],
}

fn no_stop_sequences(stops: &&[String]) -> bool {
    stops.is_empty()
}

pub(crate) fn encode_completion_request<'a>(
    prompt: &str,
    sampling: &'a SamplingConfig,
) -> CompletionRequest<'a> {
    CompletionRequest {
        prompt: format!("{HUMAN_TURN}{}{ASSISTANT_TURN}", prompt.trim()),
        max_tokens_to_sample: sampling.max_tokens,
        temperature: sampling.temperature,
        top_p: sampling.top_p,
        stop_sequences: &sampling.stop_sequences,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionResponse {
    #[serde(default)]
    completion: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
}

pub(crate) fn decode_completion(response: CompletionResponse) -> Result<String, AdapterError> {
    if response.stop_reason.as_deref() == Some("max_tokens") {
        warn!("completion truncated by the max_tokens_to_sample limit");
    }

    response.completion.ok_or(AdapterError::EmptyResponse)
}
