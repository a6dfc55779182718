//! Blocking access to the async AWS clients.
//!
//! Every adapter owns a current-thread runtime and drives its SDK calls with
//! `block_on`, so the core traits stay synchronous. Credentials come from the
//! standard AWS chain loaded by `aws-config`.

use std::future::Future;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_smithy_types::timeout::TimeoutConfig;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};

use curriculum_core::BackendConfig;

use crate::endpoint::runtime_endpoint;
use crate::error::AdapterError;

const JSON: &str = "application/json";

pub(crate) struct SdkRuntime {
    runtime: Runtime,
    config: SdkConfig,
}

impl SdkRuntime {
    pub(crate) fn load(backend: &BackendConfig) -> Result<Self, AdapterError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let timeout = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(backend.timeout.max(1)))
            .build();
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(timeout);
        let region = backend.region.trim();
        if !region.is_empty() {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = runtime.block_on(loader.load());

        Ok(Self { runtime, config })
    }

    pub(crate) fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// `InvokeModel` against a single model id with JSON bodies both ways.
pub(crate) struct ModelRuntime {
    sdk: SdkRuntime,
    client: aws_sdk_bedrockruntime::Client,
    model_id: String,
}

impl ModelRuntime {
    pub(crate) fn new(backend: &BackendConfig, model_id: &str) -> Result<Self, AdapterError> {
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Err(AdapterError::invalid_config("model id must not be empty"));
        }

        let endpoint = runtime_endpoint(backend)?;
        let sdk = SdkRuntime::load(backend)?;
        let mut builder = aws_sdk_bedrockruntime::config::Builder::from(sdk.config());
        if let Some(url) = endpoint {
            builder = builder.endpoint_url(url);
        }

        Ok(Self {
            client: aws_sdk_bedrockruntime::Client::from_conf(builder.build()),
            sdk,
            model_id: model_id.to_string(),
        })
    }

    pub(crate) fn model_id(&self) -> &str {
        &self.model_id
    }

    /// One call, no retries.
    pub(crate) fn invoke<B, R>(&self, body: &B) -> Result<R, AdapterError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)?;
        debug!("InvokeModel {} ({} byte body)", self.model_id, payload.len());

        let output = self
            .sdk
            .block_on(
                self.client
                    .invoke_model()
                    .model_id(&self.model_id)
                    .content_type(JSON)
                    .accept(JSON)
                    .body(Blob::new(payload))
                    .send(),
            )
            .map_err(AdapterError::sdk)?;

        Ok(serde_json::from_slice(output.body().as_ref())?)
    }
}
