use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::config::SamplingConfig;

/// Failure reported by a model backend. Core code only needs its message.
#[derive(Debug)]
pub struct LanguageModelError {
    inner: Box<dyn StdError + Send + Sync>,
}

impl LanguageModelError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(error),
        }
    }
}

impl fmt::Display for LanguageModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl StdError for LanguageModelError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}

/// A text completion backend. One call, one network round-trip, no retries.
pub trait LanguageModel: Send + Sync {
    fn invoke(&self, prompt: &str, sampling: &SamplingConfig)
        -> Result<String, LanguageModelError>;
}

impl<T: LanguageModel + ?Sized> LanguageModel for Box<T> {
    fn invoke(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, LanguageModelError> {
        (**self).invoke(prompt, sampling)
    }
}

impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    fn invoke(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, LanguageModelError> {
        (**self).invoke(prompt, sampling)
    }
}

/// Diffusion parameters sent with a single image request.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub cfg_scale: f32,
    pub seed: u32,
    pub steps: u32,
}

/// An image generation backend returning the first artifact as base64.
pub trait ImageModel: Send + Sync {
    fn generate(&self, request: &ImageRequest) -> Result<String, LanguageModelError>;
}

impl<T: ImageModel + ?Sized> ImageModel for Box<T> {
    fn generate(&self, request: &ImageRequest) -> Result<String, LanguageModelError> {
        (**self).generate(request)
    }
}

impl<T: ImageModel + ?Sized> ImageModel for Arc<T> {
    fn generate(&self, request: &ImageRequest) -> Result<String, LanguageModelError> {
        (**self).generate(request)
    }
}
