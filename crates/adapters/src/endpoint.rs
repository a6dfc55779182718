use curriculum_core::BackendConfig;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AdapterError;

static REGION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}(-gov)?-[a-z]+-\d+$").expect("valid region pattern"));
static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^/\s]+").expect("valid scheme pattern"));

pub(crate) fn validate_region(region: &str) -> Result<&str, AdapterError> {
    let region = region.trim();
    if region.is_empty() {
        return Err(AdapterError::invalid_config(
            "region is not configured; set AWS_REGION or an explicit endpoint",
        ));
    }
    if !REGION_RE.is_match(region) {
        return Err(AdapterError::invalid_config(format!(
            "`{region}` is not a valid region identifier"
        )));
    }
    Ok(region)
}

/// Endpoint override for model invocation. `None` leaves resolution to the SDK.
pub(crate) fn runtime_endpoint(config: &BackendConfig) -> Result<Option<String>, AdapterError> {
    resolve(config.runtime_endpoint.as_deref(), &config.region)
}

/// Endpoint override for knowledge-base retrieval.
pub(crate) fn agent_endpoint(config: &BackendConfig) -> Result<Option<String>, AdapterError> {
    resolve(config.agent_endpoint.as_deref(), &config.region)
}

/// A configured region must be well formed; it may only be blank when an
/// explicit endpoint is given.
fn resolve(explicit: Option<&str>, region: &str) -> Result<Option<String>, AdapterError> {
    let explicit = explicit.map(str::trim).filter(|url| !url.is_empty());
    if explicit.is_none() || !region.trim().is_empty() {
        validate_region(region)?;
    }
    explicit.map(normalize_endpoint).transpose()
}

pub(crate) fn normalize_endpoint(input: &str) -> Result<String, AdapterError> {
    let trimmed = input.trim();
    if !SCHEME_RE.is_match(trimmed) {
        return Err(AdapterError::invalid_config(format!(
            "endpoint `{trimmed}` must start with http:// or https://"
        )));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(region: &str) -> BackendConfig {
        BackendConfig {
            region: region.to_string(),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn region_alone_leaves_endpoints_to_the_sdk() {
        let config = backend("us-east-1");
        assert_eq!(runtime_endpoint(&config).unwrap(), None);
        assert_eq!(agent_endpoint(&config).unwrap(), None);
    }

    #[test]
    fn explicit_endpoint_wins_and_loses_trailing_slash() {
        let mut config = backend("");
        config.runtime_endpoint = Some("http://localhost:4010/".into());
        assert_eq!(
            runtime_endpoint(&config).unwrap().as_deref(),
            Some("http://localhost:4010")
        );
        assert!(agent_endpoint(&config).is_err());
    }

    #[test]
    fn malformed_region_is_rejected_even_with_endpoint() {
        let mut config = backend("US-EAST-1");
        config.agent_endpoint = Some("https://vpce-1.example.com".into());
        assert!(matches!(
            agent_endpoint(&config),
            Err(AdapterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn malformed_regions_are_rejected() {
        for region in ["", "US-EAST-1", "us-east", "useast1", "us-east-1/"] {
            assert!(
                matches!(validate_region(region), Err(AdapterError::InvalidConfig(_))),
                "{region:?}"
            );
        }
        assert_eq!(validate_region(" us-gov-west-1 ").unwrap(), "us-gov-west-1");
        assert_eq!(validate_region("sa-east-1").unwrap(), "sa-east-1");
    }

    #[test]
    fn endpoint_requires_scheme() {
        assert!(normalize_endpoint("bedrock.local").is_err());
        assert_eq!(
            normalize_endpoint(" https://vpce-1.example.com// ").unwrap(),
            "https://vpce-1.example.com"
        );
    }
}
