use std::collections::BTreeMap;

use aws_sdk_bedrockagentruntime::types::{
    KnowledgeBaseQuery, KnowledgeBaseRetrievalConfiguration, KnowledgeBaseRetrievalResult,
    KnowledgeBaseVectorSearchConfiguration, RetrievalResultLocation,
    SearchType as OverrideSearchType,
};
use aws_sdk_bedrockagentruntime::Client;
use aws_smithy_types::{Document, Number};
use log::debug;
use serde_json::Value;

use curriculum_core::{
    BackendConfig, RetrievalBackend, RetrievalError, RetrievalQuery, RetrievedDocument,
    SearchType,
};

use crate::endpoint::agent_endpoint;
use crate::error::AdapterError;
use crate::sdk::SdkRuntime;

/// Knowledge-base `Retrieve` over the Bedrock agent runtime.
pub struct BedrockKnowledgeBase {
    sdk: SdkRuntime,
    client: Client,
}

impl BedrockKnowledgeBase {
    pub fn new(config: &BackendConfig) -> Result<Self, AdapterError> {
        let endpoint = agent_endpoint(config)?;
        let sdk = SdkRuntime::load(config)?;
        let mut builder = aws_sdk_bedrockagentruntime::config::Builder::from(sdk.config());
        if let Some(url) = endpoint {
            builder = builder.endpoint_url(url);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            sdk,
        })
    }

    fn retrieve_once(
        &self,
        query: &RetrievalQuery,
    ) -> Result<Vec<RetrievedDocument>, AdapterError> {
        let knowledge_base_id = query.knowledge_base_id.trim();
        if knowledge_base_id.is_empty() {
            return Err(AdapterError::invalid_config(
                "knowledge base id must not be empty",
            ));
        }

        let retrieval_query = KnowledgeBaseQuery::builder()
            .text(&query.text)
            .build();
        let vector_search = KnowledgeBaseVectorSearchConfiguration::builder()
            .number_of_results(i32::try_from(query.number_of_results).unwrap_or(i32::MAX))
            .override_search_type(override_search_type(query.search_type))
            .build();
        let configuration = KnowledgeBaseRetrievalConfiguration::builder()
            .vector_search_configuration(vector_search)
            .build();

        let output = self
            .sdk
            .block_on(
                self.client
                    .retrieve()
                    .knowledge_base_id(knowledge_base_id)
                    .retrieval_query(retrieval_query)
                    .retrieval_configuration(configuration)
                    .send(),
            )
            .map_err(AdapterError::sdk)?;

        let documents: Vec<RetrievedDocument> =
            output.retrieval_results().iter().map(to_document).collect();
        debug!(
            "knowledge base `{knowledge_base_id}` returned {} results",
            documents.len()
        );
        Ok(documents)
    }
}

impl RetrievalBackend for BedrockKnowledgeBase {
    fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        Ok(self.retrieve_once(query)?)
    }
}

fn override_search_type(search_type: SearchType) -> OverrideSearchType {
    match search_type {
        SearchType::Hybrid => OverrideSearchType::Hybrid,
        SearchType::Semantic => OverrideSearchType::Semantic,
    }
}

/// Missing source and score default to empty and zero.
fn to_document(result: &KnowledgeBaseRetrievalResult) -> RetrievedDocument {
    RetrievedDocument {
        content: result
            .content()
            .map(|content| content.text())
            .unwrap_or_default()
            .to_string(),
        source: result.location().map(location_source).unwrap_or_default(),
        score: result.score().unwrap_or(0.0),
        metadata: result
            .metadata()
            .map(|metadata| {
                metadata
                    .iter()
                    .map(|(key, value)| (key.clone(), document_to_json(value)))
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default(),
    }
}

/// S3 URI first, then web URL.
fn location_source(location: &RetrievalResultLocation) -> String {
    location
        .s3_location()
        .and_then(|s3| s3.uri())
        .or_else(|| location.web_location().and_then(|web| web.url()))
        .unwrap_or_default()
        .to_string()
}

fn document_to_json(document: &Document) -> Value {
    match document {
        Document::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), document_to_json(value)))
                .collect(),
        ),
        Document::Array(items) => Value::Array(items.iter().map(document_to_json).collect()),
        Document::Number(Number::PosInt(value)) => Value::from(*value),
        Document::Number(Number::NegInt(value)) => Value::from(*value),
        Document::Number(Number::Float(value)) => serde_json::Number::from_f64(*value)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Document::String(value) => Value::String(value.clone()),
        Document::Bool(value) => Value::Bool(*value),
        Document::Null => Value::Null,
    }
}
