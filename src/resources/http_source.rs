//! `sumologic_http_source`: a source that accepts uploads on a server-issued URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::SourceKind;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::sources::{HttpSource, Source, SumoClient};

/// Resource type name.
pub const RESOURCE_TYPE: &str = "sumologic_http_source";

/// HTTP source attributes beyond the shared source ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpExtra {
    /// Treat each request body as a single message.
    #[serde(default)]
    pub message_per_request: bool,
    /// Upload endpoint, known once the source exists.
    #[serde(default)]
    pub url: Option<String>,
}

/// Marker for the HTTP source resource.
pub struct Http;

#[async_trait]
impl SourceKind for Http {
    const RESOURCE_TYPE: &'static str = RESOURCE_TYPE;
    type Remote = HttpSource;
    type Extra = HttpExtra;

    fn extend_schema(schema: Schema) -> Schema {
        schema
            .with_attribute(
                "message_per_request",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description("Treat each request body as a single message"),
            )
            .with_attribute(
                "url",
                Attribute::computed_string()
                    .sensitive()
                    .with_description("Endpoint to upload data to"),
            )
    }

    fn to_remote(source: Source, extra: &HttpExtra) -> HttpSource {
        HttpSource {
            source,
            message_per_request: extra.message_per_request,
            url: String::new(),
        }
    }

    fn from_remote(remote: HttpSource) -> (Source, HttpExtra) {
        let extra = HttpExtra {
            message_per_request: remote.message_per_request,
            url: Some(remote.url).filter(|u| !u.is_empty()),
        };
        (remote.source, extra)
    }

    async fn create_remote(
        client: &SumoClient,
        remote: &HttpSource,
        collector_id: i64,
    ) -> Result<i64, ProviderError> {
        client.create_http_source(remote, collector_id).await
    }

    async fn get_remote(
        client: &SumoClient,
        collector_id: i64,
        source_id: i64,
    ) -> Result<Option<HttpSource>, ProviderError> {
        client.get_http_source(collector_id, source_id).await
    }

    async fn update_remote(
        client: &SumoClient,
        remote: &HttpSource,
        collector_id: i64,
    ) -> Result<(), ProviderError> {
        client.update_http_source(remote, collector_id).await
    }
}
