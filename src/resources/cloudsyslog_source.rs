//! `sumologic_cloudsyslog_source`: a source that receives syslog over TLS,
//! authenticated by a server-issued token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::SourceKind;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::sources::{CloudSyslogSource, Source, SumoClient};

/// Resource type name.
pub const RESOURCE_TYPE: &str = "sumologic_cloudsyslog_source";

/// Cloud syslog attributes beyond the shared source ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSyslogExtra {
    /// Ingestion token, known once the source exists.
    #[serde(default)]
    pub token: Option<String>,
}

/// Marker for the cloud syslog resource.
pub struct CloudSyslog;

#[async_trait]
impl SourceKind for CloudSyslog {
    const RESOURCE_TYPE: &'static str = RESOURCE_TYPE;
    type Remote = CloudSyslogSource;
    type Extra = CloudSyslogExtra;

    fn extend_schema(schema: Schema) -> Schema {
        schema.with_attribute(
            "token",
            Attribute::computed_string()
                .sensitive()
                .with_description("Token senders put in the structured data of each message"),
        )
    }

    fn to_remote(source: Source, _extra: &CloudSyslogExtra) -> CloudSyslogSource {
        // The token is server-owned; never send it back.
        CloudSyslogSource {
            source,
            token: String::new(),
        }
    }

    fn from_remote(remote: CloudSyslogSource) -> (Source, CloudSyslogExtra) {
        let token = Some(remote.token).filter(|t| !t.is_empty());
        (remote.source, CloudSyslogExtra { token })
    }

    async fn create_remote(
        client: &SumoClient,
        remote: &CloudSyslogSource,
        collector_id: i64,
    ) -> Result<i64, ProviderError> {
        client.create_cloudsyslog_source(remote, collector_id).await
    }

    async fn get_remote(
        client: &SumoClient,
        collector_id: i64,
        source_id: i64,
    ) -> Result<Option<CloudSyslogSource>, ProviderError> {
        client.get_cloudsyslog_source(collector_id, source_id).await
    }

    async fn update_remote(
        client: &SumoClient,
        remote: &CloudSyslogSource,
        collector_id: i64,
    ) -> Result<(), ProviderError> {
        client.update_cloudsyslog_source(remote, collector_id).await
    }
}
