//! SumoLogic source records and the REST accessors that move them.
//!
//! Field names follow the API's camelCase JSON. Single-source calls wrap the
//! record in a `{"source": ...}` envelope, listings come back as
//! `{"sources": [...]}`.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::RestClient;
use crate::error::ProviderError;

/// Discriminator sent as `sourceType` for cloud syslog sources.
pub const CLOUDSYSLOG_SOURCE_TYPE: &str = "Cloudsyslog";

/// Discriminator sent as `sourceType` for HTTP sources.
pub const HTTP_SOURCE_TYPE: &str = "HTTP";

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// A source attached to a collector, as the API represents it.
///
/// The collector is not part of the record; every call carries it alongside.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Source {
    /// Server-assigned id, 0 until created.
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    /// Subtype discriminator.
    pub source_type: String,
    /// Unique within the collector.
    pub name: String,
    /// Free-form description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Source category metadata stamped on every message.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// Host name metadata stamped on every message.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host_name: String,
    /// Timezone assumed for timestamps without one.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub time_zone: String,
    /// Extract timestamps from messages.
    pub automatic_date_parsing: bool,
    /// Join multi-line messages.
    pub multiline_processing_enabled: bool,
    /// Detect message boundaries automatically.
    pub use_autoline_matching: bool,
    /// Message boundary regex when autoline matching is off.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub manual_prefix_regexp: String,
    /// Apply `time_zone` even when messages carry their own.
    pub force_time_zone: bool,
    /// Date parsing rules, tried in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub default_date_formats: Vec<DefaultDateFormat>,
    /// Ingest filters, applied in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    /// Ignore data older than this epoch-millisecond timestamp.
    #[serde(skip_serializing_if = "is_zero")]
    pub cutoff_timestamp: i64,
    /// Ignore data older than this relative time, such as `-1h`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cutoff_relative_time: String,
}

/// One custom date parsing rule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DefaultDateFormat {
    /// Java `SimpleDateFormat` pattern.
    pub format: String,
    /// Regex whose first group holds the timestamp.
    #[serde(default)]
    pub locator: String,
}

/// What a [`Filter`] does with matching lines.
///
/// Names the API reports beyond the known five are kept verbatim in
/// [`FilterType::Other`]; configuration is restricted to [`FilterType::ALL`]
/// by schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterType {
    /// Drop matching lines.
    Exclude,
    /// Keep only matching lines.
    Include,
    /// Replace the matched group with its hash.
    Hash,
    /// Replace the matched group with the mask string.
    Mask,
    /// Forward matching lines to a data forwarding destination.
    Forward,
    /// A filter type this provider does not know about.
    #[serde(untagged)]
    Other(String),
}

impl FilterType {
    /// Every filter type, in the order the API documents them.
    pub const ALL: [FilterType; 5] = [
        FilterType::Exclude,
        FilterType::Include,
        FilterType::Hash,
        FilterType::Mask,
        FilterType::Forward,
    ];

    /// Wire name of the filter type.
    pub fn as_str(&self) -> &str {
        match self {
            FilterType::Exclude => "Exclude",
            FilterType::Include => "Include",
            FilterType::Hash => "Hash",
            FilterType::Mask => "Mask",
            FilterType::Forward => "Forward",
            FilterType::Other(name) => name,
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ingest-time rule matched by regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Display name.
    pub name: String,
    /// What happens to matching lines.
    pub filter_type: FilterType,
    /// Expression matched against each line.
    pub regexp: String,
    /// Replacement text, for [`FilterType::Mask`].
    #[serde(default)]
    pub mask: String,
}

/// Cloud syslog source: a [`Source`] plus the ingestion token the server issues.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CloudSyslogSource {
    /// Shared source fields.
    #[serde(flatten)]
    pub source: Source,
    /// Server-issued, read-only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

/// HTTP source: a [`Source`] plus its server-issued upload URL.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSource {
    /// Shared source fields.
    #[serde(flatten)]
    pub source: Source,
    /// Treat each request body as a single message.
    #[serde(default)]
    pub message_per_request: bool,
    /// Server-issued, read-only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

/// A source subtype that can travel through the generic accessors.
pub trait SourceVariant: Serialize + DeserializeOwned + Send + Sync {
    /// Value of `sourceType` for this subtype.
    const SOURCE_TYPE: &'static str;

    /// The shared source fields.
    fn source(&self) -> &Source;
}

impl SourceVariant for CloudSyslogSource {
    const SOURCE_TYPE: &'static str = CLOUDSYSLOG_SOURCE_TYPE;

    fn source(&self) -> &Source {
        &self.source
    }
}

impl SourceVariant for HttpSource {
    const SOURCE_TYPE: &'static str = HTTP_SOURCE_TYPE;

    fn source(&self) -> &Source {
        &self.source
    }
}

#[derive(Serialize)]
struct SourceRequest<'a, V> {
    source: &'a V,
}

#[derive(Deserialize)]
struct SourceResponse<V> {
    source: V,
}

#[derive(Deserialize)]
struct SourceList {
    #[serde(default)]
    sources: Vec<Source>,
}

fn sources_path(collector_id: i64) -> String {
    format!("collectors/{}/sources", collector_id)
}

fn source_path(collector_id: i64, source_id: i64) -> String {
    format!("collectors/{}/sources/{}", collector_id, source_id)
}

/// Source accessors over an injected [`RestClient`].
#[derive(Clone)]
pub struct SumoClient {
    rest: Arc<dyn RestClient>,
}

impl fmt::Debug for SumoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SumoClient").finish_non_exhaustive()
    }
}

impl SumoClient {
    /// Wrap a REST capability.
    pub fn new(rest: Arc<dyn RestClient>) -> Self {
        Self { rest }
    }

    /// Delete a source.
    pub async fn destroy_source(&self, source_id: i64, collector_id: i64) -> Result<(), ProviderError> {
        debug!(collector_id, source_id, "Deleting source");
        self.rest.delete(&source_path(collector_id, source_id)).await?;
        Ok(())
    }

    /// Find a source of `collector_id` by exact name.
    ///
    /// When several sources share the name the first one listed wins.
    /// `Ok(None)` covers both "no such name" and "no such collector".
    pub async fn get_source_name(
        &self,
        collector_id: i64,
        source_name: &str,
    ) -> Result<Option<Source>, ProviderError> {
        let Some(response) = self.rest.get(&sources_path(collector_id)).await? else {
            return Ok(None);
        };

        let list: SourceList = serde_json::from_slice(&response.body)?;
        Ok(list.sources.into_iter().find(|s| s.name == source_name))
    }

    /// Create a source of any subtype, returning the new id.
    pub async fn create_source<V: SourceVariant>(
        &self,
        source: &V,
        collector_id: i64,
    ) -> Result<i64, ProviderError> {
        let body = serde_json::to_value(SourceRequest { source })?;
        let data = self.rest.post(&sources_path(collector_id), &body).await?;
        let created: SourceResponse<Source> = serde_json::from_slice(&data)?;
        debug!(
            collector_id,
            source_id = created.source.id,
            source_type = V::SOURCE_TYPE,
            "Created source"
        );
        Ok(created.source.id)
    }

    /// Fetch a source of any subtype; `Ok(None)` when it does not exist.
    pub async fn get_source<V: SourceVariant>(
        &self,
        collector_id: i64,
        source_id: i64,
    ) -> Result<Option<V>, ProviderError> {
        let Some(response) = self.rest.get(&source_path(collector_id, source_id)).await? else {
            return Ok(None);
        };

        let fetched: SourceResponse<V> = serde_json::from_slice(&response.body)?;
        Ok(Some(fetched.source))
    }

    /// Replace a source wholesale with `source`.
    ///
    /// The API rejects updates without the current `ETag`, so this first
    /// fetches it.
    pub async fn update_source<V: SourceVariant>(
        &self,
        source: &V,
        collector_id: i64,
    ) -> Result<(), ProviderError> {
        let path = source_path(collector_id, source.source().id);
        let etag = self.rest.get(&path).await?.and_then(|r| r.etag);

        let body = serde_json::to_value(SourceRequest { source })?;
        self.rest.put(&path, &body, etag.as_deref()).await?;
        Ok(())
    }

    /// Create a cloud syslog source, returning the new id.
    pub async fn create_cloudsyslog_source(
        &self,
        source: &CloudSyslogSource,
        collector_id: i64,
    ) -> Result<i64, ProviderError> {
        self.create_source(source, collector_id).await
    }

    /// Fetch a cloud syslog source; `Ok(None)` when it does not exist.
    pub async fn get_cloudsyslog_source(
        &self,
        collector_id: i64,
        source_id: i64,
    ) -> Result<Option<CloudSyslogSource>, ProviderError> {
        self.get_source(collector_id, source_id).await
    }

    /// Replace a cloud syslog source.
    pub async fn update_cloudsyslog_source(
        &self,
        source: &CloudSyslogSource,
        collector_id: i64,
    ) -> Result<(), ProviderError> {
        self.update_source(source, collector_id).await
    }

    /// Create an HTTP source, returning the new id.
    pub async fn create_http_source(
        &self,
        source: &HttpSource,
        collector_id: i64,
    ) -> Result<i64, ProviderError> {
        self.create_source(source, collector_id).await
    }

    /// Fetch an HTTP source; `Ok(None)` when it does not exist.
    pub async fn get_http_source(
        &self,
        collector_id: i64,
        source_id: i64,
    ) -> Result<Option<HttpSource>, ProviderError> {
        self.get_source(collector_id, source_id).await
    }

    /// Replace an HTTP source.
    pub async fn update_http_source(
        &self,
        source: &HttpSource,
        collector_id: i64,
    ) -> Result<(), ProviderError> {
        self.update_source(source, collector_id).await
    }
}
