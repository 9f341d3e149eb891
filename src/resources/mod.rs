//! Source resources: typed state, the state <-> API mapping, and lifecycle
//! operations shared by every source subtype.
//!
//! Each subtype (see [`cloudsyslog_source`] and [`http_source`]) plugs into
//! the shared machinery through [`SourceKind`]: it names its resource type,
//! the API record it maps to, and the few attributes it adds on top of the
//! common source schema.

pub mod cloudsyslog_source;
pub mod http_source;

use std::fmt::Debug;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::sources::{DefaultDateFormat, Filter, FilterType, Source, SourceVariant, SumoClient};
use crate::types::{diff_states, AttributeChange, ImportedResource, PlanResult};

pub use cloudsyslog_source::CloudSyslog;
pub use http_source::Http;

/// Timezone applied when the configuration leaves it out.
pub const DEFAULT_TIMEZONE: &str = "Etc/UTC";

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_true() -> bool {
    true
}

/// User-facing attributes shared by every source resource.
///
/// Absent attributes take the defaults the schema advertises; run incoming
/// JSON through [`strip_nulls`] first so explicit `null`s default too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source name; empty only in freshly imported state.
    #[serde(default)]
    pub name: String,
    #[allow(missing_docs)]
    #[serde(default)]
    pub description: String,
    #[allow(missing_docs)]
    #[serde(default)]
    pub category: String,
    #[allow(missing_docs)]
    #[serde(default)]
    pub host_name: String,
    /// Sent to the API as `timeZone`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[allow(missing_docs)]
    #[serde(default = "default_true")]
    pub automatic_date_parsing: bool,
    #[allow(missing_docs)]
    #[serde(default = "default_true")]
    pub multiline_processing_enabled: bool,
    #[allow(missing_docs)]
    #[serde(default = "default_true")]
    pub use_autoline_matching: bool,
    #[allow(missing_docs)]
    #[serde(default)]
    pub manual_prefix_regexp: String,
    /// Sent to the API as `forceTimeZone`.
    #[serde(default)]
    pub force_timezone: bool,
    /// Kept in configuration order.
    #[serde(default)]
    pub default_date_formats: Vec<DateFormatBlock>,
    /// Kept in configuration order.
    #[serde(default)]
    pub filters: Vec<FilterBlock>,
    /// Epoch milliseconds; 0 means unset.
    #[serde(default)]
    pub cutoff_timestamp: i64,
    #[allow(missing_docs)]
    #[serde(default)]
    pub cutoff_relative_time: String,
    /// Collector owning the source.
    #[serde(default)]
    pub collector_id: i64,
    /// Adopt an existing source with the same name instead of creating one.
    #[serde(default)]
    pub lookup_by_name: bool,
    /// When false, deleting the resource leaves the remote source alone.
    #[serde(default = "default_true")]
    pub destroy: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            category: String::new(),
            host_name: String::new(),
            timezone: default_timezone(),
            automatic_date_parsing: true,
            multiline_processing_enabled: true,
            use_autoline_matching: true,
            manual_prefix_regexp: String::new(),
            force_timezone: false,
            default_date_formats: Vec::new(),
            filters: Vec::new(),
            cutoff_timestamp: 0,
            cutoff_relative_time: String::new(),
            collector_id: 0,
            lookup_by_name: false,
            destroy: true,
        }
    }
}

/// One `default_date_formats` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct DateFormatBlock {
    pub format: String,
    #[serde(default)]
    pub locator: String,
}

/// One `filters` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct FilterBlock {
    pub name: String,
    pub filter_type: FilterType,
    pub regexp: String,
    #[serde(default)]
    pub mask: String,
}

/// Build the API record for `config`. `id` is the remote identity, if any.
///
/// `sourceType` is left empty; the subtype fills it in.
pub fn resource_to_source(config: &SourceConfig, id: Option<i64>) -> Source {
    Source {
        id: id.unwrap_or_default(),
        source_type: String::new(),
        name: config.name.clone(),
        description: config.description.clone(),
        category: config.category.clone(),
        host_name: config.host_name.clone(),
        time_zone: config.timezone.clone(),
        automatic_date_parsing: config.automatic_date_parsing,
        multiline_processing_enabled: config.multiline_processing_enabled,
        use_autoline_matching: config.use_autoline_matching,
        manual_prefix_regexp: config.manual_prefix_regexp.clone(),
        force_time_zone: config.force_timezone,
        default_date_formats: config
            .default_date_formats
            .iter()
            .map(|f| DefaultDateFormat {
                format: f.format.clone(),
                locator: f.locator.clone(),
            })
            .collect(),
        filters: config
            .filters
            .iter()
            .map(|f| Filter {
                name: f.name.clone(),
                filter_type: f.filter_type.clone(),
                regexp: f.regexp.clone(),
                mask: f.mask.clone(),
            })
            .collect(),
        cutoff_timestamp: config.cutoff_timestamp,
        cutoff_relative_time: config.cutoff_relative_time.clone(),
    }
}

/// Copy every field of a fetched source into `config`.
///
/// `collector_id`, `lookup_by_name` and `destroy` are not part of the API
/// record and keep their local values.
pub fn write_source_state(config: &mut SourceConfig, source: &Source) {
    config.name = source.name.clone();
    config.description = source.description.clone();
    config.category = source.category.clone();
    config.host_name = source.host_name.clone();
    config.timezone = source.time_zone.clone();
    config.automatic_date_parsing = source.automatic_date_parsing;
    config.multiline_processing_enabled = source.multiline_processing_enabled;
    config.use_autoline_matching = source.use_autoline_matching;
    config.manual_prefix_regexp = source.manual_prefix_regexp.clone();
    config.force_timezone = source.force_time_zone;
    config.default_date_formats = source
        .default_date_formats
        .iter()
        .map(|f| DateFormatBlock {
            format: f.format.clone(),
            locator: f.locator.clone(),
        })
        .collect();
    config.filters = source
        .filters
        .iter()
        .map(|f| FilterBlock {
            name: f.name.clone(),
            filter_type: f.filter_type.clone(),
            regexp: f.regexp.clone(),
            mask: f.mask.clone(),
        })
        .collect();
    config.cutoff_timestamp = source.cutoff_timestamp;
    config.cutoff_relative_time = source.cutoff_relative_time.clone();
}

/// Full resource state: identity, shared attributes, subtype extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceState<X> {
    /// Remote source id; `None` until created or adopted.
    #[serde(default)]
    pub id: Option<String>,
    /// Attributes shared by all sources.
    #[serde(flatten)]
    pub config: SourceConfig,
    /// Subtype attributes.
    #[serde(flatten)]
    pub extra: X,
}

impl<X: DeserializeOwned> SourceState<X> {
    /// Parse state or configuration JSON, defaulting absent and null attributes.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        Ok(serde_json::from_value(strip_nulls(value))?)
    }
}

impl<X: Serialize> SourceState<X> {
    /// Serialize back into host state JSON.
    pub fn to_value(&self) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl<X> SourceState<X> {
    /// The remote id as the API expects it.
    pub fn source_id(&self) -> Result<Option<i64>, ProviderError> {
        match self.id.as_deref() {
            None | Some("") => Ok(None),
            Some(id) => id.parse().map(Some).map_err(|_| {
                ProviderError::Validation(format!("source id must be an integer, got {}", id))
            }),
        }
    }

    fn require_source_id(&self) -> Result<i64, ProviderError> {
        self.source_id()?
            .ok_or_else(|| ProviderError::Validation("source has no id in state".to_string()))
    }
}

/// Drop `null` members from every object in `value`, so serde defaults apply.
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

/// Split an import id of the form `<collector_id>/<source_id>`.
pub fn parse_import_id(id: &str) -> Result<(i64, i64), ProviderError> {
    let parts: Vec<&str> = id.split('/').collect();
    let [collector, source] = parts.as_slice() else {
        return Err(ProviderError::Validation(format!(
            "expected collector_id/source_id, got {}",
            id
        )));
    };

    let parse = |part: &str, what: &str| {
        part.parse::<i64>().map_err(|_| {
            ProviderError::Validation(format!(
                "expected collector_id/source_id, got {}: {} '{}' is not an integer",
                id, what, part
            ))
        })
    };
    Ok((parse(*collector, "collector_id")?, parse(*source, "source_id")?))
}

/// Schema attributes shared by every source resource.
pub fn source_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("Source id assigned by SumoLogic"),
        )
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_force_new()
                .with_description("Source name, unique within the collector"),
        )
        .with_attribute("description", Attribute::optional_string().with_default(json!("")))
        .with_attribute("category", Attribute::optional_string().with_default(json!("")))
        .with_attribute("host_name", Attribute::optional_string().with_default(json!("")))
        .with_attribute(
            "timezone",
            Attribute::optional_string().with_default(json!(DEFAULT_TIMEZONE)),
        )
        .with_attribute(
            "automatic_date_parsing",
            Attribute::optional_bool().with_default(json!(true)),
        )
        .with_attribute(
            "multiline_processing_enabled",
            Attribute::optional_bool().with_default(json!(true)),
        )
        .with_attribute(
            "use_autoline_matching",
            Attribute::optional_bool().with_default(json!(true)),
        )
        .with_attribute("manual_prefix_regexp", Attribute::optional_string())
        .with_attribute("force_timezone", Attribute::optional_bool().with_default(json!(false)))
        .with_block(
            "default_date_formats",
            NestedBlock::list(
                Block::new()
                    .with_attribute("format", Attribute::required_string())
                    .with_attribute("locator", Attribute::optional_string())
                    .with_description("Date formats tried when parsing message timestamps"),
            ),
        )
        .with_block(
            "filters",
            NestedBlock::list(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute(
                        "filter_type",
                        Attribute::required_string()
                            .with_allowed_values(FilterType::ALL.iter().map(FilterType::as_str)),
                    )
                    .with_attribute("regexp", Attribute::required_string())
                    .with_attribute("mask", Attribute::optional_string())
                    .with_description("Processing rules applied to ingested messages"),
            ),
        )
        .with_attribute("cutoff_timestamp", Attribute::optional_int64().with_default(json!(0)))
        .with_attribute(
            "cutoff_relative_time",
            Attribute::optional_string().with_force_new(),
        )
        .with_attribute(
            "collector_id",
            Attribute::required_int64()
                .with_force_new()
                .with_description("Collector the source belongs to"),
        )
        .with_attribute(
            "lookup_by_name",
            Attribute::optional_bool()
                .with_default(json!(false))
                .with_description("Adopt an existing source with the same name on create"),
        )
        .with_attribute(
            "destroy",
            Attribute::optional_bool()
                .with_default(json!(true))
                .with_description("Delete the remote source when the resource is destroyed"),
        )
}

/// A source subtype served as its own resource type.
#[async_trait]
pub trait SourceKind: Send + Sync + 'static {
    /// Resource type name registered with the host.
    const RESOURCE_TYPE: &'static str;

    /// API record for this subtype.
    type Remote: SourceVariant + Debug;

    /// Subtype attributes stored next to the shared ones.
    type Extra: Serialize + DeserializeOwned + Default + Clone + PartialEq + Debug + Send + Sync;

    /// Add the subtype attributes to the shared schema.
    fn extend_schema(schema: Schema) -> Schema;

    /// Wrap a shared record with the subtype extras.
    fn to_remote(source: Source, extra: &Self::Extra) -> Self::Remote;

    /// Split a fetched record into the shared record and the subtype extras.
    fn from_remote(remote: Self::Remote) -> (Source, Self::Extra);

    /// POST a new source, returning its id.
    async fn create_remote(
        client: &SumoClient,
        remote: &Self::Remote,
        collector_id: i64,
    ) -> Result<i64, ProviderError>;

    /// GET a source; `Ok(None)` when it does not exist.
    async fn get_remote(
        client: &SumoClient,
        collector_id: i64,
        source_id: i64,
    ) -> Result<Option<Self::Remote>, ProviderError>;

    /// PUT the full record over the existing source.
    async fn update_remote(
        client: &SumoClient,
        remote: &Self::Remote,
        collector_id: i64,
    ) -> Result<(), ProviderError>;

    /// Complete schema of the resource.
    fn schema() -> Schema {
        Self::extend_schema(source_schema())
    }
}

/// Lifecycle operations for one source subtype.
pub struct SourceResource<K>(std::marker::PhantomData<K>);

/// State type of a [`SourceKind`].
pub type StateOf<K> = SourceState<<K as SourceKind>::Extra>;

impl<K: SourceKind> SourceResource<K> {
    fn to_remote(state: &StateOf<K>) -> Result<K::Remote, ProviderError> {
        let mut source = resource_to_source(&state.config, state.source_id()?);
        source.source_type = <K::Remote as SourceVariant>::SOURCE_TYPE.to_string();
        Ok(K::to_remote(source, &state.extra))
    }

    /// Create the source, or adopt an existing one when `lookup_by_name` is
    /// set, then read it back.
    ///
    /// Any `id` in the planned state is ignored: a new source is always
    /// POSTed unless the lookup finds one.
    pub async fn create(
        client: &SumoClient,
        mut state: StateOf<K>,
    ) -> Result<StateOf<K>, ProviderError> {
        if state.config.name.is_empty() {
            return Err(ProviderError::Validation("name is required".to_string()));
        }
        let collector_id = state.config.collector_id;
        state.id = None;

        if state.config.lookup_by_name {
            if let Some(existing) = client.get_source_name(collector_id, &state.config.name).await? {
                info!(
                    resource_type = K::RESOURCE_TYPE,
                    collector_id,
                    source_id = existing.id,
                    "Adopting existing source by name"
                );
                state.id = Some(existing.id.to_string());
            }
        }

        if state.id.is_none() {
            let remote = Self::to_remote(&state)?;
            let id = K::create_remote(client, &remote, collector_id).await?;
            state.id = Some(id.to_string());
        }

        let id = state.id.clone().unwrap_or_default();
        Self::read(client, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!(
                "source {} in collector {} disappeared right after create",
                id, collector_id
            ))
        })
    }

    /// Refresh state from the API. `Ok(None)` means the source is gone and
    /// the resource should leave state.
    pub async fn read(
        client: &SumoClient,
        mut state: StateOf<K>,
    ) -> Result<Option<StateOf<K>>, ProviderError> {
        let source_id = state.require_source_id()?;
        let collector_id = state.config.collector_id;

        let Some(remote) = K::get_remote(client, collector_id, source_id).await? else {
            warn!(
                resource_type = K::RESOURCE_TYPE,
                collector_id, source_id, "Source not found, removing from state"
            );
            return Ok(None);
        };

        let (source, extra) = K::from_remote(remote);
        write_source_state(&mut state.config, &source);
        state.extra = extra;
        Ok(Some(state))
    }

    /// Replace the remote source with the local state, then read it back.
    pub async fn update(
        client: &SumoClient,
        state: StateOf<K>,
    ) -> Result<Option<StateOf<K>>, ProviderError> {
        state.require_source_id()?;
        let remote = Self::to_remote(&state)?;
        K::update_remote(client, &remote, state.config.collector_id).await?;
        Self::read(client, state).await
    }

    /// Delete the remote source unless `destroy` is false.
    pub async fn delete(client: &SumoClient, state: StateOf<K>) -> Result<(), ProviderError> {
        let source_id = state.require_source_id()?;
        if !state.config.destroy {
            info!(
                resource_type = K::RESOURCE_TYPE,
                collector_id = state.config.collector_id,
                source_id,
                "destroy = false, leaving remote source in place"
            );
            return Ok(());
        }
        client.destroy_source(source_id, state.config.collector_id).await
    }

    /// State for `<collector_id>/<source_id>`; the host follows with a read.
    pub fn import(id: &str) -> Result<ImportedResource, ProviderError> {
        let (collector_id, source_id) = parse_import_id(id)?;
        let state = StateOf::<K> {
            id: Some(source_id.to_string()),
            config: SourceConfig {
                collector_id,
                ..Default::default()
            },
            extra: K::Extra::default(),
        };
        Ok(ImportedResource::new(K::RESOURCE_TYPE, state.to_value()?))
    }

    /// Plan the transition from `prior` to `proposed`.
    ///
    /// Defaults are filled in and provider-owned attributes are carried over
    /// from the prior state. A change to any force-new attribute marks the
    /// plan as a replacement, and then provider-owned attributes are left
    /// null since the new source gets its own.
    pub fn plan(prior: Option<Value>, proposed: Value) -> Result<PlanResult, ProviderError> {
        let schema = K::schema();
        let computed: Vec<&str> = schema.computed_attributes().collect();

        let prior = match prior {
            Some(prior) if !prior.is_null() => Some(StateOf::<K>::from_value(prior)?.to_value()?),
            _ => None,
        };

        if proposed.is_null() {
            let changes = match &prior {
                Some(Value::Object(map)) => map
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                    .collect(),
                _ => Vec::new(),
            };
            return Ok(PlanResult::with_changes(Value::Null, changes, false));
        }

        let mut planned = StateOf::<K>::from_value(proposed)?.to_value()?;
        if let (Some(Value::Object(prior_map)), Value::Object(planned_map)) = (&prior, &mut planned) {
            for name in &computed {
                if let Some(v) = prior_map.get(*name) {
                    planned_map.insert(name.to_string(), v.clone());
                }
            }
        }

        let Some(prior) = prior else {
            let changes = diff_states(&Value::Null, &planned, &computed);
            return Ok(PlanResult::with_changes(planned, changes, false));
        };

        let changes = diff_states(&prior, &planned, &computed);
        let requires_replace = changes
            .iter()
            .any(|change| schema.force_new_attributes().any(|name| name == change.path));

        if requires_replace {
            if let Value::Object(planned_map) = &mut planned {
                for name in &computed {
                    planned_map.insert(name.to_string(), Value::Null);
                }
            }
        }

        if changes.is_empty() {
            Ok(PlanResult::no_change(planned))
        } else {
            Ok(PlanResult::with_changes(planned, changes, requires_replace))
        }
    }
}
