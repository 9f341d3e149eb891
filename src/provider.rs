//! The SumoLogic provider: resource type dispatch over [`ProviderService`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::client::HttpRestClient;
use crate::config::{self, ProviderConfig};
use crate::error::ProviderError;
use crate::resources::{cloudsyslog_source, http_source, CloudSyslog, Http, SourceKind, SourceResource, StateOf};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::sources::SumoClient;
use crate::types::{ImportedResource, PlanResult};

/// Serves `sumologic_cloudsyslog_source` and `sumologic_http_source`.
///
/// Resource operations fail with [`ProviderError::Configuration`] until
/// `configure` has installed an API client.
#[derive(Debug, Default)]
pub struct SumoLogicProvider {
    client: RwLock<Option<SumoClient>>,
}

impl SumoLogicProvider {
    /// An unconfigured provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider already wired to `client`.
    pub fn with_client(client: SumoClient) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    async fn client(&self) -> Result<SumoClient, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }
}

fn unknown(resource_type: &str) -> ProviderError {
    ProviderError::UnknownResource(resource_type.to_string())
}

async fn create_as<K: SourceKind>(client: &SumoClient, planned: Value) -> Result<Value, ProviderError> {
    let state = SourceResource::<K>::create(client, StateOf::<K>::from_value(planned)?).await?;
    state.to_value()
}

async fn read_as<K: SourceKind>(client: &SumoClient, current: Value) -> Result<Value, ProviderError> {
    match SourceResource::<K>::read(client, StateOf::<K>::from_value(current)?).await? {
        Some(state) => state.to_value(),
        None => Ok(Value::Null),
    }
}

async fn update_as<K: SourceKind>(
    client: &SumoClient,
    prior: Value,
    planned: Value,
) -> Result<Value, ProviderError> {
    let prior = StateOf::<K>::from_value(prior)?;
    let mut planned = StateOf::<K>::from_value(planned)?;
    if planned.source_id()?.is_none() {
        planned.id = prior.id;
    }

    let id = planned.id.clone().unwrap_or_default();
    let collector_id = planned.config.collector_id;
    match SourceResource::<K>::update(client, planned).await? {
        Some(state) => state.to_value(),
        None => Err(ProviderError::NotFound(format!(
            "source {} in collector {} disappeared during update",
            id, collector_id
        ))),
    }
}

async fn delete_as<K: SourceKind>(client: &SumoClient, current: Value) -> Result<(), ProviderError> {
    if current.is_null() {
        return Ok(());
    }
    SourceResource::<K>::delete(client, StateOf::<K>::from_value(current)?).await
}

#[async_trait::async_trait]
impl ProviderService for SumoLogicProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(config::provider_schema())
            .with_resource(CloudSyslog::RESOURCE_TYPE, CloudSyslog::schema())
            .with_resource(Http::RESOURCE_TYPE, Http::schema())
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = crate::validation::validate(&config::provider_schema(), &config);
        if diagnostics.is_empty() {
            diagnostics.extend(config::check(config));
        }
        Ok(diagnostics)
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let resolved = match ProviderConfig::from_value(config).and_then(ProviderConfig::resolve) {
            Ok(resolved) => resolved,
            Err(e) => {
                return Ok(vec![
                    Diagnostic::error("Invalid provider configuration").with_detail(e.message())
                ])
            },
        };

        info!(base_url = %resolved.base_url, access_id = %resolved.access_id, "Configuring SumoLogic client");
        let rest = HttpRestClient::new(resolved)?;
        *self.client.write().await = Some(SumoClient::new(Arc::new(rest)));
        Ok(vec![])
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        match resource_type {
            cloudsyslog_source::RESOURCE_TYPE => {
                SourceResource::<CloudSyslog>::plan(prior_state, proposed_state)
            },
            http_source::RESOURCE_TYPE => SourceResource::<Http>::plan(prior_state, proposed_state),
            other => Err(unknown(other)),
        }
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let client = self.client().await?;
        match resource_type {
            cloudsyslog_source::RESOURCE_TYPE => create_as::<CloudSyslog>(&client, planned_state).await,
            http_source::RESOURCE_TYPE => create_as::<Http>(&client, planned_state).await,
            other => Err(unknown(other)),
        }
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let client = self.client().await?;
        match resource_type {
            cloudsyslog_source::RESOURCE_TYPE => read_as::<CloudSyslog>(&client, current_state).await,
            http_source::RESOURCE_TYPE => read_as::<Http>(&client, current_state).await,
            other => Err(unknown(other)),
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let client = self.client().await?;
        match resource_type {
            cloudsyslog_source::RESOURCE_TYPE => {
                update_as::<CloudSyslog>(&client, prior_state, planned_state).await
            },
            http_source::RESOURCE_TYPE => update_as::<Http>(&client, prior_state, planned_state).await,
            other => Err(unknown(other)),
        }
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let client = self.client().await?;
        match resource_type {
            cloudsyslog_source::RESOURCE_TYPE => delete_as::<CloudSyslog>(&client, current_state).await,
            http_source::RESOURCE_TYPE => delete_as::<Http>(&client, current_state).await,
            other => Err(unknown(other)),
        }
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let imported = match resource_type {
            cloudsyslog_source::RESOURCE_TYPE => SourceResource::<CloudSyslog>::import(id)?,
            http_source::RESOURCE_TYPE => SourceResource::<Http>::import(id)?,
            other => return Err(unknown(other)),
        };
        Ok(vec![imported])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_error_contains, FakeSumo, ProviderTester, RestCall, TestError};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    const SYSLOG: &str = "sumologic_cloudsyslog_source";
    const HTTP: &str = "sumologic_http_source";

    fn setup() -> (Arc<FakeSumo>, ProviderTester<SumoLogicProvider>) {
        let fake = Arc::new(FakeSumo::new());
        let provider = SumoLogicProvider::with_client(SumoClient::new(fake.clone()));
        (fake, ProviderTester::new(provider))
    }

    fn diagnostics(err: TestError) -> Vec<Diagnostic> {
        match err {
            TestError::Diagnostics(diags) => diags,
            other => panic!("expected diagnostics, got {other}"),
        }
    }

    fn source_id(state: &Value) -> i64 {
        state["id"].as_str().unwrap().parse().unwrap()
    }

    #[test]
    fn test_metadata_lists_resources() {
        let (_fake, tester) = setup();
        assert_eq!(tester.resource_types(), vec![SYSLOG.to_string(), HTTP.to_string()]);

        let schema = tester.schema();
        assert!(schema.provider.block.attributes.contains_key("access_key"));
        assert!(schema.resources[SYSLOG].block.attributes.contains_key("token"));
        assert!(schema.resources[HTTP].block.attributes.contains_key("url"));
    }

    #[tokio::test]
    async fn test_operations_before_configure_fail() {
        let tester = ProviderTester::new(SumoLogicProvider::new());
        let err = tester
            .create(SYSLOG, json!({"name": "syslog", "collector_id": 12}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));

        // Planning needs no API access.
        assert_ok!(tester.plan_create(SYSLOG, json!({"name": "syslog", "collector_id": 12})).await);
    }

    #[tokio::test]
    async fn test_configure_reports_bad_environment() {
        let tester = ProviderTester::new(SumoLogicProvider::new());
        let err = tester
            .configure(json!({"access_id": "id", "access_key": "key", "environment": "mars"}))
            .await
            .unwrap_err();

        let diags = diagnostics(err);
        assert_error_contains(&diags, "mars");
    }

    #[tokio::test]
    async fn test_configure_installs_client() {
        let tester = ProviderTester::new(SumoLogicProvider::new());
        assert_ok!(
            tester
                .configure(json!({
                    "access_id": "id",
                    "access_key": "key",
                    "base_url": "http://127.0.0.1:9/api/v1"
                }))
                .await
        );

        // Configured, so the failure now comes from the transport.
        let err = tester
            .read(SYSLOG, json!({"id": "34", "name": "syslog", "collector_id": 12}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
    }

    #[tokio::test]
    async fn test_validate_provider_config() {
        let (_fake, tester) = setup();
        assert_ok!(
            tester
                .validate_provider_config(json!({"access_id": "id", "access_key": "key", "environment": "eu"}))
                .await
        );
        assert_err!(
            tester
                .validate_provider_config(json!({"access_id": "id", "access_key": "key", "environment": 7}))
                .await
        );
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let (_fake, tester) = setup();
        assert_ok!(
            tester
                .validate_resource_config(
                    SYSLOG,
                    json!({
                        "name": "syslog",
                        "collector_id": 12,
                        "filters": [{"name": "f", "filter_type": "Mask", "regexp": "(\\d+)", "mask": "#"}]
                    })
                )
                .await
        );

        let err = tester
            .validate_resource_config(
                SYSLOG,
                json!({
                    "name": "syslog",
                    "collector_id": 12,
                    "filters": [{"name": "f", "filter_type": "Drop", "regexp": ".*"}]
                }),
            )
            .await
            .unwrap_err();
        let diags = diagnostics(err);
        assert_eq!(diags[0].attribute.as_deref(), Some("filters.0.filter_type"));

        let err = tester
            .validate_resource_config(SYSLOG, json!({"collector_id": 12}))
            .await
            .unwrap_err();
        let diags = diagnostics(err);
        assert!(diags.iter().any(|d| d.attribute.as_deref() == Some("name")));

        let err = tester
            .validate_resource_config("sumologic_collector", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Provider(ProviderError::UnknownResource(_))));
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let (fake, tester) = setup();

        let created = tester
            .lifecycle_create(
                SYSLOG,
                json!({
                    "name": "syslog",
                    "collector_id": 12,
                    "description": "v1",
                    "default_date_formats": [{"format": "yyyy-MM-dd", "locator": "date=(.*)"}]
                }),
            )
            .await
            .unwrap();
        let id = source_id(&created);
        assert_eq!(created["description"], "v1");
        assert!(created["token"].is_string());
        assert_eq!(created["default_date_formats"][0]["locator"], "date=(.*)");

        let updated = tester
            .lifecycle_update(
                SYSLOG,
                created.clone(),
                json!({"name": "syslog", "collector_id": 12, "description": "v2"}),
            )
            .await
            .unwrap();
        assert_eq!(source_id(&updated), id);
        assert_eq!(updated["description"], "v2");
        assert_eq!(updated["token"], created["token"]);
        assert_eq!(fake.source(12, id).unwrap()["description"], "v2");

        tester.lifecycle_delete(SYSLOG, updated).await.unwrap();
        assert!(fake.source(12, id).is_none());
    }

    #[tokio::test]
    async fn test_read_of_deleted_source_is_null() {
        let (fake, tester) = setup();
        let created = tester
            .lifecycle_create(SYSLOG, json!({"name": "syslog", "collector_id": 12}))
            .await
            .unwrap();

        fake.remove_source(12, source_id(&created));
        assert!(tester.read(SYSLOG, created).await.unwrap().is_null());
    }

    #[tokio::test]
    async fn test_destroy_false_leaves_source() {
        let (fake, tester) = setup();
        let created = tester
            .lifecycle_create(HTTP, json!({"name": "uploads", "collector_id": 5, "destroy": false}))
            .await
            .unwrap();
        let calls = fake.calls().len();

        tester.lifecycle_delete(HTTP, created.clone()).await.unwrap();
        assert_eq!(fake.calls().len(), calls);
        assert!(fake.source(5, source_id(&created)).is_some());
    }

    #[tokio::test]
    async fn test_lookup_by_name_through_provider() {
        let (fake, tester) = setup();
        let existing = fake.insert_source(12, json!({"sourceType": "Cloudsyslog", "name": "syslog"}));

        let adopted = tester
            .lifecycle_create(
                SYSLOG,
                json!({"name": "syslog", "collector_id": 12, "lookup_by_name": true}),
            )
            .await
            .unwrap();

        assert_eq!(source_id(&adopted), existing);
        assert!(!fake.calls().iter().any(|c| matches!(c, RestCall::Post { .. })));
    }

    #[tokio::test]
    async fn test_api_errors_surface() {
        let (fake, tester) = setup();
        fake.fail_next(401);

        let err = tester
            .create(SYSLOG, json!({"name": "syslog", "collector_id": 12}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_prior_id() {
        let (_fake, tester) = setup();
        let created = tester
            .lifecycle_create(SYSLOG, json!({"name": "syslog", "collector_id": 12}))
            .await
            .unwrap();

        // The planned state from a host that drops computed values.
        let updated = tester
            .update(
                SYSLOG,
                created.clone(),
                json!({"name": "syslog", "collector_id": 12, "category": "net"}),
            )
            .await
            .unwrap();
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["category"], "net");
    }

    #[tokio::test]
    async fn test_plan_replace_on_collector_change() {
        let (_fake, tester) = setup();
        let prior = json!({"id": "34", "name": "syslog", "collector_id": 12, "token": "tok"});
        let plan = tester
            .plan_update(SYSLOG, prior, json!({"name": "syslog", "collector_id": 13}))
            .await
            .unwrap();

        assert!(plan.requires_replace);
        assert!(plan.changes.iter().any(|c| c.path == "collector_id"));
    }

    #[tokio::test]
    async fn test_rename_replaces_source() {
        let (fake, tester) = setup();
        let created = tester
            .lifecycle_create(SYSLOG, json!({"name": "a", "collector_id": 12}))
            .await
            .unwrap();
        let old_id = source_id(&created);
        let posts = || {
            fake.calls()
                .iter()
                .filter(|c| matches!(c, RestCall::Post { .. }))
                .count()
        };
        assert_eq!(posts(), 1);

        let replaced = tester
            .lifecycle_apply(SYSLOG, created.clone(), json!({"name": "b", "collector_id": 12}))
            .await
            .unwrap();

        assert_eq!(posts(), 2);
        assert_ne!(source_id(&replaced), old_id);
        assert_eq!(replaced["name"], "b");
        assert!(replaced["token"].is_string());
        assert!(fake.source(12, old_id).is_none());
        assert!(fake.source(12, source_id(&replaced)).is_some());
    }

    #[tokio::test]
    async fn test_in_place_change_does_not_replace() {
        let (fake, tester) = setup();
        let created = tester
            .lifecycle_create(SYSLOG, json!({"name": "a", "collector_id": 12}))
            .await
            .unwrap();

        let applied = tester
            .lifecycle_apply(
                SYSLOG,
                created.clone(),
                json!({"name": "a", "collector_id": 12, "category": "net"}),
            )
            .await
            .unwrap();

        assert_eq!(applied["id"], created["id"]);
        assert!(fake.calls().iter().any(|c| matches!(c, RestCall::Put { .. })));
    }

    #[tokio::test]
    async fn test_import() {
        let (fake, tester) = setup();
        let id = fake.insert_source(
            12,
            json!({"sourceType": "Cloudsyslog", "name": "legacy", "timeZone": "Asia/Tokyo"}),
        );

        let imported = tester.import_resource(SYSLOG, &format!("12/{}", id)).await.unwrap();
        assert_eq!(imported.len(), 1);
        let state = tester
            .read(SYSLOG, imported[0].state.clone())
            .await
            .unwrap();
        assert_eq!(state["name"], "legacy");
        assert_eq!(state["timezone"], "Asia/Tokyo");
        assert_eq!(state["collector_id"], 12);

        let err = tester.import_resource(SYSLOG, "12").await.unwrap_err();
        assert_eq!(err.message(), "expected collector_id/source_id, got 12");
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let (_fake, tester) = setup();
        let err = tester
            .create("sumologic_collector", json!({"name": "c"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
        assert!(tester.import_resource("sumologic_collector", "1/2").await.is_err());
    }
}
