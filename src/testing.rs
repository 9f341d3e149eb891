//! Test doubles for the provider.
//!
//! [`FakeSumo`] stands in for the SumoLogic REST API and records every call.
//! [`ProviderTester`] drives a [`ProviderService`] the way the host would,
//! without a gRPC server.
//!
//! ```ignore
//! let fake = Arc::new(FakeSumo::new());
//! let tester = ProviderTester::new(SumoLogicProvider::with_client(SumoClient::new(fake.clone())));
//!
//! let state = tester
//!     .lifecycle_create("sumologic_cloudsyslog_source", json!({"name": "syslog", "collector_id": 12}))
//!     .await
//!     .unwrap();
//! assert!(fake.source(12, state["id"].as_str().unwrap().parse().unwrap()).is_some());
//! ```

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{RestClient, RestResponse};
use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::sources::{CLOUDSYSLOG_SOURCE_TYPE, HTTP_SOURCE_TYPE};
use crate::types::{ImportedResource, PlanResult};

// =========================================================================
// Fake SumoLogic API
// =========================================================================

/// One request seen by [`FakeSumo`].
#[derive(Debug, Clone, PartialEq)]
pub enum RestCall {
    Get { path: String },
    Post { path: String, body: Value },
    Put { path: String, body: Value, etag: Option<String> },
    Delete { path: String },
}

#[derive(Debug)]
struct StoredSource {
    source: Value,
    version: u64,
}

impl StoredSource {
    fn id(&self) -> i64 {
        self.source["id"].as_i64().unwrap_or_default()
    }

    fn etag(&self) -> String {
        format!("\"v{}\"", self.version)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: i64,
    collectors: BTreeMap<i64, Vec<StoredSource>>,
    calls: Vec<RestCall>,
    fail_next: Option<u16>,
}

impl FakeState {
    fn issue(&mut self, collector_id: i64, mut source: Value) -> Value {
        self.next_id += 1;
        let id = 100 + self.next_id;
        source["id"] = json!(id);
        match source["sourceType"].as_str() {
            Some(CLOUDSYSLOG_SOURCE_TYPE) => source["token"] = json!(format!("tok-{}-{}", collector_id, id)),
            Some(HTTP_SOURCE_TYPE) => {
                source["url"] = json!(format!(
                    "https://collectors.sumologic.test/receiver/v1/http/{}-{}",
                    collector_id, id
                ))
            },
            _ => {},
        }
        self.collectors
            .entry(collector_id)
            .or_default()
            .push(StoredSource {
                source: source.clone(),
                version: 1,
            });
        source
    }

    fn find_mut(&mut self, collector_id: i64, source_id: i64) -> Option<&mut StoredSource> {
        self.collectors
            .get_mut(&collector_id)?
            .iter_mut()
            .find(|s| s.id() == source_id)
    }

    fn injected_failure(&mut self) -> Result<(), ProviderError> {
        match self.fail_next.take() {
            Some(status) => Err(ProviderError::from_status(status, "injected failure")),
            None => Ok(()),
        }
    }
}

/// In-memory SumoLogic API keeping sources per collector in insertion order.
///
/// Ids start at 101. Cloud syslog sources get a token and HTTP sources a
/// URL, the way the real service issues them.
#[derive(Debug, Default)]
pub struct FakeSumo {
    state: Mutex<FakeState>,
}

/// `collectors/{c}/sources[/{s}]` split into its ids.
fn parse_path(path: &str) -> Option<(i64, Option<i64>)> {
    let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
    match parts.as_slice() {
        ["collectors", c, "sources"] => Some((c.parse().ok()?, None)),
        ["collectors", c, "sources", s] => Some((c.parse().ok()?, Some(s.parse().ok()?))),
        _ => None,
    }
}

fn not_found(path: &str) -> ProviderError {
    ProviderError::from_status(404, format!("{{\"status\":404,\"id\":\"{}\"}}", path))
}

fn to_body(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap_or_default()
}

impl FakeSumo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<RestCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Seed a source as if it had been created out of band. Returns its id.
    pub fn insert_source(&self, collector_id: i64, source: Value) -> i64 {
        let mut state = self.state.lock().unwrap();
        state.issue(collector_id, source)["id"]
            .as_i64()
            .unwrap_or_default()
    }

    /// Delete a source behind the provider's back.
    pub fn remove_source(&self, collector_id: i64, source_id: i64) {
        let mut state = self.state.lock().unwrap();
        if let Some(sources) = state.collectors.get_mut(&collector_id) {
            sources.retain(|s| s.id() != source_id);
        }
    }

    /// Merge `fields` into a stored source, as an edit in the web UI would.
    pub fn patch_source(&self, collector_id: i64, source_id: i64, fields: Value) {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .find_mut(collector_id, source_id)
            .expect("patched source exists");
        if let (Some(target), Value::Object(fields)) = (stored.source.as_object_mut(), fields) {
            target.extend(fields);
        }
        stored.version += 1;
    }

    /// The stored API record of a source.
    pub fn source(&self, collector_id: i64, source_id: i64) -> Option<Value> {
        let mut state = self.state.lock().unwrap();
        state
            .find_mut(collector_id, source_id)
            .map(|s| s.source.clone())
    }

    /// Make the next request fail with `status`.
    pub fn fail_next(&self, status: u16) {
        self.state.lock().unwrap().fail_next = Some(status);
    }
}

#[async_trait]
impl RestClient for FakeSumo {
    async fn get(&self, path: &str) -> Result<Option<RestResponse>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RestCall::Get {
            path: path.to_string(),
        });
        state.injected_failure()?;

        let response = match parse_path(path) {
            Some((collector_id, None)) => state.collectors.get(&collector_id).map(|sources| {
                let listed: Vec<Value> = sources.iter().map(|s| s.source.clone()).collect();
                RestResponse {
                    body: to_body(json!({ "sources": listed })),
                    etag: None,
                }
            }),
            Some((collector_id, Some(source_id))) => {
                state
                    .find_mut(collector_id, source_id)
                    .map(|stored| RestResponse {
                        body: to_body(json!({ "source": stored.source })),
                        etag: Some(stored.etag()),
                    })
            },
            None => None,
        };
        Ok(response)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Vec<u8>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RestCall::Post {
            path: path.to_string(),
            body: body.clone(),
        });
        state.injected_failure()?;

        let Some((collector_id, None)) = parse_path(path) else {
            return Err(not_found(path));
        };
        let created = state.issue(collector_id, body["source"].clone());
        Ok(to_body(json!({ "source": created })))
    }

    async fn put(
        &self,
        path: &str,
        body: &Value,
        etag: Option<&str>,
    ) -> Result<Vec<u8>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RestCall::Put {
            path: path.to_string(),
            body: body.clone(),
            etag: etag.map(str::to_string),
        });
        state.injected_failure()?;

        let Some((collector_id, Some(source_id))) = parse_path(path) else {
            return Err(not_found(path));
        };
        let Some(stored) = state.find_mut(collector_id, source_id) else {
            return Err(not_found(path));
        };
        if etag.is_some_and(|etag| etag != stored.etag()) {
            return Err(ProviderError::from_status(412, "etag mismatch"));
        }

        let mut replacement = body["source"].clone();
        for server_owned in ["id", "token", "url"] {
            if let Some(v) = stored.source.get(server_owned) {
                replacement[server_owned] = v.clone();
            }
        }
        stored.source = replacement.clone();
        stored.version += 1;
        Ok(to_body(json!({ "source": replacement })))
    }

    async fn delete(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RestCall::Delete {
            path: path.to_string(),
        });
        state.injected_failure()?;

        let Some((collector_id, Some(source_id))) = parse_path(path) else {
            return Err(not_found(path));
        };
        let sources = state.collectors.entry(collector_id).or_default();
        let before = sources.len();
        sources.retain(|s| s.id() != source_id);
        if sources.len() == before {
            return Err(not_found(path));
        }
        Ok(Vec::new())
    }
}

// =========================================================================
// Provider tester
// =========================================================================

/// Drives a [`ProviderService`] through the host's call sequences.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// `Err` with the error diagnostics if there are any.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// `Err` with the error diagnostics if there are any.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// plan -> create -> read. Returns the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// plan -> update -> read. Returns the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// plan, then delete -> create -> read when the plan replaces, or
    /// update -> read otherwise. Returns the state after read.
    pub async fn lifecycle_apply(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let applied = if plan.requires_replace {
            self.delete(resource_type, prior_state).await?;
            self.create(resource_type, plan.planned_state).await?
        } else {
            self.update(resource_type, prior_state, plan.planned_state)
                .await?
        };
        self.read(resource_type, applied).await
    }

    /// plan -> delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }
}

/// Failure of a tester call that reports diagnostics.
#[derive(Debug)]
pub enum TestError {
    Diagnostics(Vec<Diagnostic>),
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Panics unless one of `diagnostics` is an error mentioning `substring`
/// in its summary or detail.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let matching = diagnostics.iter().any(|d| {
        d.is_error()
            && (d.summary.contains(substring)
                || d.detail.as_deref().is_some_and(|detail| detail.contains(substring)))
    });

    assert!(
        matching,
        "Expected an error containing '{}', got: {:?}",
        substring, diagnostics
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("collectors/12/sources"), Some((12, None)));
        assert_eq!(parse_path("/collectors/12/sources/34"), Some((12, Some(34))));
        assert_eq!(parse_path("collectors/x/sources"), None);
        assert_eq!(parse_path("collectors"), None);
    }

    #[tokio::test]
    async fn test_fake_lists_in_insertion_order() {
        let fake = FakeSumo::new();
        let a = fake.insert_source(1, json!({"name": "a"}));
        let b = fake.insert_source(1, json!({"name": "b"}));

        let listed = fake.get("collectors/1/sources").await.unwrap().unwrap();
        let listed: Value = serde_json::from_slice(&listed.body).unwrap();
        assert_eq!(listed["sources"][0]["id"], a);
        assert_eq!(listed["sources"][1]["id"], b);

        assert!(fake.get("collectors/2/sources").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fake_rejects_stale_etag() {
        let fake = FakeSumo::new();
        let id = fake.insert_source(1, json!({"name": "a"}));
        let path = format!("collectors/1/sources/{}", id);

        let err = fake
            .put(&path, &json!({"source": {"name": "b"}}), Some("\"v0\""))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));

        fake.put(&path, &json!({"source": {"name": "b"}}), Some("\"v1\""))
            .await
            .unwrap();
        assert_eq!(fake.source(1, id).unwrap()["name"], "b");
        assert_eq!(fake.source(1, id).unwrap()["id"], id);
    }

    #[tokio::test]
    async fn test_fake_injected_failure_applies_once() {
        let fake = FakeSumo::new();
        fake.fail_next(401);

        let err = fake.get("collectors/1/sources").await.unwrap_err();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
        assert!(fake.get("collectors/1/sources").await.is_ok());
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Missing required attribute").with_attribute("name"),
            Diagnostic::error("Invalid value").with_detail("Expected one of [Include]"),
        ]);

        let display = format!("{}", err);
        assert!(display.contains("Missing required attribute"));
        assert!(display.contains("(at name)"));
        assert!(display.contains("Expected one of [Include]"));
    }
}
