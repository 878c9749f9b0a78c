// # Google Cloud DNS Backend
//
// Implements `vmdns-core`'s connection capability against the Cloud DNS
// v1 REST API. One `ClouddnsConnection` is one authenticated session; the
// factory validates each new session with a cheap project fetch so stale
// credentials fail at open time, where the pool's backoff policy owns
// them.
//
// This crate intentionally carries NO retry, backoff or pooling logic —
// all of that is owned by `vmdns-core`'s pool and mutator. Every method
// here is a single-shot API call that reports what the backend said.
//
// ## Fault mapping
//
// - HTTP 409 (`alreadyExists`) on an add is a *normal outcome*, returned
//   as `AddOutcome::AlreadyExists`, never an error
// - HTTP 412 (`conditionNotMet`) becomes `BackendError::PreconditionFailed`,
//   the one fault the mutator's fixed-delay budget applies to
// - 401/403 become `Authentication`, 404 `NotFound`, everything else
//   `Api { status, message }`
//
// ## API Reference
//
// - Changes: POST `projects/{project}/managedZones/{zone}/changes`
// - Record sets: GET `projects/{project}/managedZones/{zone}/rrsets`
// - Project: GET `projects/{project}`

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use vmdns_core::error::BackendError;
use vmdns_core::traits::{
    AddOutcome, AddressRecord, ConnectionFactory, ProviderConnection, RecordType,
};

/// Cloud DNS v1 REST API base URL
const CLOUDDNS_API_BASE: &str = "https://dns.googleapis.com/dns/v1";

/// HTTP timeout for every API request
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens authenticated Cloud DNS sessions for the connection pool
pub struct ClouddnsFactory {
    project: String,
    api_token: String,
    api_base: String,
}

// the token never appears in Debug output
impl std::fmt::Debug for ClouddnsFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClouddnsFactory")
            .field("project", &self.project)
            .field("api_token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ClouddnsFactory {
    /// Create a factory for `project` authenticating with `api_token`
    ///
    /// The token is an OAuth2 bearer token with DNS admin scope; how it is
    /// minted (service account, metadata server, workload identity) is the
    /// embedding application's concern.
    pub fn new(project: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            api_token: api_token.into(),
            api_base: CLOUDDNS_API_BASE.to_string(),
        }
    }

    /// Point the factory at a non-default API endpoint (emulators, tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl ConnectionFactory for ClouddnsFactory {
    type Connection = ClouddnsConnection;

    async fn open(&self) -> Result<ClouddnsConnection, BackendError> {
        if self.api_token.is_empty() {
            return Err(BackendError::Authentication(
                "api token is empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let connection = ClouddnsConnection {
            client,
            project: self.project.clone(),
            api_token: self.api_token.clone(),
            api_base: self.api_base.clone(),
        };

        // one cheap read proves the session before the pool hands it out
        connection.fetch_project().await?;
        debug!(project = %connection.project, "opened Cloud DNS session");
        Ok(connection)
    }
}

/// One authenticated Cloud DNS session
pub struct ClouddnsConnection {
    client: reqwest::Client,
    project: String,
    api_token: String,
    api_base: String,
}

impl std::fmt::Debug for ClouddnsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClouddnsConnection")
            .field("project", &self.project)
            .field("api_token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ClouddnsConnection {
    fn project_url(&self) -> String {
        format!("{}/projects/{}", self.api_base, self.project)
    }

    fn zone_url(&self, zone: &str) -> String {
        format!("{}/managedZones/{}", self.project_url(), zone)
    }

    /// Cheap read-only probe used to validate the session
    async fn fetch_project(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .get(self.project_url())
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Submit one change (additions and/or deletions) to the zone
    async fn post_change(&self, zone: &str, change: Value) -> Result<reqwest::Response, BackendError> {
        self.client
            .post(format!("{}/changes", self.zone_url(zone)))
            .bearer_auth(&self.api_token)
            .json(&change)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))
    }

    /// Fetch the existing A record set for `name`, if any
    async fn current_rrset(&self, zone: &str, name: &str) -> Result<Option<Value>, BackendError> {
        let response = self
            .client
            .get(format!("{}/rrsets", self.zone_url(zone)))
            .bearer_auth(&self.api_token)
            .query(&[("name", absolute_name(name).as_str()), ("type", "A")])
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(body
            .get("rrsets")
            .and_then(Value::as_array)
            .and_then(|rrsets| rrsets.first())
            .cloned())
    }
}

#[async_trait]
impl ProviderConnection for ClouddnsConnection {
    async fn add_record(
        &self,
        zone: &str,
        record: &AddressRecord,
    ) -> Result<AddOutcome, BackendError> {
        let change = json!({ "additions": [rrset_json(record)] });
        let response = self.post_change(zone, change).await?;

        if response.status().is_success() {
            debug!(hostname = %record.name, zone, "address record added");
            return Ok(AddOutcome::Created);
        }
        if response.status().as_u16() == 409 {
            // alreadyExists: a record of this name/type is present
            return Ok(AddOutcome::AlreadyExists);
        }
        Err(error_from_response(response).await)
    }

    async fn replace_record(
        &self,
        zone: &str,
        record: &AddressRecord,
    ) -> Result<(), BackendError> {
        // Cloud DNS replaces atomically: delete the current record set and
        // add the new one in a single change
        let mut change = json!({ "additions": [rrset_json(record)] });
        if let Some(existing) = self.current_rrset(zone, &record.name).await? {
            change["deletions"] = json!([existing]);
        }

        let response = self.post_change(zone, change).await?;
        if response.status().is_success() {
            debug!(hostname = %record.name, zone, "address record replaced");
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn remove_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), BackendError> {
        let existing = self
            .current_rrset(zone, name)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("{name} ({record_type})")))?;

        let response = self.post_change(zone, json!({ "deletions": [existing] })).await?;
        if response.status().is_success() {
            debug!(hostname = name, zone, "address record removed");
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn health_check(&self) -> bool {
        self.fetch_project().await.is_ok()
    }
}

/// Cloud DNS wants absolute (dot-terminated) record names
fn absolute_name(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// Record set payload for one address record
fn rrset_json(record: &AddressRecord) -> Value {
    json!({
        "name": absolute_name(&record.name),
        "type": "A",
        "ttl": record.ttl,
        "rrdatas": [record.ip.to_string()],
    })
}

/// Map a failed HTTP status and backend message to a [`BackendError`]
fn classify_status(status: u16, message: String) -> BackendError {
    match status {
        401 | 403 => BackendError::Authentication(message),
        404 => BackendError::NotFound(message),
        412 => BackendError::PreconditionFailed(message),
        _ => BackendError::Api { status, message },
    }
}

/// Drain a failed response into a [`BackendError`], pulling the message
/// out of the standard `{"error": {"message": ...}}` envelope when present
async fn error_from_response(response: reqwest::Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body);
    classify_status(status, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AddressRecord {
        AddressRecord::new("vm-8.test.example.net", "10.0.4.8".parse().unwrap())
    }

    #[test]
    fn record_names_are_made_absolute() {
        assert_eq!(absolute_name("vm-8.test.example.net"), "vm-8.test.example.net.");
        assert_eq!(absolute_name("vm-8.test.example.net."), "vm-8.test.example.net.");
    }

    #[test]
    fn rrset_payload_shape() {
        let rrset = rrset_json(&record());
        assert_eq!(rrset["name"], "vm-8.test.example.net.");
        assert_eq!(rrset["type"], "A");
        assert_eq!(rrset["ttl"], 60);
        assert_eq!(rrset["rrdatas"], json!(["10.0.4.8"]));
    }

    #[test]
    fn status_mapping_matches_backend_semantics() {
        assert!(matches!(
            classify_status(412, "conditionNotMet".into()),
            BackendError::PreconditionFailed(_)
        ));
        assert!(matches!(
            classify_status(403, "forbidden".into()),
            BackendError::Authentication(_)
        ));
        assert!(matches!(
            classify_status(404, "no such record".into()),
            BackendError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(500, "backend".into()),
            BackendError::Api { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn open_rejects_an_empty_token_before_any_network_io() {
        let factory = ClouddnsFactory::new("test-project", "");
        let err = factory.open().await.expect_err("empty token is refused");
        assert!(matches!(err, BackendError::Authentication(_)));
    }

    #[test]
    fn debug_output_never_contains_the_token() {
        let factory = ClouddnsFactory::new("test-project", "secret-token-12345");
        let debug = format!("{factory:?}");
        assert!(!debug.contains("secret-token-12345"));
        assert!(debug.contains("<REDACTED>"));
    }
}
