//! HTTP client for the SpiceDB gateway.
//!
//! One method per backend operation the console needs. Every call is a JSON
//! POST authenticated with the preshared bearer token; streaming endpoints
//! answer with newline-delimited JSON, which is collected line by line.

pub mod types;

use std::time::Duration;

use miette::Diagnostic;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::settings;
use types::*;

#[derive(Debug, Error, Diagnostic)]
pub enum SpiceDbError {
    #[error("request to SpiceDB failed: {0}")]
    #[diagnostic(
        code(zedconsole::spicedb::transport),
        help("Check that spicedb.endpoint points at a reachable HTTP gateway")
    )]
    Transport(#[from] reqwest::Error),

    #[error("SpiceDB returned {status}: {message}")]
    #[diagnostic(code(zedconsole::spicedb::api))]
    Api { status: u16, message: String },

    #[error("unexpected response from SpiceDB: {0}")]
    #[diagnostic(code(zedconsole::spicedb::decode))]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct SpiceDbClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl SpiceDbClient {
    pub fn new(cfg: &settings::SpiceDb) -> Result<Self, SpiceDbError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .danger_accept_invalid_certs(cfg.insecure)
            .build()?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            token: cfg.token.clone(),
        })
    }

    async fn send<B: Serialize>(&self, path: &str, body: &B) -> Result<String, SpiceDbError> {
        let mut req = self
            .http
            .post(format!("{}{}", self.endpoint, path))
            .json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiStatus>(&text)
                .ok()
                .map(|s| s.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| text.trim().to_string());
            tracing::debug!(path, status = status.as_u16(), %message, "SpiceDB call failed");
            return Err(SpiceDbError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(text)
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, SpiceDbError> {
        let text = self.send(path, body).await?;
        serde_json::from_str(&text).map_err(|e| SpiceDbError::Decode(format!("{path}: {e}")))
    }

    async fn post_stream<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Vec<R>, SpiceDbError> {
        let text = self.send(path, body).await?;
        parse_stream(path, &text)
    }

    pub async fn read_schema(&self) -> Result<String, SpiceDbError> {
        let resp: ReadSchemaResponse = self
            .post_json("/v1/schema/read", &serde_json::json!({}))
            .await?;
        Ok(resp.schema_text)
    }

    /// Returns the zedtoken of the write, when the gateway reports one.
    pub async fn write_schema(&self, schema: &str) -> Result<Option<String>, SpiceDbError> {
        let resp: WriteResponse = self
            .post_json("/v1/schema/write", &WriteSchemaRequest { schema })
            .await?;
        Ok(resp.written_at.map(|t| t.token))
    }

    pub async fn read_relationships(
        &self,
        filter: RelationshipFilter,
    ) -> Result<Vec<Relationship>, SpiceDbError> {
        let results: Vec<ReadRelationshipsResult> = self
            .post_stream(
                "/v1/relationships/read",
                &ReadRelationshipsRequest {
                    relationship_filter: filter,
                },
            )
            .await?;
        Ok(results.into_iter().map(|r| r.relationship).collect())
    }

    pub async fn write_relationships(
        &self,
        updates: Vec<RelationshipUpdate>,
    ) -> Result<Option<String>, SpiceDbError> {
        let resp: WriteResponse = self
            .post_json(
                "/v1/relationships/write",
                &WriteRelationshipsRequest { updates },
            )
            .await?;
        Ok(resp.written_at.map(|t| t.token))
    }

    pub async fn check_permission(
        &self,
        resource: ObjectReference,
        permission: &str,
        subject: SubjectReference,
    ) -> Result<CheckPermissionResponse, SpiceDbError> {
        self.post_json(
            "/v1/permissions/check",
            &CheckPermissionRequest {
                resource,
                permission: permission.to_string(),
                subject,
            },
        )
        .await
    }

    pub async fn expand_permission(
        &self,
        resource: ObjectReference,
        permission: &str,
    ) -> Result<Option<PermissionTree>, SpiceDbError> {
        let resp: ExpandPermissionTreeResponse = self
            .post_json(
                "/v1/permissions/expand",
                &ExpandPermissionTreeRequest {
                    resource,
                    permission: permission.to_string(),
                },
            )
            .await?;
        Ok(resp.tree_root)
    }

    /// Ids of the subjects of `subject_type` holding `permission` on `resource`.
    pub async fn lookup_subjects(
        &self,
        resource: ObjectReference,
        permission: &str,
        subject_type: &str,
    ) -> Result<Vec<String>, SpiceDbError> {
        let results: Vec<LookupSubjectsResult> = self
            .post_stream(
                "/v1/permissions/subjects",
                &LookupSubjectsRequest {
                    resource,
                    permission: permission.to_string(),
                    subject_object_type: subject_type.to_string(),
                },
            )
            .await?;
        Ok(results
            .iter()
            .filter_map(|r| r.subject_id().map(str::to_string))
            .collect())
    }
}

/// Collect the `result` objects of an NDJSON stream body. An `error` line
/// aborts the whole stream.
fn parse_stream<R: DeserializeOwned>(path: &str, text: &str) -> Result<Vec<R>, SpiceDbError> {
    let mut out = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let item: StreamLine<R> = serde_json::from_str(line)
            .map_err(|e| SpiceDbError::Decode(format!("{path}: {e}")))?;
        if let Some(err) = item.error {
            return Err(SpiceDbError::Api {
                status: 200,
                message: err.message,
            });
        }
        if let Some(result) = item.result {
            out.push(result);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SpiceDbClient {
        SpiceDbClient::new(&settings::SpiceDb {
            endpoint: server.uri(),
            grpc_endpoint: None,
            token: Some("testtoken".into()),
            insecure: false,
            timeout_ms: 2_000,
        })
        .unwrap()
    }

    fn doc(id: &str) -> ObjectReference {
        ObjectReference {
            object_type: "document".into(),
            object_id: id.into(),
        }
    }

    #[tokio::test]
    async fn test_read_schema_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/schema/read"))
            .and(matchers::header("authorization", "Bearer testtoken"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "schemaText": "definition user {}" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let schema = client_for(&server).read_schema().await.unwrap();
        assert_eq!(schema, "definition user {}");
    }

    #[tokio::test]
    async fn test_api_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/schema/read"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 5,
                "message": "No schema has been defined; please call WriteSchema to start"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).read_schema().await.unwrap_err();
        match err {
            SpiceDbError::Api { status, message } => {
                assert_eq!(status, 404);
                assert!(message.starts_with("No schema has been defined"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_relationships_parses_stream() {
        let server = MockServer::start().await;
        let body = [
            json!({ "result": { "readAt": { "token": "t1" }, "relationship": {
                "resource": { "objectType": "document", "objectId": "readme" },
                "relation": "owner",
                "subject": { "object": { "objectType": "user", "objectId": "alice" } }
            }}})
            .to_string(),
            json!({ "result": { "relationship": {
                "resource": { "objectType": "document", "objectId": "readme" },
                "relation": "viewer",
                "subject": { "object": { "objectType": "group", "objectId": "eng" }, "optionalRelation": "member" }
            }}})
            .to_string(),
        ]
        .join("\n");
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/relationships/read"))
            .and(matchers::body_json(json!({
                "relationshipFilter": { "resourceType": "document" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let rels = client_for(&server)
            .read_relationships(RelationshipFilter {
                resource_type: Some("document".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let rendered: Vec<String> = rels.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "document:readme#owner@user:alice",
                "document:readme#viewer@group:eng#member"
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_error_line_fails_call() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/permissions/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                json!({ "error": { "code": 9, "message": "object definition `nope` not found" } })
                    .to_string(),
            ))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .lookup_subjects(doc("readme"), "view", "user")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("object definition `nope` not found"));
    }

    #[tokio::test]
    async fn test_check_permission() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/permissions/check"))
            .and(matchers::body_json(json!({
                "resource": { "objectType": "document", "objectId": "readme" },
                "permission": "view",
                "subject": { "object": { "objectType": "user", "objectId": "alice" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "checkedAt": { "token": "GhUKEzE2" },
                "permissionship": "PERMISSIONSHIP_HAS_PERMISSION"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let subject = SubjectReference {
            object: ObjectReference {
                object_type: "user".into(),
                object_id: "alice".into(),
            },
            optional_relation: None,
        };
        let resp = client_for(&server)
            .check_permission(doc("readme"), "view", subject)
            .await
            .unwrap();
        assert_eq!(
            resp.permissionship.as_deref(),
            Some("PERMISSIONSHIP_HAS_PERMISSION")
        );
    }

    #[tokio::test]
    async fn test_write_schema_returns_token() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/schema/write"))
            .and(matchers::body_json(json!({ "schema": "definition user {}" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "writtenAt": { "token": "zt1" } })),
            )
            .mount(&server)
            .await;

        let token = client_for(&server)
            .write_schema("definition user {}")
            .await
            .unwrap();
        assert_eq!(token.as_deref(), Some("zt1"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let client = SpiceDbClient::new(&settings::SpiceDb {
            endpoint: "http://127.0.0.1:9".into(),
            grpc_endpoint: None,
            token: None,
            insecure: false,
            timeout_ms: 500,
        })
        .unwrap();
        let err = client.read_schema().await.unwrap_err();
        assert!(matches!(err, SpiceDbError::Transport(_)));
    }

    #[tokio::test]
    async fn test_slow_backend_hits_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(matchers::path("/v1/schema/read"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "schemaText": "definition user {}" }))
                    .set_delay(std::time::Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        let client = SpiceDbClient::new(&settings::SpiceDb {
            endpoint: server.uri(),
            grpc_endpoint: None,
            token: None,
            insecure: false,
            timeout_ms: 200,
        })
        .unwrap();

        let started = std::time::Instant::now();
        let err = client.read_schema().await.unwrap_err();
        assert!(matches!(&err, SpiceDbError::Transport(e) if e.is_timeout()));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }
}
