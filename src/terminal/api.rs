use async_trait::async_trait;
use chrono::Utc;

use crate::spicedb::types::{PermissionTree, Relationship, RelationshipUpdate};
use crate::spicedb::{SpiceDbClient, SpiceDbError};
use crate::terminal::dispatch::{Invocation, Operation};
use crate::terminal::result::ExecutionResult;
use crate::terminal::CommandExecutor;

/// Executes commands as direct calls against the SpiceDB HTTP gateway.
/// No shell is involved, so command text is never screened.
#[derive(Debug, Clone)]
pub struct ApiExecutor {
    client: SpiceDbClient,
}

impl ApiExecutor {
    pub fn new(client: SpiceDbClient) -> Self {
        Self { client }
    }

    async fn run(&self, operation: &Operation) -> Result<String, SpiceDbError> {
        match operation {
            Operation::SchemaRead => self.client.read_schema().await,
            Operation::RelationshipRead(filter) => {
                let rels = self.client.read_relationships(filter.clone()).await?;
                Ok(format_relationships(&rels))
            }
            Operation::RelationshipWrite {
                operation,
                resource,
                relation,
                subject,
            } => {
                let update = RelationshipUpdate {
                    operation: *operation,
                    relationship: Relationship {
                        resource: resource.clone().into(),
                        relation: relation.clone(),
                        subject: subject.clone().into(),
                    },
                };
                let token = self.client.write_relationships(vec![update]).await?;
                Ok(format!("Written at {}", token.as_deref().unwrap_or("(no token)")))
            }
            Operation::PermissionCheck {
                resource,
                permission,
                subject,
            } => {
                let resp = self
                    .client
                    .check_permission(resource.clone().into(), permission, subject.clone().into())
                    .await?;
                Ok(format!(
                    "Permissionship: {}",
                    resp.permissionship.as_deref().unwrap_or("UNKNOWN")
                ))
            }
            Operation::PermissionExpand {
                resource,
                permission,
            } => {
                let tree = self
                    .client
                    .expand_permission(resource.clone().into(), permission)
                    .await?;
                Ok(match tree {
                    Some(tree) => format_tree(&tree),
                    None => "No expansion returned".to_string(),
                })
            }
            Operation::LookupSubjects {
                resource,
                permission,
                subject_type,
            } => {
                let ids = self
                    .client
                    .lookup_subjects(resource.clone().into(), permission, subject_type)
                    .await?;
                if ids.is_empty() {
                    Ok("No subjects found".to_string())
                } else {
                    Ok(ids
                        .iter()
                        .map(|id| format!("{subject_type}:{id}"))
                        .collect::<Vec<_>>()
                        .join("\n"))
                }
            }
        }
    }
}

#[async_trait]
impl CommandExecutor for ApiExecutor {
    async fn execute(&self, invocation: &Invocation) -> ExecutionResult {
        let started_at = Utc::now();
        match self.run(&invocation.operation).await {
            Ok(stdout) => ExecutionResult::from_output(started_at, stdout, String::new()),
            Err(e) => {
                tracing::debug!(error = %e, "backend call failed");
                ExecutionResult::from_output(started_at, String::new(), e.to_string())
            }
        }
    }
}

fn format_relationships(rels: &[Relationship]) -> String {
    if rels.is_empty() {
        return "No relationships found".to_string();
    }
    rels.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render an expansion as an indented tree, one node per line.
fn format_tree(tree: &PermissionTree) -> String {
    let mut out = Vec::new();
    write_tree(tree, 0, &mut out);
    out.join("\n")
}

fn write_tree(node: &PermissionTree, depth: usize, out: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let label = match (&node.expanded_object, &node.expanded_relation) {
        (Some(obj), Some(rel)) => format!("{obj}#{rel}"),
        (Some(obj), None) => obj.to_string(),
        _ => String::new(),
    };

    if let Some(set) = &node.intermediate {
        let op = set
            .operation
            .strip_prefix("OPERATION_")
            .unwrap_or(&set.operation)
            .to_lowercase();
        if label.is_empty() {
            out.push(format!("{indent}({op})"));
        } else {
            out.push(format!("{indent}{label} ({op})"));
        }
        for child in &set.children {
            write_tree(child, depth + 1, out);
        }
    } else if let Some(leaf) = &node.leaf {
        out.push(format!("{indent}{label}"));
        for subject in &leaf.subjects {
            out.push(format!("{indent}  - {subject}"));
        }
    } else {
        out.push(format!("{indent}{label}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings;
    use crate::terminal::command::Command;
    use crate::terminal::dispatch::resolve;
    use crate::terminal::tokenizer::split;
    use serde_json::json;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    fn executor_for(server: &MockServer) -> ApiExecutor {
        executor_with_timeout(server, 2_000)
    }

    fn executor_with_timeout(server: &MockServer, timeout_ms: u64) -> ApiExecutor {
        ApiExecutor::new(
            SpiceDbClient::new(&settings::SpiceDb {
                endpoint: server.uri(),
                grpc_endpoint: None,
                token: Some("t".into()),
                insecure: false,
                timeout_ms,
            })
            .unwrap(),
        )
    }

    fn invocation(line: &str) -> Invocation {
        let command = Command::parse(split(line)).unwrap();
        let operation = resolve(&command, settings::FlagMode::Lenient).unwrap();
        Invocation { command, operation }
    }

    #[tokio::test]
    async fn test_schema_read_returns_text() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/schema/read"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "schemaText": "definition user {}" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(matchers::path("/v1/relationships/read"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let result = executor_for(&server)
            .execute(&invocation("zed schema read"))
            .await;
        assert!(result.ok);
        assert_eq!(result.code, Some(0));
        assert_eq!(result.stdout, "definition user {}");
        assert_eq!(result.stderr, "");
    }

    #[tokio::test]
    async fn test_backend_timeout_is_failed_result() {
        let server = MockServer::start().await;
        Mock::given(matchers::path("/v1/schema/read"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "schemaText": "definition user {}" }))
                    .set_delay(std::time::Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let result = executor_with_timeout(&server, 200)
            .execute(&invocation("zed schema read"))
            .await;
        assert!(!result.ok);
        assert_eq!(result.code, Some(1));
        assert_eq!(result.stdout, "");
        assert!(result.stderr.contains("request to SpiceDB failed"));
        assert!(result.duration_ms < 2_000);
    }

    #[tokio::test]
    async fn test_permission_check_formats_permissionship() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/permissions/check"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "permissionship": "PERMISSIONSHIP_NO_PERMISSION"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = executor_for(&server)
            .execute(&invocation(
                "zed permission check document:readme view user:alice",
            ))
            .await;
        assert!(result.ok);
        assert_eq!(result.stdout, "Permissionship: PERMISSIONSHIP_NO_PERMISSION");
    }

    #[tokio::test]
    async fn test_missing_permissionship_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(matchers::path("/v1/permissions/check"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let result = executor_for(&server)
            .execute(&invocation(
                "zed permission check document:readme view user:alice",
            ))
            .await;
        assert_eq!(result.stdout, "Permissionship: UNKNOWN");
    }

    #[tokio::test]
    async fn test_empty_relationship_read() {
        let server = MockServer::start().await;
        Mock::given(matchers::path("/v1/relationships/read"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let result = executor_for(&server)
            .execute(&invocation(
                "zed relationship read --resource-type document",
            ))
            .await;
        assert!(result.ok);
        assert_eq!(result.stdout, "No relationships found");
    }

    #[tokio::test]
    async fn test_backend_error_goes_to_stderr() {
        let server = MockServer::start().await;
        Mock::given(matchers::path("/v1/schema/read"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "code": 16, "message": "invalid preshared key"
            })))
            .mount(&server)
            .await;

        let result = executor_for(&server)
            .execute(&invocation("zed schema read"))
            .await;
        assert!(!result.ok);
        assert_eq!(result.code, Some(1));
        assert_eq!(result.stdout, "");
        assert!(result.stderr.contains("invalid preshared key"));
    }

    #[tokio::test]
    async fn test_relationship_create_reports_token() {
        let server = MockServer::start().await;
        Mock::given(matchers::path("/v1/relationships/write"))
            .and(matchers::body_json(json!({
                "updates": [{
                    "operation": "OPERATION_CREATE",
                    "relationship": {
                        "resource": { "objectType": "document", "objectId": "readme" },
                        "relation": "viewer",
                        "subject": { "object": { "objectType": "user", "objectId": "bob" } }
                    }
                }]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "writtenAt": { "token": "zt9" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = executor_for(&server)
            .execute(&invocation(
                "zed relationship create document:readme viewer user:bob",
            ))
            .await;
        assert!(result.ok, "stderr: {}", result.stderr);
        assert_eq!(result.stdout, "Written at zt9");
    }

    #[tokio::test]
    async fn test_lookup_subjects_lists_typed_ids() {
        let server = MockServer::start().await;
        let body = [
            json!({ "result": { "subject": { "subjectObjectId": "alice" } } }).to_string(),
            json!({ "result": { "subject": { "subjectObjectId": "bob" } } }).to_string(),
        ]
        .join("\n");
        Mock::given(matchers::path("/v1/permissions/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let result = executor_for(&server)
            .execute(&invocation(
                "zed permission lookup-subjects document:readme view user",
            ))
            .await;
        assert_eq!(result.stdout, "user:alice\nuser:bob");
    }

    #[test]
    fn test_format_tree() {
        let tree: PermissionTree = serde_json::from_value(json!({
            "expandedObject": { "objectType": "document", "objectId": "readme" },
            "expandedRelation": "view",
            "intermediate": {
                "operation": "OPERATION_UNION",
                "children": [{
                    "expandedObject": { "objectType": "document", "objectId": "readme" },
                    "expandedRelation": "owner",
                    "leaf": { "subjects": [
                        { "object": { "objectType": "user", "objectId": "alice" } }
                    ] }
                }]
            }
        }))
        .unwrap();

        assert_eq!(
            format_tree(&tree),
            "document:readme#view (union)\n  document:readme#owner\n    - user:alice"
        );
    }
}
