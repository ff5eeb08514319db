//! Wire types for the SpiceDB HTTP gateway (`/v1/...`). Field names follow
//! the gateway's camelCase JSON mapping of the v1 protobuf API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub object_type: String,
    pub object_id: String,
}

impl std::fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectReference {
    pub object: ObjectReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_relation: Option<String>,
}

impl std::fmt::Display for SubjectReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.object)?;
        match self.optional_relation.as_deref() {
            Some(rel) if !rel.is_empty() => write!(f, "#{rel}"),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub resource: ObjectReference,
    pub relation: String,
    pub subject: SubjectReference,
}

impl std::fmt::Display for Relationship {
    /// `document:readme#viewer@user:alice`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}@{}", self.resource, self.relation, self.subject)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectFilter {
    pub subject_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional_subject_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional_resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional_relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional_subject_filter: Option<SubjectFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateOperation {
    #[serde(rename = "OPERATION_CREATE")]
    Create,
    #[serde(rename = "OPERATION_TOUCH")]
    Touch,
    #[serde(rename = "OPERATION_DELETE")]
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipUpdate {
    pub operation: UpdateOperation,
    pub relationship: Relationship,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZedToken {
    #[serde(default)]
    pub token: String,
}

// ---------- request/response bodies ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadSchemaResponse {
    #[serde(default)]
    pub schema_text: String,
}

#[derive(Debug, Serialize)]
pub struct WriteSchemaRequest<'a> {
    pub schema: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    #[serde(default)]
    pub written_at: Option<ZedToken>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRelationshipsRequest {
    pub relationship_filter: RelationshipFilter,
}

#[derive(Debug, Deserialize)]
pub struct ReadRelationshipsResult {
    pub relationship: Relationship,
}

#[derive(Debug, Serialize)]
pub struct WriteRelationshipsRequest {
    pub updates: Vec<RelationshipUpdate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPermissionRequest {
    pub resource: ObjectReference,
    pub permission: String,
    pub subject: SubjectReference,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPermissionResponse {
    #[serde(default)]
    pub checked_at: Option<ZedToken>,
    /// `PERMISSIONSHIP_HAS_PERMISSION`, `PERMISSIONSHIP_NO_PERMISSION`,
    /// `PERMISSIONSHIP_CONDITIONAL_PERMISSION`
    #[serde(default)]
    pub permissionship: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandPermissionTreeRequest {
    pub resource: ObjectReference,
    pub permission: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandPermissionTreeResponse {
    #[serde(default)]
    pub tree_root: Option<PermissionTree>,
}

/// Node of an expanded permission tree: either an operation over children
/// or a leaf listing subjects.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionTree {
    #[serde(default)]
    pub intermediate: Option<AlgebraicSubjectSet>,
    #[serde(default)]
    pub leaf: Option<DirectSubjectSet>,
    #[serde(default)]
    pub expanded_object: Option<ObjectReference>,
    #[serde(default)]
    pub expanded_relation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlgebraicSubjectSet {
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub children: Vec<PermissionTree>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectSubjectSet {
    #[serde(default)]
    pub subjects: Vec<SubjectReference>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupSubjectsRequest {
    pub resource: ObjectReference,
    pub permission: String,
    pub subject_object_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupSubjectsResult {
    #[serde(default)]
    pub subject: Option<ResolvedSubject>,
    /// Older gateways put the id at the top level
    #[serde(default)]
    pub subject_object_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSubject {
    pub subject_object_id: String,
}

impl LookupSubjectsResult {
    pub fn subject_id(&self) -> Option<&str> {
        self.subject
            .as_ref()
            .map(|s| s.subject_object_id.as_str())
            .or(self.subject_object_id.as_deref())
    }
}

/// One line of a streaming (NDJSON) gateway response.
#[derive(Debug, Deserialize)]
pub struct StreamLine<T> {
    pub result: Option<T>,
    pub error: Option<ApiStatus>,
}

/// Error body returned by the gateway (`google.rpc.Status`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}
