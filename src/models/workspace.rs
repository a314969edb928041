use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body for `POST /workspaces`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspaceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Workspace-scoped token handed to a frontend for uploads
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceAccessToken {
    pub workspace_id: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for WorkspaceAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceAccessToken")
            .field("workspace_id", &self.workspace_id)
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_skips_empty_fields() {
        let request = CreateWorkspaceRequest {
            name: Some("uploads".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"name": "uploads"}));
    }

    #[test]
    fn test_access_token_keeps_unknown_fields() {
        let token: WorkspaceAccessToken = serde_json::from_value(json!({
            "workspaceId": "ws-1",
            "accessToken": "jwt",
            "expiresAt": "2026-10-19T12:00:00Z",
            "region": "eu"
        }))
        .unwrap();

        assert_eq!(token.workspace_id, "ws-1");
        assert_eq!(token.expires_at.as_deref(), Some("2026-10-19T12:00:00Z"));
        assert_eq!(token.extra.get("region"), Some(&json!("eu")));
        assert!(!format!("{:?}", token).contains("jwt"));
    }
}
