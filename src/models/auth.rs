//! Authentication-related data models.

use serde::{Deserialize, Serialize};

/// Role granted to administrators by the API.
pub const ADMIN_ROLE: &str = "admin";

/// Request model for user login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request model for account registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Identity record returned by the authentication endpoints.
///
/// Only `id`, `username` and `role` are required; the server also sends
/// `email` and `created_at`, which are kept when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Response model for successful login and registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Error payload shape used by the API (`{"detail": "..."}`).
///
/// Validation failures send `detail` as a list of objects, so the field is
/// kept as raw JSON and flattened by [`ErrorBody::message`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Human-readable message carried by the payload, if any.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .map(str::to_string)
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("; "))
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_ignores_unknown_fields() {
        let json = r#"{"id": 7, "username": "ana", "role": "user", "email": "a@b.c", "is_active": true}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
        assert!(!user.is_admin());
    }

    #[test]
    fn test_user_without_optional_fields() {
        let json = r#"{"id": 1, "username": "root", "role": "admin"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert!(user.is_admin());
        assert!(user.created_at.is_none());

        // Optional fields are not written back when absent
        let encoded = serde_json::to_string(&user).unwrap();
        assert!(!encoded.contains("email"));
    }

    #[test]
    fn test_token_response_defaults_token_type() {
        let json = r#"{"access_token": "abc", "user": {"id": 1, "username": "u", "role": "user"}}"#;
        let resp: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.token_type, "bearer");
    }

    #[test]
    fn test_error_body_messages() {
        let plain: ErrorBody = serde_json::from_str(r#"{"detail": "Invalid credentials"}"#).unwrap();
        assert_eq!(plain.message().as_deref(), Some("Invalid credentials"));

        let validation: ErrorBody = serde_json::from_str(
            r#"{"detail": [{"loc": ["body", "password"], "msg": "too short"}]}"#,
        )
        .unwrap();
        assert_eq!(validation.message().as_deref(), Some("too short"));

        let empty: ErrorBody = serde_json::from_str("{}").unwrap();
        assert!(empty.message().is_none());
    }
}
