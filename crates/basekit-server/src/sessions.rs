// crates/basekit-server/src/sessions.rs
// ============================================================================
// Module: Session Lifecycle
// Description: Login, logout, and session revocation helpers.
// Purpose: Issue and revoke the sessions the session processor resolves.
// Dependencies: basekit-core, serde_json
// ============================================================================

//! ## Overview
//! [`SessionManager`] verifies credentials against a user collection in a
//! [`DocumentStore`] and issues sessions into a [`SessionStore`]. User
//! documents carry `_id`, `email`, a hashed `password`, and an `active` flag.
//! Emails are compared trimmed and lowercased. Logging in from a device
//! revokes that device's earlier sessions for the same user.
//!
//! Failed logins report `invalid_user` or `disabled_user`; methods built on
//! these helpers must declare both kinds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use basekit_core::ApiError;
use basekit_core::DocumentStore;
use basekit_core::ErrorKind;
use basekit_core::ObjectId;
use basekit_core::SessionRecord;
use basekit_core::SessionStore;
use basekit_core::Timestamp;
use basekit_core::generate_session_token;
use basekit_core::verify_password;
use serde_json::Value;
use serde_json::json;

use crate::processors::MALFORMED_SESSION_MESSAGE;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default collection holding user documents.
pub const USERS_COLLECTION: &str = "users";
/// Error kind for unknown users and wrong passwords.
pub const INVALID_USER_KIND: &str = "invalid_user";
/// Message for unknown users and wrong passwords.
pub const INVALID_LOGIN_MESSAGE: &str = "Login failed, invalid user or password.";
/// Message for users whose account is disabled.
pub const DISABLED_USER_MESSAGE: &str = "Login failed, user disabled.";

// ============================================================================
// SECTION: Session Manager
// ============================================================================

/// Credentials presented at login.
#[derive(Debug, Clone, Copy)]
pub struct LoginRequest<'a> {
    /// Account email, compared trimmed and lowercased.
    pub email: &'a str,
    /// Plaintext password.
    pub password: &'a str,
    /// Device the client logs in from.
    pub device_id: Option<&'a str>,
}

/// Issues and revokes sessions.
pub struct SessionManager {
    /// Session storage shared with the session processor.
    sessions: Arc<dyn SessionStore>,
    /// User document storage.
    users: Arc<dyn DocumentStore>,
    /// Collection holding user documents.
    collection: String,
}

impl SessionManager {
    /// Creates a manager reading users from [`USERS_COLLECTION`].
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>, users: Arc<dyn DocumentStore>) -> Self {
        Self {
            sessions,
            users,
            collection: USERS_COLLECTION.to_string(),
        }
    }

    /// Reads users from `collection` instead.
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Verifies credentials and opens a session.
    ///
    /// # Errors
    ///
    /// Returns `invalid_user` for an unknown email or wrong password,
    /// `disabled_user` for an inactive account, and `internal` for storage
    /// failures or a user document without a usable `_id`.
    pub async fn login(&self, request: LoginRequest<'_>) -> Result<SessionRecord, ApiError> {
        let email = normalize_email(request.email);
        let user = self.users.find_one(&self.collection, &json!({"email": email})).await?;
        let Some(user) = user else {
            return Err(invalid_login());
        };
        let stored = user.get("password").and_then(Value::as_str).unwrap_or_default();
        if !verify_password(request.password, stored) {
            return Err(invalid_login());
        }
        if user.get("active").and_then(Value::as_bool) != Some(true) {
            return Err(ApiError::new(ErrorKind::DisabledUser, DISABLED_USER_MESSAGE));
        }
        let user_id = user
            .get("_id")
            .and_then(ObjectId::from_value)
            .ok_or_else(|| ApiError::internal("User document has no usable _id."))?;
        if let Some(device) = request.device_id {
            self.sessions.remove_for_user(user_id, Some(device)).await?;
        }
        let record = SessionRecord {
            token: generate_session_token(),
            user_id: Some(user_id),
            device_id: request.device_id.map(str::to_string),
            created_at: Timestamp::now(),
        };
        self.sessions.create(record.clone()).await?;
        Ok(record)
    }

    /// Closes the session for `token`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_parameter` when the token is missing or empty and
    /// `internal` for storage failures.
    pub async fn logout(&self, token: Option<&str>) -> Result<(), ApiError> {
        let token = token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::invalid_parameter(MALFORMED_SESSION_MESSAGE))?;
        self.sessions.remove(token).await?;
        Ok(())
    }

    /// Revokes every session of `user_id`, returning the number removed.
    ///
    /// # Errors
    ///
    /// Returns `internal` for storage failures.
    pub async fn remove_sessions(&self, user_id: ObjectId) -> Result<u64, ApiError> {
        Ok(self.sessions.remove_for_user(user_id, None).await?)
    }
}

/// Trims and lowercases an email for comparison.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Builds the shared wrong-credentials error.
fn invalid_login() -> ApiError {
    ApiError::new(ErrorKind::from_token(INVALID_USER_KIND), INVALID_LOGIN_MESSAGE)
}
