use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Household, RemoteSession, UserProfile};

/// Structured failure reported by the remote store or auth API.
///
/// `kind` is the primary classification signal; `code` carries the
/// backend's own error code when it exposes one (constraint names,
/// HTTP-ish statuses), and is logged rather than matched on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    Network,
    Timeout,
    Unauthorized,
    Validation,
    Conflict,
    Other,
}

/// Whether a failed write is worth submitting again unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Transient,
    Permanent,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Network, "NET/UNREACHABLE", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Timeout, "NET/TIMEOUT", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Unauthorized, "AUTH/INVALID", message)
    }

    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Validation, code, message)
    }

    /// Classify by the structured kind. Errors the backend left untagged
    /// fall back to the historical message heuristic, so an integration
    /// that reports bare strings still halts the queue on connectivity
    /// loss instead of dropping writes.
    pub fn retry_class(&self) -> RetryClass {
        match self.kind {
            RemoteErrorKind::Network | RemoteErrorKind::Timeout => RetryClass::Transient,
            RemoteErrorKind::Unauthorized
            | RemoteErrorKind::Validation
            | RemoteErrorKind::Conflict => RetryClass::Permanent,
            RemoteErrorKind::Other => {
                let msg = self.message.to_lowercase();
                if msg.contains("fetch") || msg.contains("network") || msg.contains("failed") {
                    RetryClass::Transient
                } else {
                    RetryClass::Permanent
                }
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.retry_class() == RetryClass::Transient
    }
}

impl From<RemoteError> for crate::AppError {
    fn from(err: RemoteError) -> Self {
        crate::AppError::new(err.code.clone(), err.message.clone())
            .with_context("kind", format!("{:?}", err.kind))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote identity/session surface.
#[async_trait]
pub trait AuthApi {
    async fn get_session(&self) -> RemoteResult<Option<RemoteSession>>;
    async fn exchange_code_for_session(&self, code: &str) -> RemoteResult<RemoteSession>;
    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> RemoteResult<RemoteSession>;
    async fn sign_out(&self) -> RemoteResult<()>;
}

/// The filtered-read/insert surface the profile load routine needs.
#[async_trait]
pub trait ProfileApi {
    async fn touch_last_active(&self, user_id: &str, at_ms: i64) -> RemoteResult<()>;
    async fn fetch_profile(&self, user_id: &str) -> RemoteResult<Option<UserProfile>>;
    async fn create_profile(&self, profile: &UserProfile) -> RemoteResult<UserProfile>;
    async fn fetch_household(&self, user_id: &str) -> RemoteResult<Option<Household>>;
}

/// Row insertion into a named remote collection; the write surface the
/// pending queue drains through. The remote store assigns identity and
/// returns the stored row.
#[async_trait]
pub trait InsertApi {
    async fn insert(
        &self,
        collection: &str,
        record: &serde_json::Value,
    ) -> RemoteResult<serde_json::Value>;
}

/// One realtime change notification for a row matching a subscription
/// filter. Applied to in-memory collections (see `reconcile`), never to
/// the snapshot cache directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent<T> {
    pub kind: ChangeKind,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub old: Option<T>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub new: Option<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}
