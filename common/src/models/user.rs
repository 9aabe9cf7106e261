// common/src/models/user.rs
use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Fields of a user record this gateway reads or writes.
///
/// The record itself lives in an external store; only these two fields are
/// touched here, by key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UserField {
    Username,
    SessionSecret,
}

impl UserField {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserField::Username => "username",
            UserField::SessionSecret => "session",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

/// External user store collaborator.
///
/// Reads and writes are single-key atomic. The policy for resolving an
/// unknown external identity (create vs. reject) belongs to the
/// implementation, not to the gateway.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, user_id: &str, field: UserField) -> Result<Option<String>, StoreError>;

    async fn set(&self, user_id: &str, field: UserField, value: &str) -> Result<(), StoreError>;

    /// Map a verified external identity string to an internal user id.
    async fn resolve_external_id(&self, external_id: &str) -> Result<Option<String>, StoreError>;
}

#[derive(Clone, Debug, Default)]
struct UserRecord {
    username: Option<String>,
    session_secret: Option<String>,
}

/// In-memory reference implementation of [`UserStore`].
///
/// Resolves only identities explicitly linked via [`link_external_id`];
/// unknown identities are rejected rather than created.
///
/// [`link_external_id`]: MemoryUserStore::link_external_id
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<String, UserRecord>,
    external_ids: DashMap<String, String>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user_id: &str, username: &str) {
        self.users.insert(
            user_id.to_string(),
            UserRecord {
                username: Some(username.to_string()),
                session_secret: None,
            },
        );
    }

    pub fn link_external_id(&self, external_id: &str, user_id: &str) {
        self.external_ids
            .insert(external_id.to_string(), user_id.to_string());
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, user_id: &str, field: UserField) -> Result<Option<String>, StoreError> {
        Ok(self.users.get(user_id).and_then(|record| match field {
            UserField::Username => record.username.clone(),
            UserField::SessionSecret => record.session_secret.clone(),
        }))
    }

    async fn set(&self, user_id: &str, field: UserField, value: &str) -> Result<(), StoreError> {
        let mut record = self.users.entry(user_id.to_string()).or_default();
        match field {
            UserField::Username => record.username = Some(value.to_string()),
            UserField::SessionSecret => record.session_secret = Some(value.to_string()),
        }
        Ok(())
    }

    async fn resolve_external_id(&self, external_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.external_ids.get(external_id).map(|id| id.value().clone()))
    }
}
