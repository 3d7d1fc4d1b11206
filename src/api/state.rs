use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::crypto::resolve_user_id;
use crate::db::{Message, MessageRepository, UserRepository};
use crate::relay::{ConnectionRegistry, RelayBackend, RelayError};

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub config: Arc<Config>,
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }
}

impl RelayBackend for AppState {
    async fn resolve_identity(&self, credential: &str) -> Result<i64, RelayError> {
        let user_id = resolve_user_id(&self.config.jwt_secret, credential)
            .map_err(|_| RelayError::AuthenticationRejected)?;

        // A token can outlive its account.
        match UserRepository::exists(&self.db, user_id).await {
            Ok(true) => Ok(user_id),
            Ok(false) => Err(RelayError::AuthenticationRejected),
            Err(e) => Err(RelayError::Persistence(e.to_string())),
        }
    }

    async fn user_exists(&self, user_id: i64) -> Result<bool, RelayError> {
        UserRepository::exists(&self.db, user_id)
            .await
            .map_err(|e| RelayError::Persistence(e.to_string()))
    }

    async fn insert_message(
        &self,
        sender_id: i64,
        recipient_id: i64,
        content: &str,
    ) -> Result<Message, RelayError> {
        MessageRepository::create(&self.db, sender_id, recipient_id, content)
            .await
            .map_err(|e| RelayError::Persistence(e.to_string()))
    }
}
