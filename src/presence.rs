use sqlx::{Pool, Sqlite};

use crate::db::{UserRepository, UserStatus};
use crate::error::AppError;
use crate::hub::{Channel, Hub, ServerEvent};

/// Online/offline transitions: announced on the user's own channel and
/// written to the user row. The two steps are not atomic.
#[derive(Clone)]
pub struct Presence {
    db: Pool<Sqlite>,
    hub: Hub,
}

impl Presence {
    pub fn new(db: Pool<Sqlite>, hub: Hub) -> Self {
        Self { db, hub }
    }

    pub async fn set_status(&self, user_id: i64, status: UserStatus) -> Result<(), AppError> {
        let event = ServerEvent::Status {
            user_id,
            payload: status,
        };
        self.hub.publish(Channel::User(user_id), &event).await;

        if !UserRepository::update_status(&self.db, user_id, status).await? {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        tracing::info!("👤 User {} is now {}", user_id, status.as_str());
        Ok(())
    }

    pub async fn connected(&self, user_id: i64) -> Result<(), AppError> {
        self.set_status(user_id, UserStatus::Online).await
    }

    pub async fn disconnected(&self, user_id: i64) -> Result<(), AppError> {
        self.set_status(user_id, UserStatus::Offline).await
    }
}
