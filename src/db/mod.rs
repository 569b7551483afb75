pub mod models;
pub mod users;
pub mod sessions;
pub mod messages;
pub mod attachments;
pub mod friend_requests;
pub mod groups;
pub mod group_requests;

pub use models::{
    Attachment, FriendRequest, Group, GroupRequest, MessageRow, Session, User, UserStatus,
};
pub use users::UserRepository;
pub use sessions::SessionRepository;
pub use messages::MessageRepository;
pub use attachments::AttachmentRepository;
pub use friend_requests::FriendRequestRepository;
pub use groups::GroupRepository;
pub use group_requests::GroupRequestRepository;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::error::AppError;

/// Opens the pool with foreign keys enforced and applies pending migrations.
pub async fn connect(config: &Config) -> Result<Pool<Sqlite>, AppError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let db = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(options)
        .await?;

    migrate(&db).await?;
    Ok(db)
}

pub async fn migrate(db: &Pool<Sqlite>) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(db).await?;
    Ok(())
}
