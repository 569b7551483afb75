use std::sync::Arc;
use sqlx::{Pool, Sqlite};
use crate::config::Config;
use crate::hub::Hub;
use crate::messaging::MessageService;
use crate::presence::Presence;
use crate::storage::ObjectStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub config: Arc<Config>,
    pub hub: Hub,
    pub store: Arc<dyn ObjectStore>,
    pub messages: MessageService,
    pub presence: Presence,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, config: Arc<Config>, store: Arc<dyn ObjectStore>, hub: Hub) -> Self {
        Self {
            messages: MessageService::new(db.clone(), store.clone(), hub.clone()),
            presence: Presence::new(db.clone(), hub.clone()),
            db,
            config,
            hub,
            store,
        }
    }
}
