use std::sync::Arc;

use mongodb::Database;

use crate::config::AppConfig;
use crate::services::gateway::GatewayService;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub gateway: Arc<GatewayService>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        let gateway = Arc::new(GatewayService::new(config.clone()));
        AppState { db, config, gateway }
    }
}
