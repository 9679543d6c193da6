use std::sync::Arc;

use pingboard_service::database::{self, Database};
use pingboard_service::monitoring::{CheckRunner, HttpProber, Prober, TickOrchestrator};
use pingboard_service::pool::open_local_pool;
use pingboard_service::{Config, EndpointService};

/// Shared across every worker through `web::Data`
pub struct AppState {
    pub endpoints: EndpointService,
    pub ticks: TickOrchestrator,
    /// Unset means the tick trigger rejects every caller
    pub cron_secret: Option<String>,
}

impl AppState {
    pub fn new(database: Arc<dyn Database>, prober: Arc<dyn Prober>, cron_secret: Option<String>) -> Self {
        let runner = Arc::new(CheckRunner::new(prober, database.clone()));
        Self {
            endpoints: EndpointService::new(database.clone(), runner.clone()),
            ticks: TickOrchestrator::new(database, runner),
            cron_secret,
        }
    }

    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = open_local_pool(&config.database.path, config.database.max_connections).await?;
        let database: Arc<dyn Database> = Arc::new(database::open(pool).await?);
        let prober = Arc::new(HttpProber::new(&config.probe.user_agent)?);

        Ok(Self::new(database, prober, config.trigger.cron_secret.clone()))
    }
}
