use callbridge::application::{CallEventDispatcher, CallbackUrls};
use callbridge::config::Config;
use callbridge::domain::correlation::CorrelationStore;
use callbridge::domain::pipeline::PipelineConsumer;
use callbridge::infrastructure::acs::AcsCallAutomationClient;
use callbridge::infrastructure::media::{MediaSessionRegistry, MediaStreamBridge};
use callbridge::infrastructure::persistence::{
    create_pool, run_migrations, DatabaseConfig, PgCorrelationStore,
};
use callbridge::infrastructure::pipeline::LoopbackPipeline;
use callbridge::interface::api::{build_router, init_metrics, update_correlation_records, AppState};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting callbridge");

    // Load configuration; any problem here means calls would never be answered
    let config = Config::load()?;
    if let Err(e) = config.validate() {
        error!("Refusing to start: {}", e);
        return Err(e.into());
    }
    info!(
        "Configuration loaded: bind={}, callback_base={}",
        config.bind_address(),
        config.acs.callback_events_uri
    );

    // Shared correlation store; unreachable is fatal
    let db_config = DatabaseConfig::from(&config.store);
    let pool = match create_pool(&db_config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Refusing to start without the shared correlation store: {}", e);
            return Err(e.into());
        }
    };
    run_migrations(&pool).await?;

    let pg_store = Arc::new(PgCorrelationStore::new(pool));
    let store: Arc<dyn CorrelationStore> = pg_store.clone();
    info!("Correlation store initialized");

    // Purge expired records and refresh the record gauge
    {
        let pg_store = pg_store.clone();
        let interval = config.purge_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match pg_store.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => info!("Purged {} expired correlation record(s)", purged),
                    Err(e) => warn!("Correlation purge failed: {}", e),
                }
                if let Ok(count) = pg_store.size().await {
                    update_correlation_records(count);
                }
            }
        });
        info!("Correlation purge task started");
    }

    let automation = Arc::new(AcsCallAutomationClient::new(
        &config.acs.connection_string,
        &config.acs.api_version,
        config.request_timeout(),
    )?);

    let sessions = Arc::new(MediaSessionRegistry::new());
    let urls = CallbackUrls::new(&config.acs.callback_events_uri)?;
    let dispatcher = Arc::new(
        CallEventDispatcher::new(store.clone(), automation, sessions.clone(), urls)
            .with_ttl(config.record_ttl()),
    );

    let pipeline: Arc<dyn PipelineConsumer> = Arc::new(LoopbackPipeline::new());
    let bridge = Arc::new(MediaStreamBridge::new(
        pipeline,
        sessions.clone(),
        config.media.outbound_queue_frames,
    ));

    info!("Initializing Prometheus metrics exporter");
    let prometheus_handle = init_metrics()?;

    let state = AppState {
        dispatcher,
        store,
        bridge,
        sessions,
    };
    let app = build_router(state, prometheus_handle);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down...");
        })
        .await?;

    Ok(())
}
