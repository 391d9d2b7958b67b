use std::sync::Arc;

use ridebid::api::DynAPI;
use ridebid::config::Config;
use ridebid::db::{MemoryStore, PgStore, Store};
use ridebid::engine::Engine;
use ridebid::error::Error;
use ridebid::events::EventBus;
use ridebid::scheduler::DailyReset;
use ridebid::server::serve;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(url, config.max_connections).await?),
        None => {
            tracing::warn!("no database configured, state is kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let events = EventBus::bounded(config.event_buffer);

    let subscriber = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = subscriber.recv().await {
            tracing::info!(event = event.name(), payload = ?event, "domain event");
        }
    });

    let engine = Engine::new(store, config.timezone, events.clone())?;

    let daily_reset = DailyReset::new(engine.ledger().clone(), events)?;
    let reset_handle = config.daily_reset.then(|| daily_reset.start());

    let api = Arc::new(engine) as DynAPI;

    serve(api, config.listen_addr, async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutting down");
    })
    .await?;

    daily_reset.stop();
    if let Some(handle) = reset_handle {
        handle.await.ok();
    }

    Ok(())
}
