use std::sync::Arc;

use color_eyre::eyre::{eyre, Result};
use natsctl::bootstrap;
use natsctl::cli_context::{ContextStore, FsContextStore};
use natsctl::config::Settings;
use natsctl::hooks::HookGraph;
use natsctl::publish::{NatsPublisher, Publisher};
use natsctl::store::kv::KvStore;
use natsctl::store::Store;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = Settings::from_env()?;

    let nats_url = std::env::var("NATSCTL_ADMIN_NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());
    let client = async_nats::connect(&nats_url)
        .await
        .map_err(|e| eyre!("could not connect to {nats_url}: {e}"))?;
    let jetstream = async_nats::jetstream::new(client);

    let kv = match jetstream.get_key_value(&settings.kv_bucket).await {
        Ok(kv) => kv,
        Err(_) => jetstream
            .create_key_value(async_nats::jetstream::kv::Config {
                bucket: settings.kv_bucket.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| eyre!("could not open KV bucket {}: {e}", settings.kv_bucket))?,
    };

    let store: Arc<dyn Store> = Arc::new(KvStore::new(kv));
    let cli_context: Option<Arc<dyn ContextStore>> = if settings.disable_cli_contexts {
        None
    } else {
        let dir = directories::ProjectDirs::from("", "", "natsctl")
            .map(|d| d.config_dir().join("contexts"))
            .unwrap_or_else(|| std::path::PathBuf::from("./natsctl-contexts"));
        Some(Arc::new(FsContextStore::new(dir)))
    };

    info!(bootstrap_urls = ?settings.bootstrap_urls, "running bootstrap");
    bootstrap::run(store.as_ref(), cli_context.as_ref(), &settings).await?;
    info!("bootstrap complete");

    let publisher: Arc<dyn Publisher> = Arc::new(NatsPublisher::new());
    let _hooks = HookGraph::new(store, publisher, cli_context);

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
