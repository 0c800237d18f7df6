use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use orchwatch_core::OrchestratorWatcher;
use orchwatch_evm::{BondingManagerDecoder, HttpTransport, LivepeerClient, PollingBlockSource};

use crate::config::{open_store, AppConfig};
use crate::logging;

pub async fn run(config_path: &Path) -> Result<()> {
    let cfg = AppConfig::load(config_path)?;
    logging::init_tracing(&cfg.log);

    let transport = Arc::new(
        HttpTransport::default_for(cfg.rpc_url.as_str())
            .with_context(|| format!("connect to {}", cfg.rpc_url))?,
    );
    let client = Arc::new(LivepeerClient::new(
        transport,
        cfg.bonding_manager,
        cfg.service_registry,
    ));
    let poller = PollingBlockSource::new(client.clone(), cfg.polling_config());
    let store = open_store(&cfg.storage).await?;

    let watcher = Arc::new(OrchestratorWatcher::new(
        cfg.watcher_config(),
        Arc::new(poller.feed()),
        store,
        client,
        Arc::new(BondingManagerDecoder::new(cfg.bonding_manager)),
    )?);

    let on_signal = watcher.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping");
                on_signal.stop();
            }
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });

    let event_loop = watcher.clone();
    let watch_task = tokio::spawn(async move { event_loop.watch().await });

    // The feed drops batches nobody is subscribed to.
    let (poller_stop, poller_stop_rx) = watch::channel(false);
    let poller_task = if watcher.subscribed().await {
        Some(tokio::spawn(poller.run(poller_stop_rx)))
    } else {
        None
    };

    watch_task.await.context("watcher task")?;

    let _ = poller_stop.send(true);
    if let Some(task) = poller_task {
        task.await.context("block poller task")?;
    }

    let stats = watcher.stats();
    info!(
        batches = stats.batches,
        logs = stats.logs_seen,
        forward = stats.forward_updates,
        reorg = stats.reorg_updates,
        errors = stats.decode_errors + stats.reconcile_errors,
        "watcher finished"
    );
    Ok(())
}
