use std::path::Path;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{Context, Result};

use orchwatch_core::types::{OrchFilter, OrchestratorRecord, MAX_FUTURE_ROUND};
use orchwatch_subgraph::{LivepeerSubgraph, SubgraphClient};

use crate::config::{open_store, AppConfig};
use crate::logging::{self, LogConfig};

pub async fn show(
    config_path: &Path,
    address: Option<Address>,
    round: Option<u64>,
    as_json: bool,
) -> Result<()> {
    let cfg = AppConfig::load(config_path)?;
    logging::init_tracing(&cfg.log);
    let store = open_store(&cfg.storage).await?;

    let records: Vec<OrchestratorRecord> = match address {
        Some(addr) => store.get_orch(addr).await?.into_iter().collect(),
        None => {
            let filter = OrchFilter {
                current_round: round,
            };
            store.select_orchs(&filter).await?
        }
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No orchestrators found.");
        return Ok(());
    }
    for rec in &records {
        println!("{}", format_record(rec));
    }
    println!("{} orchestrator(s)", records.len());
    Ok(())
}

pub async fn active(
    subgraph_url: Option<String>,
    config_path: Option<&Path>,
    as_json: bool,
) -> Result<()> {
    logging::init_tracing(&LogConfig {
        level: "warn".into(),
        ..LogConfig::default()
    });

    let subgraph_url = match (subgraph_url, config_path) {
        (Some(url), _) => url,
        (None, Some(path)) => AppConfig::load(path)?
            .subgraph_url
            .with_context(|| format!("no subgraph_url in '{}'", path.display()))?,
        (None, None) => anyhow::bail!("pass --subgraph or a config with subgraph_url"),
    };

    let client = SubgraphClient::new(&subgraph_url, Duration::from_secs(30))
        .context("create subgraph client")?;
    let transcoders = client
        .get_active_transcoders()
        .await
        .context("query active transcoders")?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&transcoders)?);
        return Ok(());
    }
    for t in &transcoders {
        println!(
            "{}  stake={}  fee_share={}  reward_cut={}  status={}  {}",
            t.address, t.delegated_stake, t.fee_share, t.reward_cut, t.status, t.service_uri
        );
    }
    println!("{} active transcoder(s)", transcoders.len());
    Ok(())
}

fn format_round(round: u64) -> String {
    if round == MAX_FUTURE_ROUND {
        "-".to_string()
    } else {
        round.to_string()
    }
}

fn format_record(rec: &OrchestratorRecord) -> String {
    format!(
        "{}  activation={}  deactivation={}  {}",
        rec.address,
        rec.activation_round,
        format_round(rec.deactivation_round),
        if rec.service_uri.is_empty() { "<no service URI>" } else { rec.service_uri.as_str() }
    )
}
