//! Module for the CLI.

use crate::{chain_info, judge::OracleJudge};
use alloy_primitives::Address;
use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser};
use litmus_anchor::AnchorReader;
use litmus_inbox::{DaReader, KeysetValidationMode, L2TrackingRecord};
use litmus_oracle::ConsensusOracle;
use litmus_providers::{AlloyInboxProvider, BlobReader, OnlineBeaconClient, ProverRpcClient};
use litmus_tournament::{Tournament, TournamentConfig, TournamentError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

/// Main CLI
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// L1 execution-layer JSON-RPC endpoint.
    #[arg(long, env = "ETHEREUM_RPC_URL")]
    pub ethereum_rpc_url: String,
    /// L1 beacon REST endpoint, for blob sidecar retrieval.
    #[arg(long, env = "ETHEREUM_BEACON_RPC_URL")]
    pub ethereum_beacon_rpc_url: String,
    /// Comma-separated prover RPC endpoints.
    #[arg(long, env = "PROVERS", value_delimiter = ',')]
    pub provers: Vec<String>,
    /// The rollup core contract on L1.
    #[arg(long, env = "ROLLUP_CORE_ADDRESS")]
    pub rollup_core_address: Address,
    /// The child chain id.
    #[arg(long, env = "ARBITRUM_ONE_CHAIN_ID")]
    pub chain_id: u64,
    /// The sequencer inbox contract; defaults to the compiled-in registry entry.
    #[arg(long, env = "SEQUENCER_INBOX_ADDRESS")]
    pub sequencer_inbox_address: Option<Address>,
    /// The bridge contract; defaults to the compiled-in registry entry.
    #[arg(long, env = "BRIDGE_ADDRESS")]
    pub bridge_address: Option<Address>,
    /// How many heights beyond an agreed common prefix the leading prover is tested at.
    #[arg(long, default_value_t = 10)]
    pub extra_heights: u64,
    /// Verbosity level (0-4)
    #[arg(long, short, action = ArgAction::Count)]
    pub v: u8,
}

impl Cli {
    /// Initializes telemetry for the application.
    pub(crate) fn init_telemetry(self) -> Result<Self> {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(match self.v {
                0 => Level::ERROR,
                1 => Level::WARN,
                2 => Level::INFO,
                3 => Level::DEBUG,
                _ => Level::TRACE,
            })
            .finish();
        tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))?;
        Ok(self)
    }

    /// Runs the tournament to completion. Returns whether at least one survivor carries a
    /// positively verified tip.
    pub(crate) async fn run(&self) -> Result<bool> {
        let cancel = CancellationToken::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!(target: "litmus", "interrupt received; cancelling");
                    cancel.cancel();
                }
            });
        }

        let l1_url: reqwest::Url =
            self.ethereum_rpc_url.parse().context("parsing ETHEREUM_RPC_URL")?;

        // The anchor is the only place failure is fatal: with no validated assertion there is
        // nothing to bootstrap trust from.
        let anchor = AnchorReader::new_http(l1_url.clone(), self.rollup_core_address)
            .trusted_anchor()
            .await
            .context("anchor validation failed")?;

        // Only provers that agree on the anchored block enter the tournament.
        let mut provers = Vec::new();
        let mut anchor_number = None;
        for endpoint in &self.provers {
            info!(target: "litmus", endpoint, "initializing prover");
            let client = match ProverRpcClient::new(endpoint.clone(), self.chain_id) {
                Ok(client) => client,
                Err(err) => {
                    warn!(target: "litmus", endpoint, %err, "skipping prover");
                    continue;
                }
            };
            match client.header_by_hash(anchor.l2_block_hash).await {
                Ok(header) if header.hash_slow() == anchor.l2_block_hash => {
                    anchor_number.get_or_insert(header.number);
                    provers.push(client);
                }
                Ok(_) => {
                    warn!(target: "litmus", endpoint, "prover returned a header that does not hash to the anchor");
                }
                Err(err) => {
                    warn!(target: "litmus", endpoint, %err, "prover disagrees on the anchor block");
                }
            }
        }
        let Some(anchor_number) = anchor_number else {
            bail!("no prover agrees on the anchored block {}", anchor.l2_block_hash);
        };
        let anchor_record = L2TrackingRecord {
            l2_block_number: anchor_number,
            l2_block_hash: anchor.l2_block_hash,
        };
        info!(
            target: "litmus",
            provers = provers.len(),
            anchor = %anchor_record.l2_block_hash,
            height = anchor_record.l2_block_number,
            "anchor agreed; starting tournament"
        );

        let addresses = match (self.sequencer_inbox_address, self.bridge_address) {
            (Some(sequencer_inbox), Some(bridge)) => {
                chain_info::RollupAddresses { sequencer_inbox, bridge }
            }
            _ => chain_info::rollup_addresses(self.chain_id).ok_or_else(|| {
                anyhow!(
                    "no compiled-in contract addresses for chain {}; set SEQUENCER_INBOX_ADDRESS and BRIDGE_ADDRESS",
                    self.chain_id
                )
            })?,
        };

        let inbox_provider = AlloyInboxProvider::new_http(
            l1_url.clone(),
            addresses.sequencer_inbox,
            addresses.bridge,
        );
        let beacon = OnlineBeaconClient::new_http(self.ethereum_beacon_rpc_url.clone());
        let da_readers: Vec<Box<dyn DaReader + Send + Sync>> =
            vec![Box::new(BlobReader::new_http(beacon, l1_url))];
        let consensus = ConsensusOracle::new(
            inbox_provider,
            da_readers,
            KeysetValidationMode::Panic,
            cancel.clone(),
        );
        let judge = OracleJudge::new(consensus, cancel.clone());

        let tournament = Tournament::new(
            TournamentConfig { extra_heights: self.extra_heights },
            anchor_record,
        );
        let outcome = tournament.run(provers, &judge).await.map_err(|err| match err {
            TournamentError::Cancelled => anyhow!("tournament cancelled"),
            TournamentError::Fatal(msg) => anyhow!(msg),
        })?;

        for elimination in &outcome.eliminated {
            println!("[ELIMINATED] {}: {}", elimination.endpoint, elimination.reason);
        }
        for survivor in &outcome.survivors {
            println!(
                "[SURVIVOR] {} @ block {} ({}): {}",
                survivor.endpoint,
                survivor.tip.l2_block_number,
                survivor.tip.l2_block_hash,
                if survivor.verified { "verified" } else { "survived by elimination" },
            );
        }
        if outcome.survivors.is_empty() {
            bail!("all provers were eliminated");
        }

        Ok(outcome.has_verified_survivor())
    }
}
