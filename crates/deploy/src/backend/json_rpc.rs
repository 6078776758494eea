//! Chain backend talking to an Ethereum node over JSON-RPC.
//!
//! Transactions are sent with `eth_sendTransaction`, so the sender must be an account the
//! node can sign for (a Hardhat or Anvil dev node, or a node with an unlocked account).

use std::time::Duration;

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Artifact, ChainBackend, DeploymentHandle};
use crate::{
    AbiValue, NetworkConfig,
    abi::encode_constructor_args,
    rpc::{self, Quantity, deserialize_opt_u64_from_hex},
};

/// The subset of a transaction receipt the backend needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    #[serde(default, deserialize_with = "deserialize_opt_u64_from_hex")]
    status: Option<u64>,
    #[serde(default)]
    contract_address: Option<Address>,
    #[serde(default, deserialize_with = "deserialize_opt_u64_from_hex")]
    block_number: Option<u64>,
}

/// [`ChainBackend`] backed by a JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcBackend {
    client: reqwest::Client,
    rpc_url: String,
    from: Address,
    gas_limit: Option<u64>,
    confirmations: u64,
    poll_interval: Duration,
    timeout: Duration,
}

impl JsonRpcBackend {
    /// Connect to the node described by `config`.
    ///
    /// When no sender is configured, the first account reported by `eth_accounts` is used.
    pub async fn connect(config: &NetworkConfig) -> Result<Self> {
        let client = rpc::create_client()?;
        let rpc_url = config.rpc_url.to_string();

        let from = match config.from {
            Some(from) => from,
            None => {
                let accounts: Vec<Address> =
                    rpc::json_rpc_call(&client, &rpc_url, "eth_accounts", vec![])
                        .await
                        .with_context(|| format!("Failed to list accounts on {}", rpc_url))?;
                accounts
                    .first()
                    .copied()
                    .context("Node reported no accounts and no sender was configured")?
            }
        };

        tracing::info!(account = %from, rpc_url = %rpc_url, "Deploying contracts with account");

        Ok(Self {
            client,
            rpc_url,
            from,
            gas_limit: config.gas_limit,
            confirmations: config.confirmations,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// The account paying for deployments.
    pub fn sender(&self) -> Address {
        self.from
    }

    fn poll_policy(&self) -> ConstantBuilder {
        let attempts = self.timeout.as_millis() / self.poll_interval.as_millis().max(1);
        ConstantBuilder::default()
            .with_delay(self.poll_interval)
            .with_max_times(usize::try_from(attempts).unwrap_or(usize::MAX).max(1))
    }

    async fn fetch_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        let receipt: Option<TransactionReceipt> = rpc::json_rpc_call(
            &self.client,
            &self.rpc_url,
            "eth_getTransactionReceipt",
            vec![json!(tx_hash)],
        )
        .await?;

        receipt.with_context(|| format!("Transaction {} not mined yet", tx_hash))
    }

    async fn block_number(&self) -> Result<u64> {
        let Quantity(number) =
            rpc::json_rpc_call(&self.client, &self.rpc_url, "eth_blockNumber", vec![]).await?;
        Ok(number)
    }

    async fn wait_for_depth(&self, mined_at: u64) -> Result<()> {
        let target = mined_at + self.confirmations - 1;

        (|| async move {
            let head = self.block_number().await?;
            if head >= target {
                Ok(())
            } else {
                anyhow::bail!("Head {} below confirmation target {}", head, target)
            }
        })
        .retry(self.poll_policy())
        .notify(|err: &anyhow::Error, _| {
            tracing::trace!(error = %err, "Waiting for confirmations...");
        })
        .await
    }

    async fn confirm(&self, handle: &DeploymentHandle) -> Result<Address> {
        let receipt = (|| self.fetch_receipt(handle.tx_hash))
            .retry(self.poll_policy())
            .notify(|err: &anyhow::Error, _| {
                tracing::trace!(error = %err, contract = %handle.contract, "Receipt not available, retrying...");
            })
            .await?;

        let address = contract_address(&receipt)?;

        if self.confirmations > 1 {
            let mined_at = receipt
                .block_number
                .context("Receipt is missing its block number")?;
            self.wait_for_depth(mined_at).await?;
        }

        Ok(address)
    }
}

/// Build the `eth_sendTransaction` payload for a contract creation.
fn deploy_transaction(
    from: Address,
    artifact: &Artifact,
    args: &[AbiValue],
    gas_limit: Option<u64>,
) -> Value {
    let mut data = artifact.bytecode.to_vec();
    data.extend(encode_constructor_args(args));

    let mut tx = json!({
        "from": from,
        "data": format!("0x{}", hex::encode(data)),
    });
    if let Some(gas) = gas_limit {
        tx["gas"] = json!(format!("0x{:x}", gas));
    }
    tx
}

fn contract_address(receipt: &TransactionReceipt) -> Result<Address> {
    if receipt.status == Some(0) {
        anyhow::bail!("Deployment transaction reverted");
    }
    receipt
        .contract_address
        .context("Receipt has no contract address")
}

impl ChainBackend for JsonRpcBackend {
    async fn submit_deployment(
        &self,
        artifact: &Artifact,
        args: &[AbiValue],
    ) -> Result<DeploymentHandle> {
        let tx = deploy_transaction(self.from, artifact, args, self.gas_limit);

        let tx_hash: B256 =
            rpc::json_rpc_call(&self.client, &self.rpc_url, "eth_sendTransaction", vec![tx])
                .await
                .with_context(|| format!("Failed to send deployment of {}", artifact.name))?;

        tracing::debug!(contract = %artifact.name, tx_hash = %tx_hash, "Deployment transaction sent");

        Ok(DeploymentHandle {
            contract: artifact.name.clone(),
            tx_hash,
        })
    }

    async fn await_confirmation(&self, handle: &DeploymentHandle) -> Result<Address> {
        tokio::time::timeout(self.timeout, self.confirm(handle))
            .await
            .with_context(|| {
                format!(
                    "Timeout after {}s waiting for {} ({})",
                    self.timeout.as_secs(),
                    handle.contract,
                    handle.tx_hash
                )
            })?
    }
}
