//! HTTP chain gateway client
//!
//! Talks to a signing gateway that owns the node connection and the key
//! store. Requests carry only key references.

use super::{ChainClient, ChainError, ChainValue, ReadCall, Receipt, TransactionIntent};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gateway connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://127.0.0.1:8545/gateway`
    pub url: String,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Chain id the gateway must be connected to
    pub chain_id: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Serialize)]
struct GatewayRequest<'a, P: Serialize> {
    chain_id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct GatewayResponse<T> {
    result: Option<T>,
    error: Option<String>,
}

/// Chain client backed by the HTTP gateway
pub struct GatewayClient {
    client: reqwest::Client,
    url: String,
    chain_id: u64,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            chain_id: config.chain_id,
        })
    }

    async fn request<P, T>(&self, method: &str, params: P) -> Result<T, ChainError>
    where
        P: Serialize + Send,
        T: DeserializeOwned,
    {
        let body = GatewayRequest {
            chain_id: self.chain_id,
            method,
            params,
        };

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChainError::Rpc(format!("{} {}: {}", method, status, text)));
        }

        let parsed: GatewayResponse<T> = response.json().await?;
        match (parsed.result, parsed.error) {
            (_, Some(error)) => Err(ChainError::Rpc(format!("{}: {}", method, error))),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ChainError::Decode(format!("{}: empty response", method))),
        }
    }
}

#[async_trait]
impl ChainClient for GatewayClient {
    async fn call(&self, call: &ReadCall) -> Result<ChainValue, ChainError> {
        self.request("eth_call", call).await
    }

    async fn batch_call(&self, calls: &[ReadCall]) -> Result<Vec<ChainValue>, ChainError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let results: Vec<ChainValue> = self.request("batch_call", calls).await?;
        if results.len() != calls.len() {
            return Err(ChainError::Decode(format!(
                "batch_call returned {} results for {} calls",
                results.len(),
                calls.len()
            )));
        }
        Ok(results)
    }

    async fn send_transaction(&self, intent: &TransactionIntent) -> Result<Receipt, ChainError> {
        let receipt: Receipt = self.request("send_transaction", intent).await?;
        tracing::debug!(
            tx_hash = %receipt.tx_hash,
            method = %intent.method,
            block = receipt.block_number,
            gas_used = receipt.gas_used,
            "Transaction mined"
        );
        if !receipt.success {
            return Err(ChainError::Reverted(format!(
                "{} ({})",
                receipt.tx_hash, intent.method
            )));
        }
        Ok(receipt)
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.request("eth_blockNumber", ()).await
    }

    async fn native_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.request("eth_getBalance", [address]).await
    }
}
