//! Chain access seam
//!
//! Every on-chain read and write goes through [`ChainClient`]. Signing is
//! delegated: a [`TransactionIntent`] carries a key reference, never key
//! material, and the client implementation resolves it.

pub mod gateway;
pub mod methods;

use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gateway::{GatewayClient, GatewayConfig};

/// Chain access errors
#[derive(Error, Debug)]
pub enum ChainError {
    /// Node or gateway returned an error
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Transaction was mined but reverted
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Return value did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// ABI-level value passed to or returned from a contract method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ChainValue {
    Uint(U256),
    Address(Address),
    Bool(bool),
    String(String),
    Array(Vec<ChainValue>),
    /// Encoded inner call, used for multicall payloads
    Call { method: String, args: Vec<ChainValue> },
}

impl ChainValue {
    pub fn as_uint(&self) -> Result<U256, ChainError> {
        match self {
            ChainValue::Uint(v) => Ok(*v),
            other => Err(ChainError::Decode(format!("expected uint, got {:?}", other))),
        }
    }

    pub fn as_address(&self) -> Result<Address, ChainError> {
        match self {
            ChainValue::Address(a) => Ok(*a),
            other => Err(ChainError::Decode(format!(
                "expected address, got {:?}",
                other
            ))),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ChainError> {
        match self {
            ChainValue::Bool(b) => Ok(*b),
            other => Err(ChainError::Decode(format!("expected bool, got {:?}", other))),
        }
    }

    pub fn as_array(&self) -> Result<&[ChainValue], ChainError> {
        match self {
            ChainValue::Array(items) => Ok(items),
            other => Err(ChainError::Decode(format!(
                "expected array, got {:?}",
                other
            ))),
        }
    }

    /// Element `index` of an array value as uint
    pub fn uint_at(&self, index: usize) -> Result<U256, ChainError> {
        self.as_array()?
            .get(index)
            .ok_or_else(|| ChainError::Decode(format!("missing tuple element {}", index)))?
            .as_uint()
    }
}

impl From<U256> for ChainValue {
    fn from(v: U256) -> Self {
        ChainValue::Uint(v)
    }
}

impl From<Address> for ChainValue {
    fn from(a: Address) -> Self {
        ChainValue::Address(a)
    }
}

impl From<bool> for ChainValue {
    fn from(b: bool) -> Self {
        ChainValue::Bool(b)
    }
}

impl From<u64> for ChainValue {
    fn from(v: u64) -> Self {
        ChainValue::Uint(U256::from(v))
    }
}

/// Which configured key signs a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerRole {
    /// Operator of the logic contract
    Operational,
    /// Wallet funding boosting transfers
    Boosting,
}

/// Reference to signing material held outside the process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerRef {
    pub role: SignerRole,
    pub key_ref: String,
    pub address: Address,
}

/// Read-only contract call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadCall {
    pub to: Address,
    pub method: String,
    pub args: Vec<ChainValue>,
}

impl ReadCall {
    pub fn new(to: Address, method: &str, args: Vec<ChainValue>) -> Self {
        Self {
            to,
            method: method.to_string(),
            args,
        }
    }
}

/// State-changing call to be signed and submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    pub signer: SignerRef,
    pub to: Address,
    pub method: String,
    pub args: Vec<ChainValue>,
    pub value: U256,
}

impl TransactionIntent {
    pub fn new(signer: SignerRef, to: Address, method: &str, args: Vec<ChainValue>) -> Self {
        Self {
            signer,
            to,
            method: method.to_string(),
            args,
            value: U256::ZERO,
        }
    }
}

/// Mined transaction receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub effective_gas_price: U256,
    pub success: bool,
}

impl Receipt {
    /// Native-token cost of the transaction
    pub fn gas_cost(&self) -> U256 {
        U256::from(self.gas_used).saturating_mul(self.effective_gas_price)
    }
}

/// Blockchain access used by every strategy component
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Execute a read-only call
    async fn call(&self, call: &ReadCall) -> Result<ChainValue, ChainError>;

    /// Execute several reads; results are in request order
    async fn batch_call(&self, calls: &[ReadCall]) -> Result<Vec<ChainValue>, ChainError> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.call(call).await?);
        }
        Ok(results)
    }

    /// Sign, submit and wait for one transaction. A reverted transaction is an error.
    async fn send_transaction(&self, intent: &TransactionIntent) -> Result<Receipt, ChainError>;

    async fn block_number(&self) -> Result<u64, ChainError>;

    async fn native_balance(&self, address: Address) -> Result<U256, ChainError>;
}
