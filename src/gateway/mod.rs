//! Capability surface over one ledger network.
//!
//! Every state change goes through the same three steps:
//! [`LedgerGateway::build_transaction`] → [`LedgerGateway::sign_and_submit`] →
//! [`LedgerGateway::await_finality`]. A [`PendingTransaction`] hash says nothing
//! about effect; only a [`TransactionReceipt`] does, and [`submit_and_confirm`]
//! is the only way to get one.

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{
    config::{ClientConfig, Network},
    error::GatewayResult,
    identity::{Address, IdentityError, SigningIdentity},
};

pub mod memory;
pub mod rest;

pub use memory::MemoryGateway;
pub use rest::RestGateway;

/// Aptos coin type and the resource that holds it.
pub const APTOS_COIN: &str = "0x1::aptos_coin::AptosCoin";

pub fn coin_store_type(coin_type: &str) -> String {
    format!("0x1::coin::CoinStore<{coin_type}>")
}

/// Fully qualified Move function: `<address>::<module>::<name>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId {
    pub module_address: Address,
    pub module: String,
    pub name: String,
}

impl FunctionId {
    pub fn new(module_address: Address, module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module_address,
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.module_address, self.module, self.name)
    }
}

impl FromStr for FunctionId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, "::");
        match (parts.next(), parts.next(), parts.next()) {
            (Some(addr), Some(module), Some(name)) if !module.is_empty() && !name.is_empty() => {
                Ok(Self::new(addr.parse()?, module, name))
            }
            _ => Err(IdentityError::Empty {
                what: "function identifier",
            }),
        }
    }
}

/// Argument value for entry and view functions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveValue {
    U64(u64),
    Address(Address),
    String(String),
}

impl MoveValue {
    /// JSON form the node REST API expects: integers as decimal strings.
    pub fn to_json(&self) -> Value {
        match self {
            MoveValue::U64(v) => Value::String(v.to_string()),
            MoveValue::Address(a) => Value::String(a.to_hex()),
            MoveValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<u64> for MoveValue {
    fn from(v: u64) -> Self {
        MoveValue::U64(v)
    }
}

impl From<Address> for MoveValue {
    fn from(a: Address) -> Self {
        MoveValue::Address(a)
    }
}

impl From<&str> for MoveValue {
    fn from(s: &str) -> Self {
        MoveValue::String(s.to_string())
    }
}

/// A call to a Move function: the payload of an entry transaction or a view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionCall {
    pub function: FunctionId,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<MoveValue>,
}

impl FunctionCall {
    pub fn new(function: FunctionId, arguments: Vec<MoveValue>) -> Self {
        Self {
            function,
            type_arguments: Vec::new(),
            arguments,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "function": self.function.to_string(),
            "type_arguments": self.type_arguments,
            "arguments": self.arguments.iter().map(MoveValue::to_json).collect::<Vec<_>>(),
        })
    }
}

pub type EntryFunction = FunctionCall;
pub type ViewRequest = FunctionCall;

/// Transaction ready to be signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub sender: Address,
    pub sequence_number: u64,
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
    pub expiration_timestamp_secs: u64,
    pub chain_id: u8,
    pub payload: EntryFunction,
}

impl UnsignedTransaction {
    /// Submission request body without the signature.
    pub fn to_request_json(&self) -> Value {
        let mut payload = self.payload.to_json();
        payload["type"] = Value::String("entry_function_payload".into());
        json!({
            "sender": self.sender.to_hex(),
            "sequence_number": self.sequence_number.to_string(),
            "max_gas_amount": self.max_gas_amount.to_string(),
            "gas_unit_price": self.gas_unit_price.to_string(),
            "expiration_timestamp_secs": self.expiration_timestamp_secs.to_string(),
            "payload": payload,
        })
    }
}

/// Accepted by the node, effect unknown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub hash: String,
    pub function: FunctionId,
}

/// A committed transaction whose execution succeeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutedTransaction {
    pub hash: String,
    pub function: String,
    pub version: u64,
    pub vm_status: String,
    pub gas_used: u64,
}

/// Proof that a state-changing call took effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionReceipt {
    pub hash: String,
    pub function: String,
    pub version: u64,
    pub vm_status: String,
    pub gas_used: u64,
}

impl From<ExecutedTransaction> for TransactionReceipt {
    fn from(tx: ExecutedTransaction) -> Self {
        Self {
            hash: tx.hash,
            function: tx.function,
            version: tx.version,
            vm_status: tx.vm_status,
            gas_used: tx.gas_used,
        }
    }
}

/// Typed record stored under an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub data: Value,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    fn network(&self) -> Network;

    /// Stamps sequence number, chain id, gas and expiry. Arguments are not
    /// checked here; a mismatch is rejected by the node.
    async fn build_transaction(
        &self,
        sender: Address,
        payload: EntryFunction,
    ) -> GatewayResult<UnsignedTransaction>;

    async fn sign_and_submit(
        &self,
        identity: &SigningIdentity,
        txn: UnsignedTransaction,
    ) -> GatewayResult<PendingTransaction>;

    /// Suspends until the transaction is committed. An on-chain abort is
    /// returned as [`crate::error::GatewayError::Execution`].
    async fn await_finality(&self, hash: &str) -> GatewayResult<ExecutedTransaction>;

    async fn view(&self, request: &ViewRequest) -> GatewayResult<Vec<Value>>;

    /// `Ok(None)` when the account holds no such resource.
    async fn read_resource(
        &self,
        address: Address,
        resource_type: &str,
    ) -> GatewayResult<Option<Resource>>;

    async fn fund(&self, address: Address, amount: u64) -> GatewayResult<()>;
}

/// Build, sign, submit, then wait. No retries.
pub async fn submit_and_confirm(
    gateway: &dyn LedgerGateway,
    identity: &SigningIdentity,
    payload: EntryFunction,
) -> GatewayResult<TransactionReceipt> {
    let function = payload.function.to_string();
    let txn = gateway
        .build_transaction(identity.address(), payload)
        .await?;
    debug!(
        %function,
        sender = %txn.sender,
        sequence_number = txn.sequence_number,
        "transaction built"
    );
    let pending = gateway.sign_and_submit(identity, txn).await?;
    debug!(%function, hash = %pending.hash, "transaction submitted, awaiting finality");
    let executed = gateway.await_finality(&pending.hash).await?;
    info!(
        %function,
        hash = %executed.hash,
        version = executed.version,
        "transaction committed"
    );
    Ok(executed.into())
}

/// Gateway for the configured network: in-process for `local-sim`, REST otherwise.
pub fn connect(config: &ClientConfig) -> GatewayResult<Box<dyn LedgerGateway>> {
    match config.gateway.network {
        Network::LocalSim => Ok(Box::new(MemoryGateway::new(config.module_address))),
        _ => Ok(Box::new(RestGateway::new(config.gateway.clone())?)),
    }
}
