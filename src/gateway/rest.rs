use std::time::{Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    EntryFunction, ExecutedTransaction, LedgerGateway, PendingTransaction, Resource,
    UnsignedTransaction, ViewRequest,
};
use crate::{
    config::{GatewayConfig, Network},
    error::{GatewayError, GatewayResult, NodeError, QueryFailure},
    identity::{Address, SigningIdentity},
};

/// Gateway over the node REST API (`/v1`) and its faucet.
#[derive(Clone)]
pub struct RestGateway {
    config: GatewayConfig,
    node_url: String,
    faucet_url: Option<String>,
    client: Client,
}

enum HttpFailure {
    Transport(reqwest::Error),
    Node { status: StatusCode, error: NodeError },
    Decode(String),
}

impl HttpFailure {
    fn is_not_found(&self) -> bool {
        matches!(self, HttpFailure::Node { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    fn into_gateway(self, context: &str) -> GatewayError {
        match self {
            HttpFailure::Transport(e) => GatewayError::transport(context, e),
            HttpFailure::Node { status, error } => {
                GatewayError::transport(context, format!("node replied {status}: {error}"))
            }
            HttpFailure::Decode(reason) => GatewayError::decode(context, reason),
        }
    }

    fn into_submission(self, function: &str) -> GatewayError {
        match self {
            HttpFailure::Node { error, .. } => GatewayError::Submission {
                function: function.to_string(),
                detail: error,
            },
            other => other.into_gateway(&format!("submitting {function}")),
        }
    }

    fn into_query(self, function: &str) -> GatewayError {
        let (failure, detail) = match self {
            HttpFailure::Transport(e) => (QueryFailure::Transport, NodeError::new(e.to_string())),
            HttpFailure::Node { status, error } => (error.classify(status.as_u16()), error),
            HttpFailure::Decode(reason) => (QueryFailure::Malformed, NodeError::new(reason)),
        };
        GatewayError::Query {
            function: function.to_string(),
            failure,
            detail,
        }
    }
}

type HttpResult<T> = Result<T, HttpFailure>;

#[derive(Deserialize)]
struct AccountData {
    sequence_number: String,
}

#[derive(Deserialize)]
struct LedgerInfo {
    chain_id: u8,
}

#[derive(Deserialize)]
struct GasEstimate {
    gas_estimate: u64,
}

#[derive(Deserialize)]
struct SubmittedTransaction {
    hash: String,
}

#[derive(Deserialize)]
struct TransactionView {
    #[serde(rename = "type")]
    kind: String,
    hash: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    vm_status: Option<String>,
    #[serde(default)]
    gas_used: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
}

impl RestGateway {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let node_url = config.resolved_node_url().ok_or_else(|| {
            GatewayError::InvalidConfig(format!("no node url for network {}", config.network))
        })?;
        let faucet_url = config.resolved_faucet_url();
        Ok(Self {
            config,
            node_url,
            faucet_url,
            client: Client::new(),
        })
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.node_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> HttpResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(HttpFailure::Transport)?;
        decode_response(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> HttpResult<T> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(HttpFailure::Transport)?;
        decode_response(response).await
    }

    async fn gas_unit_price(&self) -> u64 {
        match self.get::<GasEstimate>("/estimate_gas_price").await {
            Ok(estimate) => estimate.gas_estimate,
            Err(e) => {
                let e = e.into_gateway("estimating gas price");
                debug!(error = %e, fallback = self.config.gas_unit_price, "using configured gas price");
                self.config.gas_unit_price
            }
        }
    }
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> HttpResult<T> {
    let status = response.status();
    let body = response.bytes().await.map_err(HttpFailure::Transport)?;
    if status.is_success() {
        return serde_json::from_slice(&body).map_err(|e| HttpFailure::Decode(e.to_string()));
    }
    let error = serde_json::from_slice::<NodeError>(&body)
        .unwrap_or_else(|_| NodeError::new(String::from_utf8_lossy(&body).trim().to_string()));
    Err(HttpFailure::Node { status, error })
}

fn parse_u64(field: &str, value: &str) -> GatewayResult<u64> {
    value
        .parse()
        .map_err(|e| GatewayError::decode(field.to_string(), e))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Faucets answer either a bare list of hashes or `{"txn_hashes": [...]}`.
fn faucet_hashes(body: &Value) -> Option<Vec<String>> {
    let list = match body {
        Value::Array(items) => items,
        Value::Object(map) => map.get("txn_hashes")?.as_array()?,
        _ => return None,
    };
    list.iter()
        .map(|h| h.as_str().map(str::to_string))
        .collect()
}

fn executed_from_view(tx: TransactionView) -> GatewayResult<ExecutedTransaction> {
    let function = tx
        .payload
        .as_ref()
        .and_then(|p| p.get("function"))
        .and_then(Value::as_str)
        .unwrap_or(tx.kind.as_str())
        .to_string();
    let vm_status = tx.vm_status.unwrap_or_default();
    if tx.success != Some(true) {
        return Err(GatewayError::Execution {
            function,
            hash: tx.hash,
            vm_status,
        });
    }
    let version = parse_u64("transaction version", tx.version.as_deref().unwrap_or("0"))?;
    let gas_used = parse_u64("transaction gas_used", tx.gas_used.as_deref().unwrap_or("0"))?;
    Ok(ExecutedTransaction {
        hash: tx.hash,
        function,
        version,
        vm_status,
        gas_used,
    })
}

#[async_trait]
impl LedgerGateway for RestGateway {
    fn network(&self) -> Network {
        self.config.network
    }

    async fn build_transaction(
        &self,
        sender: Address,
        payload: EntryFunction,
    ) -> GatewayResult<UnsignedTransaction> {
        let function = payload.function.to_string();
        let account: AccountData = self
            .get(&format!("/accounts/{sender}"))
            .await
            .map_err(|e| e.into_submission(&function))?;
        let sequence_number = parse_u64("account sequence_number", &account.sequence_number)?;
        let ledger: LedgerInfo = self
            .get("/")
            .await
            .map_err(|e| e.into_gateway("reading ledger info"))?;
        let gas_unit_price = self.gas_unit_price().await;
        Ok(UnsignedTransaction {
            sender,
            sequence_number,
            max_gas_amount: self.config.max_gas_amount,
            gas_unit_price,
            expiration_timestamp_secs: unix_now() + self.config.expiration_secs,
            chain_id: ledger.chain_id,
            payload,
        })
    }

    async fn sign_and_submit(
        &self,
        identity: &SigningIdentity,
        txn: UnsignedTransaction,
    ) -> GatewayResult<PendingTransaction> {
        let function = txn.payload.function.clone();
        let name = function.to_string();
        let mut request = txn.to_request_json();

        let encoded: String = self
            .post("/transactions/encode_submission", &request)
            .await
            .map_err(|e| e.into_submission(&name))?;
        let message = hex::decode(encoded.trim_start_matches("0x"))
            .map_err(|e| GatewayError::decode("encode_submission", e))?;
        let signature = identity.sign(&message);
        request["signature"] = json!({
            "type": "ed25519_signature",
            "public_key": identity.public_key_hex(),
            "signature": format!("0x{}", hex::encode(signature.to_bytes())),
        });

        let submitted: SubmittedTransaction = self
            .post("/transactions", &request)
            .await
            .map_err(|e| e.into_submission(&name))?;
        Ok(PendingTransaction {
            hash: submitted.hash,
            function,
        })
    }

    async fn await_finality(&self, hash: &str) -> GatewayResult<ExecutedTransaction> {
        let started = Instant::now();
        loop {
            match self
                .get::<TransactionView>(&format!("/transactions/by_hash/{hash}"))
                .await
            {
                Ok(tx) if tx.kind != "pending_transaction" => return executed_from_view(tx),
                Ok(_) => {}
                // not indexed yet
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into_gateway(&format!("waiting for {hash}"))),
            }
            let waited = started.elapsed();
            if waited >= self.config.finality_timeout {
                return Err(GatewayError::Timeout {
                    hash: hash.to_string(),
                    waited,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn view(&self, request: &ViewRequest) -> GatewayResult<Vec<Value>> {
        let function = request.function.to_string();
        self.post("/view", &request.to_json())
            .await
            .map_err(|e| e.into_query(&function))
    }

    async fn read_resource(
        &self,
        address: Address,
        resource_type: &str,
    ) -> GatewayResult<Option<Resource>> {
        match self
            .get::<Resource>(&format!("/accounts/{address}/resource/{resource_type}"))
            .await
        {
            Ok(resource) => Ok(Some(resource)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into_query(resource_type)),
        }
    }

    async fn fund(&self, address: Address, amount: u64) -> GatewayResult<()> {
        let faucet = self
            .faucet_url
            .as_deref()
            .ok_or(GatewayError::FaucetUnavailable(self.config.network))?;
        let response = self
            .client
            .post(format!("{faucet}/mint"))
            .query(&[
                ("amount", amount.to_string()),
                ("address", address.to_hex()),
            ])
            .send()
            .await
            .map_err(|e| GatewayError::transport("calling faucet", e))?;
        let body: Value = decode_response(response)
            .await
            .map_err(|e| e.into_gateway("calling faucet"))?;
        let hashes = faucet_hashes(&body)
            .ok_or_else(|| GatewayError::decode("faucet", format!("unexpected body {body}")))?;
        if hashes.is_empty() {
            warn!(%address, "faucet returned no transactions");
        }
        for hash in hashes {
            self.await_finality(&hash).await?;
        }
        Ok(())
    }
}
